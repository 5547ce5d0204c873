use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

#[automock]
#[async_trait]
pub trait InvoiceRenderer: Send + Sync {
    async fn render(&self, template_id: &str, data: serde_json::Value) -> Result<Vec<u8>>;
}

#[automock]
#[async_trait]
pub trait InvoiceStorage: Send + Sync {
    /// Stores `bytes` under `key` and returns the public retrieval URL.
    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<String>;
}
