use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::domain::value_objects::{
    expiry_window::ExpiryWindow,
    payments::{CustomerDetail, ItemDetail},
};

#[derive(Debug, Clone)]
pub struct PaymentLinkRequest {
    pub order_id: String,
    pub amount: i64,
    pub customer: CustomerDetail,
    pub item: ItemDetail,
    pub expiry: ExpiryWindow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLink {
    pub redirect_url: String,
    pub token: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment link expiry must be a positive duration")]
    InvalidExpiry,
    #[error("payment gateway rejected the request (status {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("payment gateway request failed")]
    Transport(#[source] anyhow::Error),
}

#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_link(
        &self,
        request: PaymentLinkRequest,
    ) -> Result<PaymentLink, GatewayError>;
}
