use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{StatusCode, header::ACCEPT};
use serde::Serialize;
use tracing::error;

use crate::domain::repositories::invoices::InvoiceRenderer;

/// Renders invoices by posting the template id and document data to an HTTP
/// PDF rendering service.
pub struct HttpInvoiceRenderer {
    http: reqwest::Client,
    render_url: String,
}

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    template: &'a str,
    data: serde_json::Value,
}

impl HttpInvoiceRenderer {
    pub fn new(render_url: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .context("failed to build invoice renderer http client")?;

        Ok(Self { http, render_url })
    }
}

#[async_trait]
impl InvoiceRenderer for HttpInvoiceRenderer {
    async fn render(&self, template_id: &str, data: serde_json::Value) -> Result<Vec<u8>> {
        let resp = self
            .http
            .post(&self.render_url)
            .header(ACCEPT, "application/pdf")
            .json(&RenderRequest {
                template: template_id,
                data,
            })
            .send()
            .await
            .context("failed to reach invoice renderer")?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .context("failed to read rendered invoice")?;

        rendered_document(status, &body, template_id)
    }
}

/// Accepts a renderer response only when it is a success carrying a
/// non-empty document.
fn rendered_document(status: StatusCode, body: &[u8], template_id: &str) -> Result<Vec<u8>> {
    if !status.is_success() {
        error!(
            status = %status,
            template_id = %template_id,
            response_body = %String::from_utf8_lossy(body),
            "payments: invoice render failed"
        );
        bail!("invoice renderer responded with status {}", status);
    }

    if body.is_empty() {
        bail!("invoice renderer returned an empty document");
    }

    Ok(body.to_vec())
}
