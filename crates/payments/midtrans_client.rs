use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::domain::{
    repositories::payment_gateway::{
        GatewayError, PaymentGateway, PaymentLink, PaymentLinkRequest,
    },
    value_objects::{
        expiry_window::ExpiryUnit,
        payments::{CustomerDetail, ItemDetail},
    },
};

const SANDBOX_BASE_URL: &str = "https://app.sandbox.midtrans.com";
const PRODUCTION_BASE_URL: &str = "https://app.midtrans.com";

/// Minimal Midtrans Snap client built on reqwest.
pub struct MidtransClient {
    http: reqwest::Client,
    server_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct SnapRequest<'a> {
    transaction_details: SnapTransactionDetails<'a>,
    customer_details: SnapCustomerDetails<'a>,
    item_details: Vec<SnapItemDetail<'a>>,
    expiry: SnapExpiry,
}

#[derive(Debug, Serialize)]
struct SnapTransactionDetails<'a> {
    order_id: &'a str,
    gross_amount: i64,
}

#[derive(Debug, Serialize)]
struct SnapCustomerDetails<'a> {
    first_name: &'a str,
    email: &'a str,
    phone: &'a str,
}

#[derive(Debug, Serialize)]
struct SnapItemDetail<'a> {
    id: &'a str,
    name: &'a str,
    price: i64,
    quantity: i32,
}

#[derive(Debug, Serialize)]
struct SnapExpiry {
    unit: ExpiryUnit,
    duration: i64,
}

#[derive(Debug, Deserialize)]
struct SnapResponse {
    token: String,
    redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct SnapErrorEnvelope {
    #[serde(default)]
    error_messages: Vec<String>,
}

impl MidtransClient {
    pub fn new(server_key: String, is_production: bool) -> Result<Self, GatewayError> {
        let base_url = if is_production {
            PRODUCTION_BASE_URL
        } else {
            SANDBOX_BASE_URL
        };

        Self::with_base_url(server_key, base_url.to_string())
    }

    pub fn with_base_url(server_key: String, base_url: String) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|err| GatewayError::Transport(err.into()))?;

        Ok(Self {
            http,
            server_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn snap_request(request: &PaymentLinkRequest) -> SnapRequest<'_> {
        let CustomerDetail { name, email, phone } = &request.customer;
        let ItemDetail {
            id,
            name: item_name,
            price,
            quantity,
        } = &request.item;

        SnapRequest {
            transaction_details: SnapTransactionDetails {
                order_id: &request.order_id,
                gross_amount: request.amount,
            },
            customer_details: SnapCustomerDetails {
                first_name: name,
                email,
                phone,
            },
            item_details: vec![SnapItemDetail {
                id,
                name: item_name,
                price: *price,
                quantity: *quantity,
            }],
            expiry: SnapExpiry {
                unit: request.expiry.unit,
                duration: request.expiry.duration,
            },
        }
    }

    async fn ensure_success(
        resp: reqwest::Response,
        order_id: &str,
    ) -> Result<reqwest::Response, GatewayError> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let message = serde_json::from_str::<SnapErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error_messages.join("; "))
            .filter(|joined| !joined.is_empty())
            .unwrap_or_else(|| body.clone());

        error!(
            status = %status,
            order_id = %order_id,
            response_body = %body,
            "payments: midtrans snap request failed"
        );

        Err(GatewayError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PaymentGateway for MidtransClient {
    async fn create_payment_link(
        &self,
        request: PaymentLinkRequest,
    ) -> Result<PaymentLink, GatewayError> {
        if request.expiry.duration <= 0 {
            return Err(GatewayError::InvalidExpiry);
        }

        // Snap API reference: https://docs.midtrans.com/reference/backend-integration
        let url = format!("{}/snap/v1/transactions", self.base_url);
        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.server_key, None::<&str>)
            .header(ACCEPT, "application/json")
            .json(&Self::snap_request(&request))
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.into()))?;

        let resp = Self::ensure_success(resp, &request.order_id).await?;
        let snap: SnapResponse = resp
            .json()
            .await
            .map_err(|err| GatewayError::Transport(err.into()))?;

        info!(
            order_id = %request.order_id,
            "payments: midtrans payment link created"
        );

        Ok(PaymentLink {
            redirect_url: snap.redirect_url,
            token: snap.token,
        })
    }
}
