use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::payments::PaymentEntity,
    value_objects::enums::payment_statuses::PaymentStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerDetail {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemDetail {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentModel {
    pub order_id: String,
    pub amount: i64,
    #[serde(alias = "customer")]
    pub customer_detail: CustomerDetail,
    #[serde(alias = "items")]
    pub item_details: Vec<ItemDetail>,
    pub expired_at: DateTime<Utc>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VaNumber {
    pub bank: String,
    pub va_number: String,
}

/// Payment-status notification as delivered by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookModel {
    pub order_id: String,
    pub transaction_status: PaymentStatus,
    pub transaction_id: String,
    #[serde(default)]
    pub va_numbers: Vec<VaNumber>,
    pub acquirer: Option<String>,
    pub payment_type: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListPaymentsQuery {
    pub page: i64,
    pub limit: i64,
}

impl Default for ListPaymentsQuery {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDto {
    pub uuid: Uuid,
    pub order_id: String,
    pub amount: i64,
    pub status: String,
    pub payment_link: String,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub va_number: Option<String>,
    pub bank: Option<String>,
    pub invoice_link: Option<String>,
    pub acquirer: Option<String>,
    pub description: Option<String>,
    pub expired_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentEntity> for PaymentDto {
    fn from(value: PaymentEntity) -> Self {
        let status = value
            .payment_status()
            .map(|status| status.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            uuid: value.uuid,
            order_id: value.order_id,
            amount: value.amount,
            status,
            payment_link: value.payment_link,
            transaction_id: value.transaction_id,
            paid_at: value.paid_at,
            va_number: value.va_number,
            bank: value.bank,
            invoice_link: value.invoice_link,
            acquirer: value.acquirer,
            description: value.description,
            expired_at: value.expired_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}
