use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message published to the payment topic after a status transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEventMessage {
    pub event: PaymentEventName,
    pub metadata: PaymentEventMetadata,
    pub body: PaymentEventBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentEventName {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEventMetadata {
    pub sender: String,
    pub sending_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentEventBody {
    #[serde(rename = "type")]
    pub type_: String,
    pub data: PaymentEventData,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEventData {
    pub order_id: String,
    pub payment_uuid: Uuid,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub expired_at: DateTime<Utc>,
}
