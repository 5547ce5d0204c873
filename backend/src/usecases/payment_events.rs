use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use crates::domain::{
    entities::payments::PaymentEntity,
    value_objects::{
        enums::payment_statuses::PaymentStatus,
        payment_events::{
            PaymentEventBody, PaymentEventData, PaymentEventMessage, PaymentEventMetadata,
            PaymentEventName,
        },
    },
};

const EVENT_BODY_TYPE: &str = "JSON";

/// Describes a committed transition of `payment` to `status`.
pub fn build_payment_event(
    sender: &str,
    payment: &PaymentEntity,
    status: PaymentStatus,
    sending_at: DateTime<Utc>,
) -> PaymentEventMessage {
    PaymentEventMessage {
        event: PaymentEventName {
            name: status.event_label().to_string(),
        },
        metadata: PaymentEventMetadata {
            sender: sender.to_string(),
            sending_at: sending_at.to_rfc3339(),
        },
        body: PaymentEventBody {
            type_: EVENT_BODY_TYPE.to_string(),
            data: PaymentEventData {
                order_id: payment.order_id.clone(),
                payment_uuid: payment.uuid,
                status: status.event_label().to_string(),
                paid_at: payment.paid_at,
                expired_at: payment.expired_at,
            },
        },
    }
}

pub fn encode_payment_event(message: &PaymentEventMessage) -> Result<Vec<u8>> {
    serde_json::to_vec(message).context("failed to encode payment event")
}
