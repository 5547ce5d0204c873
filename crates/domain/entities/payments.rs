use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::payment_statuses::PaymentStatus,
    infra::db::postgres::schema::payments,
};

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payments)]
pub struct PaymentEntity {
    pub id: i64,
    pub uuid: Uuid,
    pub order_id: String,
    pub amount: i64,
    pub status: i16,
    pub payment_link: String,
    pub transaction_id: Option<String>,
    pub va_number: Option<String>,
    pub bank: Option<String>,
    pub acquirer: Option<String>,
    pub invoice_link: Option<String>,
    pub description: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expired_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentEntity {
    /// Decodes the stored numeric status. `None` means the row carries a code
    /// this service does not know about.
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        PaymentStatus::from_code(self.status)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payments)]
pub struct InsertPaymentEntity {
    pub uuid: Uuid,
    pub order_id: String,
    pub amount: i64,
    pub status: i16,
    pub payment_link: String,
    pub description: Option<String>,
    pub expired_at: DateTime<Utc>,
}

/// Columns written by a terminal transition. `None` fields are left untouched,
/// which keeps settlement metadata write-once.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = payments)]
pub struct PaymentTransitionChangeset {
    pub status: i16,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub va_number: Option<String>,
    pub bank: Option<String>,
    pub acquirer: Option<String>,
    pub updated_at: DateTime<Utc>,
}
