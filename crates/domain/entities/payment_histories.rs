use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infra::db::postgres::schema::payment_histories;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payment_histories)]
pub struct PaymentHistoryEntity {
    pub id: i64,
    pub payment_id: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payment_histories)]
pub struct InsertPaymentHistoryEntity {
    pub payment_id: i64,
    pub status: String,
}
