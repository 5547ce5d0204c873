use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{
    payment_histories::{InsertPaymentHistoryEntity, PaymentHistoryEntity},
    payment_outbox::InsertOutboxEventEntity,
    payments::{InsertPaymentEntity, PaymentEntity, PaymentTransitionChangeset},
};

/// Returned by `insert_payment` when another payment already holds the order
/// id or uuid.
#[derive(Debug, Error)]
#[error("payment for order {0} already exists")]
pub struct DuplicatePayment(pub String);

#[automock]
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Opens a store transaction. Dropping the returned unit of work without
    /// committing rolls it back.
    async fn begin(&self) -> Result<Box<dyn PaymentUnitOfWork>>;
    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<PaymentEntity>>;
    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<PaymentEntity>>;
    async fn list_payments(&self, limit: i64, offset: i64) -> Result<(Vec<PaymentEntity>, i64)>;
    async fn list_history(&self, payment_id: i64) -> Result<Vec<PaymentHistoryEntity>>;
}

/// Statements that run inside one store transaction.
#[automock]
#[async_trait]
pub trait PaymentUnitOfWork: Send {
    async fn insert_payment(&mut self, payment: InsertPaymentEntity) -> Result<PaymentEntity>;

    /// Reads the payment for `order_id` and holds a row lock on it until the
    /// transaction ends.
    async fn lock_by_order_id(&mut self, order_id: &str) -> Result<Option<PaymentEntity>>;

    /// Applies `changes` only while the row is still Pending. `None` means a
    /// concurrent writer already moved it.
    async fn apply_transition(
        &mut self,
        payment_id: i64,
        changes: PaymentTransitionChangeset,
    ) -> Result<Option<PaymentEntity>>;

    /// Writes the invoice link once; an already-set link is kept.
    async fn set_invoice_link(
        &mut self,
        payment_id: i64,
        invoice_link: &str,
    ) -> Result<PaymentEntity>;

    async fn append_history(&mut self, history: InsertPaymentHistoryEntity) -> Result<()>;
    async fn enqueue_outbox(&mut self, event: InsertOutboxEventEntity) -> Result<i64>;
    async fn commit(&mut self) -> Result<()>;
    async fn rollback(&mut self) -> Result<()>;
}
