use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{
    entities::{
        payment_histories::{InsertPaymentHistoryEntity, PaymentHistoryEntity},
        payment_outbox::{InsertOutboxEventEntity, OutboxEventEntity},
        payments::{InsertPaymentEntity, PaymentEntity, PaymentTransitionChangeset},
    },
    repositories::{
        payment_outbox::OutboxRepository,
        payments::{DuplicatePayment, PaymentRepository, PaymentUnitOfWork},
    },
    value_objects::enums::payment_statuses::PaymentStatus,
};

#[derive(Debug, Default, Clone)]
struct PaymentState {
    payments: BTreeMap<i64, PaymentEntity>,
    histories: Vec<PaymentHistoryEntity>,
    outbox: BTreeMap<i64, OutboxEventEntity>,
    last_payment_id: i64,
    last_history_id: i64,
    last_outbox_id: i64,
}

/// A process-local payment store with the same transactional contract as the
/// Postgres one.
///
/// A unit of work holds the store lock for its whole lifetime and mutates a
/// private copy of the state, which replaces the shared state only on commit.
/// Transactions are therefore fully serialized, and dropping an unfinished
/// unit of work discards everything it wrote.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    state: Arc<Mutex<PaymentState>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next commit fail and roll back.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    pub async fn outbox_events(&self) -> Vec<OutboxEventEntity> {
        let state = self.state.lock().await;
        state.outbox.values().cloned().collect()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentStore {
    async fn begin(&self) -> Result<Box<dyn PaymentUnitOfWork>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();

        Ok(Box::new(InMemoryUnitOfWork {
            guard: Some(guard),
            working,
            fail_next_commit: Arc::clone(&self.fail_next_commit),
        }))
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<PaymentEntity>> {
        let state = self.state.lock().await;
        Ok(state.payments.values().find(|p| p.uuid == uuid).cloned())
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<PaymentEntity>> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .values()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn list_payments(&self, limit: i64, offset: i64) -> Result<(Vec<PaymentEntity>, i64)> {
        let state = self.state.lock().await;
        let total = state.payments.len() as i64;
        let results = state
            .payments
            .values()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((results, total))
    }

    async fn list_history(&self, payment_id: i64) -> Result<Vec<PaymentHistoryEntity>> {
        let state = self.state.lock().await;
        Ok(state
            .histories
            .iter()
            .filter(|h| h.payment_id == payment_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OutboxRepository for InMemoryPaymentStore {
    async fn claim_pending(
        &self,
        limit: i64,
        max_attempts: i32,
        lease: Duration,
    ) -> Result<Vec<OutboxEventEntity>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let claimed = state
            .outbox
            .values_mut()
            .filter(|event| event.published_at.is_none())
            .filter(|event| event.attempts < max_attempts)
            .filter(|event| event.locked_until.is_none_or(|until| until <= now))
            .take(limit.max(0) as usize)
            .map(|event| {
                event.locked_until = Some(now + lease);
                event.clone()
            })
            .collect();

        Ok(claimed)
    }

    async fn mark_published(&self, event_id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        let event = state
            .outbox
            .get_mut(&event_id)
            .ok_or_else(|| anyhow!("outbox event {event_id} not found"))?;

        event.published_at = Some(Utc::now());
        event.locked_until = None;
        Ok(())
    }

    async fn mark_failed(
        &self,
        event_id: i64,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let event = state
            .outbox
            .get_mut(&event_id)
            .ok_or_else(|| anyhow!("outbox event {event_id} not found"))?;

        event.attempts += 1;
        event.last_error = Some(error.to_string());
        event.locked_until = Some(retry_at);
        Ok(())
    }
}

struct InMemoryUnitOfWork {
    guard: Option<OwnedMutexGuard<PaymentState>>,
    working: PaymentState,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryUnitOfWork {
    fn ensure_open(&self) -> Result<()> {
        if self.guard.is_none() {
            bail!("payment unit of work is already finished");
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentUnitOfWork for InMemoryUnitOfWork {
    async fn insert_payment(&mut self, payment: InsertPaymentEntity) -> Result<PaymentEntity> {
        self.ensure_open()?;

        let duplicate = self
            .working
            .payments
            .values()
            .any(|p| p.order_id == payment.order_id || p.uuid == payment.uuid);
        if duplicate {
            return Err(DuplicatePayment(payment.order_id).into());
        }

        self.working.last_payment_id += 1;
        let now = Utc::now();
        let entity = PaymentEntity {
            id: self.working.last_payment_id,
            uuid: payment.uuid,
            order_id: payment.order_id,
            amount: payment.amount,
            status: payment.status,
            payment_link: payment.payment_link,
            transaction_id: None,
            va_number: None,
            bank: None,
            acquirer: None,
            invoice_link: None,
            description: payment.description,
            paid_at: None,
            expired_at: payment.expired_at,
            created_at: now,
            updated_at: now,
        };
        self.working.payments.insert(entity.id, entity.clone());

        Ok(entity)
    }

    async fn lock_by_order_id(&mut self, order_id: &str) -> Result<Option<PaymentEntity>> {
        self.ensure_open()?;
        Ok(self
            .working
            .payments
            .values()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn apply_transition(
        &mut self,
        payment_id: i64,
        changes: PaymentTransitionChangeset,
    ) -> Result<Option<PaymentEntity>> {
        self.ensure_open()?;

        let Some(payment) = self.working.payments.get_mut(&payment_id) else {
            return Ok(None);
        };
        if payment.status != PaymentStatus::Pending.code() {
            return Ok(None);
        }

        payment.status = changes.status;
        if changes.transaction_id.is_some() {
            payment.transaction_id = changes.transaction_id;
        }
        if changes.paid_at.is_some() {
            payment.paid_at = changes.paid_at;
        }
        if changes.va_number.is_some() {
            payment.va_number = changes.va_number;
        }
        if changes.bank.is_some() {
            payment.bank = changes.bank;
        }
        if changes.acquirer.is_some() {
            payment.acquirer = changes.acquirer;
        }
        payment.updated_at = changes.updated_at;

        Ok(Some(payment.clone()))
    }

    async fn set_invoice_link(
        &mut self,
        payment_id: i64,
        invoice_link: &str,
    ) -> Result<PaymentEntity> {
        self.ensure_open()?;

        let payment = self
            .working
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| anyhow!("payment {payment_id} not found"))?;
        if payment.invoice_link.is_none() {
            payment.invoice_link = Some(invoice_link.to_string());
            payment.updated_at = Utc::now();
        }

        Ok(payment.clone())
    }

    async fn append_history(&mut self, history: InsertPaymentHistoryEntity) -> Result<()> {
        self.ensure_open()?;

        self.working.last_history_id += 1;
        self.working.histories.push(PaymentHistoryEntity {
            id: self.working.last_history_id,
            payment_id: history.payment_id,
            status: history.status,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn enqueue_outbox(&mut self, event: InsertOutboxEventEntity) -> Result<i64> {
        self.ensure_open()?;

        self.working.last_outbox_id += 1;
        let id = self.working.last_outbox_id;
        self.working.outbox.insert(
            id,
            OutboxEventEntity {
                id,
                topic: event.topic,
                payload: event.payload,
                attempts: 0,
                last_error: None,
                locked_until: None,
                published_at: None,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn commit(&mut self) -> Result<()> {
        let mut guard = self
            .guard
            .take()
            .ok_or_else(|| anyhow!("payment unit of work is already finished"))?;

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            bail!("could not serialize access due to concurrent update");
        }

        *guard = std::mem::take(&mut self.working);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.guard = None;
        Ok(())
    }
}
