use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    OptionalExtension, PgConnection, RunQueryDsl,
    connection::{AnsiTransactionManager, TransactionManager},
    insert_into,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
    update,
};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::{PgPoolSquad, PgPooledConnection},
        schema::{payment_histories, payment_outbox, payments},
    },
};
use domain::{
    entities::{
        payment_histories::{InsertPaymentHistoryEntity, PaymentHistoryEntity},
        payment_outbox::InsertOutboxEventEntity,
        payments::{InsertPaymentEntity, PaymentEntity, PaymentTransitionChangeset},
    },
    repositories::payments::{DuplicatePayment, PaymentRepository, PaymentUnitOfWork},
    value_objects::enums::payment_statuses::PaymentStatus,
};

type PgTransactionManager = AnsiTransactionManager;

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn begin(&self) -> Result<Box<dyn PaymentUnitOfWork>> {
        let conn = Arc::clone(&self.db_pool).get()?;
        let unit_of_work = PaymentPostgresUnitOfWork::begin(conn)?;
        Ok(Box::new(unit_of_work))
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payment = payments::table
            .filter(payments::uuid.eq(uuid))
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()?;

        Ok(payment)
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payment = payments::table
            .filter(payments::order_id.eq(order_id))
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()?;

        Ok(payment)
    }

    async fn list_payments(&self, limit: i64, offset: i64) -> Result<(Vec<PaymentEntity>, i64)> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let total = payments::table.count().get_result::<i64>(&mut conn)?;
        let results = payments::table
            .select(PaymentEntity::as_select())
            .order((payments::created_at.desc(), payments::id.desc()))
            .limit(limit)
            .offset(offset)
            .load::<PaymentEntity>(&mut conn)?;

        Ok((results, total))
    }

    async fn list_history(&self, payment_id: i64) -> Result<Vec<PaymentHistoryEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = payment_histories::table
            .filter(payment_histories::payment_id.eq(payment_id))
            .select(PaymentHistoryEntity::as_select())
            .order(payment_histories::id.asc())
            .load::<PaymentHistoryEntity>(&mut conn)?;

        Ok(results)
    }
}

/// One Postgres transaction pinned to a pooled connection. The transaction is
/// opened on construction and rolled back on drop unless it was committed.
pub struct PaymentPostgresUnitOfWork {
    conn: PgPooledConnection,
    open: bool,
}

impl PaymentPostgresUnitOfWork {
    fn begin(mut conn: PgPooledConnection) -> Result<Self> {
        <PgTransactionManager as TransactionManager<PgConnection>>::begin_transaction(&mut *conn)?;
        Ok(Self { conn, open: true })
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.open {
            bail!("payment unit of work is already finished");
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentUnitOfWork for PaymentPostgresUnitOfWork {
    async fn insert_payment(&mut self, payment: InsertPaymentEntity) -> Result<PaymentEntity> {
        self.ensure_open()?;

        let inserted = insert_into(payments::table)
            .values(&payment)
            .returning(PaymentEntity::as_select())
            .get_result::<PaymentEntity>(&mut *self.conn);

        match inserted {
            Ok(inserted) => Ok(inserted),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(DuplicatePayment(payment.order_id).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn lock_by_order_id(&mut self, order_id: &str) -> Result<Option<PaymentEntity>> {
        self.ensure_open()?;

        let payment = payments::table
            .filter(payments::order_id.eq(order_id))
            .select(PaymentEntity::as_select())
            .for_update()
            .first::<PaymentEntity>(&mut *self.conn)
            .optional()?;

        Ok(payment)
    }

    async fn apply_transition(
        &mut self,
        payment_id: i64,
        changes: PaymentTransitionChangeset,
    ) -> Result<Option<PaymentEntity>> {
        self.ensure_open()?;

        // The status guard turns a concurrent terminal write into a zero-row update.
        let updated = update(
            payments::table
                .filter(payments::id.eq(payment_id))
                .filter(payments::status.eq(PaymentStatus::Pending.code())),
        )
        .set(changes)
        .returning(PaymentEntity::as_select())
        .get_result::<PaymentEntity>(&mut *self.conn)
        .optional()?;

        Ok(updated)
    }

    async fn set_invoice_link(
        &mut self,
        payment_id: i64,
        invoice_link: &str,
    ) -> Result<PaymentEntity> {
        self.ensure_open()?;

        update(
            payments::table
                .filter(payments::id.eq(payment_id))
                .filter(payments::invoice_link.is_null()),
        )
        .set((
            payments::invoice_link.eq(Some(invoice_link)),
            payments::updated_at.eq(Utc::now()),
        ))
        .execute(&mut *self.conn)?;

        let payment = payments::table
            .find(payment_id)
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut *self.conn)?;

        Ok(payment)
    }

    async fn append_history(&mut self, history: InsertPaymentHistoryEntity) -> Result<()> {
        self.ensure_open()?;

        insert_into(payment_histories::table)
            .values(&history)
            .execute(&mut *self.conn)?;

        Ok(())
    }

    async fn enqueue_outbox(&mut self, event: InsertOutboxEventEntity) -> Result<i64> {
        self.ensure_open()?;

        let event_id = insert_into(payment_outbox::table)
            .values(&event)
            .returning(payment_outbox::id)
            .get_result::<i64>(&mut *self.conn)?;

        Ok(event_id)
    }

    async fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.open = false;

        <PgTransactionManager as TransactionManager<PgConnection>>::commit_transaction(
            &mut *self.conn,
        )?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;

        <PgTransactionManager as TransactionManager<PgConnection>>::rollback_transaction(
            &mut *self.conn,
        )?;
        Ok(())
    }
}

impl Drop for PaymentPostgresUnitOfWork {
    fn drop(&mut self) {
        if !self.open {
            return;
        }

        warn!("payments: unit of work dropped before commit, rolling back");
        if let Err(err) =
            <PgTransactionManager as TransactionManager<PgConnection>>::rollback_transaction(
                &mut *self.conn,
            )
        {
            error!(db_error = ?err, "payments: rollback on drop failed");
        }
    }
}
