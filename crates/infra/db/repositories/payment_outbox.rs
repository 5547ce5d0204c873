use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use diesel::{Connection, RunQueryDsl, prelude::*, update};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payment_outbox},
};
use domain::{
    entities::payment_outbox::OutboxEventEntity, repositories::payment_outbox::OutboxRepository,
};

pub struct OutboxPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl OutboxPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl OutboxRepository for OutboxPostgres {
    async fn claim_pending(
        &self,
        limit: i64,
        max_attempts: i32,
        lease: Duration,
    ) -> Result<Vec<OutboxEventEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let current_time = Utc::now();

        let events = conn.transaction::<Vec<OutboxEventEntity>, diesel::result::Error, _>(|conn| {
            let candidate_ids: Vec<i64> = payment_outbox::table
                .select(payment_outbox::id)
                .filter(payment_outbox::published_at.is_null())
                .filter(payment_outbox::attempts.lt(max_attempts))
                .filter(
                    payment_outbox::locked_until
                        .is_null()
                        .or(payment_outbox::locked_until.le(current_time)),
                )
                .order(payment_outbox::created_at.asc())
                .limit(limit)
                .for_update()
                .skip_locked()
                .load::<i64>(conn)?;

            if candidate_ids.is_empty() {
                return Ok(Vec::new());
            }

            update(payment_outbox::table.filter(payment_outbox::id.eq_any(candidate_ids)))
                .set(payment_outbox::locked_until.eq(Some(current_time + lease)))
                .returning(OutboxEventEntity::as_select())
                .get_results::<OutboxEventEntity>(conn)
        })?;

        Ok(events)
    }

    async fn mark_published(&self, event_id: i64) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(payment_outbox::table.find(event_id))
            .set((
                payment_outbox::published_at.eq(Some(Utc::now())),
                payment_outbox::locked_until.eq::<Option<DateTime<Utc>>>(None),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        event_id: i64,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(payment_outbox::table.find(event_id))
            .set((
                payment_outbox::attempts.eq(payment_outbox::attempts + 1),
                payment_outbox::last_error.eq(Some(error)),
                payment_outbox::locked_until.eq(Some(retry_at)),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
