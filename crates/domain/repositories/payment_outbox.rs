use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mockall::automock;

use crate::domain::entities::payment_outbox::OutboxEventEntity;

#[automock]
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Leases up to `limit` unpublished events with fewer than `max_attempts`
    /// attempts. A leased event is invisible to other dispatchers until the
    /// lease runs out or it is marked.
    async fn claim_pending(
        &self,
        limit: i64,
        max_attempts: i32,
        lease: Duration,
    ) -> Result<Vec<OutboxEventEntity>>;
    async fn mark_published(&self, event_id: i64) -> Result<()>;
    /// Records a failed attempt and keeps the event out of claims until
    /// `retry_at`.
    async fn mark_failed(
        &self,
        event_id: i64,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> Result<()>;
}
