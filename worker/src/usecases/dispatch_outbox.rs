use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use crates::domain::{
    entities::payment_outbox::OutboxEventEntity,
    repositories::{event_publisher::EventPublisher, payment_outbox::OutboxRepository},
};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutboxResult {
    pub claimed: usize,
    pub published: usize,
    pub failed: usize,
    pub failed_ids: Vec<i64>,
}

/// Publishes events that the payment orchestrator left in the outbox.
/// Delivery is at-least-once: an event whose publish succeeded but whose
/// mark failed is sent again once its lease runs out. A failed event is
/// held back for `retry_backoff` times its attempt count.
pub struct DispatchOutboxUseCase {
    repository: Arc<dyn OutboxRepository + Send + Sync>,
    publisher: Arc<dyn EventPublisher + Send + Sync>,
    max_attempts: i32,
    lease: Duration,
    retry_backoff: Duration,
}

impl DispatchOutboxUseCase {
    pub fn new(
        repository: Arc<dyn OutboxRepository + Send + Sync>,
        publisher: Arc<dyn EventPublisher + Send + Sync>,
        max_attempts: i32,
        lease: Duration,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            repository,
            publisher,
            max_attempts,
            lease,
            retry_backoff,
        }
    }

    pub async fn dispatch_batch(&self, limit: i64) -> Result<DispatchOutboxResult> {
        let events = self
            .repository
            .claim_pending(limit, self.max_attempts, self.lease)
            .await?;

        let mut result = DispatchOutboxResult {
            claimed: events.len(),
            ..Default::default()
        };

        for event in events {
            match self.publish_event(&event).await {
                Ok(()) => {
                    result.published += 1;
                    if let Err(err) = self.repository.mark_published(event.id).await {
                        error!(
                            outbox_id = event.id,
                            error = ?err,
                            "outbox_dispatch: published but failed to mark event; it will be sent again"
                        );
                    }
                }
                Err(err) => {
                    result.failed += 1;
                    result.failed_ids.push(event.id);

                    let attempts = event.attempts + 1;
                    let retry_at = self
                        .retry_backoff
                        .checked_mul(attempts)
                        .and_then(|delay| Utc::now().checked_add_signed(delay))
                        .unwrap_or(DateTime::<Utc>::MAX_UTC);
                    if attempts >= self.max_attempts {
                        error!(
                            outbox_id = event.id,
                            topic = %event.topic,
                            attempts,
                            error = %err,
                            "outbox_dispatch: giving up on event"
                        );
                    } else {
                        warn!(
                            outbox_id = event.id,
                            topic = %event.topic,
                            attempts,
                            retry_at = %retry_at,
                            error = %err,
                            "outbox_dispatch: publish failed, will retry"
                        );
                    }

                    if let Err(mark_err) = self
                        .repository
                        .mark_failed(event.id, &err.to_string(), retry_at)
                        .await
                    {
                        error!(
                            outbox_id = event.id,
                            error = ?mark_err,
                            "outbox_dispatch: failed to record publish failure"
                        );
                    }
                }
            }
        }

        if result.claimed > 0 {
            info!(
                claimed = result.claimed,
                published = result.published,
                failed = result.failed,
                "outbox_dispatch: batch finished"
            );
        }

        Ok(result)
    }

    async fn publish_event(&self, event: &OutboxEventEntity) -> Result<()> {
        let message = serde_json::to_vec(&event.payload)?;
        self.publisher.publish(&event.topic, message).await
    }
}
