use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::usecases::dispatch_outbox::DispatchOutboxUseCase;

/// Drains the outbox in batches until `shutdown` fires. A batch that
/// published `batch_size` events is followed immediately by the next one;
/// otherwise the loop sleeps for `poll_interval`.
pub async fn run_worker_loop(
    usecase: Arc<DispatchOutboxUseCase>,
    batch_size: i64,
    poll_interval: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    info!(batch_size, "outbox_dispatch: starting worker loop");

    while !shutdown.is_cancelled() {
        let backlog = match usecase.dispatch_batch(batch_size).await {
            Ok(result) => result.published as i64 >= batch_size,
            Err(e) => {
                error!(error = ?e, "outbox_dispatch: failed to claim events");
                false
            }
        };

        if backlog {
            continue;
        }

        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }

    info!("outbox_dispatch: worker loop stopped");
    Ok(())
}
