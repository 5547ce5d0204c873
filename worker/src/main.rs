use anyhow::Result;
use crates::domain::repositories::{
    event_publisher::EventPublisher, payment_outbox::OutboxRepository,
};
use crates::infra::{
    db::{postgres::postgres_connection, repositories::payment_outbox::OutboxPostgres},
    publishers::kafka_rest::KafkaRestPublisher,
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use worker::{
    config, services::worker_loop, usecases::dispatch_outbox::DispatchOutboxUseCase,
};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("payment-outbox-worker")?;

    let dotenvy_env = config::config_loader::load()?;
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("Postgres connection has been established");

    let outbox_repository: Arc<dyn OutboxRepository + Send + Sync> =
        Arc::new(OutboxPostgres::new(Arc::new(postgres_pool)));
    let publisher: Arc<dyn EventPublisher + Send + Sync> =
        Arc::new(KafkaRestPublisher::new(dotenvy_env.kafka.rest_url.clone())?);

    let poll_interval = Duration::from_secs(dotenvy_env.outbox.poll_interval_secs);
    // A claimed event stays hidden from other workers for a few poll cycles.
    let lease = chrono::Duration::seconds((dotenvy_env.outbox.poll_interval_secs as i64 * 6).max(30));

    let usecase = Arc::new(DispatchOutboxUseCase::new(
        outbox_repository,
        publisher,
        dotenvy_env.outbox.max_attempts,
        lease,
        chrono::Duration::seconds(i64::from(dotenvy_env.outbox.retry_backoff_secs)),
    ));

    let shutdown = CancellationToken::new();
    let dispatch_loop = tokio::spawn(worker_loop::run_worker_loop(
        usecase,
        dotenvy_env.outbox.batch_size,
        poll_interval,
        shutdown.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    shutdown.cancel();

    dispatch_loop.await??;
    Ok(())
}
