pub mod config;
pub mod usecases;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::FixedOffset;
use crates::{
    infra::{
        db::{postgres::postgres_connection, repositories::payments::PaymentPostgres},
        publishers::kafka_rest::KafkaRestPublisher,
        renderers::http_renderer::HttpInvoiceRenderer,
        storages::invoice_storage::{InvoiceStorageConfig, S3InvoiceStorage},
    },
    payments::midtrans_client::MidtransClient,
};
use tracing::info;

use config::config_model::DotEnvyConfig;
use usecases::payments::{PaymentSettings, PaymentUseCase};

/// The orchestrator wired to its production collaborators.
pub type PaymentService = PaymentUseCase<
    PaymentPostgres,
    MidtransClient,
    HttpInvoiceRenderer,
    S3InvoiceStorage,
    KafkaRestPublisher,
>;

pub fn payment_settings(config: &DotEnvyConfig) -> Result<PaymentSettings> {
    let invoice_offset = config
        .invoice
        .utc_offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .context("INVOICE_UTC_OFFSET_HOURS is out of range")?;

    Ok(PaymentSettings {
        topic: config.kafka.topic.clone(),
        sender: config.kafka.sender.clone(),
        invoice_template_id: config.invoice.template_id.clone(),
        invoice_offset,
        workflow_timeout: Duration::from_secs(config.workflow.timeout_secs),
        event_delivery: config.workflow.event_delivery,
    })
}

/// Builds every collaborator once from `config` and hands them to the
/// orchestrator.
pub async fn build_payment_service(config: &DotEnvyConfig) -> Result<PaymentService> {
    let settings = payment_settings(config)?;

    let postgres_pool =
        postgres_connection::establish_connection(&config.database.url, config.database.max_connections)?;
    info!("Postgres connection has been established");

    let gateway = MidtransClient::new(
        config.midtrans.server_key.clone(),
        config.midtrans.is_production,
    )
    .context("failed to build midtrans client")?;

    let renderer = HttpInvoiceRenderer::new(config.invoice.render_url.clone())?;

    let storage = S3InvoiceStorage::new(InvoiceStorageConfig {
        endpoint: config.invoice_storage.endpoint.clone(),
        region: config.invoice_storage.region.clone(),
        bucket: config.invoice_storage.bucket.clone(),
        access_key_id: config.invoice_storage.access_key_id.clone(),
        secret_access_key: config.invoice_storage.secret_access_key.clone(),
        public_base_url: config.invoice_storage.public_base_url.clone(),
        prefix: config.invoice_storage.prefix.clone(),
    })
    .await?;

    let publisher = KafkaRestPublisher::new(config.kafka.rest_url.clone())?;

    info!(
        event_delivery = %settings.event_delivery,
        topic = %settings.topic,
        "Payment service has been assembled"
    );

    Ok(PaymentUseCase::new(
        Arc::new(PaymentPostgres::new(Arc::new(postgres_pool))),
        Arc::new(gateway),
        Arc::new(renderer),
        Arc::new(storage),
        Arc::new(publisher),
        settings,
    ))
}
