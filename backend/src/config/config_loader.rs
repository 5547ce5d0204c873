use anyhow::{Context, Result, anyhow};
use crates::domain::value_objects::enums::event_deliveries::EventDelivery;

use super::config_model::{
    Database, DotEnvyConfig, Invoice, InvoiceStorage, Kafka, Midtrans, Workflow,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

pub(crate) fn load_from<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str| -> Result<String> {
        lookup(key)
            .filter(|value| !value.trim().is_empty())
            .with_context(|| format!("{key} is invalid"))
    };
    let optional = |key: &str, default: &str| -> String {
        lookup(key)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: optional("DATABASE_MAX_CONNECTIONS", "10")
            .parse()
            .context("DATABASE_MAX_CONNECTIONS is invalid")?,
    };

    let midtrans = Midtrans {
        server_key: required("MIDTRANS_SERVER_KEY")?,
        is_production: optional("MIDTRANS_IS_PRODUCTION", "false")
            .parse()
            .context("MIDTRANS_IS_PRODUCTION is invalid")?,
    };

    let invoice = Invoice {
        render_url: required("INVOICE_RENDER_URL")?,
        template_id: optional("INVOICE_TEMPLATE_ID", "invoice"),
        utc_offset_hours: optional("INVOICE_UTC_OFFSET_HOURS", "7")
            .parse()
            .context("INVOICE_UTC_OFFSET_HOURS is invalid")?,
    };

    let invoice_storage = InvoiceStorage {
        endpoint: required("INVOICE_STORAGE_ENDPOINT")?,
        region: required("INVOICE_STORAGE_REGION")?,
        bucket: required("INVOICE_STORAGE_BUCKET")?,
        access_key_id: required("INVOICE_STORAGE_ACCESS_KEY_ID")?,
        secret_access_key: required("INVOICE_STORAGE_SECRET_ACCESS_KEY")?,
        public_base_url: optional("INVOICE_STORAGE_PUBLIC_BASE_URL", ""),
        prefix: optional("INVOICE_STORAGE_PREFIX", "invoices"),
    };

    let kafka = Kafka {
        rest_url: required("KAFKA_REST_URL")?,
        topic: required("KAFKA_TOPIC")?,
        sender: optional("EVENT_SENDER", "payment-service"),
    };

    let event_delivery_raw = optional("EVENT_DELIVERY", EventDelivery::Direct.as_str());
    let workflow = Workflow {
        timeout_secs: optional("PAYMENT_WORKFLOW_TIMEOUT_SECS", "30")
            .parse()
            .context("PAYMENT_WORKFLOW_TIMEOUT_SECS is invalid")?,
        event_delivery: event_delivery_raw
            .parse::<EventDelivery>()
            .map_err(|err| anyhow!("EVENT_DELIVERY is invalid: {err}"))?,
    };

    Ok(DotEnvyConfig {
        database,
        midtrans,
        invoice,
        invoice_storage,
        kafka,
        workflow,
    })
}
