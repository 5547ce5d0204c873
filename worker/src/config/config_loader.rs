use anyhow::{Context, Result};

use super::config_model::{Database, DotEnvyConfig, Kafka, Outbox};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

pub(crate) fn load_from<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let database = Database {
        url: value("DATABASE_URL").context("DATABASE_URL is invalid")?,
        max_connections: value("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS is invalid")?,
    };

    let kafka = Kafka {
        rest_url: value("KAFKA_REST_URL").context("KAFKA_REST_URL is invalid")?,
    };

    let outbox = Outbox {
        poll_interval_secs: value("OUTBOX_POLL_INTERVAL_SECS")
            .unwrap_or_else(|| "5".to_string())
            .parse()
            .context("OUTBOX_POLL_INTERVAL_SECS is invalid")?,
        batch_size: value("OUTBOX_BATCH_SIZE")
            .unwrap_or_else(|| "50".to_string())
            .parse()
            .context("OUTBOX_BATCH_SIZE is invalid")?,
        max_attempts: value("OUTBOX_MAX_ATTEMPTS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("OUTBOX_MAX_ATTEMPTS is invalid")?,
        retry_backoff_secs: value("OUTBOX_RETRY_BACKOFF_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .context("OUTBOX_RETRY_BACKOFF_SECS is invalid")?,
    };

    Ok(DotEnvyConfig {
        database,
        kafka,
        outbox,
    })
}
