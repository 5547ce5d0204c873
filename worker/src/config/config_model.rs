#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub database: Database,
    pub kafka: Kafka,
    pub outbox: Outbox,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Kafka {
    pub rest_url: String,
}

#[derive(Debug, Clone)]
pub struct Outbox {
    pub poll_interval_secs: u64,
    pub batch_size: i64,
    pub max_attempts: i32,
    pub retry_backoff_secs: u32,
}
