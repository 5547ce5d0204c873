use crates::domain::value_objects::enums::event_deliveries::EventDelivery;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub database: Database,
    pub midtrans: Midtrans,
    pub invoice: Invoice,
    pub invoice_storage: InvoiceStorage,
    pub kafka: Kafka,
    pub workflow: Workflow,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Midtrans {
    pub server_key: String,
    pub is_production: bool,
}

#[derive(Debug, Clone)]
pub struct Invoice {
    pub render_url: String,
    pub template_id: String,
    pub utc_offset_hours: i32,
}

#[derive(Debug, Clone)]
pub struct InvoiceStorage {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub public_base_url: String,
    pub prefix: String,
}

#[derive(Debug, Clone)]
pub struct Kafka {
    pub rest_url: String,
    pub topic: String,
    pub sender: String,
}

#[derive(Debug, Clone)]
pub struct Workflow {
    pub timeout_secs: u64,
    pub event_delivery: EventDelivery,
}
