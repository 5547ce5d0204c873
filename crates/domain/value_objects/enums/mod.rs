pub mod event_deliveries;
pub mod payment_statuses;
