pub mod event_publisher;
pub mod invoices;
pub mod payment_gateway;
pub mod payment_outbox;
pub mod payments;
