pub mod payment_outbox;
pub mod payments;
