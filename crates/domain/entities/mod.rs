pub mod payment_histories;
pub mod payment_outbox;
pub mod payments;
