pub mod invoices;
pub mod payment_events;
pub mod payments;
