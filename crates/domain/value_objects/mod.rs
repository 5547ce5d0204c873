pub mod enums;
pub mod expiry_window;
pub mod invoices;
pub mod pagination;
pub mod payment_events;
pub mod payments;
