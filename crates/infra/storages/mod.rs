pub mod invoice_storage;
pub mod s3;
