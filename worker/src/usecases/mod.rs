pub mod dispatch_outbox;
