pub mod kafka_rest;
