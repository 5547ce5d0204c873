pub mod db;
pub mod publishers;
pub mod renderers;
pub mod storages;
