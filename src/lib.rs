pub mod cli;
pub mod db;
pub mod error;
pub mod inspector;
pub mod models;
pub mod server;
pub mod transform;
