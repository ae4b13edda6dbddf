pub mod config;
pub mod constants;
pub mod engine;
pub mod ledger;
pub mod rng;
pub mod scheduler;
pub mod server_protocol;
pub mod server_utils;
pub mod session_store;
pub mod types;
