pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;
pub mod session;

pub use config::Config;
pub use errors::{BloodBankError, Result};
