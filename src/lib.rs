pub mod config;
pub mod modules;
pub mod services;

pub use config::{Config, ConfigError};
pub use services::supervisor::{shutdown_signal, AppError, Supervisor};
