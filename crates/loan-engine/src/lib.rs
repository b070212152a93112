pub mod config;
pub mod decision;
pub mod error;
pub mod telemetry;

pub use config::{AppConfig, AppEnvironment, ConfigError, EngineConfig, LogFormat};
pub use error::AppError;
