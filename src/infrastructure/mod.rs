//! 基础设施层：配置、日志、数据库连接

pub mod config;
pub mod database;
pub mod logger;

pub use config::{Config, ConfigError};
pub use database::DatabaseManager;
pub use logger::Logger;
