//! 配置加载
//!
//! 优先级从低到高：内置默认值 → TOML 配置文件 → 环境变量 → 命令行参数。
//! 数据库连接串没有默认值，缺失时启动失败。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use validator::{Validate, ValidationError};

/// 配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "PRICELIST_CONFIG";
pub const DATABASE_URL_ENV: &str = "PRICELIST_DATABASE_URL";
pub const BIND_ENV: &str = "PRICELIST_BIND";
pub const PORT_ENV: &str = "PRICELIST_PORT";

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config.toml", "./config/config.toml"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub database: DatabaseConfig,
    pub upload: UploadConfig,
    #[validate(nested)]
    pub logging: LoggingConfig,
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    #[validate(length(min = 1, message = "bind address must not be empty"))]
    pub bind_address: String,
    #[validate(range(min = 1, message = "port must be greater than 0"))]
    pub port: u16,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_pool_size"))]
pub struct DatabaseConfig {
    /// `mysql://…`、`sqlite:…`，或 `user:password@tcp(host:port)/database` 形式的 DSN
    #[validate(custom(function = "validate_database_url"))]
    pub url: String,
    #[validate(range(min = 1, message = "max_connections must be greater than 0"))]
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: Option<u64>,
    pub max_lifetime_secs: Option<u64>,
    /// 启动时执行 `CREATE TABLE IF NOT EXISTS`
    pub create_schema: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// 为真时，删除和全部插入在同一个事务中完成，任何失败整体回滚
    pub atomic: bool,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或 EnvFilter 表达式，`RUST_LOG` 优先
    #[validate(length(min = 1))]
    pub level: String,
    /// 设置后额外写入按天滚动的日志文件
    pub log_dir: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 80,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 20,
            min_connections: 1,
            acquire_timeout_secs: 8,
            idle_timeout_secs: Some(600),
            max_lifetime_secs: Some(1800),
            create_schema: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            file_prefix: "pricelist".to_string(),
        }
    }
}

fn validate_database_url(url: &str) -> Result<(), ValidationError> {
    if url.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some(
            format!(
                "database connection string is required (use -conn, {} or [database].url)",
                DATABASE_URL_ENV
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

fn validate_pool_size(config: &DatabaseConfig) -> Result<(), ValidationError> {
    if config.min_connections > config.max_connections {
        let mut err = ValidationError::new("pool_size");
        err.message = Some("min_connections must not exceed max_connections".into());
        return Err(err);
    }
    Ok(())
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// 命令行参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub conn: Option<String>,
    pub config_path: Option<PathBuf>,
    pub port: Option<u16>,
}

impl CliArgs {
    /// 解析参数（不含程序名）。`-conn` 与 `--conn` 等价，也接受 `--conn=…`
    pub fn parse<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut cli = CliArgs::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
                None => (arg, None),
            };
            let flag = flag.trim_start_matches('-').to_string();

            let mut value = || {
                inline
                    .clone()
                    .or_else(|| args.next())
                    .ok_or_else(|| ConfigError::InvalidArgument(format!("missing value for -{}", flag)))
            };

            match flag.as_str() {
                "conn" => cli.conn = Some(value()?),
                "config" => cli.config_path = Some(PathBuf::from(value()?)),
                "port" => {
                    let raw = value()?;
                    let port = raw
                        .parse()
                        .map_err(|_| ConfigError::InvalidArgument(format!("invalid port: {}", raw)))?;
                    cli.port = Some(port);
                }
                other => {
                    return Err(ConfigError::InvalidArgument(format!(
                        "unknown argument: {}",
                        other
                    )))
                }
            }
        }

        Ok(cli)
    }
}

impl Config {
    /// 从配置文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::FileRead {
            path: path.as_ref().to_path_buf(),
            source,
        })?;

        Ok(toml::from_str(&content)?)
    }

    /// 按进程的命令行和环境变量加载并校验配置
    pub fn load<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let cli = CliArgs::parse(args)?;
        Self::resolve(&cli, |key| std::env::var(key).ok())
    }

    /// 合并各配置来源，`env` 用于读取环境变量
    pub fn resolve<F>(cli: &CliArgs, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = cli
            .config_path
            .clone()
            .or_else(|| env(CONFIG_PATH_ENV).map(PathBuf::from))
            .or_else(|| {
                DEFAULT_CONFIG_PATHS
                    .iter()
                    .map(PathBuf::from)
                    .find(|path| path.exists())
            });

        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Config::default(),
        };

        if let Some(url) = env(DATABASE_URL_ENV) {
            config.database.url = url;
        }
        if let Some(bind) = env(BIND_ENV) {
            config.server.bind_address = bind;
        }
        if let Some(port) = env(PORT_ENV) {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidArgument(format!("{}={}", PORT_ENV, port)))?;
        }

        if let Some(conn) = &cli.conn {
            config.database.url = conn.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        config.validate()?;
        Ok(config)
    }
}
