//! 数据库基础设施

use sqlx::{any::AnyPoolOptions, AnyPool};
use std::time::Duration;
use tracing::info;
use url::Url;

use super::config::DatabaseConfig;

/// 连接串格式错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DsnError {
    #[error("missing database name in DSN")]
    MissingDatabase,
    #[error("unsupported DSN protocol `{0}`")]
    UnsupportedProtocol(String),
    #[error("invalid DSN address `{0}`")]
    InvalidAddress(String),
}

pub struct DatabaseManager {
    pool: AnyPool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        sqlx::any::install_default_drivers();

        let url = normalize_database_url(&config.url)
            .map_err(|e| sqlx::Error::Configuration(e.into()))?;
        info!("Connecting to database: {}", mask_password(&url));

        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .idle_timeout(config.idle_timeout_secs.map(Duration::from_secs))
            .max_lifetime(config.max_lifetime_secs.map(Duration::from_secs))
            .connect(&url)
            .await?;

        Ok(Self { pool })
    }

    pub fn into_pool(self) -> AnyPool {
        self.pool
    }
}

/// 把 `user:password@tcp(host:port)/database?params` 形式的 DSN 转成 `mysql://` URL。
/// 已经带 scheme 的连接串原样返回。
pub fn normalize_database_url(raw: &str) -> Result<String, DsnError> {
    let raw = raw.trim();
    if raw.contains("://") || raw.starts_with("sqlite:") {
        return Ok(raw.to_string());
    }

    let (head, params) = match raw.split_once('?') {
        Some((head, params)) => (head, Some(params)),
        None => (raw, None),
    };

    let (prefix, database) = head.rsplit_once('/').ok_or(DsnError::MissingDatabase)?;
    if database.is_empty() {
        return Err(DsnError::MissingDatabase);
    }

    let (credentials, net) = match prefix.rsplit_once('@') {
        Some((credentials, net)) => (Some(credentials), net),
        None => (None, prefix),
    };

    let (protocol, address) = match net.split_once('(') {
        Some((protocol, rest)) => {
            let address = rest
                .strip_suffix(')')
                .ok_or_else(|| DsnError::InvalidAddress(net.to_string()))?;
            (protocol, address)
        }
        None => (net, ""),
    };

    let mut url =
        Url::parse("mysql://localhost").map_err(|_| DsnError::InvalidAddress(net.to_string()))?;

    match protocol {
        "" | "tcp" => {
            let address = if address.is_empty() {
                "127.0.0.1:3306"
            } else {
                address
            };
            let (host, port) = match address.rsplit_once(':') {
                Some((host, port)) if !port.contains(']') => {
                    let port: u16 = port
                        .parse()
                        .map_err(|_| DsnError::InvalidAddress(address.to_string()))?;
                    (host, port)
                }
                _ => (address, 3306),
            };
            url.set_host(Some(host))
                .map_err(|_| DsnError::InvalidAddress(address.to_string()))?;
            url.set_port(Some(port))
                .map_err(|_| DsnError::InvalidAddress(address.to_string()))?;
        }
        "unix" => {
            if address.is_empty() {
                return Err(DsnError::InvalidAddress(net.to_string()));
            }
            url.query_pairs_mut().append_pair("socket", address);
        }
        other => return Err(DsnError::UnsupportedProtocol(other.to_string())),
    }

    if let Some(credentials) = credentials {
        let (user, password) = match credentials.split_once(':') {
            Some((user, password)) => (user, Some(password)),
            None => (credentials, None),
        };
        url.set_username(user)
            .map_err(|_| DsnError::InvalidAddress(net.to_string()))?;
        url.set_password(password)
            .map_err(|_| DsnError::InvalidAddress(net.to_string()))?;
    }

    url.set_path(database);

    if let Some(params) = params.filter(|p| !p.is_empty()) {
        let merged = match url.query() {
            Some(existing) => format!("{}&{}", existing, params),
            None => params.to_string(),
        };
        url.set_query(Some(&merged));
    }

    Ok(url.to_string())
}

/// 日志中隐藏密码
pub fn mask_password(database_url: &str) -> String {
    match Url::parse(database_url) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        _ => database_url.to_string(),
    }
}
