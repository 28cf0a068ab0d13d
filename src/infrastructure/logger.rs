//! 日志基础设施

use anyhow::{Context, Result};
use std::io;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::config::LoggingConfig;

pub struct Logger;

impl Logger {
    /// 初始化全局日志
    ///
    /// `RUST_LOG` 存在时覆盖配置中的级别。配置了 `log_dir` 时同时写入按天滚动的文件，
    /// 返回的 guard 必须在进程存活期间一直持有，否则文件日志会丢失。
    pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&config.level)
                .with_context(|| format!("invalid log level: {}", config.level))?,
        };

        let console = fmt::layer().with_writer(io::stdout).with_target(false);

        match &config.log_dir {
            Some(log_dir) => {
                std::fs::create_dir_all(log_dir)
                    .with_context(|| format!("cannot create log dir {}", log_dir.display()))?;

                let file_appender = rolling::daily(log_dir, &config.file_prefix);
                let (writer, guard) = non_blocking(file_appender);

                tracing_subscriber::registry()
                    .with(filter)
                    .with(console)
                    .with(
                        fmt::layer()
                            .with_writer(writer)
                            .with_ansi(false)
                            .with_thread_names(true),
                    )
                    .try_init()?;

                Ok(Some(guard))
            }
            None => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(console)
                    .try_init()?;

                Ok(None)
            }
        }
    }
}
