use anyhow::Context;
use pricelist_service::{
    build_router, init_state,
    infrastructure::{Config, Logger},
};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 配置和日志初始化之前还没有订阅者，错误直接输出到 stderr
    let config = Config::load(std::env::args().skip(1)).context("failed to load configuration")?;
    let _log_guard = Logger::init(&config.logging)?;

    info!("启动价格表服务...");

    let state = init_state(&config).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        e
    })?;

    let app = build_router(state);

    let listener = TcpListener::bind((config.server.bind_address.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "cannot bind {}:{}",
                config.server.bind_address, config.server.port
            )
        })?;
    let addr = listener.local_addr()?;

    info!("🚀 Price list service running on http://{}", addr);
    info!("📖 Endpoints:");
    info!("   GET    /price/:distributorId         - Read price list (?skip=&limit=)");
    info!("   POST   /price/:distributorId/upload  - Replace price list (multipart field `scv`)");
    info!("   GET    /health                       - Health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
