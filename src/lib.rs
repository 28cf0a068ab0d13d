//! # 价格表服务
//!
//! 按经销商上传制表符分隔的价格表，并分页读取：
//! - `POST /price/{distributorId}/upload`：表单字段 `scv` 中的文件整体替换该经销商的价格表
//! - `GET /price/{distributorId}?skip=&limit=`：按 `art` 升序返回 `[{Art, Count, Price}]`

pub mod app;
pub mod core;
pub mod infrastructure;
pub mod locks;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{any, get},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use app::pricelist::{
    handler::{dispatch, health_check},
    AppState, PriceListRepository, PriceListService,
};
use infrastructure::{Config, DatabaseManager};

pub use crate::core::error::CoreError;

/// 建立连接池、检查表结构并预编译语句，构造应用状态。任何一步失败都是致命的。
pub async fn init_state(config: &Config) -> Result<AppState, sqlx::Error> {
    let database = DatabaseManager::new(&config.database).await?;
    let repository = PriceListRepository::new(database.into_pool());

    if config.database.create_schema {
        repository.ensure_schema().await?;
    }
    repository.prepare_statements().await?;

    Ok(AppState {
        pricelist_service: PriceListService::new(repository, config.upload.atomic),
    })
}

/// 创建路由
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/price", any(dispatch))
        .route("/price/", any(dispatch))
        .route("/price/*rest", any(dispatch))
        // 不限制上传大小
        .layer(DefaultBodyLimit::disable())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(
                    crate::core::middleware::request_logging_middleware,
                )),
        )
        .with_state(state)
}
