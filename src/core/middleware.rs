//! 核心中间件模块

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// 请求日志中间件
///
/// 为每个请求打开一个带请求 ID 的 span，处理器内部的日志（例如上传时逐行的错误）
/// 都挂在这个 span 下，便于关联。
pub async fn request_logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    let span = info_span!("request", id = %request_id, %method, %uri);

    async move {
        let response = next.run(req).await;
        let status = response.status();
        let duration = start.elapsed();

        info!(
            "{} {} - {} - {}ms - User-Agent: {:?}",
            method,
            uri,
            status,
            duration.as_millis(),
            user_agent
        );

        response
    }
    .instrument(span)
    .await
}
