//! 价格表处理器

use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use futures::TryStreamExt;
use serde_json::json;
use std::io;
use tokio_util::io::StreamReader;
use tracing::debug;

use super::{
    model::PageRequest,
    route::{classify, PriceRoute},
    service::PriceListService,
};
use crate::core::error::CoreError;

/// 上传文件所在的表单字段名。
/// 这个拼写是已有客户端依赖的对外契约，不能改成 `csv`。
pub const UPLOAD_FIELD: &str = "scv";

#[derive(Clone)]
pub struct AppState {
    pub pricelist_service: PriceListService,
}

/// `/price/` 下所有请求的入口
pub async fn dispatch(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, CoreError> {
    let route = classify(request.method(), request.uri().path())?;

    match route {
        PriceRoute::Read { distributor_id } => {
            let page = PageRequest::from_query(request.uri().query());
            let products = state.pricelist_service.list(distributor_id, page).await?;
            debug!(distributor_id, rows = products.len(), "Price list page served");
            Ok(Json(products).into_response())
        }
        PriceRoute::Upload { distributor_id } => upload(&state, distributor_id, request).await,
    }
}

async fn upload(
    state: &AppState,
    distributor_id: i64,
    request: Request,
) -> Result<Response, CoreError> {
    let mut multipart = Multipart::from_request(request, state).await?;

    while let Some(field) = multipart.next_field().await? {
        // 只接受文件部分，同名的普通文本字段视为没有上传文件
        if field.name() != Some(UPLOAD_FIELD) || field.file_name().is_none() {
            continue;
        }

        let reader = Box::pin(StreamReader::new(field.map_err(io::Error::other)));
        state
            .pricelist_service
            .replace_price_list(distributor_id, reader)
            .await?;

        return Ok(StatusCode::OK.into_response());
    }

    Err(CoreError::MissingFile(UPLOAD_FIELD))
}

/// 健康检查
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, CoreError> {
    state.pricelist_service.repository().ping().await?;

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now()
    })))
}
