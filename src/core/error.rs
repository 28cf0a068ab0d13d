//! 核心错误处理模块

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::app::pricelist::parser::RecordError;

/// 核心错误类型
///
/// 所有请求级错误都在这里汇总，响应只带状态码，不带响应体：
/// 客户端通过响应体是否存在来区分成功读取与失败。
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid URL request: {0}")]
    BadRequest(String),
    #[error("Method {0} is not allowed for this resource")]
    MethodNotAllowed(Method),
    #[error("Missing upload field `{0}`")]
    MissingFile(&'static str),
    #[error("Invalid .scv file at line {line}: {reason}")]
    InvalidRecord { line: usize, reason: RecordError },
    #[error("Failed to read uploaded file: {0}")]
    UploadStream(#[source] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl CoreError {
    pub fn status(&self) -> StatusCode {
        match self {
            CoreError::BadRequest(_)
            | CoreError::MissingFile(_)
            | CoreError::InvalidRecord { .. }
            | CoreError::UploadStream(_) => StatusCode::BAD_REQUEST,
            CoreError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            CoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartRejection> for CoreError {
    fn from(rejection: MultipartRejection) -> Self {
        CoreError::BadRequest(rejection.to_string())
    }
}

impl From<MultipartError> for CoreError {
    fn from(err: MultipartError) -> Self {
        CoreError::BadRequest(err.to_string())
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), "{}", self);
        } else {
            warn!(status = status.as_u16(), "{}", self);
        }

        status.into_response()
    }
}
