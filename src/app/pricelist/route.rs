//! 请求路径分类
//!
//! `/price/{distributorId}` 为读取，`/price/{distributorId}/upload` 为上传，
//! 其余形状一律拒绝，拒绝时不访问存储。路径先做百分号解码再按 `/` 切分。

use axum::http::Method;

use crate::core::error::CoreError;

pub const UPLOAD_SEGMENT: &str = "upload";

/// 分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceRoute {
    Read { distributor_id: i64 },
    Upload { distributor_id: i64 },
}

pub fn classify(method: &Method, raw_path: &str) -> Result<PriceRoute, CoreError> {
    let path = urlencoding::decode(raw_path)
        .map_err(|_| CoreError::BadRequest(raw_path.to_string()))?;
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 3 {
        return Err(CoreError::BadRequest(path.to_string()));
    }

    let distributor_id: i64 = segments[2]
        .parse()
        .map_err(|_| CoreError::BadRequest(path.to_string()))?;

    let tail = &segments[3..];
    let (route, expected) = match tail {
        [] | [""] => (PriceRoute::Read { distributor_id }, Method::GET),
        [UPLOAD_SEGMENT] | [UPLOAD_SEGMENT, ""] => {
            (PriceRoute::Upload { distributor_id }, Method::POST)
        }
        _ => return Err(CoreError::BadRequest(path.to_string())),
    };

    if *method != expected {
        return Err(CoreError::MethodNotAllowed(method.clone()));
    }

    Ok(route)
}
