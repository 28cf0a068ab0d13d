//! 价格表数据模型

use serde::{Deserialize, Serialize};

/// 价格表中的一行商品（对外的 JSON 格式为 `{Art, Count, Price}`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "PascalCase")]
pub struct Product {
    pub art: i64,
    pub count: i64,
    pub price: i64,
}

/// 上传文件中解析出的一条记录
pub type PriceRecord = Product;

/// 分页参数
///
/// 默认值策略：
/// - `skip` 缺失、为空、不是整数或为负数时取 0；
/// - `limit` 缺失、为空、不是整数或为负数时表示不限制条数；
/// - 重复出现的参数只取第一次出现的值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageRequest {
    pub skip: i64,
    pub limit: Option<i64>,
}

impl PageRequest {
    pub fn new(skip: i64, limit: Option<i64>) -> Self {
        Self { skip, limit }
    }

    /// 从原始查询串解析分页参数，解析失败一律回落到默认值
    pub fn from_query(query: Option<&str>) -> Self {
        let mut skip = None;
        let mut limit = None;

        for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "skip" if skip.is_none() => skip = Some(value.into_owned()),
                "limit" if limit.is_none() => limit = Some(value.into_owned()),
                _ => {}
            }
        }

        Self {
            skip: parse_non_negative(skip.as_deref()).unwrap_or(0),
            limit: parse_non_negative(limit.as_deref()),
        }
    }

    /// 传给存储层的条数上限；不限制时使用 `i64::MAX`，所有后端都能接受
    pub fn storage_limit(&self) -> i64 {
        self.limit.unwrap_or(i64::MAX)
    }
}

fn parse_non_negative(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value >= 0)
}

/// 一次上传的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadReport {
    /// 上传前被删除的旧行数
    pub deleted: u64,
    pub inserted: u64,
    /// 插入失败（已记录日志并跳过）的行数
    pub failed: u64,
}
