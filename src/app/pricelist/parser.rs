//! 价格表文件行解析
//!
//! 每行恰好三列，以制表符分隔：`art\tcount\tprice`，全部为整数，无表头。

use super::model::PriceRecord;

/// 字段分隔符
pub const FIELD_SEPARATOR: char = '\t';

const COLUMNS: [&str; 3] = ["art", "count", "price"];

/// 单行解析错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("expected 3 tab-separated fields, found {0}")]
    FieldCount(usize),
    #[error("column `{column}` is not an integer: {value:?}")]
    NotInteger { column: &'static str, value: String },
}

/// 解析一行价格表记录
pub fn parse_line(line: &str) -> Result<PriceRecord, RecordError> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if fields.len() != COLUMNS.len() {
        return Err(RecordError::FieldCount(fields.len()));
    }

    let mut values = [0i64; 3];
    for ((slot, raw), column) in values.iter_mut().zip(&fields).zip(COLUMNS) {
        *slot = raw.parse().map_err(|_| RecordError::NotInteger {
            column,
            value: raw.to_string(),
        })?;
    }

    let [art, count, price] = values;
    Ok(PriceRecord { art, count, price })
}
