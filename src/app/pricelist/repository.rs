//! 价格表持久化网关
//!
//! 只有三条参数化语句：按经销商删除、插入一行、分页查询。

use sqlx::{Any, AnyPool, Executor, Transaction};
use tracing::{debug, info};

use super::model::{PageRequest, PriceRecord, Product};

pub const DELETE_SQL: &str = "DELETE FROM pricelist WHERE distributorId = ?";
pub const INSERT_SQL: &str =
    "INSERT INTO pricelist (distributorId, art, count, price) VALUES (?, ?, ?, ?)";
pub const SELECT_SQL: &str =
    "SELECT art, count, price FROM pricelist WHERE distributorId = ? ORDER BY art LIMIT ?, ?";

pub const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS pricelist (
        distributorId BIGINT NOT NULL,
        art BIGINT NOT NULL,
        count BIGINT NOT NULL,
        price BIGINT NOT NULL
    )
"#;

#[derive(Clone)]
pub struct PriceListRepository {
    pool: AnyPool,
}

impl PriceListRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// 建表（仅在配置开启时调用，不是迁移系统）
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        info!("Ensuring table `pricelist` exists");
        sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// 启动时预编译全部语句，任何一条失败都视为致命错误
    pub async fn prepare_statements(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        for sql in [DELETE_SQL, INSERT_SQL, SELECT_SQL] {
            (&mut *conn).prepare(sql).await?;
            debug!(sql, "Prepared statement");
        }
        info!("Persistence gateway ready");
        Ok(())
    }

    /// 按 `art` 升序读取一页
    pub async fn select(
        &self,
        distributor_id: i64,
        page: PageRequest,
    ) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as::<_, Product>(SELECT_SQL)
            .bind(distributor_id)
            .bind(page.skip)
            .bind(page.storage_limit())
            .fetch_all(&self.pool)
            .await
    }

    /// 开始一次上传；`atomic` 为真时整个上传包在一个事务里并独占一个连接，
    /// 否则每条语句单独从连接池取连接
    pub async fn begin_upload(&self, atomic: bool) -> Result<UploadSession, sqlx::Error> {
        if atomic {
            Ok(UploadSession::Atomic(self.pool.begin().await?))
        } else {
            Ok(UploadSession::Direct(self.pool.clone()))
        }
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// 一次上传使用的存储句柄
///
/// `Direct` 模式下每条语句自动提交，等待上传数据时不占用连接，
/// 中途失败时已插入的行保留；
/// `Atomic` 模式下未提交就被丢弃时整个上传回滚。
pub enum UploadSession {
    Direct(AnyPool),
    Atomic(Transaction<'static, Any>),
}

impl UploadSession {
    pub fn is_atomic(&self) -> bool {
        matches!(self, UploadSession::Atomic(_))
    }

    /// 删除该经销商的全部行，返回删除的行数
    pub async fn delete(&mut self, distributor_id: i64) -> Result<u64, sqlx::Error> {
        let query = sqlx::query(DELETE_SQL).bind(distributor_id);
        let result = match self {
            UploadSession::Direct(pool) => query.execute(&*pool).await?,
            UploadSession::Atomic(tx) => query.execute(&mut **tx).await?,
        };
        Ok(result.rows_affected())
    }

    pub async fn insert(
        &mut self,
        distributor_id: i64,
        record: &PriceRecord,
    ) -> Result<(), sqlx::Error> {
        let query = sqlx::query(INSERT_SQL)
            .bind(distributor_id)
            .bind(record.art)
            .bind(record.count)
            .bind(record.price);
        match self {
            UploadSession::Direct(pool) => query.execute(&*pool).await?,
            UploadSession::Atomic(tx) => query.execute(&mut **tx).await?,
        };
        Ok(())
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        match self {
            UploadSession::Direct(_) => Ok(()),
            UploadSession::Atomic(tx) => tx.commit().await,
        }
    }
}
