//! 价格表业务服务

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info, warn};

use super::{
    model::{PageRequest, Product, UploadReport},
    parser::parse_line,
    repository::PriceListRepository,
};
use crate::{core::error::CoreError, locks::DistributorLocks};

#[derive(Clone)]
pub struct PriceListService {
    repository: PriceListRepository,
    locks: DistributorLocks,
    atomic_uploads: bool,
}

impl PriceListService {
    pub fn new(repository: PriceListRepository, atomic_uploads: bool) -> Self {
        Self {
            repository,
            locks: DistributorLocks::new(),
            atomic_uploads,
        }
    }

    pub fn repository(&self) -> &PriceListRepository {
        &self.repository
    }

    pub async fn list(
        &self,
        distributor_id: i64,
        page: PageRequest,
    ) -> Result<Vec<Product>, CoreError> {
        let products = self.repository.select(distributor_id, page).await?;
        Ok(products)
    }

    /// 用上传的文件整体替换该经销商的价格表
    ///
    /// 先删除旧行，再逐行解析并插入。格式错误的行会中止剩余扫描；
    /// 非原子模式下，之前已插入的行保留，单行插入失败只记录日志并继续。
    /// 原子模式下任何失败都会回滚整个上传。
    pub async fn replace_price_list<R>(
        &self,
        distributor_id: i64,
        reader: R,
    ) -> Result<UploadReport, CoreError>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let _guard = self.locks.acquire(distributor_id).await;
        let mut session = self.repository.begin_upload(self.atomic_uploads).await?;

        let mut report = UploadReport {
            deleted: session.delete(distributor_id).await?,
            ..UploadReport::default()
        };

        let mut lines = reader.lines();
        let mut line_no = 0usize;
        while let Some(line) = lines.next_line().await.map_err(CoreError::UploadStream)? {
            line_no += 1;

            let record = parse_line(&line).map_err(|reason| CoreError::InvalidRecord {
                line: line_no,
                reason,
            })?;

            if let Err(e) = session.insert(distributor_id, &record).await {
                if session.is_atomic() {
                    return Err(e.into());
                }
                error!(distributor_id, line = line_no, "Failed to insert row: {}", e);
                report.failed += 1;
                continue;
            }
            report.inserted += 1;
        }

        session.commit().await?;

        if report.failed > 0 {
            warn!(
                distributor_id,
                failed = report.failed,
                "Price list uploaded with skipped rows"
            );
        }
        info!(
            distributor_id,
            deleted = report.deleted,
            inserted = report.inserted,
            "Price list replaced"
        );

        Ok(report)
    }
}
