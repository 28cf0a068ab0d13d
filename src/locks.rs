//! 按经销商划分的上传互斥锁
//!
//! 同一经销商的两次上传如果交错执行，删除和插入会混在一起。
//! 上传在删除之前拿锁，在最后一次插入（或提交）之后释放；不同经销商互不等待。

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Clone, Default)]
pub struct DistributorLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}

/// 持有期间独占该经销商的价格表
pub struct DistributorGuard {
    _guard: OwnedMutexGuard<()>,
}

impl DistributorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, distributor_id: i64) -> DistributorGuard {
        let lock = {
            let mut map = self.inner.lock();
            // 顺手清理没人持有也没人等待的条目
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(distributor_id).or_default())
        };

        if lock.try_lock().is_err() {
            debug!(distributor_id, "Waiting for concurrent upload to finish");
        }

        DistributorGuard {
            _guard: lock.lock_owned().await,
        }
    }

    #[cfg(test)]
    fn registered(&self) -> usize {
        self.inner.lock().len()
    }
}
