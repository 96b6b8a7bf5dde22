use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use tokio::sync::RwLock;

use crate::error::WorkshopError;
use crate::models::RatingStatistics;
use crate::persistence::{StorageKind, StorageProvider};
use crate::store::RatingStore;

/// 统计聚合器
///
/// 每次写入后对目标插件的评分集合做全量重算并整体替换快照，
/// 读取则直接返回上一次计算结果，复杂度O(1)。选择全量重算而非
/// 增量维护：快照在定义上就是对评分集合的推导缓存，重算永远
/// 不会与事实源漂移。
pub struct StatisticsAggregator {
    store: Arc<RatingStore>,
    storage: Arc<dyn StorageProvider>,
    snapshots: RwLock<HashMap<String, RatingStatistics>>,
}

impl StatisticsAggregator {
    pub fn new(store: Arc<RatingStore>, storage: Arc<dyn StorageProvider>) -> Self {
        Self {
            store,
            storage,
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// 启动时恢复已持久化的快照，返回加载条数
    pub async fn load_from_storage(&self) -> Result<usize, WorkshopError> {
        let raw_items = self.storage.list(StorageKind::Statistics).await?;
        let mut snapshots = self.snapshots.write().await;

        let mut loaded = 0;
        for bytes in raw_items {
            let stats: RatingStatistics = bincode::deserialize(&bytes)
                .map_err(crate::persistence::StorageError::from)?;
            snapshots.insert(stats.plugin_id.clone(), stats);
            loaded += 1;
        }

        if loaded > 0 {
            info!("Loaded {} statistics snapshots from storage", loaded);
        }
        Ok(loaded)
    }

    /// 全量重算并替换指定插件的统计快照
    pub async fn recompute(&self, plugin_id: &str) -> Result<RatingStatistics, WorkshopError> {
        let ratings = self.store.ratings_for_plugin(plugin_id).await;
        let stats = RatingStatistics::from_ratings(plugin_id, &ratings);

        let bytes =
            bincode::serialize(&stats).map_err(crate::persistence::StorageError::from)?;
        self.storage
            .save(StorageKind::Statistics, plugin_id, &bytes)
            .await?;

        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(plugin_id.to_string(), stats.clone());

        Ok(stats)
    }

    /// 读取上一次计算的快照，从不触发重算
    pub async fn get(&self, plugin_id: &str) -> Option<RatingStatistics> {
        let snapshots = self.snapshots.read().await;
        snapshots.get(plugin_id).cloned()
    }
}
