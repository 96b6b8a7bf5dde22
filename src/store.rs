use std::collections::HashMap;
use std::sync::Arc;

use log::{info, warn};
use tokio::sync::RwLock;

use crate::catalog::PluginCatalog;
use crate::error::WorkshopError;
use crate::models::Rating;
use crate::persistence::{StorageKind, StorageProvider};

/// 评分存储
///
/// 持有全部评分记录并保证唯一性不变式：任意时刻每个
/// (plugin_id, user_identity) 至多存在一条记录。内存索引负责查询，
/// 每次写入都透写到存储提供者（以 rating_id 为持久化键，更新复用
/// 同一个键，因此磁盘上同样不会出现重复）。
pub struct RatingStore {
    catalog: Arc<PluginCatalog>,
    storage: Arc<dyn StorageProvider>,
    /// plugin_id -> user_identity -> Rating
    ratings: RwLock<HashMap<String, HashMap<String, Rating>>>,
}

impl RatingStore {
    pub fn new(catalog: Arc<PluginCatalog>, storage: Arc<dyn StorageProvider>) -> Self {
        Self {
            catalog,
            storage,
            ratings: RwLock::new(HashMap::new()),
        }
    }

    /// 启动时从存储提供者恢复内存索引，返回加载的记录数
    pub async fn load_from_storage(&self) -> Result<usize, WorkshopError> {
        let raw_items = self.storage.list(StorageKind::Rating).await?;
        let mut ratings = self.ratings.write().await;

        let mut loaded = 0;
        for bytes in raw_items {
            let rating: Rating = bincode::deserialize(&bytes)
                .map_err(crate::persistence::StorageError::from)?;
            // 磁盘记录可能被外部篡改，星级越界的记录不进索引，
            // 否则后续重算会对其直方图下标越界
            if !(1..=5).contains(&rating.stars) {
                warn!(
                    "Skipping stored rating {} for plugin {}: stars {} out of range",
                    rating.rating_id, rating.plugin_id, rating.stars
                );
                continue;
            }
            ratings
                .entry(rating.plugin_id.clone())
                .or_default()
                .insert(rating.user_identity.clone(), rating);
            loaded += 1;
        }

        if loaded > 0 {
            info!("Loaded {} ratings from storage", loaded);
        }
        Ok(loaded)
    }

    /// 插入或更新一条评分
    ///
    /// 前置条件：星级为1-5的整数，插件存在且处于激活状态。
    /// 返回值的第二项表示本次是否新建了记录。
    pub async fn upsert(
        &self,
        plugin_id: &str,
        user_identity: &str,
        stars: u8,
        comment: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(Rating, bool), WorkshopError> {
        if !(1..=5).contains(&stars) {
            warn!(
                "Rejected rating for plugin {}: stars {} out of range",
                plugin_id, stars
            );
            return Err(WorkshopError::InvalidInput(format!(
                "Rating must be between 1 and 5, got {}",
                stars
            )));
        }

        if !self.catalog.exists(plugin_id).await {
            return Err(WorkshopError::NotFound(format!(
                "Plugin {} not found",
                plugin_id
            )));
        }
        if !self.catalog.is_active(plugin_id).await {
            return Err(WorkshopError::NotFound(format!(
                "Plugin {} is not active",
                plugin_id
            )));
        }

        let mut ratings = self.ratings.write().await;
        let per_plugin = ratings.entry(plugin_id.to_string()).or_default();

        // 先构造候选记录并落盘，落盘成功后才写入索引；落盘失败时
        // 索引保持原样，不会留下未持久化的记录
        let (rating, was_created) = match per_plugin.get(user_identity) {
            Some(existing) => {
                let mut updated = existing.clone();
                updated.apply_update(stars, comment, user_agent);
                (updated, false)
            }
            None => (
                Rating::new(plugin_id, user_identity, stars, comment, user_agent),
                true,
            ),
        };

        let bytes =
            bincode::serialize(&rating).map_err(crate::persistence::StorageError::from)?;
        self.storage
            .save(StorageKind::Rating, &rating.rating_id, &bytes)
            .await?;

        per_plugin.insert(user_identity.to_string(), rating.clone());

        Ok((rating, was_created))
    }

    /// 某插件的全部评分（供统计重算全量扫描）
    pub async fn ratings_for_plugin(&self, plugin_id: &str) -> Vec<Rating> {
        let ratings = self.ratings.read().await;
        ratings
            .get(plugin_id)
            .map(|per_plugin| per_plugin.values().cloned().collect())
            .unwrap_or_default()
    }

    /// 某插件的最近评分列表，只读无副作用
    pub async fn list_for_plugin(
        &self,
        plugin_id: &str,
        limit: usize,
        newest_first: bool,
    ) -> Vec<Rating> {
        let mut items = self.ratings_for_plugin(plugin_id).await;

        items.sort_by(|a, b| {
            if newest_first {
                b.created_at.cmp(&a.created_at)
            } else {
                a.created_at.cmp(&b.created_at)
            }
        });
        items.truncate(limit);
        items
    }

    /// 某插件当前的评分条数
    pub async fn count_for_plugin(&self, plugin_id: &str) -> usize {
        let ratings = self.ratings.read().await;
        ratings.get(plugin_id).map_or(0, |m| m.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::models::Plugin;
    use crate::persistence::{InMemoryStorage, StorageError};

    /// 允许前N次save成功，之后全部失败的存储，用于模拟磁盘故障
    struct FlakyStorage {
        inner: InMemoryStorage,
        allowed_saves: AtomicUsize,
    }

    impl FlakyStorage {
        fn new(allowed_saves: usize) -> Self {
            Self {
                inner: InMemoryStorage::new(),
                allowed_saves: AtomicUsize::new(allowed_saves),
            }
        }
    }

    #[async_trait::async_trait]
    impl StorageProvider for FlakyStorage {
        async fn save(
            &self,
            kind: StorageKind,
            id: &str,
            bytes: &[u8],
        ) -> Result<(), StorageError> {
            let remaining = self.allowed_saves.load(Ordering::SeqCst);
            if remaining == 0 {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.allowed_saves.store(remaining - 1, Ordering::SeqCst);
            self.inner.save(kind, id, bytes).await
        }

        async fn load(&self, kind: StorageKind, id: &str) -> Result<Vec<u8>, StorageError> {
            self.inner.load(kind, id).await
        }

        async fn delete(&self, kind: StorageKind, id: &str) -> Result<(), StorageError> {
            self.inner.delete(kind, id).await
        }

        async fn list(&self, kind: StorageKind) -> Result<Vec<Vec<u8>>, StorageError> {
            self.inner.list(kind).await
        }
    }

    async fn store_with_plugin(plugin_id: &str) -> RatingStore {
        let catalog = Arc::new(PluginCatalog::new());
        catalog
            .register(Plugin::new(plugin_id, "测试插件", "tester", "1.0.0"))
            .await
            .unwrap();
        RatingStore::new(catalog, Arc::new(InMemoryStorage::new()))
    }

    #[actix_rt::test]
    async fn test_upsert_creates_then_updates_in_place() {
        let store = store_with_plugin("p1").await;

        let (first, created) = store
            .upsert("p1", "ip1", 5, Some("很好用".to_string()), None)
            .await
            .unwrap();
        assert!(created);
        assert_eq!(first.stars, 5);

        let (second, created) = store
            .upsert("p1", "ip1", 2, None, None)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.stars, 2);
        assert_eq!(second.rating_id, first.rating_id);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);

        // 唯一性：同一 (插件, 身份) 只有一条记录
        assert_eq!(store.count_for_plugin("p1").await, 1);
    }

    #[actix_rt::test]
    async fn test_upsert_rejects_out_of_range_stars() {
        let store = store_with_plugin("p1").await;

        for stars in [0u8, 6, 200] {
            let result = store.upsert("p1", "ip1", stars, None, None).await;
            assert!(matches!(result, Err(WorkshopError::InvalidInput(_))));
        }
        assert_eq!(store.count_for_plugin("p1").await, 0);
    }

    #[actix_rt::test]
    async fn test_upsert_rejects_unknown_and_inactive_plugins() {
        let catalog = Arc::new(PluginCatalog::new());
        let mut plugin = Plugin::new("disabled", "停用插件", "tester", "1.0.0");
        plugin.is_active = false;
        catalog.register(plugin).await.unwrap();

        let store = RatingStore::new(catalog, Arc::new(InMemoryStorage::new()));

        let unknown = store.upsert("missing", "ip1", 4, None, None).await;
        assert!(matches!(unknown, Err(WorkshopError::NotFound(_))));

        let inactive = store.upsert("disabled", "ip1", 4, None, None).await;
        assert!(matches!(inactive, Err(WorkshopError::NotFound(_))));
    }

    #[actix_rt::test]
    async fn test_list_for_plugin_orders_and_limits() {
        let store = store_with_plugin("p1").await;

        for i in 0..5 {
            store
                .upsert("p1", &format!("ip{}", i), (i % 5) as u8 + 1, None, None)
                .await
                .unwrap();
        }

        let recent = store.list_for_plugin("p1", 3, true).await;
        assert_eq!(recent.len(), 3);
        assert!(recent[0].created_at >= recent[1].created_at);
        assert!(recent[1].created_at >= recent[2].created_at);
    }

    #[actix_rt::test]
    async fn test_failed_save_leaves_index_unchanged() {
        let catalog = Arc::new(PluginCatalog::new());
        catalog
            .register(Plugin::new("p1", "测试插件", "tester", "1.0.0"))
            .await
            .unwrap();
        let store = RatingStore::new(catalog, Arc::new(FlakyStorage::new(0)));

        // 新建路径：落盘失败时不得留下记录
        let result = store.upsert("p1", "ip1", 5, None, None).await;
        assert!(matches!(result, Err(WorkshopError::Storage(_))));
        assert_eq!(store.count_for_plugin("p1").await, 0);
        assert!(store.ratings_for_plugin("p1").await.is_empty());
    }

    #[actix_rt::test]
    async fn test_failed_save_keeps_previous_rating_on_update() {
        let catalog = Arc::new(PluginCatalog::new());
        catalog
            .register(Plugin::new("p1", "测试插件", "tester", "1.0.0"))
            .await
            .unwrap();
        let store = RatingStore::new(catalog, Arc::new(FlakyStorage::new(1)));

        store.upsert("p1", "ip1", 5, None, None).await.unwrap();

        // 更新路径：落盘失败时已有记录保持原值
        let result = store.upsert("p1", "ip1", 1, None, None).await;
        assert!(matches!(result, Err(WorkshopError::Storage(_))));

        let remaining = store.ratings_for_plugin("p1").await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].stars, 5);
    }

    #[actix_rt::test]
    async fn test_load_from_storage_skips_out_of_range_stars() {
        let catalog = Arc::new(PluginCatalog::new());
        catalog
            .register(Plugin::new("p1", "测试插件", "tester", "1.0.0"))
            .await
            .unwrap();
        let storage: Arc<dyn StorageProvider> = Arc::new(InMemoryStorage::new());

        let good = Rating::new("p1", "ip1", 4, None, None);
        let mut bad = Rating::new("p1", "ip2", 5, None, None);
        bad.stars = 0;
        for rating in [&good, &bad] {
            let bytes = bincode::serialize(rating).unwrap();
            storage
                .save(StorageKind::Rating, &rating.rating_id, &bytes)
                .await
                .unwrap();
        }

        let store = RatingStore::new(catalog, storage);
        let loaded = store.load_from_storage().await.unwrap();
        assert_eq!(loaded, 1);

        let restored = store.ratings_for_plugin("p1").await;
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].user_identity, "ip1");
    }

    #[actix_rt::test]
    async fn test_load_from_storage_rebuilds_index() {
        let catalog = Arc::new(PluginCatalog::new());
        catalog
            .register(Plugin::new("p1", "测试插件", "tester", "1.0.0"))
            .await
            .unwrap();
        let storage: Arc<dyn StorageProvider> = Arc::new(InMemoryStorage::new());

        let store = RatingStore::new(catalog.clone(), storage.clone());
        store.upsert("p1", "ip1", 5, None, None).await.unwrap();
        store.upsert("p1", "ip2", 3, None, None).await.unwrap();

        // 模拟重启：新实例从同一存储恢复
        let restored = RatingStore::new(catalog, storage);
        let loaded = restored.load_from_storage().await.unwrap();
        assert_eq!(loaded, 2);
        assert_eq!(restored.count_for_plugin("p1").await, 2);

        // 恢复后继续保证唯一性
        let (_, created) = restored.upsert("p1", "ip1", 1, None, None).await.unwrap();
        assert!(!created);
        assert_eq!(restored.count_for_plugin("p1").await, 2);
    }
}
