use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::catalog::PluginCatalog;
use crate::error::WorkshopError;
use crate::identity::{resolve_identity, IdentitySource};
use crate::models::{Plugin, Rating, RatingStatistics, SubmitOutcome};
use crate::stats::StatisticsAggregator;
use crate::store::RatingStore;

/// 身份解析函数，注入为纯函数以便测试替换
pub type IdentityResolver = fn(&IdentitySource) -> String;

/// 插件及其统计快照（目录列表条目）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginWithStatistics {
    pub plugin: Plugin,
    pub statistics: RatingStatistics,
}

/// 单个插件的详情视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDetail {
    pub plugin: Plugin,
    pub statistics: RatingStatistics,
    pub recent_ratings: Vec<Rating>,
}

/// 评分服务 - 引擎的编排入口
///
/// 提交流程：解析身份 -> 校验星级 -> 存储upsert -> 统计重算。
/// 对同一插件的 (upsert, recompute) 序列持插件级互斥锁，不同插件
/// 的提交互不阻塞；读取路径不取写锁，允许短暂读到落后一次写入
/// 的快照。
pub struct RatingService {
    catalog: Arc<PluginCatalog>,
    store: Arc<RatingStore>,
    aggregator: Arc<StatisticsAggregator>,
    resolver: IdentityResolver,
    plugin_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RatingService {
    pub fn new(
        catalog: Arc<PluginCatalog>,
        store: Arc<RatingStore>,
        aggregator: Arc<StatisticsAggregator>,
    ) -> Self {
        Self::with_resolver(catalog, store, aggregator, resolve_identity)
    }

    /// 指定身份解析函数的构造，测试用
    pub fn with_resolver(
        catalog: Arc<PluginCatalog>,
        store: Arc<RatingStore>,
        aggregator: Arc<StatisticsAggregator>,
        resolver: IdentityResolver,
    ) -> Self {
        Self {
            catalog,
            store,
            aggregator,
            resolver,
            plugin_locks: Mutex::new(HashMap::new()),
        }
    }

    /// 取得指定插件的写锁句柄
    async fn plugin_lock(&self, plugin_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.plugin_locks.lock().await;
        locks
            .entry(plugin_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 提交一条评分
    pub async fn submit_rating(
        &self,
        plugin_id: &str,
        source: &IdentitySource,
        stars: Option<u8>,
        comment: Option<String>,
    ) -> Result<SubmitOutcome, WorkshopError> {
        let identity = (self.resolver)(source);

        // 在任何存储变更前做请求校验
        let stars = stars.ok_or_else(|| {
            warn!("Rejected rating for plugin {}: missing rating value", plugin_id);
            WorkshopError::InvalidInput("Rating value is required".to_string())
        })?;
        if !(1..=5).contains(&stars) {
            return Err(WorkshopError::InvalidInput(format!(
                "Rating must be between 1 and 5, got {}",
                stars
            )));
        }

        // 锁表按插件ID键控且条目不回收，先确认插件在目录中，
        // 防止任意请求路径参数撑大锁表
        if !self.catalog.exists(plugin_id).await {
            return Err(WorkshopError::NotFound(format!(
                "Plugin {} not found",
                plugin_id
            )));
        }

        // 同一插件的 upsert+recompute 串行执行，避免写入与重算交错
        let lock = self.plugin_lock(plugin_id).await;
        let _guard = lock.lock().await;

        let (rating, was_created) = self
            .store
            .upsert(plugin_id, &identity, stars, comment, source.user_agent.clone())
            .await?;

        let statistics = self.recompute_with_retry(plugin_id).await;

        info!(
            "Rating {} for plugin {} by {}: {} stars ({})",
            rating.rating_id,
            plugin_id,
            identity,
            stars,
            if was_created { "created" } else { "updated" }
        );

        Ok(SubmitOutcome {
            accepted: true,
            is_update: !was_created,
            statistics,
        })
    }

    /// 重算统计；评分此时已落盘，重算失败时重试一次，仍失败则
    /// 返回上一份快照（读侧会在下次写入时追平）
    async fn recompute_with_retry(&self, plugin_id: &str) -> RatingStatistics {
        match self.aggregator.recompute(plugin_id).await {
            Ok(stats) => stats,
            Err(first_err) => {
                warn!(
                    "Recompute for plugin {} failed, retrying: {}",
                    plugin_id, first_err
                );
                match self.aggregator.recompute(plugin_id).await {
                    Ok(stats) => stats,
                    Err(retry_err) => {
                        error!(
                            "Recompute for plugin {} failed twice, serving stale snapshot: {}",
                            plugin_id, retry_err
                        );
                        self.aggregator
                            .get(plugin_id)
                            .await
                            .unwrap_or_else(|| RatingStatistics::zeroed(plugin_id))
                    }
                }
            }
        }
    }

    /// 激活插件的排行列表：平均分降序，评分数降序，创建时间升序
    pub async fn plugins_with_statistics(&self) -> Vec<PluginWithStatistics> {
        let plugins = self.catalog.list_active().await;

        let mut entries = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            let statistics = self
                .aggregator
                .get(&plugin.plugin_id)
                .await
                .unwrap_or_else(|| RatingStatistics::zeroed(&plugin.plugin_id));
            entries.push(PluginWithStatistics { plugin, statistics });
        }

        entries.sort_by(|a, b| {
            b.statistics
                .average_rating
                .partial_cmp(&a.statistics.average_rating)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.statistics.total_ratings.cmp(&a.statistics.total_ratings))
                .then_with(|| a.plugin.created_at.cmp(&b.plugin.created_at))
        });

        entries
    }

    /// 单个插件详情：统计快照加最近limit条评分
    pub async fn plugin_detail(
        &self,
        plugin_id: &str,
        limit: usize,
    ) -> Result<PluginDetail, WorkshopError> {
        let plugin = self.catalog.get(plugin_id).await.ok_or_else(|| {
            WorkshopError::NotFound(format!("Plugin {} not found", plugin_id))
        })?;

        let statistics = self
            .aggregator
            .get(plugin_id)
            .await
            .unwrap_or_else(|| RatingStatistics::zeroed(plugin_id));
        let recent_ratings = self.store.list_for_plugin(plugin_id, limit, true).await;

        Ok(PluginDetail {
            plugin,
            statistics,
            recent_ratings,
        })
    }
}
