use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use log::info;
use tokio::sync::RwLock;

use crate::error::WorkshopError;
use crate::models::Plugin;
use crate::persistence::{StorageKind, StorageProvider};

/// 插件注册表
///
/// 读多写少：评分引擎只做存在性与激活状态检查，注册和上下架由
/// 管理侧调用。带存储提供者时注册会透写持久化，启动时可恢复。
pub struct PluginCatalog {
    storage: Option<Arc<dyn StorageProvider>>,
    plugins: RwLock<HashMap<String, Plugin>>,
}

impl PluginCatalog {
    /// 创建纯内存的插件注册表（测试用）
    pub fn new() -> Self {
        Self {
            storage: None,
            plugins: RwLock::new(HashMap::new()),
        }
    }

    /// 创建带持久化的插件注册表
    pub fn with_storage(storage: Arc<dyn StorageProvider>) -> Self {
        Self {
            storage: Some(storage),
            plugins: RwLock::new(HashMap::new()),
        }
    }

    /// 创建带有内置插件的内存注册表
    pub async fn with_builtin_plugins() -> Result<Self, WorkshopError> {
        let catalog = Self::new();
        catalog.seed_builtin_plugins().await?;
        Ok(catalog)
    }

    /// 启动时从存储恢复插件条目，返回加载条数
    pub async fn load_from_storage(&self) -> Result<usize, WorkshopError> {
        let storage = match &self.storage {
            Some(storage) => storage,
            None => return Ok(0),
        };

        let raw_items = storage.list(StorageKind::Plugin).await?;
        let mut plugins = self.plugins.write().await;

        let mut loaded = 0;
        for bytes in raw_items {
            let plugin: Plugin = bincode::deserialize(&bytes)
                .map_err(crate::persistence::StorageError::from)?;
            plugins.insert(plugin.plugin_id.clone(), plugin);
            loaded += 1;
        }

        if loaded > 0 {
            info!("Loaded {} plugins from storage", loaded);
        }
        Ok(loaded)
    }

    /// 注册创意工坊自带的插件
    pub async fn seed_builtin_plugins(&self) -> Result<(), WorkshopError> {
        for plugin in builtin_plugins() {
            self.register(plugin).await?;
        }
        Ok(())
    }

    /// 注册插件（同ID覆盖）
    pub async fn register(&self, plugin: Plugin) -> Result<(), WorkshopError> {
        if let Some(storage) = &self.storage {
            let bytes = bincode::serialize(&plugin)
                .map_err(crate::persistence::StorageError::from)?;
            storage
                .save(StorageKind::Plugin, &plugin.plugin_id, &bytes)
                .await?;
        }

        let mut plugins = self.plugins.write().await;
        info!("Registered plugin {} ({})", plugin.plugin_id, plugin.plugin_name);
        plugins.insert(plugin.plugin_id.clone(), plugin);
        Ok(())
    }

    /// 插件是否存在
    pub async fn exists(&self, plugin_id: &str) -> bool {
        let plugins = self.plugins.read().await;
        plugins.contains_key(plugin_id)
    }

    /// 插件是否处于激活状态
    pub async fn is_active(&self, plugin_id: &str) -> bool {
        let plugins = self.plugins.read().await;
        plugins.get(plugin_id).map_or(false, |p| p.is_active)
    }

    /// 查询单个插件
    pub async fn get(&self, plugin_id: &str) -> Option<Plugin> {
        let plugins = self.plugins.read().await;
        plugins.get(plugin_id).cloned()
    }

    /// 列出所有激活的插件
    pub async fn list_active(&self) -> Vec<Plugin> {
        let plugins = self.plugins.read().await;
        plugins.values().filter(|p| p.is_active).cloned().collect()
    }

    /// 修改插件激活状态
    pub async fn set_active(&self, plugin_id: &str, active: bool) -> Result<(), WorkshopError> {
        let mut plugins = self.plugins.write().await;
        let plugin = plugins.get_mut(plugin_id).ok_or_else(|| {
            WorkshopError::NotFound(format!("Plugin {} not found", plugin_id))
        })?;
        plugin.is_active = active;

        if let Some(storage) = &self.storage {
            let bytes = bincode::serialize(plugin)
                .map_err(crate::persistence::StorageError::from)?;
            storage
                .save(StorageKind::Plugin, plugin_id, &bytes)
                .await?;
        }

        Ok(())
    }
}

impl Default for PluginCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// 创意工坊自带的三个插件
fn builtin_plugins() -> Vec<Plugin> {
    vec![
        Plugin {
            plugin_id: "air-conditioning".to_string(),
            plugin_name: "空调管理插件".to_string(),
            description: "温控面板与季节策略，缓解办公室温度引发的不满".to_string(),
            author: "Workshop Team".to_string(),
            version: "1.0.0".to_string(),
            display_icon: "❄️".to_string(),
            category: "office-facility".to_string(),
            target_tags: vec!["comfort".to_string(), "environment".to_string()],
            is_active: true,
            created_at: Utc::now(),
        },
        Plugin {
            plugin_id: "printer-maintenance".to_string(),
            plugin_name: "打印机维护插件".to_string(),
            description: "打印机状态监控与报修流程".to_string(),
            author: "Workshop Team".to_string(),
            version: "1.0.0".to_string(),
            display_icon: "🖨️".to_string(),
            category: "equipment".to_string(),
            target_tags: vec!["maintenance".to_string()],
            is_active: true,
            created_at: Utc::now(),
        },
        Plugin {
            plugin_id: "wellness-program".to_string(),
            plugin_name: "健康计划插件".to_string(),
            description: "员工健康活动与压力管理".to_string(),
            author: "Workshop Team".to_string(),
            version: "1.0.0".to_string(),
            display_icon: "🧘".to_string(),
            category: "welfare".to_string(),
            target_tags: vec!["wellness".to_string(), "morale".to_string()],
            is_active: true,
            created_at: Utc::now(),
        },
    ]
}
