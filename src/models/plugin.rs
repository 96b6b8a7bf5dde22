use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 可评分的插件 - 对应创意工坊中的一个插件条目
///
/// 除了 `is_active` 开关之外，评分引擎只读取这些字段，不会修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plugin {
    /// 插件ID
    pub plugin_id: String,
    /// 插件名称
    pub plugin_name: String,
    /// 插件描述
    pub description: String,
    /// 作者
    pub author: String,
    /// 版本号
    pub version: String,
    /// 展示图标
    pub display_icon: String,
    /// 分类
    pub category: String,
    /// 作用目标标签
    pub target_tags: Vec<String>,
    /// 是否激活（停用的插件不再接受新评分）
    pub is_active: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl Plugin {
    /// 创建新的插件条目，默认激活
    pub fn new(
        plugin_id: impl Into<String>,
        plugin_name: impl Into<String>,
        author: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            plugin_name: plugin_name.into(),
            description: String::new(),
            author: author.into(),
            version: version.into(),
            display_icon: String::new(),
            category: String::new(),
            target_tags: Vec::new(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}
