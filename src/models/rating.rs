use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::statistics::RatingStatistics;

/// 单条插件评分记录
///
/// 以 (plugin_id, user_identity) 为唯一键：同一用户对同一插件重复提交
/// 时只会原地更新星级和评论，不会产生第二条记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    /// 评分记录ID
    pub rating_id: String,
    /// 被评分的插件ID
    pub plugin_id: String,
    /// 评分者身份键（由身份解析函数产生）
    pub user_identity: String,
    /// 星级，1-5
    pub stars: u8,
    /// 评论内容
    pub comment: Option<String>,
    /// 原始客户端标识字符串
    pub user_agent: Option<String>,
    /// 首次评分时间
    pub created_at: DateTime<Utc>,
    /// 最近一次更新时间
    pub updated_at: DateTime<Utc>,
}

impl Rating {
    /// 创建新的评分记录
    pub fn new(
        plugin_id: impl Into<String>,
        user_identity: impl Into<String>,
        stars: u8,
        comment: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            rating_id: Uuid::new_v4().to_string(),
            plugin_id: plugin_id.into(),
            user_identity: user_identity.into(),
            stars,
            comment,
            user_agent,
            created_at: now,
            updated_at: now,
        }
    }

    /// 同一用户重复提交时覆盖星级与评论，不保留历史值
    pub fn apply_update(&mut self, stars: u8, comment: Option<String>, user_agent: Option<String>) {
        self.stars = stars;
        self.comment = comment;
        self.user_agent = user_agent;
        self.updated_at = Utc::now();
    }
}

/// 评分提交结果，携带提交后最新的统计快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOutcome {
    /// 评分是否已被接受
    pub accepted: bool,
    /// true 表示本次是对已有评分的更新而非新建
    pub is_update: bool,
    /// 提交后重新计算的统计快照
    pub statistics: RatingStatistics,
}
