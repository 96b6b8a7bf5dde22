use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::rating::Rating;

/// 单个插件的评分统计快照
///
/// 这是对当前评分集合全量重算的缓存：`total_ratings == star_counts 之和`，
/// `average_rating == 星级总和 / total_ratings`。快照本身不是独立事实源，
/// 任何时候都可以从评分集合重新推导出来。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingStatistics {
    /// 插件ID
    pub plugin_id: String,
    /// 评分总数
    pub total_ratings: u64,
    /// 平均星级
    pub average_rating: f64,
    /// 每个星级的计数，下标0对应1星
    pub star_counts: [u64; 5],
    /// 最近一次评分时间
    pub last_rating_at: Option<DateTime<Utc>>,
}

impl RatingStatistics {
    /// 没有任何评分时的零值快照
    pub fn zeroed(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            total_ratings: 0,
            average_rating: 0.0,
            star_counts: [0; 5],
            last_rating_at: None,
        }
    }

    /// 对一个插件的全部评分做确定性的全量重算
    pub fn from_ratings(plugin_id: &str, ratings: &[Rating]) -> Self {
        if ratings.is_empty() {
            return Self::zeroed(plugin_id);
        }

        let mut star_counts = [0u64; 5];
        let mut star_sum: u64 = 0;
        let mut last_rating_at: Option<DateTime<Utc>> = None;

        for rating in ratings {
            debug_assert!((1..=5).contains(&rating.stars));
            star_counts[(rating.stars - 1) as usize] += 1;
            star_sum += rating.stars as u64;

            let touched = rating.updated_at.max(rating.created_at);
            if last_rating_at.map_or(true, |t| touched > t) {
                last_rating_at = Some(touched);
            }
        }

        let total = ratings.len() as u64;
        Self {
            plugin_id: plugin_id.to_string(),
            total_ratings: total,
            average_rating: star_sum as f64 / total as f64,
            star_counts,
            last_rating_at,
        }
    }

    /// 指定星级的评分数量
    pub fn count_for(&self, stars: u8) -> u64 {
        if (1..=5).contains(&stars) {
            self.star_counts[(stars - 1) as usize]
        } else {
            0
        }
    }
}
