pub mod plugin;
pub mod rating;
pub mod statistics;

// 重新导出常用类型
pub use plugin::Plugin;
pub use rating::{Rating, SubmitOutcome};
pub use statistics::RatingStatistics;
