pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod persistence;
pub mod service;
pub mod stats;
pub mod store;

// 重新导出常用类型
pub use catalog::PluginCatalog;
pub use config::WorkshopConfig;
pub use error::WorkshopError;
pub use identity::{resolve_identity, IdentitySource};
pub use models::{Plugin, Rating, RatingStatistics, SubmitOutcome};
pub use service::{PluginDetail, PluginWithStatistics, RatingService};
pub use stats::StatisticsAggregator;
pub use store::RatingStore;
