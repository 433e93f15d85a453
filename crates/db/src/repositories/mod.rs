//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod alert_repo;
pub mod autopilot_settings_repo;
pub mod content_change_repo;
pub mod daily_counter_repo;
pub mod keyword_repo;
pub mod knowledge_repo;
pub mod page_repo;
pub mod queue_repo;
pub mod recommendation_repo;
pub mod run_repo;
pub mod site_repo;

pub use alert_repo::AlertRepo;
pub use autopilot_settings_repo::AutopilotSettingsRepo;
pub use content_change_repo::ContentChangeRepo;
pub use daily_counter_repo::DailyCounterRepo;
pub use keyword_repo::KeywordRepo;
pub use knowledge_repo::KnowledgeRepo;
pub use page_repo::PageRepo;
pub use queue_repo::QueueRepo;
pub use recommendation_repo::RecommendationRepo;
pub use run_repo::RunRepo;
pub use site_repo::SiteRepo;

/// Maximum page size for list endpoints.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for list endpoints.
pub const DEFAULT_LIMIT: i64 = 50;

/// Clamp a caller-supplied limit into `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Clamp a caller-supplied offset to be non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}
