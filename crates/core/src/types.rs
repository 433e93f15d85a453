/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Sites are tenant-facing entities keyed by UUID.
pub type SiteId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
