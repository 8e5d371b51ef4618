/// Primary key type shared by every table.
pub type DbId = i64;

/// UTC timestamp used for all persisted instants.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
