/// Ads are identified by an opaque string supplied by the caller.
pub type AdId = String;

/// Version ids are generated UUIDv7 tokens rendered as strings.
pub type VersionId = String;

/// All timestamps are epoch milliseconds (UTC).
pub type EpochMillis = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> EpochMillis {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a fresh, time-ordered version id.
pub fn new_version_id() -> VersionId {
    uuid::Uuid::now_v7().to_string()
}
