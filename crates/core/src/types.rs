/// Jobs are identified by an opaque UUID assigned at submission.
pub type JobId = uuid::Uuid;

/// Live client sessions are identified by an opaque string token.
/// Clients may supply their own id on reconnect to resume a session.
pub type SessionId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
