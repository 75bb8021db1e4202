use std::path::PathBuf;

/// Errors raised inside the guard.
///
/// None of these are fatal: every caller recovers locally (falls back to a
/// default, degrades to text-only, or logs and moves on).
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("config io error at {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("media fetch failed for {message_id}: {reason}")]
    MediaFetch { message_id: String, reason: String },

    #[error("media write failed at {path}: {source}")]
    MediaWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("media send failed: {0}")]
    MediaSend(String),

    #[error("file cleanup failed at {path}: {source}")]
    FileCleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("guard runtime shut down")]
    Shutdown,
}
