/// Shared error type used across all relaychat crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// The relay answered with a non-success status.  `message` carries the
    /// relay's body (or the upstream body it mirrored) so failure signals such
    /// as `RESOURCE_EXHAUSTED` stay visible to the classifier.
    #[error("relay HTTP {status}: {message}")]
    Relay { status: u16, message: String },

    /// The relay's own per-source limiter rejected the request.
    #[error("throttled by relay, retry in {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },

    #[error("storage: {0}")]
    Storage(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
