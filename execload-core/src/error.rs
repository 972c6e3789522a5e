pub type Result<T> = std::result::Result<T, Error>;

/// Invalid run inputs. All of these are detected before any request is sent.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("`{var}` must be a non-negative integer (got `{value}`)")]
    InvalidNumber { var: &'static str, value: String },

    #[error("`{var}` is not a valid duration (got `{value}`): {reason}")]
    InvalidDuration {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("`{var}` must be an RFC 3339 timestamp (got `{value}`)")]
    InvalidTimestamp { var: &'static str, value: String },

    #[error("`{var}` must be a boolean (got `{value}`)")]
    InvalidBool { var: &'static str, value: String },

    #[error("`{var}` is not a valid url (got `{value}`)")]
    InvalidUrl { var: &'static str, value: String },

    #[error("`{var}` must use http:// (got `{value}`)")]
    UnsupportedScheme { var: &'static str, value: String },

    #[error("unknown scenario `{0}` (expected `fixed`, `ramping`, or `constant`)")]
    UnknownScenario(String),

    #[error("`RATE` must be a positive integer")]
    ZeroRate,

    #[error("`DURATION` must be a positive duration")]
    ZeroDuration,

    #[error("`PREALLOCATED_VUS` must be a positive integer")]
    ZeroWorkers,

    #[error("{workers} preallocated workers cannot sustain a peak of {peak_rate} iterations/s")]
    Underprovisioned { workers: u64, peak_rate: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    #[error("http error: {0}")]
    Http(#[from] crate::http::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("metrics error: {0}")]
    Metrics(#[from] execload_metrics::Error),

    #[error("metrics are still shared with a running task after the run finished")]
    MetricsStillShared,
}

impl Error {
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
