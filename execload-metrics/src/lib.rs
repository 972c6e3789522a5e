pub mod key;
pub mod metrics;
pub mod registry;
pub mod snapshot;
pub mod tags;

pub use key::KeyId;
pub use metrics::{
    MetricHandle, MetricKind, MetricSeriesSummary, MetricValue, TREND_QUANTILES, TrendSummary,
    percentile, summarize_trend,
};
pub use registry::{MetricId, Registry};
pub use snapshot::{MetricsSnapshot, SeriesData, SeriesSnapshot, TrendSample};
pub use tags::TagSet;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("metric `{name}` is already registered as {registered}, not {requested}")]
    KindConflict {
        name: String,
        registered: MetricKind,
        requested: MetricKind,
    },

    #[error("metric `{0}` has no storage")]
    UnknownMetric(String),
}
