use std::sync::Arc;
use std::time::SystemTime;

use crate::metrics::{MetricKind, MetricSeriesSummary, MetricValue, summarize_trend};

#[derive(Debug, Clone, PartialEq)]
pub struct TrendSample {
    pub value: f64,
    pub tags: Vec<(Arc<str>, Arc<str>)>,
    pub at: SystemTime,
}

impl TrendSample {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesData {
    Trend(Vec<TrendSample>),
    Counter(u64),
    Rate { total: u64, passes: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSnapshot {
    pub name: String,
    pub kind: MetricKind,
    pub data: SeriesData,
}

/// Read-only view of every series after the write phase has ended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    series: Vec<SeriesSnapshot>,
}

impl MetricsSnapshot {
    pub fn new(series: Vec<SeriesSnapshot>) -> Self {
        Self { series }
    }

    pub fn series(&self) -> &[SeriesSnapshot] {
        &self.series
    }

    fn find(&self, name: &str) -> Option<&SeriesSnapshot> {
        self.series.iter().find(|s| s.name == name)
    }

    /// Samples of a trend, empty when the series is unknown or has another kind.
    pub fn trend(&self, name: &str) -> &[TrendSample] {
        match self.find(name).map(|s| &s.data) {
            Some(SeriesData::Trend(samples)) => samples,
            _ => &[],
        }
    }

    pub fn trend_values(&self, name: &str) -> Vec<f64> {
        self.trend(name).iter().map(|s| s.value).collect()
    }

    pub fn counter(&self, name: &str) -> u64 {
        match self.find(name).map(|s| &s.data) {
            Some(SeriesData::Counter(v)) => *v,
            _ => 0,
        }
    }

    /// `(total, passes)` of a rate series.
    pub fn rate(&self, name: &str) -> (u64, u64) {
        match self.find(name).map(|s| &s.data) {
            Some(SeriesData::Rate { total, passes }) => (*total, *passes),
            _ => (0, 0),
        }
    }

    pub fn summarize(&self) -> Vec<MetricSeriesSummary> {
        self.series
            .iter()
            .map(|s| {
                let (tag_keys, values) = match &s.data {
                    SeriesData::Counter(v) => (Vec::new(), MetricValue::Counter(*v)),
                    SeriesData::Rate { total, passes } => (
                        Vec::new(),
                        MetricValue::Rate {
                            total: *total,
                            passes: *passes,
                            rate: (*total > 0).then(|| *passes as f64 / *total as f64),
                        },
                    ),
                    SeriesData::Trend(samples) => {
                        let mut keys: Vec<String> = samples
                            .iter()
                            .flat_map(|t| t.tags.iter().map(|(k, _)| k.to_string()))
                            .collect();
                        keys.sort_unstable();
                        keys.dedup();

                        let values: Vec<f64> = samples.iter().map(|t| t.value).collect();
                        (keys, MetricValue::Trend(summarize_trend(&values)))
                    }
                };

                MetricSeriesSummary {
                    name: s.name.clone(),
                    kind: s.kind,
                    tag_keys,
                    values,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(value: f64, session: &str) -> TrendSample {
        TrendSample {
            value,
            tags: vec![(Arc::from("sessionId"), Arc::from(session))],
            at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn summarize_reports_rates_and_empty_trends() {
        let snap = MetricsSnapshot::new(vec![
            SeriesSnapshot {
                name: "checks".to_string(),
                kind: MetricKind::Rate,
                data: SeriesData::Rate {
                    total: 4,
                    passes: 3,
                },
            },
            SeriesSnapshot {
                name: "X_Ms_Preparation_Time".to_string(),
                kind: MetricKind::Trend,
                data: SeriesData::Trend(Vec::new()),
            },
            SeriesSnapshot {
                name: "http_req_duration".to_string(),
                kind: MetricKind::Trend,
                data: SeriesData::Trend(vec![sample(1.0, "a"), sample(3.0, "b")]),
            },
        ]);

        let out = snap.summarize();
        assert_eq!(
            out[0].values,
            MetricValue::Rate {
                total: 4,
                passes: 3,
                rate: Some(0.75)
            }
        );
        assert_eq!(out[1].values, MetricValue::Trend(None));

        let MetricValue::Trend(Some(t)) = &out[2].values else {
            panic!("expected trend summary");
        };
        assert_eq!(t.count, 2);
        assert_eq!(t.med, 2.0);
        assert_eq!(out[2].tag_keys, ["sessionId"]);

        assert_eq!(snap.rate("checks"), (4, 3));
        assert_eq!(snap.counter("checks"), 0);
        assert!(snap.trend("missing").is_empty());
    }
}
