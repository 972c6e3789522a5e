use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::tags::TagSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MetricKind {
    Trend,
    Counter,
    Rate,
}

/// Quantiles reported for every trend, in report order.
pub const TREND_QUANTILES: [f64; 5] = [0.90, 0.95, 0.98, 0.99, 0.999];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub med: f64,
    pub avg: f64,
    pub p90: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub p99_9: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Counter(u64),
    Rate {
        total: u64,
        passes: u64,
        rate: Option<f64>,
    },
    /// `None` for a trend that never received a sample.
    Trend(Option<TrendSummary>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeriesSummary {
    pub name: String,
    pub kind: MetricKind,
    /// Tag keys observed across the series' samples (trends only).
    pub tag_keys: Vec<String>,
    pub values: MetricValue,
}

/// Linear interpolation between the closest ranks of an ascending sample slice.
///
/// `q` is clamped to `[0, 1]`. Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let q = q.clamp(0.0, 1.0);

    let rank = q * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let lo_v = sorted[lo.min(last)];
    let hi_v = sorted[hi.min(last)];

    let v = lo_v + (hi_v - lo_v) * (rank - lo as f64);
    // Rounding must never push an interpolated value outside its bracketing ranks.
    Some(v.clamp(lo_v, hi_v))
}

/// Summarize a trend's raw values. The slice does not need to be sorted.
pub fn summarize_trend(values: &[f64]) -> Option<TrendSummary> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len() as u64;
    let sum: f64 = sorted.iter().sum();
    let at = |q: f64| percentile(&sorted, q).unwrap_or_default();
    let [p90, p95, p98, p99, p99_9] = TREND_QUANTILES.map(at);

    Some(TrendSummary {
        count,
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        med: at(0.5),
        avg: sum / count as f64,
        p90,
        p95,
        p98,
        p99,
        p99_9,
    })
}

#[derive(Debug, Clone)]
pub(crate) struct RawSample {
    pub value: f64,
    pub tags: TagSet,
    pub at: SystemTime,
}

#[derive(Debug, Default)]
pub struct TrendStorage {
    samples: Mutex<Vec<RawSample>>,
}

impl TrendStorage {
    fn push(&self, value: f64, tags: TagSet, at: SystemTime) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.samples.lock().push(RawSample { value, tags, at });
        true
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn into_samples(self) -> Vec<RawSample> {
        self.samples.into_inner()
    }

    pub(crate) fn samples_cloned(&self) -> Vec<RawSample> {
        self.samples.lock().clone()
    }
}

#[derive(Debug, Default)]
pub struct RateStorage {
    pub total: AtomicU64,
    pub passes: AtomicU64,
}

#[derive(Debug)]
pub(crate) enum MetricStorage {
    Trend(Arc<TrendStorage>),
    Counter(Arc<AtomicU64>),
    Rate(Arc<RateStorage>),
}

impl MetricStorage {
    pub(crate) fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Trend => Self::Trend(Arc::new(TrendStorage::default())),
            MetricKind::Counter => Self::Counter(Arc::new(AtomicU64::new(0))),
            MetricKind::Rate => Self::Rate(Arc::new(RateStorage::default())),
        }
    }

    pub(crate) fn handle(&self) -> MetricHandle {
        match self {
            Self::Trend(t) => MetricHandle::Trend(t.clone()),
            Self::Counter(c) => MetricHandle::Counter(c.clone()),
            Self::Rate(r) => MetricHandle::Rate(r.clone()),
        }
    }
}

/// Write handle for one series. Cloning is cheap; all clones append to the same storage.
#[derive(Debug, Clone)]
pub enum MetricHandle {
    Trend(Arc<TrendStorage>),
    Counter(Arc<AtomicU64>),
    Rate(Arc<RateStorage>),
}

impl MetricHandle {
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Trend(_) => MetricKind::Trend,
            Self::Counter(_) => MetricKind::Counter,
            Self::Rate(_) => MetricKind::Rate,
        }
    }

    /// Appends a trend sample. Non-finite values are dropped and reported as `false`.
    #[inline]
    pub fn add_sample(&self, value: f64, tags: TagSet) -> bool {
        match self {
            Self::Trend(t) => t.push(value, tags, SystemTime::now()),
            _ => false,
        }
    }

    #[inline]
    pub fn add_sample_at(&self, value: f64, tags: TagSet, at: SystemTime) -> bool {
        match self {
            Self::Trend(t) => t.push(value, tags, at),
            _ => false,
        }
    }

    #[inline]
    pub fn increment(&self, value: u64) {
        if let Self::Counter(c) = self {
            c.fetch_add(value, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn add_check(&self, passed: bool) {
        if let Self::Rate(r) = self {
            r.total.fetch_add(1, Ordering::Relaxed);
            if passed {
                r.passes.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn get_counter(&self) -> u64 {
        match self {
            Self::Counter(c) => c.load(Ordering::Relaxed),
            _ => 0,
        }
    }

    /// `(total, passes)`.
    pub fn get_rate(&self) -> (u64, u64) {
        match self {
            Self::Rate(r) => (
                r.total.load(Ordering::Relaxed),
                r.passes.load(Ordering::Relaxed),
            ),
            _ => (0, 0),
        }
    }

    pub fn trend_len(&self) -> usize {
        match self {
            Self::Trend(t) => t.len(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates_between_ranks() {
        let s = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&s, 0.0), Some(10.0));
        assert_eq!(percentile(&s, 1.0), Some(40.0));
        assert_eq!(percentile(&s, 0.5), Some(25.0));
        // rank = 0.9 * 3 = 2.7 -> 30 + 10 * 0.7
        let p90 = percentile(&s, 0.9).unwrap_or_else(|| panic!("expected value"));
        assert!((p90 - 37.0).abs() < 1e-9);
        assert_eq!(percentile(&[], 0.5), None);
        assert_eq!(percentile(&[7.0], 0.999), Some(7.0));
    }

    #[test]
    fn trend_summary_is_ordered_for_arbitrary_samples() {
        let mut values = Vec::new();
        let mut x: u64 = 0x2545_f491;
        for _ in 0..1_000 {
            // xorshift
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            values.push((x % 10_000) as f64 / 7.0);
        }

        let s = summarize_trend(&values).unwrap_or_else(|| panic!("expected summary"));
        assert_eq!(s.count, 1_000);
        assert!(s.min <= s.med && s.med <= s.max);
        assert!(s.p90 <= s.p95);
        assert!(s.p95 <= s.p98);
        assert!(s.p98 <= s.p99);
        assert!(s.p99 <= s.p99_9);
        assert!(s.p99_9 <= s.max);
        assert!(s.min <= s.avg && s.avg <= s.max);
    }

    #[test]
    fn trend_summary_is_insensitive_to_input_order() {
        let a = summarize_trend(&[5.0, 1.0, 3.0, 2.0, 4.0]);
        let b = summarize_trend(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(a, b);
        assert_eq!(summarize_trend(&[]), None);
    }

    #[test]
    fn handles_update_their_own_kind_only() {
        let c = MetricStorage::new(MetricKind::Counter).handle();
        c.increment(2);
        c.increment(3);
        c.add_check(true);
        assert_eq!(c.get_counter(), 5);

        let r = MetricStorage::new(MetricKind::Rate).handle();
        r.add_check(true);
        r.add_check(false);
        r.add_check(true);
        assert_eq!(r.get_rate(), (3, 2));

        let t = MetricStorage::new(MetricKind::Trend).handle();
        assert!(t.add_sample(12.5, TagSet::default()));
        assert!(!t.add_sample(f64::NAN, TagSet::default()));
        assert_eq!(t.trend_len(), 1);
        assert_eq!(t.kind(), MetricKind::Trend);
    }
}
