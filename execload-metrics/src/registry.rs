use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::key::{Interner, KeyId};
use crate::metrics::{MetricHandle, MetricKind, MetricStorage};
use crate::snapshot::{MetricsSnapshot, SeriesData, SeriesSnapshot, TrendSample};
use crate::tags::TagSet;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricId(u32);

#[derive(Debug)]
struct MetricDef {
    name: KeyId,
    kind: MetricKind,
}

/// Append-only store of named series shared by every writer of a run.
///
/// Reads happen through [`Registry::into_snapshot`], which consumes the registry.
#[derive(Debug, Default)]
pub struct Registry {
    interner: Interner,
    defs: RwLock<Vec<MetricDef>>,
    storage: DashMap<MetricId, MetricStorage>,
}

impl Registry {
    /// Registers a series, or returns the existing id when the name is already known with the
    /// same kind.
    pub fn register(&self, name: &str, kind: MetricKind) -> Result<MetricId> {
        let name_id = self.interner.get_or_intern(name);

        let mut defs = self.defs.write();
        if let Some((idx, def)) = defs.iter().enumerate().find(|(_, d)| d.name == name_id) {
            if def.kind != kind {
                return Err(Error::KindConflict {
                    name: name.to_string(),
                    registered: def.kind,
                    requested: kind,
                });
            }
            return Ok(MetricId(idx as u32));
        }

        let id = MetricId(defs.len() as u32);
        defs.push(MetricDef {
            name: name_id,
            kind,
        });
        self.storage.insert(id, MetricStorage::new(kind));
        Ok(id)
    }

    pub fn handle(&self, metric: MetricId) -> Option<MetricHandle> {
        self.storage.get(&metric).map(|s| s.value().handle())
    }

    /// Registers `name` and returns a write handle for it.
    pub fn register_handle(&self, name: &str, kind: MetricKind) -> Result<MetricHandle> {
        let id = self.register(name, kind)?;
        self.handle(id)
            .ok_or_else(|| Error::UnknownMetric(name.to_string()))
    }

    pub fn resolve_key(&self, key: &str) -> KeyId {
        self.interner.get_or_intern(key)
    }

    pub fn resolve_tags(&self, tags: &[(&str, &str)]) -> TagSet {
        let mut resolved: Vec<(KeyId, KeyId)> = tags
            .iter()
            .map(|(k, v)| (self.resolve_key(k), self.resolve_key(v)))
            .collect();
        resolved.sort_unstable();
        TagSet::from_sorted_iter(resolved)
    }

    pub fn len(&self) -> usize {
        self.defs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freezes the registry into a read-only snapshot, in registration order.
    ///
    /// Handles that outlive the registry keep their storage alive; their samples are copied
    /// rather than moved, so a late write never reaches the snapshot.
    pub fn into_snapshot(self) -> MetricsSnapshot {
        let Self {
            interner,
            defs,
            storage,
        } = self;

        let resolve =
            |id: KeyId| -> Arc<str> { interner.resolve(id).unwrap_or_else(|| Arc::from("")) };

        let defs = defs.into_inner();
        let mut series = Vec::with_capacity(defs.len());
        for (idx, def) in defs.into_iter().enumerate() {
            let Some((_, stored)) = storage.remove(&MetricId(idx as u32)) else {
                continue;
            };

            let data = match stored {
                MetricStorage::Counter(c) => SeriesData::Counter(c.load(Ordering::Relaxed)),
                MetricStorage::Rate(r) => SeriesData::Rate {
                    total: r.total.load(Ordering::Relaxed),
                    passes: r.passes.load(Ordering::Relaxed),
                },
                MetricStorage::Trend(t) => {
                    let raw = match Arc::try_unwrap(t) {
                        Ok(owned) => owned.into_samples(),
                        Err(shared) => shared.samples_cloned(),
                    };
                    let samples = raw
                        .into_iter()
                        .map(|s| TrendSample {
                            value: s.value,
                            tags: s.tags.iter().map(|(k, v)| (resolve(k), resolve(v))).collect(),
                            at: s.at,
                        })
                        .collect();
                    SeriesData::Trend(samples)
                }
            };

            series.push(SeriesSnapshot {
                name: resolve(def.name).to_string(),
                kind: def.kind,
                data,
            });
        }

        MetricsSnapshot::new(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent_per_name_and_kind() {
        let reg = Registry::default();
        let a = reg
            .register("checks", MetricKind::Rate)
            .unwrap_or_else(|e| panic!("register: {e}"));
        let b = reg
            .register("checks", MetricKind::Rate)
            .unwrap_or_else(|e| panic!("register: {e}"));
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);

        let err = reg.register("checks", MetricKind::Trend);
        assert!(matches!(err, Err(Error::KindConflict { .. })));
    }

    #[test]
    fn snapshot_keeps_registration_order_and_resolves_tags() {
        let reg = Registry::default();
        let trend = reg
            .register("http_req_duration", MetricKind::Trend)
            .unwrap_or_else(|e| panic!("register: {e}"));
        let iters = reg
            .register("iterations", MetricKind::Counter)
            .unwrap_or_else(|e| panic!("register: {e}"));

        let tags = reg.resolve_tags(&[("status", "200"), ("sessionId", "R1_0")]);
        let h = reg.handle(trend).unwrap_or_else(|| panic!("missing handle"));
        h.add_sample(12.0, tags);
        reg.handle(iters)
            .unwrap_or_else(|| panic!("missing handle"))
            .increment(1);

        let snap = reg.into_snapshot();
        let names: Vec<&str> = snap.series().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["http_req_duration", "iterations"]);

        let samples = snap.trend("http_req_duration");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].tag("sessionId"), Some("R1_0"));
        assert_eq!(samples[0].tag("status"), Some("200"));
        assert_eq!(snap.counter("iterations"), 1);
    }

    #[test]
    fn writes_through_a_leaked_handle_do_not_reach_the_snapshot() {
        let reg = Registry::default();
        let trend = reg
            .register("t", MetricKind::Trend)
            .unwrap_or_else(|e| panic!("register: {e}"));
        let h = reg.handle(trend).unwrap_or_else(|| panic!("missing handle"));
        h.add_sample(1.0, TagSet::default());

        let snap = reg.into_snapshot();
        h.add_sample(2.0, TagSet::default());

        assert_eq!(snap.trend("t").len(), 1);
    }
}
