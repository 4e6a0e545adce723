//! Per-run store of [`LabelMonitor`]s keyed by `(label, unit)`.
//!
//! A registry is owned by exactly one [`AggregationEngine`](crate::engine::AggregationEngine)
//! and is only ever grown; there is no removal. Enumeration is ordered by unit, then by
//! label, so two registries holding the same monitors compare equal regardless of the
//! order in which their records arrived.

use crate::metrics::{LabelMonitor, Unit};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitorRegistry {
    monitors: BTreeMap<Unit, BTreeMap<String, LabelMonitor>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the monitor for `(label, unit)`, creating a zero-valued one on first use.
    pub fn get_or_create(&mut self, label: &str, unit: Unit) -> &mut LabelMonitor {
        self.monitors
            .entry(unit)
            .or_default()
            .entry(label.to_owned())
            .or_insert_with(|| LabelMonitor::new(label, unit))
    }

    pub fn get(&self, label: &str, unit: Unit) -> Option<&LabelMonitor> {
        self.monitors.get(&unit)?.get(label)
    }

    /// Every monitor, ordered by unit then label.
    pub fn all(&self) -> impl Iterator<Item = &LabelMonitor> {
        self.monitors.values().flat_map(|by_label| by_label.values())
    }

    /// Monitors of a single unit, ordered by label.
    pub fn by_unit(&self, unit: Unit) -> impl Iterator<Item = &LabelMonitor> {
        self.monitors
            .get(&unit)
            .into_iter()
            .flat_map(|by_label| by_label.values())
    }

    pub fn len(&self) -> usize {
        self.monitors.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fold every monitor of `other` into this registry.
    ///
    /// Merging is associative and commutative, so registries built from disjoint slices
    /// of a record stream can be reduced in any grouping.
    pub fn merge(&mut self, other: MonitorRegistry) {
        for (unit, by_label) in other.monitors {
            let mine = self.monitors.entry(unit).or_default();
            for (label, monitor) in by_label {
                match mine.get_mut(&label) {
                    Some(existing) => existing.merge(&monitor),
                    None => {
                        mine.insert(label, monitor);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{UNIT_EXCEPTION, UNIT_MS};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_get_or_create_is_lazy_and_stable() {
        let mut registry = MonitorRegistry::new();
        assert!(registry.is_empty());

        let ts = Utc.timestamp_millis_opt(0).unwrap();
        registry.get_or_create("Home", UNIT_MS).update(ts, 12.0);
        registry.get_or_create("Home", UNIT_MS).update(ts, 8.0);
        registry.get_or_create("Home", UNIT_EXCEPTION).update(ts, 1.0);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("Home", UNIT_MS).map(|m| m.hits()), Some(2));
        assert!(registry.get("Login", UNIT_MS).is_none());
    }

    #[test]
    fn test_enumeration_is_ordered() {
        let mut registry = MonitorRegistry::new();
        let ts = Utc.timestamp_millis_opt(0).unwrap();
        for label in ["zeta", "alpha", "mid"] {
            registry.get_or_create(label, UNIT_MS).update(ts, 1.0);
        }
        registry.get_or_create("alpha", UNIT_EXCEPTION).update(ts, 1.0);

        let labels: Vec<_> = registry.by_unit(UNIT_MS).map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["alpha", "mid", "zeta"]);
        assert_eq!(registry.all().count(), 4);
        assert_eq!(registry.by_unit(crate::metrics::UNIT_KB).count(), 0);
    }

    #[test]
    fn test_merge_disjoint_and_overlapping() {
        let ts = Utc.timestamp_millis_opt(0).unwrap();
        let mut left = MonitorRegistry::new();
        let mut right = MonitorRegistry::new();
        left.get_or_create("Home", UNIT_MS).update(ts, 10.0);
        right.get_or_create("Home", UNIT_MS).update(ts, 20.0);
        right.get_or_create("Login", UNIT_MS).update(ts, 30.0);

        left.merge(right);
        assert_eq!(left.len(), 2);
        assert_eq!(left.get("Home", UNIT_MS).map(|m| m.hits()), Some(2));
        assert_eq!(left.get("Login", UNIT_MS).map(|m| m.total()), Some(30.0));
    }

    #[test]
    fn test_merge_is_commutative() {
        let mut a = MonitorRegistry::new();
        let mut b = MonitorRegistry::new();
        for i in 0..20i64 {
            let ts = Utc.timestamp_millis_opt(1_000 + i * 13).unwrap();
            let value = (i * 37 % 500) as f64;
            a.get_or_create("Home", UNIT_MS).update(ts, value);
            b.get_or_create(["Home", "Search"][(i % 2) as usize], UNIT_MS)
                .update(ts, value + 3.0);
        }
        b.get_or_create("Search", UNIT_EXCEPTION)
            .update(Utc.timestamp_millis_opt(5).unwrap(), 1.0);

        let mut ab = a.clone();
        ab.merge(b.clone());
        let mut ba = b;
        ba.merge(a);
        assert_eq!(ab, ba);
    }
}
