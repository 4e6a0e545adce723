//! Bounded samples of error detail per request label.
//!
//! Only the first [`ERROR_CACHE_CAPACITY`] error occurrences of a label are retained.
//! Later occurrences are dropped, never swapped in: the report shows what went wrong
//! first, not what went wrong last.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of error details kept per label.
pub const ERROR_CACHE_CAPACITY: usize = 3;

/// An append-only list that refuses new items once full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedList<T> {
    limit: usize,
    items: Vec<T>,
}

impl<T> BoundedList<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            items: Vec::with_capacity(limit),
        }
    }

    /// Append `item` if there is room. Returns `false` when the list is full.
    pub fn push(&mut self, item: T) -> bool {
        if self.items.len() < self.limit {
            self.items.push(item);
            true
        } else {
            false
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

/// Detail of one failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub label: String,
    pub error_label: String,
    pub error_code: String,
    pub error_message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorCache {
    entries: BTreeMap<String, BoundedList<ErrorEntry>>,
}

impl ErrorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for `label`. Returns `false` if the label's list is already full.
    pub fn record(&mut self, label: &str, entry: ErrorEntry) -> bool {
        if let Some(list) = self.entries.get_mut(label) {
            return list.push(entry);
        }
        let mut list = BoundedList::new(ERROR_CACHE_CAPACITY);
        let added = list.push(entry);
        self.entries.insert(label.to_owned(), list);
        added
    }

    /// Retained errors for `label`, in ingestion order.
    pub fn for_label(&self, label: &str) -> &[ErrorEntry] {
        self.entries
            .get(label)
            .map(BoundedList::as_slice)
            .unwrap_or(&[])
    }

    /// Labels with at least one retained error, in label order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Every retained entry, grouped by label in label order.
    pub fn entries(&self) -> impl Iterator<Item = &ErrorEntry> {
        self.entries.values().flat_map(|list| list.as_slice().iter())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append the entries of a cache built from later records.
    ///
    /// `other` must stem from records ingested after this cache's records for the
    /// result to keep first-come order.
    pub fn merge(&mut self, other: ErrorCache) {
        for (label, list) in other.entries {
            for entry in list.items {
                if !self.record(&label, entry) {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(label: &str, message: &str) -> ErrorEntry {
        ErrorEntry {
            label: label.to_string(),
            error_label: format!("{} - 500", label),
            error_code: "500".to_string(),
            error_message: message.to_string(),
            timestamp: Utc.timestamp_millis_opt(0).unwrap(),
        }
    }

    #[test]
    fn test_bounded_list_refuses_when_full() {
        let mut list = BoundedList::new(2);
        assert!(list.push(1));
        assert!(list.push(2));
        assert!(!list.push(3));
        assert_eq!(list.as_slice(), &[1, 2]);
    }

    #[test]
    fn test_keeps_first_three() {
        let mut cache = ErrorCache::new();
        for i in 0..15 {
            let added = cache.record("Login", entry("Login", &format!("error {}", i)));
            assert_eq!(added, i < 3);
        }

        let messages: Vec<_> = cache
            .for_label("Login")
            .iter()
            .map(|e| e.error_message.as_str())
            .collect();
        assert_eq!(messages, vec!["error 0", "error 1", "error 2"]);
    }

    #[test]
    fn test_unknown_label_is_empty() {
        let cache = ErrorCache::new();
        assert!(cache.for_label("nope").is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_labels_are_independent() {
        let mut cache = ErrorCache::new();
        for i in 0..5 {
            cache.record("A", entry("A", &i.to_string()));
        }
        cache.record("B", entry("B", "only"));

        assert_eq!(cache.for_label("A").len(), ERROR_CACHE_CAPACITY);
        assert_eq!(cache.for_label("B").len(), 1);
        assert_eq!(cache.labels().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(cache.entries().count(), 4);
    }

    #[test]
    fn test_merge_preserves_first_come_order() {
        let mut early = ErrorCache::new();
        early.record("A", entry("A", "first"));
        early.record("A", entry("A", "second"));

        let mut late = ErrorCache::new();
        late.record("A", entry("A", "third"));
        late.record("A", entry("A", "fourth"));
        late.record("C", entry("C", "other"));

        early.merge(late);
        let messages: Vec<_> = early
            .for_label("A")
            .iter()
            .map(|e| e.error_message.as_str())
            .collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
        assert_eq!(early.for_label("C").len(), 1);
    }
}
