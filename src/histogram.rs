//! Fixed-boundary bucket histograms.
//!
//! Unlike an HDR histogram these buckets are configured once from a static, ascending
//! list of upper bounds and never change shape, which keeps the per-label footprint to a
//! handful of counters and makes merging a plain element-wise addition.

use serde::Serialize;

/// A single bounded bucket: values `<= upper` that did not fit an earlier bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bucket {
    pub label: &'static str,
    pub upper: f64,
}

impl Bucket {
    const fn new(label: &'static str, upper: f64) -> Self {
        Self { label, upper }
    }
}

/// A complete bucket layout: bounded buckets plus the overflow label.
#[derive(Debug, PartialEq, Serialize)]
pub struct BucketLayout {
    pub buckets: &'static [Bucket],
    pub overflow_label: &'static str,
}

impl BucketLayout {
    /// Number of counter slots, including overflow.
    pub fn slots(&self) -> usize {
        self.buckets.len() + 1
    }

    /// Labels of every slot in order, overflow last.
    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.buckets
            .iter()
            .map(|bucket| bucket.label)
            .chain(std::iter::once(self.overflow_label))
    }

    /// Index of the slot a value falls into.
    pub fn slot_for(&self, value: f64) -> usize {
        self.buckets.partition_point(|bucket| bucket.upper < value)
    }
}

/// Response time buckets in milliseconds.
pub static MS_LAYOUT: BucketLayout = BucketLayout {
    buckets: &[
        Bucket::new("0-10ms", 10.0),
        Bucket::new("10-20ms", 20.0),
        Bucket::new("20-40ms", 40.0),
        Bucket::new("40-80ms", 80.0),
        Bucket::new("80-160ms", 160.0),
        Bucket::new("160-320ms", 320.0),
        Bucket::new("320-640ms", 640.0),
        Bucket::new("640-1280ms", 1280.0),
        Bucket::new("1280-2560ms", 2560.0),
        Bucket::new("2560-5120ms", 5120.0),
        Bucket::new("5120-10240ms", 10240.0),
        Bucket::new("10240-20480ms", 20480.0),
    ],
    overflow_label: "≥20480ms",
};

/// Payload size buckets in kilobytes.
pub static KB_LAYOUT: BucketLayout = BucketLayout {
    buckets: &[
        Bucket::new("0-1kb", 1.0),
        Bucket::new("1-2kb", 2.0),
        Bucket::new("2-4kb", 4.0),
        Bucket::new("4-8kb", 8.0),
        Bucket::new("8-16kb", 16.0),
        Bucket::new("16-32kb", 32.0),
        Bucket::new("32-64kb", 64.0),
        Bucket::new("64-128kb", 128.0),
        Bucket::new("128-256kb", 256.0),
        Bucket::new("256-512kb", 512.0),
        Bucket::new("512-1024kb", 1024.0),
        Bucket::new("1024-2048kb", 2048.0),
    ],
    overflow_label: "≥2048kb",
};

/// Count-only layout: a single catch-all slot.
pub static COUNT_LAYOUT: BucketLayout = BucketLayout {
    buckets: &[],
    overflow_label: "total",
};

/// Bucket counters over a static [`BucketLayout`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    #[serde(skip)]
    layout: &'static BucketLayout,
    counts: Vec<u64>,
}

impl Histogram {
    pub fn new(layout: &'static BucketLayout) -> Self {
        Self {
            layout,
            counts: vec![0; layout.slots()],
        }
    }

    /// Increment the counter of the bucket that `value` falls into.
    ///
    /// A value equal to a bound lands in that bound's bucket; anything above the last
    /// bound lands in the overflow slot.
    pub fn observe(&mut self, value: f64) {
        let slot = self.layout.slot_for(value);
        self.counts[slot] += 1;
    }

    pub fn layout(&self) -> &'static BucketLayout {
        self.layout
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Sum of every bucket counter.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// `(label, count)` pairs in bucket order.
    pub fn buckets(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.layout.labels().zip(self.counts.iter().copied())
    }

    /// Add another histogram's counters into this one.
    pub fn merge(&mut self, other: &Histogram) {
        debug_assert_eq!(self.layout, other.layout, "merging histograms of different layouts");
        for (mine, theirs) in self.counts.iter_mut().zip(&other.counts) {
            *mine += theirs;
        }
    }
}
