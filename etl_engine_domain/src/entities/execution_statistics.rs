// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution Statistics
//!
//! Run-level counters shared by every stage context of an execution. All
//! counters are atomic so parallel transformation workers can update them
//! without locking; the per-stage duration map is guarded by a mutex and is
//! only touched at stage boundaries.
//!
//! [`ExecutionStatistics::snapshot`] produces the serializable view embedded
//! in run results.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Mutable, concurrency-safe statistics for a single run.
#[derive(Debug, Default)]
pub struct ExecutionStatistics {
    records_extracted: AtomicU64,
    records_processed: AtomicU64,
    records_failed: AtomicU64,
    records_skipped: AtomicU64,
    records_loaded: AtomicU64,
    fields_processed: AtomicU64,
    transformations_applied: AtomicU64,
    stage_durations: Mutex<HashMap<String, Duration>>,
}

impl ExecutionStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds extracted records.
    pub fn add_extracted(&self, count: u64) {
        self.records_extracted.fetch_add(count, Ordering::Relaxed);
    }

    /// Adds successfully processed records.
    pub fn add_processed(&self, count: u64) {
        self.records_processed.fetch_add(count, Ordering::Relaxed);
    }

    /// Adds failed records.
    pub fn add_failed(&self, count: u64) {
        self.records_failed.fetch_add(count, Ordering::Relaxed);
    }

    /// Adds skipped records.
    pub fn add_skipped(&self, count: u64) {
        self.records_skipped.fetch_add(count, Ordering::Relaxed);
    }

    /// Adds records written to a destination.
    pub fn add_loaded(&self, count: u64) {
        self.records_loaded.fetch_add(count, Ordering::Relaxed);
    }

    /// Adds fields affected by transformations.
    pub fn add_fields_processed(&self, count: u64) {
        self.fields_processed.fetch_add(count, Ordering::Relaxed);
    }

    /// Counts one applied transformation.
    pub fn add_transformation_applied(&self) {
        self.transformations_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the wall-clock duration of a completed stage.
    pub fn record_stage_duration(&self, stage_name: &str, duration: Duration) {
        self.stage_durations.lock().insert(stage_name.to_string(), duration);
    }

    pub fn records_extracted(&self) -> u64 {
        self.records_extracted.load(Ordering::Relaxed)
    }

    pub fn records_processed(&self) -> u64 {
        self.records_processed.load(Ordering::Relaxed)
    }

    pub fn records_failed(&self) -> u64 {
        self.records_failed.load(Ordering::Relaxed)
    }

    pub fn records_skipped(&self) -> u64 {
        self.records_skipped.load(Ordering::Relaxed)
    }

    pub fn records_loaded(&self) -> u64 {
        self.records_loaded.load(Ordering::Relaxed)
    }

    pub fn fields_processed(&self) -> u64 {
        self.fields_processed.load(Ordering::Relaxed)
    }

    pub fn transformations_applied(&self) -> u64 {
        self.transformations_applied.load(Ordering::Relaxed)
    }

    /// Produces a consistent, serializable snapshot of the counters.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            records_extracted: self.records_extracted(),
            records_processed: self.records_processed(),
            records_failed: self.records_failed(),
            records_skipped: self.records_skipped(),
            records_loaded: self.records_loaded(),
            fields_processed: self.fields_processed(),
            transformations_applied: self.transformations_applied(),
            stage_durations_ms: self
                .stage_durations
                .lock()
                .iter()
                .map(|(name, d)| (name.clone(), d.as_millis() as u64))
                .collect(),
        }
    }
}

/// Serializable point-in-time view of [`ExecutionStatistics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub records_extracted: u64,
    pub records_processed: u64,
    pub records_failed: u64,
    pub records_skipped: u64,
    pub records_loaded: u64,
    pub fields_processed: u64,
    pub transformations_applied: u64,
    pub stage_durations_ms: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counters_accumulate() {
        let stats = ExecutionStatistics::new();
        stats.add_processed(3);
        stats.add_processed(2);
        stats.add_skipped(1);
        stats.record_stage_duration("extract", Duration::from_millis(25));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.records_processed, 5);
        assert_eq!(snapshot.records_skipped, 1);
        assert_eq!(snapshot.stage_durations_ms.get("extract"), Some(&25));
    }

    #[test]
    fn concurrent_updates_are_lossless() {
        let stats = Arc::new(ExecutionStatistics::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stats = Arc::clone(&stats);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    stats.add_processed(1);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.records_processed(), 8000);
    }
}
