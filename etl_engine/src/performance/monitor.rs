// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Performance Monitor
//!
//! Session-scoped performance tracking for transformations. A session is a
//! bounded monitoring scope over a sequence of transformation invocations:
//! it accumulates samples while open and merges into the transformation's
//! lifetime aggregate when closed. Merging happens under the
//! per-transformation lock; up to 100 recent sessions are retained per
//! transformation, oldest first out.
//!
//! Sessions merge on drop as well, so a panicking or early-returning caller
//! cannot lose samples.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use etl_engine_domain::entities::{SessionStats, TransformationStats};
use etl_engine_domain::value_objects::TransformationId;
use parking_lot::{Mutex, RwLock};

/// Sessions retained per transformation; the oldest entry is discarded
/// beyond this.
pub const SESSION_HISTORY_LIMIT: usize = 100;

struct TransformationEntry {
    aggregate: TransformationStats,
    history: VecDeque<SessionStats>,
}

impl TransformationEntry {
    fn new(id: TransformationId, name: &str) -> Self {
        Self {
            aggregate: TransformationStats::new(id, name),
            history: VecDeque::new(),
        }
    }

    fn merge(&mut self, session: SessionStats) {
        self.aggregate.merge_session(&session);
        self.history.push_back(session);
        while self.history.len() > SESSION_HISTORY_LIMIT {
            self.history.pop_front();
        }
    }
}

/// Per-transformation performance statistics collector.
#[derive(Default)]
pub struct PerformanceMonitor {
    entries: RwLock<HashMap<TransformationId, Arc<Mutex<TransformationEntry>>>>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a monitoring session for a transformation.
    pub fn start_session(&self, transformation_id: TransformationId, name: &str) -> MonitoringSession {
        let entry = {
            let mut entries = self.entries.write();
            Arc::clone(
                entries
                    .entry(transformation_id)
                    .or_insert_with(|| Arc::new(Mutex::new(TransformationEntry::new(transformation_id, name)))),
            )
        };
        tracing::debug!(transformation = name, "monitoring session opened");
        MonitoringSession {
            stats: Some(SessionStats::new(transformation_id, name)),
            entry,
        }
    }

    /// Lifetime aggregate for a transformation, if it has been monitored.
    pub fn statistics(&self, transformation_id: TransformationId) -> Option<TransformationStats> {
        let entries = self.entries.read();
        entries.get(&transformation_id).map(|entry| entry.lock().aggregate.clone())
    }

    /// Aggregates for every monitored transformation.
    pub fn all_statistics(&self) -> Vec<TransformationStats> {
        let entries = self.entries.read();
        entries.values().map(|entry| entry.lock().aggregate.clone()).collect()
    }

    /// Recent session history for a transformation (up to
    /// [`SESSION_HISTORY_LIMIT`] entries, oldest first).
    pub fn session_history(&self, transformation_id: TransformationId) -> Vec<SessionStats> {
        let entries = self.entries.read();
        entries
            .get(&transformation_id)
            .map(|entry| entry.lock().history.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// A bounded monitoring scope; merges into the aggregate on close (or
/// drop).
pub struct MonitoringSession {
    stats: Option<SessionStats>,
    entry: Arc<Mutex<TransformationEntry>>,
}

impl MonitoringSession {
    /// Records one processed record.
    pub fn record_processing(&mut self, duration: Duration, success: bool) {
        if let Some(stats) = &mut self.stats {
            stats.record_processing(duration, success);
        }
    }

    /// Records a memory usage sample.
    pub fn record_memory_usage(&mut self, bytes: u64) {
        if let Some(stats) = &mut self.stats {
            stats.record_memory_usage(bytes);
        }
    }

    /// Records an observed error.
    pub fn record_error(&mut self, message: &str) {
        if let Some(stats) = &mut self.stats {
            tracing::debug!(transformation = %stats.transformation_name, "session error: {}", message);
            stats.record_error();
        }
    }

    /// Records an observed warning.
    pub fn record_warning(&mut self, message: &str) {
        if let Some(stats) = &mut self.stats {
            tracing::debug!(transformation = %stats.transformation_name, "session warning: {}", message);
            stats.record_warning();
        }
    }

    /// Snapshot of the session's accumulated samples.
    pub fn statistics(&self) -> Option<SessionStats> {
        self.stats.clone()
    }

    /// Closes the session, merging its samples into the transformation
    /// aggregate.
    pub fn close(mut self) {
        self.merge_now();
    }

    fn merge_now(&mut self) {
        if let Some(mut stats) = self.stats.take() {
            stats.close();
            self.entry.lock().merge(stats);
        }
    }
}

impl Drop for MonitoringSession {
    fn drop(&mut self) {
        self.merge_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_merge_into_aggregate() {
        let monitor = PerformanceMonitor::new();
        let id = TransformationId::new();

        for _ in 0..3 {
            let mut session = monitor.start_session(id, "upper");
            session.record_processing(Duration::from_millis(5), true);
            session.record_processing(Duration::from_millis(5), false);
            session.close();
        }

        let stats = monitor.statistics(id).unwrap();
        assert_eq!(stats.session_count, 3);
        assert_eq!(stats.total_records_processed, 6);
        assert_eq!(stats.total_records_failed, 3);
        assert_eq!(monitor.session_history(id).len(), 3);
    }

    #[test]
    fn dropped_session_still_merges() {
        let monitor = PerformanceMonitor::new();
        let id = TransformationId::new();
        {
            let mut session = monitor.start_session(id, "dropped");
            session.record_processing(Duration::from_millis(1), true);
            // dropped without close()
        }
        assert_eq!(monitor.statistics(id).unwrap().total_records_processed, 1);
    }

    #[test]
    fn history_is_bounded() {
        let monitor = PerformanceMonitor::new();
        let id = TransformationId::new();
        for i in 0..(SESSION_HISTORY_LIMIT + 10) {
            let mut session = monitor.start_session(id, "bounded");
            session.record_processing(Duration::from_millis(i as u64 % 7), true);
            session.close();
        }
        let history = monitor.session_history(id);
        assert_eq!(history.len(), SESSION_HISTORY_LIMIT);
        // the aggregate still saw every session
        let stats = monitor.statistics(id).unwrap();
        assert_eq!(stats.session_count, (SESSION_HISTORY_LIMIT + 10) as u64);
    }

    #[test]
    fn aggregation_sums_across_sessions() {
        let monitor = PerformanceMonitor::new();
        let id = TransformationId::new();
        let counts = [2u64, 9, 4];
        for count in counts {
            let mut session = monitor.start_session(id, "sum");
            for _ in 0..count {
                session.record_processing(Duration::from_micros(100), true);
            }
            session.close();
        }
        let total: u64 = monitor
            .session_history(id)
            .iter()
            .map(|s| s.records_processed)
            .sum();
        assert_eq!(monitor.statistics(id).unwrap().total_records_processed, total);
    }
}
