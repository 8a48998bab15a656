// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transformation Performance Aggregates
//!
//! Per-transformation performance data collected by the monitor. A
//! [`SessionStats`] accumulates samples for one bounded monitoring scope;
//! on close the monitor merges it into the transformation's
//! [`TransformationStats`] aggregate.
//!
//! Aggregation law: the sum of `records_processed` across merged sessions
//! equals the aggregate's `total_records_processed`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::datetime_serde;
use crate::value_objects::TransformationId;

/// Samples accumulated by a single monitoring session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: uuid::Uuid,
    pub transformation_id: TransformationId,
    pub transformation_name: String,
    #[serde(with = "datetime_serde")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "datetime_serde::optional")]
    pub closed_at: Option<DateTime<Utc>>,
    pub records_processed: u64,
    pub records_successful: u64,
    pub records_failed: u64,
    pub min_processing_time: Option<Duration>,
    pub max_processing_time: Option<Duration>,
    pub total_processing_time: Duration,
    pub peak_memory_bytes: u64,
    pub memory_sample_sum: u64,
    pub memory_sample_count: u64,
    pub error_count: u64,
    pub warning_count: u64,
}

impl SessionStats {
    /// Opens a new, empty session.
    pub fn new(transformation_id: TransformationId, transformation_name: impl Into<String>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4(),
            transformation_id,
            transformation_name: transformation_name.into(),
            started_at: Utc::now(),
            closed_at: None,
            records_processed: 0,
            records_successful: 0,
            records_failed: 0,
            min_processing_time: None,
            max_processing_time: None,
            total_processing_time: Duration::ZERO,
            peak_memory_bytes: 0,
            memory_sample_sum: 0,
            memory_sample_count: 0,
            error_count: 0,
            warning_count: 0,
        }
    }

    /// Records one processed record with its duration and outcome.
    pub fn record_processing(&mut self, duration: Duration, success: bool) {
        self.records_processed += 1;
        if success {
            self.records_successful += 1;
        } else {
            self.records_failed += 1;
        }
        self.total_processing_time += duration;
        self.min_processing_time = Some(match self.min_processing_time {
            Some(min) => min.min(duration),
            None => duration,
        });
        self.max_processing_time = Some(match self.max_processing_time {
            Some(max) => max.max(duration),
            None => duration,
        });
    }

    /// Records a memory usage sample.
    pub fn record_memory_usage(&mut self, bytes: u64) {
        self.peak_memory_bytes = self.peak_memory_bytes.max(bytes);
        self.memory_sample_sum += bytes;
        self.memory_sample_count += 1;
    }

    /// Records an observed error.
    pub fn record_error(&mut self) {
        self.error_count += 1;
    }

    /// Records an observed warning.
    pub fn record_warning(&mut self) {
        self.warning_count += 1;
    }

    /// Average processing time per record.
    pub fn avg_processing_time(&self) -> Duration {
        if self.records_processed == 0 {
            Duration::ZERO
        } else {
            self.total_processing_time / self.records_processed as u32
        }
    }

    /// Average of the recorded memory samples.
    pub fn avg_memory_bytes(&self) -> u64 {
        if self.memory_sample_count == 0 {
            0
        } else {
            self.memory_sample_sum / self.memory_sample_count
        }
    }

    /// Records per second over the session's accumulated processing time.
    pub fn throughput_records_per_sec(&self) -> f64 {
        let secs = self.total_processing_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.records_processed as f64 / secs
        }
    }

    /// Marks the session closed.
    pub fn close(&mut self) {
        self.closed_at = Some(Utc::now());
    }
}

/// Lifetime aggregate for one transformation across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationStats {
    pub transformation_id: TransformationId,
    pub transformation_name: String,
    pub total_records_processed: u64,
    pub total_records_successful: u64,
    pub total_records_failed: u64,
    pub min_processing_time: Option<Duration>,
    pub max_processing_time: Option<Duration>,
    pub total_processing_time: Duration,
    pub peak_memory_bytes: u64,
    pub memory_sample_sum: u64,
    pub memory_sample_count: u64,
    pub session_count: u64,
    pub error_count: u64,
    pub warning_count: u64,
    #[serde(with = "datetime_serde::optional")]
    pub first_execution: Option<DateTime<Utc>>,
    #[serde(with = "datetime_serde::optional")]
    pub last_execution: Option<DateTime<Utc>>,
}

impl TransformationStats {
    /// Creates an empty aggregate.
    pub fn new(transformation_id: TransformationId, transformation_name: impl Into<String>) -> Self {
        Self {
            transformation_id,
            transformation_name: transformation_name.into(),
            total_records_processed: 0,
            total_records_successful: 0,
            total_records_failed: 0,
            min_processing_time: None,
            max_processing_time: None,
            total_processing_time: Duration::ZERO,
            peak_memory_bytes: 0,
            memory_sample_sum: 0,
            memory_sample_count: 0,
            session_count: 0,
            error_count: 0,
            warning_count: 0,
            first_execution: None,
            last_execution: None,
        }
    }

    /// Merges a closed session into the aggregate.
    pub fn merge_session(&mut self, session: &SessionStats) {
        self.total_records_processed += session.records_processed;
        self.total_records_successful += session.records_successful;
        self.total_records_failed += session.records_failed;
        self.total_processing_time += session.total_processing_time;
        self.peak_memory_bytes = self.peak_memory_bytes.max(session.peak_memory_bytes);
        self.memory_sample_sum += session.memory_sample_sum;
        self.memory_sample_count += session.memory_sample_count;
        self.session_count += 1;
        self.error_count += session.error_count;
        self.warning_count += session.warning_count;

        self.min_processing_time = match (self.min_processing_time, session.min_processing_time) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max_processing_time = match (self.max_processing_time, session.max_processing_time) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        if self.first_execution.is_none() {
            self.first_execution = Some(session.started_at);
        }
        self.last_execution = session.closed_at.or(Some(session.started_at));
    }

    /// Average processing time per record.
    pub fn avg_processing_time(&self) -> Duration {
        if self.total_records_processed == 0 {
            Duration::ZERO
        } else {
            self.total_processing_time / self.total_records_processed as u32
        }
    }

    /// Average of the recorded memory samples.
    pub fn avg_memory_bytes(&self) -> u64 {
        if self.memory_sample_count == 0 {
            0
        } else {
            self.memory_sample_sum / self.memory_sample_count
        }
    }

    /// Records per second over accumulated processing time.
    pub fn throughput_records_per_sec(&self) -> f64 {
        let secs = self.total_processing_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.total_records_processed as f64 / secs
        }
    }

    /// Failed records as a fraction of processed records, in `[0, 1]`.
    pub fn error_rate(&self) -> f64 {
        if self.total_records_processed == 0 {
            0.0
        } else {
            self.total_records_failed as f64 / self.total_records_processed as f64
        }
    }

    /// Successful records as a fraction of processed records, in `[0, 1]`.
    pub fn success_rate(&self) -> f64 {
        if self.total_records_processed == 0 {
            1.0
        } else {
            self.total_records_successful as f64 / self.total_records_processed as f64
        }
    }
}
