// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Performance Optimizer
//!
//! Adaptive advisor reading monitor aggregates and producing batch-size,
//! parallelism and memory recommendations, plus an overall health score.
//! Batch-size recommendations are cached for thirty minutes per
//! transformation so repeated queries during a run do not flap.
//!
//! ## Recommendation rules
//!
//! - **Batch size**: throughput below target with sub-100 ms records asks
//!   for larger batches, `min(1000, target/current·100)`; above-second
//!   records ask for smaller ones, `max(10, 100000/avg_ms)`; otherwise 100.
//! - **Parallelism**: advised only when records are slow (> 10 ms),
//!   throughput is low (< 500 rec/s) and the error rate is under 10 %.
//!   Degree = `min(cores, max(2, avg_ms/10))`, estimated speedup =
//!   `min(dop·0.8, cores·0.6)`.
//! - **Memory**: 100 MB peak suggests smaller batches, 500 MB suggests
//!   streaming, a peak above 3× the average suggests pooling.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use etl_engine_domain::entities::TransformationStats;
use etl_engine_domain::value_objects::TransformationId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::monitor::PerformanceMonitor;

const BATCH_CACHE_TTL_MINUTES: i64 = 30;
const DEFAULT_BATCH_SIZE: usize = 100;
const MB: u64 = 1024 * 1024;

/// Severity of a detected performance issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl IssueSeverity {
    /// Score penalty for one issue of this severity.
    pub fn penalty(self) -> i32 {
        match self {
            IssueSeverity::Critical => 30,
            IssueSeverity::High => 20,
            IssueSeverity::Medium => 10,
            IssueSeverity::Low => 5,
        }
    }
}

/// A detected issue with advice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceIssue {
    pub severity: IssueSeverity,
    pub message: String,
}

/// Advice on running a transformation in parallel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelRecommendation {
    pub advised: bool,
    pub degree_of_parallelism: usize,
    pub estimated_speedup: f64,
    pub reason: String,
}

/// Overall health report for a transformation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub transformation_id: TransformationId,
    pub score: u8,
    pub grade: char,
    pub issues: Vec<PerformanceIssue>,
}

struct CachedBatchSize {
    value: usize,
    computed_at: DateTime<Utc>,
}

/// Reads monitor statistics and produces adaptive recommendations.
pub struct PerformanceOptimizer {
    monitor: Arc<PerformanceMonitor>,
    /// Target throughput in records per second used by batch sizing.
    target_throughput: f64,
    batch_cache: Mutex<HashMap<TransformationId, CachedBatchSize>>,
}

impl PerformanceOptimizer {
    pub fn new(monitor: Arc<PerformanceMonitor>) -> Self {
        Self {
            monitor,
            target_throughput: 1000.0,
            batch_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Overrides the target throughput (records per second).
    pub fn with_target_throughput(mut self, target: f64) -> Self {
        self.target_throughput = target;
        self
    }

    /// Recommended batch size for a transformation; cached for thirty
    /// minutes.
    pub fn optimal_batch_size(&self, transformation_id: TransformationId) -> usize {
        {
            let cache = self.batch_cache.lock();
            if let Some(cached) = cache.get(&transformation_id) {
                if Utc::now() - cached.computed_at < ChronoDuration::minutes(BATCH_CACHE_TTL_MINUTES) {
                    return cached.value;
                }
            }
        }

        let value = match self.monitor.statistics(transformation_id) {
            Some(stats) => Self::compute_batch_size(&stats, self.target_throughput),
            None => DEFAULT_BATCH_SIZE,
        };

        self.batch_cache.lock().insert(
            transformation_id,
            CachedBatchSize {
                value,
                computed_at: Utc::now(),
            },
        );
        value
    }

    fn compute_batch_size(stats: &TransformationStats, target: f64) -> usize {
        let throughput = stats.throughput_records_per_sec();
        let avg_ms = stats.avg_processing_time().as_secs_f64() * 1000.0;

        if throughput > 0.0 && throughput < target && avg_ms < 100.0 {
            ((target / throughput) * 100.0).min(1000.0).max(1.0) as usize
        } else if avg_ms > 1000.0 {
            ((100_000.0 / avg_ms) as usize).max(10)
        } else {
            DEFAULT_BATCH_SIZE
        }
    }

    /// Parallel-execution advice for a transformation.
    pub fn parallel_recommendation(&self, transformation_id: TransformationId) -> ParallelRecommendation {
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);

        let Some(stats) = self.monitor.statistics(transformation_id) else {
            return ParallelRecommendation {
                advised: false,
                degree_of_parallelism: 1,
                estimated_speedup: 1.0,
                reason: "no statistics recorded".to_string(),
            };
        };

        let avg_ms = stats.avg_processing_time().as_secs_f64() * 1000.0;
        let throughput = stats.throughput_records_per_sec();
        let error_rate = stats.error_rate();

        let advised = avg_ms > 10.0 && throughput < 500.0 && error_rate < 0.10;
        if !advised {
            let reason = if avg_ms <= 10.0 {
                "records are fast; parallel overhead would dominate"
            } else if throughput >= 500.0 {
                "throughput is already high"
            } else {
                "error rate too high to parallelize safely"
            };
            return ParallelRecommendation {
                advised: false,
                degree_of_parallelism: 1,
                estimated_speedup: 1.0,
                reason: reason.to_string(),
            };
        }

        let dop = ((avg_ms / 10.0) as usize).max(2).min(cores);
        let estimated_speedup = (dop as f64 * 0.8).min(cores as f64 * 0.6);
        ParallelRecommendation {
            advised: true,
            degree_of_parallelism: dop,
            estimated_speedup,
            reason: format!("avg record {}ms at {:.0} rec/s", avg_ms as u64, throughput),
        }
    }

    /// Memory-behavior recommendations for a transformation.
    pub fn memory_recommendations(&self, transformation_id: TransformationId) -> Vec<PerformanceIssue> {
        let Some(stats) = self.monitor.statistics(transformation_id) else {
            return Vec::new();
        };

        let mut issues = Vec::new();
        let peak = stats.peak_memory_bytes;
        let avg = stats.avg_memory_bytes();

        if peak > 500 * MB {
            issues.push(PerformanceIssue {
                severity: IssueSeverity::High,
                message: format!("peak memory {} MB; switch to streaming processing", peak / MB),
            });
        } else if peak > 100 * MB {
            issues.push(PerformanceIssue {
                severity: IssueSeverity::Medium,
                message: format!("peak memory {} MB; reduce batch size", peak / MB),
            });
        }
        if avg > 0 && peak > 3 * avg {
            issues.push(PerformanceIssue {
                severity: IssueSeverity::Low,
                message: "peak memory exceeds 3x average; consider buffer pooling".to_string(),
            });
        }
        issues
    }

    /// Overall score and grade for a transformation.
    ///
    /// The score starts at 100, loses 30/20/10/5 per
    /// critical/high/medium/low issue, gains 10 for throughput above 1000
    /// rec/s, 10 for an error rate under 1 % and 5 for a success rate above
    /// 99 %, clamped to `[0, 100]`. Grades map at 90/80/70/60.
    pub fn performance_report(&self, transformation_id: TransformationId) -> Option<PerformanceReport> {
        let stats = self.monitor.statistics(transformation_id)?;
        let mut issues = self.memory_recommendations(transformation_id);

        let error_rate = stats.error_rate();
        if error_rate > 0.25 {
            issues.push(PerformanceIssue {
                severity: IssueSeverity::Critical,
                message: format!("error rate {:.0}%", error_rate * 100.0),
            });
        } else if error_rate > 0.10 {
            issues.push(PerformanceIssue {
                severity: IssueSeverity::High,
                message: format!("error rate {:.0}%", error_rate * 100.0),
            });
        }
        if stats.avg_processing_time().as_millis() > 1000 {
            issues.push(PerformanceIssue {
                severity: IssueSeverity::Medium,
                message: format!("average record time {} ms", stats.avg_processing_time().as_millis()),
            });
        }

        let mut score: i32 = 100;
        for issue in &issues {
            score -= issue.severity.penalty();
        }
        if stats.throughput_records_per_sec() > 1000.0 {
            score += 10;
        }
        if error_rate < 0.01 {
            score += 10;
        }
        if stats.success_rate() > 0.99 {
            score += 5;
        }
        let score = score.clamp(0, 100) as u8;

        Some(PerformanceReport {
            transformation_id,
            score,
            grade: Self::grade(score),
            issues,
        })
    }

    fn grade(score: u8) -> char {
        match score {
            90..=100 => 'A',
            80..=89 => 'B',
            70..=79 => 'C',
            60..=69 => 'D',
            _ => 'F',
        }
    }
}
