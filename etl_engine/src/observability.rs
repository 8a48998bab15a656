// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Observability
//!
//! Tracing bootstrap plus lightweight engine-level operation tracking.
//! Logging discipline across the engine: debug for progress, info for
//! lifecycle, warn for recoverable conditions, error for fatal ones.
//!
//! [`ObservabilityService`] tracks run-level operations (active count,
//! totals, error rate, health score); the per-transformation detail lives
//! in the performance monitor. An [`OperationTracker`] marks its operation
//! failed if dropped without an explicit completion, so abandoned
//! operations cannot leak an "active" slot.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing_subscriber::EnvFilter;

static TRACING_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Initializes the global tracing subscriber once.
///
/// `RUST_LOG` overrides `default_level`. Safe to call repeatedly; only the
/// first call installs a subscriber (tests call this freely).
pub fn init_tracing(default_level: &str) {
    let default_level = default_level.to_string();
    TRACING_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    });
}

#[derive(Debug, Clone)]
struct OperationStats {
    active_operations: u64,
    total_operations: u64,
    failed_operations: u64,
}

impl Default for OperationStats {
    fn default() -> Self {
        Self {
            active_operations: 0,
            total_operations: 0,
            failed_operations: 0,
        }
    }
}

/// Engine-level health snapshot.
#[derive(Debug, Clone)]
pub struct EngineHealth {
    pub active_operations: u64,
    pub total_operations: u64,
    pub error_rate_percent: f64,
    pub health_score: f64,
}

/// Tracks engine-level operations and derives a health score.
#[derive(Clone, Default)]
pub struct ObservabilityService {
    stats: Arc<RwLock<OperationStats>>,
}

impl ObservabilityService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking an operation; complete the returned tracker when
    /// the operation finishes.
    pub fn start_operation(&self, operation_name: &str) -> OperationTracker {
        let mut stats = self.stats.write();
        stats.active_operations += 1;
        stats.total_operations += 1;
        tracing::debug!(
            operation = operation_name,
            active = stats.active_operations,
            "operation started"
        );
        OperationTracker {
            operation_name: operation_name.to_string(),
            started: Instant::now(),
            service: self.clone(),
            completed: AtomicBool::new(false),
        }
    }

    fn complete_operation(&self, operation_name: &str, duration: std::time::Duration, success: bool) {
        let mut stats = self.stats.write();
        stats.active_operations = stats.active_operations.saturating_sub(1);
        if !success {
            stats.failed_operations += 1;
        }
        tracing::info!(
            operation = operation_name,
            duration_ms = duration.as_millis() as u64,
            success,
            "operation finished"
        );
    }

    /// Current engine health.
    pub fn health(&self) -> EngineHealth {
        let stats = self.stats.read();
        let error_rate = if stats.total_operations == 0 {
            0.0
        } else {
            stats.failed_operations as f64 / stats.total_operations as f64 * 100.0
        };
        // error rate dominates the score; a backlog of active operations
        // degrades it mildly
        let mut score = 100.0 - error_rate * 2.0;
        if stats.active_operations > 10 {
            score -= 10.0;
        }
        EngineHealth {
            active_operations: stats.active_operations,
            total_operations: stats.total_operations,
            error_rate_percent: error_rate,
            health_score: score.clamp(0.0, 100.0),
        }
    }
}

/// Scope guard for one tracked operation.
pub struct OperationTracker {
    operation_name: String,
    started: Instant,
    service: ObservabilityService,
    completed: AtomicBool,
}

impl OperationTracker {
    /// Completes the operation with an explicit outcome.
    pub fn complete(self, success: bool) {
        self.completed.store(true, std::sync::atomic::Ordering::Relaxed);
        self.service
            .complete_operation(&self.operation_name, self.started.elapsed(), success);
    }
}

impl Drop for OperationTracker {
    fn drop(&mut self) {
        // an abandoned tracker counts as a failed operation
        if !self.completed.load(std::sync::atomic::Ordering::Relaxed) {
            self.service
                .complete_operation(&self.operation_name, self.started.elapsed(), false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_operations_keep_health_high() {
        let service = ObservabilityService::new();
        for _ in 0..5 {
            service.start_operation("run").complete(true);
        }
        let health = service.health();
        assert_eq!(health.total_operations, 5);
        assert_eq!(health.active_operations, 0);
        assert_eq!(health.health_score, 100.0);
    }

    #[test]
    fn dropped_tracker_counts_as_failure() {
        let service = ObservabilityService::new();
        drop(service.start_operation("abandoned"));
        let health = service.health();
        assert_eq!(health.total_operations, 1);
        assert!(health.error_rate_percent > 99.0);
        assert!(health.health_score < 100.0);
    }
}
