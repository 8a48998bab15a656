// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution Results
//!
//! Result values flowing back from transformations, stages and whole runs.
//! Failures travel inside these values; the only condition re-raised as
//! `Err` across component boundaries is cancellation. The run result is the
//! single reliable surface for callers: success flag, record counts, error
//! and warning lists, and the statistics snapshot.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entities::{StageStatus, StatisticsSnapshot};
use crate::error::{ExecutionError, ExecutionWarning};
use crate::services::datetime_serde;
use crate::value_objects::{ExecutionId, PipelineId, Record, StageId};

/// Outcome of applying one transformation (or a rule-engine pass) to a
/// record.
///
/// Three shapes exist:
///
/// - **success** — `success == true`, `output` holds the produced record;
/// - **skip** — `success == false`, `skipped == true`, `output` preserves
///   the input record; non-fatal;
/// - **failure** — `success == false`, `errors` is non-empty; the input is
///   preserved in `output` so callers can inspect or route it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationResult {
    pub success: bool,
    pub output: Option<Record>,
    pub skipped: bool,
    pub skip_reason: Option<String>,
    pub errors: Vec<ExecutionError>,
    /// Names of the transformations applied, in application order.
    pub applied: Vec<String>,
    pub duration: Duration,
}

impl TransformationResult {
    /// A successful application producing `output`.
    pub fn success(output: Record) -> Self {
        Self {
            success: true,
            output: Some(output),
            skipped: false,
            skip_reason: None,
            errors: Vec::new(),
            applied: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// A skip verdict; the input record is preserved unchanged.
    pub fn skip(input: Record, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Some(input),
            skipped: true,
            skip_reason: Some(reason.into()),
            errors: Vec::new(),
            applied: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// A failure carrying at least one error; the input is preserved.
    pub fn failure(input: Option<Record>, error: ExecutionError) -> Self {
        Self {
            success: false,
            output: input,
            skipped: false,
            skip_reason: None,
            errors: vec![error],
            applied: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Appends a transformation name to the provenance list.
    pub fn with_applied(mut self, name: impl Into<String>) -> Self {
        self.applied.push(name.into());
        self
    }

    /// Sets the processing duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Checks whether the result is a non-fatal skip.
    pub fn is_skip(&self) -> bool {
        self.skipped
    }

    /// Checks whether the result is a failure (not a skip).
    pub fn is_failure(&self) -> bool {
        !self.success && !self.skipped
    }
}

/// Outcome of one stage within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageExecutionResult {
    pub stage_id: StageId,
    pub stage_name: String,
    pub status: StageStatus,
    pub records_processed: u64,
    #[serde(with = "datetime_serde")]
    pub started_at: chrono::DateTime<chrono::Utc>,
    #[serde(with = "datetime_serde::optional")]
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub errors: Vec<ExecutionError>,
    pub warnings: Vec<ExecutionWarning>,
}

impl StageExecutionResult {
    /// Opens a result for a stage that is about to run.
    pub fn started(stage_id: StageId, stage_name: impl Into<String>) -> Self {
        Self {
            stage_id,
            stage_name: stage_name.into(),
            status: StageStatus::Running,
            records_processed: 0,
            started_at: chrono::Utc::now(),
            completed_at: None,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Closes the result with a terminal status.
    pub fn finish(&mut self, status: StageStatus, records_processed: u64) {
        self.status = status;
        self.records_processed = records_processed;
        self.completed_at = Some(chrono::Utc::now());
    }

    /// Wall-clock duration, when the stage has completed.
    pub fn duration(&self) -> Option<Duration> {
        self.completed_at
            .map(|end| (end - self.started_at).to_std().unwrap_or(Duration::ZERO))
    }
}

/// Final outcome of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineExecutionResult {
    pub execution_id: ExecutionId,
    pub pipeline_id: PipelineId,
    #[serde(with = "datetime_serde")]
    pub start_time: chrono::DateTime<chrono::Utc>,
    #[serde(with = "datetime_serde")]
    pub end_time: chrono::DateTime<chrono::Utc>,
    pub success: bool,
    /// Pipeline-level failure classification (`PipelineValidation`,
    /// `StopOnError`, `ErrorBudgetExceeded`). Individual record and stage
    /// errors live in `errors`; this names the condition that terminated
    /// the run, without duplicating entries in the error list.
    pub failure_kind: Option<FailureKind>,
    pub records_processed: u64,
    pub records_failed: u64,
    pub errors: Vec<ExecutionError>,
    pub warnings: Vec<ExecutionWarning>,
    pub statistics: StatisticsSnapshot,
    pub stage_results: Vec<StageExecutionResult>,
}

/// Pipeline-level fatal condition that ended a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    PipelineValidation,
    StopOnError,
    ErrorBudgetExceeded,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::PipelineValidation => write!(f, "pipeline-validation"),
            FailureKind::StopOnError => write!(f, "stop-on-error"),
            FailureKind::ErrorBudgetExceeded => write!(f, "error-budget-exceeded"),
        }
    }
}

impl PipelineExecutionResult {
    /// Wall-clock duration of the run.
    pub fn duration(&self) -> Duration {
        (self.end_time - self.start_time).to_std().unwrap_or(Duration::ZERO)
    }

    /// Appends errors, de-duplicating by identity.
    pub fn extend_errors_deduped(&mut self, errors: impl IntoIterator<Item = ExecutionError>) {
        for error in errors {
            let identity = error.identity();
            if !self.errors.iter().any(|existing| existing.identity() == identity) {
                self.errors.push(error);
            }
        }
    }

    /// Appends warnings, de-duplicating by identity.
    pub fn extend_warnings_deduped(&mut self, warnings: impl IntoIterator<Item = ExecutionWarning>) {
        for warning in warnings {
            let identity = warning.identity();
            if !self.warnings.iter().any(|existing| existing.identity() == identity) {
                self.warnings.push(warning);
            }
        }
    }
}
