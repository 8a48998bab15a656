// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution Status and History
//!
//! Status of active executions and the record kept once they finish.
//! History is held in memory by the orchestrator; a pluggable
//! [`ExecutionHistorySink`] may be injected to forward entries elsewhere,
//! but persistence is not part of the core contract.

use serde::{Deserialize, Serialize};

use crate::results::PipelineExecutionResult;
use crate::services::datetime_serde;
use crate::value_objects::{ExecutionId, PipelineId};

/// Lifecycle state of an execution as tracked by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionState::Pending => write!(f, "pending"),
            ExecutionState::Running => write!(f, "running"),
            ExecutionState::Completed => write!(f, "completed"),
            ExecutionState::Failed => write!(f, "failed"),
            ExecutionState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Live status of a registered execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub execution_id: ExecutionId,
    pub pipeline_id: PipelineId,
    pub pipeline_name: String,
    pub state: ExecutionState,
    pub records_processed: u64,
    #[serde(with = "datetime_serde")]
    pub started_at: chrono::DateTime<chrono::Utc>,
    #[serde(with = "datetime_serde")]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl ExecutionStatus {
    /// Creates the registration entry for a run that is starting.
    pub fn running(execution_id: ExecutionId, pipeline_id: PipelineId, pipeline_name: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            execution_id,
            pipeline_id,
            pipeline_name: pipeline_name.into(),
            state: ExecutionState::Running,
            records_processed: 0,
            started_at: now,
            updated_at: now,
        }
    }

    /// Moves the status to a new state.
    pub fn transition(&mut self, state: ExecutionState, records_processed: u64) {
        self.state = state;
        self.records_processed = records_processed;
        self.updated_at = chrono::Utc::now();
    }

    /// Checks whether execution has reached a terminal state.
    pub fn is_complete(&self) -> bool {
        matches!(
            self.state,
            ExecutionState::Completed | ExecutionState::Failed | ExecutionState::Cancelled
        )
    }

    /// Checks whether execution is still in flight.
    pub fn is_active(&self) -> bool {
        matches!(self.state, ExecutionState::Pending | ExecutionState::Running)
    }
}

/// History entry for a finished execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: ExecutionId,
    pub pipeline_id: PipelineId,
    pub pipeline_name: String,
    pub state: ExecutionState,
    pub records_processed: u64,
    pub records_failed: u64,
    pub error_count: u64,
    pub warning_count: u64,
    #[serde(with = "datetime_serde")]
    pub started_at: chrono::DateTime<chrono::Utc>,
    #[serde(with = "datetime_serde::optional")]
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ExecutionRecord {
    /// Builds a history entry from a finished run result.
    pub fn from_result(pipeline_name: &str, state: ExecutionState, result: &PipelineExecutionResult) -> Self {
        Self {
            execution_id: result.execution_id,
            pipeline_id: result.pipeline_id,
            pipeline_name: pipeline_name.to_string(),
            state,
            records_processed: result.records_processed,
            records_failed: result.records_failed,
            error_count: result.errors.len() as u64,
            warning_count: result.warnings.len() as u64,
            started_at: result.start_time,
            completed_at: Some(result.end_time),
        }
    }
}

/// Pluggable sink receiving history entries as executions finish.
///
/// The default orchestrator keeps history in memory only; injecting a sink
/// adds forwarding without changing that behavior. Sinks must not block:
/// entries are delivered on the orchestrator's execution path.
pub trait ExecutionHistorySink: Send + Sync {
    fn record(&self, entry: &ExecutionRecord);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lifecycle() {
        let mut status = ExecutionStatus::running(ExecutionId::new(), PipelineId::new(), "p");
        assert!(status.is_active());
        assert!(!status.is_complete());

        status.transition(ExecutionState::Completed, 10);
        assert!(status.is_complete());
        assert_eq!(status.records_processed, 10);
        assert!(status.updated_at >= status.started_at);
    }
}
