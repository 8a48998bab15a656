// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Stage Contract
//!
//! A stage is a unit with a prepare/execute/cleanup lifecycle, typed as
//! `Extract`, `Transform`, `Load` or `Custom`. Concrete stages implement the
//! [`Stage`] trait and embed a [`StageInfo`] carrying identity, order,
//! configuration and the shared status cell; shared behavior lives on
//! `StageInfo` rather than in an inheritance hierarchy.
//!
//! ## Status machine
//!
//! ```text
//! Ready ──▶ Running ──▶ { Completed | Failed | Cancelled }
//!   └─────▶ Skipped
//! ```
//!
//! Transitions are monotonic within a run; `reset()` returns a stage to
//! `Ready` between runs. The status lives behind a lock so concurrent
//! observers (orchestrator, monitors) read it safely while the run mutates
//! it.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::EtlError;
use crate::value_objects::{StageExecutionConfig, StageId};

use super::execution_context::ExecutionContext;

/// The kind of work a stage performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageType {
    /// Reads records from a source connector.
    Extract,
    /// Applies transformations or rules to the current batch.
    Transform,
    /// Writes records to a destination connector.
    Load,
    /// User-provided behavior.
    Custom,
}

impl std::fmt::Display for StageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageType::Extract => write!(f, "extract"),
            StageType::Transform => write!(f, "transform"),
            StageType::Load => write!(f, "load"),
            StageType::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for StageType {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "extract" => Ok(StageType::Extract),
            "transform" => Ok(StageType::Transform),
            "load" => Ok(StageType::Load),
            "custom" => Ok(StageType::Custom),
            _ => Err(EtlError::invalid_config(format!("Unknown stage type: {}", s))),
        }
    }
}

/// Lifecycle status of a stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    Ready,
    Running,
    Completed,
    Failed,
    Cancelled,
    Skipped,
}

impl StageStatus {
    /// Checks whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: StageStatus) -> bool {
        matches!(
            (self, next),
            (StageStatus::Ready, StageStatus::Running)
                | (StageStatus::Ready, StageStatus::Skipped)
                | (StageStatus::Running, StageStatus::Completed)
                | (StageStatus::Running, StageStatus::Failed)
                | (StageStatus::Running, StageStatus::Cancelled)
        )
    }

    /// Checks whether this status ends a run for the stage.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StageStatus::Completed | StageStatus::Failed | StageStatus::Cancelled | StageStatus::Skipped
        )
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Ready => write!(f, "ready"),
            StageStatus::Running => write!(f, "running"),
            StageStatus::Completed => write!(f, "completed"),
            StageStatus::Failed => write!(f, "failed"),
            StageStatus::Cancelled => write!(f, "cancelled"),
            StageStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Identity, ordering and lifecycle state embedded by every concrete stage.
#[derive(Debug, Clone)]
pub struct StageInfo {
    id: StageId,
    name: String,
    description: String,
    stage_type: StageType,
    order: u32,
    enabled: bool,
    config: StageExecutionConfig,
    status: Arc<RwLock<StageStatus>>,
}

impl StageInfo {
    /// Creates stage info with a fresh identity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the name is empty.
    pub fn new(
        name: impl Into<String>,
        stage_type: StageType,
        order: u32,
        config: StageExecutionConfig,
    ) -> Result<Self, EtlError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EtlError::invalid_config("Stage name cannot be empty"));
        }
        Ok(Self {
            id: StageId::new(),
            name,
            description: String::new(),
            stage_type,
            order,
            enabled: true,
            config,
            status: Arc::new(RwLock::new(StageStatus::Ready)),
        })
    }

    /// Sets a human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Enables or disables the stage. Disabled stages are marked `Skipped`
    /// at execution time without being removed.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn stage_type(&self) -> StageType {
        self.stage_type
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn config(&self) -> &StageExecutionConfig {
        &self.config
    }

    /// Reads the current status.
    pub fn status(&self) -> StageStatus {
        *self.status.read()
    }

    /// Transitions the status, enforcing monotonicity.
    ///
    /// # Errors
    ///
    /// Returns `StageExecution` when the transition is not legal from the
    /// current status.
    pub fn transition_to(&self, next: StageStatus) -> Result<(), EtlError> {
        let mut status = self.status.write();
        if !status.can_transition_to(next) {
            return Err(EtlError::stage_execution(format!(
                "Stage '{}': illegal status transition {} -> {}",
                self.name, *status, next
            )));
        }
        tracing::debug!(stage = %self.name, from = %*status, to = %next, "stage status transition");
        *status = next;
        Ok(())
    }

    /// Resets the status to `Ready` for a new run.
    pub fn reset(&self) {
        *self.status.write() = StageStatus::Ready;
    }
}

/// Contract implemented by every pipeline stage.
///
/// `prepare` and `cleanup` default to no-ops; `execute` produces the number
/// of records processed given a context. Implementations report failures by
/// returning `Err`; the pipeline layer converts those into
/// `STAGE_EXECUTION_ERROR` entries and decides escalation — a stage never
/// terminates the run on its own, with cancellation as the one exception.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Identity, order, configuration and status of this stage.
    fn info(&self) -> &StageInfo;

    /// Called before `execute`; acquire resources here.
    async fn prepare(&self, _context: &ExecutionContext) -> Result<(), EtlError> {
        Ok(())
    }

    /// Performs the stage's work and returns the number of records
    /// processed.
    async fn execute(&self, context: &ExecutionContext) -> Result<u64, EtlError>;

    /// Called after `execute` regardless of outcome; release resources
    /// here. Failures are logged as warnings, never escalated.
    async fn cleanup(&self, _context: &ExecutionContext) -> Result<(), EtlError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> StageInfo {
        StageInfo::new("test", StageType::Transform, 1, StageExecutionConfig::default()).unwrap()
    }

    #[test]
    fn empty_name_is_rejected() {
        let result = StageInfo::new("  ", StageType::Extract, 0, StageExecutionConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn status_transitions_are_monotonic() {
        let stage = info();
        stage.transition_to(StageStatus::Running).unwrap();
        stage.transition_to(StageStatus::Completed).unwrap();
        // terminal states admit no further transitions
        assert!(stage.transition_to(StageStatus::Running).is_err());
        assert!(stage.transition_to(StageStatus::Failed).is_err());
    }

    #[test]
    fn skipped_only_before_running() {
        let stage = info();
        stage.transition_to(StageStatus::Skipped).unwrap();

        let stage = info();
        stage.transition_to(StageStatus::Running).unwrap();
        assert!(stage.transition_to(StageStatus::Skipped).is_err());
    }

    #[test]
    fn reset_returns_to_ready() {
        let stage = info();
        stage.transition_to(StageStatus::Running).unwrap();
        stage.transition_to(StageStatus::Failed).unwrap();
        stage.reset();
        assert_eq!(stage.status(), StageStatus::Ready);
        stage.transition_to(StageStatus::Running).unwrap();
    }

    #[test]
    fn status_cell_is_shared_across_clones() {
        let stage = info();
        let observer = stage.clone();
        stage.transition_to(StageStatus::Running).unwrap();
        assert_eq!(observer.status(), StageStatus::Running);
    }
}
