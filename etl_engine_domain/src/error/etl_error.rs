// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the hierarchical error system for the ETL engine
//! domain. It categorizes failures, provides actionable error messages, and
//! supports both automated handling and human-readable diagnostics.
//!
//! ## Overview
//!
//! The error system distinguishes two shapes of failure:
//!
//! - [`EtlError`]: the domain error enum used in `Result` signatures. Only
//!   cancellation is expected to cross component boundaries as `Err`; all
//!   other failures flow as values inside execution results.
//! - [`ExecutionError`] / [`ExecutionWarning`]: severity-tagged value records
//!   collected on execution contexts and copied into run results. These are
//!   the user-visible surface of a run.
//!
//! ## Error Categories
//!
//! - **Validation** (`InvalidConfiguration`, `PipelineValidation`): detected
//!   before execution; fatal, reported synchronously.
//! - **Transient** (`ConnectFailed`, `IoFailed`): connector-level failures;
//!   recoverable at the caller's discretion.
//! - **Data quality** (`TransformationFailed`, `FormatInvalid`): value-level
//!   issues routed per the transformation's validation action.
//! - **Stage** (`StageExecution`): unhandled stage failure; escalates to run
//!   termination only when the stop-on-error policy is set.
//! - **Cancellation** (`Cancelled`): a distinct terminal state, never folded
//!   into a generic failure.
//! - **Budget** (`ErrorBudgetExceeded`): accumulated errors exceeded the
//!   configured maximum.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::datetime_serde;

/// Domain-specific errors for the ETL execution engine.
///
/// Each variant carries a descriptive message. Variants are grouped by the
/// failure taxonomy; use [`EtlError::category`] for systematic handling and
/// [`EtlError::is_recoverable`] to distinguish retry-able conditions.
#[derive(Error, Debug, Clone)]
pub enum EtlError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Pipeline validation failed: {0}")]
    PipelineValidation(String),

    #[error("Stage execution failed: {0}")]
    StageExecution(String),

    #[error("Transformation failed: {0}")]
    TransformationFailed(String),

    #[error("Rule evaluation failed: {0}")]
    RuleEvaluation(String),

    #[error("Execution stopped on error: {0}")]
    StopOnError(String),

    #[error("Error budget exceeded: {0}")]
    ErrorBudgetExceeded(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("IO error: {0}")]
    IoFailed(String),

    #[error("Invalid format: {0}")]
    FormatInvalid(String),

    #[error("Scheduling error: {0}")]
    SchedulingError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EtlError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new pipeline validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::PipelineValidation(msg.into())
    }

    /// Creates a new stage execution error
    pub fn stage_execution(msg: impl Into<String>) -> Self {
        Self::StageExecution(msg.into())
    }

    /// Creates a new transformation error
    pub fn transformation(msg: impl Into<String>) -> Self {
        Self::TransformationFailed(msg.into())
    }

    /// Creates a new cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Creates a new scheduling error
    pub fn scheduling(msg: impl Into<String>) -> Self {
        Self::SchedulingError(msg.into())
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Checks if the error represents cancellation.
    ///
    /// Cancellation is the only condition that crosses component boundaries
    /// as a first-class signal; callers use this to avoid converting it into
    /// a generic failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, EtlError::Cancelled(_))
    }

    /// Checks if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EtlError::ConnectFailed(_) | EtlError::IoFailed(_) | EtlError::TransformationFailed(_)
        )
    }

    /// Gets the error category
    pub fn category(&self) -> &'static str {
        match self {
            EtlError::InvalidConfiguration(_) => "configuration",
            EtlError::PipelineValidation(_) => "validation",
            EtlError::StageExecution(_) => "stage",
            EtlError::TransformationFailed(_) => "transformation",
            EtlError::RuleEvaluation(_) => "rule",
            EtlError::StopOnError(_) => "policy",
            EtlError::ErrorBudgetExceeded(_) => "budget",
            EtlError::Cancelled(_) => "cancellation",
            EtlError::ConnectFailed(_) => "connector",
            EtlError::AuthFailed(_) => "connector",
            EtlError::IoFailed(_) => "io",
            EtlError::FormatInvalid(_) => "data",
            EtlError::SchedulingError(_) => "scheduling",
            EtlError::SerializationError(_) => "serialization",
            EtlError::NotFound(_) => "lookup",
            EtlError::Internal(_) => "internal",
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for EtlError {
    fn from(err: std::io::Error) -> Self {
        EtlError::IoFailed(err.to_string())
    }
}

impl From<serde_json::Error> for EtlError {
    fn from(err: serde_json::Error) -> Self {
        EtlError::SerializationError(err.to_string())
    }
}

/// Severity attached to execution errors and surfaced in run results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Warning => write!(f, "warning"),
            ErrorSeverity::Error => write!(f, "error"),
            ErrorSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// A single error observed during execution.
///
/// These records accumulate on the execution context and are copied into the
/// run result, de-duplicated by identity. Identity is the `(code, source,
/// message)` triple; two errors with the same identity are the same failure
/// observed twice.
///
/// Well-known codes include `STAGE_EXECUTION_ERROR`, `TRANSFORM_EXCEPTION`,
/// `PIPELINE_VALIDATION`, `ERROR_BUDGET_EXCEEDED` and `LOAD_WRITE_FAILED`;
/// rule-action failures use the rule id as the code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionError {
    pub message: String,
    pub code: String,
    pub source: String,
    pub severity: ErrorSeverity,
    #[serde(with = "datetime_serde")]
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl ExecutionError {
    /// Creates a new execution error with `Error` severity
    pub fn new(message: impl Into<String>, code: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            source: source.into(),
            severity: ErrorSeverity::Error,
            occurred_at: chrono::Utc::now(),
        }
    }

    /// Sets the severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Identity used for de-duplication when copying context errors into a
    /// run result.
    pub fn identity(&self) -> (String, String, String) {
        (self.code.clone(), self.source.clone(), self.message.clone())
    }
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.source, self.message)
    }
}

/// A non-fatal observation recorded during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionWarning {
    pub message: String,
    pub source: String,
    #[serde(with = "datetime_serde")]
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl ExecutionWarning {
    /// Creates a new execution warning
    pub fn new(message: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: source.into(),
            occurred_at: chrono::Utc::now(),
        }
    }

    /// Identity used for de-duplication
    pub fn identity(&self) -> (String, String) {
        (self.source.clone(), self.message.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_cover_taxonomy() {
        assert_eq!(EtlError::validation("x").category(), "validation");
        assert_eq!(EtlError::cancelled("x").category(), "cancellation");
        assert_eq!(EtlError::ErrorBudgetExceeded("x".into()).category(), "budget");
    }

    #[test]
    fn cancellation_is_distinct() {
        assert!(EtlError::cancelled("stop").is_cancellation());
        assert!(!EtlError::stage_execution("boom").is_cancellation());
    }

    #[test]
    fn execution_error_identity_ignores_timestamp() {
        let a = ExecutionError::new("m", "C", "s");
        let b = ExecutionError::new("m", "C", "s");
        assert_eq!(a.identity(), b.identity());
    }
}
