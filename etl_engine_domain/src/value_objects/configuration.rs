// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Configuration Value Objects
//!
//! Typed configuration for pipelines, stages, schedules and the
//! orchestrator. Every struct rejects unknown keys on deserialization, so a
//! misspelled setting fails loudly instead of being silently ignored.

use serde::{Deserialize, Serialize};

use super::cron_expression::CronExpression;
use crate::error::EtlError;

/// Error-handling policy for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ErrorHandlingConfig {
    /// Abort remaining stages as soon as a stage fails.
    pub stop_on_error: bool,
    /// Maximum number of accumulated errors before the run is forcibly
    /// failed. Zero means a single error trips the budget.
    pub max_errors: u64,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            stop_on_error: false,
            max_errors: 100,
        }
    }
}

/// Default batch sizing and parallelism for a pipeline's stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExecutionDefaults {
    pub batch_size: usize,
    /// Requested degree of parallelism for `Parallel` stages; capped at the
    /// number of available cores at execution time.
    pub parallelism: usize,
}

impl Default for ExecutionDefaults {
    fn default() -> Self {
        Self {
            batch_size: 100,
            parallelism: 4,
        }
    }
}

/// Per-pipeline configuration: error policy plus execution defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PipelineConfiguration {
    pub error_handling: ErrorHandlingConfig,
    pub defaults: ExecutionDefaults,
}

impl PipelineConfiguration {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), EtlError> {
        if self.defaults.batch_size == 0 {
            return Err(EtlError::invalid_config("batch_size must be at least 1"));
        }
        if self.defaults.parallelism == 0 {
            return Err(EtlError::invalid_config("parallelism must be at least 1"));
        }
        Ok(())
    }

    /// Sets the stop-on-error flag.
    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.error_handling.stop_on_error = stop_on_error;
        self
    }

    /// Sets the error budget.
    pub fn with_max_errors(mut self, max_errors: u64) -> Self {
        self.error_handling.max_errors = max_errors;
        self
    }

    /// Sets the default batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.defaults.batch_size = batch_size;
        self
    }

    /// Sets the default parallelism.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.defaults.parallelism = parallelism;
        self
    }
}

/// Execution strategy for a transformation stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    /// Records flow one at a time in source order.
    #[default]
    Sequential,
    /// Records are partitioned across workers; order is preserved only
    /// within a partition.
    Parallel,
    /// Records are processed in fixed-size batches, in order.
    Batch,
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStrategy::Sequential => write!(f, "sequential"),
            ExecutionStrategy::Parallel => write!(f, "parallel"),
            ExecutionStrategy::Batch => write!(f, "batch"),
        }
    }
}

/// Per-stage execution settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StageExecutionConfig {
    pub strategy: ExecutionStrategy,
    /// Continue the transformation pipeline even when this stage fails.
    pub continue_on_error: bool,
}

impl StageExecutionConfig {
    pub fn new(strategy: ExecutionStrategy, continue_on_error: bool) -> Self {
        Self {
            strategy,
            continue_on_error,
        }
    }
}

/// Schedule specification for a registered job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ScheduleSpec {
    pub enabled: bool,
    /// Standard 5-field cron expression (6-field with seconds accepted).
    /// A missing expression falls back to hourly ticks.
    pub cron_expression: Option<CronExpression>,
}

impl ScheduleSpec {
    /// Creates an enabled schedule from a cron expression string.
    pub fn from_cron(expression: &str) -> Result<Self, EtlError> {
        Ok(Self {
            enabled: true,
            cron_expression: Some(CronExpression::parse(expression)?),
        })
    }

    /// Creates an enabled schedule with the hourly fallback.
    pub fn hourly() -> Self {
        Self {
            enabled: true,
            cron_expression: None,
        }
    }
}

/// Orchestrator-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OrchestratorConfig {
    /// Scheduler tick interval in seconds.
    pub scheduler_tick_secs: u64,
    /// Grace period for non-forced stops, in seconds.
    pub stop_grace_secs: u64,
    /// Maximum in-memory execution history entries retained per
    /// orchestrator.
    pub history_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            scheduler_tick_secs: 60,
            stop_grace_secs: 30,
            history_limit: 1000,
        }
    }
}

impl OrchestratorConfig {
    pub fn scheduler_tick(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.scheduler_tick_secs.max(1))
    }

    pub fn stop_grace(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.stop_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_are_rejected() {
        let err = serde_json::from_str::<PipelineConfiguration>(
            r#"{"error_handling": {"stop_on_error": true, "retries": 3}}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn defaults_are_valid() {
        PipelineConfiguration::default().validate().unwrap();
    }

    #[test]
    fn zero_batch_size_fails_validation() {
        let config = PipelineConfiguration::default().with_batch_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn schedule_from_cron_validates_expression() {
        assert!(ScheduleSpec::from_cron("*/5 * * * *").is_ok());
        assert!(ScheduleSpec::from_cron("bogus").is_err());
    }
}
