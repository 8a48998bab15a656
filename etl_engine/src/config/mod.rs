// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Engine Configuration
//!
//! TOML-backed configuration for the engine: pipeline defaults,
//! orchestrator settings and logging. Every section rejects unknown keys,
//! so configuration drift fails at load time instead of being silently
//! ignored.
//!
//! ```toml
//! [pipeline.error_handling]
//! stop_on_error = false
//! max_errors = 100
//!
//! [pipeline.defaults]
//! batch_size = 250
//! parallelism = 8
//!
//! [orchestrator]
//! scheduler_tick_secs = 60
//! stop_grace_secs = 30
//! history_limit = 1000
//!
//! [logging]
//! level = "info"
//! ```

use std::path::Path;

use etl_engine_domain::error::EtlError;
use etl_engine_domain::value_objects::{OrchestratorConfig, PipelineConfiguration};
use serde::{Deserialize, Serialize};

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    /// Default tracing filter (overridable via `RUST_LOG`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Top-level engine configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EtlConfig {
    pub pipeline: PipelineConfiguration,
    pub orchestrator: OrchestratorConfig,
    pub logging: LoggingConfig,
}

impl EtlConfig {
    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` on syntax errors, unknown keys or
    /// failing validation.
    pub fn from_toml(source: &str) -> Result<Self, EtlError> {
        let config: EtlConfig = toml::from_str(source)
            .map_err(|e| EtlError::invalid_config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `IoFailed` when the file cannot be read, otherwise the
    /// errors of [`EtlConfig::from_toml`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EtlError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| EtlError::IoFailed(format!("Failed to read '{}': {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loading configuration");
        Self::from_toml(&source)
    }

    /// Validates cross-field constraints.
    pub fn validate(&self) -> Result<(), EtlError> {
        self.pipeline.validate()?;
        if self.orchestrator.scheduler_tick_secs == 0 {
            return Err(EtlError::invalid_config("scheduler_tick_secs must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_empty_document() {
        let config = EtlConfig::from_toml("").unwrap();
        assert_eq!(config.pipeline.error_handling.max_errors, 100);
        assert_eq!(config.orchestrator.scheduler_tick_secs, 60);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn file_round_trip() {
        let source = r#"
            [pipeline.error_handling]
            stop_on_error = true
            max_errors = 5

            [pipeline.defaults]
            batch_size = 64
            parallelism = 2

            [orchestrator]
            scheduler_tick_secs = 10
            stop_grace_secs = 5
            history_limit = 50

            [logging]
            level = "debug"
        "#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etl.toml");
        std::fs::write(&path, source).unwrap();

        let config = EtlConfig::from_file(&path).unwrap();
        assert!(config.pipeline.error_handling.stop_on_error);
        assert_eq!(config.pipeline.defaults.batch_size, 64);
        assert_eq!(config.orchestrator.history_limit, 50);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EtlConfig::from_toml("[pipeline]\nretries = 3\n");
        assert!(err.is_err());
    }

    #[test]
    fn zero_tick_fails_validation() {
        let err = EtlConfig::from_toml("[orchestrator]\nscheduler_tick_secs = 0\n");
        assert!(err.is_err());
    }
}
