// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Entity
//!
//! The `Pipeline` entity is the core business object of the engine: an
//! ordered composition of stages executed once per run. It maintains its
//! identity through state changes and encapsulates the structural rules the
//! executor relies on:
//!
//! - stage orders must be unique; execution follows ascending order
//! - every stage must carry a non-empty name
//! - the stage set cannot change while a run is in progress
//! - a pipeline without stages is valid but executes as an empty run (the
//!   condition is surfaced as a validation warning)
//!
//! The entity holds no runtime execution logic; the executor drives it and
//! mirrors the composite stage outcome into the pipeline's shared status
//! cell.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::EtlError;
use crate::value_objects::{PipelineConfiguration, PipelineId};

use super::pipeline_stage::Stage;

/// Composite status of a pipeline, mirroring its stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    Ready,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStatus::Ready => write!(f, "ready"),
            PipelineStatus::Running => write!(f, "running"),
            PipelineStatus::Completed => write!(f, "completed"),
            PipelineStatus::Failed => write!(f, "failed"),
            PipelineStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// An ordered composition of stages with identity and configuration.
#[derive(Clone)]
pub struct Pipeline {
    // Identity fields (always first)
    id: PipelineId,
    name: String,
    description: String,

    // Core business fields
    configuration: PipelineConfiguration,
    stages: Vec<Arc<dyn Stage>>,
    status: Arc<RwLock<PipelineStatus>>,

    // Metadata fields (always last)
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl Pipeline {
    /// Creates a new pipeline.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the name is empty or the
    /// configuration fails validation.
    pub fn new(name: impl Into<String>, configuration: PipelineConfiguration) -> Result<Self, EtlError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EtlError::invalid_config("Pipeline name cannot be empty"));
        }
        configuration.validate()?;

        let now = chrono::Utc::now();
        Ok(Self {
            id: PipelineId::new(),
            name,
            description: String::new(),
            configuration,
            stages: Vec::new(),
            status: Arc::new(RwLock::new(PipelineStatus::Ready)),
            created_at: now,
            updated_at: now,
        })
    }

    /// Sets a human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a stage and returns the pipeline (builder form).
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Result<Self, EtlError> {
        self.add_stage(stage)?;
        Ok(self)
    }

    pub fn id(&self) -> PipelineId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn configuration(&self) -> &PipelineConfiguration {
        &self.configuration
    }

    /// Gets the stages in insertion order. Execution order is by ascending
    /// stage order, which [`Pipeline::execution_plan`] provides.
    pub fn stages(&self) -> &[Arc<dyn Stage>] {
        &self.stages
    }

    pub fn status(&self) -> PipelineStatus {
        *self.status.read()
    }

    /// Sets the composite status; the executor mirrors run progress here.
    pub fn set_status(&self, status: PipelineStatus) {
        *self.status.write() = status;
    }

    /// Resets pipeline and stage statuses for a fresh run.
    pub fn reset_statuses(&self) {
        self.set_status(PipelineStatus::Ready);
        for stage in &self.stages {
            stage.info().reset();
        }
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.updated_at
    }

    /// Adds a stage to the pipeline.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` when the pipeline is currently running
    /// - `InvalidConfiguration` when another stage already uses the order
    pub fn add_stage(&mut self, stage: Arc<dyn Stage>) -> Result<(), EtlError> {
        if self.status() == PipelineStatus::Running {
            return Err(EtlError::invalid_config(format!(
                "Cannot add stage to pipeline '{}' while it is running",
                self.name
            )));
        }
        let order = stage.info().order();
        if self.stages.iter().any(|existing| existing.info().order() == order) {
            return Err(EtlError::invalid_config(format!(
                "Duplicate stage order {} in pipeline '{}'",
                order, self.name
            )));
        }
        self.stages.push(stage);
        self.updated_at = chrono::Utc::now();
        Ok(())
    }

    /// Removes a stage by id, returning it.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` when the pipeline is currently running
    /// - `NotFound` when no stage has the given id
    pub fn remove_stage(&mut self, stage_id: crate::value_objects::StageId) -> Result<Arc<dyn Stage>, EtlError> {
        if self.status() == PipelineStatus::Running {
            return Err(EtlError::invalid_config(format!(
                "Cannot remove stage from pipeline '{}' while it is running",
                self.name
            )));
        }
        let position = self
            .stages
            .iter()
            .position(|stage| stage.info().id() == stage_id)
            .ok_or_else(|| EtlError::NotFound(format!("Stage {} not in pipeline '{}'", stage_id, self.name)))?;
        self.updated_at = chrono::Utc::now();
        Ok(self.stages.remove(position))
    }

    /// Validates the pipeline before execution.
    ///
    /// Checks the pipeline name, stage names and order uniqueness. A
    /// pipeline without stages is not an error; the condition is returned
    /// as a warning and the run completes with zero records.
    ///
    /// # Errors
    ///
    /// Returns `PipelineValidation` describing the first structural problem
    /// found.
    pub fn validate(&self) -> Result<Vec<String>, EtlError> {
        let mut warnings = Vec::new();

        if self.name.trim().is_empty() {
            return Err(EtlError::validation("Pipeline name cannot be empty"));
        }

        if self.stages.is_empty() {
            warnings.push(format!("Pipeline '{}' has no stages", self.name));
        }

        let mut seen_orders = HashSet::new();
        for stage in &self.stages {
            let info = stage.info();
            if info.name().trim().is_empty() {
                return Err(EtlError::validation(format!(
                    "Pipeline '{}' contains a stage with an empty name",
                    self.name
                )));
            }
            if !seen_orders.insert(info.order()) {
                return Err(EtlError::validation(format!(
                    "Pipeline '{}' has duplicate stage order {}",
                    self.name,
                    info.order()
                )));
            }
        }

        Ok(warnings)
    }

    /// Builds the execution plan: enabled stages sorted by ascending order.
    /// Disabled stages are excluded; the executor marks them `Skipped`.
    pub fn execution_plan(&self) -> Vec<Arc<dyn Stage>> {
        let mut plan: Vec<Arc<dyn Stage>> = self
            .stages
            .iter()
            .filter(|stage| stage.info().is_enabled())
            .cloned()
            .collect();
        plan.sort_by_key(|stage| stage.info().order());
        plan
    }

    /// Stages excluded from the execution plan (disabled).
    pub fn skipped_stages(&self) -> Vec<Arc<dyn Stage>> {
        self.stages
            .iter()
            .filter(|stage| !stage.info().is_enabled())
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("stages", &self.stages.len())
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::pipeline_stage::{StageInfo, StageType};
    use crate::entities::ExecutionContext;
    use crate::value_objects::StageExecutionConfig;
    use async_trait::async_trait;

    struct NoopStage {
        info: StageInfo,
    }

    impl NoopStage {
        fn at(order: u32) -> Arc<dyn Stage> {
            Arc::new(Self {
                info: StageInfo::new(format!("noop-{}", order), StageType::Custom, order, StageExecutionConfig::default())
                    .unwrap(),
            })
        }
    }

    #[async_trait]
    impl Stage for NoopStage {
        fn info(&self) -> &StageInfo {
            &self.info
        }

        async fn execute(&self, _context: &ExecutionContext) -> Result<u64, EtlError> {
            Ok(0)
        }
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(Pipeline::new("", PipelineConfiguration::default()).is_err());
    }

    #[test]
    fn duplicate_orders_fail_on_add() {
        let mut pipeline = Pipeline::new("p", PipelineConfiguration::default()).unwrap();
        pipeline.add_stage(NoopStage::at(1)).unwrap();
        assert!(pipeline.add_stage(NoopStage::at(1)).is_err());
    }

    #[test]
    fn running_pipeline_rejects_mutation() {
        let mut pipeline = Pipeline::new("p", PipelineConfiguration::default()).unwrap();
        let stage = NoopStage::at(1);
        let stage_id = stage.info().id();
        pipeline.add_stage(stage).unwrap();

        pipeline.set_status(PipelineStatus::Running);
        assert!(pipeline.add_stage(NoopStage::at(2)).is_err());
        assert!(pipeline.remove_stage(stage_id).is_err());

        pipeline.set_status(PipelineStatus::Completed);
        assert!(pipeline.remove_stage(stage_id).is_ok());
    }

    #[test]
    fn validation_warns_on_empty_pipeline() {
        let pipeline = Pipeline::new("empty", PipelineConfiguration::default()).unwrap();
        let warnings = pipeline.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("no stages"));
    }

    #[test]
    fn execution_plan_sorts_by_order_and_drops_disabled() {
        let mut pipeline = Pipeline::new("p", PipelineConfiguration::default()).unwrap();
        pipeline.add_stage(NoopStage::at(30)).unwrap();
        pipeline.add_stage(NoopStage::at(10)).unwrap();
        pipeline
            .add_stage(Arc::new(NoopStage {
                info: StageInfo::new("disabled", StageType::Custom, 20, StageExecutionConfig::default())
                    .unwrap()
                    .with_enabled(false),
            }))
            .unwrap();

        let plan = pipeline.execution_plan();
        let orders: Vec<u32> = plan.iter().map(|s| s.info().order()).collect();
        assert_eq!(orders, vec![10, 30]);
        assert_eq!(pipeline.skipped_stages().len(), 1);
    }
}
