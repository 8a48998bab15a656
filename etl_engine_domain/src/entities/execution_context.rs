// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution Context Entity
//!
//! The `ExecutionContext` maintains runtime state throughout a pipeline run:
//! configuration, cancellation, the property bag, accumulated errors and
//! warnings, shared statistics, and the current-data slot records flow
//! through between stages.
//!
//! ## Sharing model
//!
//! A stage context is derived from the run context with
//! [`ExecutionContext::for_stage`]:
//!
//! - **shared by reference**: errors, warnings, statistics, the cancellation
//!   token and the current-data slot — a stage's observations are the run's
//!   observations;
//! - **snapshot-copied**: the property bag — writes to the parent bag are
//!   observed by stage contexts created afterwards, while a stage's own
//!   property writes stay local to it;
//! - **stage identity**: the derived context carries the stage's id and name
//!   so errors raised through it are attributed to their source.
//!
//! Errors and warnings are append-only during execution; nothing removes
//! them until the run result is finalized.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::cancellation::CancellationToken;
use crate::error::{EtlError, ExecutionError, ExecutionWarning};
use crate::value_objects::{ExecutionId, PipelineConfiguration, PipelineId, Record, StageId};

use super::execution_statistics::ExecutionStatistics;

/// Property-bag key under which applied rule ids are recorded, in order.
pub const APPLIED_RULES_PROPERTY: &str = "AppliedRules";

/// Per-run context handed to every stage and transformation.
#[derive(Clone)]
pub struct ExecutionContext {
    // Identity fields (always first)
    execution_id: ExecutionId,
    pipeline_id: PipelineId,
    pipeline_name: String,
    stage_id: Option<StageId>,
    stage_name: Option<String>,

    // Core business fields
    configuration: PipelineConfiguration,
    cancellation: CancellationToken,
    properties: Arc<RwLock<HashMap<String, Value>>>,
    statistics: Arc<ExecutionStatistics>,
    current_data: Arc<Mutex<Option<Vec<Record>>>>,
    errors: Arc<Mutex<Vec<ExecutionError>>>,
    warnings: Arc<Mutex<Vec<ExecutionWarning>>>,

    // Metadata fields (always last)
    started_at: chrono::DateTime<chrono::Utc>,
}

impl ExecutionContext {
    /// Creates a fresh run context with its own cancellation token.
    pub fn new(pipeline_id: PipelineId, pipeline_name: impl Into<String>, configuration: PipelineConfiguration) -> Self {
        Self {
            execution_id: ExecutionId::new(),
            pipeline_id,
            pipeline_name: pipeline_name.into(),
            stage_id: None,
            stage_name: None,
            configuration,
            cancellation: CancellationToken::new(),
            properties: Arc::new(RwLock::new(HashMap::new())),
            statistics: Arc::new(ExecutionStatistics::new()),
            current_data: Arc::new(Mutex::new(None)),
            errors: Arc::new(Mutex::new(Vec::new())),
            warnings: Arc::new(Mutex::new(Vec::new())),
            started_at: chrono::Utc::now(),
        }
    }

    /// Replaces the context's cancellation token.
    ///
    /// The orchestrator uses this to install a linked child of the caller's
    /// token before driving the run.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Derives a stage context: stage identity set, property bag
    /// snapshot-copied, everything else shared by reference.
    pub fn for_stage(&self, stage_id: StageId, stage_name: &str) -> Self {
        let snapshot = self.properties.read().clone();
        Self {
            execution_id: self.execution_id,
            pipeline_id: self.pipeline_id,
            pipeline_name: self.pipeline_name.clone(),
            stage_id: Some(stage_id),
            stage_name: Some(stage_name.to_string()),
            configuration: self.configuration.clone(),
            cancellation: self.cancellation.clone(),
            properties: Arc::new(RwLock::new(snapshot)),
            statistics: Arc::clone(&self.statistics),
            current_data: Arc::clone(&self.current_data),
            errors: Arc::clone(&self.errors),
            warnings: Arc::clone(&self.warnings),
            started_at: self.started_at,
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn pipeline_id(&self) -> PipelineId {
        self.pipeline_id
    }

    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    /// Gets the stage this context is scoped to, if any.
    pub fn stage_id(&self) -> Option<StageId> {
        self.stage_id
    }

    pub fn stage_name(&self) -> Option<&str> {
        self.stage_name.as_deref()
    }

    pub fn configuration(&self) -> &PipelineConfiguration {
        &self.configuration
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Checks the cancellation token, attributing the check to this
    /// context's scope.
    pub fn check_cancelled(&self) -> Result<(), EtlError> {
        self.cancellation.check(self.stage_name.as_deref().unwrap_or("pipeline"))
    }

    pub fn started_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.started_at
    }

    pub fn statistics(&self) -> &ExecutionStatistics {
        &self.statistics
    }

    /// Sets a property in this context's bag.
    pub fn set_property(&self, key: impl Into<String>, value: Value) {
        self.properties.write().insert(key.into(), value);
    }

    /// Gets a property value by key.
    pub fn get_property(&self, key: &str) -> Option<Value> {
        self.properties.read().get(key).cloned()
    }

    /// Appends a value to a list-valued property, creating the list on
    /// first use. Used for `AppliedRules` provenance.
    pub fn append_property_list(&self, key: &str, value: Value) {
        let mut properties = self.properties.write();
        match properties.get_mut(key) {
            Some(Value::Array(items)) => items.push(value),
            _ => {
                properties.insert(key.to_string(), Value::Array(vec![value]));
            }
        }
    }

    /// Snapshot of the property bag.
    pub fn properties(&self) -> HashMap<String, Value> {
        self.properties.read().clone()
    }

    /// Appends an error, attributing it to this context's stage when the
    /// error carries no source.
    pub fn add_error(&self, error: ExecutionError) {
        tracing::error!(
            execution_id = %self.execution_id,
            code = %error.code,
            source = %error.source,
            "execution error: {}",
            error.message
        );
        self.errors.lock().push(error);
    }

    /// Appends a warning.
    pub fn add_warning(&self, warning: ExecutionWarning) {
        tracing::warn!(
            execution_id = %self.execution_id,
            source = %warning.source,
            "execution warning: {}",
            warning.message
        );
        self.warnings.lock().push(warning);
    }

    /// Current number of accumulated errors.
    pub fn error_count(&self) -> u64 {
        self.errors.lock().len() as u64
    }

    /// Copies of the accumulated errors.
    pub fn errors(&self) -> Vec<ExecutionError> {
        self.errors.lock().clone()
    }

    /// Copies of the accumulated warnings.
    pub fn warnings(&self) -> Vec<ExecutionWarning> {
        self.warnings.lock().clone()
    }

    /// Replaces the current-data slot with a new batch.
    pub fn set_current_data(&self, records: Vec<Record>) {
        *self.current_data.lock() = Some(records);
    }

    /// Takes the current batch out of the slot, leaving it empty.
    pub fn take_current_data(&self) -> Option<Vec<Record>> {
        self.current_data.lock().take()
    }

    /// Clones the current batch without consuming it.
    pub fn current_data(&self) -> Option<Vec<Record>> {
        self.current_data.lock().clone()
    }

    /// Number of records currently in the data slot.
    pub fn current_data_len(&self) -> usize {
        self.current_data.lock().as_ref().map_or(0, |records| records.len())
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("execution_id", &self.execution_id)
            .field("pipeline_id", &self.pipeline_id)
            .field("pipeline_name", &self.pipeline_name)
            .field("stage_name", &self.stage_name)
            .field("errors", &self.error_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::PipelineId;

    fn context() -> ExecutionContext {
        ExecutionContext::new(PipelineId::new(), "test", PipelineConfiguration::default())
    }

    #[test]
    fn stage_context_shares_errors_and_statistics() {
        let run = context();
        let stage = run.for_stage(StageId::new(), "extract");

        stage.add_error(ExecutionError::new("boom", "X", "extract"));
        stage.statistics().add_processed(5);

        assert_eq!(run.error_count(), 1);
        assert_eq!(run.statistics().records_processed(), 5);
    }

    #[test]
    fn property_writes_are_seen_by_later_stage_contexts_only() {
        let run = context();
        let before = run.for_stage(StageId::new(), "first");

        run.set_property("mode", Value::String("fast".into()));
        let after = run.for_stage(StageId::new(), "second");

        assert_eq!(before.get_property("mode"), None);
        assert_eq!(after.get_property("mode"), Some(Value::String("fast".into())));
    }

    #[test]
    fn stage_property_writes_stay_local() {
        let run = context();
        let stage = run.for_stage(StageId::new(), "transform");
        stage.set_property("local", Value::Bool(true));
        assert_eq!(run.get_property("local"), None);
    }

    #[test]
    fn current_data_flows_between_stage_contexts() {
        let run = context();
        let extract = run.for_stage(StageId::new(), "extract");
        let load = run.for_stage(StageId::new(), "load");

        extract.set_current_data(vec![Record::from_fields([("id", 1)])]);
        assert_eq!(load.current_data_len(), 1);
        let taken = load.take_current_data().unwrap();
        assert_eq!(taken.len(), 1);
        assert_eq!(run.current_data_len(), 0);
    }

    #[test]
    fn applied_rules_accumulate_in_order() {
        let run = context();
        run.append_property_list(APPLIED_RULES_PROPERTY, Value::String("r1".into()));
        run.append_property_list(APPLIED_RULES_PROPERTY, Value::String("r2".into()));
        assert_eq!(
            run.get_property(APPLIED_RULES_PROPERTY),
            Some(Value::Array(vec![Value::String("r1".into()), Value::String("r2".into())]))
        );
    }
}
