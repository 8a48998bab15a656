// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transformation Pipeline
//!
//! Multi-stage transformation composition. Each stage carries its own
//! transforms, an execution strategy and a continue-on-error flag; after a
//! stage, only records whose latest result is a success flow onward.
//!
//! - An empty survivor set short-circuits the remaining stages; the
//!   condition is reported, not an error.
//! - A stage-level failure (validation, strategy breakdown) terminates the
//!   pipeline with a synthetic failure report unless the stage opted into
//!   `continue_on_error`.
//! - The `Parallel` strategy partitions records across at most
//!   `min(configured parallelism, available cores)` rayon workers when every
//!   transform in the stage declares parallel support; order is preserved
//!   within a partition only. Statistics updates stay safe because the
//!   shared counters are atomic and records are cloned, never mutated in
//!   place.

use std::sync::Arc;

use etl_engine_domain::entities::ExecutionContext;
use etl_engine_domain::error::EtlError;
use etl_engine_domain::results::TransformationResult;
use etl_engine_domain::services::Transformation;
use etl_engine_domain::value_objects::{ExecutionStrategy, Record, StageExecutionConfig};
use rayon::prelude::*;

use super::processor::TransformationProcessor;

/// One stage of a transformation pipeline.
pub struct TransformationStage {
    name: String,
    transforms: Vec<Arc<dyn Transformation>>,
    config: StageExecutionConfig,
}

impl TransformationStage {
    pub fn new(name: impl Into<String>, transforms: Vec<Arc<dyn Transformation>>) -> Self {
        Self {
            name: name.into(),
            transforms,
            config: StageExecutionConfig::default(),
        }
    }

    /// Sets the execution strategy.
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Continue the pipeline even when this stage fails.
    pub fn continue_on_error(mut self) -> Self {
        self.config.continue_on_error = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transforms(&self) -> &[Arc<dyn Transformation>] {
        &self.transforms
    }

    pub fn config(&self) -> &StageExecutionConfig {
        &self.config
    }

    fn supports_parallel(&self) -> bool {
        self.transforms.iter().all(|t| t.supports_parallel_execution())
    }
}

/// Per-stage report inside a pipeline result.
#[derive(Debug, Clone)]
pub struct TransformationStageReport {
    pub stage_name: String,
    pub strategy: ExecutionStrategy,
    pub input_count: u64,
    pub output_count: u64,
    pub skipped: u64,
    pub failed: u64,
    pub stage_failed: bool,
    pub message: Option<String>,
}

/// Outcome of running records through a transformation pipeline.
#[derive(Debug, Clone)]
pub struct TransformationPipelineResult {
    pub success: bool,
    /// Records that survived every stage.
    pub records: Vec<Record>,
    pub records_skipped: u64,
    pub records_failed: u64,
    pub stage_reports: Vec<TransformationStageReport>,
    /// Set when remaining stages were skipped because no records survived.
    pub short_circuited_after: Option<String>,
}

/// Ordered composition of transformation stages.
pub struct TransformationPipeline {
    name: String,
    stages: Vec<TransformationStage>,
    processor: TransformationProcessor,
}

impl TransformationPipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            processor: TransformationProcessor::new(),
        }
    }

    /// Uses a monitored processor for all stages.
    pub fn with_processor(mut self, processor: TransformationProcessor) -> Self {
        self.processor = processor;
        self
    }

    /// Appends a stage.
    pub fn add_stage(mut self, stage: TransformationStage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[TransformationStage] {
        &self.stages
    }

    /// Runs the records through every stage.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` when cancellation is observed; all other
    /// failures are reported inside the result.
    pub fn execute(&self, records: Vec<Record>, context: &ExecutionContext) -> Result<TransformationPipelineResult, EtlError> {
        let mut current = records;
        let mut reports = Vec::with_capacity(self.stages.len());
        let mut total_skipped = 0u64;
        let mut total_failed = 0u64;

        for (index, stage) in self.stages.iter().enumerate() {
            context.check_cancelled()?;

            if current.is_empty() {
                let after = if index == 0 {
                    "<input>".to_string()
                } else {
                    self.stages[index - 1].name().to_string()
                };
                tracing::info!(
                    pipeline = %self.name,
                    after = %after,
                    "no records remain; skipping remaining transformation stages"
                );
                return Ok(TransformationPipelineResult {
                    success: true,
                    records: current,
                    records_skipped: total_skipped,
                    records_failed: total_failed,
                    stage_reports: reports,
                    short_circuited_after: Some(after),
                });
            }

            let input_count = current.len() as u64;
            match self.execute_stage(stage, &current, context) {
                Ok(results) => {
                    let mut survivors = Vec::with_capacity(results.len());
                    let mut skipped = 0u64;
                    let mut failed = 0u64;
                    for result in results {
                        if result.success {
                            if let Some(output) = result.output {
                                survivors.push(output);
                            }
                        } else if result.is_skip() {
                            skipped += 1;
                        } else {
                            failed += 1;
                        }
                    }

                    context.statistics().add_skipped(skipped);
                    context.statistics().add_failed(failed);
                    total_skipped += skipped;
                    total_failed += failed;

                    tracing::debug!(
                        pipeline = %self.name,
                        stage = stage.name(),
                        input = input_count,
                        output = survivors.len(),
                        skipped,
                        failed,
                        "transformation stage finished"
                    );

                    reports.push(TransformationStageReport {
                        stage_name: stage.name().to_string(),
                        strategy: stage.config().strategy,
                        input_count,
                        output_count: survivors.len() as u64,
                        skipped,
                        failed,
                        stage_failed: false,
                        message: None,
                    });
                    current = survivors;
                }
                Err(error) if error.is_cancellation() => return Err(error),
                Err(error) => {
                    tracing::warn!(
                        pipeline = %self.name,
                        stage = stage.name(),
                        "transformation stage failed: {}",
                        error
                    );
                    reports.push(TransformationStageReport {
                        stage_name: stage.name().to_string(),
                        strategy: stage.config().strategy,
                        input_count,
                        output_count: 0,
                        skipped: 0,
                        failed: 0,
                        stage_failed: true,
                        message: Some(error.to_string()),
                    });

                    if !stage.config().continue_on_error {
                        // synthetic failure result for the stage
                        return Ok(TransformationPipelineResult {
                            success: false,
                            records: Vec::new(),
                            records_skipped: total_skipped,
                            records_failed: total_failed,
                            stage_reports: reports,
                            short_circuited_after: None,
                        });
                    }
                    // continue with the stage's input records
                }
            }
        }

        Ok(TransformationPipelineResult {
            success: true,
            records: current,
            records_skipped: total_skipped,
            records_failed: total_failed,
            stage_reports: reports,
            short_circuited_after: None,
        })
    }

    fn execute_stage(
        &self,
        stage: &TransformationStage,
        records: &[Record],
        context: &ExecutionContext,
    ) -> Result<Vec<TransformationResult>, EtlError> {
        self.processor.validate(stage.transforms(), context)?;

        match stage.config().strategy {
            ExecutionStrategy::Sequential => self.processor.process_batch(records, stage.transforms(), context),
            ExecutionStrategy::Batch => {
                let batch_size = context.configuration().defaults.batch_size.max(1);
                let mut results = Vec::with_capacity(records.len());
                for batch in records.chunks(batch_size) {
                    tracing::debug!(stage = stage.name(), batch_len = batch.len(), "processing batch");
                    results.extend(self.processor.process_batch(batch, stage.transforms(), context)?);
                }
                Ok(results)
            }
            ExecutionStrategy::Parallel => {
                if !stage.supports_parallel() {
                    tracing::warn!(
                        stage = stage.name(),
                        "parallel strategy requested but a transform does not support it; running sequentially"
                    );
                    return self.processor.process_batch(records, stage.transforms(), context);
                }
                self.execute_parallel(stage, records, context)
            }
        }
    }

    // Partition records to workers; order preserved within a partition only.
    fn execute_parallel(
        &self,
        stage: &TransformationStage,
        records: &[Record],
        context: &ExecutionContext,
    ) -> Result<Vec<TransformationResult>, EtlError> {
        let available_cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        let workers = context.configuration().defaults.parallelism.clamp(1, available_cores);
        let partition_len = records.len().div_ceil(workers).max(1);

        tracing::debug!(
            stage = stage.name(),
            workers,
            partition_len,
            records = records.len(),
            "running parallel transformation stage"
        );

        let partitions: Vec<Result<Vec<TransformationResult>, EtlError>> = records
            .par_chunks(partition_len)
            .map(|partition| self.processor.process_batch(partition, stage.transforms(), context))
            .collect();

        let mut results = Vec::with_capacity(records.len());
        for partition in partitions {
            results.extend(partition?);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformation::field::CaseTransformation;
    use crate::transformation::record::{AddFieldTransformation, FilterTransformation};
    use etl_engine_domain::value_objects::{PipelineConfiguration, PipelineId};

    fn context() -> ExecutionContext {
        ExecutionContext::new(PipelineId::new(), "tp-tests", PipelineConfiguration::default())
    }

    fn records(n: usize) -> Vec<Record> {
        use etl_engine_domain::value_objects::FieldValue;
        (0..n)
            .map(|i| {
                Record::from_fields([
                    ("id", FieldValue::Integer(i as i64)),
                    ("name", FieldValue::String(format!("user-{}", i))),
                ])
            })
            .collect()
    }

    #[test]
    fn stages_compose_and_filter_between_them() {
        let pipeline = TransformationPipeline::new("compose")
            .add_stage(TransformationStage::new(
                "keep-even",
                vec![Arc::new(FilterTransformation::new("even", "odd id", |r| {
                    r.get_integer("id").unwrap_or(1) % 2 == 0
                }))],
            ))
            .add_stage(TransformationStage::new(
                "tag",
                vec![Arc::new(AddFieldTransformation::new("kept", true))],
            ));

        let result = pipeline.execute(records(4), &context()).unwrap();
        assert!(result.success);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records_skipped, 2);
        assert!(result.records.iter().all(|r| r.get_boolean("kept") == Some(true)));
        assert_eq!(result.stage_reports.len(), 2);
    }

    #[test]
    fn empty_survivors_short_circuit_remaining_stages() {
        let pipeline = TransformationPipeline::new("short")
            .add_stage(TransformationStage::new(
                "drop-all",
                vec![Arc::new(FilterTransformation::new("none", "dropped", |_| false))],
            ))
            .add_stage(TransformationStage::new(
                "unreached",
                vec![Arc::new(AddFieldTransformation::new("tag", 1))],
            ));

        let result = pipeline.execute(records(3), &context()).unwrap();
        assert!(result.success);
        assert!(result.records.is_empty());
        assert_eq!(result.short_circuited_after.as_deref(), Some("drop-all"));
        // only the first stage ran
        assert_eq!(result.stage_reports.len(), 1);
    }

    #[test]
    fn parallel_matches_sequential_as_multiset() {
        let sequential = TransformationPipeline::new("seq").add_stage(TransformationStage::new(
            "upper",
            vec![Arc::new(CaseTransformation::uppercase("name"))],
        ));
        let parallel = TransformationPipeline::new("par").add_stage(
            TransformationStage::new("upper", vec![Arc::new(CaseTransformation::uppercase("name"))])
                .with_strategy(ExecutionStrategy::Parallel),
        );

        let input = records(1000);
        let expected = sequential.execute(input.clone(), &context()).unwrap();
        let actual = parallel.execute(input, &context()).unwrap();

        let mut expected_names: Vec<String> = expected
            .records
            .iter()
            .map(|r| r.get_string("name").unwrap().to_string())
            .collect();
        let mut actual_names: Vec<String> = actual
            .records
            .iter()
            .map(|r| r.get_string("name").unwrap().to_string())
            .collect();
        expected_names.sort();
        actual_names.sort();
        assert_eq!(expected_names, actual_names);
        assert_eq!(actual.records.len(), 1000);
    }

    #[test]
    fn stage_failure_without_continue_terminates() {
        struct InvalidTransform {
            core: crate::transformation::core::TransformationCore,
        }
        impl Transformation for InvalidTransform {
            crate::transformation::core::delegate_transformation_core!();

            fn validate(&self, _context: &ExecutionContext) -> Result<(), EtlError> {
                Err(EtlError::invalid_config("broken transform"))
            }

            fn transform(&self, record: &Record, _context: &ExecutionContext) -> TransformationResult {
                TransformationResult::success(record.deep_clone())
            }
        }

        let pipeline = TransformationPipeline::new("failing").add_stage(TransformationStage::new(
            "invalid",
            vec![Arc::new(InvalidTransform {
                core: crate::transformation::core::TransformationCore::new(
                    "invalid",
                    etl_engine_domain::services::TransformationType::Record,
                ),
            })],
        ));

        let result = pipeline.execute(records(2), &context()).unwrap();
        assert!(!result.success);
        assert!(result.stage_reports[0].stage_failed);
    }
}
