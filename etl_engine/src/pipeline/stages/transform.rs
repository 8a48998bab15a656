// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transform Stage
//!
//! Runs the current batch through a [`TransformationPipeline`] and writes
//! the survivors back into the current-data slot. Per-record failures are
//! context errors counted against the error budget; the stage itself fails
//! only when the transformation pipeline reports a stage-level breakdown.

use std::sync::Arc;

use async_trait::async_trait;
use etl_engine_domain::entities::{ExecutionContext, Stage, StageInfo, StageType};
use etl_engine_domain::error::EtlError;
use etl_engine_domain::services::Transformation;
use etl_engine_domain::value_objects::{ExecutionStrategy, StageExecutionConfig};

use crate::transformation::{TransformationPipeline, TransformationStage};

/// Applies transformations to the current batch.
pub struct TransformStage {
    info: StageInfo,
    pipeline: TransformationPipeline,
}

impl TransformStage {
    /// Builds a single-stage transformation pipeline from a transform
    /// list, using the stage's configured strategy.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the stage name is empty.
    pub fn new(
        name: impl Into<String>,
        order: u32,
        config: StageExecutionConfig,
        transforms: Vec<Arc<dyn Transformation>>,
    ) -> Result<Self, EtlError> {
        let name = name.into();
        let mut stage = TransformationStage::new(name.clone(), transforms).with_strategy(config.strategy);
        if config.continue_on_error {
            stage = stage.continue_on_error();
        }
        let pipeline = TransformationPipeline::new(name.clone()).add_stage(stage);
        Ok(Self {
            info: StageInfo::new(name, StageType::Transform, order, config)?,
            pipeline,
        })
    }

    /// Wraps a pre-built, multi-stage transformation pipeline.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the stage name is empty.
    pub fn with_pipeline(
        name: impl Into<String>,
        order: u32,
        pipeline: TransformationPipeline,
    ) -> Result<Self, EtlError> {
        Ok(Self {
            info: StageInfo::new(
                name,
                StageType::Transform,
                order,
                StageExecutionConfig::new(ExecutionStrategy::Sequential, false),
            )?,
            pipeline,
        })
    }
}

#[async_trait]
impl Stage for TransformStage {
    fn info(&self) -> &StageInfo {
        &self.info
    }

    async fn execute(&self, context: &ExecutionContext) -> Result<u64, EtlError> {
        let input = context.take_current_data().unwrap_or_default();
        let input_count = input.len();

        let result = self.pipeline.execute(input, context)?;

        if !result.success {
            let failed_stage = result
                .stage_reports
                .iter()
                .find(|report| report.stage_failed)
                .map(|report| {
                    format!(
                        "{}: {}",
                        report.stage_name,
                        report.message.as_deref().unwrap_or("stage failed")
                    )
                })
                .unwrap_or_else(|| "transformation pipeline failed".to_string());
            return Err(EtlError::TransformationFailed(failed_stage));
        }

        let output_count = result.records.len() as u64;
        tracing::debug!(
            stage = self.info.name(),
            input = input_count,
            output = output_count,
            skipped = result.records_skipped,
            failed = result.records_failed,
            "transform stage finished"
        );
        context.set_current_data(result.records);
        Ok(output_count)
    }
}
