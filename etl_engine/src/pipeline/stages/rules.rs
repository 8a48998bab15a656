// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Rule Stage
//!
//! Applies a [`RuleEngine`] to every record in the current batch. Records
//! with a skip verdict are dropped from the flow; action failures are
//! recorded on the context (coded with the rule id) and the record is
//! dropped as failed.

use std::sync::Arc;

use async_trait::async_trait;
use etl_engine_domain::entities::{ExecutionContext, Stage, StageInfo, StageType};
use etl_engine_domain::error::EtlError;
use etl_engine_domain::value_objects::StageExecutionConfig;

use crate::rules::RuleEngine;

/// Evaluates declarative rules over the current batch.
pub struct RuleStage {
    info: StageInfo,
    engine: Arc<RuleEngine>,
}

impl RuleStage {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the stage name is empty or a
    /// registered rule fails validation.
    pub fn new(name: impl Into<String>, order: u32, engine: Arc<RuleEngine>) -> Result<Self, EtlError> {
        engine.validate()?;
        Ok(Self {
            info: StageInfo::new(name, StageType::Transform, order, StageExecutionConfig::default())?,
            engine,
        })
    }
}

#[async_trait]
impl Stage for RuleStage {
    fn info(&self) -> &StageInfo {
        &self.info
    }

    async fn execute(&self, context: &ExecutionContext) -> Result<u64, EtlError> {
        let input = context.take_current_data().unwrap_or_default();
        let mut survivors = Vec::with_capacity(input.len());
        let mut skipped = 0u64;
        let mut failed = 0u64;

        for record in &input {
            context.check_cancelled()?;
            let result = self.engine.apply(record, context);

            if !result.errors.is_empty() {
                for error in &result.errors {
                    context.add_error(error.clone());
                }
                failed += 1;
                continue;
            }
            if result.is_skip() {
                skipped += 1;
                continue;
            }
            if let Some(output) = result.output {
                survivors.push(output);
            }
        }

        context.statistics().add_skipped(skipped);
        context.statistics().add_failed(failed);

        let count = survivors.len() as u64;
        tracing::debug!(
            stage = self.info.name(),
            input = input.len(),
            output = count,
            skipped,
            failed,
            "rule stage finished"
        );
        context.set_current_data(survivors);
        Ok(count)
    }
}
