// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Load Stage
//!
//! Writes the current batch into a [`DestinationConnector`] in batches of
//! the pipeline's default batch size. Partial write failures become
//! `LOAD_WRITE_FAILED` context errors; the batch flow continues so one bad
//! record cannot block the remainder. Records successfully written count as
//! processed for the run.
//!
//! The batch is read, not consumed: stages after a load (a second
//! destination, auditing) still see the data.

use std::sync::Arc;

use async_trait::async_trait;
use etl_engine_domain::entities::{ExecutionContext, Stage, StageInfo, StageType};
use etl_engine_domain::error::{EtlError, ExecutionError};
use etl_engine_domain::services::{DestinationConnector, WriteResult};
use etl_engine_domain::value_objects::StageExecutionConfig;

/// Writes the current batch to a destination.
pub struct LoadStage {
    info: StageInfo,
    connector: Arc<dyn DestinationConnector>,
}

impl LoadStage {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the stage name is empty.
    pub fn new(name: impl Into<String>, order: u32, connector: Arc<dyn DestinationConnector>) -> Result<Self, EtlError> {
        Ok(Self {
            info: StageInfo::new(name, StageType::Load, order, StageExecutionConfig::default())?,
            connector,
        })
    }
}

#[async_trait]
impl Stage for LoadStage {
    fn info(&self) -> &StageInfo {
        &self.info
    }

    async fn prepare(&self, _context: &ExecutionContext) -> Result<(), EtlError> {
        self.connector.open().await
    }

    async fn execute(&self, context: &ExecutionContext) -> Result<u64, EtlError> {
        let records = context.current_data().unwrap_or_default();
        let batch_size = context.configuration().defaults.batch_size.max(1);
        let mut totals = WriteResult::default();

        for batch in records.chunks(batch_size) {
            context.check_cancelled()?;
            let result = self.connector.write_batch(batch.to_vec()).await?;
            if result.failed > 0 {
                context.add_error(ExecutionError::new(
                    format!(
                        "{} of {} records failed to write to '{}'",
                        result.failed,
                        batch.len(),
                        self.connector.name()
                    ),
                    "LOAD_WRITE_FAILED",
                    self.info.name(),
                ));
            }
            totals.merge(result);
        }

        context.statistics().add_loaded(totals.successful);
        context.statistics().add_processed(totals.successful);
        context.statistics().add_failed(totals.failed);

        tracing::info!(
            stage = self.info.name(),
            connector = self.connector.name(),
            written = totals.successful,
            failed = totals.failed,
            "load finished"
        );
        Ok(totals.successful)
    }

    async fn cleanup(&self, _context: &ExecutionContext) -> Result<(), EtlError> {
        self.connector.close().await
    }
}
