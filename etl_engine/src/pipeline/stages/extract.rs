// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Extract Stage
//!
//! Streams records out of a [`SourceConnector`] into the context's
//! current-data slot. The connector is opened in `prepare` and closed in
//! `cleanup`, so a read failure still releases the connection. Individual
//! read errors are recorded and skipped; the stream itself failing to open
//! fails the stage.

use std::sync::Arc;

use async_trait::async_trait;
use etl_engine_domain::entities::{ExecutionContext, Stage, StageInfo, StageType};
use etl_engine_domain::error::{EtlError, ExecutionError};
use etl_engine_domain::services::SourceConnector;
use etl_engine_domain::value_objects::StageExecutionConfig;
use futures::StreamExt;

/// Reads every record the source yields into the current-data slot.
pub struct ExtractStage {
    info: StageInfo,
    connector: Arc<dyn SourceConnector>,
}

impl ExtractStage {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the stage name is empty.
    pub fn new(name: impl Into<String>, order: u32, connector: Arc<dyn SourceConnector>) -> Result<Self, EtlError> {
        Ok(Self {
            info: StageInfo::new(name, StageType::Extract, order, StageExecutionConfig::default())?,
            connector,
        })
    }
}

#[async_trait]
impl Stage for ExtractStage {
    fn info(&self) -> &StageInfo {
        &self.info
    }

    async fn prepare(&self, _context: &ExecutionContext) -> Result<(), EtlError> {
        self.connector.open().await
    }

    async fn execute(&self, context: &ExecutionContext) -> Result<u64, EtlError> {
        if let Ok(Some(estimated)) = self.connector.estimated_record_count().await {
            tracing::debug!(
                stage = self.info.name(),
                connector = self.connector.name(),
                estimated,
                "starting extraction"
            );
        }

        let mut stream = self.connector.read(context).await?;
        let mut records = Vec::new();

        while let Some(item) = stream.next().await {
            context.check_cancelled()?;
            match item {
                Ok(record) => records.push(record),
                Err(error) => {
                    context.add_error(ExecutionError::new(
                        error.to_string(),
                        "EXTRACT_READ_FAILED",
                        self.info.name(),
                    ));
                }
            }
        }

        let count = records.len() as u64;
        context.statistics().add_extracted(count);
        context.set_current_data(records);
        tracing::info!(stage = self.info.name(), records = count, "extraction finished");
        Ok(count)
    }

    async fn cleanup(&self, _context: &ExecutionContext) -> Result<(), EtlError> {
        self.connector.close().await
    }
}
