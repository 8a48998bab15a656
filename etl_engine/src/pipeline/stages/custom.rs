// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Function Stage
//!
//! The open extension point for library users: a stage whose behavior is an
//! async closure over the execution context. The closure returns the number
//! of records it processed, and observes cancellation like any other stage.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use etl_engine_domain::entities::{ExecutionContext, Stage, StageInfo, StageType};
use etl_engine_domain::error::EtlError;
use etl_engine_domain::value_objects::StageExecutionConfig;

type StageFuture = Pin<Box<dyn Future<Output = Result<u64, EtlError>> + Send>>;

/// Signature of a custom stage body.
pub type StageFn = dyn Fn(ExecutionContext) -> StageFuture + Send + Sync;

/// A stage defined by a user-provided async closure.
pub struct FunctionStage {
    info: StageInfo,
    body: Arc<StageFn>,
}

impl FunctionStage {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the stage name is empty.
    pub fn new<F, Fut>(name: impl Into<String>, order: u32, body: F) -> Result<Self, EtlError>
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<u64, EtlError>> + Send + 'static,
    {
        Ok(Self {
            info: StageInfo::new(name, StageType::Custom, order, StageExecutionConfig::default())?,
            body: Arc::new(move |context| Box::pin(body(context))),
        })
    }
}

#[async_trait]
impl Stage for FunctionStage {
    fn info(&self) -> &StageInfo {
        &self.info
    }

    async fn execute(&self, context: &ExecutionContext) -> Result<u64, EtlError> {
        (self.body)(context.clone()).await
    }
}
