// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Message Bus Contract
//!
//! Optional pub/sub collaborator. When attached to the orchestrator,
//! lifecycle events are additionally published under the
//! `pipeline.*` topics; every message carries a correlation id equal to the
//! execution id, so downstream consumers can join messages belonging to one
//! run.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EtlError;
use crate::services::datetime_serde;
use crate::value_objects::{ExecutionId, PipelineId};

/// Topics the core publishes to when messaging is enabled.
pub mod topics {
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    pub const PIPELINE_FAILED: &str = "pipeline.failed";
    pub const PIPELINE_STAGE_COMPLETED: &str = "pipeline.stage.completed";
    pub const PIPELINE_DATA_PROCESSED: &str = "pipeline.data.processed";
}

/// A message published by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub correlation_id: String,
    pub execution_id: ExecutionId,
    pub pipeline_id: PipelineId,
    #[serde(with = "datetime_serde")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub payload: serde_json::Value,
}

impl BusMessage {
    /// Builds a message for an execution; the correlation id is the
    /// execution id.
    pub fn for_execution(execution_id: ExecutionId, pipeline_id: PipelineId, payload: serde_json::Value) -> Self {
        Self {
            correlation_id: execution_id.to_string(),
            execution_id,
            pipeline_id,
            timestamp: chrono::Utc::now(),
            payload,
        }
    }
}

/// Handler invoked for every message delivered on a subscribed topic.
pub type MessageHandler = Arc<dyn Fn(BusMessage) + Send + Sync>;

/// Pub/sub collaborator surface consumed by the orchestrator.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes a message on a topic.
    async fn publish(
        &self,
        topic: &str,
        message: BusMessage,
        properties: HashMap<String, String>,
    ) -> Result<(), EtlError>;

    /// Registers a handler for a topic.
    async fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), EtlError>;
}
