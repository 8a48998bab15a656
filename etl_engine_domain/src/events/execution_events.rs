// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution Events
//!
//! Domain events emitted by the orchestrator as runs progress. Each event
//! carries the execution id, pipeline id and occurrence time; terminal
//! events additionally carry the run result.
//!
//! Ordering guarantee: `Started` is emitted before any
//! `Completed`/`Failed`/`Cancelled` for the same execution, and subscribers
//! are invoked synchronously in registration order.
//!
//! When a message bus is attached, each event maps to a `pipeline.*` topic
//! via [`ExecutionEvent::topic`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::results::PipelineExecutionResult;
use crate::services::datetime_serde;
use crate::services::message_bus::topics;
use crate::value_objects::{ExecutionId, PipelineId, StageId};

/// Common surface of all execution events.
pub trait DomainEvent {
    fn event_id(&self) -> Uuid;
    fn execution_id(&self) -> ExecutionId;
    fn event_type(&self) -> &'static str;
    fn occurred_at(&self) -> chrono::DateTime<chrono::Utc>;
}

/// A pipeline run has started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStartedEvent {
    pub event_id: Uuid,
    pub execution_id: ExecutionId,
    pub pipeline_id: PipelineId,
    pub pipeline_name: String,
    #[serde(with = "datetime_serde")]
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl PipelineStartedEvent {
    pub fn new(execution_id: ExecutionId, pipeline_id: PipelineId, pipeline_name: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            execution_id,
            pipeline_id,
            pipeline_name: pipeline_name.into(),
            occurred_at: chrono::Utc::now(),
        }
    }
}

/// A pipeline run finished successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineCompletedEvent {
    pub event_id: Uuid,
    pub execution_id: ExecutionId,
    pub pipeline_id: PipelineId,
    pub result: PipelineExecutionResult,
    #[serde(with = "datetime_serde")]
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl PipelineCompletedEvent {
    pub fn new(result: PipelineExecutionResult) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            execution_id: result.execution_id,
            pipeline_id: result.pipeline_id,
            result,
            occurred_at: chrono::Utc::now(),
        }
    }
}

/// A pipeline run finished with failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineFailedEvent {
    pub event_id: Uuid,
    pub execution_id: ExecutionId,
    pub pipeline_id: PipelineId,
    pub result: PipelineExecutionResult,
    #[serde(with = "datetime_serde")]
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl PipelineFailedEvent {
    pub fn new(result: PipelineExecutionResult) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            execution_id: result.execution_id,
            pipeline_id: result.pipeline_id,
            result,
            occurred_at: chrono::Utc::now(),
        }
    }
}

/// A pipeline run was cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineCancelledEvent {
    pub event_id: Uuid,
    pub execution_id: ExecutionId,
    pub pipeline_id: PipelineId,
    pub result: Option<PipelineExecutionResult>,
    #[serde(with = "datetime_serde")]
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl PipelineCancelledEvent {
    pub fn new(execution_id: ExecutionId, pipeline_id: PipelineId, result: Option<PipelineExecutionResult>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            execution_id,
            pipeline_id,
            result,
            occurred_at: chrono::Utc::now(),
        }
    }
}

/// A stage inside a run completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageCompletedEvent {
    pub event_id: Uuid,
    pub execution_id: ExecutionId,
    pub pipeline_id: PipelineId,
    pub stage_id: StageId,
    pub stage_name: String,
    pub records_processed: u64,
    pub duration_ms: u64,
    #[serde(with = "datetime_serde")]
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

/// A batch of records moved through a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataProcessedEvent {
    pub event_id: Uuid,
    pub execution_id: ExecutionId,
    pub pipeline_id: PipelineId,
    pub stage_name: String,
    pub record_count: u64,
    #[serde(with = "datetime_serde")]
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

/// All events emitted by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutionEvent {
    Started(PipelineStartedEvent),
    Completed(PipelineCompletedEvent),
    Failed(PipelineFailedEvent),
    Cancelled(PipelineCancelledEvent),
    StageCompleted(StageCompletedEvent),
    DataProcessed(DataProcessedEvent),
}

impl ExecutionEvent {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            ExecutionEvent::Started(e) => e.execution_id,
            ExecutionEvent::Completed(e) => e.execution_id,
            ExecutionEvent::Failed(e) => e.execution_id,
            ExecutionEvent::Cancelled(e) => e.execution_id,
            ExecutionEvent::StageCompleted(e) => e.execution_id,
            ExecutionEvent::DataProcessed(e) => e.execution_id,
        }
    }

    pub fn pipeline_id(&self) -> PipelineId {
        match self {
            ExecutionEvent::Started(e) => e.pipeline_id,
            ExecutionEvent::Completed(e) => e.pipeline_id,
            ExecutionEvent::Failed(e) => e.pipeline_id,
            ExecutionEvent::Cancelled(e) => e.pipeline_id,
            ExecutionEvent::StageCompleted(e) => e.pipeline_id,
            ExecutionEvent::DataProcessed(e) => e.pipeline_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            ExecutionEvent::Started(_) => "PipelineStarted",
            ExecutionEvent::Completed(_) => "PipelineCompleted",
            ExecutionEvent::Failed(_) => "PipelineFailed",
            ExecutionEvent::Cancelled(_) => "PipelineCancelled",
            ExecutionEvent::StageCompleted(_) => "StageCompleted",
            ExecutionEvent::DataProcessed(_) => "DataProcessed",
        }
    }

    /// Message-bus topic this event publishes to.
    pub fn topic(&self) -> &'static str {
        match self {
            ExecutionEvent::Started(_) => topics::PIPELINE_STARTED,
            ExecutionEvent::Completed(_) => topics::PIPELINE_COMPLETED,
            ExecutionEvent::Failed(_) => topics::PIPELINE_FAILED,
            ExecutionEvent::Cancelled(_) => topics::PIPELINE_FAILED,
            ExecutionEvent::StageCompleted(_) => topics::PIPELINE_STAGE_COMPLETED,
            ExecutionEvent::DataProcessed(_) => topics::PIPELINE_DATA_PROCESSED,
        }
    }

    /// Event-specific payload for message-bus bodies.
    pub fn payload_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

macro_rules! impl_domain_event {
    ($type:ty, $name:literal) => {
        impl DomainEvent for $type {
            fn event_id(&self) -> Uuid {
                self.event_id
            }
            fn execution_id(&self) -> ExecutionId {
                self.execution_id
            }
            fn event_type(&self) -> &'static str {
                $name
            }
            fn occurred_at(&self) -> chrono::DateTime<chrono::Utc> {
                self.occurred_at
            }
        }
    };
}

impl_domain_event!(PipelineStartedEvent, "PipelineStarted");
impl_domain_event!(PipelineCompletedEvent, "PipelineCompleted");
impl_domain_event!(PipelineFailedEvent, "PipelineFailed");
impl_domain_event!(PipelineCancelledEvent, "PipelineCancelled");
impl_domain_event!(StageCompletedEvent, "StageCompleted");
impl_domain_event!(DataProcessedEvent, "DataProcessed");
