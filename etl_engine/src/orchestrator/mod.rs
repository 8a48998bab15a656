// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Orchestrator
//!
//! Registers, runs, tracks, stops and schedules pipeline executions.
//!
//! ## Execute flow
//!
//! 1. Register the execution (`Running`) in the active map, atomically.
//! 2. Link a child cancellation token under the caller's: the run stops on
//!    either the caller's signal or [`PipelineOrchestrator::stop_execution`].
//! 3. Emit `Started`, drive the executor, then emit
//!    `Completed`/`Failed`/`Cancelled`; cancellation is re-raised to the
//!    caller after bookkeeping.
//! 4. Always deregister the active entry and release the cancellation
//!    handle.
//!
//! ## Events
//!
//! Subscribers are invoked synchronously, in registration order; a
//! subscriber error is logged and swallowed — it never aborts a run.
//! `Started` always precedes the terminal event of the same execution.
//! With a message bus attached, events are additionally published under
//! their `pipeline.*` topics with the execution id as correlation id.
//!
//! ## Construction
//!
//! Finish construction with [`PipelineOrchestrator::build`], which returns
//! the shared handle the scheduler loop needs for launching background
//! executions:
//!
//! ```no_run
//! use etl_engine::orchestrator::PipelineOrchestrator;
//!
//! let orchestrator = PipelineOrchestrator::new().build();
//! orchestrator.start_scheduler();
//! ```

mod scheduler;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

use etl_engine_domain::cancellation::CancellationToken;
use etl_engine_domain::entities::{ExecutionContext, Pipeline, ScheduledJob};
use etl_engine_domain::error::EtlError;
use etl_engine_domain::events::{
    ExecutionEvent, PipelineCancelledEvent, PipelineCompletedEvent, PipelineFailedEvent, PipelineStartedEvent,
};
use etl_engine_domain::results::PipelineExecutionResult;
use etl_engine_domain::services::{
    BusMessage, Clock, ExecutionHistorySink, ExecutionRecord, ExecutionState, ExecutionStatus, MessageBus, SystemClock,
};
use etl_engine_domain::value_objects::{ExecutionId, JobId, OrchestratorConfig};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use crate::pipeline::PipelineExecutor;

/// Callback invoked synchronously for every orchestrator event.
pub type EventSubscriber = Box<dyn Fn(&ExecutionEvent) -> Result<(), EtlError> + Send + Sync>;

/// Synchronous subscriber fan-out plus optional bus publication. Clonable
/// so stage-level hooks can emit without holding the orchestrator.
#[derive(Clone)]
struct EventFanout {
    subscribers: Arc<RwLock<Vec<EventSubscriber>>>,
    message_bus: Option<Arc<dyn MessageBus>>,
}

impl EventFanout {
    fn emit(&self, event: ExecutionEvent) {
        {
            let subscribers = self.subscribers.read();
            for subscriber in subscribers.iter() {
                if let Err(error) = subscriber(&event) {
                    // a failing subscriber must not abort the run
                    tracing::error!(event = event.event_type(), "event subscriber failed: {}", error);
                }
            }
        }

        if let Some(bus) = &self.message_bus {
            let bus = Arc::clone(bus);
            let topic = event.topic();
            let message = BusMessage::for_execution(event.execution_id(), event.pipeline_id(), event.payload_json());
            tokio::spawn(async move {
                if let Err(error) = bus.publish(topic, message, HashMap::new()).await {
                    tracing::warn!(topic, "message bus publish failed: {}", error);
                }
            });
        }
    }
}

/// Coordinates pipeline executions, events, history and scheduling.
pub struct PipelineOrchestrator {
    config: OrchestratorConfig,
    clock: Arc<dyn Clock>,
    active: RwLock<HashMap<ExecutionId, ExecutionStatus>>,
    history: RwLock<VecDeque<ExecutionRecord>>,
    cancellations: RwLock<HashMap<ExecutionId, CancellationToken>>,
    pub(crate) jobs: RwLock<HashMap<JobId, Arc<Mutex<ScheduledJob>>>>,
    fanout: EventFanout,
    history_sink: Option<Arc<dyn ExecutionHistorySink>>,
    /// Notified whenever a run deregisters; `stop_execution` waits on this
    /// during its grace period.
    run_finished: Notify,
    /// Back-reference installed by `build`; the scheduler uses it to hand
    /// owned handles to background executions.
    pub(crate) self_ref: RwLock<Weak<PipelineOrchestrator>>,
    pub(crate) scheduler_cancel: CancellationToken,
    pub(crate) scheduler_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator with the default configuration and system
    /// clock.
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    /// Creates an orchestrator with explicit configuration.
    pub fn with_config(config: OrchestratorConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            active: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            cancellations: RwLock::new(HashMap::new()),
            jobs: RwLock::new(HashMap::new()),
            fanout: EventFanout {
                subscribers: Arc::new(RwLock::new(Vec::new())),
                message_bus: None,
            },
            history_sink: None,
            run_finished: Notify::new(),
            self_ref: RwLock::new(Weak::new()),
            scheduler_cancel: CancellationToken::new(),
            scheduler_handle: Mutex::new(None),
        }
    }

    /// Injects a clock; scheduler tests drive a manual one.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attaches a message bus; events are then also published on
    /// `pipeline.*` topics.
    pub fn with_message_bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.fanout.message_bus = Some(bus);
        self
    }

    /// Attaches a history sink receiving every finished execution.
    pub fn with_history_sink(mut self, sink: Arc<dyn ExecutionHistorySink>) -> Self {
        self.history_sink = Some(sink);
        self
    }

    /// Finishes construction, returning the shared handle and installing
    /// the back-reference the scheduler needs.
    pub fn build(self) -> Arc<Self> {
        let orchestrator = Arc::new(self);
        *orchestrator.self_ref.write() = Arc::downgrade(&orchestrator);
        orchestrator
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Registers an event subscriber; subscribers run synchronously in
    /// registration order.
    pub fn subscribe(&self, subscriber: EventSubscriber) {
        self.fanout.subscribers.write().push(subscriber);
    }

    /// Executes a pipeline under this orchestrator.
    ///
    /// The context's cancellation token is treated as the caller's signal;
    /// a linked child is installed so `stop_execution` can cancel the run
    /// independently.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` when the run was cancelled; all other outcomes
    /// are inside the returned result.
    pub async fn execute(
        &self,
        pipeline: Arc<Pipeline>,
        context: ExecutionContext,
    ) -> Result<PipelineExecutionResult, EtlError> {
        let child_token = context.cancellation().child_token();
        let context = context.with_cancellation(child_token.clone());
        let execution_id = context.execution_id();

        // 1. atomic registration
        {
            let status = ExecutionStatus::running(execution_id, pipeline.id(), pipeline.name());
            self.active.write().insert(execution_id, status);
        }
        self.cancellations.write().insert(execution_id, child_token);

        // 2. Started precedes any terminal event
        self.emit(ExecutionEvent::Started(PipelineStartedEvent::new(
            execution_id,
            pipeline.id(),
            pipeline.name(),
        )));

        let hook_fanout = self.fanout.clone();
        let executor = PipelineExecutor::new()
            .with_stage_event_hook(Arc::new(move |event| hook_fanout.emit(event)));

        let outcome = executor.execute(&pipeline, &context).await;

        let result = match outcome {
            Ok(result) => {
                let state = if result.success {
                    ExecutionState::Completed
                } else {
                    ExecutionState::Failed
                };
                self.update_status(execution_id, state, result.records_processed);
                self.append_history(ExecutionRecord::from_result(pipeline.name(), state, &result));

                if result.success {
                    self.emit(ExecutionEvent::Completed(PipelineCompletedEvent::new(result.clone())));
                } else {
                    self.emit(ExecutionEvent::Failed(PipelineFailedEvent::new(result.clone())));
                }
                Ok(result)
            }
            Err(error) => {
                // cancellation is the only error crossing this boundary
                let statistics = context.statistics().snapshot();
                self.update_status(execution_id, ExecutionState::Cancelled, statistics.records_processed);
                self.append_history(ExecutionRecord {
                    execution_id,
                    pipeline_id: pipeline.id(),
                    pipeline_name: pipeline.name().to_string(),
                    state: ExecutionState::Cancelled,
                    records_processed: statistics.records_processed,
                    records_failed: statistics.records_failed,
                    error_count: context.error_count(),
                    warning_count: context.warnings().len() as u64,
                    started_at: context.started_at(),
                    completed_at: Some(chrono::Utc::now()),
                });
                self.emit(ExecutionEvent::Cancelled(PipelineCancelledEvent::new(
                    execution_id,
                    pipeline.id(),
                    None,
                )));
                Err(error)
            }
        };

        // 3. always deregister and release the cancellation handle
        self.active.write().remove(&execution_id);
        self.cancellations.write().remove(&execution_id);
        self.run_finished.notify_waiters();

        result
    }

    /// Requests that an execution stop.
    ///
    /// With `force` the linked token is cancelled and the call returns
    /// immediately; otherwise the call cancels and waits up to the
    /// configured grace period for the run to wind down (logged when
    /// exceeded). Returns whether the execution was found.
    pub async fn stop_execution(&self, execution_id: ExecutionId, force: bool) -> bool {
        let token = self.cancellations.read().get(&execution_id).cloned();
        let Some(token) = token else {
            return false;
        };

        tracing::info!(execution_id = %execution_id, force, "stopping execution");
        token.cancel();

        if !force {
            let grace = self.config.stop_grace();
            let deadline = tokio::time::Instant::now() + grace;
            loop {
                let wait = self.run_finished.notified();
                tokio::pin!(wait);
                // register interest before checking, so a deregistration
                // landing in between cannot be missed
                wait.as_mut().enable();
                if !self.active.read().contains_key(&execution_id) {
                    break;
                }
                if tokio::time::timeout_at(deadline, wait).await.is_err() {
                    tracing::warn!(
                        execution_id = %execution_id,
                        grace_secs = grace.as_secs(),
                        "execution did not stop within the grace period"
                    );
                    break;
                }
            }
        }
        true
    }

    /// Live status of an execution, if it is registered.
    pub fn execution_status(&self, execution_id: ExecutionId) -> Option<ExecutionStatus> {
        self.active.read().get(&execution_id).cloned()
    }

    /// All currently active executions.
    pub fn active_executions(&self) -> Vec<ExecutionStatus> {
        self.active.read().values().cloned().collect()
    }

    /// Finished executions, most recent last, up to `limit`.
    pub fn execution_history(&self, limit: usize) -> Vec<ExecutionRecord> {
        let history = self.history.read();
        history.iter().rev().take(limit).rev().cloned().collect()
    }

    fn update_status(&self, execution_id: ExecutionId, state: ExecutionState, records_processed: u64) {
        if let Some(status) = self.active.write().get_mut(&execution_id) {
            status.transition(state, records_processed);
        }
    }

    fn append_history(&self, record: ExecutionRecord) {
        if let Some(sink) = &self.history_sink {
            sink.record(&record);
        }
        let mut history = self.history.write();
        history.push_back(record);
        while history.len() > self.config.history_limit {
            history.pop_front();
        }
    }

    /// Delivers an event to subscribers (synchronously, in registration
    /// order) and, when a bus is attached, publishes it on its topic.
    pub(crate) fn emit(&self, event: ExecutionEvent) {
        self.fanout.emit(event);
    }
}

impl Default for PipelineOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("active", &self.active.read().len())
            .field("jobs", &self.jobs.read().len())
            .field("history", &self.history.read().len())
            .finish()
    }
}
