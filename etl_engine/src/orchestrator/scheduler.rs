// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduler Loop
//!
//! Periodic job triggering for the orchestrator. Each tick snapshots the
//! jobs that are active and due, then — under the job's own lock —
//! re-checks due-ness, advances `last_run`/`next_run` strictly past `now`,
//! and only then launches the execution in the background. Advancing before
//! launching is what keeps concurrent ticks from double-launching a job.
//!
//! Schedule evaluation is in UTC through the injected clock, which is what
//! makes the loop testable against a virtual timeline: tests call
//! [`PipelineOrchestrator::poll_jobs`] directly while advancing a manual
//! clock, without ever sleeping.

use std::sync::Arc;

use etl_engine_domain::entities::{ExecutionContext, Pipeline, ScheduledJob, ScheduledJobSnapshot};
use etl_engine_domain::error::EtlError;
use etl_engine_domain::value_objects::{JobId, ScheduleSpec};
use parking_lot::Mutex;

use super::PipelineOrchestrator;

impl PipelineOrchestrator {
    /// Registers a pipeline for periodic execution. The first due time is
    /// computed from the current clock.
    pub fn schedule_pipeline(&self, name: impl Into<String>, pipeline: Arc<Pipeline>, schedule: ScheduleSpec) -> JobId {
        let job = ScheduledJob::new(name, pipeline, schedule, self.clock().now());
        let job_id = job.id();
        tracing::info!(job = %job_id, next_run = %job.next_run(), "pipeline scheduled");
        self.jobs.write().insert(job_id, Arc::new(Mutex::new(job)));
        job_id
    }

    /// Removes a scheduled job.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no job has the given id.
    pub fn remove_job(&self, job_id: JobId) -> Result<(), EtlError> {
        self.jobs
            .write()
            .remove(&job_id)
            .map(|_| ())
            .ok_or_else(|| EtlError::NotFound(format!("Scheduled job {} not found", job_id)))
    }

    /// Activates or deactivates a job.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no job has the given id.
    pub fn set_job_active(&self, job_id: JobId, active: bool) -> Result<(), EtlError> {
        let jobs = self.jobs.read();
        let job = jobs
            .get(&job_id)
            .ok_or_else(|| EtlError::NotFound(format!("Scheduled job {} not found", job_id)))?;
        job.lock().set_active(active);
        Ok(())
    }

    /// Replaces a job's schedule, recomputing its next due time.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no job has the given id.
    pub fn update_job_schedule(&self, job_id: JobId, schedule: ScheduleSpec) -> Result<(), EtlError> {
        let jobs = self.jobs.read();
        let job = jobs
            .get(&job_id)
            .ok_or_else(|| EtlError::NotFound(format!("Scheduled job {} not found", job_id)))?;
        job.lock().update_schedule(schedule, self.clock().now());
        Ok(())
    }

    /// Read-only snapshots of every registered job.
    pub fn scheduled_jobs(&self) -> Vec<ScheduledJobSnapshot> {
        self.jobs.read().values().map(|job| job.lock().snapshot()).collect()
    }

    /// Starts the scheduler loop on its own task. Idempotent: a second
    /// call while the loop is running is a no-op.
    ///
    /// Requires an orchestrator finished with
    /// [`PipelineOrchestrator::build`]; without the shared handle there is
    /// nothing to hand to background executions.
    pub fn start_scheduler(&self) {
        let Some(orchestrator) = self.self_ref.read().upgrade() else {
            tracing::warn!("start_scheduler called on an orchestrator not finished with build()");
            return;
        };

        let mut handle = self.scheduler_handle.lock();
        if handle.is_some() {
            return;
        }

        let tick = self.config().scheduler_tick();
        let cancel = self.scheduler_cancel.clone();
        tracing::info!(tick_secs = tick.as_secs(), "scheduler starting");

        *handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("scheduler stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        orchestrator.poll_jobs();
                    }
                }
            }
        }));
    }

    /// Stops the scheduler loop and waits for it to exit.
    pub async fn stop_scheduler(&self) {
        self.scheduler_cancel.cancel();
        let handle = self.scheduler_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(error) = handle.await {
                tracing::warn!("scheduler task join failed: {}", error);
            }
        }
    }

    /// One scheduler tick: launch every job that is active and due.
    ///
    /// Public so tests can drive the loop against a manual clock; the
    /// background task calls this on every interval tick.
    pub fn poll_jobs(&self) {
        let Some(self_arc) = self.self_ref.read().upgrade() else {
            tracing::warn!("poll_jobs called on an orchestrator not finished with build()");
            return;
        };
        let now = self.clock().now();
        let snapshot: Vec<Arc<Mutex<ScheduledJob>>> = self.jobs.read().values().cloned().collect();

        for job_cell in snapshot {
            let (pipeline, job_id, job_name) = {
                let mut job = job_cell.lock();
                // re-check under the lock; a concurrent tick may have
                // advanced the job already
                if !job.is_due(now) {
                    continue;
                }
                job.advance(now);
                debug_assert!(job.next_run() > now);
                (Arc::clone(job.pipeline()), job.id(), job.name().to_string())
            };

            tracing::info!(job = %job_id, name = %job_name, "launching scheduled execution");
            let orchestrator = Arc::clone(&self_arc);
            // fire-and-forget: a scheduled run's outcome surfaces through
            // events and history, not through a join handle
            tokio::spawn(async move {
                let context =
                    ExecutionContext::new(pipeline.id(), pipeline.name(), pipeline.configuration().clone());
                match orchestrator.execute(pipeline, context).await {
                    Ok(result) if result.success => {
                        tracing::debug!(job = %job_id, "scheduled execution completed");
                    }
                    Ok(result) => {
                        tracing::warn!(job = %job_id, errors = result.errors.len(), "scheduled execution failed");
                    }
                    Err(error) if error.is_cancellation() => {
                        tracing::info!(job = %job_id, "scheduled execution cancelled");
                    }
                    Err(error) => {
                        tracing::error!(job = %job_id, "scheduled execution error: {}", error);
                    }
                }
            });
        }
    }
}
