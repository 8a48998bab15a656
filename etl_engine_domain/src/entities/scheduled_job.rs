// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduled Job Entity
//!
//! A registered, periodically-triggered pipeline execution. The scheduler
//! loop polls jobs each tick and launches those that are active and due;
//! per-job mutable fields (`next_run`, `last_run`, `active`) are guarded by
//! the job's lock in the orchestrator, and `next_run` is always advanced
//! past `now` before a launch so concurrent ticks cannot double-launch.
//!
//! Schedule semantics:
//!
//! - a disabled schedule parks `next_run` at a far-future sentinel
//! - a missing cron expression falls back to hourly ticks
//! - cron evaluation is in UTC

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{JobId, ScheduleSpec};

use super::pipeline::Pipeline;

/// Far-future sentinel used for disabled schedules.
pub fn far_future() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 0, 0, 0).unwrap()
}

/// Computes the next run time for a schedule, strictly after `now`.
pub fn compute_next_run(schedule: &ScheduleSpec, now: DateTime<Utc>) -> DateTime<Utc> {
    if !schedule.enabled {
        return far_future();
    }
    match &schedule.cron_expression {
        Some(cron) => cron.next_occurrence(now).unwrap_or_else(far_future),
        None => now + Duration::hours(1),
    }
}

/// A pipeline registered for periodic execution.
#[derive(Clone)]
pub struct ScheduledJob {
    // Identity fields (always first)
    id: JobId,
    name: String,

    // Core business fields
    pipeline: Arc<Pipeline>,
    schedule: ScheduleSpec,
    next_run: DateTime<Utc>,
    last_run: Option<DateTime<Utc>>,
    active: bool,

    // Metadata fields (always last)
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ScheduledJob {
    /// Registers a pipeline under a schedule; the first `next_run` is
    /// computed from `now`.
    pub fn new(name: impl Into<String>, pipeline: Arc<Pipeline>, schedule: ScheduleSpec, now: DateTime<Utc>) -> Self {
        let next_run = compute_next_run(&schedule, now);
        Self {
            id: JobId::new(),
            name: name.into(),
            pipeline,
            schedule,
            next_run,
            last_run: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn schedule(&self) -> &ScheduleSpec {
        &self.schedule
    }

    pub fn next_run(&self) -> DateTime<Utc> {
        self.next_run
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Checks whether the job should launch at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && self.next_run <= now
    }

    /// Marks a launch: records `last_run = now` and advances `next_run`
    /// strictly past `now`. Call under the job's lock, before spawning the
    /// execution.
    pub fn advance(&mut self, now: DateTime<Utc>) {
        self.last_run = Some(now);
        self.next_run = compute_next_run(&self.schedule, now);
        self.updated_at = now;
    }

    /// Activates or deactivates the job without touching its schedule.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        self.updated_at = Utc::now();
    }

    /// Replaces the schedule and recomputes `next_run` from `now`.
    pub fn update_schedule(&mut self, schedule: ScheduleSpec, now: DateTime<Utc>) {
        self.schedule = schedule;
        self.next_run = compute_next_run(&self.schedule, now);
        self.updated_at = now;
    }

    /// Serializable snapshot for status queries.
    pub fn snapshot(&self) -> ScheduledJobSnapshot {
        ScheduledJobSnapshot {
            id: self.id,
            name: self.name.clone(),
            pipeline_id: self.pipeline.id(),
            pipeline_name: self.pipeline.name().to_string(),
            enabled: self.schedule.enabled,
            cron_expression: self.schedule.cron_expression.as_ref().map(|c| c.expression().to_string()),
            next_run: self.next_run,
            last_run: self.last_run,
            active: self.active,
        }
    }
}

impl std::fmt::Debug for ScheduledJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("next_run", &self.next_run)
            .field("active", &self.active)
            .finish()
    }
}

/// Read-only view of a scheduled job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJobSnapshot {
    pub id: JobId,
    pub name: String,
    pub pipeline_id: crate::value_objects::PipelineId,
    pub pipeline_name: String,
    pub enabled: bool,
    pub cron_expression: Option<String>,
    #[serde(with = "crate::services::datetime_serde")]
    pub next_run: DateTime<Utc>,
    #[serde(with = "crate::services::datetime_serde::optional")]
    pub last_run: Option<DateTime<Utc>>,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::PipelineConfiguration;

    fn pipeline() -> Arc<Pipeline> {
        Arc::new(Pipeline::new("scheduled", PipelineConfiguration::default()).unwrap())
    }

    fn at(h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, h, mi, 0).unwrap()
    }

    #[test]
    fn cron_schedule_computes_next_run() {
        let schedule = ScheduleSpec::from_cron("*/1 * * * *").unwrap();
        let job = ScheduledJob::new("minutely", pipeline(), schedule, at(10, 0));
        assert_eq!(job.next_run(), at(10, 1));
    }

    #[test]
    fn missing_cron_defaults_to_hourly() {
        let job = ScheduledJob::new("hourly", pipeline(), ScheduleSpec::hourly(), at(10, 0));
        assert_eq!(job.next_run(), at(11, 0));
    }

    #[test]
    fn disabled_schedule_parks_at_sentinel() {
        let schedule = ScheduleSpec {
            enabled: false,
            cron_expression: None,
        };
        let job = ScheduledJob::new("parked", pipeline(), schedule, at(10, 0));
        assert_eq!(job.next_run(), far_future());
        assert!(!job.is_due(at(23, 59)));
    }

    #[test]
    fn advance_moves_next_run_past_now() {
        let schedule = ScheduleSpec::from_cron("*/1 * * * *").unwrap();
        let mut job = ScheduledJob::new("minutely", pipeline(), schedule, at(10, 0));

        let now = at(10, 1);
        assert!(job.is_due(now));
        job.advance(now);
        assert_eq!(job.last_run(), Some(now));
        assert!(job.next_run() > now);
        assert!(!job.is_due(now));
    }

    #[test]
    fn inactive_jobs_are_never_due() {
        let schedule = ScheduleSpec::from_cron("*/1 * * * *").unwrap();
        let mut job = ScheduledJob::new("inactive", pipeline(), schedule, at(10, 0));
        job.set_active(false);
        assert!(!job.is_due(at(10, 5)));
    }
}
