// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Scheduler behavior against a manual clock: cron-driven launches,
//! double-launch protection, inactive jobs and due-time invariants.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use etl_engine::orchestrator::PipelineOrchestrator;
use etl_engine_domain::entities::Pipeline;
use etl_engine_domain::events::ExecutionEvent;
use etl_engine_domain::services::Clock;
use etl_engine_domain::services::ManualClock;
use etl_engine_domain::value_objects::{ExecutionId, PipelineConfiguration, ScheduleSpec};
use parking_lot::Mutex;

fn trivial_pipeline() -> Arc<Pipeline> {
    Arc::new(Pipeline::new("scheduled", PipelineConfiguration::default()).unwrap())
}

fn orchestrator_at(
    start: chrono::DateTime<chrono::Utc>,
) -> (Arc<PipelineOrchestrator>, Arc<ManualClock>, Arc<Mutex<Vec<ExecutionId>>>) {
    let clock = Arc::new(ManualClock::starting_at(start));
    let orchestrator = PipelineOrchestrator::new().with_clock(Arc::clone(&clock) as _).build();

    let launches: Arc<Mutex<Vec<ExecutionId>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&launches);
    orchestrator.subscribe(Box::new(move |event| {
        if let ExecutionEvent::Started(started) = event {
            sink.lock().push(started.execution_id);
        }
        Ok(())
    }));
    (orchestrator, clock, launches)
}

async fn drain_spawned_runs() {
    // scheduled runs are fire-and-forget; give them a moment to finish
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn minutely_cron_launches_three_times_in_three_and_a_half_minutes() {
    let t0 = chrono::Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap();
    let (orchestrator, clock, launches) = orchestrator_at(t0);

    let job_id = orchestrator.schedule_pipeline(
        "minutely",
        trivial_pipeline(),
        ScheduleSpec::from_cron("*/1 * * * *").unwrap(),
    );

    // walk the virtual clock to t0+3m30s in 30s ticks, polling like the
    // scheduler loop would
    for _ in 0..7 {
        clock.advance(chrono::Duration::seconds(30));
        orchestrator.poll_jobs();

        // after every poll, the job's next run time is in the future
        let jobs = orchestrator.scheduled_jobs();
        assert!(jobs[0].next_run > clock.now());
    }
    drain_spawned_runs().await;

    let launches = launches.lock().clone();
    assert_eq!(launches.len(), 3, "expected 3 executions, saw {:?}", launches);
    // distinct execution ids
    let mut unique = launches.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 3);

    let jobs = orchestrator.scheduled_jobs();
    assert_eq!(jobs[0].id, job_id);
    assert!(jobs[0].last_run.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn a_poll_never_double_launches_a_due_job() {
    let t0 = chrono::Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap();
    let (orchestrator, clock, launches) = orchestrator_at(t0);

    orchestrator.schedule_pipeline(
        "minutely",
        trivial_pipeline(),
        ScheduleSpec::from_cron("*/1 * * * *").unwrap(),
    );

    clock.advance(chrono::Duration::minutes(1));
    // several back-to-back polls at the same instant: only one launch
    for _ in 0..5 {
        orchestrator.poll_jobs();
    }
    drain_spawned_runs().await;
    assert_eq!(launches.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn inactive_jobs_never_launch() {
    let t0 = chrono::Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap();
    let (orchestrator, clock, launches) = orchestrator_at(t0);

    let job_id = orchestrator.schedule_pipeline(
        "parked",
        trivial_pipeline(),
        ScheduleSpec::from_cron("*/1 * * * *").unwrap(),
    );
    orchestrator.set_job_active(job_id, false).unwrap();

    clock.advance(chrono::Duration::minutes(10));
    orchestrator.poll_jobs();
    drain_spawned_runs().await;
    assert!(launches.lock().is_empty());

    // reactivation picks the schedule back up
    orchestrator.set_job_active(job_id, true).unwrap();
    orchestrator.poll_jobs();
    drain_spawned_runs().await;
    assert_eq!(launches.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn jobs_not_yet_due_never_launch() {
    let t0 = chrono::Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap();
    let (orchestrator, clock, launches) = orchestrator_at(t0);

    orchestrator.schedule_pipeline(
        "hourly",
        trivial_pipeline(),
        ScheduleSpec::from_cron("0 * * * *").unwrap(),
    );

    clock.advance(chrono::Duration::minutes(30));
    orchestrator.poll_jobs();
    drain_spawned_runs().await;
    assert!(launches.lock().is_empty());

    clock.advance(chrono::Duration::minutes(31));
    orchestrator.poll_jobs();
    drain_spawned_runs().await;
    assert_eq!(launches.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn disabled_schedule_parks_job_until_updated() {
    let t0 = chrono::Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap();
    let (orchestrator, clock, launches) = orchestrator_at(t0);

    let job_id = orchestrator.schedule_pipeline(
        "disabled",
        trivial_pipeline(),
        ScheduleSpec {
            enabled: false,
            cron_expression: None,
        },
    );

    clock.advance(chrono::Duration::days(365));
    orchestrator.poll_jobs();
    drain_spawned_runs().await;
    assert!(launches.lock().is_empty());

    orchestrator
        .update_job_schedule(job_id, ScheduleSpec::from_cron("*/5 * * * *").unwrap())
        .unwrap();
    clock.advance(chrono::Duration::minutes(5));
    orchestrator.poll_jobs();
    drain_spawned_runs().await;
    assert_eq!(launches.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_cron_defaults_to_hourly() {
    let t0 = chrono::Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap();
    let (orchestrator, clock, launches) = orchestrator_at(t0);

    orchestrator.schedule_pipeline("hourly-default", trivial_pipeline(), ScheduleSpec::hourly());

    clock.advance(chrono::Duration::minutes(59));
    orchestrator.poll_jobs();
    drain_spawned_runs().await;
    assert!(launches.lock().is_empty());

    clock.advance(chrono::Duration::minutes(2));
    orchestrator.poll_jobs();
    drain_spawned_runs().await;
    assert_eq!(launches.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn scheduler_loop_starts_and_stops() {
    let t0 = chrono::Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap();
    let (orchestrator, _clock, _launches) = orchestrator_at(t0);

    orchestrator.start_scheduler();
    // idempotent: a second start is a no-op
    orchestrator.start_scheduler();
    orchestrator.stop_scheduler().await;
}
