// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transformation Processor
//!
//! Chains transformations over records: the output record of one becomes
//! the input of the next. Per-transform outcomes compose into one
//! [`TransformationResult`] per record:
//!
//! - **success** substitutes the output and continues the chain;
//! - **skip** retains the current record, stops the chain, and marks the
//!   record non-successful but non-fatal;
//! - **failure** stops the chain, appends the errors to the context and the
//!   record's result (`TRANSFORM_EXCEPTION` for converted internal errors).
//!
//! Successful applications update run statistics: transformations applied,
//! affected fields, and processing duration. Batch processing observes the
//! cancellation token before every record; on cancellation, the current
//! record finishes and `Err(Cancelled)` is returned.
//!
//! When a [`PerformanceMonitor`] is attached, every batch opens one scoped
//! session per distinct transformation and closes it at the end, merging
//! the samples into the per-transformation aggregates.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use etl_engine_domain::entities::ExecutionContext;
use etl_engine_domain::error::EtlError;
use etl_engine_domain::results::TransformationResult;
use etl_engine_domain::services::Transformation;
use etl_engine_domain::value_objects::{Record, TransformationId};

use crate::performance::{MonitoringSession, PerformanceMonitor};

/// Executes transformation chains over records and batches.
#[derive(Default)]
pub struct TransformationProcessor {
    monitor: Option<Arc<PerformanceMonitor>>,
}

impl TransformationProcessor {
    pub fn new() -> Self {
        Self { monitor: None }
    }

    /// Attaches a performance monitor; batches then run under scoped
    /// sessions.
    pub fn with_monitor(mut self, monitor: Arc<PerformanceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Validates every transformation against the context. Called once per
    /// stage before processing starts.
    pub fn validate(
        &self,
        transforms: &[Arc<dyn Transformation>],
        context: &ExecutionContext,
    ) -> Result<(), EtlError> {
        for transform in transforms {
            transform.validate(context)?;
        }
        Ok(())
    }

    /// Applies the transformation chain to one record.
    pub fn process_record(
        &self,
        record: &Record,
        transforms: &[Arc<dyn Transformation>],
        context: &ExecutionContext,
    ) -> TransformationResult {
        let mut sessions = self.open_sessions(transforms);
        let result = self.process_with_sessions(record, transforms, context, &mut sessions);
        self.close_sessions(sessions);
        result
    }

    /// Applies the transformation chain to a batch, observing cancellation
    /// before each record.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` when cancellation is observed between records;
    /// results for records already processed are discarded by the caller.
    pub fn process_batch(
        &self,
        records: &[Record],
        transforms: &[Arc<dyn Transformation>],
        context: &ExecutionContext,
    ) -> Result<Vec<TransformationResult>, EtlError> {
        let mut sessions = self.open_sessions(transforms);
        let mut results = Vec::with_capacity(records.len());

        for record in records {
            if let Err(cancelled) = context.check_cancelled() {
                self.close_sessions(sessions);
                return Err(cancelled);
            }
            results.push(self.process_with_sessions(record, transforms, context, &mut sessions));
        }

        self.close_sessions(sessions);
        Ok(results)
    }

    fn process_with_sessions(
        &self,
        record: &Record,
        transforms: &[Arc<dyn Transformation>],
        context: &ExecutionContext,
        sessions: &mut HashMap<TransformationId, MonitoringSession>,
    ) -> TransformationResult {
        let chain_started = Instant::now();
        let mut current = record.deep_clone();
        let mut applied: Vec<String> = Vec::new();

        for transform in transforms {
            let step_started = Instant::now();
            let step = transform.transform(&current, context);
            let step_duration = step_started.elapsed();

            if let Some(session) = sessions.get_mut(&transform.id()) {
                session.record_processing(step_duration, step.success);
                for error in &step.errors {
                    session.record_error(&error.message);
                }
            }

            if step.success {
                let output = step.output.unwrap_or_else(|| current.deep_clone());
                let affected = count_affected_fields(&current, &output);
                context.statistics().add_transformation_applied();
                context.statistics().add_fields_processed(affected);
                applied.extend(step.applied);
                current = output;
                continue;
            }

            if step.is_skip() {
                // the chain ends here; the record is retained as-is
                let output = step.output.unwrap_or(current);
                return TransformationResult {
                    success: false,
                    output: Some(output),
                    skipped: true,
                    skip_reason: step.skip_reason,
                    errors: Vec::new(),
                    applied,
                    duration: chain_started.elapsed(),
                };
            }

            // failure: errors surface on the context and in the result
            for error in &step.errors {
                context.add_error(error.clone());
            }
            return TransformationResult {
                success: false,
                output: step.output.or(Some(current)),
                skipped: false,
                skip_reason: None,
                errors: step.errors,
                applied,
                duration: chain_started.elapsed(),
            };
        }

        TransformationResult {
            success: true,
            output: Some(current),
            skipped: false,
            skip_reason: None,
            errors: Vec::new(),
            applied,
            duration: chain_started.elapsed(),
        }
    }

    fn open_sessions(&self, transforms: &[Arc<dyn Transformation>]) -> HashMap<TransformationId, MonitoringSession> {
        let Some(monitor) = &self.monitor else {
            return HashMap::new();
        };
        let mut sessions = HashMap::new();
        for transform in transforms {
            sessions
                .entry(transform.id())
                .or_insert_with(|| monitor.start_session(transform.id(), transform.name()));
        }
        sessions
    }

    fn close_sessions(&self, sessions: HashMap<TransformationId, MonitoringSession>) {
        for (_, session) in sessions {
            session.close();
        }
    }
}

/// Counts fields that differ between input and output: changed, added or
/// removed.
fn count_affected_fields(input: &Record, output: &Record) -> u64 {
    let mut affected = 0u64;
    for (name, value) in output.iter() {
        match input.get(name) {
            Some(previous) if previous == value => {}
            _ => affected += 1,
        }
    }
    for (name, _) in input.iter() {
        if !output.contains_field(name) {
            affected += 1;
        }
    }
    affected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformation::field::CaseTransformation;
    use crate::transformation::record::{AddFieldTransformation, FilterTransformation};
    use etl_engine_domain::services::TransformationType;
    use etl_engine_domain::value_objects::{FieldValue, PipelineConfiguration, PipelineId};

    fn context() -> ExecutionContext {
        ExecutionContext::new(PipelineId::new(), "processor-tests", PipelineConfiguration::default())
    }

    struct FailingTransformation {
        core: crate::transformation::core::TransformationCore,
    }

    impl FailingTransformation {
        fn new() -> Self {
            Self {
                core: crate::transformation::core::TransformationCore::new("failing", TransformationType::Record),
            }
        }
    }

    impl Transformation for FailingTransformation {
        crate::transformation::core::delegate_transformation_core!();

        fn transform(&self, record: &Record, _context: &ExecutionContext) -> TransformationResult {
            TransformationResult::failure(
                Some(record.deep_clone()),
                etl_engine_domain::error::ExecutionError::new("deliberate failure", "TRANSFORM_EXCEPTION", "failing"),
            )
        }
    }

    #[test]
    fn chain_feeds_output_to_next_transform() {
        let processor = TransformationProcessor::new();
        let transforms: Vec<Arc<dyn Transformation>> = vec![
            Arc::new(AddFieldTransformation::new("name", "Ada")),
            Arc::new(CaseTransformation::uppercase("name")),
        ];
        let result = processor.process_record(&Record::new(), &transforms, &context());
        assert!(result.success);
        assert_eq!(result.output.unwrap().get_string("name"), Some("ADA"));
        assert_eq!(result.applied.len(), 2);
    }

    #[test]
    fn skip_stops_chain_and_is_non_fatal() {
        let ctx = context();
        let processor = TransformationProcessor::new();
        let transforms: Vec<Arc<dyn Transformation>> = vec![
            Arc::new(FilterTransformation::new("never", "always skipped", |_| false)),
            Arc::new(AddFieldTransformation::new("unreached", true)),
        ];
        let input = Record::from_fields([("id", 1)]);
        let result = processor.process_record(&input, &transforms, &ctx);

        assert!(!result.success);
        assert!(result.is_skip());
        let output = result.output.unwrap();
        assert!(!output.contains_field("unreached"));
        assert_eq!(output.get_integer("id"), Some(1));
        assert!(ctx.errors().is_empty());
    }

    #[test]
    fn failure_aborts_chain_and_reaches_context() {
        let ctx = context();
        let processor = TransformationProcessor::new();
        let transforms: Vec<Arc<dyn Transformation>> = vec![
            Arc::new(FailingTransformation::new()),
            Arc::new(AddFieldTransformation::new("unreached", true)),
        ];
        let result = processor.process_record(&Record::new(), &transforms, &ctx);

        assert!(result.is_failure());
        assert_eq!(result.errors[0].code, "TRANSFORM_EXCEPTION");
        assert_eq!(ctx.errors().len(), 1);
        assert!(!result.output.unwrap().contains_field("unreached"));
    }

    #[test]
    fn statistics_count_applied_transforms_and_fields() {
        let ctx = context();
        let processor = TransformationProcessor::new();
        let transforms: Vec<Arc<dyn Transformation>> = vec![Arc::new(AddFieldTransformation::new("tag", "x"))];
        processor
            .process_batch(
                &[Record::new(), Record::new()],
                &transforms,
                &ctx,
            )
            .unwrap();
        assert_eq!(ctx.statistics().transformations_applied(), 2);
        assert_eq!(ctx.statistics().fields_processed(), 2);
    }

    #[test]
    fn batch_observes_cancellation() {
        let ctx = context();
        ctx.cancellation().cancel();
        let processor = TransformationProcessor::new();
        let transforms: Vec<Arc<dyn Transformation>> = vec![Arc::new(AddFieldTransformation::new("tag", "x"))];
        let result = processor.process_batch(&[Record::new()], &transforms, &ctx);
        assert!(result.unwrap_err().is_cancellation());
    }

    #[test]
    fn affected_field_count_sees_changes_additions_removals() {
        let before = Record::from_fields([("a", 1), ("b", 2)]);
        let mut after = before.deep_clone();
        after.set("a", 9); // changed
        after.set("c", 3); // added
        after.remove("b"); // removed
        assert_eq!(count_affected_fields(&before, &after), 3);
    }

    #[test]
    fn monitored_batches_merge_into_aggregates() {
        let monitor = Arc::new(PerformanceMonitor::new());
        let processor = TransformationProcessor::new().with_monitor(Arc::clone(&monitor));
        let transform: Arc<dyn Transformation> = Arc::new(AddFieldTransformation::new("tag", FieldValue::Boolean(true)));
        let id = transform.id();

        processor
            .process_batch(&[Record::new(), Record::new(), Record::new()], &[transform], &context())
            .unwrap();

        let stats = monitor.statistics(id).unwrap();
        assert_eq!(stats.total_records_processed, 3);
        assert_eq!(stats.session_count, 1);
    }
}
