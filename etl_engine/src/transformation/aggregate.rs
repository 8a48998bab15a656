// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Aggregate Transformation
//!
//! Window-based aggregation over batches: records are grouped into
//! consecutive windows of a fixed size, and each window emits one summary
//! record. A trailing partial window still aggregates — an undersized final
//! batch is not an error.
//!
//! Aggregation is inherently order-dependent, so these transformations never
//! declare parallel support.

use etl_engine_domain::entities::ExecutionContext;
use etl_engine_domain::error::{EtlError, ExecutionError};
use etl_engine_domain::results::TransformationResult;
use etl_engine_domain::services::{Transformation, TransformationType};
use etl_engine_domain::value_objects::{FieldValue, Record};

use super::core::{delegate_transformation_core, TransformationCore};

/// Aggregation function over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl std::fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateFunction::Count => write!(f, "count"),
            AggregateFunction::Sum => write!(f, "sum"),
            AggregateFunction::Avg => write!(f, "avg"),
            AggregateFunction::Min => write!(f, "min"),
            AggregateFunction::Max => write!(f, "max"),
        }
    }
}

/// Emits one summary record per window of `window_size` input records.
pub struct WindowAggregateTransformation {
    core: TransformationCore,
    window_size: usize,
    function: AggregateFunction,
    source_field: String,
    target_field: String,
}

impl WindowAggregateTransformation {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for a zero window size.
    pub fn new(
        window_size: usize,
        function: AggregateFunction,
        source_field: impl Into<String>,
        target_field: impl Into<String>,
    ) -> Result<Self, EtlError> {
        if window_size == 0 {
            return Err(EtlError::invalid_config("Aggregate window size must be at least 1"));
        }
        let source_field = source_field.into();
        let target_field = target_field.into();
        Ok(Self {
            core: TransformationCore::new(
                format!("{}({})/window{}", function, source_field, window_size),
                TransformationType::Aggregate,
            )
            .sequential_only(),
            window_size,
            function,
            source_field,
            target_field,
        })
    }

    fn aggregate_window(&self, window: &[Record]) -> Result<FieldValue, String> {
        if self.function == AggregateFunction::Count {
            return Ok(FieldValue::Integer(window.len() as i64));
        }

        let mut values = Vec::with_capacity(window.len());
        for record in window {
            match record.get(&self.source_field).and_then(|value| value.as_decimal()) {
                Some(decimal) => values.push(decimal),
                None => {
                    return Err(format!(
                        "field '{}' is missing or non-numeric in window",
                        self.source_field
                    ))
                }
            }
        }

        let value = match self.function {
            AggregateFunction::Count => unreachable!("handled above"),
            AggregateFunction::Sum => values.iter().sum(),
            AggregateFunction::Avg => values.iter().sum::<f64>() / values.len() as f64,
            AggregateFunction::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
            AggregateFunction::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        };
        Ok(FieldValue::Real(value))
    }

    fn summary_record(&self, window: &[Record], index: usize, value: FieldValue) -> Record {
        let mut output = Record::new();
        output.set("window", index as i64);
        output.set("window_size", window.len() as i64);
        output.set(self.target_field.clone(), value);
        output
    }
}

impl Transformation for WindowAggregateTransformation {
    delegate_transformation_core!();

    fn transform(&self, record: &Record, _context: &ExecutionContext) -> TransformationResult {
        // a single record is a window of one
        match self.aggregate_window(std::slice::from_ref(record)) {
            Ok(value) => TransformationResult::success(self.summary_record(std::slice::from_ref(record), 0, value))
                .with_applied(self.name()),
            Err(message) => TransformationResult::failure(
                Some(record.deep_clone()),
                ExecutionError::new(message, "AGGREGATE_FAILED", self.name()),
            ),
        }
    }

    fn transform_batch(
        &self,
        records: &[Record],
        context: &ExecutionContext,
    ) -> Result<Vec<TransformationResult>, EtlError> {
        let mut results = Vec::new();
        for (index, window) in records.chunks(self.window_size).enumerate() {
            context.check_cancelled()?;
            match self.aggregate_window(window) {
                Ok(value) => results.push(
                    TransformationResult::success(self.summary_record(window, index, value)).with_applied(self.name()),
                ),
                Err(message) => results.push(TransformationResult::failure(
                    None,
                    ExecutionError::new(message, "AGGREGATE_FAILED", self.name()),
                )),
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_engine_domain::value_objects::{PipelineConfiguration, PipelineId};

    fn context() -> ExecutionContext {
        ExecutionContext::new(PipelineId::new(), "aggregate-tests", PipelineConfiguration::default())
    }

    fn records(values: &[i64]) -> Vec<Record> {
        values.iter().map(|v| Record::from_fields([("amount", *v)])).collect()
    }

    #[test]
    fn windows_aggregate_and_partial_tail_counts() {
        let transform = WindowAggregateTransformation::new(2, AggregateFunction::Sum, "amount", "total").unwrap();
        let results = transform.transform_batch(&records(&[1, 2, 3, 4, 5]), &context()).unwrap();

        assert_eq!(results.len(), 3);
        let totals: Vec<f64> = results
            .iter()
            .map(|r| match r.output.as_ref().unwrap().get("total").unwrap() {
                FieldValue::Real(v) => *v,
                other => panic!("unexpected value {:?}", other),
            })
            .collect();
        assert_eq!(totals, vec![3.0, 7.0, 5.0]);
        assert_eq!(results[2].output.as_ref().unwrap().get_integer("window_size"), Some(1));
    }

    #[test]
    fn avg_min_max_count() {
        let ctx = context();
        let input = records(&[2, 4, 6]);

        let avg = WindowAggregateTransformation::new(3, AggregateFunction::Avg, "amount", "avg").unwrap();
        let result = &avg.transform_batch(&input, &ctx).unwrap()[0];
        assert_eq!(result.output.as_ref().unwrap().get("avg"), Some(&FieldValue::Real(4.0)));

        let count = WindowAggregateTransformation::new(3, AggregateFunction::Count, "amount", "n").unwrap();
        let result = &count.transform_batch(&input, &ctx).unwrap()[0];
        assert_eq!(result.output.as_ref().unwrap().get_integer("n"), Some(3));
    }

    #[test]
    fn non_numeric_field_fails_window() {
        let transform = WindowAggregateTransformation::new(2, AggregateFunction::Sum, "amount", "total").unwrap();
        let input = vec![Record::from_fields([("amount", "x")])];
        let results = transform.transform_batch(&input, &context()).unwrap();
        assert!(results[0].is_failure());
        assert_eq!(results[0].errors[0].code, "AGGREGATE_FAILED");
    }

    #[test]
    fn zero_window_is_invalid() {
        assert!(WindowAggregateTransformation::new(0, AggregateFunction::Sum, "a", "b").is_err());
    }
}
