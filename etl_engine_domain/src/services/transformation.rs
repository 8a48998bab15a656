// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transformation Contract
//!
//! The [`Transformation`] trait is the value-level function applied to
//! records: pure except for context side effects (statistics, errors,
//! warnings). Variants are carried as a [`TransformationType`] tag rather
//! than an inheritance hierarchy; shared construction lives in the engine's
//! transformation core.
//!
//! ## Contract rules
//!
//! - A transformation never mutates its input record. Mutation is always
//!   clone → modify clone → return clone.
//! - Failures are returned inside [`TransformationResult`]s; a
//!   transformation does not return `Err` across the processor boundary
//!   except for cancellation.
//! - `transform_batch` must observe cancellation before each record.
//!
//! Transformations are synchronous, CPU-bound functions. Anything that
//! needs I/O belongs in a connector or a custom stage, not here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entities::ExecutionContext;
use crate::error::EtlError;
use crate::results::TransformationResult;
use crate::value_objects::{Record, TransformationId};

/// Variant tag for transformations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformationType {
    /// One field in, one field out; may rename the field.
    Field,
    /// Full record in, zero or more records out; skipping is a legal
    /// outcome.
    Record,
    /// Guarded by an evaluated condition.
    Conditional,
    /// Window-based aggregation over a batch.
    Aggregate,
}

impl std::fmt::Display for TransformationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformationType::Field => write!(f, "field"),
            TransformationType::Record => write!(f, "record"),
            TransformationType::Conditional => write!(f, "conditional"),
            TransformationType::Aggregate => write!(f, "aggregate"),
        }
    }
}

/// Routing policy for data-quality failures inside transformations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationAction {
    /// Fatal to the record: an error is recorded.
    AddError,
    /// Non-fatal: a warning is recorded and the record passes through.
    AddWarning,
    /// The record is dropped with a skip verdict.
    SkipRecord,
    /// The offending value is replaced with a default.
    SetDefault(crate::value_objects::FieldValue),
    /// The offending field is removed from the record.
    RemoveField,
}

/// Descriptive metadata about a transformation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationMetadata {
    pub id: TransformationId,
    pub name: String,
    pub description: String,
    pub transformation_type: TransformationType,
    pub supports_parallel_execution: bool,
    pub properties: HashMap<String, String>,
}

/// A value-level function over records.
pub trait Transformation: Send + Sync {
    /// Unique identifier of this transformation instance.
    fn id(&self) -> TransformationId;

    /// Human-readable name used in provenance and logs.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Variant tag.
    fn transformation_type(&self) -> TransformationType;

    /// Whether this transformation may run on partitioned records across
    /// workers. A stage selects the parallel strategy only when every
    /// transformation in it declares support.
    fn supports_parallel_execution(&self) -> bool {
        true
    }

    /// Validates the transformation's own configuration against the run
    /// context. Called once before processing starts.
    fn validate(&self, _context: &ExecutionContext) -> Result<(), EtlError> {
        Ok(())
    }

    /// Applies the transformation to one record.
    fn transform(&self, record: &Record, context: &ExecutionContext) -> TransformationResult;

    /// Applies the transformation to a batch.
    ///
    /// The default maps `transform` over the records, observing
    /// cancellation before each one.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` when cancellation is observed; partial results
    /// are discarded by the caller in that case.
    fn transform_batch(
        &self,
        records: &[Record],
        context: &ExecutionContext,
    ) -> Result<Vec<TransformationResult>, EtlError> {
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            context.check_cancelled()?;
            results.push(self.transform(record, context));
        }
        Ok(results)
    }

    /// Descriptive metadata, assembled from the accessors by default.
    fn metadata(&self) -> TransformationMetadata {
        TransformationMetadata {
            id: self.id(),
            name: self.name().to_string(),
            description: self.description().to_string(),
            transformation_type: self.transformation_type(),
            supports_parallel_execution: self.supports_parallel_execution(),
            properties: HashMap::new(),
        }
    }
}
