// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Record-Level Transformations
//!
//! Whole-record operations: adding, removing, copying and projecting
//! fields, and predicate-based filtering where a skip verdict is a legal,
//! non-fatal outcome.

use std::sync::Arc;

use etl_engine_domain::entities::ExecutionContext;
use etl_engine_domain::results::TransformationResult;
use etl_engine_domain::services::{Transformation, TransformationType};
use etl_engine_domain::value_objects::{FieldValue, Record};

use super::core::{delegate_transformation_core, TransformationCore};

/// Adds (or overwrites) a field with a fixed value.
pub struct AddFieldTransformation {
    core: TransformationCore,
    field: String,
    value: FieldValue,
}

impl AddFieldTransformation {
    pub fn new(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let field = field.into();
        Self {
            core: TransformationCore::new(format!("add-field({})", field), TransformationType::Record),
            field,
            value: value.into(),
        }
    }
}

impl Transformation for AddFieldTransformation {
    delegate_transformation_core!();

    fn transform(&self, record: &Record, _context: &ExecutionContext) -> TransformationResult {
        let mut output = record.deep_clone();
        output.set(self.field.clone(), self.value.clone());
        TransformationResult::success(output).with_applied(self.name())
    }
}

/// Removes a set of fields.
pub struct RemoveFieldsTransformation {
    core: TransformationCore,
    fields: Vec<String>,
}

impl RemoveFieldsTransformation {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        Self {
            core: TransformationCore::new(format!("remove-fields({})", fields.join(",")), TransformationType::Record),
            fields,
        }
    }
}

impl Transformation for RemoveFieldsTransformation {
    delegate_transformation_core!();

    fn transform(&self, record: &Record, _context: &ExecutionContext) -> TransformationResult {
        let mut output = record.deep_clone();
        for field in &self.fields {
            output.remove(field);
        }
        TransformationResult::success(output).with_applied(self.name())
    }
}

/// Copies one field's value to another name (missing source copies null).
pub struct CopyFieldTransformation {
    core: TransformationCore,
    source: String,
    target: String,
}

impl CopyFieldTransformation {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            core: TransformationCore::new(format!("copy-field({}->{})", source, target), TransformationType::Record),
            source,
            target,
        }
    }
}

impl Transformation for CopyFieldTransformation {
    delegate_transformation_core!();

    fn transform(&self, record: &Record, _context: &ExecutionContext) -> TransformationResult {
        let mut output = record.deep_clone();
        let value = record.get(&self.source).cloned().unwrap_or(FieldValue::Null);
        output.set(self.target.clone(), value);
        TransformationResult::success(output).with_applied(self.name())
    }
}

/// Projects the record down to a named field set, in the given order.
pub struct SelectFieldsTransformation {
    core: TransformationCore,
    fields: Vec<String>,
}

impl SelectFieldsTransformation {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        Self {
            core: TransformationCore::new(format!("select-fields({})", fields.join(",")), TransformationType::Record),
            fields,
        }
    }
}

impl Transformation for SelectFieldsTransformation {
    delegate_transformation_core!();

    fn transform(&self, record: &Record, _context: &ExecutionContext) -> TransformationResult {
        let mut output = Record::new();
        for field in &self.fields {
            if let Some(value) = record.get(field) {
                output.set(field.clone(), value.clone());
            }
        }
        TransformationResult::success(output).with_applied(self.name())
    }
}

/// Signature of a filter predicate.
pub type FilterPredicate = dyn Fn(&Record) -> bool + Send + Sync;

/// Skips records failing a predicate.
pub struct FilterTransformation {
    core: TransformationCore,
    predicate: Arc<FilterPredicate>,
    reason: String,
}

impl FilterTransformation {
    pub fn new(
        name: impl Into<String>,
        reason: impl Into<String>,
        predicate: impl Fn(&Record) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            core: TransformationCore::new(format!("filter({})", name.into()), TransformationType::Record),
            predicate: Arc::new(predicate),
            reason: reason.into(),
        }
    }
}

impl Transformation for FilterTransformation {
    delegate_transformation_core!();

    fn transform(&self, record: &Record, _context: &ExecutionContext) -> TransformationResult {
        if (self.predicate)(record) {
            TransformationResult::success(record.deep_clone()).with_applied(self.name())
        } else {
            TransformationResult::skip(record.deep_clone(), self.reason.clone())
        }
    }
}
