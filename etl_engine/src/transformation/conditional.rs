// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Conditional Transformation
//!
//! Guards an inner transformation with field conditions (AND-combined, the
//! rule engine's operator set). Records failing the guard either pass
//! through untouched or run an optional `otherwise` transformation.

use std::sync::Arc;

use etl_engine_domain::entities::ExecutionContext;
use etl_engine_domain::error::EtlError;
use etl_engine_domain::results::TransformationResult;
use etl_engine_domain::services::{Transformation, TransformationType};
use etl_engine_domain::value_objects::Record;

use crate::rules::RuleCondition;

use super::core::{delegate_transformation_core_identity, TransformationCore};

/// Applies an inner transformation only when the guard holds.
pub struct ConditionalTransformation {
    core: TransformationCore,
    conditions: Vec<RuleCondition>,
    then_transform: Arc<dyn Transformation>,
    otherwise_transform: Option<Arc<dyn Transformation>>,
}

impl ConditionalTransformation {
    pub fn new(condition: RuleCondition, then_transform: Arc<dyn Transformation>) -> Self {
        let core = TransformationCore::new(
            format!("when({})::{}", condition.field, then_transform.name()),
            TransformationType::Conditional,
        );
        Self {
            core,
            conditions: vec![condition],
            then_transform,
            otherwise_transform: None,
        }
    }

    /// Adds a further guard condition (AND-combined).
    pub fn and_when(mut self, condition: RuleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Transformation to run when the guard does not hold.
    pub fn otherwise(mut self, transform: Arc<dyn Transformation>) -> Self {
        self.otherwise_transform = Some(transform);
        self
    }

    fn guard_holds(&self, record: &Record) -> bool {
        self.conditions.iter().all(|condition| condition.evaluate(record))
    }
}

impl Transformation for ConditionalTransformation {
    delegate_transformation_core_identity!();

    fn supports_parallel_execution(&self) -> bool {
        let then_ok = self.then_transform.supports_parallel_execution();
        let otherwise_ok = self
            .otherwise_transform
            .as_ref()
            .map_or(true, |t| t.supports_parallel_execution());
        then_ok && otherwise_ok
    }

    fn validate(&self, context: &ExecutionContext) -> Result<(), EtlError> {
        for condition in &self.conditions {
            condition.validate()?;
        }
        self.then_transform.validate(context)?;
        if let Some(otherwise) = &self.otherwise_transform {
            otherwise.validate(context)?;
        }
        Ok(())
    }

    fn transform(&self, record: &Record, context: &ExecutionContext) -> TransformationResult {
        if self.guard_holds(record) {
            self.then_transform.transform(record, context).with_applied(self.name())
        } else if let Some(otherwise) = &self.otherwise_transform {
            otherwise.transform(record, context).with_applied(self.name())
        } else {
            TransformationResult::success(record.deep_clone())
        }
    }
}
