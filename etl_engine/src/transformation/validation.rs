// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Field Validation Transformation
//!
//! Data-quality checks at the value level: required presence, regex shape,
//! numeric range. Violations are routed per the transformation's
//! [`ValidationAction`] — fatal error, warning, skip, default substitution,
//! or field removal — so the same check can be policy-hard in one pipeline
//! and advisory in another.

use etl_engine_domain::entities::ExecutionContext;
use etl_engine_domain::error::{EtlError, ExecutionError, ExecutionWarning};
use etl_engine_domain::results::TransformationResult;
use etl_engine_domain::services::{Transformation, TransformationType, ValidationAction};
use etl_engine_domain::value_objects::Record;
use regex::Regex;

use super::core::{delegate_transformation_core, TransformationCore};

/// A single data-quality check on one field.
#[derive(Debug, Clone)]
pub enum ValidationRule {
    /// The field must be present and non-null/non-empty.
    Required,
    /// The string form of the value must match the regex.
    Pattern(Regex),
    /// The numeric form of the value must lie within the bounds
    /// (inclusive).
    Range { min: Option<f64>, max: Option<f64> },
}

impl ValidationRule {
    /// Compiles a pattern rule.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for an invalid regex.
    pub fn pattern(pattern: &str) -> Result<Self, EtlError> {
        Regex::new(pattern)
            .map(ValidationRule::Pattern)
            .map_err(|e| EtlError::invalid_config(format!("Invalid validation pattern '{}': {}", pattern, e)))
    }

    fn check(&self, record: &Record, field: &str) -> Option<String> {
        let value = record.get(field);
        match self {
            ValidationRule::Required => {
                if value.map_or(true, |v| v.is_null_or_empty()) {
                    Some(format!("field '{}' is required", field))
                } else {
                    None
                }
            }
            ValidationRule::Pattern(regex) => match value {
                Some(v) if !v.is_null() => {
                    let text = v.coerce_string();
                    if regex.is_match(&text) {
                        None
                    } else {
                        Some(format!("field '{}' value '{}' does not match {}", field, text, regex))
                    }
                }
                // absent values are the Required rule's concern
                _ => None,
            },
            ValidationRule::Range { min, max } => match value.and_then(|v| v.as_decimal()) {
                Some(decimal) => {
                    if min.map_or(false, |m| decimal < m) || max.map_or(false, |m| decimal > m) {
                        Some(format!("field '{}' value {} outside range", field, decimal))
                    } else {
                        None
                    }
                }
                None => match value {
                    Some(v) if !v.is_null() => Some(format!("field '{}' is not numeric", field)),
                    _ => None,
                },
            },
        }
    }
}

/// Validates one field against a list of rules.
pub struct FieldValidationTransformation {
    core: TransformationCore,
    field: String,
    rules: Vec<ValidationRule>,
    action: ValidationAction,
}

impl FieldValidationTransformation {
    pub fn new(field: impl Into<String>, rules: Vec<ValidationRule>, action: ValidationAction) -> Self {
        let field = field.into();
        Self {
            core: TransformationCore::new(format!("validate({})", field), TransformationType::Field),
            field,
            rules,
            action,
        }
    }
}

impl Transformation for FieldValidationTransformation {
    delegate_transformation_core!();

    fn validate(&self, _context: &ExecutionContext) -> Result<(), EtlError> {
        if self.rules.is_empty() {
            return Err(EtlError::invalid_config(format!(
                "Validation of field '{}' has no rules",
                self.field
            )));
        }
        Ok(())
    }

    fn transform(&self, record: &Record, context: &ExecutionContext) -> TransformationResult {
        let violation = self.rules.iter().find_map(|rule| rule.check(record, &self.field));

        let Some(message) = violation else {
            return TransformationResult::success(record.deep_clone()).with_applied(self.name());
        };

        match &self.action {
            ValidationAction::AddError => TransformationResult::failure(
                Some(record.deep_clone()),
                ExecutionError::new(message, "DATA_QUALITY", self.name()),
            ),
            ValidationAction::AddWarning => {
                context.add_warning(ExecutionWarning::new(message, self.name()));
                TransformationResult::success(record.deep_clone()).with_applied(self.name())
            }
            ValidationAction::SkipRecord => TransformationResult::skip(record.deep_clone(), message),
            ValidationAction::SetDefault(default) => {
                let mut output = record.deep_clone();
                output.set(self.field.clone(), default.clone());
                TransformationResult::success(output).with_applied(self.name())
            }
            ValidationAction::RemoveField => {
                let mut output = record.deep_clone();
                output.remove(&self.field);
                TransformationResult::success(output).with_applied(self.name())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_engine_domain::value_objects::{FieldValue, PipelineConfiguration, PipelineId};

    fn context() -> ExecutionContext {
        ExecutionContext::new(PipelineId::new(), "validation-tests", PipelineConfiguration::default())
    }

    #[test]
    fn required_catches_missing_null_and_empty() {
        let transform =
            FieldValidationTransformation::new("email", vec![ValidationRule::Required], ValidationAction::AddError);
        let ctx = context();

        assert!(transform.transform(&Record::new(), &ctx).is_failure());
        assert!(transform
            .transform(&Record::from_fields([("email", FieldValue::Null)]), &ctx)
            .is_failure());
        assert!(transform
            .transform(&Record::from_fields([("email", "")]), &ctx)
            .is_failure());
        assert!(transform
            .transform(&Record::from_fields([("email", "a@b.c")]), &ctx)
            .success);
    }

    #[test]
    fn pattern_violation_routes_per_action() {
        let rules = || vec![ValidationRule::pattern(r"^\d{5}$").unwrap()];
        let ctx = context();
        let bad = Record::from_fields([("zip", "12ab")]);

        let erroring = FieldValidationTransformation::new("zip", rules(), ValidationAction::AddError);
        let result = erroring.transform(&bad, &ctx);
        assert!(result.is_failure());
        assert_eq!(result.errors[0].code, "DATA_QUALITY");

        let skipping = FieldValidationTransformation::new("zip", rules(), ValidationAction::SkipRecord);
        assert!(skipping.transform(&bad, &ctx).is_skip());

        let defaulting = FieldValidationTransformation::new(
            "zip",
            rules(),
            ValidationAction::SetDefault(FieldValue::String("00000".into())),
        );
        assert_eq!(
            defaulting.transform(&bad, &ctx).output.unwrap().get_string("zip"),
            Some("00000")
        );

        let removing = FieldValidationTransformation::new("zip", rules(), ValidationAction::RemoveField);
        assert!(!removing.transform(&bad, &ctx).output.unwrap().contains_field("zip"));
    }

    #[test]
    fn warning_action_records_and_passes() {
        let ctx = context();
        let transform = FieldValidationTransformation::new(
            "age",
            vec![ValidationRule::Range {
                min: Some(0.0),
                max: Some(150.0),
            }],
            ValidationAction::AddWarning,
        );
        let result = transform.transform(&Record::from_fields([("age", 200)]), &ctx);
        assert!(result.success);
        assert_eq!(ctx.warnings().len(), 1);
    }
}
