// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Field-Level Transformations
//!
//! One field in, one field out (optionally under a new name). All of these
//! follow the mutation discipline — clone, modify the clone, return it —
//! and leave records without the source field untouched: absence is not an
//! error at this level, validation transforms exist for that.
//!
//! The masking transformation carries compiled patterns for common
//! sensitive-value shapes (emails, SSNs, phone numbers, card numbers) plus
//! a custom-regex escape hatch.

use std::sync::Arc;

use etl_engine_domain::entities::ExecutionContext;
use etl_engine_domain::error::{EtlError, ExecutionError, ExecutionWarning};
use etl_engine_domain::results::TransformationResult;
use etl_engine_domain::services::{Transformation, TransformationType, ValidationAction};
use etl_engine_domain::value_objects::{FieldValue, Record, ValueKind};
use once_cell::sync::Lazy;
use regex::Regex;

use super::core::{delegate_transformation_core, TransformationCore};

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email regex is valid"));

static SSN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn regex is valid"));

static PHONE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b").expect("phone regex is valid"));

static CARD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b").expect("card regex is valid"));

/// Case conversion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    Upper,
    Lower,
}

/// Converts a string field's case.
pub struct CaseTransformation {
    core: TransformationCore,
    field: String,
    target_field: Option<String>,
    mode: CaseMode,
}

impl CaseTransformation {
    pub fn new(field: impl Into<String>, mode: CaseMode) -> Self {
        let field = field.into();
        let name = match mode {
            CaseMode::Upper => format!("uppercase({})", field),
            CaseMode::Lower => format!("lowercase({})", field),
        };
        Self {
            core: TransformationCore::new(name, TransformationType::Field),
            field,
            target_field: None,
            mode,
        }
    }

    /// Uppercases a field in place.
    pub fn uppercase(field: impl Into<String>) -> Self {
        Self::new(field, CaseMode::Upper)
    }

    /// Lowercases a field in place.
    pub fn lowercase(field: impl Into<String>) -> Self {
        Self::new(field, CaseMode::Lower)
    }

    /// Writes the converted value under a different field name.
    pub fn into_field(mut self, target: impl Into<String>) -> Self {
        self.target_field = Some(target.into());
        self
    }
}

impl Transformation for CaseTransformation {
    delegate_transformation_core!();

    fn transform(&self, record: &Record, _context: &ExecutionContext) -> TransformationResult {
        let mut output = record.deep_clone();
        if let Some(FieldValue::String(s)) = record.get(&self.field) {
            let converted = match self.mode {
                CaseMode::Upper => s.to_uppercase(),
                CaseMode::Lower => s.to_lowercase(),
            };
            let target = self.target_field.as_deref().unwrap_or(&self.field);
            output.set(target.to_string(), converted);
        }
        TransformationResult::success(output).with_applied(self.name())
    }
}

/// Trims leading and trailing whitespace from a string field.
pub struct TrimTransformation {
    core: TransformationCore,
    field: String,
}

impl TrimTransformation {
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            core: TransformationCore::new(format!("trim({})", field), TransformationType::Field),
            field,
        }
    }
}

impl Transformation for TrimTransformation {
    delegate_transformation_core!();

    fn transform(&self, record: &Record, _context: &ExecutionContext) -> TransformationResult {
        let mut output = record.deep_clone();
        if let Some(FieldValue::String(s)) = record.get(&self.field) {
            output.set(self.field.clone(), s.trim().to_string());
        }
        TransformationResult::success(output).with_applied(self.name())
    }
}

/// Regex find-and-replace over a string field.
pub struct ReplaceTransformation {
    core: TransformationCore,
    field: String,
    pattern: Regex,
    replacement: String,
}

impl ReplaceTransformation {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the pattern is not a valid
    /// regex.
    pub fn new(field: impl Into<String>, pattern: &str, replacement: impl Into<String>) -> Result<Self, EtlError> {
        let field = field.into();
        let pattern = Regex::new(pattern)
            .map_err(|e| EtlError::invalid_config(format!("Invalid replace pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            core: TransformationCore::new(format!("replace({})", field), TransformationType::Field),
            field,
            pattern,
            replacement: replacement.into(),
        })
    }
}

impl Transformation for ReplaceTransformation {
    delegate_transformation_core!();

    fn transform(&self, record: &Record, _context: &ExecutionContext) -> TransformationResult {
        let mut output = record.deep_clone();
        if let Some(FieldValue::String(s)) = record.get(&self.field) {
            let replaced = self.pattern.replace_all(s, self.replacement.as_str()).into_owned();
            output.set(self.field.clone(), replaced);
        }
        TransformationResult::success(output).with_applied(self.name())
    }
}

/// Built-in and custom masking patterns.
#[derive(Debug, Clone)]
pub enum MaskPattern {
    Email,
    Ssn,
    Phone,
    CreditCard,
    Custom(Regex),
}

impl MaskPattern {
    fn regex(&self) -> &Regex {
        match self {
            MaskPattern::Email => &EMAIL_REGEX,
            MaskPattern::Ssn => &SSN_REGEX,
            MaskPattern::Phone => &PHONE_REGEX,
            MaskPattern::CreditCard => &CARD_REGEX,
            MaskPattern::Custom(regex) => regex,
        }
    }
}

/// Masks sensitive spans within a string field.
pub struct MaskTransformation {
    core: TransformationCore,
    field: String,
    pattern: MaskPattern,
    mask_char: char,
}

impl MaskTransformation {
    pub fn new(field: impl Into<String>, pattern: MaskPattern) -> Self {
        let field = field.into();
        Self {
            core: TransformationCore::new(format!("mask({})", field), TransformationType::Field),
            field,
            pattern,
            mask_char: '*',
        }
    }

    pub fn with_mask_char(mut self, mask_char: char) -> Self {
        self.mask_char = mask_char;
        self
    }
}

impl Transformation for MaskTransformation {
    delegate_transformation_core!();

    fn transform(&self, record: &Record, _context: &ExecutionContext) -> TransformationResult {
        let mut output = record.deep_clone();
        if let Some(FieldValue::String(s)) = record.get(&self.field) {
            let mask_char = self.mask_char;
            let masked = self
                .pattern
                .regex()
                .replace_all(s, |caps: &regex::Captures<'_>| {
                    mask_char.to_string().repeat(caps[0].chars().count())
                })
                .into_owned();
            output.set(self.field.clone(), masked);
        }
        TransformationResult::success(output).with_applied(self.name())
    }
}

/// Converts a field to a target kind, routing failures per the validation
/// action.
pub struct TypeConversionTransformation {
    core: TransformationCore,
    field: String,
    target: ValueKind,
    on_failure: ValidationAction,
}

impl TypeConversionTransformation {
    pub fn new(field: impl Into<String>, target: ValueKind, on_failure: ValidationAction) -> Self {
        let field = field.into();
        Self {
            core: TransformationCore::new(format!("convert({}->{})", field, target), TransformationType::Field),
            field,
            target,
            on_failure,
        }
    }

    fn convert(&self, value: &FieldValue) -> Option<FieldValue> {
        match self.target {
            ValueKind::String => Some(FieldValue::String(value.coerce_string())),
            ValueKind::Integer => value.as_decimal().map(|d| FieldValue::Integer(d as i64)),
            ValueKind::Real => value.as_decimal().map(FieldValue::Real),
            ValueKind::Boolean => value.as_boolean().map(FieldValue::Boolean),
            ValueKind::Timestamp => value.as_timestamp().map(FieldValue::Timestamp),
            _ => None,
        }
    }
}

impl Transformation for TypeConversionTransformation {
    delegate_transformation_core!();

    fn validate(&self, _context: &ExecutionContext) -> Result<(), EtlError> {
        match self.target {
            ValueKind::Null | ValueKind::List | ValueKind::Duration => Err(EtlError::invalid_config(format!(
                "Cannot convert to {} values",
                self.target
            ))),
            _ => Ok(()),
        }
    }

    fn transform(&self, record: &Record, context: &ExecutionContext) -> TransformationResult {
        let value = match record.get(&self.field) {
            Some(value) if !value.is_null() => value.clone(),
            // absent and null values pass through untouched
            _ => return TransformationResult::success(record.deep_clone()).with_applied(self.name()),
        };

        match self.convert(&value) {
            Some(converted) => {
                let mut output = record.deep_clone();
                output.set(self.field.clone(), converted);
                TransformationResult::success(output).with_applied(self.name())
            }
            None => {
                let message = format!(
                    "field '{}' value '{}' does not convert to {}",
                    self.field,
                    value.coerce_string(),
                    self.target
                );
                match &self.on_failure {
                    ValidationAction::AddError => TransformationResult::failure(
                        Some(record.deep_clone()),
                        ExecutionError::new(message, "TYPE_CONVERSION_FAILED", self.name()),
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
    }
}

/// Fills a missing or null field with a default value.
pub struct DefaultValueTransformation {
    core: TransformationCore,
    field: String,
    default: FieldValue,
}

impl DefaultValueTransformation {
    pub fn new(field: impl Into<String>, default: impl Into<FieldValue>) -> Self {
        let field = field.into();
        Self {
            core: TransformationCore::new(format!("default({})", field), TransformationType::Field),
            field,
            default: default.into(),
        }
    }
}

impl Transformation for DefaultValueTransformation {
    delegate_transformation_core!();

    fn transform(&self, record: &Record, _context: &ExecutionContext) -> TransformationResult {
        let mut output = record.deep_clone();
        let needs_default = record.get(&self.field).map_or(true, |value| value.is_null());
        if needs_default {
            output.set(self.field.clone(), self.default.clone());
        }
        TransformationResult::success(output).with_applied(self.name())
    }
}

/// Moves a field's value to a new name.
pub struct RenameFieldTransformation {
    core: TransformationCore,
    from: String,
    to: String,
}

impl RenameFieldTransformation {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        let from = from.into();
        let to = to.into();
        Self {
            core: TransformationCore::new(format!("rename({}->{})", from, to), TransformationType::Field),
            from,
            to,
        }
    }
}

impl Transformation for RenameFieldTransformation {
    delegate_transformation_core!();

    fn transform(&self, record: &Record, _context: &ExecutionContext) -> TransformationResult {
        let mut output = record.deep_clone();
        if let Some(value) = output.remove(&self.from) {
            output.set(self.to.clone(), value);
        }
        TransformationResult::success(output).with_applied(self.name())
    }
}

/// Signature of a compute-field derivation.
pub type ComputeFn = dyn Fn(&Record) -> Result<FieldValue, EtlError> + Send + Sync;

/// Derives a field from the whole record via a callable.
pub struct ComputeFieldTransformation {
    core: TransformationCore,
    target_field: String,
    compute: Arc<ComputeFn>,
}

impl ComputeFieldTransformation {
    pub fn new(
        target_field: impl Into<String>,
        compute: impl Fn(&Record) -> Result<FieldValue, EtlError> + Send + Sync + 'static,
    ) -> Self {
        let target_field = target_field.into();
        Self {
            core: TransformationCore::new(format!("compute({})", target_field), TransformationType::Field),
            target_field,
            compute: Arc::new(compute),
        }
    }
}

impl Transformation for ComputeFieldTransformation {
    delegate_transformation_core!();

    fn transform(&self, record: &Record, _context: &ExecutionContext) -> TransformationResult {
        match (self.compute)(record) {
            Ok(value) => {
                let mut output = record.deep_clone();
                output.set(self.target_field.clone(), value);
                TransformationResult::success(output).with_applied(self.name())
            }
            Err(error) => TransformationResult::failure(
                Some(record.deep_clone()),
                ExecutionError::new(error.to_string(), "TRANSFORM_EXCEPTION", self.name()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_engine_domain::value_objects::{PipelineConfiguration, PipelineId};

    fn context() -> ExecutionContext {
        ExecutionContext::new(PipelineId::new(), "field-tests", PipelineConfiguration::default())
    }

    #[test]
    fn case_transformation_does_not_mutate_input() {
        let input = Record::from_fields([("name", "Alice")]);
        let result = CaseTransformation::lowercase("name").transform(&input, &context());
        assert_eq!(result.output.unwrap().get_string("name"), Some("alice"));
        assert_eq!(input.get_string("name"), Some("Alice"));
    }

    #[test]
    fn case_transformation_passes_through_non_strings() {
        let input = Record::from_fields([("name", 42)]);
        let result = CaseTransformation::uppercase("name").transform(&input, &context());
        assert!(result.success);
        assert_eq!(result.output.unwrap().get_integer("name"), Some(42));
    }

    #[test]
    fn trim_and_replace() {
        let ctx = context();
        let input = Record::from_fields([("city", "  Lyon  ")]);
        let trimmed = TrimTransformation::new("city").transform(&input, &ctx);
        assert_eq!(trimmed.output.unwrap().get_string("city"), Some("Lyon"));

        let input = Record::from_fields([("phone", "555.123.4567")]);
        let replaced = ReplaceTransformation::new("phone", r"\.", "-")
            .unwrap()
            .transform(&input, &ctx);
        assert_eq!(replaced.output.unwrap().get_string("phone"), Some("555-123-4567"));
    }

    #[test]
    fn mask_preserves_length() {
        let input = Record::from_fields([("contact", "mail me at bob@example.com today")]);
        let result = MaskTransformation::new("contact", MaskPattern::Email).transform(&input, &context());
        let masked = result.output.unwrap();
        let value = masked.get_string("contact").unwrap();
        assert_eq!(value, "mail me at *************** today");
    }

    #[test]
    fn type_conversion_success_and_error_routing() {
        let ctx = context();
        let input = Record::from_fields([("count", "41")]);
        let ok = TypeConversionTransformation::new("count", ValueKind::Integer, ValidationAction::AddError)
            .transform(&input, &ctx);
        assert_eq!(ok.output.unwrap().get_integer("count"), Some(41));

        let bad = Record::from_fields([("count", "not-a-number")]);
        let failed = TypeConversionTransformation::new("count", ValueKind::Integer, ValidationAction::AddError)
            .transform(&bad, &ctx);
        assert!(failed.is_failure());
        assert_eq!(failed.errors[0].code, "TYPE_CONVERSION_FAILED");

        let defaulted = TypeConversionTransformation::new(
            "count",
            ValueKind::Integer,
            ValidationAction::SetDefault(FieldValue::Integer(0)),
        )
        .transform(&bad, &ctx);
        assert_eq!(defaulted.output.unwrap().get_integer("count"), Some(0));

        let skipped = TypeConversionTransformation::new("count", ValueKind::Integer, ValidationAction::SkipRecord)
            .transform(&bad, &ctx);
        assert!(skipped.is_skip());
    }

    #[test]
    fn default_value_fills_null_and_missing() {
        let ctx = context();
        let transform = DefaultValueTransformation::new("region", "unknown");

        let missing = Record::new();
        assert_eq!(
            transform.transform(&missing, &ctx).output.unwrap().get_string("region"),
            Some("unknown")
        );

        let null = Record::from_fields([("region", FieldValue::Null)]);
        assert_eq!(
            transform.transform(&null, &ctx).output.unwrap().get_string("region"),
            Some("unknown")
        );

        let present = Record::from_fields([("region", "eu-west")]);
        assert_eq!(
            transform.transform(&present, &ctx).output.unwrap().get_string("region"),
            Some("eu-west")
        );
    }

    #[test]
    fn rename_moves_value() {
        let input = Record::from_fields([("old", 1), ("other", 2)]);
        let result = RenameFieldTransformation::new("old", "new").transform(&input, &context());
        let output = result.output.unwrap();
        assert!(!output.contains_field("old"));
        assert_eq!(output.get_integer("new"), Some(1));
    }

    #[test]
    fn compute_failure_uses_transform_exception_code() {
        let transform = ComputeFieldTransformation::new("derived", |_record| Err(EtlError::internal("no data")));
        let result = transform.transform(&Record::new(), &context());
        assert!(result.is_failure());
        assert_eq!(result.errors[0].code, "TRANSFORM_EXCEPTION");
    }
}
