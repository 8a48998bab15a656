// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Rule Conditions
//!
//! Field-level predicates evaluated against records. A rule combines its
//! conditions with AND; the operators cover equality, ordering, string
//! containment, regex matching, null checks and set membership.
//!
//! ## Evaluation semantics
//!
//! - Comparisons use the field-value promotion chain: decimal, then
//!   timestamp, then ordinal string comparison. Incompatible kinds are
//!   unordered, so ordering operators evaluate to `false` for them.
//! - A missing field evaluates as `Null`. Null matches only `Equals` against
//!   `Null`, `IsNullOrEmpty`, and `NotIn` of a list without nulls.
//! - `In`/`NotIn` accept either a list value or a comma-separated string.

use etl_engine_domain::error::EtlError;
use etl_engine_domain::value_objects::{FieldValue, Record};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Contains,
    StartsWith,
    EndsWith,
    /// Regex match against the string form of the field value.
    Matches,
    IsNullOrEmpty,
    IsNotNullOrEmpty,
    In,
    NotIn,
}

impl std::fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::NotEquals => "not-equals",
            ConditionOperator::GreaterThan => "greater-than",
            ConditionOperator::GreaterOrEqual => "greater-or-equal",
            ConditionOperator::LessThan => "less-than",
            ConditionOperator::LessOrEqual => "less-or-equal",
            ConditionOperator::Contains => "contains",
            ConditionOperator::StartsWith => "starts-with",
            ConditionOperator::EndsWith => "ends-with",
            ConditionOperator::Matches => "matches",
            ConditionOperator::IsNullOrEmpty => "is-null-or-empty",
            ConditionOperator::IsNotNullOrEmpty => "is-not-null-or-empty",
            ConditionOperator::In => "in",
            ConditionOperator::NotIn => "not-in",
        };
        write!(f, "{}", s)
    }
}

/// A single field predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: String,
    pub operator: ConditionOperator,
    /// Comparison operand; unused by the null-check operators.
    pub value: FieldValue,
}

impl RuleCondition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Convenience constructor for equality checks.
    pub fn equals(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, ConditionOperator::Equals, value)
    }

    /// Validates the condition's own configuration.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` for an empty field name
    /// - `InvalidConfiguration` for a `Matches` operand that is not a valid
    ///   regex
    pub fn validate(&self) -> Result<(), EtlError> {
        if self.field.trim().is_empty() {
            return Err(EtlError::invalid_config("Condition field cannot be empty"));
        }
        if self.operator == ConditionOperator::Matches {
            let pattern = self.value.coerce_string();
            Regex::new(&pattern)
                .map_err(|e| EtlError::invalid_config(format!("Invalid regex '{}' in condition: {}", pattern, e)))?;
        }
        Ok(())
    }

    /// Evaluates the condition against a record.
    pub fn evaluate(&self, record: &Record) -> bool {
        let actual = record.get(&self.field).cloned().unwrap_or(FieldValue::Null);

        match self.operator {
            ConditionOperator::Equals => actual.loose_eq(&self.value),
            ConditionOperator::NotEquals => !actual.loose_eq(&self.value),
            ConditionOperator::GreaterThan => {
                matches!(actual.compare(&self.value), Some(std::cmp::Ordering::Greater))
            }
            ConditionOperator::GreaterOrEqual => matches!(
                actual.compare(&self.value),
                Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
            ),
            ConditionOperator::LessThan => {
                matches!(actual.compare(&self.value), Some(std::cmp::Ordering::Less))
            }
            ConditionOperator::LessOrEqual => matches!(
                actual.compare(&self.value),
                Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
            ),
            ConditionOperator::Contains => {
                !actual.is_null() && actual.coerce_string().contains(&self.value.coerce_string())
            }
            ConditionOperator::StartsWith => {
                !actual.is_null() && actual.coerce_string().starts_with(&self.value.coerce_string())
            }
            ConditionOperator::EndsWith => {
                !actual.is_null() && actual.coerce_string().ends_with(&self.value.coerce_string())
            }
            ConditionOperator::Matches => {
                if actual.is_null() {
                    return false;
                }
                match Regex::new(&self.value.coerce_string()) {
                    Ok(regex) => regex.is_match(&actual.coerce_string()),
                    Err(_) => false,
                }
            }
            ConditionOperator::IsNullOrEmpty => actual.is_null_or_empty(),
            ConditionOperator::IsNotNullOrEmpty => !actual.is_null_or_empty(),
            ConditionOperator::In => Self::membership(&actual, &self.value),
            ConditionOperator::NotIn => !Self::membership(&actual, &self.value),
        }
    }

    // Membership accepts a list operand or a comma-separated string. A null
    // actual is a member only when the operand contains an explicit null.
    fn membership(actual: &FieldValue, operand: &FieldValue) -> bool {
        match operand {
            FieldValue::List(items) => items.iter().any(|item| actual.loose_eq(item)),
            FieldValue::String(s) => {
                if actual.is_null() {
                    return false;
                }
                let actual_str = actual.coerce_string();
                s.split(',').any(|item| item.trim() == actual_str)
            }
            other => actual.loose_eq(other),
        }
    }
}
