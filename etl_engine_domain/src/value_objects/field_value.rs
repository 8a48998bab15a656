// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Field Value
//!
//! Dynamically-typed record values as a tagged union with explicit promotion
//! rules. Records carry one [`FieldValue`] per field; transformations and
//! rule conditions operate on these values without knowing the source
//! system's type model.
//!
//! ## Supported kinds
//!
//! `String`, `Integer` (i64), `Real` (f64), `Boolean`, `Timestamp`
//! (UTC), `Duration`, `Null`, and nested `List`.
//!
//! ## Promotion and comparison
//!
//! Comparisons attempt, in order:
//!
//! 1. **Decimal promotion** — integers, reals, booleans (0/1) and numeric
//!    strings compare numerically;
//! 2. **Timestamp promotion** — timestamps and RFC3339 strings compare
//!    chronologically;
//! 3. **Ordinal string comparison** — when both values are strings.
//!
//! Values of incompatible kinds are unordered, and loose equality between
//! them is `false`. Numeric operations on non-numeric values yield `None`;
//! the caller's policy decides whether that skips the record or raises an
//! error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::datetime_serde;

/// Discriminant for [`FieldValue`] kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    String,
    Integer,
    Real,
    Boolean,
    Timestamp,
    Duration,
    Null,
    List,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::String => write!(f, "string"),
            ValueKind::Integer => write!(f, "integer"),
            ValueKind::Real => write!(f, "real"),
            ValueKind::Boolean => write!(f, "boolean"),
            ValueKind::Timestamp => write!(f, "timestamp"),
            ValueKind::Duration => write!(f, "duration"),
            ValueKind::Null => write!(f, "null"),
            ValueKind::List => write!(f, "list"),
        }
    }
}

/// A single dynamically-typed record value.
///
/// Structural equality (`PartialEq`) compares kind and payload exactly and
/// backs the record clone law; [`FieldValue::loose_eq`] applies the
/// promotion rules used by rule conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Timestamp(#[serde(with = "datetime_serde")] DateTime<Utc>),
    Duration(std::time::Duration),
    Null,
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Gets the kind tag for this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            FieldValue::String(_) => ValueKind::String,
            FieldValue::Integer(_) => ValueKind::Integer,
            FieldValue::Real(_) => ValueKind::Real,
            FieldValue::Boolean(_) => ValueKind::Boolean,
            FieldValue::Timestamp(_) => ValueKind::Timestamp,
            FieldValue::Duration(_) => ValueKind::Duration,
            FieldValue::Null => ValueKind::Null,
            FieldValue::List(_) => ValueKind::List,
        }
    }

    /// Checks whether the value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Checks whether the value is `Null`, an empty string, or an empty
    /// list. This is the emptiness notion used by the rule engine's
    /// `IsNullOrEmpty` operator.
    pub fn is_null_or_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::String(s) => s.is_empty(),
            FieldValue::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Attempts decimal promotion.
    ///
    /// Integers, reals, booleans (`false` = 0, `true` = 1) and strings that
    /// parse as numbers promote; everything else yields `None`.
    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Real(r) => Some(*r),
            FieldValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            FieldValue::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Attempts timestamp promotion.
    ///
    /// Timestamps promote directly; strings promote when they parse as
    /// RFC3339. Other kinds yield `None`.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            FieldValue::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .ok(),
            _ => None,
        }
    }

    /// Attempts boolean coercion (booleans, 0/1 integers, "true"/"false"
    /// strings).
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            FieldValue::Integer(0) => Some(false),
            FieldValue::Integer(1) => Some(true),
            FieldValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Display form used by log-message templating and string coercion.
    ///
    /// `Null` renders as the empty string; lists render comma-separated.
    pub fn coerce_string(&self) -> String {
        match self {
            FieldValue::String(s) => s.clone(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Real(r) => r.to_string(),
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::Timestamp(ts) => ts.to_rfc3339(),
            FieldValue::Duration(d) => format!("{}ms", d.as_millis()),
            FieldValue::Null => String::new(),
            FieldValue::List(items) => items
                .iter()
                .map(|v| v.coerce_string())
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Loose equality with promotion.
    ///
    /// Nulls equal only nulls. Values that both promote to decimal compare
    /// numerically, then timestamps chronologically, then strings by
    /// ordinal comparison; lists compare element-wise. Incompatible kinds
    /// are unequal.
    pub fn loose_eq(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Null, _) | (_, FieldValue::Null) => false,
            (FieldValue::List(a), FieldValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.loose_eq(y))
            }
            (FieldValue::Duration(a), FieldValue::Duration(b)) => a == b,
            _ => {
                if let (Some(a), Some(b)) = (self.as_decimal(), other.as_decimal()) {
                    return a == b;
                }
                if let (Some(a), Some(b)) = (self.as_timestamp(), other.as_timestamp()) {
                    return a == b;
                }
                if let (FieldValue::String(a), FieldValue::String(b)) = (self, other) {
                    return a == b;
                }
                false
            }
        }
    }

    /// Ordering with promotion.
    ///
    /// Applies the same promotion chain as [`FieldValue::loose_eq`];
    /// incompatible kinds are unordered (`None`).
    pub fn compare(&self, other: &FieldValue) -> Option<std::cmp::Ordering> {
        if let (Some(a), Some(b)) = (self.as_decimal(), other.as_decimal()) {
            return a.partial_cmp(&b);
        }
        if let (Some(a), Some(b)) = (self.as_timestamp(), other.as_timestamp()) {
            return Some(a.cmp(&b));
        }
        if let (FieldValue::Duration(a), FieldValue::Duration(b)) = (self, other) {
            return Some(a.cmp(b));
        }
        if let (FieldValue::String(a), FieldValue::String(b)) = (self, other) {
            return Some(a.cmp(b));
        }
        None
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.coerce_string())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Integer(i as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(r: f64) -> Self {
        FieldValue::Real(r)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(ts: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(ts)
    }
}

impl From<std::time::Duration> for FieldValue {
    fn from(d: std::time::Duration) -> Self {
        FieldValue::Duration(d)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => FieldValue::Null,
        }
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(items: Vec<FieldValue>) -> Self {
        FieldValue::List(items)
    }
}
