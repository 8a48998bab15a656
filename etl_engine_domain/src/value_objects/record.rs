// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Record
//!
//! The unit of data flowing through a pipeline: an ordered mapping from
//! case-sensitive field names to dynamically-typed [`FieldValue`]s.
//!
//! ## Mutation discipline
//!
//! Records crossing stage and worker boundaries are treated as effectively
//! immutable: a transformation never mutates its input, it clones, modifies
//! the clone and returns it. [`Record::deep_clone`] guarantees the clone
//! shares no mutable value state with the original, which is what makes
//! parallel stages safe without per-record locking.
//!
//! ## Laws
//!
//! - `r.deep_clone() == r`, and mutating the clone never changes `r`
//! - `r.set(f, v); r.get(f) == Some(&v)` for any supported value `v`
//!
//! Field insertion order is preserved; `set` on an existing field keeps the
//! field's original position.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::field_value::FieldValue;

/// An ordered, field-indexed data record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: IndexMap<String, FieldValue>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
        }
    }

    /// Creates a record from field/value pairs, preserving their order.
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Gets a field value by name (case-sensitive).
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Gets a field as a string, if present and of string kind.
    pub fn get_string(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(FieldValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Gets a field as an integer, if present and of integer kind.
    pub fn get_integer(&self, field: &str) -> Option<i64> {
        match self.fields.get(field) {
            Some(FieldValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Gets a field as a real, promoting integers.
    pub fn get_real(&self, field: &str) -> Option<f64> {
        match self.fields.get(field) {
            Some(FieldValue::Real(r)) => Some(*r),
            Some(FieldValue::Integer(i)) => Some(*i as f64),
            _ => None,
        }
    }

    /// Gets a field as a boolean, if present and of boolean kind.
    pub fn get_boolean(&self, field: &str) -> Option<bool> {
        match self.fields.get(field) {
            Some(FieldValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// Gets a field as a timestamp, if present and of timestamp kind.
    pub fn get_timestamp(&self, field: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        match self.fields.get(field) {
            Some(FieldValue::Timestamp(ts)) => Some(*ts),
            _ => None,
        }
    }

    /// Sets a field value. An existing field keeps its position; a new
    /// field is appended.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Removes a field, returning its value if it was present.
    ///
    /// Removal preserves the relative order of the remaining fields.
    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.shift_remove(field)
    }

    /// Checks whether a field exists.
    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Gets the field names in insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    /// Iterates fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Gets the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Checks whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Produces a deep clone with no shared mutable value state.
    ///
    /// `FieldValue` owns its payload (nested lists included), so the derived
    /// `Clone` already copies every value; this method exists to make the
    /// cloning contract explicit at call sites that rely on it.
    pub fn deep_clone(&self) -> Record {
        self.clone()
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn set_then_get() {
        let mut record = Record::new();
        record.set("name", "alice");
        record.set("age", 30);
        assert_eq!(record.get_string("name"), Some("alice"));
        assert_eq!(record.get_integer("age"), Some(30));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn field_names_are_case_sensitive() {
        let mut record = Record::new();
        record.set("Name", "a");
        record.set("name", "b");
        assert_eq!(record.len(), 2);
        assert_eq!(record.get_string("Name"), Some("a"));
        assert_eq!(record.get_string("name"), Some("b"));
    }

    #[test]
    fn insertion_order_is_preserved() {
        let record = Record::from_fields([("z", 1), ("a", 2), ("m", 3)]);
        let names: Vec<_> = record.field_names().collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn set_existing_field_keeps_position() {
        let mut record = Record::from_fields([("a", 1), ("b", 2)]);
        record.set("a", 99);
        let names: Vec<_> = record.field_names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(record.get_integer("a"), Some(99));
    }

    #[test]
    fn clone_is_independent() {
        let mut original = Record::from_fields([("items", FieldValue::List(vec![FieldValue::Integer(1)]))]);
        let mut copy = original.deep_clone();
        assert_eq!(copy, original);

        copy.set("items", FieldValue::List(vec![FieldValue::Integer(2)]));
        copy.set("extra", true);
        assert_eq!(
            original.get("items"),
            Some(&FieldValue::List(vec![FieldValue::Integer(1)]))
        );
        assert!(!original.contains_field("extra"));

        original.remove("items");
        assert!(copy.contains_field("items"));
    }

    fn arb_value() -> impl Strategy<Value = FieldValue> {
        prop_oneof![
            any::<i64>().prop_map(FieldValue::Integer),
            any::<bool>().prop_map(FieldValue::Boolean),
            "[a-z]{0,12}".prop_map(FieldValue::String),
            prop::num::f64::NORMAL.prop_map(FieldValue::Real),
            Just(FieldValue::Null),
        ]
    }

    proptest! {
        #[test]
        fn prop_set_then_get(name in "[A-Za-z_][A-Za-z0-9_]{0,16}", value in arb_value()) {
            let mut record = Record::new();
            record.set(name.clone(), value.clone());
            prop_assert_eq!(record.get(&name), Some(&value));
        }

        #[test]
        fn prop_clone_law(fields in prop::collection::vec(("[a-z]{1,8}", arb_value()), 0..8)) {
            let record = Record::from_fields(fields);
            let copy = record.deep_clone();
            prop_assert_eq!(&copy, &record);

            let mut mutated = copy.clone();
            mutated.set("__probe", 1);
            prop_assert_eq!(&copy, &record);
        }
    }
}
