// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Rule
//!
//! A prioritized condition/action pair. Conditions are AND-combined; a rule
//! with no conditions matches every record. Validity requires at least one
//! action.

use etl_engine_domain::error::EtlError;
use etl_engine_domain::value_objects::{Record, RuleId};

use super::action::RuleAction;
use super::condition::RuleCondition;

/// A declarative rule evaluated by the rule engine.
#[derive(Debug, Clone)]
pub struct Rule {
    id: RuleId,
    name: String,
    description: String,
    /// Higher priorities evaluate first; ties keep insertion order.
    priority: i32,
    enabled: bool,
    conditions: Vec<RuleCondition>,
    actions: Vec<RuleAction>,
}

impl Rule {
    /// Creates an empty enabled rule with priority 0.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: RuleId::new(),
            name: name.into(),
            description: String::new(),
            priority: 0,
            enabled: true,
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Enables or disables the rule.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Adds a condition (AND-combined with the others).
    pub fn when(mut self, condition: RuleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Adds an action (applied in listed order).
    pub fn then(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn id(&self) -> RuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn conditions(&self) -> &[RuleCondition] {
        &self.conditions
    }

    pub fn actions(&self) -> &[RuleAction] {
        &self.actions
    }

    /// Validates the rule: at least one action, and every condition valid.
    pub fn validate(&self) -> Result<(), EtlError> {
        if self.name.trim().is_empty() {
            return Err(EtlError::invalid_config("Rule name cannot be empty"));
        }
        if self.actions.is_empty() {
            return Err(EtlError::invalid_config(format!(
                "Rule '{}' must have at least one action",
                self.name
            )));
        }
        for condition in &self.conditions {
            condition.validate()?;
        }
        Ok(())
    }

    /// Checks whether every condition holds for the record.
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|condition| condition.evaluate(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::condition::ConditionOperator;
    use etl_engine_domain::value_objects::FieldValue;

    #[test]
    fn rule_without_actions_is_invalid() {
        let rule = Rule::new("empty").when(RuleCondition::equals("a", 1));
        assert!(rule.validate().is_err());

        let rule = Rule::new("ok").then(RuleAction::set_field("a", 1));
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn conditions_are_and_combined() {
        let rule = Rule::new("both")
            .when(RuleCondition::equals("a", 1))
            .when(RuleCondition::new("b", ConditionOperator::GreaterThan, 10))
            .then(RuleAction::set_field("matched", true));

        let matching = Record::from_fields([("a", 1), ("b", 11)]);
        let partial = Record::from_fields([("a", 1), ("b", 5)]);
        assert!(rule.matches(&matching));
        assert!(!rule.matches(&partial));
    }

    #[test]
    fn no_conditions_matches_everything() {
        let rule = Rule::new("always").then(RuleAction::set_field("tag", FieldValue::Boolean(true)));
        assert!(rule.matches(&Record::new()));
    }
}
