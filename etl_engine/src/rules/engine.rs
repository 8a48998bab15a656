// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Rule Engine
//!
//! Evaluates a set of prioritized rules against records. For each record the
//! engine walks enabled rules in descending priority (stable within a
//! priority), applies the actions of every matching rule in listed order,
//! and advances its current record as each action succeeds.
//!
//! - `StopProcessing` aborts the remaining actions of its rule and all
//!   further rules for that record.
//! - A skip verdict survives the remaining evaluation and marks the result
//!   skipped; the record does not flow past a rule stage.
//! - Action failures become errors coded with the rule id; they do not
//!   abort the record.
//! - Applied rule ids are recorded, in order, into the context property bag
//!   under `AppliedRules`.
//!
//! Applying an engine whose rules match nothing returns a result whose
//! output is structurally equal to the input (idempotence law).

use std::time::Instant;

use etl_engine_domain::entities::{ExecutionContext, APPLIED_RULES_PROPERTY};
use etl_engine_domain::error::{EtlError, ExecutionError};
use etl_engine_domain::results::TransformationResult;
use etl_engine_domain::services::{Transformation, TransformationType};
use etl_engine_domain::value_objects::{Record, TransformationId};

use super::action::ActionOutcome;
use super::rule::Rule;

/// Priority-ordered rule evaluator.
pub struct RuleEngine {
    id: TransformationId,
    name: String,
    rules: Vec<Rule>,
}

impl RuleEngine {
    /// Creates an empty engine.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TransformationId::new(),
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Adds a rule.
    ///
    /// # Errors
    ///
    /// Returns the rule's own validation error; invalid rules are rejected
    /// at registration rather than discovered mid-run.
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), EtlError> {
        rule.validate()?;
        self.rules.push(rule);
        Ok(())
    }

    /// Builder form of [`RuleEngine::add_rule`].
    pub fn with_rule(mut self, rule: Rule) -> Result<Self, EtlError> {
        self.add_rule(rule)?;
        Ok(self)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Enabled rules in evaluation order: descending priority, stable
    /// within ties.
    fn evaluation_order(&self) -> Vec<&Rule> {
        let mut ordered: Vec<&Rule> = self.rules.iter().filter(|rule| rule.is_enabled()).collect();
        ordered.sort_by(|a, b| b.priority().cmp(&a.priority()));
        ordered
    }

    /// Applies the engine to one record.
    pub fn apply(&self, record: &Record, context: &ExecutionContext) -> TransformationResult {
        let started = Instant::now();
        let mut current = record.deep_clone();
        let mut errors: Vec<ExecutionError> = Vec::new();
        let mut applied: Vec<String> = Vec::new();
        let mut skip_reason: Option<String> = None;
        let mut stopped = false;

        for rule in self.evaluation_order() {
            if !rule.matches(&current) {
                continue;
            }

            tracing::debug!(rule = rule.name(), priority = rule.priority(), "rule matched");
            context.append_property_list(APPLIED_RULES_PROPERTY, serde_json::Value::String(rule.id().to_string()));
            applied.push(rule.name().to_string());

            for action in rule.actions() {
                match action.apply(&current, context) {
                    Ok(ActionOutcome::Continue(next)) => current = next,
                    Ok(ActionOutcome::Skip { record: next, reason }) => {
                        current = next;
                        skip_reason = Some(reason);
                    }
                    Ok(ActionOutcome::Stop(next)) => {
                        current = next;
                        stopped = true;
                        break;
                    }
                    Err(error) => {
                        // the rule id is the error code; evaluation continues
                        // with the pre-action record
                        errors.push(ExecutionError::new(
                            format!("action '{}' failed: {}", action.name(), error),
                            rule.id().to_string(),
                            self.name.clone(),
                        ));
                    }
                }
            }

            if stopped {
                break;
            }
        }

        let skipped = skip_reason.is_some();
        TransformationResult {
            success: errors.is_empty(),
            output: Some(current),
            skipped,
            skip_reason,
            errors,
            applied,
            duration: started.elapsed(),
        }
    }

    /// Validates every registered rule.
    pub fn validate(&self) -> Result<(), EtlError> {
        for rule in &self.rules {
            rule.validate()?;
        }
        Ok(())
    }
}

impl Transformation for RuleEngine {
    fn id(&self) -> TransformationId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "priority-ordered rule evaluation"
    }

    fn transformation_type(&self) -> TransformationType {
        TransformationType::Record
    }

    // custom actions may carry stateful closures
    fn supports_parallel_execution(&self) -> bool {
        false
    }

    fn validate(&self, _context: &ExecutionContext) -> Result<(), EtlError> {
        RuleEngine::validate(self)
    }

    fn transform(&self, record: &Record, context: &ExecutionContext) -> TransformationResult {
        self.apply(record, context)
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("name", &self.name)
            .field("rules", &self.rules.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::action::{ActionOutcome, LogLevel, RuleAction};
    use crate::rules::condition::{ConditionOperator, RuleCondition};
    use etl_engine_domain::value_objects::{FieldValue, PipelineConfiguration, PipelineId};

    fn context() -> ExecutionContext {
        ExecutionContext::new(PipelineId::new(), "rules", PipelineConfiguration::default())
    }

    fn engine(rules: Vec<Rule>) -> RuleEngine {
        let mut engine = RuleEngine::new("test-engine");
        for rule in rules {
            engine.add_rule(rule).unwrap();
        }
        engine
    }

    #[test]
    fn no_matching_rules_is_identity() {
        let engine = engine(vec![Rule::new("never")
            .when(RuleCondition::equals("kind", "other"))
            .then(RuleAction::set_field("x", 1))]);
        let record = Record::from_fields([("kind", "this"), ("payload", "data")]);

        let result = engine.apply(&record, &context());
        assert!(result.success);
        assert!(!result.skipped);
        assert_eq!(result.output, Some(record));
        assert!(result.applied.is_empty());
    }

    #[test]
    fn higher_priority_applies_first_and_provenance_is_ordered() {
        let ctx = context();
        let engine = engine(vec![
            Rule::new("low")
                .with_priority(1)
                .then(RuleAction::set_field("winner", "low")),
            Rule::new("high")
                .with_priority(10)
                .then(RuleAction::set_field("winner", "high")),
        ]);

        let result = engine.apply(&Record::new(), &ctx);
        // the low-priority rule runs last, so its write wins
        assert_eq!(result.output.unwrap().get_string("winner"), Some("low"));
        assert_eq!(result.applied, vec!["high".to_string(), "low".to_string()]);

        let provenance = ctx.get_property(APPLIED_RULES_PROPERTY).unwrap();
        assert_eq!(provenance.as_array().unwrap().len(), 2);
    }

    #[test]
    fn stop_processing_aborts_remaining_rules_and_actions() {
        let engine = engine(vec![
            Rule::new("stopper")
                .with_priority(10)
                .then(RuleAction::set_field("before", true))
                .then(RuleAction::StopProcessing)
                .then(RuleAction::set_field("after", true)),
            Rule::new("unreached").with_priority(1).then(RuleAction::set_field("later", true)),
        ]);

        let result = engine.apply(&Record::new(), &context());
        let output = result.output.unwrap();
        assert_eq!(output.get_boolean("before"), Some(true));
        assert!(!output.contains_field("after"));
        assert!(!output.contains_field("later"));
        assert_eq!(result.applied, vec!["stopper".to_string()]);
    }

    #[test]
    fn skip_verdict_survives_and_preserves_mutations() {
        let engine = engine(vec![Rule::new("archive-inactive")
            .with_priority(10)
            .when(RuleCondition::equals("status", "inactive"))
            .then(RuleAction::set_field("archived", true))
            .then(RuleAction::skip_record("inactive record"))]);

        let result = engine.apply(&Record::from_fields([("status", "inactive")]), &context());
        assert!(result.success);
        assert!(result.skipped);
        assert_eq!(result.skip_reason.as_deref(), Some("inactive record"));
        assert_eq!(result.output.unwrap().get_boolean("archived"), Some(true));
    }

    #[test]
    fn action_failure_is_recorded_with_rule_id_code() {
        let failing = Rule::new("explode")
            .then(RuleAction::custom("boom", |_record, _ctx| {
                Err(EtlError::internal("deliberate"))
            }))
            .then(RuleAction::set_field("recovered", true));
        let rule_id = failing.id().to_string();
        let engine = engine(vec![failing]);

        let result = engine.apply(&Record::new(), &context());
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, rule_id);
        // the engine does not abort the record: the next action still ran
        assert_eq!(result.output.unwrap().get_boolean("recovered"), Some(true));
    }

    #[test]
    fn disabled_rules_never_run() {
        let engine = engine(vec![Rule::new("off")
            .with_enabled(false)
            .then(RuleAction::log_message("should not appear: {id}", LogLevel::Info))]);
        let result = engine.apply(&Record::new(), &context());
        assert!(result.applied.is_empty());
    }

    #[test]
    fn custom_action_outcome_flows_through() {
        let engine = engine(vec![Rule::new("tag")
            .then(RuleAction::custom("tagger", |mut record, _ctx| {
                record.set("tagged", FieldValue::Boolean(true));
                Ok(ActionOutcome::Continue(record))
            }))]);
        let result = engine.apply(&Record::new(), &context());
        assert_eq!(result.output.unwrap().get_boolean("tagged"), Some(true));
    }
}
