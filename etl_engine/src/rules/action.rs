// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Rule Actions
//!
//! The closed set of actions a rule can apply to a matched record. Every
//! action operates on a clone of the current record; the engine advances
//! its "current record" only when an action succeeds. Open extension goes
//! through the single [`RuleAction::Custom`] variant holding a callable.

use std::sync::Arc;

use etl_engine_domain::entities::ExecutionContext;
use etl_engine_domain::error::EtlError;
use etl_engine_domain::services::Transformation;
use etl_engine_domain::value_objects::{FieldValue, Record};
use once_cell::sync::Lazy;
use regex::Regex;

static TEMPLATE_FIELD_REGEX: Lazy<Regex> = Lazy::new(|| {
    // {fieldName} placeholders; double braces are not special-cased, the
    // template language is deliberately minimal
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("template placeholder regex is valid")
});

/// Log level for [`RuleAction::LogMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Result of applying one action.
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    /// The action produced a (possibly unchanged) record; evaluation
    /// continues.
    Continue(Record),
    /// The record is to be skipped; remaining actions still run but the
    /// verdict stands.
    Skip { record: Record, reason: String },
    /// Abort this rule's remaining actions and all further rules.
    Stop(Record),
}

/// Signature of a custom action callable.
pub type CustomActionFn = dyn Fn(Record, &ExecutionContext) -> Result<ActionOutcome, EtlError> + Send + Sync;

/// One action within a rule.
#[derive(Clone)]
pub enum RuleAction {
    /// Sets a field to a fixed value.
    SetField { field: String, value: FieldValue },
    /// Removes a field if present.
    RemoveField { field: String },
    /// Copies one field's value to another name (missing source copies
    /// null).
    CopyField { source: String, target: String },
    /// Applies a transformation to the record.
    TransformField { transformation: Arc<dyn Transformation> },
    /// Marks the record skipped with a reason.
    SkipRecord { reason: String },
    /// Aborts further actions and rule evaluation for this record.
    StopProcessing,
    /// Emits a log message; `{field}` placeholders substitute values from
    /// the current record.
    LogMessage { template: String, level: LogLevel },
    /// User-provided behavior.
    Custom { name: String, action: Arc<CustomActionFn> },
}

impl RuleAction {
    /// Sets a field to a value.
    pub fn set_field(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        RuleAction::SetField {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Removes a field.
    pub fn remove_field(field: impl Into<String>) -> Self {
        RuleAction::RemoveField { field: field.into() }
    }

    /// Copies `source` to `target`.
    pub fn copy_field(source: impl Into<String>, target: impl Into<String>) -> Self {
        RuleAction::CopyField {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Skips the record.
    pub fn skip_record(reason: impl Into<String>) -> Self {
        RuleAction::SkipRecord { reason: reason.into() }
    }

    /// Logs a templated message at the given level.
    pub fn log_message(template: impl Into<String>, level: LogLevel) -> Self {
        RuleAction::LogMessage {
            template: template.into(),
            level,
        }
    }

    /// Wraps a custom callable.
    pub fn custom(
        name: impl Into<String>,
        action: impl Fn(Record, &ExecutionContext) -> Result<ActionOutcome, EtlError> + Send + Sync + 'static,
    ) -> Self {
        RuleAction::Custom {
            name: name.into(),
            action: Arc::new(action),
        }
    }

    /// Short name used in logs and error attribution.
    pub fn name(&self) -> String {
        match self {
            RuleAction::SetField { field, .. } => format!("set-field({})", field),
            RuleAction::RemoveField { field } => format!("remove-field({})", field),
            RuleAction::CopyField { source, target } => format!("copy-field({}->{})", source, target),
            RuleAction::TransformField { transformation } => format!("transform-field({})", transformation.name()),
            RuleAction::SkipRecord { .. } => "skip-record".to_string(),
            RuleAction::StopProcessing => "stop-processing".to_string(),
            RuleAction::LogMessage { .. } => "log-message".to_string(),
            RuleAction::Custom { name, .. } => format!("custom({})", name),
        }
    }

    /// Applies the action to a clone of `record`.
    ///
    /// # Errors
    ///
    /// Action failures surface as `Err`; the engine converts them into
    /// errors coded with the owning rule's id and continues with the
    /// record it had before the failed action.
    pub fn apply(&self, record: &Record, context: &ExecutionContext) -> Result<ActionOutcome, EtlError> {
        match self {
            RuleAction::SetField { field, value } => {
                let mut output = record.deep_clone();
                output.set(field.clone(), value.clone());
                Ok(ActionOutcome::Continue(output))
            }
            RuleAction::RemoveField { field } => {
                let mut output = record.deep_clone();
                output.remove(field);
                Ok(ActionOutcome::Continue(output))
            }
            RuleAction::CopyField { source, target } => {
                let mut output = record.deep_clone();
                let value = record.get(source).cloned().unwrap_or(FieldValue::Null);
                output.set(target.clone(), value);
                Ok(ActionOutcome::Continue(output))
            }
            RuleAction::TransformField { transformation } => {
                let result = transformation.transform(record, context);
                if result.is_skip() {
                    return Ok(ActionOutcome::Skip {
                        record: result.output.unwrap_or_else(|| record.deep_clone()),
                        reason: result.skip_reason.unwrap_or_else(|| "skipped by transformation".to_string()),
                    });
                }
                if !result.success {
                    let message = result
                        .errors
                        .first()
                        .map(|e| e.message.clone())
                        .unwrap_or_else(|| "transformation failed".to_string());
                    return Err(EtlError::RuleEvaluation(format!(
                        "transformation '{}' failed: {}",
                        transformation.name(),
                        message
                    )));
                }
                Ok(ActionOutcome::Continue(
                    result.output.unwrap_or_else(|| record.deep_clone()),
                ))
            }
            RuleAction::SkipRecord { reason } => Ok(ActionOutcome::Skip {
                record: record.deep_clone(),
                reason: reason.clone(),
            }),
            RuleAction::StopProcessing => Ok(ActionOutcome::Stop(record.deep_clone())),
            RuleAction::LogMessage { template, level } => {
                let message = render_template(template, record);
                match level {
                    LogLevel::Debug => tracing::debug!(target: "etl_engine::rules", "{}", message),
                    LogLevel::Info => tracing::info!(target: "etl_engine::rules", "{}", message),
                    LogLevel::Warn => tracing::warn!(target: "etl_engine::rules", "{}", message),
                    LogLevel::Error => tracing::error!(target: "etl_engine::rules", "{}", message),
                }
                Ok(ActionOutcome::Continue(record.deep_clone()))
            }
            RuleAction::Custom { action, .. } => action(record.deep_clone(), context),
        }
    }
}

impl std::fmt::Debug for RuleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RuleAction::{}", self.name())
    }
}

/// Substitutes `{field}` placeholders from the record; unknown fields render
/// as empty strings.
fn render_template(template: &str, record: &Record) -> String {
    TEMPLATE_FIELD_REGEX
        .replace_all(template, |caps: &regex::Captures<'_>| {
            record
                .get(&caps[1])
                .map(|value| value.coerce_string())
                .unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_engine_domain::value_objects::{PipelineConfiguration, PipelineId};

    fn context() -> ExecutionContext {
        ExecutionContext::new(PipelineId::new(), "rules-test", PipelineConfiguration::default())
    }

    fn record() -> Record {
        Record::from_fields([("id", FieldValue::Integer(7)), ("status", FieldValue::String("new".into()))])
    }

    #[test]
    fn set_field_operates_on_a_clone() {
        let input = record();
        let outcome = RuleAction::set_field("status", "archived").apply(&input, &context()).unwrap();
        match outcome {
            ActionOutcome::Continue(output) => {
                assert_eq!(output.get_string("status"), Some("archived"));
                // the input record is untouched
                assert_eq!(input.get_string("status"), Some("new"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn copy_field_of_missing_source_copies_null() {
        let outcome = RuleAction::copy_field("missing", "target").apply(&record(), &context()).unwrap();
        match outcome {
            ActionOutcome::Continue(output) => assert_eq!(output.get("target"), Some(&FieldValue::Null)),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn skip_preserves_record() {
        let outcome = RuleAction::skip_record("inactive").apply(&record(), &context()).unwrap();
        match outcome {
            ActionOutcome::Skip { record: output, reason } => {
                assert_eq!(reason, "inactive");
                assert_eq!(output.get_integer("id"), Some(7));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn template_substitutes_fields() {
        let rendered = render_template("record {id} is {status}, missing={nope}", &record());
        assert_eq!(rendered, "record 7 is new, missing=");
    }

    #[test]
    fn custom_action_can_stop() {
        let action = RuleAction::custom("halt", |record, _ctx| Ok(ActionOutcome::Stop(record)));
        match action.apply(&record(), &context()).unwrap() {
            ActionOutcome::Stop(_) => {}
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
