// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # ETL Engine Domain
//!
//! The domain layer of the ETL execution engine: the core business objects
//! and rules, independent of connectors, schedulers and user interfaces.
//!
//! ## Module Structure
//!
//! ### Entities
//! Objects with identity that change state while remaining the same thing:
//!
//! - [`entities::Pipeline`]: an ordered composition of stages
//! - [`entities::ExecutionContext`]: per-run state carried through stages
//! - [`entities::ScheduledJob`]: a pipeline registered for periodic runs
//! - [`entities::TransformationStats`]: per-transformation performance
//!   aggregates
//!
//! ### Value Objects
//! Immutable, identityless, self-validating values:
//!
//! - [`value_objects::Record`] / [`value_objects::FieldValue`]: the data
//!   model, an ordered field map over a tagged value union
//! - [`value_objects::CronExpression`]: 5/6-field cron schedules
//! - typed ids ([`value_objects::PipelineId`], [`value_objects::ExecutionId`], ...)
//! - configuration structs rejecting unknown keys
//!
//! ### Contracts
//! Collaborator interfaces consumed by the runtime crate:
//!
//! - [`services::Transformation`]: value-level functions over records
//! - [`services::SourceConnector`] / [`services::DestinationConnector`]
//! - [`services::MessageBus`], [`services::ExecutionHistorySink`],
//!   [`services::Clock`]
//! - [`entities::Stage`]: the prepare/execute/cleanup stage lifecycle
//!
//! ### Results and Errors
//!
//! Failures flow as values ([`results::TransformationResult`],
//! [`results::StageExecutionResult`], [`results::PipelineExecutionResult`]);
//! only cancellation crosses component boundaries as `Err`. See
//! [`error::EtlError`] for the taxonomy.

pub mod cancellation;
pub mod entities;
pub mod error;
pub mod events;
pub mod results;
pub mod services;
pub mod value_objects;

// Re-export commonly used types for convenient access
pub use cancellation::CancellationToken;
pub use entities::{ExecutionContext, Pipeline, PipelineStatus, Stage, StageInfo, StageStatus, StageType};
pub use error::{ErrorSeverity, EtlError, ExecutionError, ExecutionWarning};
pub use results::{FailureKind, PipelineExecutionResult, StageExecutionResult, TransformationResult};
pub use value_objects::{FieldValue, Record};
