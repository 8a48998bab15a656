// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # ETL Engine
//!
//! The execution runtime of the ETL engine: it moves records from source
//! connectors through transformation stages into destination connectors,
//! with rule-based routing, performance monitoring, adaptive optimization,
//! scheduling and failure management.
//!
//! ## Subsystems
//!
//! - [`transformation`]: field/record/conditional/aggregate primitives, the
//!   chain processor, and the multi-stage transformation pipeline with
//!   sequential, parallel and batch strategies
//! - [`rules`]: the declarative condition/action rule engine with priority
//!   ordering
//! - [`pipeline`]: the stage executor implementing the run algorithm, plus
//!   concrete extract/transform/rules/load/custom stages
//! - [`orchestrator`]: execution registry, event fan-out, stop semantics
//!   and the cron scheduler loop
//! - [`performance`]: per-transformation session monitoring and the
//!   optimization advisor
//! - [`config`]: typed TOML configuration
//! - [`observability`]: tracing bootstrap and operation tracking
//!
//! ## Quick example
//!
//! ```no_run
//! use std::sync::Arc;
//! use etl_engine::orchestrator::PipelineOrchestrator;
//! use etl_engine_domain::entities::{ExecutionContext, Pipeline};
//! use etl_engine_domain::value_objects::PipelineConfiguration;
//!
//! # async fn run() -> Result<(), etl_engine_domain::error::EtlError> {
//! let pipeline = Arc::new(Pipeline::new("nightly-sync", PipelineConfiguration::default())?);
//! let orchestrator = PipelineOrchestrator::new().build();
//! let context = ExecutionContext::new(pipeline.id(), pipeline.name(), pipeline.configuration().clone());
//! let result = orchestrator.execute(pipeline, context).await?;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod observability;
pub mod orchestrator;
pub mod performance;
pub mod pipeline;
pub mod rules;
pub mod transformation;

pub use config::EtlConfig;
pub use orchestrator::PipelineOrchestrator;
pub use performance::{PerformanceMonitor, PerformanceOptimizer};
pub use pipeline::PipelineExecutor;
pub use rules::RuleEngine;

// Re-export the domain crate so downstream users need a single dependency.
pub use etl_engine_domain as domain;
