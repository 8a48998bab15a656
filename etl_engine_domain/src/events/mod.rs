// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain events: immutable facts about run lifecycles, consumed by
//! subscribers and, optionally, published on the message bus.

pub mod execution_events;

pub use execution_events::{
    DataProcessedEvent, DomainEvent, ExecutionEvent, PipelineCancelledEvent, PipelineCompletedEvent,
    PipelineFailedEvent, PipelineStartedEvent, StageCompletedEvent,
};
