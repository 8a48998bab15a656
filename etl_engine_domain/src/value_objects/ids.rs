// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Typed Identifiers
//!
//! ULID-backed, type-safe identifiers for the core domain concepts. Each
//! identifier is a distinct newtype so a `PipelineId` can never be passed
//! where an `ExecutionId` is expected.
//!
//! ULIDs are used instead of UUIDs for their lexicographic sortability: an
//! id's ordering follows its creation time, which keeps execution history
//! and registries naturally ordered.
//!
//! All identifiers share the same surface:
//!
//! - `new()` — a fresh id with the current timestamp component
//! - `from_string(&str)` — parse the 26-character Crockford Base32 form
//! - `as_ulid()` / `timestamp_ms()` — access the underlying value
//! - `Display`, `FromStr`, serde round-trips, `Hash`/`Eq`/`Ord`

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::EtlError;

macro_rules! ulid_id {
    ($(#[$doc:meta])* $name:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Creates a new identifier with the current timestamp component.
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Parses an identifier from its ULID string representation
            /// (26 characters, Crockford Base32).
            pub fn from_string(s: &str) -> Result<Self, EtlError> {
                Ulid::from_string(s).map(Self).map_err(|e| {
                    EtlError::invalid_config(format!(concat!("Invalid ", $label, " id '{}': {}"), s, e))
                })
            }

            /// Gets the underlying ULID value.
            pub fn as_ulid(&self) -> Ulid {
                self.0
            }

            /// Gets the timestamp component in milliseconds since the Unix
            /// epoch.
            pub fn timestamp_ms(&self) -> u64 {
                self.0.timestamp_ms()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = EtlError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_string(s)
            }
        }
    };
}

ulid_id!(
    /// Unique identifier for a pipeline definition.
    PipelineId,
    "pipeline"
);
ulid_id!(
    /// Unique identifier for a pipeline stage.
    StageId,
    "stage"
);
ulid_id!(
    /// Unique identifier for a single pipeline run.
    ExecutionId,
    "execution"
);
ulid_id!(
    /// Unique identifier for a transformation.
    TransformationId,
    "transformation"
);
ulid_id!(
    /// Unique identifier for a rule in the rule engine.
    RuleId,
    "rule"
);
ulid_id!(
    /// Unique identifier for a scheduled job.
    JobId,
    "job"
);
