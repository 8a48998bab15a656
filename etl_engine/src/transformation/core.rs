// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transformation Core
//!
//! Shared identity and construction embedded by every concrete
//! transformation: id, name, description, variant tag and the
//! parallel-execution flag. Composition replaces the abstract-base-class
//! hierarchy of classic transformation frameworks — concrete transforms
//! embed a [`TransformationCore`] and delegate their accessor methods to it.

use etl_engine_domain::services::TransformationType;
use etl_engine_domain::value_objects::TransformationId;

/// Identity and flags shared by all concrete transformations.
#[derive(Debug, Clone)]
pub struct TransformationCore {
    id: TransformationId,
    name: String,
    description: String,
    transformation_type: TransformationType,
    supports_parallel: bool,
}

impl TransformationCore {
    /// Creates a core with a fresh identity.
    pub fn new(name: impl Into<String>, transformation_type: TransformationType) -> Self {
        Self {
            id: TransformationId::new(),
            name: name.into(),
            description: String::new(),
            transformation_type,
            supports_parallel: true,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Marks the transformation unsafe for partitioned execution.
    pub fn sequential_only(mut self) -> Self {
        self.supports_parallel = false;
        self
    }

    pub fn id(&self) -> TransformationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn transformation_type(&self) -> TransformationType {
        self.transformation_type
    }

    pub fn supports_parallel(&self) -> bool {
        self.supports_parallel
    }
}

/// Delegates the identity methods of [`Transformation`] to an embedded
/// `core` field.
///
/// [`Transformation`]: etl_engine_domain::services::Transformation
macro_rules! delegate_transformation_core_identity {
    () => {
        fn id(&self) -> etl_engine_domain::value_objects::TransformationId {
            self.core.id()
        }

        fn name(&self) -> &str {
            self.core.name()
        }

        fn description(&self) -> &str {
            self.core.description()
        }

        fn transformation_type(&self) -> etl_engine_domain::services::TransformationType {
            self.core.transformation_type()
        }
    };
}

macro_rules! delegate_transformation_core {
    () => {
        crate::transformation::core::delegate_transformation_core_identity!();

        fn supports_parallel_execution(&self) -> bool {
            self.core.supports_parallel()
        }
    };
}

pub(crate) use delegate_transformation_core;
pub(crate) use delegate_transformation_core_identity;
