// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain error system for the ETL engine.
//!
//! See [`EtlError`] for the failure taxonomy and [`ExecutionError`] for the
//! value records that populate result error lists.

pub mod etl_error;

pub use etl_error::{ErrorSeverity, EtlError, ExecutionError, ExecutionWarning};
