// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Connector Contracts
//!
//! The two collaborator interfaces the core consumes: sources yield records,
//! destinations accept them. Concrete connectors (CSV, JSON, SQL, object
//! stores, ...) live outside the engine; the extract and load stages talk
//! only to these traits.
//!
//! Connector failures use the `ConnectFailed` / `AuthFailed` / `IoFailed` /
//! `FormatInvalid` error kinds.
//!
//! ## Read semantics
//!
//! `read` returns a finite, non-restartable stream delivering records in
//! source order. Implementations are expected to be lazy: records are
//! produced as the stream is polled, and the stream observes the caller's
//! polling cadence rather than buffering the whole source.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::entities::ExecutionContext;
use crate::error::EtlError;
use crate::value_objects::Record;

/// Result of probing a connector's connectivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub success: bool,
    pub message: String,
}

impl ConnectionTestResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Static description of a connector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectorMetadata {
    pub version: String,
    pub properties: HashMap<String, String>,
}

/// Outcome of a batched write.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WriteResult {
    pub successful: u64,
    pub failed: u64,
}

impl WriteResult {
    pub fn merge(&mut self, other: WriteResult) {
        self.successful += other.successful;
        self.failed += other.failed;
    }
}

/// A system records are extracted from.
///
/// Implementations use interior mutability for connection state; the engine
/// shares connectors behind `Arc`.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Connector display name for logs and error attribution.
    fn name(&self) -> &str;

    /// Opens the connection. Called once before reading.
    async fn open(&self) -> Result<(), EtlError>;

    /// Closes the connection. Called after reading, including on failure.
    async fn close(&self) -> Result<(), EtlError>;

    /// Probes connectivity without side effects on the source.
    async fn test_connection(&self) -> Result<ConnectionTestResult, EtlError>;

    /// Static connector description.
    fn metadata(&self) -> ConnectorMetadata {
        ConnectorMetadata::default()
    }

    /// Estimated number of records the source will yield, when the source
    /// can tell cheaply.
    async fn estimated_record_count(&self) -> Result<Option<u64>, EtlError> {
        Ok(None)
    }

    /// Streams records in source order. Finite and non-restartable: a
    /// second call after exhaustion yields an empty stream or an error,
    /// at the implementation's discretion.
    async fn read(&self, context: &ExecutionContext) -> Result<BoxStream<'_, Result<Record, EtlError>>, EtlError>;
}

/// A system records are loaded into.
#[async_trait]
pub trait DestinationConnector: Send + Sync {
    /// Connector display name for logs and error attribution.
    fn name(&self) -> &str;

    /// Opens the connection. Called once before writing.
    async fn open(&self) -> Result<(), EtlError>;

    /// Closes the connection, flushing buffered writes.
    async fn close(&self) -> Result<(), EtlError>;

    /// Probes connectivity without writing.
    async fn test_connection(&self) -> Result<ConnectionTestResult, EtlError>;

    /// Static connector description.
    fn metadata(&self) -> ConnectorMetadata {
        ConnectorMetadata::default()
    }

    /// Writes a single record.
    async fn write(&self, record: Record) -> Result<(), EtlError>;

    /// Writes a batch, reporting partial failures.
    ///
    /// The default delegates to `write` per record and converts individual
    /// failures into the failed count.
    async fn write_batch(&self, records: Vec<Record>) -> Result<WriteResult, EtlError> {
        let mut result = WriteResult::default();
        for record in records {
            match self.write(record).await {
                Ok(()) => result.successful += 1,
                Err(error) => {
                    tracing::warn!(connector = self.name(), "record write failed: {}", error);
                    result.failed += 1;
                }
            }
        }
        Ok(result)
    }
}
