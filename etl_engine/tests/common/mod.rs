// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared fixtures for the integration suites: vector-backed connectors
//! with lifecycle tracking, and record builders.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use etl_engine_domain::entities::ExecutionContext;
use etl_engine_domain::error::EtlError;
use etl_engine_domain::services::{
    ConnectionTestResult, DestinationConnector, SourceConnector, WriteResult,
};
use etl_engine_domain::value_objects::Record;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;

/// Builds records with an `id` and `name` field.
pub fn named_records(names: &[(i64, &str)]) -> Vec<Record> {
    names
        .iter()
        .map(|(id, name)| Record::from_fields([("id", etl_engine_domain::value_objects::FieldValue::Integer(*id)), ("name", (*name).into())]))
        .collect()
}

/// In-memory source connector. Non-restartable: the records are handed out
/// once. Tracks open/close calls.
pub struct VecSource {
    records: Mutex<Option<Vec<Record>>>,
    delay_per_record: Option<Duration>,
    pub opened: AtomicBool,
    pub closed: AtomicBool,
}

impl VecSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: Mutex::new(Some(records)),
            delay_per_record: None,
            opened: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Adds an artificial delay before each yielded record.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_per_record = Some(delay);
        self
    }
}

#[async_trait]
impl SourceConnector for VecSource {
    fn name(&self) -> &str {
        "vec-source"
    }

    async fn open(&self) -> Result<(), EtlError> {
        self.opened.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), EtlError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn test_connection(&self) -> Result<ConnectionTestResult, EtlError> {
        Ok(ConnectionTestResult::ok("in-memory"))
    }

    async fn estimated_record_count(&self) -> Result<Option<u64>, EtlError> {
        Ok(self.records.lock().as_ref().map(|r| r.len() as u64))
    }

    async fn read(&self, _context: &ExecutionContext) -> Result<BoxStream<'_, Result<Record, EtlError>>, EtlError> {
        let records = self.records.lock().take().unwrap_or_default();
        let delay = self.delay_per_record;
        let stream = async_stream::stream! {
            for record in records {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(record);
            }
        };
        Ok(stream.boxed())
    }
}

/// Predicate deciding whether a record's write fails.
pub type FailPredicate = dyn Fn(&Record) -> bool + Send + Sync;

/// In-memory destination connector collecting written records.
pub struct CollectSink {
    written: Mutex<Vec<Record>>,
    fail_on: Option<Box<FailPredicate>>,
    pub opened: AtomicBool,
    pub closed: AtomicBool,
}

impl CollectSink {
    pub fn new() -> Self {
        Self {
            written: Mutex::new(Vec::new()),
            fail_on: None,
            opened: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Fails writes for records matching the predicate.
    pub fn failing_on(mut self, predicate: impl Fn(&Record) -> bool + Send + Sync + 'static) -> Self {
        self.fail_on = Some(Box::new(predicate));
        self
    }

    pub fn written(&self) -> Vec<Record> {
        self.written.lock().clone()
    }
}

impl Default for CollectSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DestinationConnector for CollectSink {
    fn name(&self) -> &str {
        "collect-sink"
    }

    async fn open(&self) -> Result<(), EtlError> {
        self.opened.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), EtlError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn test_connection(&self) -> Result<ConnectionTestResult, EtlError> {
        Ok(ConnectionTestResult::ok("in-memory"))
    }

    async fn write(&self, record: Record) -> Result<(), EtlError> {
        if let Some(predicate) = &self.fail_on {
            if predicate(&record) {
                return Err(EtlError::IoFailed("write rejected by test predicate".to_string()));
            }
        }
        self.written.lock().push(record);
        Ok(())
    }

    async fn write_batch(&self, records: Vec<Record>) -> Result<WriteResult, EtlError> {
        let mut result = WriteResult::default();
        for record in records {
            match self.write(record).await {
                Ok(()) => result.successful += 1,
                Err(_) => result.failed += 1,
            }
        }
        Ok(result)
    }
}
