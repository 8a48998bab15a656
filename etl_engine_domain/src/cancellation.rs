// /////////////////////////////////////////////////////////////////////////////
// ETL Engine RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cancellation
//!
//! Lightweight, clone-able cancellation tokens with parent/child linking.
//!
//! Every execution owns a linked token: the parent is the caller's signal,
//! the child is cancelable by the orchestrator's stop operation. Cancelling
//! a parent cancels every descendant; cancelling a child leaves the parent
//! untouched. Workers observe the token at stage boundaries and before each
//! record in transformation batches, finish their current record, and
//! return.
//!
//! ## Usage
//!
//! ```
//! use etl_engine_domain::cancellation::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let caller = CancellationToken::new();
//!     let execution = caller.child_token();
//!
//!     let worker = execution.clone();
//!     let handle = tokio::spawn(async move {
//!         worker.cancelled().await;
//!     });
//!
//!     caller.cancel(); // parent cancellation reaches the child
//!     handle.await.unwrap();
//!     assert!(execution.is_cancelled());
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

struct TokenInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl TokenInner {
    fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }
}

/// Cancellation token for signaling that work should stop.
///
/// Cloning is cheap and shares the underlying state; all clones observe the
/// same cancellation.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
    parent: Option<Arc<CancellationToken>>,
}

impl CancellationToken {
    /// Creates a new, un-cancelled root token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner::new()),
            parent: None,
        }
    }

    /// Creates a child token linked to this one.
    ///
    /// The child is cancelled when either it or any ancestor is cancelled;
    /// cancelling the child does not affect the parent.
    pub fn child_token(&self) -> Self {
        Self {
            inner: Arc::new(TokenInner::new()),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Cancels this token (and, transitively, its children).
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Checks whether this token or any ancestor has been cancelled
    /// (non-blocking).
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        let mut current = self.parent.as_deref();
        while let Some(token) = current {
            if token.inner.cancelled.load(Ordering::SeqCst) {
                return true;
            }
            current = token.parent.as_deref();
        }
        false
    }

    /// Waits until this token or any ancestor is cancelled.
    pub async fn cancelled(&self) {
        let chain = self.chain();
        loop {
            // Register interest before checking the flags so a cancel that
            // lands between the check and the await cannot be missed.
            let mut waits = Vec::with_capacity(chain.len());
            for inner in &chain {
                let mut wait = Box::pin(inner.notify.notified());
                wait.as_mut().enable();
                waits.push(wait);
            }
            if chain.iter().any(|inner| inner.cancelled.load(Ordering::SeqCst)) {
                return;
            }
            futures::future::select_all(waits).await;
        }
    }

    /// Returns an error when this token has been cancelled; used as the
    /// suspension-point check.
    pub fn check(&self, source: &str) -> Result<(), crate::error::EtlError> {
        if self.is_cancelled() {
            Err(crate::error::EtlError::cancelled(format!(
                "cancellation requested ({})",
                source
            )))
        } else {
            Ok(())
        }
    }

    fn chain(&self) -> Vec<Arc<TokenInner>> {
        let mut chain = vec![self.inner.clone()];
        let mut current = self.parent.as_deref();
        while let Some(token) = current {
            chain.push(token.inner.clone());
            current = token.parent.as_deref();
        }
        chain
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("linked", &self.parent.is_some())
            .finish()
    }
}
