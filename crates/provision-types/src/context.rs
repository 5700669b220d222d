//! Execution context threaded through every provisioning call
//!
//! Cancellation is cooperative: the scheduler only carries the context, leaf
//! implementations decide when to honour it.

use crate::error::{ProvisionError, Result};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Context passed to every [`Provisionable`](crate::Provisionable) operation
#[derive(Debug, Clone, Default)]
pub struct ProvisionContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

/// Signals cancellation to every context cloned from the one it was created with
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl ProvisionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cancellable context and the handle that cancels it
    pub fn with_cancellation() -> (Self, CancelHandle) {
        let ctx = Self::default();
        let handle = CancelHandle {
            token: ctx.cancel.clone(),
        };
        (ctx, handle)
    }

    /// Context cancelled together with an existing token (e.g. a process shutdown token)
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail with `Cancelled` or `DeadlineExceeded` if either applies
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(ProvisionError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(ProvisionError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Resolves once the context is cancelled; never resolves for a context
    /// nobody can cancel.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
