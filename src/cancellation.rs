//! # Cancellation Module
//!
//! A [`CancellationToken`] is a shared flag that says "stop telling me about
//! this result". It never aborts a request that is already on the wire: the
//! transport always runs to completion or failure, and the dispatcher only
//! suppresses delivery of the outcome.
//!
//! Tokens are reference types. Cloning a token hands out another handle to the
//! same flag, so one token can scope any number of in-flight calls.
//!
//! ```rust
//! use xsolla_igs::CancellationToken;
//!
//! let token = CancellationToken::new();
//! let shared = token.clone();
//!
//! token.cancel();
//! token.cancel(); // idempotent
//!
//! assert!(shared.is_cancelled());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, set-once cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the token cancelled. Calling this again has no further effect.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether [`cancel`](Self::cancel) has been called on any handle of this token.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Whether both handles refer to the same underlying flag.
    #[must_use]
    pub fn same_as(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}
