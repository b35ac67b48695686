/*
 * cancellation.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Cancellation token carried by the filesystem context.
 */

//! Cancellation for in-flight opens and reads.
//!
//! [`Cancellation`] wraps `tokio_util::sync::CancellationToken` so that a
//! caller on another thread (a Ctrl+C handler, a request timeout) can abort a
//! multi-source merge between sub-source fetches.

/// A cloneable cancellation token. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    inner: tokio_util::sync::CancellationToken,
}

impl Cancellation {
    /// Create a new, untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Request cancellation.
    ///
    /// After this is called, `is_cancelled()` returns `true` on this token,
    /// every clone, and every child token.
    pub fn cancel(&self) {
        self.inner.cancel()
    }

    /// A token that is cancelled when this one is, but can also be cancelled
    /// on its own without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            inner: self.inner.child_token(),
        }
    }
}

impl From<tokio_util::sync::CancellationToken> for Cancellation {
    fn from(token: tokio_util::sync::CancellationToken) -> Self {
        Self { inner: token }
    }
}
