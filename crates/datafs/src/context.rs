/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Ambient context threaded through filesystem dispatch.
 */

//! Ambient context for filesystem dispatch.
//!
//! [`FsContext`] is the single channel through which the scheme registry,
//! the cancellation signal, a deadline, and arbitrary typed values reach
//! nested opens. It is an immutable value: every `with_*` method returns a
//! new context and leaves the receiver untouched, so callers sharing a base
//! context never observe each other's configuration.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cancellation::Cancellation;
use crate::error::{DataFsError, DataFsResult};
use crate::mux::FsMux;

type ValueMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Immutable ambient context for opens and reads.
#[derive(Clone, Default)]
pub struct FsContext {
    cancellation: Cancellation,
    deadline: Option<Instant>,
    provider: Option<Arc<FsMux>>,
    working_dir: Option<PathBuf>,
    values: Arc<ValueMap>,
}

impl FsContext {
    /// An empty context: never cancelled, no deadline, no registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the scheme registry used for nested dispatch.
    pub fn with_provider(&self, provider: Arc<FsMux>) -> Self {
        Self {
            provider: Some(provider),
            ..self.clone()
        }
    }

    /// Replace the cancellation token.
    pub fn with_cancellation(&self, cancellation: Cancellation) -> Self {
        Self {
            cancellation,
            ..self.clone()
        }
    }

    /// Set a deadline. An earlier existing deadline is kept.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    /// Set a deadline `timeout` from now. A timeout too large to represent
    /// leaves the deadline unchanged.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    /// Directory that relative source paths resolve against. Defaults to the
    /// process working directory.
    pub fn with_working_dir(&self, dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
            ..self.clone()
        }
    }

    /// Attach a typed value. A previous value of the same type is shadowed
    /// in the new context only.
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        let mut values = (*self.values).clone();
        values.insert(TypeId::of::<T>(), Arc::new(value));
        Self {
            values: Arc::new(values),
            ..self.clone()
        }
    }

    /// Look up a typed value.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// The scheme registry, or [`DataFsError::NoProviderInContext`].
    pub fn provider(&self) -> DataFsResult<&Arc<FsMux>> {
        self.provider.as_ref().ok_or(DataFsError::NoProviderInContext)
    }

    /// The cancellation token.
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The configured working directory, if any.
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Fail if the context has been cancelled or its deadline has passed.
    pub fn check(&self) -> DataFsResult<()> {
        if self.cancellation.is_cancelled() {
            return Err(DataFsError::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(DataFsError::DeadlineExceeded);
        }
        Ok(())
    }
}

impl std::fmt::Debug for FsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsContext")
            .field("is_cancelled", &self.cancellation.is_cancelled())
            .field("deadline", &self.deadline)
            .field("has_provider", &self.provider.is_some())
            .field("working_dir", &self.working_dir)
            .field("values_count", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[derive(Debug, PartialEq)]
    struct RequestId(u32);

    #[test]
    fn test_missing_provider_is_an_error() {
        let ctx = FsContext::new();
        let err = ctx.provider().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoProviderInContext);
    }

    #[test]
    fn test_with_provider_does_not_touch_original() {
        let base = FsContext::new();
        let derived = base.with_provider(Arc::new(FsMux::new()));

        assert!(base.provider().is_err());
        assert!(derived.provider().is_ok());
    }

    #[test]
    fn test_typed_values_are_copy_on_write() {
        let base = FsContext::new().with_value(RequestId(1));
        let derived = base.with_value(RequestId(2));

        assert_eq!(base.value::<RequestId>(), Some(&RequestId(1)));
        assert_eq!(derived.value::<RequestId>(), Some(&RequestId(2)));
        assert_eq!(FsContext::new().value::<RequestId>(), None);
    }

    #[test]
    fn test_check_reports_cancellation() {
        let token = Cancellation::new();
        let ctx = FsContext::new().with_cancellation(token.clone());
        assert!(ctx.check().is_ok());

        token.cancel();
        assert_eq!(ctx.check().unwrap_err().kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_check_reports_deadline() {
        let ctx = FsContext::new().with_deadline(Instant::now() - Duration::from_millis(1));
        assert_eq!(ctx.check().unwrap_err().kind(), ErrorKind::DeadlineExceeded);
    }

    #[test]
    fn test_earlier_deadline_wins() {
        let soon = Instant::now() + Duration::from_secs(1);
        let later = soon + Duration::from_secs(60);
        let ctx = FsContext::new().with_deadline(soon).with_deadline(later);
        assert_eq!(ctx.deadline(), Some(soon));
    }

    #[test]
    fn test_unbounded_timeout_keeps_deadline() {
        let ctx = FsContext::new().with_timeout(Duration::MAX);
        assert_eq!(ctx.deadline(), None);
        assert!(ctx.check().is_ok());

        let soon = Instant::now() + Duration::from_secs(1);
        let ctx = FsContext::new().with_deadline(soon).with_timeout(Duration::MAX);
        assert_eq!(ctx.deadline(), Some(soon));
    }
}
