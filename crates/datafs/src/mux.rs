/*
 * mux.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Scheme registry: dispatches URLs to filesystem providers by scheme.
 */

//! Scheme registry.
//!
//! An [`FsMux`] maps URL schemes to [`FsProvider`]s. Dispatching a URL
//! selects the provider registered for its scheme and asks it for a
//! filesystem rooted at that URL. The registry itself holds no per-request
//! state; once built it is shared through the [`FsContext`] so that nested
//! opens (such as the parts of a `merge:` source) dispatch through the same
//! registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use url::Url;

use crate::context::FsContext;
use crate::error::{DataFsError, DataFsResult};
use crate::fsys::{DataFs, with_context_fs};
use crate::urls::{fs_root_url, parse_source_url, parse_source_url_in};

/// A factory for filesystems serving one or more URL schemes.
pub trait FsProvider: Send + Sync {
    /// Schemes handled by this provider.
    fn schemes(&self) -> Vec<String>;

    /// Create a filesystem rooted at `url`.
    fn new_fs(&self, url: &Url) -> DataFsResult<Arc<dyn DataFs>>;
}

type FactoryFn = dyn Fn(&Url) -> DataFsResult<Arc<dyn DataFs>> + Send + Sync;

/// An [`FsProvider`] built from a closure.
#[derive(Clone)]
pub struct FsProviderFn {
    factory: Arc<FactoryFn>,
    schemes: Vec<String>,
}

impl FsProviderFn {
    /// Create a provider for `schemes` that calls `factory` for each URL.
    pub fn new<F>(factory: F, schemes: &[&str]) -> Self
    where
        F: Fn(&Url) -> DataFsResult<Arc<dyn DataFs>> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            schemes: schemes.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FsProvider for FsProviderFn {
    fn schemes(&self) -> Vec<String> {
        self.schemes.clone()
    }

    fn new_fs(&self, url: &Url) -> DataFsResult<Arc<dyn DataFs>> {
        (self.factory)(url)
    }
}

impl std::fmt::Debug for FsProviderFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsProviderFn")
            .field("schemes", &self.schemes)
            .finish()
    }
}

/// A provider that always hands back the same filesystem, whatever the URL.
pub fn wrapped_fs_provider(fsys: Arc<dyn DataFs>, schemes: &[&str]) -> FsProviderFn {
    FsProviderFn::new(move |_url| Ok(fsys.clone()), schemes)
}

/// Scheme registry.
///
/// Each scheme maps to at most one provider; adding a provider for a scheme
/// that is already registered replaces the earlier one.
#[derive(Clone, Default)]
pub struct FsMux {
    providers: BTreeMap<String, Arc<dyn FsProvider>>,
}

impl FsMux {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` for each of its schemes.
    pub fn add(&mut self, provider: impl FsProvider + 'static) {
        let provider: Arc<dyn FsProvider> = Arc::new(provider);
        for scheme in provider.schemes() {
            if self.providers.contains_key(&scheme) {
                tracing::debug!(scheme = %scheme, "Replacing filesystem provider");
            }
            self.providers.insert(scheme, provider.clone());
        }
    }

    /// Builder form of [`FsMux::add`].
    pub fn with(mut self, provider: impl FsProvider + 'static) -> Self {
        self.add(provider);
        self
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Whether a provider is registered for `scheme`.
    pub fn supports(&self, scheme: &str) -> bool {
        self.providers.contains_key(scheme)
    }

    /// Create a filesystem for `url` using the provider for its scheme.
    pub fn lookup(&self, url: &Url) -> DataFsResult<Arc<dyn DataFs>> {
        self.dispatch(url, url.as_str())
    }

    fn dispatch(&self, url: &Url, path: &str) -> DataFsResult<Arc<dyn DataFs>> {
        let scheme = url.scheme();
        let provider = self
            .providers
            .get(scheme)
            .ok_or_else(|| DataFsError::UnsupportedScheme {
                scheme: scheme.to_string(),
            })?;

        tracing::debug!(scheme, url = %url, "Dispatching filesystem");

        provider
            .new_fs(url)
            .map_err(|e| DataFsError::ProviderUnavailable {
                path: path.to_string(),
                source: Box::new(e),
            })
    }
}

impl std::fmt::Debug for FsMux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsMux")
            .field("schemes", &self.schemes())
            .finish()
    }
}

/// Get a filesystem for `path` (a URL or a bare path), rooted at `/` (or at
/// the repository root for git URLs), and bound to `ctx`.
///
/// The registry is taken from `ctx`; without one this fails with
/// [`DataFsError::NoProviderInContext`].
pub fn fsys_for_path(ctx: &FsContext, path: &str) -> DataFsResult<Arc<dyn DataFs>> {
    let url = match ctx.working_dir() {
        Some(dir) => parse_source_url_in(path, dir)?,
        None => parse_source_url(path)?,
    };
    let mux = ctx.provider()?;
    let fsys = mux.dispatch(&fs_root_url(&url), path)?;
    Ok(with_context_fs(ctx, fsys))
}
