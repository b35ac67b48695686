/*
 * memory.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * In-memory filesystem backend.
 */

//! In-memory backend.
//!
//! [`MemFs`] holds files in a map keyed by slash-separated name. It backs
//! tests and embedders that want to serve generated data through the same
//! scheme registry as real sources.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::FsContext;
use crate::error::{DataFsError, DataFsResult};
use crate::fsys::{BytesFile, DataFile, DataFs, FileInfo, is_valid_path};

#[derive(Debug, Clone, PartialEq, Eq)]
struct MemEntry {
    data: Vec<u8>,
    content_type: Option<String>,
}

/// A map of names to file contents.
///
/// Clones and decorated copies share the file table until one of them adds
/// a file.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    files: Arc<BTreeMap<String, MemEntry>>,
    ctx: FsContext,
}

impl MemFs {
    /// Create an empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file. Leading slashes on `name` are ignored.
    pub fn with_file(mut self, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.insert(name, data.into(), None);
        self
    }

    /// Add a file that reports `content_type` from stat.
    pub fn with_typed_file(
        mut self,
        name: &str,
        data: impl Into<Vec<u8>>,
        content_type: &str,
    ) -> Self {
        self.insert(name, data.into(), Some(content_type.to_string()));
        self
    }

    fn insert(&mut self, name: &str, data: Vec<u8>, content_type: Option<String>) {
        Arc::make_mut(&mut self.files).insert(
            name.trim_start_matches('/').to_string(),
            MemEntry { data, content_type },
        );
    }

    /// Names of all files, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

impl DataFs for MemFs {
    fn open(&self, name: &str) -> DataFsResult<Box<dyn DataFile>> {
        if !is_valid_path(name) {
            return Err(DataFsError::InvalidPath {
                path: name.to_string(),
            });
        }
        self.ctx.check()?;

        let entry = self.files.get(name).ok_or_else(|| DataFsError::NotFound {
            path: name.to_string(),
        })?;

        let base_name = name.rsplit('/').next().unwrap_or(name);
        let mut info = FileInfo::file(base_name, entry.data.len() as u64);
        info.content_type = entry.content_type.clone();
        Ok(Box::new(BytesFile::new(entry.data.clone(), info)))
    }

    fn with_context(&self, ctx: &FsContext) -> Option<Arc<dyn DataFs>> {
        Some(Arc::new(Self {
            ctx: ctx.clone(),
            ..self.clone()
        }))
    }
}
