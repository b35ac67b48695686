/*
 * fsys.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Filesystem and file traits, plus the non-destructive decorators that
 * attach ambient configuration to a filesystem.
 */

//! Filesystem abstraction.
//!
//! A [`DataFs`] opens slash-separated names relative to its own root and
//! returns [`DataFile`] handles. Backends opt into ambient configuration by
//! overriding the `with_*` capability methods, each of which returns a *new*
//! filesystem; a backend that ignores a setting returns `None` and the
//! `with_*_fs` helpers hand back the original instance.
//!
//! ```text
//! registry.lookup(root) ──► fsys
//!                            │
//!        with_context_fs ────┤  (cancellation, deadline, registry)
//!        with_headers_fs ────┤  (per-source HTTP headers)
//!    with_http_client_fs ────┤  (transport override)
//!        with_sources_fs ────┘  (alias table)
//! ```

use std::io::{self, Cursor, Read};
use std::sync::Arc;
use std::time::SystemTime;

use crate::backend::HttpClient;
use crate::context::FsContext;
use crate::error::{DataFsError, DataFsResult};
use crate::source::{Headers, SourceTable};

/// Metadata about an opened file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Base name of the file
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time, when the backend knows it
    pub modified: Option<SystemTime>,
    /// Whether this is a directory
    pub is_dir: bool,
    /// Content type reported by the backend (e.g. an HTTP `Content-Type`)
    pub content_type: Option<String>,
}

impl FileInfo {
    /// Metadata for a regular file.
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            modified: None,
            is_dir: false,
            content_type: None,
        }
    }

    /// Set the reported content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// An opened file.
///
/// Handles are released by [`DataFile::close`]; dropping an unclosed handle
/// releases it too, but without reporting errors.
pub trait DataFile: Read + Send {
    /// Get file metadata.
    fn stat(&mut self) -> DataFsResult<FileInfo>;

    /// Release the handle. Closing twice is a no-op.
    fn close(&mut self) -> DataFsResult<()>;
}

/// A filesystem rooted at some location, selected by URL scheme.
pub trait DataFs: Send + Sync + std::fmt::Debug {
    /// Open a slash-separated name relative to the filesystem root.
    fn open(&self, name: &str) -> DataFsResult<Box<dyn DataFile>>;

    /// A copy of this filesystem bound to `ctx`.
    fn with_context(&self, _ctx: &FsContext) -> Option<Arc<dyn DataFs>> {
        None
    }

    /// A copy of this filesystem using `client` for HTTP requests.
    fn with_http_client(&self, _client: Arc<dyn HttpClient>) -> Option<Arc<dyn DataFs>> {
        None
    }

    /// A copy of this filesystem sending `headers` with every request.
    fn with_headers(&self, _headers: &Headers) -> Option<Arc<dyn DataFs>> {
        None
    }

    /// A copy of this filesystem resolving aliases through `sources`.
    fn with_sources(&self, _sources: Arc<SourceTable>) -> Option<Arc<dyn DataFs>> {
        None
    }
}

/// Bind `fsys` to `ctx`, if it supports a context.
pub fn with_context_fs(ctx: &FsContext, fsys: Arc<dyn DataFs>) -> Arc<dyn DataFs> {
    fsys.with_context(ctx).unwrap_or(fsys)
}

/// Give `fsys` an HTTP transport override, if one is set and supported.
pub fn with_http_client_fs(
    client: Option<Arc<dyn HttpClient>>,
    fsys: Arc<dyn DataFs>,
) -> Arc<dyn DataFs> {
    match client {
        Some(client) => fsys.with_http_client(client).unwrap_or(fsys),
        None => fsys,
    }
}

/// Give `fsys` request headers, if any are set and supported.
pub fn with_headers_fs(headers: &Headers, fsys: Arc<dyn DataFs>) -> Arc<dyn DataFs> {
    if headers.is_empty() {
        return fsys;
    }
    fsys.with_headers(headers).unwrap_or(fsys)
}

/// Give `fsys` the alias table, if supported.
pub fn with_sources_fs(sources: Arc<SourceTable>, fsys: Arc<dyn DataFs>) -> Arc<dyn DataFs> {
    fsys.with_sources(sources).unwrap_or(fsys)
}

/// Open `name`, read it fully, and close it.
pub fn read_file(fsys: &dyn DataFs, name: &str) -> DataFsResult<(Vec<u8>, FileInfo)> {
    let mut file = fsys.open(name)?;
    let result = read_open_file(file.as_mut(), name);
    let closed = file.close();
    let (data, info) = result?;
    closed?;
    Ok((data, info))
}

/// Read an already-open file fully and stat it.
pub(crate) fn read_open_file(
    file: &mut dyn DataFile,
    name: &str,
) -> DataFsResult<(Vec<u8>, FileInfo)> {
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .map_err(|e| DataFsError::from_io(name, e))?;
    let info = file.stat()?;
    Ok((data, info))
}

/// Whether `name` is a valid slash-separated, unrooted path with no `.`,
/// `..`, or empty elements (`.` on its own names the root).
pub fn is_valid_path(name: &str) -> bool {
    if name == "." {
        return true;
    }
    if name.is_empty() || name.contains('\\') {
        return false;
    }
    name.split('/')
        .all(|element| !element.is_empty() && element != "." && element != "..")
}

/// A [`DataFile`] over bytes already in memory.
#[derive(Debug)]
pub struct BytesFile {
    data: Cursor<Vec<u8>>,
    info: FileInfo,
    closed: bool,
}

impl BytesFile {
    /// Wrap `data`, reporting `info` from [`DataFile::stat`].
    pub fn new(data: Vec<u8>, info: FileInfo) -> Self {
        Self {
            data: Cursor::new(data),
            info,
            closed: false,
        }
    }
}

impl Read for BytesFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::other(format!("read {}: file already closed", self.info.name)));
        }
        self.data.read(buf)
    }
}

impl DataFile for BytesFile {
    fn stat(&mut self) -> DataFsResult<FileInfo> {
        Ok(self.info.clone())
    }

    fn close(&mut self) -> DataFsResult<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct PlainFs;

    impl DataFs for PlainFs {
        fn open(&self, name: &str) -> DataFsResult<Box<dyn DataFile>> {
            Ok(Box::new(BytesFile::new(
                b"plain".to_vec(),
                FileInfo::file(name, 5),
            )))
        }
    }

    #[test]
    fn test_valid_paths() {
        assert!(is_valid_path("."));
        assert!(is_valid_path("a"));
        assert!(is_valid_path("tmp/a.json"));

        assert!(!is_valid_path(""));
        assert!(!is_valid_path("/tmp/a.json"));
        assert!(!is_valid_path("tmp/"));
        assert!(!is_valid_path("tmp//a"));
        assert!(!is_valid_path("./a"));
        assert!(!is_valid_path("a/../b"));
    }

    #[test]
    fn test_unsupported_decoration_returns_original() {
        let fsys: Arc<dyn DataFs> = Arc::new(PlainFs);
        let decorated = with_context_fs(&FsContext::new(), fsys.clone());
        assert!(Arc::ptr_eq(&fsys, &decorated));

        let mut headers = Headers::new();
        headers.insert("X-Test".to_string(), vec!["1".to_string()]);
        let decorated = with_headers_fs(&headers, fsys.clone());
        assert!(Arc::ptr_eq(&fsys, &decorated));

        let decorated = with_http_client_fs(None, fsys.clone());
        assert!(Arc::ptr_eq(&fsys, &decorated));
    }

    #[test]
    fn test_read_file_reads_and_stats() {
        let (data, info) = read_file(&PlainFs, "a.txt").unwrap();
        assert_eq!(data, b"plain");
        assert_eq!(info.name, "a.txt");
        assert_eq!(info.size, 5);
    }

    #[test]
    fn test_bytes_file_read_after_close_fails() {
        let mut file = BytesFile::new(b"abc".to_vec(), FileInfo::file("f", 3));
        let mut buf = [0u8; 8];
        assert_eq!(file.read(&mut buf).unwrap(), 3);
        assert_eq!(file.read(&mut buf).unwrap(), 0);

        file.close().unwrap();
        assert!(file.read(&mut buf).is_err());
        assert!(file.close().is_ok());
    }
}
