/*
 * local.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Local filesystem backend for file: URLs.
 */

//! Local filesystem backend.
//!
//! [`LocalFs`] serves `file:` URLs from a root directory. Regular files are
//! streamed; opening a directory yields a JSON array of its sorted entry
//! names, typed `application/array+json`.

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use crate::codec::JSON_ARRAY_MIMETYPE;
use crate::context::FsContext;
use crate::error::{DataFsError, DataFsResult};
use crate::fsys::{BytesFile, DataFile, DataFs, FileInfo, is_valid_path};
use crate::mux::FsProviderFn;

/// Filesystem rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
    ctx: FsContext,
}

impl LocalFs {
    /// Create a filesystem rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ctx: FsContext::new(),
        }
    }

    /// Create a filesystem rooted at the directory a `file:` URL names.
    pub fn from_url(url: &Url) -> DataFsResult<Self> {
        if url.scheme() != "file" {
            return Err(DataFsError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
            });
        }
        let root = url.to_file_path().map_err(|()| DataFsError::InvalidPath {
            path: url.to_string(),
        })?;
        Ok(Self::new(root))
    }

    /// Provider for the `file` scheme.
    pub fn provider() -> FsProviderFn {
        FsProviderFn::new(
            |url| Ok(Arc::new(LocalFs::from_url(url)?) as Arc<dyn DataFs>),
            &["file"],
        )
    }

    /// The root directory.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn list_dir(&self, path: &std::path::Path, name: &str) -> DataFsResult<Box<dyn DataFile>> {
        let mut names = Vec::new();
        let entries = std::fs::read_dir(path).map_err(|e| DataFsError::from_io(name, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| DataFsError::from_io(name, e))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        let data = serde_json::to_vec(&names).map_err(|e| DataFsError::Encode {
            message: e.to_string(),
        })?;
        let mut info = FileInfo::file(name, data.len() as u64)
            .with_content_type(JSON_ARRAY_MIMETYPE);
        info.is_dir = true;
        Ok(Box::new(BytesFile::new(data, info)))
    }
}

impl DataFs for LocalFs {
    fn open(&self, name: &str) -> DataFsResult<Box<dyn DataFile>> {
        if !is_valid_path(name) {
            return Err(DataFsError::InvalidPath {
                path: name.to_string(),
            });
        }
        self.ctx.check()?;

        let path = if name == "." {
            self.root.clone()
        } else {
            self.root.join(name)
        };
        tracing::trace!(path = %path.display(), "Opening local file");

        let metadata = std::fs::metadata(&path).map_err(|e| DataFsError::from_io(name, e))?;
        if metadata.is_dir() {
            return self.list_dir(&path, name);
        }

        let file = File::open(&path).map_err(|e| DataFsError::from_io(name, e))?;
        Ok(Box::new(LocalFile {
            file: Some(file),
            name: name.to_string(),
        }))
    }

    fn with_context(&self, ctx: &FsContext) -> Option<Arc<dyn DataFs>> {
        Some(Arc::new(Self {
            ctx: ctx.clone(),
            ..self.clone()
        }))
    }
}

/// An open local file. The OS handle is released on close or drop.
#[derive(Debug)]
struct LocalFile {
    file: Option<File>,
    name: String,
}

impl LocalFile {
    fn base_name(&self) -> String {
        self.name
            .rsplit('/')
            .next()
            .unwrap_or(&self.name)
            .to_string()
    }
}

impl Read for LocalFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.read(buf),
            None => Err(io::Error::other(format!("read {}: file already closed", self.name))),
        }
    }
}

impl DataFile for LocalFile {
    fn stat(&mut self) -> DataFsResult<FileInfo> {
        let Some(file) = self.file.as_ref() else {
            return Err(DataFsError::Io {
                path: self.name.clone(),
                source: io::Error::other("file already closed"),
            });
        };
        let metadata = file
            .metadata()
            .map_err(|e| DataFsError::from_io(self.name.clone(), e))?;
        Ok(FileInfo {
            name: self.base_name(),
            size: metadata.len(),
            modified: metadata.modified().ok(),
            is_dir: metadata.is_dir(),
            content_type: None,
        })
    }

    fn close(&mut self) -> DataFsResult<()> {
        self.file.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fsys::read_file;

    #[test]
    fn test_open_and_stat() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/a.json"), r#"{"a": 1}"#).unwrap();

        let fsys = LocalFs::new(dir.path());
        let (data, info) = read_file(&fsys, "sub/a.json").unwrap();
        assert_eq!(data, br#"{"a": 1}"#);
        assert_eq!(info.name, "a.json");
        assert_eq!(info.size, 8);
        assert!(!info.is_dir);
        assert!(info.content_type.is_none());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalFs::new(dir.path()).open("nope.json").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_invalid_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let fsys = LocalFs::new(dir.path());
        for name in ["../etc/passwd", "/abs", "a//b", ""] {
            let err = fsys.open(name).err().unwrap();
            assert_eq!(err.kind(), ErrorKind::InvalidPath, "{}", name);
        }
    }

    #[test]
    fn test_directory_lists_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "b: 2\n").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();

        let (data, info) = read_file(&LocalFs::new(dir.path()), ".").unwrap();
        assert_eq!(data, br#"["a.json","b.yaml"]"#);
        assert!(info.is_dir);
        assert_eq!(info.content_type.as_deref(), Some(JSON_ARRAY_MIMETYPE));
    }

    #[test]
    fn test_read_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hi").unwrap();

        let mut file = LocalFs::new(dir.path()).open("a.txt").unwrap();
        file.close().unwrap();
        let mut buf = Vec::new();
        assert!(file.read_to_end(&mut buf).is_err());
        assert!(file.close().is_ok());
    }

    #[test]
    fn test_from_url_requires_file_scheme() {
        let err = LocalFs::from_url(&Url::parse("http://example.com/").unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedScheme);
    }

    #[cfg(unix)]
    #[test]
    fn test_from_url_roots_at_path() {
        let fsys = LocalFs::from_url(&Url::parse("file:///tmp/data/").unwrap()).unwrap();
        assert_eq!(fsys.root(), std::path::Path::new("/tmp/data/"));
    }
}
