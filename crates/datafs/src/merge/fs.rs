/*
 * fs.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * The merge: filesystem.
 */

//! The `merge:` filesystem.
//!
//! Opening `a|b|c` on a [`MergeFs`] resolves each part (alias first, then a
//! literal URL or path), dispatches it through the registry carried by the
//! context, and opens it. Every part must open, otherwise the parts opened
//! so far are closed and the open fails.
//!
//! The returned [`MergeFile`] is materialized on first read or stat: each
//! part is read and decoded, the objects are deep-merged in list order (later
//! parts win), and the result is encoded by the codec (YAML by default).
//! Closing the file closes every part handle and reports all close failures.

use std::io::{self, Cursor, Read};
use std::sync::Arc;

use serde_json::{Map, Value};
use url::Url;

use crate::backend::HttpClient;
use crate::codec::{Codec, DefaultCodec, select_content_type, type_name};
use crate::context::FsContext;
use crate::error::{DataFsError, DataFsResult};
use crate::fsys::{
    DataFile, DataFs, FileInfo, read_open_file, with_context_fs, with_headers_fs,
    with_http_client_fs, with_sources_fs,
};
use crate::merge::deep::merge_objects;
use crate::mux::FsProviderFn;
use crate::source::SourceTable;
use crate::urls::split_fs_mux_url;

/// Separator between parts of a merge name
const PART_SEPARATOR: char = '|';

/// Part lists of the merges being opened, outermost first
#[derive(Debug, Clone, Default)]
struct MergeChain(Vec<String>);

/// Filesystem for the `merge` scheme.
///
/// Instances are immutable; the `with_*` decorators return new instances.
#[derive(Debug, Clone)]
pub struct MergeFs {
    ctx: FsContext,
    http_client: Option<Arc<dyn HttpClient>>,
    sources: Arc<SourceTable>,
    codec: Arc<dyn Codec>,
}

impl MergeFs {
    /// Create a merge filesystem for a `merge:` URL.
    pub fn new(url: &Url) -> DataFsResult<Self> {
        if url.scheme() != "merge" {
            return Err(DataFsError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
            });
        }
        Ok(Self {
            ctx: FsContext::new(),
            http_client: None,
            sources: Arc::new(SourceTable::new()),
            codec: Arc::new(DefaultCodec),
        })
    }

    /// Provider for the `merge` scheme.
    pub fn provider() -> FsProviderFn {
        FsProviderFn::new(
            |url| Ok(Arc::new(MergeFs::new(url)?) as Arc<dyn DataFs>),
            &["merge"],
        )
    }

    /// A copy of this filesystem decoding and encoding with `codec`.
    pub fn with_codec(&self, codec: Arc<dyn Codec>) -> Self {
        Self {
            codec,
            ..self.clone()
        }
    }

    /// The alias table used to resolve parts.
    pub fn sources(&self) -> &SourceTable {
        &self.sources
    }

    /// Context for opening the parts of `name`, failing if an enclosing
    /// merge is already opening the same parts.
    fn enter(&self, name: &str, references: &[&str]) -> DataFsResult<FsContext> {
        let key = references.join("|");
        let mut chain = self.ctx.value::<MergeChain>().cloned().unwrap_or_default();
        if chain.0.contains(&key) {
            chain.0.push(key);
            return Err(DataFsError::InvalidSourceReference {
                reference: name.to_string(),
                reason: format!("merge refers to itself ({})", chain.0.join(" -> ")),
            });
        }
        chain.0.push(key);
        Ok(self.ctx.with_value(chain))
    }

    fn open_part(
        &self,
        ctx: &FsContext,
        name: &str,
        index: usize,
        reference: &str,
    ) -> DataFsResult<MergePart> {
        let open_failed = |e: DataFsError| DataFsError::SubSourceOpenFailed {
            name: name.to_string(),
            index,
            reference: reference.to_string(),
            source: Box::new(e),
        };
        ctx.check().map_err(open_failed)?;

        let source = self
            .sources
            .resolve(reference, ctx.working_dir())
            .map_err(open_failed)?;
        let (root, inner) = split_fs_mux_url(&source.url);

        let fsys = ctx
            .provider()?
            .lookup(&root)
            .map_err(|e| DataFsError::SubSourceUnavailable {
                name: name.to_string(),
                index,
                reference: reference.to_string(),
                url: source.url.to_string(),
                source: Box::new(e),
            })?;
        let fsys = with_context_fs(ctx, fsys);
        let fsys = with_headers_fs(&source.headers, fsys);
        let fsys = with_http_client_fs(self.http_client.clone(), fsys);
        let fsys = with_sources_fs(self.sources.clone(), fsys);

        tracing::trace!(index, reference, root = %root, name = %inner, "Opening merge part");

        let file = fsys.open(&inner).map_err(open_failed)?;

        Ok(MergePart {
            index,
            reference: reference.to_string(),
            name: inner,
            media_type: source.media_type,
            file: Some(file),
        })
    }
}

impl DataFs for MergeFs {
    fn open(&self, name: &str) -> DataFsResult<Box<dyn DataFile>> {
        let references: Vec<&str> = name
            .split(PART_SEPARATOR)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if references.len() < 2 {
            return Err(DataFsError::InsufficientSources {
                name: name.to_string(),
            });
        }

        self.ctx.provider()?;
        let ctx = self.enter(name, &references)?;
        tracing::debug!(name, parts = references.len(), "Opening merge");

        let mut parts = Vec::with_capacity(references.len());
        for (index, reference) in references.iter().enumerate() {
            match self.open_part(&ctx, name, index, reference) {
                Ok(part) => parts.push(part),
                Err(e) => {
                    close_quietly(name, &mut parts);
                    return Err(e);
                }
            }
        }

        Ok(Box::new(MergeFile {
            name: name.to_string(),
            parts,
            state: MergeState::Pending,
            ctx: self.ctx.clone(),
            codec: self.codec.clone(),
        }))
    }

    fn with_context(&self, ctx: &FsContext) -> Option<Arc<dyn DataFs>> {
        Some(Arc::new(Self {
            ctx: ctx.clone(),
            ..self.clone()
        }))
    }

    fn with_http_client(&self, client: Arc<dyn HttpClient>) -> Option<Arc<dyn DataFs>> {
        Some(Arc::new(Self {
            http_client: Some(client),
            ..self.clone()
        }))
    }

    fn with_sources(&self, sources: Arc<SourceTable>) -> Option<Arc<dyn DataFs>> {
        Some(Arc::new(Self {
            sources,
            ..self.clone()
        }))
    }
}

/// An opened part of a merge
struct MergePart {
    index: usize,
    reference: String,
    /// Name opened on the part's filesystem
    name: String,
    media_type: Option<String>,
    file: Option<Box<dyn DataFile>>,
}

impl MergePart {
    fn read_failed(&self, merge_name: &str, err: DataFsError) -> DataFsError {
        DataFsError::SubSourceReadFailed {
            name: merge_name.to_string(),
            index: self.index,
            reference: self.reference.clone(),
            source: Box::new(err),
        }
    }

    /// Read and decode this part into an object.
    fn decode(
        &mut self,
        merge_name: &str,
        ctx: &FsContext,
        codec: &dyn Codec,
    ) -> DataFsResult<Map<String, Value>> {
        ctx.check().map_err(|e| self.read_failed(merge_name, e))?;
        let Some(file) = self.file.as_mut() else {
            return Err(self.read_failed(
                merge_name,
                DataFsError::Io {
                    path: self.name.clone(),
                    source: io::Error::other("file already closed"),
                },
            ));
        };
        let (data, info) =
            read_open_file(file.as_mut(), &self.name).map_err(|e| self.read_failed(merge_name, e))?;
        ctx.check().map_err(|e| self.read_failed(merge_name, e))?;

        let content_type = select_content_type(
            self.media_type.as_deref(),
            info.content_type.as_deref(),
            &self.name,
        );
        tracing::trace!(
            index = self.index,
            reference = %self.reference,
            content_type = %content_type,
            bytes = data.len(),
            "Decoding merge part"
        );

        let value = codec
            .decode(&content_type, &data)
            .map_err(|e| self.read_failed(merge_name, e))?;
        match value {
            Value::Object(map) => Ok(map),
            other => Err(DataFsError::UnmergeableType {
                index: self.index,
                reference: self.reference.clone(),
                content_type,
                found: type_name(&other),
            }),
        }
    }

    fn close(&mut self) -> DataFsResult<()> {
        match self.file.take() {
            Some(mut file) => file.close(),
            None => Ok(()),
        }
    }
}

enum MergeState {
    Pending,
    Ready { data: Cursor<Vec<u8>>, info: FileInfo },
    Failed(String),
    Closed,
}

/// A merged document.
pub struct MergeFile {
    name: String,
    parts: Vec<MergePart>,
    state: MergeState,
    ctx: FsContext,
    codec: Arc<dyn Codec>,
}

impl MergeFile {
    fn materialize(&mut self) -> DataFsResult<()> {
        if !matches!(self.state, MergeState::Pending) {
            return Ok(());
        }
        match self.merge_parts() {
            Ok((data, info)) => {
                tracing::debug!(name = %self.name, bytes = data.len(), "Merged datasources");
                self.state = MergeState::Ready {
                    data: Cursor::new(data),
                    info,
                };
                Ok(())
            }
            Err(e) => {
                close_quietly(&self.name, &mut self.parts);
                self.state = MergeState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    fn merge_parts(&mut self) -> DataFsResult<(Vec<u8>, FileInfo)> {
        let mut objects = Vec::with_capacity(self.parts.len());
        for part in &mut self.parts {
            objects.push(part.decode(&self.name, &self.ctx, self.codec.as_ref())?);
        }

        let merged = merge_objects(&objects);
        let (data, content_type) = self.codec.encode(&Value::Object(merged))?;
        let info = FileInfo::file(self.name.clone(), data.len() as u64)
            .with_content_type(content_type);
        Ok((data, info))
    }

    fn unavailable(&self) -> Option<DataFsError> {
        match &self.state {
            MergeState::Failed(message) => Some(DataFsError::Io {
                path: self.name.clone(),
                source: io::Error::other(message.clone()),
            }),
            MergeState::Closed => Some(DataFsError::Io {
                path: self.name.clone(),
                source: io::Error::other("file already closed"),
            }),
            MergeState::Pending | MergeState::Ready { .. } => None,
        }
    }
}

impl Read for MergeFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.unavailable() {
            return Err(err.into());
        }
        self.materialize()?;
        match &mut self.state {
            MergeState::Ready { data, .. } => data.read(buf),
            _ => Ok(0),
        }
    }
}

impl DataFile for MergeFile {
    fn stat(&mut self) -> DataFsResult<FileInfo> {
        if let Some(err) = self.unavailable() {
            return Err(err);
        }
        self.materialize()?;
        match &self.state {
            MergeState::Ready { info, .. } => Ok(info.clone()),
            _ => Err(DataFsError::NotImplemented {
                op: "stat",
                path: self.name.clone(),
            }),
        }
    }

    fn close(&mut self) -> DataFsResult<()> {
        if matches!(self.state, MergeState::Closed) {
            return Ok(());
        }
        self.state = MergeState::Closed;

        let errors: Vec<DataFsError> = self
            .parts
            .iter_mut()
            .filter_map(|part| part.close().err())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DataFsError::Close {
                name: self.name.clone(),
                errors,
            })
        }
    }
}

impl Drop for MergeFile {
    fn drop(&mut self) {
        close_quietly(&self.name, &mut self.parts);
    }
}

impl std::fmt::Debug for MergeFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            MergeState::Pending => "pending",
            MergeState::Ready { .. } => "ready",
            MergeState::Failed(_) => "failed",
            MergeState::Closed => "closed",
        };
        f.debug_struct("MergeFile")
            .field("name", &self.name)
            .field("parts", &self.parts.len())
            .field("state", &state)
            .finish()
    }
}

/// Close every part still open, logging failures.
fn close_quietly(name: &str, parts: &mut [MergePart]) {
    for part in parts.iter_mut() {
        if let Err(e) = part.close() {
            tracing::warn!(name, index = part.index, error = %e, "Failed to close merge part");
        }
    }
}
