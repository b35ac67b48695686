/*
 * reader.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * One-shot reads of data sources by alias or URL.
 */

//! One-shot data source reads.
//!
//! [`DataReader`] is the entry point for callers that want the contents of a
//! single data source: it resolves the reference against the alias table,
//! dispatches through the registry in the context, decorates the filesystem
//! with the same ambient configuration a merge part would get, and reads the
//! named resource fully.

use std::sync::Arc;

use serde_json::Value;

use crate::backend::HttpClient;
use crate::codec::{Codec, DefaultCodec, select_content_type};
use crate::context::FsContext;
use crate::error::{DataFsError, DataFsResult};
use crate::fsys::{
    read_file, with_context_fs, with_headers_fs, with_http_client_fs, with_sources_fs,
};
use crate::source::SourceTable;
use crate::urls::split_fs_mux_url;

/// Raw contents of a data source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContent {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Reads data sources through the registry in a context.
#[derive(Debug, Clone)]
pub struct DataReader {
    ctx: FsContext,
    sources: Arc<SourceTable>,
    http_client: Option<Arc<dyn HttpClient>>,
    codec: Arc<dyn Codec>,
}

impl DataReader {
    /// Create a reader dispatching through `ctx`'s registry.
    pub fn new(ctx: FsContext, sources: Arc<SourceTable>) -> Self {
        Self {
            ctx,
            sources,
            http_client: None,
            codec: Arc::new(DefaultCodec),
        }
    }

    /// Use `client` for HTTP sources, including those nested in merges.
    pub fn with_http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Decode with `codec`.
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Read the raw bytes and content type of `reference` (an alias, URL,
    /// or path).
    pub fn read(&self, reference: &str) -> DataFsResult<SourceContent> {
        self.ctx.check()?;
        let source = self.sources.resolve(reference, self.ctx.working_dir())?;
        let (root, name) = split_fs_mux_url(&source.url);
        tracing::debug!(reference, url = %source.url, "Reading datasource");

        let fsys = self.ctx.provider()?.lookup(&root)?;
        let fsys = with_context_fs(&self.ctx, fsys);
        let fsys = with_headers_fs(&source.headers, fsys);
        let fsys = with_http_client_fs(self.http_client.clone(), fsys);
        let fsys = with_sources_fs(self.sources.clone(), fsys);

        let (data, info) = read_file(fsys.as_ref(), &name)?;
        let content_type = select_content_type(
            source.media_type.as_deref(),
            info.content_type.as_deref(),
            &name,
        );
        Ok(SourceContent { data, content_type })
    }

    /// Read `reference` and decode it according to its content type.
    pub fn read_value(&self, reference: &str) -> DataFsResult<Value> {
        let content = self.read(reference)?;
        self.codec.decode(&content.content_type, &content.data)
    }

    /// Read `reference` as UTF-8 text.
    pub fn read_string(&self, reference: &str) -> DataFsResult<String> {
        let content = self.read(reference)?;
        String::from_utf8(content.data).map_err(|e| DataFsError::Decode {
            content_type: content.content_type,
            message: e.to_string(),
        })
    }
}
