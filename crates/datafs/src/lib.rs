/*
 * datafs
 * Copyright (c) 2025 Posit, PBC
 *
 * Scheme-routed virtual filesystem for data sources.
 *
 * Data sources are addressed by URL. A scheme registry (FsMux) maps each
 * scheme to a filesystem provider:
 *
 * - file: local disk (LocalFs)
 * - http, https: remote resources fetched with reqwest (HttpFs)
 * - merge: a synthetic filesystem whose files are deep merges of other
 *   sources (MergeFs)
 *
 * Ambient configuration (registry, cancellation, deadline, HTTP transport,
 * headers, alias table) reaches nested filesystems through immutable
 * decorators rather than global state.
 */

pub mod backend;
pub mod cancellation;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod fsys;
pub mod merge;
pub mod mux;
pub mod reader;
pub mod source;
pub mod urls;

// Re-export core types (API surface)
pub use backend::{HttpClient, HttpFs, HttpResponse, LocalFs, MemFs, ReqwestClient};
pub use cancellation::Cancellation;
pub use codec::{Codec, DefaultCodec, MediaType};
pub use config::{DataFsConfig, load_sources, parse_sources};
pub use context::FsContext;
pub use error::{DataFsError, DataFsResult, ErrorKind};
pub use fsys::{DataFile, DataFs, FileInfo, read_file};
pub use merge::{MergeFile, MergeFs, merge_objects, merge_pair};
pub use mux::{FsMux, FsProvider, FsProviderFn, fsys_for_path, wrapped_fs_provider};
pub use reader::{DataReader, SourceContent};
pub use source::{Headers, Source, SourceTable};
pub use urls::{parse_source_url, split_fs_mux_url};

/// Create a registry with the built-in `file`, `http`, `https` and `merge`
/// providers.
pub fn default_mux() -> FsMux {
    FsMux::new()
        .with(LocalFs::provider())
        .with(HttpFs::provider())
        .with(MergeFs::provider())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mux_schemes() {
        let mux = default_mux();
        assert_eq!(mux.schemes(), vec!["file", "http", "https", "merge"]);
        assert!(mux.supports("merge"));
        assert!(!mux.supports("git"));
    }
}
