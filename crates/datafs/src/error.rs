/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Error types for data filesystem operations.
 */

//! Error types for data filesystem operations.
//!
//! Every failure surfaced by this crate is a [`DataFsError`]. Wrapping
//! variants keep the underlying cause (reachable through
//! [`DataFsError::cause`]) and only add diagnostic context such as the open
//! name, the scheme, or the offending merge part.

use std::io;

use thiserror::Error;

/// Result type for data filesystem operations
pub type DataFsResult<T> = Result<T, DataFsError>;

/// Classification of a [`DataFsError`], independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoProviderInContext,
    UnsupportedScheme,
    ProviderUnavailable,
    InsufficientSources,
    InvalidSourceReference,
    SubSourceUnavailable,
    SubSourceOpenFailed,
    SubSourceReadFailed,
    UnmergeableType,
    UnsupportedContentType,
    Decode,
    Encode,
    NotFound,
    InvalidPath,
    NotImplemented,
    Cancelled,
    DeadlineExceeded,
    Io,
    Http,
    Close,
    Config,
}

/// Errors that can occur while resolving, opening, or reading data sources
#[derive(Debug, Error)]
pub enum DataFsError {
    /// The ambient context carries no scheme registry
    #[error("no filesystem provider in context")]
    NoProviderInContext,

    /// No provider is registered for the scheme
    #[error("no filesystem registered for scheme {scheme:?}")]
    UnsupportedScheme { scheme: String },

    /// A provider was found but could not construct a filesystem
    #[error("filesystem provider for {path:?} unavailable: {source}")]
    ProviderUnavailable {
        path: String,
        #[source]
        source: Box<DataFsError>,
    },

    /// A merge name lists fewer than two sources
    #[error("open {name}: need at least 2 datasources to merge")]
    InsufficientSources { name: String },

    /// A merge part is neither a known alias nor a parseable URL or path
    #[error("invalid source reference {reference:?}: {reason}")]
    InvalidSourceReference { reference: String, reason: String },

    /// The filesystem for a merge part could not be obtained
    #[error("open {name}: lookup for merge part {index} ({url}): {source}")]
    SubSourceUnavailable {
        name: String,
        index: usize,
        reference: String,
        url: String,
        #[source]
        source: Box<DataFsError>,
    },

    /// A merge part could not be opened on its filesystem
    #[error("open {name}: opening merge part {index} {reference:?}: {source}")]
    SubSourceOpenFailed {
        name: String,
        index: usize,
        reference: String,
        #[source]
        source: Box<DataFsError>,
    },

    /// A merge part could not be read or decoded
    #[error("read {name}: merge part {index} {reference:?}: {source}")]
    SubSourceReadFailed {
        name: String,
        index: usize,
        reference: String,
        #[source]
        source: Box<DataFsError>,
    },

    /// A merge part decoded to something other than an object
    #[error(
        "merge part {index} {reference:?} (type {content_type}): can only merge maps, got {found}"
    )]
    UnmergeableType {
        index: usize,
        reference: String,
        content_type: String,
        found: &'static str,
    },

    /// No codec handles the content type
    #[error("unsupported content type {content_type:?}")]
    UnsupportedContentType { content_type: String },

    /// The codec rejected the data
    #[error("failed to decode {content_type} data: {message}")]
    Decode {
        content_type: String,
        message: String,
    },

    /// The codec could not serialize a value
    #[error("failed to encode data: {message}")]
    Encode { message: String },

    /// The named file does not exist
    #[error("open {path}: file does not exist")]
    NotFound { path: String },

    /// The name is not a valid slash-separated relative path
    #[error("open {path}: invalid path")]
    InvalidPath { path: String },

    /// The operation is not supported by this entity
    #[error("{op} {path}: not implemented")]
    NotImplemented { op: &'static str, path: String },

    /// The ambient cancellation token was triggered
    #[error("operation cancelled")]
    Cancelled,

    /// The ambient deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// I/O error on a named resource
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// HTTP transport failure or non-success status
    #[error("HTTP request for {url} failed: {message}")]
    Http { url: String, message: String },

    /// One or more handles failed to close
    #[error("close {name}: {}", join_errors(.errors))]
    Close {
        name: String,
        errors: Vec<DataFsError>,
    },

    /// Data source configuration is invalid
    #[error("invalid datasource configuration: {message}")]
    Config { message: String },
}

fn join_errors(errors: &[DataFsError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DataFsError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataFsError::NoProviderInContext => ErrorKind::NoProviderInContext,
            DataFsError::UnsupportedScheme { .. } => ErrorKind::UnsupportedScheme,
            DataFsError::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            DataFsError::InsufficientSources { .. } => ErrorKind::InsufficientSources,
            DataFsError::InvalidSourceReference { .. } => ErrorKind::InvalidSourceReference,
            DataFsError::SubSourceUnavailable { .. } => ErrorKind::SubSourceUnavailable,
            DataFsError::SubSourceOpenFailed { .. } => ErrorKind::SubSourceOpenFailed,
            DataFsError::SubSourceReadFailed { .. } => ErrorKind::SubSourceReadFailed,
            DataFsError::UnmergeableType { .. } => ErrorKind::UnmergeableType,
            DataFsError::UnsupportedContentType { .. } => ErrorKind::UnsupportedContentType,
            DataFsError::Decode { .. } => ErrorKind::Decode,
            DataFsError::Encode { .. } => ErrorKind::Encode,
            DataFsError::NotFound { .. } => ErrorKind::NotFound,
            DataFsError::InvalidPath { .. } => ErrorKind::InvalidPath,
            DataFsError::NotImplemented { .. } => ErrorKind::NotImplemented,
            DataFsError::Cancelled => ErrorKind::Cancelled,
            DataFsError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            DataFsError::Io { .. } => ErrorKind::Io,
            DataFsError::Http { .. } => ErrorKind::Http,
            DataFsError::Close { .. } => ErrorKind::Close,
            DataFsError::Config { .. } => ErrorKind::Config,
        }
    }

    /// The wrapped [`DataFsError`], if this variant wraps one.
    pub fn cause(&self) -> Option<&DataFsError> {
        match self {
            DataFsError::ProviderUnavailable { source, .. }
            | DataFsError::SubSourceUnavailable { source, .. }
            | DataFsError::SubSourceOpenFailed { source, .. }
            | DataFsError::SubSourceReadFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Check whether this error, or any error it wraps, has the given kind.
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        let mut current = Some(self);
        while let Some(err) = current {
            if err.kind() == kind {
                return true;
            }
            current = err.cause();
        }
        false
    }

    /// The innermost wrapped error.
    pub fn root_cause(&self) -> &DataFsError {
        let mut current = self;
        while let Some(next) = current.cause() {
            current = next;
        }
        current
    }

    /// Index of the merge part this error is attributed to, if any.
    pub fn part_index(&self) -> Option<usize> {
        match self {
            DataFsError::SubSourceUnavailable { index, .. }
            | DataFsError::SubSourceOpenFailed { index, .. }
            | DataFsError::SubSourceReadFailed { index, .. }
            | DataFsError::UnmergeableType { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Convert an I/O error on `path`, unwrapping a [`DataFsError`] that was
    /// smuggled through [`std::io::Read`].
    pub fn from_io(path: impl Into<String>, err: io::Error) -> Self {
        let path = path.into();
        if err.kind() == io::ErrorKind::NotFound && err.get_ref().is_none() {
            return DataFsError::NotFound { path };
        }
        if err.get_ref().is_some_and(|inner| inner.is::<DataFsError>()) {
            return match err.into_inner().map(|inner| inner.downcast::<DataFsError>()) {
                Some(Ok(inner)) => *inner,
                Some(Err(other)) => DataFsError::Io {
                    path,
                    source: io::Error::other(other),
                },
                None => DataFsError::Io {
                    path,
                    source: io::Error::other("unknown I/O failure"),
                },
            };
        }
        DataFsError::Io { path, source: err }
    }

    /// Whether this error stems from cancellation or an expired deadline.
    pub fn is_cancellation(&self) -> bool {
        self.has_kind(ErrorKind::Cancelled) || self.has_kind(ErrorKind::DeadlineExceeded)
    }
}

impl From<DataFsError> for io::Error {
    fn from(err: DataFsError) -> Self {
        match err {
            DataFsError::Io { source, .. } => source,
            DataFsError::NotFound { .. } => io::Error::new(io::ErrorKind::NotFound, err),
            other => io::Error::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_walks_wrapped_errors() {
        let err = DataFsError::SubSourceUnavailable {
            name: "a|b".to_string(),
            index: 1,
            reference: "b".to_string(),
            url: "bad:///b".to_string(),
            source: Box::new(DataFsError::UnsupportedScheme {
                scheme: "bad".to_string(),
            }),
        };

        assert_eq!(err.kind(), ErrorKind::SubSourceUnavailable);
        assert!(err.has_kind(ErrorKind::UnsupportedScheme));
        assert!(!err.has_kind(ErrorKind::NotFound));
        assert_eq!(err.root_cause().kind(), ErrorKind::UnsupportedScheme);
        assert_eq!(err.part_index(), Some(1));
    }

    #[test]
    fn test_display_includes_context() {
        let err = DataFsError::SubSourceOpenFailed {
            name: "x|y".to_string(),
            index: 0,
            reference: "x".to_string(),
            source: Box::new(DataFsError::NotFound {
                path: "x".to_string(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("x|y"));
        assert!(msg.contains("opening merge part 0 \"x\""));
        assert!(msg.contains("file does not exist"));
    }

    #[test]
    fn test_close_error_joins_messages() {
        let err = DataFsError::Close {
            name: "a|b".to_string(),
            errors: vec![
                DataFsError::Http {
                    url: "http://example.com/a".to_string(),
                    message: "reset".to_string(),
                },
                DataFsError::Cancelled,
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("close a|b: "));
        assert!(msg.contains("reset; operation cancelled"));
    }

    #[test]
    fn test_io_round_trip_keeps_datafs_error() {
        let io_err: io::Error = DataFsError::UnmergeableType {
            index: 2,
            reference: "array".to_string(),
            content_type: "application/json".to_string(),
            found: "array",
        }
        .into();

        let back = DataFsError::from_io("merge", io_err);
        assert_eq!(back.kind(), ErrorKind::UnmergeableType);
        assert_eq!(back.part_index(), Some(2));
    }

    #[test]
    fn test_plain_not_found_maps_to_not_found() {
        let io_err = io::Error::from(io::ErrorKind::NotFound);
        let err = DataFsError::from_io("tmp/missing.json", io_err);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
