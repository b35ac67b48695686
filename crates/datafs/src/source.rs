/*
 * source.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Data source descriptors and the alias table.
 */

//! Data source descriptors.
//!
//! A [`Source`] binds an optional alias to a URL, optional HTTP headers, and
//! an optional media type override. A [`SourceTable`] maps aliases to
//! sources; it is built once while loading configuration and shared
//! read-only (behind an `Arc`) by every filesystem that needs to resolve
//! aliases.

use std::collections::BTreeMap;
use std::path::Path;

use url::Url;

use crate::error::{DataFsError, DataFsResult};
use crate::urls::{parse_source_url, parse_source_url_in};

/// HTTP headers: header name to list of values.
pub type Headers = BTreeMap<String, Vec<String>>;

/// Query parameter that declares a source's media type.
const TYPE_QUERY_PARAM: &str = "type";

/// A data source descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Unique name within a [`SourceTable`]
    pub alias: Option<String>,
    /// Location of the data
    pub url: Url,
    /// HTTP headers sent when fetching (HTTP-family schemes only)
    pub headers: Headers,
    /// Explicit media type, overriding what the provider reports
    pub media_type: Option<String>,
}

impl Source {
    /// Create a source for `url`. A `type` query parameter on the URL
    /// becomes the media type override.
    pub fn new(url: Url) -> Self {
        let media_type = url
            .query_pairs()
            .find(|(key, _)| key == TYPE_QUERY_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty());
        Self {
            alias: None,
            url,
            headers: Headers::new(),
            media_type,
        }
    }

    /// Parse a literal reference (URL or path). Relative paths resolve
    /// against `base`, or the process working directory when `None`.
    pub fn parse(reference: &str, base: Option<&Path>) -> DataFsResult<Self> {
        let url = match base {
            Some(base) => parse_source_url_in(reference, base)?,
            None => parse_source_url(reference)?,
        };
        Ok(Self::new(url))
    }

    /// Set the alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Add a header value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Replace all headers.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Set the media type override.
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }
}

/// Alias table: alias to [`Source`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTable {
    sources: BTreeMap<String, Source>,
}

impl SourceTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source. The source must carry an alias that is not yet taken.
    pub fn insert(&mut self, source: Source) -> DataFsResult<()> {
        let Some(alias) = source.alias.clone() else {
            return Err(DataFsError::Config {
                message: format!("source {} has no alias", source.url),
            });
        };
        if self.sources.contains_key(&alias) {
            return Err(DataFsError::Config {
                message: format!("duplicate datasource alias {:?}", alias),
            });
        }
        self.sources.insert(alias, source);
        Ok(())
    }

    /// Builder form of [`SourceTable::insert`].
    pub fn with_source(mut self, source: Source) -> DataFsResult<Self> {
        self.insert(source)?;
        Ok(self)
    }

    /// Look up a source by alias.
    pub fn get(&self, alias: &str) -> Option<&Source> {
        self.sources.get(alias)
    }

    /// Resolve a reference: a known alias, otherwise a literal URL or path.
    pub fn resolve(&self, reference: &str, base: Option<&Path>) -> DataFsResult<Source> {
        if let Some(source) = self.get(reference) {
            return Ok(source.clone());
        }
        Source::parse(reference, base)
    }

    /// Registered aliases, sorted.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_type_query_param_sets_media_type() {
        let source = Source::new(url("file:///tmp/array.json?type=application%2Farray%2Bjson"));
        assert_eq!(source.media_type.as_deref(), Some("application/array+json"));

        let source = Source::new(url("file:///tmp/a.json"));
        assert_eq!(source.media_type, None);
    }

    #[test]
    fn test_headers_accumulate() {
        let source = Source::new(url("https://example.com/a.json"))
            .with_header("Accept", "application/json")
            .with_header("Accept", "application/yaml");
        assert_eq!(source.headers["Accept"].len(), 2);
    }

    #[test]
    fn test_table_rejects_duplicate_alias() {
        let mut table = SourceTable::new();
        table
            .insert(Source::new(url("file:///a.json")).with_alias("a"))
            .unwrap();
        let err = table
            .insert(Source::new(url("file:///b.json")).with_alias("a"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(table.get("a").unwrap().url.as_str(), "file:///a.json");
    }

    #[test]
    fn test_table_rejects_missing_alias() {
        let err = SourceTable::new()
            .insert(Source::new(url("file:///a.json")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_resolve_alias_and_literal_agree() {
        let table = SourceTable::new()
            .with_source(Source::new(url("file:///tmp/a.json")).with_alias("a"))
            .unwrap();

        let by_alias = table.resolve("a", None).unwrap();
        let by_url = table.resolve("file:///tmp/a.json", None).unwrap();
        assert_eq!(by_alias.url, by_url.url);
        assert_eq!(by_alias.media_type, by_url.media_type);
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_relative_path() {
        let table = SourceTable::new();
        let source = table.resolve("./a.json", Some(Path::new("/work"))).unwrap();
        assert_eq!(source.url.as_str(), "file:///work/a.json");
        assert_eq!(source.alias, None);
    }
}
