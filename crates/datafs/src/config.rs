/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Loading the datasource alias table from YAML.
 */

//! Datasource configuration.
//!
//! Aliases are declared in YAML:
//!
//! ```yaml
//! datasources:
//!   defaults:
//!     url: ./defaults.yaml
//!   overrides:
//!     url: https://example.com/overrides.json
//!     header:
//!       Authorization: ["Bearer abc123"]
//!   settings:
//!     url: merge:overrides|defaults
//!   legacy:
//!     url: ./legacy.txt
//!     type: application/json
//! ```
//!
//! Relative paths resolve against the directory holding the configuration
//! file (or the base directory given to [`parse_sources`]).

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{DataFsError, DataFsResult};
use crate::source::{Headers, Source, SourceTable};

/// Top-level configuration document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataFsConfig {
    #[serde(default)]
    pub datasources: BTreeMap<String, DataSourceConfig>,
}

/// One `datasources:` entry
#[derive(Debug, Clone, Deserialize)]
pub struct DataSourceConfig {
    pub url: String,
    #[serde(default)]
    pub header: Headers,
    #[serde(default, rename = "type")]
    pub media_type: Option<String>,
}

impl DataFsConfig {
    /// Build the alias table, resolving relative paths against `base`.
    pub fn into_sources(self, base: &Path) -> DataFsResult<SourceTable> {
        let mut table = SourceTable::new();
        for (alias, entry) in self.datasources {
            if alias.contains('|') {
                return Err(DataFsError::Config {
                    message: format!("alias {:?} must not contain '|'", alias),
                });
            }
            let mut source = Source::parse(&entry.url, Some(base))?
                .with_alias(alias.as_str())
                .with_headers(entry.header);
            if let Some(media_type) = entry.media_type {
                source = source.with_media_type(media_type);
            }
            tracing::debug!(alias = %alias, url = %source.url, "Registered datasource");
            table.insert(source)?;
        }
        Ok(table)
    }
}

/// Parse a YAML configuration document into an alias table.
pub fn parse_sources(yaml: &str, base: &Path) -> DataFsResult<SourceTable> {
    let config: DataFsConfig = serde_yaml::from_str(yaml).map_err(|e| DataFsError::Config {
        message: e.to_string(),
    })?;
    config.into_sources(base)
}

/// Load an alias table from a YAML file. Relative paths resolve against the
/// file's directory.
pub fn load_sources(path: &Path) -> DataFsResult<SourceTable> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| DataFsError::from_io(path.display().to_string(), e))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let base = if base.as_os_str().is_empty() {
        std::env::current_dir().map_err(|e| DataFsError::from_io(".", e))?
    } else {
        std::path::absolute(base).map_err(|e| DataFsError::from_io(base.display().to_string(), e))?
    };
    parse_sources(&content, &base).map_err(|e| match e {
        DataFsError::Config { message } => DataFsError::Config {
            message: format!("{}: {}", path.display(), message),
        },
        other => other,
    })
}
