/*
 * urls.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Source URL parsing and filesystem root splitting.
 */

//! Source URL helpers.
//!
//! A data source reference is either a scheme-qualified URL
//! (`https://example.com/data.json`, `merge:a|b`) or a bare filesystem path
//! (`./data.yaml`, `/etc/app/config.json`), which becomes a `file:` URL.
//!
//! Dispatch happens on a *filesystem root* URL, and the remainder of the
//! location is the name opened on that filesystem; [`split_fs_mux_url`]
//! performs that split.

use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::{DataFsError, DataFsResult};

/// Schemes whose path carries `repo//path-in-repo`.
const GIT_SCHEMES: &[&str] = &["git", "git+file", "git+http", "git+https", "git+ssh"];

/// Whether `scheme` belongs to the git family.
pub fn is_git_scheme(scheme: &str) -> bool {
    GIT_SCHEMES.contains(&scheme)
}

/// Parse a source reference, resolving bare relative paths against the
/// process working directory.
pub fn parse_source_url(value: &str) -> DataFsResult<Url> {
    let cwd = std::env::current_dir().map_err(|e| DataFsError::InvalidSourceReference {
        reference: value.to_string(),
        reason: format!("cannot determine working directory: {}", e),
    })?;
    parse_source_url_in(value, &cwd)
}

/// Parse a source reference, resolving bare relative paths against `base`.
pub fn parse_source_url_in(value: &str, base: &Path) -> DataFsResult<Url> {
    let invalid = |reason: String| DataFsError::InvalidSourceReference {
        reference: value.to_string(),
        reason,
    };

    if value.trim().is_empty() {
        return Err(invalid("empty source reference".to_string()));
    }

    match Url::parse(value) {
        // A one-letter scheme is a Windows drive letter, not a URL
        Ok(url) if url.scheme().len() > 1 => Ok(url),
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => file_url_for_path(value, base),
        Err(e) => Err(invalid(e.to_string())),
    }
}

fn file_url_for_path(value: &str, base: &Path) -> DataFsResult<Url> {
    let (path_part, query) = match value.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (value, None),
    };

    let path = Path::new(path_part);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    let absolute = clean_path(&absolute);

    let is_dir = path_part.ends_with('/') || path_part.ends_with(std::path::MAIN_SEPARATOR);
    let url = if is_dir {
        Url::from_directory_path(&absolute)
    } else {
        Url::from_file_path(&absolute)
    };
    let mut url = url.map_err(|()| DataFsError::InvalidSourceReference {
        reference: value.to_string(),
        reason: format!("{} is not an absolute path", absolute.display()),
    })?;

    if let Some(query) = query {
        url.set_query(Some(query));
    }
    Ok(url)
}

/// Lexically remove `.` and `..` components.
fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

/// Normalize a URL to the root of the filesystem that serves it.
///
/// Git URLs keep the repository part (everything before `//`); URLs without
/// a base are reduced to `<scheme>:`; every other URL is rooted at `/`.
pub fn fs_root_url(url: &Url) -> Url {
    let mut root = url.clone();
    if is_git_scheme(url.scheme()) {
        let repo = match url.path().split_once("//") {
            Some((repo, _)) => repo.to_string(),
            None => url.path().to_string(),
        };
        root.set_path(&repo);
    } else if url.cannot_be_a_base() {
        root.set_path("");
        root.set_query(None);
    } else {
        root.set_path("/");
    }
    root.set_fragment(None);
    root
}

/// Split a source URL into the filesystem root to dispatch on and the name
/// to open on that filesystem.
///
/// - `file:///tmp/a.json` → (`file:///`, `tmp/a.json`)
/// - `file:///tmp/` → (`file:///tmp/`, `.`)
/// - `https://example.com/data/a.json?x=1` → (`https://example.com/?x=1`, `data/a.json`)
/// - `git+https://host/repo//dir/f.yaml` → (`git+https://host/repo`, `dir/f.yaml`)
/// - `merge:a|b` → (`merge:`, `a|b`)
pub fn split_fs_mux_url(url: &Url) -> (Url, String) {
    let mut root = url.clone();
    root.set_fragment(None);

    if is_git_scheme(url.scheme()) {
        let (repo, inner) = url.path().split_once("//").unwrap_or((url.path(), ""));
        let repo = repo.to_string();
        let inner = inner.trim_matches('/');
        let name = if inner.is_empty() { "." } else { inner };
        let name = name.to_string();
        root.set_path(&repo);
        return (root, name);
    }

    if url.cannot_be_a_base() {
        let name = match url.path() {
            "" => ".".to_string(),
            path => path.to_string(),
        };
        root.set_path("");
        root.set_query(None);
        return (root, name);
    }

    let path = url.path();
    if url.scheme() == "file" {
        if path.ends_with('/') && path != "/" {
            return (root, ".".to_string());
        }
        let decoded = url
            .to_file_path()
            .map_or_else(|()| path.to_string(), |p| p.to_string_lossy().replace('\\', "/"));
        root.set_path("/");
        return (root, non_empty_name(&decoded));
    }

    let name = path.to_string();
    root.set_path("/");
    (root, non_empty_name(&name))
}

fn non_empty_name(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        ".".to_string()
    } else {
        trimmed.to_string()
    }
}
