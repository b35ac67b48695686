/*
 * codec.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Structured-data codecs keyed by content type.
 */

//! Structured-data codecs.
//!
//! The merge filesystem only needs two capabilities: decode bytes of a given
//! content type into a structured [`Value`], and encode a value back into
//! bytes. [`Codec`] is that seam; [`DefaultCodec`] decodes JSON, YAML, TOML
//! and dotenv data, and always encodes YAML. Map keys are kept in a
//! `BTreeMap`, so encoding is deterministic.

use serde_json::{Map, Value};

use crate::error::{DataFsError, DataFsResult};

pub const JSON_MIMETYPE: &str = "application/json";
pub const JSON_ARRAY_MIMETYPE: &str = "application/array+json";
pub const YAML_MIMETYPE: &str = "application/yaml";
pub const TOML_MIMETYPE: &str = "application/toml";
pub const ENV_MIMETYPE: &str = "application/x-env";
pub const CSV_MIMETYPE: &str = "text/csv";
pub const TEXT_MIMETYPE: &str = "text/plain";

/// Content types this crate knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Json,
    JsonArray,
    Yaml,
    Toml,
    Env,
    Csv,
    Text,
}

impl MediaType {
    /// Parse a content type, ignoring parameters (`; charset=...`) and case.
    ///
    /// Structured-syntax suffixes are honoured, so
    /// `application/vnd.api+json` is JSON.
    pub fn parse(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            JSON_MIMETYPE | "text/json" => Some(MediaType::Json),
            JSON_ARRAY_MIMETYPE => Some(MediaType::JsonArray),
            YAML_MIMETYPE | "application/x-yaml" | "text/yaml" | "text/x-yaml" => {
                Some(MediaType::Yaml)
            }
            TOML_MIMETYPE | "text/toml" => Some(MediaType::Toml),
            ENV_MIMETYPE => Some(MediaType::Env),
            CSV_MIMETYPE => Some(MediaType::Csv),
            TEXT_MIMETYPE => Some(MediaType::Text),
            other if other.ends_with("+json") => Some(MediaType::Json),
            other if other.ends_with("+yaml") => Some(MediaType::Yaml),
            _ => None,
        }
    }

    /// Infer a media type from the extension of a slash-separated name.
    pub fn from_extension(name: &str) -> Option<Self> {
        let base = name.rsplit('/').next().unwrap_or(name);
        let (_, ext) = base.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(MediaType::Json),
            "yaml" | "yml" => Some(MediaType::Yaml),
            "toml" => Some(MediaType::Toml),
            "env" => Some(MediaType::Env),
            "csv" => Some(MediaType::Csv),
            "txt" => Some(MediaType::Text),
            _ => None,
        }
    }

    /// The canonical content type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Json => JSON_MIMETYPE,
            MediaType::JsonArray => JSON_ARRAY_MIMETYPE,
            MediaType::Yaml => YAML_MIMETYPE,
            MediaType::Toml => TOML_MIMETYPE,
            MediaType::Env => ENV_MIMETYPE,
            MediaType::Csv => CSV_MIMETYPE,
            MediaType::Text => TEXT_MIMETYPE,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the content type for a fetched resource: the declared type, then the
/// type the provider reported, then the type implied by the name's
/// extension, then `text/plain`.
pub fn select_content_type(declared: Option<&str>, reported: Option<&str>, name: &str) -> String {
    declared
        .or(reported)
        .or_else(|| MediaType::from_extension(name).map(|media_type| media_type.as_str()))
        .unwrap_or(TEXT_MIMETYPE)
        .to_string()
}

/// Decode and encode structured data.
pub trait Codec: Send + Sync + std::fmt::Debug {
    /// Decode `data` of the given content type.
    fn decode(&self, content_type: &str, data: &[u8]) -> DataFsResult<Value>;

    /// Encode `value`, returning the bytes and their content type. Equal
    /// inputs must produce identical bytes.
    fn encode(&self, value: &Value) -> DataFsResult<(Vec<u8>, String)>;
}

/// JSON/YAML/TOML/dotenv decoding, YAML encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCodec;

impl Codec for DefaultCodec {
    fn decode(&self, content_type: &str, data: &[u8]) -> DataFsResult<Value> {
        let media_type = MediaType::parse(content_type).ok_or_else(|| {
            DataFsError::UnsupportedContentType {
                content_type: content_type.to_string(),
            }
        })?;
        let decode_err = |message: String| DataFsError::Decode {
            content_type: media_type.as_str().to_string(),
            message,
        };

        match media_type {
            MediaType::Json => serde_json::from_slice(data).map_err(|e| decode_err(e.to_string())),
            MediaType::JsonArray => {
                let value: Value =
                    serde_json::from_slice(data).map_err(|e| decode_err(e.to_string()))?;
                if value.is_array() {
                    Ok(value)
                } else {
                    Err(decode_err(format!("expected an array, got {}", type_name(&value))))
                }
            }
            MediaType::Yaml => serde_yaml::from_slice(data).map_err(|e| decode_err(e.to_string())),
            MediaType::Toml => {
                let text = std::str::from_utf8(data).map_err(|e| decode_err(e.to_string()))?;
                let table: toml::Table =
                    toml::from_str(text).map_err(|e| decode_err(e.to_string()))?;
                Ok(toml_to_json(toml::Value::Table(table)))
            }
            MediaType::Env => {
                let text = std::str::from_utf8(data).map_err(|e| decode_err(e.to_string()))?;
                parse_env(text).map(Value::Object).map_err(decode_err)
            }
            MediaType::Csv | MediaType::Text => Err(DataFsError::UnsupportedContentType {
                content_type: content_type.to_string(),
            }),
        }
    }

    fn encode(&self, value: &Value) -> DataFsResult<(Vec<u8>, String)> {
        let text = serde_yaml::to_string(value).map_err(|e| DataFsError::Encode {
            message: e.to_string(),
        })?;
        Ok((text.into_bytes(), YAML_MIMETYPE.to_string()))
    }
}

/// Short name of a value's type, for diagnostics.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_to_json(value)))
                .collect(),
        ),
    }
}

/// Parse `KEY=value` lines. Blank lines and `#` comments are skipped, an
/// `export ` prefix is allowed, and matching surrounding quotes are removed.
fn parse_env(text: &str) -> Result<Map<String, Value>, String> {
    let mut vars = Map::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            return Err(format!("line {}: expected KEY=value", lineno + 1));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("line {}: empty variable name", lineno + 1));
        }
        vars.insert(key.to_string(), Value::String(unquote(value.trim()).to_string()));
    }
    Ok(vars)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_parse_media_types() {
        assert_eq!(MediaType::parse("application/json"), Some(MediaType::Json));
        assert_eq!(
            MediaType::parse("Application/JSON; charset=utf-8"),
            Some(MediaType::Json)
        );
        assert_eq!(MediaType::parse("application/vnd.api+json"), Some(MediaType::Json));
        assert_eq!(MediaType::parse("text/yaml"), Some(MediaType::Yaml));
        assert_eq!(MediaType::parse("application/array+json"), Some(MediaType::JsonArray));
        assert_eq!(MediaType::parse("foo/bar"), None);
    }

    #[test]
    fn test_media_type_from_extension() {
        assert_eq!(MediaType::from_extension("tmp/a.json"), Some(MediaType::Json));
        assert_eq!(MediaType::from_extension("b.YML"), Some(MediaType::Yaml));
        assert_eq!(MediaType::from_extension("c.toml"), Some(MediaType::Toml));
        assert_eq!(MediaType::from_extension("dir.d/noext"), None);
        assert_eq!(MediaType::from_extension("."), None);
    }

    #[test]
    fn test_content_type_precedence() {
        assert_eq!(
            select_content_type(Some("application/json"), Some("text/yaml"), "a.toml"),
            "application/json"
        );
        assert_eq!(select_content_type(None, Some("text/yaml"), "a.toml"), "text/yaml");
        assert_eq!(select_content_type(None, None, "a.toml"), TOML_MIMETYPE);
        assert_eq!(select_content_type(None, None, "noext"), TEXT_MIMETYPE);
    }

    #[test]
    fn test_decode_json_and_yaml() {
        let codec = DefaultCodec;
        assert_eq!(
            codec.decode(JSON_MIMETYPE, br#"{"hello": "world"}"#).unwrap(),
            json!({"hello": "world"})
        );
        assert_eq!(
            codec
                .decode(YAML_MIMETYPE, b"hello: earth\ngoodnight: moon\n")
                .unwrap(),
            json!({"hello": "earth", "goodnight": "moon"})
        );
    }

    #[test]
    fn test_decode_toml() {
        let value = DefaultCodec
            .decode(
                TOML_MIMETYPE,
                b"title = \"x\"\n[owner]\nborn = 1979-05-27T07:32:00Z\nage = 3\n",
            )
            .unwrap();
        assert_eq!(
            value,
            json!({"title": "x", "owner": {"born": "1979-05-27T07:32:00Z", "age": 3}})
        );
    }

    #[test]
    fn test_decode_env() {
        let value = DefaultCodec
            .decode(
                ENV_MIMETYPE,
                b"# comment\nexport FOO=bar\n\nQUOTED=\"a b\"\nSINGLE='c'\n",
            )
            .unwrap();
        assert_eq!(value, json!({"FOO": "bar", "QUOTED": "a b", "SINGLE": "c"}));

        let err = DefaultCodec.decode(ENV_MIMETYPE, b"NOVALUE\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_decode_json_array_requires_array() {
        assert!(DefaultCodec.decode(JSON_ARRAY_MIMETYPE, b"[1, 2]").is_ok());
        let err = DefaultCodec.decode(JSON_ARRAY_MIMETYPE, b"{}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_decode_unsupported_types() {
        let err = DefaultCodec.decode("foo/bar", b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedContentType);

        let err = DefaultCodec.decode(TEXT_MIMETYPE, b"plain text...").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedContentType);
    }

    #[test]
    fn test_decode_malformed_json() {
        let err = DefaultCodec.decode(JSON_MIMETYPE, b"{not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_encode_is_sorted_yaml() {
        let (bytes, content_type) = DefaultCodec
            .encode(&json!({"z": "def", "f": true, "m": {"b": "bbb", "a": "aaa"}}))
            .unwrap();
        assert_eq!(content_type, YAML_MIMETYPE);
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "f: true\nm:\n  a: aaa\n  b: bbb\nz: def\n"
        );
    }
}
