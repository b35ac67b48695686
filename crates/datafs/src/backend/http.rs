/*
 * http.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * HTTP(S) filesystem backend.
 */

//! HTTP(S) backend.
//!
//! [`HttpFs`] serves `http` and `https` URLs. Each open issues a single GET
//! through an [`HttpClient`]; the body is buffered and the response
//! `Content-Type` is reported through [`FileInfo::content_type`]. The
//! transport is swappable with [`DataFs::with_http_client`], which is how
//! tests (and callers with their own proxy or TLS setup) avoid the default
//! `reqwest` client.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use url::Url;

use crate::context::FsContext;
use crate::error::{DataFsError, DataFsResult};
use crate::fsys::{BytesFile, DataFile, DataFs, FileInfo, is_valid_path};
use crate::mux::FsProviderFn;
use crate::source::Headers;

/// Default request timeout for [`ReqwestClient`]
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A buffered HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

/// HTTP transport.
pub trait HttpClient: Send + Sync + std::fmt::Debug {
    /// Perform a GET request, failing on non-success status codes.
    fn get(&self, url: &Url, headers: &Headers) -> DataFsResult<HttpResponse>;
}

/// [`HttpClient`] backed by `reqwest`'s blocking client.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Create a client with the default timeout.
    pub fn new() -> DataFsResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> DataFsResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataFsError::Http {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &Url, headers: &Headers) -> DataFsResult<HttpResponse> {
        let http_err = |message: String| DataFsError::Http {
            url: url.to_string(),
            message,
        };

        let mut request = self.client.get(url.clone());
        for (name, values) in headers {
            for value in values {
                request = request.header(name.as_str(), value.as_str());
            }
        }

        let response = request
            .send()
            .map_err(|e| http_err(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(http_err(format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| http_err(format!("failed to read response: {}", e)))?;

        Ok(HttpResponse { body, content_type })
    }
}

/// Lazily built [`ReqwestClient`], shared by every filesystem from one provider
type SharedClient = Arc<OnceLock<Arc<dyn HttpClient>>>;

/// Filesystem over an HTTP(S) base URL.
#[derive(Debug, Clone)]
pub struct HttpFs {
    base: Url,
    client: Option<Arc<dyn HttpClient>>,
    default_client: SharedClient,
    headers: Headers,
    ctx: FsContext,
}

impl HttpFs {
    /// Create a filesystem rooted at `base`.
    pub fn new(base: &Url) -> DataFsResult<Self> {
        Self::with_default_client(base, SharedClient::default())
    }

    fn with_default_client(base: &Url, default_client: SharedClient) -> DataFsResult<Self> {
        match base.scheme() {
            "http" | "https" => Ok(Self {
                base: base.clone(),
                client: None,
                default_client,
                headers: Headers::new(),
                ctx: FsContext::new(),
            }),
            other => Err(DataFsError::UnsupportedScheme {
                scheme: other.to_string(),
            }),
        }
    }

    /// Provider for the `http` and `https` schemes. Filesystems created by
    /// one provider share a single default client.
    pub fn provider() -> FsProviderFn {
        let default_client = SharedClient::default();
        FsProviderFn::new(
            move |url| {
                let fsys = HttpFs::with_default_client(url, default_client.clone())?;
                Ok(Arc::new(fsys) as Arc<dyn DataFs>)
            },
            &["http", "https"],
        )
    }

    /// The URL requested when opening `name`. The base URL's query is kept.
    fn resolve(&self, name: &str) -> DataFsResult<Url> {
        if name == "." {
            return Ok(self.base.clone());
        }
        let mut url = self.base.join(name).map_err(|e| DataFsError::InvalidPath {
            path: format!("{} ({})", name, e),
        })?;
        if url.query().is_none() {
            url.set_query(self.base.query());
        }
        Ok(url)
    }

    fn client(&self) -> DataFsResult<Arc<dyn HttpClient>> {
        if let Some(client) = self.client.as_ref().or_else(|| self.default_client.get()) {
            return Ok(client.clone());
        }
        let client: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new()?);
        Ok(self.default_client.get_or_init(|| client).clone())
    }
}

impl DataFs for HttpFs {
    fn open(&self, name: &str) -> DataFsResult<Box<dyn DataFile>> {
        if !is_valid_path(name) {
            return Err(DataFsError::InvalidPath {
                path: name.to_string(),
            });
        }
        self.ctx.check()?;

        let url = self.resolve(name)?;
        tracing::debug!(url = %url, headers = self.headers.len(), "HTTP GET");

        let response = self.client()?.get(&url, &self.headers)?;
        self.ctx.check()?;

        let base_name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .unwrap_or(name)
            .to_string();
        let mut info = FileInfo::file(base_name, response.body.len() as u64);
        info.content_type = response.content_type;

        Ok(Box::new(BytesFile::new(response.body, info)))
    }

    fn with_context(&self, ctx: &FsContext) -> Option<Arc<dyn DataFs>> {
        Some(Arc::new(Self {
            ctx: ctx.clone(),
            ..self.clone()
        }))
    }

    fn with_http_client(&self, client: Arc<dyn HttpClient>) -> Option<Arc<dyn DataFs>> {
        Some(Arc::new(Self {
            client: Some(client),
            ..self.clone()
        }))
    }

    fn with_headers(&self, headers: &Headers) -> Option<Arc<dyn DataFs>> {
        Some(Arc::new(Self {
            headers: headers.clone(),
            ..self.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::Cancellation;
    use crate::error::ErrorKind;
    use crate::fsys::read_file;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Canned responses keyed by full URL; records each request.
    #[derive(Debug, Default)]
    struct MockHttpClient {
        responses: BTreeMap<String, HttpResponse>,
        requests: Mutex<Vec<(String, Headers)>>,
    }

    impl MockHttpClient {
        fn with_response(mut self, url: &str, body: &str, content_type: Option<&str>) -> Self {
            self.responses.insert(
                url.to_string(),
                HttpResponse {
                    body: body.as_bytes().to_vec(),
                    content_type: content_type.map(str::to_string),
                },
            );
            self
        }
    }

    impl HttpClient for MockHttpClient {
        fn get(&self, url: &Url, headers: &Headers) -> DataFsResult<HttpResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), headers.clone()));
            self.responses
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| DataFsError::Http {
                    url: url.to_string(),
                    message: "HTTP 404 Not Found".to_string(),
                })
        }
    }

    fn fs_with(client: Arc<MockHttpClient>, base: &str) -> Arc<dyn DataFs> {
        let fsys = HttpFs::new(&Url::parse(base).unwrap()).unwrap();
        fsys.with_http_client(client).unwrap()
    }

    #[test]
    fn test_open_reports_content_type() {
        let client = Arc::new(MockHttpClient::default().with_response(
            "https://example.com/data/a.json",
            r#"{"a": 1}"#,
            Some("application/json; charset=utf-8"),
        ));
        let fsys = fs_with(client, "https://example.com/");

        let (data, info) = read_file(fsys.as_ref(), "data/a.json").unwrap();
        assert_eq!(data, br#"{"a": 1}"#);
        assert_eq!(info.name, "a.json");
        assert_eq!(info.content_type.as_deref(), Some("application/json; charset=utf-8"));
    }

    #[test]
    fn test_headers_are_sent() {
        let client = Arc::new(MockHttpClient::default().with_response(
            "https://example.com/a.yaml",
            "a: 1\n",
            None,
        ));
        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), vec!["Bearer t".to_string()]);
        let fsys = fs_with(client.clone(), "https://example.com/")
            .with_headers(&headers)
            .unwrap();

        read_file(fsys.as_ref(), "a.yaml").unwrap();
        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1, headers);
    }

    #[test]
    fn test_base_query_is_kept() {
        let client = Arc::new(MockHttpClient::default().with_response(
            "https://example.com/a.json?token=x",
            "{}",
            None,
        ));
        let fsys = fs_with(client, "https://example.com/?token=x");
        assert!(read_file(fsys.as_ref(), "a.json").is_ok());
    }

    #[test]
    fn test_http_failure_is_reported() {
        let fsys = fs_with(Arc::new(MockHttpClient::default()), "https://example.com/");
        let err = fsys.open("missing.json").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Http);
    }

    #[test]
    fn test_cancelled_context_skips_request() {
        let client = Arc::new(MockHttpClient::default());
        let token = Cancellation::new();
        token.cancel();
        let ctx = FsContext::new().with_cancellation(token);
        let fsys = fs_with(client.clone(), "https://example.com/")
            .with_context(&ctx)
            .unwrap();

        let err = fsys.open("a.json").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(client.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_default_client_is_built_once() {
        let fsys = HttpFs::new(&Url::parse("https://example.com/").unwrap()).unwrap();
        let sibling = HttpFs {
            ctx: FsContext::new(),
            ..fsys.clone()
        };

        let first = fsys.client().unwrap();
        assert!(Arc::ptr_eq(&first, &fsys.client().unwrap()));
        assert!(Arc::ptr_eq(&first, &sibling.client().unwrap()));
    }

    #[test]
    fn test_client_override_wins() {
        let mock: Arc<dyn HttpClient> = Arc::new(MockHttpClient::default());
        let fsys = HttpFs {
            client: Some(mock.clone()),
            ..HttpFs::new(&Url::parse("https://example.com/").unwrap()).unwrap()
        };
        assert!(Arc::ptr_eq(&fsys.client().unwrap(), &mock));
        assert!(fsys.default_client.get().is_none());
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let err = HttpFs::new(&Url::parse("ftp://example.com/").unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedScheme);
    }
}
