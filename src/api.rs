// API client module: a small blocking HTTP client that talks to the
// Zenodo deposition API. It stays synchronous on purpose; the only
// waiting the tool does is the retry backoff in `upload`.
//
// The wire traffic goes through the `Transport` trait so the upload engine
// can be exercised without a network. `HttpTransport` is the real thing,
// built on `reqwest::blocking`.

use crate::config::UploadConfig;
use crate::error::{AttemptError, UploadError};
use crate::progress::{ProgressObserver, ProgressReader};
use anyhow::{Context, Result};
use reqwest::blocking::{Body, Client};
use reqwest::Url;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

/// Status code and body text of a finished request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP surface needed by the uploader.
pub trait Transport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, AttemptError>;

    /// PUT the reader as a streamed body of `body.len()` bytes.
    fn put(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: ProgressReader<File>,
    ) -> Result<HttpResponse, AttemptError>;
}

/// `Transport` backed by a reqwest blocking client.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build the client. reqwest's blocking client times out after 30s by
    /// default, which would cut off large uploads, so the timeout is only
    /// set when the operator asked for one.
    pub fn new(config: &UploadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("zenodo-upload/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpTransport { client })
    }

    fn finish(res: reqwest::blocking::Response) -> HttpResponse {
        let status = res.status().as_u16();
        let body = res.text().unwrap_or_else(|_| "".into());
        HttpResponse { status, body }
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, AttemptError> {
        let res = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| AttemptError::Transport(e.to_string()))?;
        Ok(Self::finish(res))
    }

    fn put(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: ProgressReader<File>,
    ) -> Result<HttpResponse, AttemptError> {
        let len = body.len();
        let res = self
            .client
            .put(url)
            .query(query)
            .body(Body::sized(body, len))
            .send()
            .map_err(|e| AttemptError::Transport(e.to_string()))?;
        Ok(Self::finish(res))
    }
}

/// Part of the deposition metadata we care about.
#[derive(Deserialize, Debug)]
struct RecordInfo {
    links: RecordLinks,
}

#[derive(Deserialize, Debug)]
struct RecordLinks {
    bucket: Option<String>,
}

/// Authenticated client for one API base. The access token is sent as the
/// `access_token` query parameter on every request.
pub struct ApiClient<T = HttpTransport> {
    transport: T,
    base_url: String,
    token: String,
}

impl ApiClient<HttpTransport> {
    /// Create a client for the base URL and credential in `config`.
    pub fn from_config(config: &UploadConfig, token: &str) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(ApiClient::new(transport, &config.base_url, token))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, base_url: &str, token: &str) -> Self {
        ApiClient {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn auth_query(&self) -> [(&str, &str); 1] {
        [("access_token", self.token.as_str())]
    }

    /// Fetch the deposition and return its bucket URL. Any failure here is
    /// fatal for the run and is not retried.
    pub fn resolve_bucket(&self, record_id: &str) -> Result<String, UploadError> {
        let url = format!("{}/deposit/depositions/{}", self.base_url, record_id);
        let res = self
            .transport
            .get(&url, &self.auth_query())
            .map_err(|e| UploadError::record_lookup(record_id, e.to_string()))?;
        if !res.is_success() {
            return Err(UploadError::record_lookup(
                record_id,
                format!("server returned {}: {}", res.status, res.body),
            ));
        }
        let info: RecordInfo = serde_json::from_str(&res.body).map_err(|e| {
            UploadError::record_lookup(record_id, format!("malformed record response: {e}"))
        })?;
        let bucket = info
            .links
            .bucket
            .ok_or_else(|| UploadError::record_lookup(record_id, "response has no bucket link"))?;
        if let Err(e) = Url::parse(&bucket) {
            return Err(UploadError::record_lookup(
                record_id,
                format!("invalid bucket link {bucket:?}: {e}"),
            ));
        }
        tracing::info!(record_id, bucket = %bucket, "Resolved record bucket");
        Ok(bucket)
    }

    /// Stream one file to `{bucket_url}/{file name}`. Bytes consumed by the
    /// transport are reported to `observer`.
    pub fn put_file(
        &self,
        bucket_url: &str,
        path: &Path,
        observer: Box<dyn ProgressObserver>,
    ) -> Result<(), AttemptError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let body = ProgressReader::new(file, len, observer);
        let url = file_url(bucket_url, path)?;

        let res = self.transport.put(&url, &self.auth_query(), body)?;
        if !res.is_success() {
            return Err(AttemptError::Status {
                status: res.status,
                body: res.body,
            });
        }
        Ok(())
    }
}

/// Base name of `path` as used in the upload URL.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `{bucket_url}/{file name}` with the name escaped as one path segment,
/// so `#`, `?` and spaces stay part of the key.
fn file_url(bucket_url: &str, path: &Path) -> Result<String, AttemptError> {
    let mut url = Url::parse(bucket_url)
        .map_err(|e| AttemptError::Transport(format!("invalid bucket URL {bucket_url}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| AttemptError::Transport(format!("bucket URL {bucket_url} cannot take a path")))?
        .pop_if_empty()
        .push(&file_name(path));
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct CannedGet {
        response: Result<HttpResponse, ()>,
        seen: RefCell<Vec<(String, Vec<(String, String)>)>>,
    }

    impl CannedGet {
        fn new(status: u16, body: &str) -> Self {
            CannedGet {
                response: Ok(HttpResponse {
                    status,
                    body: body.into(),
                }),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for CannedGet {
        fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, AttemptError> {
            self.seen.borrow_mut().push((
                url.to_string(),
                query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ));
            self.response
                .clone()
                .map_err(|_| AttemptError::Transport("connection refused".into()))
        }

        fn put(
            &self,
            _url: &str,
            _query: &[(&str, &str)],
            _body: ProgressReader<File>,
        ) -> Result<HttpResponse, AttemptError> {
            panic!("record lookup must not upload");
        }
    }

    #[test]
    fn resolves_bucket_with_token_in_query() {
        let transport = CannedGet::new(
            200,
            r#"{"id": 42, "links": {"bucket": "https://zenodo.org/api/files/abc", "self": "x"}}"#,
        );
        let client = ApiClient::new(transport, "https://zenodo.org/api/", "secret");
        let bucket = client.resolve_bucket("42").unwrap();
        assert_eq!(bucket, "https://zenodo.org/api/files/abc");

        let seen = client.transport().seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "https://zenodo.org/api/deposit/depositions/42");
        assert_eq!(
            seen[0].1,
            vec![("access_token".to_string(), "secret".to_string())]
        );
    }

    #[test]
    fn non_success_status_is_lookup_error() {
        let client = ApiClient::new(CannedGet::new(404, "not found"), "http://x", "t");
        let err = client.resolve_bucket("7").unwrap_err();
        assert!(matches!(err, UploadError::RecordLookup { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn missing_bucket_link_is_lookup_error() {
        let client = ApiClient::new(CannedGet::new(200, r#"{"links": {}}"#), "http://x", "t");
        let err = client.resolve_bucket("7").unwrap_err();
        assert!(err.to_string().contains("no bucket link"));
    }

    #[test]
    fn malformed_body_is_lookup_error() {
        let client = ApiClient::new(CannedGet::new(200, "<html>"), "http://x", "t");
        assert!(matches!(
            client.resolve_bucket("7"),
            Err(UploadError::RecordLookup { .. })
        ));
    }

    #[test]
    fn transport_failure_is_lookup_error() {
        let transport = CannedGet {
            response: Err(()),
            seen: RefCell::new(Vec::new()),
        };
        let client = ApiClient::new(transport, "http://x", "t");
        let err = client.resolve_bucket("7").unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn file_url_appends_base_name() {
        assert_eq!(
            file_url("https://b/files/abc/", Path::new("/tmp/data/run 1.csv")).unwrap(),
            "https://b/files/abc/run%201.csv"
        );
        assert_eq!(
            file_url("https://b/files/abc", Path::new("/tmp/data/plain.txt")).unwrap(),
            "https://b/files/abc/plain.txt"
        );
    }

    #[test]
    fn file_url_escapes_query_and_fragment_characters() {
        assert_eq!(
            file_url("https://b/files/abc", Path::new("/tmp/a#b?c.csv")).unwrap(),
            "https://b/files/abc/a%23b%3Fc.csv"
        );
    }

    #[test]
    fn unparseable_bucket_link_is_lookup_error() {
        let client = ApiClient::new(
            CannedGet::new(200, r#"{"links": {"bucket": "not a url"}}"#),
            "http://x",
            "t",
        );
        let err = client.resolve_bucket("7").unwrap_err();
        assert!(err.to_string().contains("invalid bucket link"));
    }
}
