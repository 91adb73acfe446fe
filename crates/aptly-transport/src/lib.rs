//! Blocking HTTP transport for the Aptly API.
//!
//! The [`Transport`] trait is the only seam between the Aptly client and the
//! network: it takes a fully composed [`HttpRequest`] and returns the status
//! and raw body. [`HttpTransport`] is the `reqwest` implementation; tests can
//! substitute an in-memory one.
//!
//! # Self-signed certificates
//!
//! When [`ServerEndpoint::trust_self_signed`] is set, the client is built
//! with certificate verification disabled. Any certificate is accepted and
//! the host name is not matched against it, so a man-in-the-middle on the
//! path to the server goes unnoticed. Enable it only for servers reached over
//! a network you control.

use std::error::Error as _;
use std::fmt;
use std::path::PathBuf;

use aptly_types::ServerEndpoint;
use reqwest::blocking::{Client, multipart};
use url::Url;

/// Default user agent for API requests
pub const USER_AGENT: &str = concat!("aptly-publish/", env!("CARGO_PKG_VERSION"));

/// HTTP methods used by the Aptly workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    /// Serialized JSON; the caller sets `Content-Type`.
    Json(String),
    /// One form part per file, all under `field`.
    Multipart { field: String, files: Vec<PathBuf> },
}

/// A composed request. The query string, if any, is part of `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn put(url: Url) -> Self {
        Self::new(Method::Put, url)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_json(self, body: String) -> Self {
        let mut req = self.with_header("Content-Type", "application/json");
        req.body = RequestBody::Json(body);
        req
    }

    pub fn with_multipart(mut self, field: &str, files: Vec<PathBuf>) -> Self {
        self.body = RequestBody::Multipart {
            field: field.to_string(),
            files,
        };
        self
    }

    /// First header value named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status line and body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, status_text: &str, body: &str) -> Self {
        Self {
            status,
            status_text: status_text.to_string(),
            body: body.to_string(),
        }
    }

    /// Aptly signals success with exactly 200.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Failure before any HTTP response was obtained.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{method} {url} failed: {cause}")]
    Request {
        method: Method,
        url: String,
        cause: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to attach {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    fn request(method: Method, url: &Url, source: reqwest::Error) -> Self {
        TransportError::Request {
            method,
            url: url.to_string(),
            cause: error_chain(&source),
            source,
        }
    }

    /// Whether the request timed out.
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Request { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

/// `reqwest` keeps the interesting part (refused, DNS, TLS) in the source
/// chain; flatten it so it reaches the message.
fn error_chain(err: &reqwest::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}

/// Sends one request and returns the status and raw body.
///
/// Implementations attach `Accept: application/json` and any credentials;
/// callers only supply method, URL, headers and body. No retries.
pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
        (**self).send(request)
    }
}

/// `reqwest`-backed transport bound to one endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    username: Option<String>,
    password: Option<String>,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("client", &self.client)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpTransport {
    /// Build a transport for `endpoint`. Timeouts and TLS policy are fixed here.
    pub fn new(endpoint: &ServerEndpoint) -> Result<Self, TransportError> {
        let timeouts = endpoint.timeouts();
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request);

        if endpoint.trust_self_signed() {
            tracing::warn!(
                base_url = endpoint.base_url(),
                "TLS certificate verification disabled for self-signed server"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(TransportError::Client)?;

        Ok(Self {
            client,
            username: endpoint
                .has_credentials()
                .then(|| endpoint.username().to_string()),
            password: endpoint.password().map(str::to_string),
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.into(), request.url.clone())
            .header("Accept", "application/json");

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(username) = &self.username {
            builder = builder.basic_auth(username, self.password.as_ref());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.body(body.clone()),
            RequestBody::Multipart { field, files } => {
                let mut form = multipart::Form::new();
                for path in files {
                    form = form
                        .file(field.clone(), path)
                        .map_err(|source| TransportError::Attachment {
                            path: path.clone(),
                            source,
                        })?;
                }
                builder.multipart(form)
            }
        };

        tracing::debug!(method = %request.method, url = %request.url, "sending request");

        let response = builder
            .send()
            .map_err(|err| TransportError::request(request.method, &request.url, err))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| TransportError::request(request.method, &request.url, err))?;

        tracing::debug!(status = status.as_u16(), bytes = body.len(), "received response");

        let status_text = match status.canonical_reason() {
            Some(reason) if !reason.is_empty() => reason.to_string(),
            _ => format!("HTTP {}", status.as_u16()),
        };

        Ok(RawResponse {
            status: status.as_u16(),
            status_text,
            body,
        })
    }
}
