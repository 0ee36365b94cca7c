//! HTTP request execution
//!
//! The SDK never talks to the network directly. Every request goes through an
//! [`HttpExecutor`], so transports can be swapped (and mocked in tests). The
//! default implementation is [`ReqwestExecutor`].

mod reqwest_executor;

pub use reqwest_executor::ReqwestExecutor;

use crate::error::{BaasError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;

/// A boxed stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body
pub enum RequestBody {
    Empty,
    Bytes(Bytes),
    /// Streamed body; the length is announced through `Content-Length`
    Stream(ByteStream),
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            RequestBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// An outgoing request
#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    /// Deadline for the whole exchange, response body included. Left unset
    /// for transfers, which may legitimately run for a long time.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add `Authorization: Bearer <token>` unless the token is empty
    pub fn bearer(self, token: &str) -> Self {
        if token.is_empty() {
            self
        } else {
            self.header("Authorization", format!("Bearer {token}"))
        }
    }

    /// JSON body with a matching content type
    pub fn json(mut self, value: &serde_json::Value) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        self.body = RequestBody::Bytes(Bytes::from(body));
        Ok(self.header("Content-Type", "application/json"))
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// First header value with the given name (case-insensitive)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A response whose body has not been read yet
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ByteStream,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Declared `Content-Length`, if present and valid
    pub fn content_length(&self) -> Option<u64> {
        self.header_value("content-length")
            .and_then(|v| v.trim().parse().ok())
    }

    /// Read the whole body into memory.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(buf))
    }

    /// Read the body as JSON. An empty or non-JSON body yields `Null`.
    pub async fn json_or_null(self) -> Result<serde_json::Value> {
        let bytes = self.bytes().await?;
        if bytes.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    /// Fail with a server error unless the status is 2xx.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(BaasError::from_status(self.status))
        }
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Performs HTTP requests.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    /// Send `request` and return once the response head is available.
    ///
    /// Transport failures (connect, timeout) are reported as
    /// [`BaasError::Transport`]; non-2xx statuses are NOT errors here.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Supplies the current access token; an empty string means anonymous.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> String;
}

/// A fixed access token
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn access_token(&self) -> String {
        self.0.clone()
    }
}

/// A token that can be replaced at runtime, e.g. after sign-in
#[derive(Debug, Clone, Default)]
pub struct SharedToken(std::sync::Arc<parking_lot::RwLock<String>>);

impl SharedToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(std::sync::Arc::new(parking_lot::RwLock::new(token.into())))
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.0.write() = token.into();
    }

    pub fn clear(&self) {
        self.0.write().clear();
    }
}

impl TokenProvider for SharedToken {
    fn access_token(&self) -> String {
        self.0.read().clone()
    }
}

/// Build a body stream from in-memory chunks.
pub fn stream_from_chunks(chunks: Vec<Bytes>) -> ByteStream {
    Box::pin(futures_util::stream::iter(chunks.into_iter().map(Ok)))
}
