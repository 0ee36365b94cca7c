//! Scripted HTTP executor.

use crate::error::{BaasError, Result};
use crate::http::{ByteStream, HttpExecutor, HttpRequest, HttpResponse, Method, RequestBody};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// A canned response
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub chunks: Vec<Bytes>,
}

impl MockResponse {
    /// Response with an empty body
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            chunks: Vec::new(),
        }
    }

    /// JSON document response
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_chunks(vec![Bytes::from(body.to_string())])
    }

    /// Binary response with a `Content-Length` header, sent as one chunk
    pub fn bytes(status: u16, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self::new(status)
            .with_header("Content-Length", body.len().to_string())
            .with_chunks(vec![body])
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body with the given chunks, delivered one by one
    pub fn with_chunks(mut self, chunks: Vec<Bytes>) -> Self {
        self.chunks = chunks;
        self
    }
}

/// A request as the executor received it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Full body, with streamed bodies collected
    pub body: Bytes,
    /// Size of each streamed chunk (a single entry for in-memory bodies)
    pub body_chunks: Vec<usize>,
    pub timeout: Option<Duration>,
}

impl RecordedRequest {
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// [`HttpExecutor`] answering from a queue of scripted responses.
///
/// Unscripted requests get an empty `200`. Streamed request bodies are read to
/// the end before the response is produced; an error inside the body stream is
/// returned as the request error.
#[derive(Clone, Default)]
pub struct MockHttpExecutor {
    inner: Arc<HttpInner>,
}

#[derive(Default)]
struct HttpInner {
    responses: Mutex<VecDeque<Result<MockResponse>>>,
    requests: RwLock<Vec<RecordedRequest>>,
    chunk_delay: Mutex<Option<Duration>>,
    body_delay: Mutex<Option<Duration>>,
}

impl MockHttpExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait `delay` before each response body chunk.
    pub fn with_chunk_delay(self, delay: Duration) -> Self {
        *self.inner.chunk_delay.lock() = Some(delay);
        self
    }

    /// Wait `delay` before pulling each chunk of a streamed request body,
    /// like a slow uplink.
    pub fn with_body_delay(self, delay: Duration) -> Self {
        *self.inner.body_delay.lock() = Some(delay);
        self
    }

    /// Queue a response.
    pub fn respond(&self, response: MockResponse) {
        self.inner.responses.lock().push_back(Ok(response));
    }

    /// Queue a request failure.
    pub fn fail(&self, error: BaasError) {
        self.inner.responses.lock().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.requests.read().clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.inner.requests.read().last().cloned()
    }

    fn response_body(&self, chunks: Vec<Bytes>) -> ByteStream {
        let delay = *self.inner.chunk_delay.lock();
        let stream = futures_util::stream::iter(chunks).then(move |chunk| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(chunk)
        });
        Box::pin(stream)
    }
}

async fn collect_body(body: RequestBody, delay: Option<Duration>) -> Result<(Bytes, Vec<usize>)> {
    match body {
        RequestBody::Empty => Ok((Bytes::new(), Vec::new())),
        RequestBody::Bytes(bytes) => {
            let sizes = vec![bytes.len()];
            Ok((bytes, sizes))
        }
        RequestBody::Stream(mut stream) => {
            let mut collected = BytesMut::new();
            let mut sizes = Vec::new();
            loop {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                let Some(chunk) = stream.next().await else {
                    break;
                };
                let chunk = chunk?;
                sizes.push(chunk.len());
                collected.extend_from_slice(&chunk);
            }
            Ok((collected.freeze(), sizes))
        }
    }
}

#[async_trait]
impl HttpExecutor for MockHttpExecutor {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;
        let body_delay = *self.inner.body_delay.lock();
        let collected = collect_body(body, body_delay).await;

        let (body, body_chunks) = match &collected {
            Ok((body, sizes)) => (body.clone(), sizes.clone()),
            Err(_) => (Bytes::new(), Vec::new()),
        };
        self.inner.requests.write().push(RecordedRequest {
            method,
            url,
            headers,
            body,
            body_chunks,
            timeout,
        });
        collected?;

        let scripted = self.inner.responses.lock().pop_front();
        let response = scripted.unwrap_or_else(|| Ok(MockResponse::new(200)))?;
        Ok(HttpResponse {
            status: response.status,
            headers: response.headers,
            body: self.response_body(response.chunks),
        })
    }
}

impl std::fmt::Debug for MockHttpExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHttpExecutor")
            .field("requests", &self.inner.requests.read().len())
            .field("scripted", &self.inner.responses.lock().len())
            .finish()
    }
}
