//! Default transport backed by reqwest

use super::{HttpExecutor, HttpRequest, HttpResponse, Method, RequestBody};
use crate::config::ClientConfig;
use crate::error::{BaasError, Result};
use async_trait::async_trait;
use futures_util::TryStreamExt;

/// [`HttpExecutor`] using a shared `reqwest::Client`
///
/// The client only carries an idle timeout (`request_timeout` without any
/// bytes moving), so long transfers run for as long as data keeps flowing.
/// A whole-request deadline applies only to requests that set
/// [`HttpRequest::timeout`].
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    http: reqwest::Client,
}

impl ReqwestExecutor {
    /// Build a client with the timeouts from `config`
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .read_timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| BaasError::InvalidConfiguration(e.to_string()))?;
        Ok(Self { http })
    }

    /// Wrap an existing client
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Error message including the source chain
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Map a reqwest failure, whether it happened sending or reading the body.
fn transport_error(err: reqwest::Error) -> BaasError {
    if err.is_timeout() {
        BaasError::Transport(format!("request timed out: {}", describe(&err)))
    } else if err.is_body() || err.is_decode() {
        BaasError::Transport(describe(&err))
    } else {
        BaasError::from(err)
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        tracing::debug!(method = %request.method, url = %request.url, "Sending request");

        let mut builder = self
            .http
            .request(to_reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Bytes(bytes) => builder.body(bytes),
            RequestBody::Stream(stream) => builder.body(reqwest::Body::wrap_stream(stream)),
        };

        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        tracing::debug!(status, "Received response");

        let body = response.bytes_stream().map_err(transport_error);

        Ok(HttpResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}
