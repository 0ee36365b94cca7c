//! Push device endpoint

use crate::config::ClientConfig;
use crate::error::{BaasError, Result};
use crate::http::{HttpExecutor, HttpRequest, HttpResponse, Method, TokenProvider};
use crate::transfer::naming::encode_segment;
use async_trait::async_trait;
use baas_core::TagSet;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Platform code sent when none is configured
pub const DEFAULT_PLATFORM: &str = "G";

/// Contents of a device record write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRegistration {
    pub token: String,
    pub tags: TagSet,
    pub platform: String,
}

impl DeviceRegistration {
    pub fn new(token: impl Into<String>, tags: TagSet) -> Self {
        Self {
            token: token.into(),
            tags,
            platform: DEFAULT_PLATFORM.to_string(),
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "token": self.token,
            "tags": self.tags.to_vec(),
            "platform": self.platform,
        })
    }
}

/// Server-side device record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
}

/// Remote device registration endpoint.
#[async_trait]
pub trait DeviceEndpoint: Send + Sync {
    /// Create a new device record
    async fn create(&self, registration: &DeviceRegistration) -> Result<DeviceRecord>;

    /// Overwrite an existing device record
    async fn update(
        &self,
        device_id: &str,
        registration: &DeviceRegistration,
    ) -> Result<DeviceRecord>;

    /// Delete a device record
    async fn delete(&self, device_id: &str) -> Result<()>;
}

/// [`DeviceEndpoint`] talking to `{app}/pushes/devices` over an [`HttpExecutor`]
#[derive(Clone)]
pub struct HttpDeviceEndpoint {
    executor: Arc<dyn HttpExecutor>,
    tokens: Arc<dyn TokenProvider>,
    config: Arc<ClientConfig>,
}

impl HttpDeviceEndpoint {
    pub fn new(
        executor: Arc<dyn HttpExecutor>,
        tokens: Arc<dyn TokenProvider>,
        config: Arc<ClientConfig>,
    ) -> Self {
        Self {
            executor,
            tokens,
            config,
        }
    }

    fn devices_url(&self) -> String {
        format!("{}/pushes/devices", self.config.app_url())
    }

    fn device_url(&self, device_id: &str) -> Result<String> {
        if device_id.trim().is_empty() {
            return Err(BaasError::InvalidInput("device id must not be empty".to_string()));
        }
        Ok(format!("{}/{}", self.devices_url(), encode_segment(device_id)))
    }

    async fn send(&self, request: HttpRequest) -> Result<Value> {
        let request = request
            .bearer(&self.tokens.access_token())
            .timeout(self.config.request_timeout);
        let response = self.executor.execute(request).await?;
        read_api_response(response).await
    }
}

/// Read a JSON API answer; an `error` field or a non-2xx status is a server error.
async fn read_api_response(response: HttpResponse) -> Result<Value> {
    let status = response.status;
    let body = response.json_or_null().await?;

    if let Some(error) = body.get("error").and_then(Value::as_str) {
        if !error.is_empty() {
            let message = body
                .get("error_description")
                .and_then(Value::as_str)
                .filter(|d| !d.is_empty())
                .unwrap_or(error)
                .to_string();
            return Err(BaasError::Server {
                status: Some(status),
                message,
            });
        }
    }
    if !(200..300).contains(&status) {
        return Err(BaasError::from_status(status));
    }
    Ok(body)
}

fn first_entity_uuid(body: &Value) -> Option<String> {
    body.get("entities")
        .and_then(|e| e.get(0))
        .and_then(|e| e.get("uuid"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn validate_registration(registration: &DeviceRegistration) -> Result<()> {
    if registration.token.trim().is_empty() {
        return Err(BaasError::InvalidInput("Missing device token".to_string()));
    }
    Ok(())
}

#[async_trait]
impl DeviceEndpoint for HttpDeviceEndpoint {
    async fn create(&self, registration: &DeviceRegistration) -> Result<DeviceRecord> {
        validate_registration(registration)?;
        let request =
            HttpRequest::new(Method::Post, self.devices_url()).json(&registration.to_json())?;
        let body = self.send(request).await?;
        let id = first_entity_uuid(&body).ok_or_else(|| BaasError::Server {
            status: None,
            message: "device registration response has no entity".to_string(),
        })?;
        Ok(DeviceRecord { id })
    }

    async fn update(
        &self,
        device_id: &str,
        registration: &DeviceRegistration,
    ) -> Result<DeviceRecord> {
        validate_registration(registration)?;
        let request = HttpRequest::new(Method::Put, self.device_url(device_id)?)
            .json(&registration.to_json())?;
        let body = self.send(request).await?;
        Ok(DeviceRecord {
            id: first_entity_uuid(&body).unwrap_or_else(|| device_id.to_string()),
        })
    }

    async fn delete(&self, device_id: &str) -> Result<()> {
        let request = HttpRequest::new(Method::Delete, self.device_url(device_id)?);
        self.send(request).await?;
        Ok(())
    }
}

impl std::fmt::Debug for HttpDeviceEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDeviceEndpoint")
            .field("url", &self.devices_url())
            .finish()
    }
}
