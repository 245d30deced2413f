//! HTTP client for the recording backend
//!
//! Both delivery paths (relay and direct fallback) send the same body and
//! run the response through [`normalize_response`], so the page's
//! presentation logic never needs to know which path produced a result.

use fbridge_core::config::BackendConfig;
use fbridge_core::{non_empty_str, DeliveryRequest, FbridgeError, Result};
use serde::Serialize;
use serde_json::Value;

/// Request body of `POST <base>/feishu/upload_record`
#[derive(Debug, Clone, Serialize)]
struct UploadRecordBody<'a> {
    page_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
}

/// Backend client shared by the relay and the direct path
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    endpoint: String,
    channel: Option<String>,
}

impl BackendClient {
    /// Create a client for the configured backend
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| FbridgeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.upload_url(),
            channel: config.channel.clone(),
        })
    }

    /// Full URL requests are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one record to the backend.
    ///
    /// Returns the full backend body on success. No retries: a failure here
    /// is reported to the caller as-is.
    pub async fn upload(&self, request: &DeliveryRequest) -> Result<Value> {
        let body = UploadRecordBody {
            page_url: request.page_url(),
            video_id: request.record_id().map(|id| id.as_str()),
            channel: self.channel.as_deref(),
        };

        tracing::debug!(
            "POST {} (page_url: {}, video_id: {:?})",
            self.endpoint,
            body.page_url,
            body.video_id
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| FbridgeError::Unknown(format!("Failed to send request: {}", e)))?;

        let status = response.status().as_u16();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to read backend response body (HTTP {}): {}", status, e);
                return Err(FbridgeError::ResponseParseFailure { status });
            }
        };

        normalize_response(status, &bytes)
    }
}

/// Normalize a backend HTTP response.
///
/// - body is not JSON: `ResponseParseFailure` carrying the status
/// - non-2xx, or 2xx without `ok: true`: `BackendRejected` with the body's
///   `message`, else its `error`, else a status-coded text
/// - otherwise: the body, verbatim
pub fn normalize_response(status: u16, body: &[u8]) -> Result<Value> {
    let data: Value = match serde_json::from_slice(body) {
        Ok(data) => data,
        Err(e) => {
            tracing::error!("Backend response is not JSON (HTTP {}): {}", status, e);
            return Err(FbridgeError::ResponseParseFailure { status });
        }
    };

    let ok_marker = data.get("ok").and_then(Value::as_bool).unwrap_or(false);
    if !(200..300).contains(&status) || !ok_marker {
        let message = non_empty_str(&data, "message")
            .or_else(|| non_empty_str(&data, "error"))
            .unwrap_or_else(|| format!("Backend error: HTTP {}", status));
        tracing::error!("Backend rejected upload (HTTP {}): {}", status, message);
        return Err(FbridgeError::BackendRejected { status, message });
    }

    Ok(data)
}
