//! Core type definitions for the delivery bridge

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::OnceLock;

use crate::{FbridgeError, Result};

/// Message type the relay listens for
pub const UPLOAD_MESSAGE_TYPE: &str = "UPLOAD_TO_FEISHU";

static RECORD_ID_PATTERN: OnceLock<Regex> = OnceLock::new();

fn record_id_pattern() -> &'static Regex {
    RECORD_ID_PATTERN.get_or_init(|| Regex::new(r"/video/(\d+)").expect("record id pattern is valid"))
}

/// Identifier extracted from a page URL (digits following `/video/`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extract the record id from a page URL.
///
/// Returns `None` when the URL has no `/video/<digits>` segment; delivery
/// proceeds without an id in that case.
pub fn extract_record_id(page_url: &str) -> Option<RecordId> {
    record_id_pattern()
        .captures(page_url)
        .and_then(|caps| caps.get(1))
        .map(|m| RecordId(m.as_str().to_string()))
}

/// One delivery request, built fresh per user action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    page_url: String,
    record_id: Option<RecordId>,
}

impl DeliveryRequest {
    /// Build a request, rejecting an empty page URL before any transport
    pub fn new(page_url: impl Into<String>, record_id: Option<RecordId>) -> Result<Self> {
        let page_url = page_url.into();
        if page_url.is_empty() {
            return Err(FbridgeError::InvalidRequest(
                "pageUrl is missing or empty".to_string(),
            ));
        }
        Ok(Self { page_url, record_id })
    }

    /// Build a request for a page URL, deriving the record id from it
    pub fn for_page(page_url: impl Into<String>) -> Result<Self> {
        let page_url = page_url.into();
        let record_id = extract_record_id(&page_url);
        Self::new(page_url, record_id)
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    pub fn record_id(&self) -> Option<&RecordId> {
        self.record_id.as_ref()
    }
}

/// Normalized outcome of one delivery attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub success: bool,
    pub message: Option<String>,
    /// Backend response body, passed through untouched
    pub raw: Value,
}

impl DeliveryResult {
    /// Successful result from a backend body; `message` is taken from the body
    pub fn from_backend_body(body: Value) -> Self {
        Self {
            success: true,
            message: non_empty_str(&body, "message"),
            raw: body,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            raw: Value::Null,
        }
    }

    /// Whether the backend reported the record as already present
    pub fn already_existed(&self) -> bool {
        self.raw.get("exists").and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Which transport branch produced (or failed to produce) a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportOutcome {
    /// Relay replied with a success
    RelaySucceeded,
    /// Relay could not be reached, fallback follows
    RelayUnavailable,
    /// Relay replied with a failure, no fallback
    RelayRejected,
    /// Direct backend call succeeded
    DirectSucceeded,
    /// Direct backend call failed, terminal
    DirectFailed,
}

impl TransportOutcome {
    /// Final outcomes end a delivery; only `RelayUnavailable` does not
    pub fn is_final(self) -> bool {
        !matches!(self, Self::RelayUnavailable)
    }
}

impl std::fmt::Display for TransportOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RelaySucceeded => write!(f, "relay_succeeded"),
            Self::RelayUnavailable => write!(f, "relay_unavailable"),
            Self::RelayRejected => write!(f, "relay_rejected"),
            Self::DirectSucceeded => write!(f, "direct_succeeded"),
            Self::DirectFailed => write!(f, "direct_failed"),
        }
    }
}

/// Message sent over the inter-context channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl RuntimeMessage {
    /// Upload message for a validated request
    pub fn upload(request: &DeliveryRequest) -> Self {
        let mut payload = json!({ "pageUrl": request.page_url() });
        if let Some(id) = request.record_id() {
            payload["recordId"] = json!(id.as_str());
        }
        Self {
            kind: UPLOAD_MESSAGE_TYPE.to_string(),
            payload,
        }
    }

    pub fn is_upload(&self) -> bool {
        self.kind == UPLOAD_MESSAGE_TYPE
    }

    /// Decode the payload of an upload message
    pub fn upload_payload(&self) -> Result<UploadPayload> {
        if self.payload.is_null() {
            return Ok(UploadPayload::default());
        }
        serde_json::from_value(self.payload.clone())
            .map_err(|e| FbridgeError::InvalidRequest(format!("malformed payload: {}", e)))
    }
}

/// Payload of an upload message.
///
/// `pageUrl` stays untyped so the relay can reject non-string values itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadPayload {
    #[serde(rename = "pageUrl", default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<Value>,
    #[serde(rename = "recordId", alias = "videoId", default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl UploadPayload {
    /// Validate into a request: `pageUrl` must be a non-empty string
    pub fn into_request(self) -> Result<DeliveryRequest> {
        match self.page_url {
            Some(Value::String(url)) if !url.is_empty() => {
                DeliveryRequest::new(url, self.record_id.map(RecordId))
            }
            Some(Value::String(_)) | None | Some(Value::Null) => Err(FbridgeError::InvalidRequest(
                "payload.pageUrl is missing".to_string(),
            )),
            Some(other) => Err(FbridgeError::InvalidRequest(format!(
                "payload.pageUrl must be a string, got {}",
                other
            ))),
        }
    }
}

/// Reply sent by the relay for every upload message it handles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelayReply {
    /// Success reply carrying the backend body
    pub fn success(body: Value) -> Self {
        Self {
            ok: true,
            message: non_empty_str(&body, "message"),
            data: Some(body),
            error: None,
        }
    }

    /// Failure reply; `message` and `error` carry the same text
    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            ok: false,
            message: Some(message.clone()),
            data: None,
            error: Some(message),
        }
    }

    /// Normalize into the transport-agnostic result
    pub fn into_result(self) -> DeliveryResult {
        let message = self
            .message
            .filter(|m| !m.is_empty())
            .or(self.error.filter(|e| !e.is_empty()));
        DeliveryResult {
            success: self.ok,
            message,
            raw: self.data.unwrap_or(Value::Null),
        }
    }
}

/// Read a non-empty string field from a JSON object
pub fn non_empty_str(body: &Value, field: &str) -> Option<String> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
