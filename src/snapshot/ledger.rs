use crate::{Result, SnapshotError};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficStatus {
    Pending,
    Completed,
}

/// Capture state for one intercepted request, keyed by its URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficEntry {
    pub status: TrafficStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,
}

impl TrafficEntry {
    fn pending() -> Self {
        Self {
            status: TrafficStatus::Pending,
            request_method: None,
            request_headers: None,
            content_type: None,
            response_body: None,
        }
    }
}

/// Per-capture mapping from request URL to capture state.
///
/// Owned by exactly one capture session; shared with that session's
/// interception listener tasks, never across sessions.
#[derive(Default)]
pub struct TrafficLedger {
    entries: RwLock<HashMap<String, TrafficEntry>>,
}

impl TrafficLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pending entry for `url` unless one already exists.
    pub async fn register_pending(&self, url: &str) {
        self.entries
            .write()
            .await
            .entry(url.to_string())
            .or_insert_with(TrafficEntry::pending);
    }

    /// Marks the entry for `url` completed with the response detail. A URL
    /// that was never registered is left untouched.
    pub async fn complete(
        &self,
        url: &str,
        method: String,
        headers: Option<Value>,
        content_type: Option<String>,
        body: Option<Value>,
    ) {
        if let Some(entry) = self.entries.write().await.get_mut(url) {
            entry.status = TrafficStatus::Completed;
            entry.request_method = Some(method);
            entry.request_headers = headers;
            entry.content_type = content_type;
            entry.response_body = body;
        }
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.entries.read().await.contains_key(url)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Clones the full ledger for the capture result.
    pub async fn snapshot(&self) -> HashMap<String, TrafficEntry> {
        self.entries.read().await.clone()
    }
}

/// Decodes a response body per its declared content type.
///
/// `application/json` becomes a structured value, `text/*` plain text,
/// anything else the base64 form of the raw bytes. `base64_encoded` reflects
/// how CDP delivered the body.
pub fn decode_body(
    content_type: Option<&str>,
    body: &str,
    base64_encoded: bool,
) -> Result<Option<Value>> {
    let media_type = content_type
        .map(|c| c.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .unwrap_or_default();

    if media_type == "application/json" {
        let text = if base64_encoded {
            decoded_text(body)?
        } else {
            body.to_string()
        };
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| SnapshotError::DecodeFailed(format!("invalid JSON body: {}", e)))?;
        return Ok(Some(value));
    }

    if media_type.starts_with("text/") {
        let text = if base64_encoded {
            decoded_text(body)?
        } else {
            body.to_string()
        };
        return Ok(Some(Value::String(text)));
    }

    // Opaque payload: keep (or produce) the base64 form.
    let encoded = if base64_encoded {
        body.to_string()
    } else {
        base64::engine::general_purpose::STANDARD.encode(body.as_bytes())
    };
    Ok(Some(Value::String(encoded)))
}

fn decoded_text(body: &str) -> Result<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(body)
        .map_err(|e| SnapshotError::DecodeFailed(format!("invalid base64 body: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| SnapshotError::DecodeFailed(format!("body is not UTF-8: {}", e)))
}
