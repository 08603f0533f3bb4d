use crate::snapshot::ledger::{TrafficLedger, decode_body};
use crate::{Result, SnapshotError};
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventRequestWillBeSent, EventResponseReceived,
    GetResponseBodyParams, ResourceType,
};
use futures::StreamExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;
use uuid::Uuid;

/// Wire shape of the request-side filter option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficFilterSpec {
    pub include: Vec<String>,
}

/// Compiled include filter. With no filter configured every trackable
/// request is tracked; with one configured a request must match at least one
/// pattern.
pub struct TrafficFilter {
    include: Option<Vec<Regex>>,
}

impl TrafficFilter {
    pub fn from_spec(spec: Option<&TrafficFilterSpec>) -> Result<Self> {
        let include = match spec {
            None => None,
            Some(spec) => {
                let mut patterns = Vec::with_capacity(spec.include.len());
                for raw in &spec.include {
                    let regex = Regex::new(raw)
                        .map_err(|_| SnapshotError::InvalidFilterPattern(raw.clone()))?;
                    patterns.push(regex);
                }
                Some(patterns)
            }
        };

        Ok(Self { include })
    }

    pub fn tracks(&self, url: &str) -> bool {
        match &self.include {
            None => true,
            Some(patterns) => patterns.iter().any(|p| p.is_match(url)),
        }
    }
}

/// Request detail recorded at `requestWillBeSent`, consumed when the
/// matching response arrives.
#[derive(Debug, Clone)]
struct RequestRecord {
    url: String,
    method: String,
    headers: Value,
}

/// Only these resource kinds are ever tracked; everything else is let
/// through unobserved.
fn is_tracked_kind(resource_type: Option<&ResourceType>) -> bool {
    matches!(
        resource_type,
        Some(
            ResourceType::Document
                | ResourceType::Stylesheet
                | ResourceType::Script
                | ResourceType::Image
                | ResourceType::Xhr
        )
    )
}

fn is_blob_url(url: &str) -> bool {
    Url::parse(url).map(|u| u.scheme() == "blob").unwrap_or(false)
}

/// Cache hits, locally created resources and CORS preflights are never
/// recorded.
fn should_skip_response(from_cache: bool, url: &str, method: &str) -> bool {
    from_cache || is_blob_url(url) || method.eq_ignore_ascii_case("OPTIONS")
}

/// Observes a page's network exchanges and records them into a
/// [`TrafficLedger`]. Requests are never blocked or rewritten.
pub struct TrafficInterceptor {
    ledger: Arc<TrafficLedger>,
    filter: Arc<TrafficFilter>,
    inflight: Arc<RwLock<HashMap<String, RequestRecord>>>,
    capture_id: Uuid,
}

impl TrafficInterceptor {
    pub fn new(ledger: Arc<TrafficLedger>, filter: TrafficFilter, capture_id: Uuid) -> Self {
        Self {
            ledger,
            filter: Arc::new(filter),
            inflight: Arc::new(RwLock::new(HashMap::new())),
            capture_id,
        }
    }

    /// Enables the Network domain and wires the request/response listeners.
    /// The listeners run on their own tasks for the lifetime of the page's
    /// event streams; ordering relative to scripted actions is only causal.
    pub async fn attach(&self, page: &Arc<Page>) -> Result<()> {
        page.execute(NetworkEnableParams::default())
            .await
            .map_err(|e| {
                SnapshotError::General(format!("Failed to enable Network domain: {}", e))
            })?;

        self.attach_request_listener(page).await?;
        self.attach_response_listener(page).await?;

        Ok(())
    }

    async fn attach_request_listener(&self, page: &Arc<Page>) -> Result<()> {
        let mut request_stream = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| {
                SnapshotError::General(format!("Failed to attach request listener: {}", e))
            })?;

        let ledger = self.ledger.clone();
        let filter = self.filter.clone();
        let inflight = self.inflight.clone();
        let capture_id = self.capture_id;

        tokio::spawn(async move {
            while let Some(event) = request_stream.next().await {
                let url = event.request.url.clone();

                inflight.write().await.insert(
                    event.request_id.inner().to_string(),
                    RequestRecord {
                        url: url.clone(),
                        method: event.request.method.clone(),
                        headers: event.request.headers.inner().clone(),
                    },
                );

                tracing::trace!(
                    %capture_id,
                    resource_type = ?event.r#type,
                    url = %truncate(&url, 80),
                    "request observed"
                );

                if !is_tracked_kind(event.r#type.as_ref()) {
                    continue;
                }

                if !filter.tracks(&url) {
                    continue;
                }

                ledger.register_pending(&url).await;
            }
        });

        Ok(())
    }

    async fn attach_response_listener(&self, page: &Arc<Page>) -> Result<()> {
        let mut response_stream = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| {
                SnapshotError::General(format!("Failed to attach response listener: {}", e))
            })?;

        let ledger = self.ledger.clone();
        let inflight = self.inflight.clone();
        let page = page.clone();
        let capture_id = self.capture_id;

        tokio::spawn(async move {
            while let Some(event) = response_stream.next().await {
                let request_id = event.request_id.clone();
                let request_id_str = request_id.inner().to_string();
                let record = inflight.write().await.remove(&request_id_str);

                let Some(record) = record else {
                    continue;
                };

                let response = &event.response;
                let from_cache = response.from_disk_cache.unwrap_or(false)
                    || response.from_prefetch_cache.unwrap_or(false);

                if should_skip_response(from_cache, &record.url, &record.method) {
                    continue;
                }

                if !ledger.contains(&record.url).await {
                    continue;
                }

                let content_type = header_value(response.headers.inner(), "content-type");

                let body = match page.execute(GetResponseBodyParams::new(request_id)).await {
                    Ok(result) => {
                        match decode_body(
                            content_type.as_deref(),
                            &result.body,
                            result.base64_encoded,
                        ) {
                            Ok(body) => body,
                            Err(e) => {
                                tracing::error!(
                                    %capture_id,
                                    method = %record.method,
                                    url = %record.url,
                                    error = %e,
                                    "response body decode failed"
                                );
                                None
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            %capture_id,
                            method = %record.method,
                            url = %record.url,
                            error = %e,
                            "response body fetch failed"
                        );
                        None
                    }
                };

                ledger
                    .complete(
                        &record.url,
                        record.method,
                        Some(record.headers),
                        content_type,
                        body,
                    )
                    .await;
            }
        });

        Ok(())
    }
}

fn header_value(headers: &Value, name: &str) -> Option<String> {
    headers.as_object().and_then(|map| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.as_str())
            .map(|v| v.to_string())
    })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_filter_tracks_everything() {
        let filter = TrafficFilter::from_spec(None).unwrap();
        assert!(filter.tracks("https://anything.example/"));
    }

    #[test]
    fn test_include_filter_match_any_of() {
        let spec = TrafficFilterSpec {
            include: vec![
                r"^https://api\.example\.com".to_string(),
                r"/graphql$".to_string(),
            ],
        };
        let filter = TrafficFilter::from_spec(Some(&spec)).unwrap();

        assert!(filter.tracks("https://api.example.com/x"));
        assert!(filter.tracks("https://other.example.com/graphql"));
        assert!(!filter.tracks("https://cdn.example.com/x"));
    }

    #[test]
    fn test_empty_include_list_tracks_nothing() {
        let spec = TrafficFilterSpec { include: vec![] };
        let filter = TrafficFilter::from_spec(Some(&spec)).unwrap();
        assert!(!filter.tracks("https://api.example.com/x"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let spec = TrafficFilterSpec {
            include: vec!["[unclosed".to_string()],
        };
        assert!(matches!(
            TrafficFilter::from_spec(Some(&spec)),
            Err(SnapshotError::InvalidFilterPattern(_))
        ));
    }

    #[test]
    fn test_tracked_resource_kinds() {
        for kind in [
            ResourceType::Document,
            ResourceType::Stylesheet,
            ResourceType::Script,
            ResourceType::Image,
            ResourceType::Xhr,
        ] {
            assert!(is_tracked_kind(Some(&kind)), "{:?} should be tracked", kind);
        }

        for kind in [
            ResourceType::Font,
            ResourceType::Media,
            ResourceType::Fetch,
            ResourceType::WebSocket,
            ResourceType::Other,
        ] {
            assert!(!is_tracked_kind(Some(&kind)), "{:?} should pass untracked", kind);
        }

        assert!(!is_tracked_kind(None));
    }

    #[test]
    fn test_response_skip_rules() {
        // Plain response to a tracked request: recorded.
        assert!(!should_skip_response(false, "https://api.example.com/x", "GET"));

        // Cache-served, blob-scheme and preflight responses: never recorded.
        assert!(should_skip_response(true, "https://api.example.com/x", "GET"));
        assert!(should_skip_response(false, "blob:https://api.example.com/abc", "GET"));
        assert!(should_skip_response(false, "https://api.example.com/x", "OPTIONS"));
        assert!(should_skip_response(false, "https://api.example.com/x", "options"));
    }

    #[test]
    fn test_blob_urls_detected() {
        assert!(is_blob_url(
            "blob:https://example.com/9115d58c-bcda-ff47-86e5-083e9a2153041"
        ));
        assert!(!is_blob_url("https://example.com/blob:fake"));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let headers = json!({"Content-Type": "application/json", "x-req": "1"});
        assert_eq!(
            header_value(&headers, "content-type").as_deref(),
            Some("application/json")
        );
        assert_eq!(header_value(&headers, "accept"), None);
    }
}
