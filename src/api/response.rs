//! Uniform response record returned to callers

use super::http::HttpResponse;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Result of [`RestClient::process_request`](super::client::RestClient::process_request).
///
/// A live fetch fills every field. A cache hit carries only `content` and
/// `json_content`. Any failure yields the empty record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_delta: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ApiResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn cached(content: String, json_content: Value) -> Self {
        Self {
            content: Some(content),
            json_content: Some(json_content),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.json_content.is_none()
    }

    /// True for records served from the cache
    pub fn is_cached(&self) -> bool {
        !self.is_empty() && self.status_code.is_none()
    }
}

impl From<HttpResponse> for ApiResponse {
    fn from(response: HttpResponse) -> Self {
        Self {
            content: Some(response.content),
            json_content: Some(response.json_content),
            status_code: Some(response.status_code),
            headers: Some(response.headers),
            time_delta: Some(response.elapsed),
            url: Some(response.url),
        }
    }
}
