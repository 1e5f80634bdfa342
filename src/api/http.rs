//! HTTP execution handle for platform REST calls

use super::auth::HttpAuth;
use crate::error::{ClientError, FetchError};
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("transtats-rest/", env!("CARGO_PKG_VERSION"));

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let char_count = body.chars().count();
    let truncated = if char_count > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Transport settings, fixed per client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    /// Whole-request timeout (connect + read)
    pub timeout: Duration,
    pub max_redirects: usize,
    pub verify_tls: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            max_redirects: 10,
            verify_tls: true,
        }
    }
}

/// A fully resolved request
#[derive(Debug)]
pub struct HttpRequest<'a> {
    pub base_url: &'a str,
    pub resource: &'a str,
    pub method: &'a str,
    pub headers: HeaderMap,
    pub auth: Option<&'a HttpAuth>,
    /// Never sent; GET requests carry no body
    pub body: Option<&'a str>,
}

impl HttpRequest<'_> {
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.resource)
    }
}

/// Normalized successful response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub elapsed: Duration,
    pub content: String,
    /// Parsed body, `{}` when the body is not JSON
    pub json_content: Value,
    /// Final URL after redirects
    pub url: String,
}

/// HTTP client wrapper for platform API calls
#[derive(Clone)]
pub struct RestHandle {
    client: Client,
    settings: HttpSettings,
}

impl RestHandle {
    /// Create a new handle
    pub fn new(settings: HttpSettings) -> Result<Self, ClientError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.timeout)
            .redirect(Policy::limited(settings.max_redirects))
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()?;

        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    /// Execute a request. Only GET is ever sent; anything else is refused
    /// without touching the network.
    pub async fn execute(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, FetchError> {
        if !request.method.eq_ignore_ascii_case("GET") {
            tracing::debug!("Refusing {} {}", request.method, request.url());
            return Err(FetchError::ReadOnly(request.method.to_string()));
        }

        let url = request.url();
        tracing::debug!("GET {}", url);
        if request.body.is_some() {
            tracing::debug!("Ignoring request body for GET {}", url);
        }

        let mut builder = self.client.get(&url).headers(request.headers.clone());
        if let Some(HttpAuth::Basic { username, password }) = request.auth {
            builder = builder.basic_auth(username, Some(password));
        }

        let started = Instant::now();
        let response = builder.send().await?;
        let elapsed = started.elapsed();

        let status = response.status();
        let final_url = response.url().to_string();
        let headers = collect_headers(response.headers());
        let body = response.text().await?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let json_content = serde_json::from_str(&body).unwrap_or_else(|e| {
            tracing::debug!("Response from {} is not JSON: {}", final_url, e);
            Value::Object(Map::new())
        });

        Ok(HttpResponse {
            status_code: status.as_u16(),
            headers,
            elapsed,
            content: body,
            json_content,
            url: final_url,
        })
    }
}

/// Flatten a header map, joining repeated headers with ", "
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    collected
}
