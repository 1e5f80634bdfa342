//! REST Client
//!
//! Main client for querying a translation platform, combining service
//! resolution, the response cache, and the HTTP handle.

use super::auth::Credentials;
use super::http::{HttpRequest, HttpSettings, RestHandle};
use super::response::ApiResponse;
use crate::cache::ResponseCache;
use crate::error::ClientError;
use crate::resource::{Engine, Extension, Registry, ServiceConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Per-request options
#[derive(Clone, Default)]
pub struct RequestOptions {
    /// Extra headers; these win over the derived `Accept`/`Content-Type`
    pub headers: BTreeMap<String, String>,
    /// Passed through, never sent (GET only)
    pub body: Option<String>,
    pub ext: Extension,
    pub auth_user: Option<String>,
    pub auth_token: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn ext(mut self, ext: impl Into<Extension>) -> Self {
        self.ext = ext.into();
        self
    }

    pub fn auth(mut self, user: impl Into<String>, token: impl Into<String>) -> Self {
        self.auth_user = Some(user.into());
        self.auth_token = Some(token.into());
        self
    }
}

// Security: the token never reaches logs or the cache audit fields
impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("headers", &redact_headers(&self.headers))
            .field("body", &self.body)
            .field("ext", &self.ext)
            .field("auth_user", &self.auth_user)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn redact_headers(headers: &BTreeMap<String, String>) -> BTreeMap<&str, &str> {
    headers
        .iter()
        .map(|(name, value)| {
            let lower = name.to_ascii_lowercase();
            if lower.contains("token") || lower == "authorization" {
                (name.as_str(), "<redacted>")
            } else {
                (name.as_str(), value.as_str())
            }
        })
        .collect()
}

/// REST client bound to one engine and base URL
#[derive(Clone)]
pub struct RestClient {
    engine: Engine,
    base_url: String,
    registry: Arc<Registry>,
    handle: RestHandle,
    cache: ResponseCache,
    save_response: bool,
}

impl RestClient {
    /// Whether successful responses are cached unless told otherwise
    pub const SAVE_RESPONSE: bool = true;

    /// Create a client with default transport settings and an in-memory cache
    pub fn new(engine: Engine, base_url: &str) -> Result<Self, ClientError> {
        Self::with_settings(engine, base_url, HttpSettings::default())
    }

    /// Create a client with explicit transport settings
    pub fn with_settings(
        engine: Engine,
        base_url: &str,
        settings: HttpSettings,
    ) -> Result<Self, ClientError> {
        Url::parse(base_url).map_err(|source| ClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;

        Ok(Self {
            engine,
            base_url: base_url.trim_end_matches('/').to_string(),
            registry: Registry::builtin(),
            handle: RestHandle::new(settings)?,
            cache: ResponseCache::in_memory(),
            save_response: Self::SAVE_RESPONSE,
        })
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    /// Enable or disable caching of successful responses
    pub fn save_response(mut self, enabled: bool) -> Self {
        self.save_response = enabled;
        self
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn verifies_tls(&self) -> bool {
        self.handle.settings().verify_tls
    }

    /// Skip TLS certificate validation for every later request
    pub fn disable_ssl_cert_validation(&mut self) -> Result<(), ClientError> {
        if !self.verifies_tls() {
            return Ok(());
        }
        let settings = HttpSettings {
            verify_tls: false,
            ..self.handle.settings().clone()
        };
        self.handle = RestHandle::new(settings)?;
        tracing::warn!("TLS certificate validation disabled for {}", self.base_url);
        Ok(())
    }

    /// Resolve a service of this client's engine
    pub fn resolve(
        &self,
        service: &str,
        credentials: Option<&Credentials>,
    ) -> Result<ServiceConfig<'_>, ClientError> {
        ServiceConfig::resolve(&self.registry, self.engine, service, credentials)
    }

    /// Fetch `service` with `path_args`, serving from the cache when fresh.
    ///
    /// Configuration mistakes come back as `Err`. Network and HTTP failures
    /// are logged and produce an empty [`ApiResponse`].
    pub async fn process_request(
        &self,
        service: &str,
        path_args: &[&str],
        options: RequestOptions,
    ) -> Result<ApiResponse, ClientError> {
        let request_kwargs = format!("{:?}", options);
        let RequestOptions {
            headers: caller_headers,
            body,
            ext,
            auth_user,
            auth_token,
        } = options;

        let credentials = Credentials::from_parts(auth_user.as_deref(), auth_token.as_deref());
        let service_config = self.resolve(service, credentials.as_ref())?;

        // Later inserts win: auth headers, then media types, then the caller's own
        let mut headers = HeaderMap::new();
        if let Some(credentials) = &credentials {
            for (name, value) in credentials.headers_for(service_config.auth_scheme()) {
                insert_header(&mut headers, name, &value)?;
            }
        }
        if let Some(media_type) = service_config.response_media_type() {
            insert_header(&mut headers, ACCEPT.as_str(), media_type)?;
        }
        if let Some(media_type) = service_config.request_media_type() {
            insert_header(&mut headers, CONTENT_TYPE.as_str(), media_type)?;
        }
        for (name, value) in &caller_headers {
            insert_header(&mut headers, name, value)?;
        }

        let resource = service_config.resource_path(path_args, &ext)?;

        // Only GET responses are ever cached, so other methods skip the cache
        let cacheable = service_config.http_method().eq_ignore_ascii_case("GET");
        if cacheable {
            if let Some((content, json_content)) =
                self.cache.lookup(&self.base_url, &resource).await
            {
                return Ok(ApiResponse::cached(content, json_content));
            }
        }

        let request = HttpRequest {
            base_url: &self.base_url,
            resource: &resource,
            method: service_config.http_method(),
            headers,
            auth: service_config.auth(),
            body: body.as_deref(),
        };

        let response = match self.handle.execute(&request).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!("{} {} failed (retryable): {}", self.engine, request.url(), e);
                } else {
                    tracing::warn!("{} {} failed: {}", self.engine, request.url(), e);
                }
                return Ok(ApiResponse::empty());
            }
        };

        if cacheable && self.save_response {
            self.cache
                .store(
                    &self.base_url,
                    &resource,
                    &response.content,
                    &response.json_content,
                    path_args.iter().map(|arg| arg.to_string()).collect(),
                    request_kwargs,
                )
                .await;
        }

        Ok(response.into())
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), ClientError> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ClientError::InvalidHeader(name.to_string()))?;
    let header_value =
        HeaderValue::from_str(value).map_err(|_| ClientError::InvalidHeader(name.to_string()))?;
    headers.insert(header_name, header_value);
    Ok(())
}
