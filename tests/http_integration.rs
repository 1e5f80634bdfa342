//! Integration tests for the REST client using wiremock
//!
//! These tests drive `RestClient::process_request` against mocked
//! endpoints, covering resolution, caching, and every failure mode.

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use transtats_rest::api::http::HttpRequest;
use transtats_rest::{
    CacheRecord, CacheStore, Engine, Extension, FetchError, HttpSettings, MemoryStore, Registry,
    RequestOptions, ResponseCache, RestClient, RestHandle,
};
use wiremock::matchers::{any, basic_auth, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_TABLE: &str = r#"{
    "engine": "transifex",
    "middle_url": "/api/2",
    "auth": "basic",
    "resources": {
        "Translation": {
            "/project/{slug}/resource/{id}": {
                "GET": {
                    "path_params": ["slug", "id"],
                    "query_params": ["lang=en", "fmt=json"],
                    "response_media_type": "application/json"
                }
            },
            "/project/{slug}": {
                "GET": {
                    "path_params": ["slug"],
                    "response_media_type": "application/json"
                },
                "POST": {
                    "path_params": ["slug"],
                    "request_media_type": "application/json"
                }
            }
        }
    },
    "services": {
        "translations": {
            "rest_resource": "Translation",
            "mount_point": "/project/{slug}/resource/{id}",
            "http_method": "GET"
        },
        "project_details": {
            "rest_resource": "Translation",
            "mount_point": "/project/{slug}",
            "http_method": "GET"
        },
        "create_project": {
            "rest_resource": "Translation",
            "mount_point": "/project/{slug}",
            "http_method": "POST"
        }
    }
}"#;

const TRANSLATIONS_PATH: &str = "/api/2/project/myproj/resource/42";

fn test_registry() -> Arc<Registry> {
    Arc::new(Registry::from_json_documents(&[TEST_TABLE]).expect("test table should parse"))
}

fn test_client(base_url: &str, store: Arc<MemoryStore>) -> RestClient {
    test_client_with_settings(base_url, store, HttpSettings::default())
}

fn test_client_with_settings(
    base_url: &str,
    store: Arc<MemoryStore>,
    settings: HttpSettings,
) -> RestClient {
    RestClient::with_settings(Engine::Transifex, base_url, settings)
        .expect("client should build")
        .with_registry(test_registry())
        .with_cache(ResponseCache::new(store))
}

/// Test module for the request pipeline
mod process_request_tests {
    use super::*;

    /// Live fetch returns every field and caches the response
    #[tokio::test]
    async fn test_live_fetch_returns_full_record() {
        let server = MockServer::start().await;
        let body = json!({"translated": 120, "untranslated": 3});

        Mock::given(method("GET"))
            .and(path(TRANSLATIONS_PATH))
            .and(header("accept", "application/json"))
            .and(basic_auth("translator", "api-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let client = test_client(&server.uri(), store.clone());

        let response = client
            .process_request(
                "translations",
                &["myproj", "42"],
                RequestOptions::new().auth("translator", "api-token"),
            )
            .await
            .expect("request should resolve");

        assert_eq!(response.status_code, Some(200));
        assert_eq!(response.json_content, Some(body));
        assert!(response.time_delta.is_some());
        assert!(response.headers.is_some());
        assert_eq!(
            response.url,
            Some(format!("{}{}", server.uri(), TRANSLATIONS_PATH))
        );

        let record = store
            .find(&server.uri(), TRANSLATIONS_PATH)
            .unwrap()
            .expect("response should be cached");
        assert_eq!(record.request_args, vec!["myproj", "42"]);
        assert!(!record.request_kwargs.contains("api-token"));
    }

    /// `ext = true` appends every configured query param
    #[tokio::test]
    async fn test_ext_all_appends_configured_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TRANSLATIONS_PATH))
            .and(query_param("lang", "en"))
            .and(query_param("fmt", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let client = test_client(&server.uri(), store.clone());

        let response = client
            .process_request("translations", &["myproj", "42"], RequestOptions::new().ext(true))
            .await
            .unwrap();

        assert_eq!(response.json_content, Some(json!({"ok": true})));
        assert!(store
            .find(&server.uri(), "/api/2/project/myproj/resource/42?lang=en&fmt=json")
            .unwrap()
            .is_some());
    }

    /// A literal extension replaces the configured query params
    #[tokio::test]
    async fn test_ext_literal_is_appended_verbatim() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TRANSLATIONS_PATH))
            .and(query_param("foo", "bar"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let client = test_client(&server.uri(), store.clone());

        let response = client
            .process_request(
                "translations",
                &["myproj", "42"],
                RequestOptions::new().ext(Extension::Literal("foo=bar".into())),
            )
            .await
            .unwrap();

        assert!(!response.is_empty());
        assert!(store
            .find(&server.uri(), "/api/2/project/myproj/resource/42?foo=bar")
            .unwrap()
            .is_some());
    }

    /// Second call within the TTL is served from the cache
    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TRANSLATIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"stats": [1, 2, 3]})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Arc::new(MemoryStore::new()));

        let first = client
            .process_request("translations", &["myproj", "42"], RequestOptions::new())
            .await
            .unwrap();
        let second = client
            .process_request("translations", &["myproj", "42"], RequestOptions::new())
            .await
            .unwrap();

        assert!(!first.is_cached());
        assert!(second.is_cached());
        assert_eq!(first.content, second.content);
        assert_eq!(first.json_content, second.json_content);
        assert_eq!(second.status_code, None);
        assert_eq!(second.url, None);
    }

    /// Expired entries are refetched and overwritten with a fresh TTL
    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TRANSLATIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"fresh": true})))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store
            .upsert(CacheRecord {
                base_url: server.uri(),
                resource: TRANSLATIONS_PATH.to_string(),
                request_args: vec![],
                request_kwargs: String::new(),
                response_content: "{\"fresh\":false}".into(),
                response_content_json: json!({"fresh": false}),
                expiry: now,
                updated_at: now - ChronoDuration::minutes(60),
            })
            .unwrap();

        let client = test_client(&server.uri(), store.clone());
        let response = client
            .process_request("translations", &["myproj", "42"], RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(response.json_content, Some(json!({"fresh": true})));
        let record = store.find(&server.uri(), TRANSLATIONS_PATH).unwrap().unwrap();
        assert_eq!(record.response_content_json, json!({"fresh": true}));
        assert!(record.expiry > Utc::now() + ChronoDuration::minutes(59));
    }

    /// A 500 yields the empty record and nothing is cached
    #[tokio::test]
    async fn test_server_error_is_empty_and_not_cached() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TRANSLATIONS_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let client = test_client(&server.uri(), store.clone());

        let response = client
            .process_request("translations", &["myproj", "42"], RequestOptions::new())
            .await
            .unwrap();

        assert!(response.is_empty());
        assert!(store.is_empty());
    }

    /// A 404 yields the empty record
    #[tokio::test]
    async fn test_not_found_is_empty() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TRANSLATIONS_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found"})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Arc::new(MemoryStore::new()));
        let response = client
            .process_request("translations", &["myproj", "42"], RequestOptions::new())
            .await
            .unwrap();

        assert!(response.is_empty());
    }

    /// A 2xx with a non-JSON body keeps the raw text and an empty object
    #[tokio::test]
    async fn test_invalid_json_yields_empty_object() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TRANSLATIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<stats>42</stats>"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Arc::new(MemoryStore::new()));
        let response = client
            .process_request("translations", &["myproj", "42"], RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(response.content.as_deref(), Some("<stats>42</stats>"));
        assert_eq!(response.json_content, Some(json!({})));
    }

    /// Non-GET services never reach the network
    #[tokio::test]
    async fn test_non_get_service_makes_no_call() {
        let server = MockServer::start().await;

        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let client = test_client(&server.uri(), store.clone());
        let response = client
            .process_request(
                "create_project",
                &["myproj"],
                RequestOptions::new().body("{\"name\": \"myproj\"}"),
            )
            .await
            .unwrap();

        assert!(response.is_empty());
        assert!(store.is_empty());
    }

    /// A non-GET service sharing a path with a cached GET is not served from the cache
    #[tokio::test]
    async fn test_non_get_service_ignores_cached_get() {
        let server = MockServer::start().await;

        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let cached = CacheRecord {
            base_url: server.uri(),
            resource: "/api/2/project/myproj".into(),
            request_args: vec!["myproj".into()],
            request_kwargs: String::new(),
            response_content: "{\"slug\":\"myproj\"}".into(),
            response_content_json: json!({"slug": "myproj"}),
            expiry: now + ChronoDuration::minutes(30),
            updated_at: now,
        };
        store.upsert(cached.clone()).unwrap();

        let client = test_client(&server.uri(), store.clone());
        let created = client
            .process_request("create_project", &["myproj"], RequestOptions::new())
            .await
            .unwrap();
        assert!(created.is_empty());
        assert!(!created.is_cached());

        let details = client
            .process_request("project_details", &["myproj"], RequestOptions::new())
            .await
            .unwrap();
        assert!(details.is_cached());
        assert_eq!(details.json_content, Some(json!({"slug": "myproj"})));
        assert_eq!(
            store.find(&server.uri(), "/api/2/project/myproj").unwrap(),
            Some(cached)
        );
    }

    /// Disabled response saving leaves the cache untouched
    #[tokio::test]
    async fn test_save_response_disabled() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TRANSLATIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(2)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let client = test_client(&server.uri(), store.clone()).save_response(false);

        for _ in 0..2 {
            let response = client
                .process_request("translations", &["myproj", "42"], RequestOptions::new())
                .await
                .unwrap();
            assert_eq!(response.status_code, Some(200));
        }
        assert!(store.is_empty());
    }

    /// Caller headers override the derived Accept header
    #[tokio::test]
    async fn test_caller_header_overrides_accept() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TRANSLATIONS_PATH))
            .and(header("accept", "text/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Arc::new(MemoryStore::new()));
        let response = client
            .process_request(
                "translations",
                &["myproj", "42"],
                RequestOptions::new().header("Accept", "text/plain"),
            )
            .await
            .unwrap();

        assert_eq!(response.content.as_deref(), Some("ok"));
    }

    /// Zanata credentials travel as X-Auth headers
    #[tokio::test]
    async fn test_zanata_header_token_auth() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/projects/p/fedora"))
            .and(header("X-Auth-User", "translator"))
            .and(header("X-Auth-Token", "api-token"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "fedora"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestClient::new(Engine::Zanata, &server.uri()).unwrap();
        let response = client
            .process_request(
                "project_details",
                &["fedora"],
                RequestOptions::new().auth("translator", "api-token"),
            )
            .await
            .unwrap();

        assert_eq!(response.json_content, Some(json!({"id": "fedora"})));
    }
}

/// Test module for transport failures
mod transport_failure_tests {
    use super::*;

    /// Serve one response whose body stops well short of its Content-Length
    async fn truncated_body_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let uri = format!("http://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\n\
                          content-type: application/json\r\n\
                          content-length: 100\r\n\r\n\
                          {\"translated\":",
                    )
                    .await;
                let _ = socket.shutdown().await;
            }
        });

        uri
    }

    /// A body cut off mid-read is a non-retryable request failure
    #[tokio::test]
    async fn test_truncated_body_is_request_error() {
        let uri = truncated_body_server().await;
        let handle = RestHandle::new(HttpSettings::default()).unwrap();
        let request = HttpRequest {
            base_url: &uri,
            resource: TRANSLATIONS_PATH,
            method: "GET",
            headers: Default::default(),
            auth: None,
            body: None,
        };

        let err = handle.execute(&request).await.unwrap_err();
        assert!(matches!(err, FetchError::Request(_)), "unexpected error: {:?}", err);
        assert!(!err.is_retryable());
        assert_eq!(err.status(), None);
    }

    /// A truncated body yields the empty record and caches nothing
    #[tokio::test]
    async fn test_truncated_body_is_empty_and_not_cached() {
        let uri = truncated_body_server().await;
        let store = Arc::new(MemoryStore::new());
        let client = test_client(&uri, store.clone());

        let response = client
            .process_request("translations", &["myproj", "42"], RequestOptions::new())
            .await
            .unwrap();

        assert!(response.is_empty());
        assert!(store.is_empty());
    }

    /// Connection refused yields the empty record
    #[tokio::test]
    async fn test_connection_error_is_empty() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let uri = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let store = Arc::new(MemoryStore::new());
        let client = test_client(&uri, store.clone());
        let response = client
            .process_request("translations", &["myproj", "42"], RequestOptions::new())
            .await
            .unwrap();

        assert!(response.is_empty());
        assert!(store.is_empty());
    }

    /// Slow responses past the timeout yield the empty record
    #[tokio::test]
    async fn test_timeout_is_empty() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TRANSLATIONS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"late": true}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let settings = HttpSettings {
            timeout: Duration::from_millis(200),
            ..HttpSettings::default()
        };
        let client = test_client_with_settings(&server.uri(), Arc::new(MemoryStore::new()), settings);
        let response = client
            .process_request("translations", &["myproj", "42"], RequestOptions::new())
            .await
            .unwrap();

        assert!(response.is_empty());
    }

    /// Redirect loops past the limit yield the empty record
    #[tokio::test]
    async fn test_too_many_redirects_is_empty() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TRANSLATIONS_PATH))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", TRANSLATIONS_PATH))
            .mount(&server)
            .await;

        let settings = HttpSettings {
            max_redirects: 2,
            ..HttpSettings::default()
        };
        let client = test_client_with_settings(&server.uri(), Arc::new(MemoryStore::new()), settings);
        let response = client
            .process_request("translations", &["myproj", "42"], RequestOptions::new())
            .await
            .unwrap();

        assert!(response.is_empty());
    }

    /// A broken cache store never blocks a successful response
    #[tokio::test]
    async fn test_broken_cache_store_is_bypassed() {
        struct BrokenStore;

        impl CacheStore for BrokenStore {
            fn find(&self, _: &str, _: &str) -> anyhow::Result<Option<CacheRecord>> {
                Err(anyhow::anyhow!("database unavailable"))
            }

            fn upsert(&self, _: CacheRecord) -> anyhow::Result<()> {
                Err(anyhow::anyhow!("database unavailable"))
            }

            fn purge_expired(&self, _: chrono::DateTime<Utc>) -> anyhow::Result<usize> {
                Err(anyhow::anyhow!("database unavailable"))
            }
        }

        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TRANSLATIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestClient::new(Engine::Transifex, &server.uri())
            .unwrap()
            .with_registry(test_registry())
            .with_cache(ResponseCache::new(Arc::new(BrokenStore)));
        let response = client
            .process_request("translations", &["myproj", "42"], RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(response.status_code, Some(200));
        assert_eq!(response.json_content, Some(json!({"ok": true})));
    }
}
