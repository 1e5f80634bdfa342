//! Configuration-driven REST client for translation-platform status APIs.
//!
//! A logical request (engine, service, path arguments, options) is resolved
//! against per-engine tables, served from the response cache when fresh, and
//! otherwise fetched over HTTP and cached for [`cache::EXPIRY_MIN`] minutes.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod resource;

pub use api::auth::{Credentials, HttpAuth};
pub use api::client::{RequestOptions, RestClient};
pub use api::http::{HttpSettings, RestHandle};
pub use api::response::ApiResponse;
pub use cache::{CacheRecord, CacheStore, MemoryStore, ResponseCache, SqliteStore};
pub use config::Config;
pub use error::{ClientError, FetchError};
pub use resource::{Engine, Extension, Registry, ServiceConfig};
