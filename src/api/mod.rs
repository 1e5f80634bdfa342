//! Platform API interaction module
//!
//! This module provides the core functionality for querying translation
//! platform REST APIs: credentials, the HTTP handle, and the client facade.
//!
//! # Module Structure
//!
//! - [`auth`] - Caller credentials and how each engine presents them
//! - [`client`] - Main client tying resolution, caching and HTTP together
//! - [`http`] - HTTP execution handle for GET calls
//! - [`response`] - Uniform response record
//!
//! # Example
//!
//! ```no_run
//! use transtats_rest::{Engine, RequestOptions, RestClient};
//!
//! async fn example() -> Result<(), transtats_rest::ClientError> {
//!     let client = RestClient::new(Engine::Weblate, "https://hosted.weblate.org")?;
//!     let stats = client
//!         .process_request("component_stats", &["weblate", "application"], RequestOptions::new().ext(true))
//!         .await?;
//!     if let Some(json) = stats.json_content {
//!         println!("{}", json);
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod response;
