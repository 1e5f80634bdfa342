//! Resource abstraction layer
//!
//! This module provides a data-driven description of each translation
//! platform's REST API. Engine tables are loaded from JSON files at compile
//! time, so new services can be added without code changes.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches engine tables from embedded JSON
//! - [`resolver`] - Resolves a service name to its entry and builds resource paths
//!
//! # Engine Tables
//!
//! Tables live under `src/resources/`, one per engine. Each maps
//! `resource group -> mount point -> HTTP method -> entry`, plus a flat
//! `service name -> (group, mount point, method)` table.
//!
//! # Example
//!
//! ```
//! use transtats_rest::resource::{Engine, Extension, Registry, ServiceConfig};
//!
//! let registry = Registry::builtin();
//! let config = ServiceConfig::resolve(&registry, Engine::Zanata, "proj_trans_stats", None)?;
//! let path = config.resource_path(&["fedora", "master"], &Extension::All)?;
//! assert_eq!(path, "/rest/stats/proj/fedora/iter/master?detail=true&word=true");
//! # Ok::<(), transtats_rest::ClientError>(())
//! ```

pub mod registry;
pub mod resolver;

pub use registry::{
    AuthScheme, Engine, EngineConfig, MountTable, Registry, RegistryEntry, ServiceDef,
};
pub use resolver::{Extension, ServiceConfig};
