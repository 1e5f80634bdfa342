//! Service Resolver
//!
//! Turns an (engine, service name) pair into the registry entry it names and
//! builds the concrete resource path for a request.

use super::registry::{AuthScheme, Engine, EngineConfig, Registry, RegistryEntry, ServiceDef};
use crate::api::auth::{Credentials, HttpAuth};
use crate::error::ClientError;

/// Which query string, if any, to append to the resource path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Extension {
    /// No query string
    #[default]
    None,
    /// Every configured query param, joined with `&`
    All,
    /// This query string verbatim; configured params are ignored
    Literal(String),
}

impl From<bool> for Extension {
    fn from(all: bool) -> Self {
        if all {
            Extension::All
        } else {
            Extension::None
        }
    }
}

impl From<&str> for Extension {
    fn from(query: &str) -> Self {
        Extension::Literal(query.to_string())
    }
}

impl From<String> for Extension {
    fn from(query: String) -> Self {
        Extension::Literal(query)
    }
}

/// Resolved configuration for one service of one engine
#[derive(Debug, Clone)]
pub struct ServiceConfig<'r> {
    engine: &'r EngineConfig,
    service: &'r ServiceDef,
    entry: &'r RegistryEntry,
    auth: Option<HttpAuth>,
}

impl<'r> ServiceConfig<'r> {
    /// Look up `service` in the engine's table
    pub fn resolve(
        registry: &'r Registry,
        engine: Engine,
        service: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Self, ClientError> {
        let engine_config = registry
            .engine(engine)
            .ok_or_else(|| ClientError::UnknownEngine(engine.to_string()))?;

        let service_def =
            engine_config
                .services
                .get(service)
                .ok_or_else(|| ClientError::UnknownService {
                    engine,
                    service: service.to_string(),
                })?;

        let entry = engine_config
            .entry(
                &service_def.rest_resource,
                &service_def.mount_point,
                &service_def.http_method,
            )
            .ok_or_else(|| ClientError::MissingRegistryEntry {
                engine,
                group: service_def.rest_resource.clone(),
                mount_point: service_def.mount_point.clone(),
                method: service_def.http_method.clone(),
            })?;

        Ok(Self {
            engine: engine_config,
            service: service_def,
            entry,
            auth: HttpAuth::for_scheme(engine_config.auth, credentials),
        })
    }

    pub fn engine(&self) -> Engine {
        self.engine.engine
    }

    pub fn resource_group(&self) -> &'r str {
        &self.service.rest_resource
    }

    /// All mount points under the active resource group
    pub fn mount_points(&self) -> Vec<&'r str> {
        self.engine
            .resources
            .get(&self.service.rest_resource)
            .map(|mounts| mounts.keys().map(|m| m.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn mount_point(&self) -> &'r str {
        &self.service.mount_point
    }

    /// Middle URL + mount point, placeholders not yet substituted
    pub fn resource(&self) -> String {
        format!("{}{}", self.engine.middle_url, self.service.mount_point)
    }

    pub fn http_method(&self) -> &'r str {
        &self.service.http_method
    }

    pub fn auth(&self) -> Option<&HttpAuth> {
        self.auth.as_ref()
    }

    pub fn auth_scheme(&self) -> AuthScheme {
        self.engine.auth
    }

    pub fn path_params(&self) -> &'r [String] {
        &self.entry.path_params
    }

    pub fn query_params(&self) -> &'r [String] {
        &self.entry.query_params
    }

    pub fn request_media_type(&self) -> Option<&'r str> {
        self.entry.request_media_type.as_deref()
    }

    pub fn response_media_type(&self) -> Option<&'r str> {
        self.entry.response_media_type.as_deref()
    }

    /// Substitute `args` positionally into the path template and append the
    /// query extension.
    pub fn resource_path(&self, args: &[&str], ext: &Extension) -> Result<String, ClientError> {
        let params = self.path_params();
        if args.len() != params.len() {
            return Err(ClientError::PathParamMismatch {
                template: self.resource(),
                expected: params.len(),
                got: args.len(),
            });
        }

        let mut path = self.resource();
        for (name, value) in params.iter().zip(args) {
            let placeholder = format!("{{{}}}", name);
            path = path.replacen(&placeholder, &urlencoding::encode(value), 1);
        }

        match ext {
            Extension::None => {}
            Extension::All => {
                if !self.query_params().is_empty() {
                    path.push('?');
                    path.push_str(&self.query_params().join("&"));
                }
            }
            Extension::Literal(query) => {
                if !query.is_empty() {
                    path.push('?');
                    path.push_str(query);
                }
            }
        }

        Ok(path)
    }
}
