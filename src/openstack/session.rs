// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Authenticated sessions and endpoint catalogs, cached per scope.
//!
//! A [`SessionCache`] authenticates against Keystone with the configured admin
//! credentials, attaches the issued token to a reusable `reqwest::Client`, and
//! resolves the public, version-negotiated endpoint of every service in the
//! catalog. Entries are built lazily on first use of a scope and replaced (never
//! mutated) on re-authentication.
//!
//! # Concurrency
//!
//! The cache map sits behind a `RwLock` that is never held across an `.await`.
//! A new entry is fully constructed before it is published, so readers see
//! either the old entry or the new one. Concurrent rebuilds of the same scope
//! are last-writer-wins.

use crate::config::OpenStackConfig;
use crate::constants::{
    AUTH_TOKEN_HEADER, CURRENT_VERSION_STATUS, HTTP_MULTIPLE_CHOICES, HTTP_UNAUTHORIZED,
    PASSWORD_AUTH_METHOD, PUBLIC_INTERFACE, SELF_LINK_REL, SUBJECT_TOKEN_HEADER,
};
use crate::errors::{ConfigError, OpenStackError};
use crate::http_errors::{map_status_to_error, map_transport_error};
use crate::metrics;
use crate::openstack::types::Scope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

/// One authenticated channel: a client carrying the token and the resolved catalog.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    client: HttpClient,
    endpoints: BTreeMap<String, String>,
    expires_at: Option<DateTime<Utc>>,
}

impl SessionInfo {
    #[must_use]
    pub fn new(
        client: HttpClient,
        endpoints: BTreeMap<String, String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            client,
            endpoints,
            expires_at,
        }
    }

    /// Client with the `X-Auth-Token` default header.
    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Service type to versioned base URL.
    #[must_use]
    pub fn endpoints(&self) -> &BTreeMap<String, String> {
        &self.endpoints
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Base URL for `service`.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::EndpointNotFound`] naming the known services.
    pub fn endpoint(&self, service: &str) -> Result<&str, OpenStackError> {
        self.endpoints
            .get(service)
            .map(String::as_str)
            .ok_or_else(|| OpenStackError::EndpointNotFound {
                service: service.to_string(),
                known: self.endpoints.keys().cloned().collect(),
            })
    }

    /// Whether the token's advertised expiry has passed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Source of authenticated sessions per scope.
///
/// The request client depends on this trait rather than on [`SessionCache`]
/// so that tests can supply a fixed catalog.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Cached session for `scope`, building one if missing.
    async fn get_session(&self, scope: &Scope) -> Result<Arc<SessionInfo>, OpenStackError>;

    /// Cached endpoint catalog for `scope`, building a session if missing.
    async fn get_endpoints(
        &self,
        scope: &Scope,
    ) -> Result<BTreeMap<String, String>, OpenStackError> {
        Ok(self.get_session(scope).await?.endpoints().clone())
    }

    /// Drop the cached entry for `scope`; the next access rebuilds it.
    fn invalidate(&self, scope: &Scope);
}

/// Process-lifetime cache of Keystone sessions keyed by scope.
pub struct SessionCache {
    config: Arc<OpenStackConfig>,
    auth_url: String,
    http: HttpClient,
    sessions: RwLock<HashMap<Scope, Arc<SessionInfo>>>,
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("auth_url", &self.auth_url)
            .field("scopes", &self.cached_scopes())
            .finish_non_exhaustive()
    }
}

impl SessionCache {
    /// Create an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the auth URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: Arc<OpenStackConfig>) -> Result<Self, ConfigError> {
        let auth_url = config.auth_url()?;
        let http = HttpClient::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ConfigError::InvalidSetting {
                setting: "http_client".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            config,
            auth_url,
            http,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Scopes that currently have a cached entry.
    #[must_use]
    pub fn cached_scopes(&self) -> Vec<Scope> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut scopes: Vec<Scope> = sessions.keys().cloned().collect();
        scopes.sort();
        scopes
    }

    fn cached(&self, scope: &Scope) -> Option<Arc<SessionInfo>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(scope)
            .filter(|info| !info.is_expired_at(Utc::now()))
            .cloned()
    }

    fn publish(&self, scope: &Scope, info: Arc<SessionInfo>) {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        sessions.insert(scope.clone(), info);
    }

    /// Authenticate and build a complete entry for `scope`.
    async fn create_session_info(&self, scope: &Scope) -> Result<SessionInfo, OpenStackError> {
        info!(scope = %scope, "Creating a new OpenStack session");

        let body = auth_request_body(&self.config, scope);
        let response = self
            .http
            .post(&self.auth_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(&e))?;

        let status = response.status().as_u16();
        if status == HTTP_UNAUTHORIZED {
            error!(scope = %scope, "Keystone rejected the configured credentials");
            return Err(OpenStackError::Authentication {
                scope: scope.clone(),
            });
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .cloned()
            .ok_or_else(|| {
                OpenStackError::InvalidResponse(format!(
                    "identity response (HTTP {status}) carried no {SUBJECT_TOKEN_HEADER} header"
                ))
            });

        let text = response.text().await.map_err(|e| map_transport_error(&e))?;
        if let Some(err) = map_status_to_error(status, text.clone()) {
            error!(scope = %scope, status = status, "Token request failed");
            return Err(err);
        }
        let mut token = token?;
        token.set_sensitive(true);

        let envelope: TokenEnvelope = serde_json::from_str(&text).map_err(|e| {
            OpenStackError::InvalidResponse(format!("malformed token response: {e}"))
        })?;

        let client = self.authenticated_client(token)?;
        let catalog = public_endpoints(&envelope.token.catalog)?;

        let mut endpoints = BTreeMap::new();
        for (service, endpoint) in catalog {
            let versioned = self.retrieve_versioned_endpoint(&endpoint).await?;
            debug!(service = %service, endpoint = %versioned, "Resolved service endpoint");
            endpoints.insert(service, versioned);
        }

        metrics::record_session_created(scope.kind());
        Ok(SessionInfo::new(
            client,
            endpoints,
            envelope.token.expires_at,
        ))
    }

    fn authenticated_client(&self, token: HeaderValue) -> Result<HttpClient, OpenStackError> {
        let name = HeaderName::from_bytes(AUTH_TOKEN_HEADER.as_bytes())
            .map_err(|e| OpenStackError::InvalidResponse(e.to_string()))?;
        let mut headers = HeaderMap::new();
        headers.insert(name, token);

        HttpClient::builder()
            .default_headers(headers)
            .timeout(self.config.timeout())
            .build()
            .map_err(|e| map_transport_error(&e))
    }

    /// Ask a bare catalog endpoint for its versions and pick the `CURRENT` one.
    ///
    /// Services answer with 300 Multiple Choices, or 200 for some (neutron).
    /// Anything else, or a body without a usable version list, leaves the
    /// endpoint unchanged. A network failure is fatal.
    async fn retrieve_versioned_endpoint(&self, endpoint: &str) -> Result<String, OpenStackError> {
        let response = self.http.get(endpoint).send().await.map_err(|e| {
            error!(endpoint = %endpoint, error = %e, "Error when retrieving versioned endpoint");
            OpenStackError::EndpointResolution {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status().as_u16();
        if status != HTTP_MULTIPLE_CHOICES && status != 200 {
            return Ok(endpoint.to_string());
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "Version document is not JSON, keeping catalog endpoint");
                return Ok(endpoint.to_string());
            }
        };

        Ok(current_version_link(&body).unwrap_or_else(|| endpoint.to_string()))
    }
}

#[async_trait]
impl SessionProvider for SessionCache {
    async fn get_session(&self, scope: &Scope) -> Result<Arc<SessionInfo>, OpenStackError> {
        if let Some(info) = self.cached(scope) {
            return Ok(info);
        }

        let info = Arc::new(self.create_session_info(scope).await?);
        self.publish(scope, info.clone());
        Ok(info)
    }

    fn invalidate(&self, scope: &Scope) {
        debug!(scope = %scope, "Invalidating cached OpenStack session");
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        sessions.remove(scope);
    }
}

#[derive(Debug, Deserialize)]
struct TokenEnvelope {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CatalogEndpoint {
    pub interface: String,
    pub url: String,
}

/// Keystone v3 password authentication body, project-scoped unless `scope` is admin.
pub(crate) fn auth_request_body(config: &OpenStackConfig, scope: &Scope) -> Value {
    let mut body = json!({
        "auth": {
            "identity": {
                "methods": [PASSWORD_AUTH_METHOD],
                "password": {
                    "user": {
                        "name": config.username,
                        "password": config.password,
                        "domain": {
                            "name": config.user_domain_name
                        }
                    }
                }
            }
        }
    });

    if let Some(project) = scope.project_id() {
        body["auth"]["scope"] = json!({
            "project": {
                "id": project
            }
        });
    }

    body
}

/// Map every catalog entry to its public interface URL.
///
/// # Errors
///
/// Returns [`OpenStackError::MissingCatalogItem`] if a service has no public interface.
pub(crate) fn public_endpoints(
    catalog: &[CatalogEntry],
) -> Result<BTreeMap<String, String>, OpenStackError> {
    catalog
        .iter()
        .map(|service| {
            service
                .endpoints
                .iter()
                .find(|endpoint| endpoint.interface == PUBLIC_INTERFACE)
                .map(|endpoint| (service.service_type.clone(), endpoint.url.clone()))
                .ok_or_else(|| OpenStackError::MissingCatalogItem {
                    key: "interface".to_string(),
                    value: PUBLIC_INTERFACE.to_string(),
                })
        })
        .collect()
}

/// The `self` link of the `CURRENT` version in a version document.
///
/// Accepts both `{"versions": [...]}` and Keystone's `{"versions": {"values": [...]}}`.
pub(crate) fn current_version_link(document: &Value) -> Option<String> {
    let versions = document.get("versions")?;
    let versions = versions
        .as_array()
        .or_else(|| versions.get("values").and_then(Value::as_array))?;

    let current = versions
        .iter()
        .find(|version| version.get("status").and_then(Value::as_str) == Some(CURRENT_VERSION_STATUS))?;

    current
        .get("links")?
        .as_array()?
        .iter()
        .find(|link| link.get("rel").and_then(Value::as_str) == Some(SELF_LINK_REL))?
        .get("href")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
