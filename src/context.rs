// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for everything that talks to OpenStack.
//!
//! Callers build one [`Context`] per process and clone it freely. It holds:
//! - The validated configuration
//! - The session provider (the per-scope Keystone session cache)
//! - The local shadow-row store
//! - The registry of model descriptions, built once at startup

use crate::config::OpenStackConfig;
use crate::errors::ConfigError;
use crate::models;
use crate::openstack::request::RemoteClient;
use crate::openstack::session::{SessionCache, SessionProvider};
use crate::openstack::shortcut::ResourceShortcut;
use crate::openstack::types::Scope;
use crate::remote::meta::ModelRegistry;
use crate::remote::objects::RemoteObjects;
use crate::remote::record::RemoteModel;
use crate::remote::store::ShadowStore;
use std::sync::Arc;

/// Shared context passed to every remote-backed operation.
#[derive(Clone)]
pub struct Context {
    config: Arc<OpenStackConfig>,
    sessions: Arc<dyn SessionProvider>,
    store: Arc<dyn ShadowStore>,
    registry: Arc<ModelRegistry>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("models", &self.registry.names())
            .field("compatibility", &self.config.compatibility)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Context backed by a Keystone session cache and the crate's models.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the auth URL is invalid or a model
    /// declaration is rejected.
    pub fn new(config: OpenStackConfig, store: Arc<dyn ShadowStore>) -> Result<Self, ConfigError> {
        let config = Arc::new(config);
        let sessions = Arc::new(SessionCache::new(config.clone())?);
        Self::with_sessions(config, sessions, store)
    }

    /// Context with an explicit session provider.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a model declaration is rejected.
    pub fn with_sessions(
        config: Arc<OpenStackConfig>,
        sessions: Arc<dyn SessionProvider>,
        store: Arc<dyn ShadowStore>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            config,
            sessions,
            store,
            registry: Arc::new(models::registry()?),
        })
    }

    #[must_use]
    pub fn config(&self) -> &OpenStackConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<dyn SessionProvider> {
        &self.sessions
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ShadowStore> {
        &self.store
    }

    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Request client for `scope`.
    #[must_use]
    pub fn client(&self, scope: Scope) -> RemoteClient {
        RemoteClient::new(self.sessions.clone(), scope)
    }

    /// Admin-scoped handle for model `M` with the configured compatibility flags.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownModel`] if `M` is not registered.
    pub fn objects<M: RemoteModel>(&self) -> Result<RemoteObjects<M>, ConfigError> {
        let meta = self.registry.meta::<M>()?;
        Ok(
            RemoteObjects::new(meta, self.client(Scope::Admin), self.store.clone())
                .with_compatibility(self.config.compatibility),
        )
    }

    /// Admin-scoped shortcut for a collection that has no local model.
    #[must_use]
    pub fn shortcut(&self, service: &str, resource: &str) -> ResourceShortcut {
        ResourceShortcut::new(self.client(Scope::Admin), service, resource)
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
