// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Model-less access to one OpenStack resource collection.
//!
//! [`ResourceShortcut`] wraps a [`RemoteClient`] for callers that need a remote
//! resource without mirroring it locally. Responses are unwrapped from the
//! OpenStack `{"<resource>": ...}` envelope.
//!
//! # Example
//!
//! ```rust,no_run
//! use kamaji::openstack::{RemoteClient, ResourceShortcut};
//! use serde_json::json;
//!
//! # async fn example(client: RemoteClient) -> Result<(), kamaji::errors::OpenStackError> {
//! let flavors = ResourceShortcut::new(client, "compute", "flavors/detail");
//! let small = flavors.get(&[("name", json!("m1.small"))]).await?;
//! println!("{}", small["id"]);
//! # Ok(())
//! # }
//! ```

use crate::constants::COLLECTION_LINKS_SUFFIX;
use crate::errors::OpenStackError;
use crate::openstack::request::RemoteClient;
use crate::openstack::types::{ResourcePath, UpdateMethod};
use serde_json::Value;
use tracing::debug;

/// Thin typed-error client for one `{service, resource, path}`.
#[derive(Debug, Clone)]
pub struct ResourceShortcut {
    client: RemoteClient,
    service: String,
    resource: String,
    path: ResourcePath,
}

impl ResourceShortcut {
    #[must_use]
    pub fn new(client: RemoteClient, service: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            client,
            service: service.into(),
            resource: resource.into(),
            path: ResourcePath::collection(),
        }
    }

    /// Address `resource/<path>` instead of the collection.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<ResourcePath>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// Fetch the resource.
    ///
    /// Without filters the unwrapped body is returned as is. With filters the
    /// unwrapped collection is narrowed by equality on every filter key and
    /// exactly one item must remain.
    ///
    /// # Errors
    ///
    /// - [`OpenStackError::NotFound`] if no item matches the filters
    /// - [`OpenStackError::MultipleObjectsReturned`] if several items match
    /// - any error of [`RemoteClient::request`]
    pub async fn get(&self, filters: &[(&str, Value)]) -> Result<Value, OpenStackError> {
        let response = self
            .client
            .get(&self.service, &self.resource, &self.path)
            .await?;
        let resource = unwrap_envelope(response.json()?);

        if filters.is_empty() {
            return Ok(resource);
        }

        let mut matches = match resource {
            Value::Array(items) => items
                .into_iter()
                .filter(|item| matches_filters(item, filters))
                .collect::<Vec<_>>(),
            single if matches_filters(&single, filters) => vec![single],
            _ => Vec::new(),
        };
        debug!(
            service = %self.service,
            resource = %self.resource,
            filters = %describe_filters(filters),
            matches = matches.len(),
            "Filtered OpenStack collection"
        );

        match matches.len() {
            0 => Err(OpenStackError::NotFound(format!(
                "No item match for {}",
                describe_filters(filters)
            ))),
            1 => Ok(matches.remove(0)),
            count => Err(OpenStackError::MultipleObjectsReturned(format!(
                "Filtered GET returned more than one resource for filters {} -- it returned {count}",
                describe_filters(filters)
            ))),
        }
    }

    /// POST `body` and return the unwrapped response.
    ///
    /// # Errors
    ///
    /// Any error of [`RemoteClient::request`], or
    /// [`OpenStackError::InvalidResponse`] if the body is not JSON.
    pub async fn post(&self, body: &Value) -> Result<Value, OpenStackError> {
        let response = self
            .client
            .post(&self.service, &self.resource, &self.path, body)
            .await?;
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(unwrap_envelope(response.json()?))
    }

    /// PUT or PATCH `body`.
    ///
    /// # Errors
    ///
    /// Any error of [`RemoteClient::request`].
    pub async fn update(&self, method: UpdateMethod, body: &Value) -> Result<(), OpenStackError> {
        self.client
            .update(method, &self.service, &self.resource, &self.path, body, &[])
            .await?;
        Ok(())
    }

    /// DELETE the addressed resource.
    ///
    /// # Errors
    ///
    /// Any error of [`RemoteClient::request`].
    pub async fn delete(&self) -> Result<(), OpenStackError> {
        self.client
            .delete(&self.service, &self.resource, &self.path)
            .await?;
        Ok(())
    }
}

/// Strip the OpenStack `{"<name>": ...}` envelope.
///
/// Collections may carry a `<name>_links` pagination sibling; the first key
/// that is not such a sibling wins. Anything that is not an object is
/// returned unchanged.
#[must_use]
pub fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) => {
            let key = map
                .keys()
                .find(|key| !key.ends_with(COLLECTION_LINKS_SUFFIX))
                .or_else(|| map.keys().next())
                .cloned();
            match key {
                Some(key) => map.remove(&key).unwrap_or(Value::Null),
                None => Value::Object(map),
            }
        }
        other => other,
    }
}

fn matches_filters(item: &Value, filters: &[(&str, Value)]) -> bool {
    filters
        .iter()
        .all(|(key, expected)| item.get(*key).is_some_and(|actual| actual == expected))
}

fn describe_filters(filters: &[(&str, Value)]) -> String {
    let pairs = filters
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{pairs}}}")
}

#[cfg(test)]
#[path = "shortcut_tests.rs"]
mod shortcut_tests;
