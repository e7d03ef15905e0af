// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-model OpenStack metadata and the model registry.
//!
//! Every remote-backed model is described once by a [`ModelMeta`]: the service
//! and resource it lives at, its singular label, how it is updated, and its
//! declared [`RemoteField`]s. Descriptions are validated when they are built
//! and collected into a [`ModelRegistry`] at startup, so a malformed model is
//! a configuration error rather than a runtime surprise.

use crate::constants::{LOCAL_ID_COLUMN, REMOTE_ID_COLUMN, RESERVED_FIELD_NAMES};
use crate::errors::ConfigError;
use crate::openstack::types::UpdateMethod;
use crate::remote::fields::RemoteField;
use crate::remote::record::RemoteModel;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Static description of one remote-backed model.
#[derive(Debug, Clone)]
pub struct ModelMeta {
    name: String,
    service: String,
    resource: String,
    label: String,
    update_method: UpdateMethod,
    update_headers: Vec<(String, String)>,
    supports_updates: bool,
    fields: Vec<RemoteField>,
    local_columns: Vec<String>,
}

impl ModelMeta {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ModelMetaBuilder {
        ModelMetaBuilder {
            name: name.into(),
            ..ModelMetaBuilder::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Catalog service type (`compute`, `network`, ...).
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Collection path under the service endpoint.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Key wrapping a single resource in request and response bodies.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn update_method(&self) -> UpdateMethod {
        self.update_method
    }

    /// Extra headers sent with every PUT/PATCH.
    #[must_use]
    pub fn update_headers(&self) -> &[(String, String)] {
        &self.update_headers
    }

    /// Whether an already created resource may be saved again.
    #[must_use]
    pub fn supports_updates(&self) -> bool {
        self.supports_updates
    }

    /// Declared fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[RemoteField] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&RemoteField> {
        self.fields.iter().find(|field| field.name() == name)
    }

    #[must_use]
    pub fn is_remote_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Local-only columns stored next to the identities.
    #[must_use]
    pub fn local_columns(&self) -> &[String] {
        &self.local_columns
    }

    /// Whether `name` is a column of the local shadow row.
    #[must_use]
    pub fn is_column(&self, name: &str) -> bool {
        name == LOCAL_ID_COLUMN
            || name == REMOTE_ID_COLUMN
            || self.local_columns.iter().any(|column| column == name)
    }

    /// Field name to source key, for every field that can be read.
    #[must_use]
    pub fn remote_sources(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter(|field| !field.is_write_only())
            .map(|field| (field.name().to_string(), field.source_key().to_string()))
            .collect()
    }

    /// Field name to target key, for every field that can be written.
    #[must_use]
    pub fn remote_targets(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter(|field| !field.is_read_only())
            .map(|field| (field.name().to_string(), field.target_key()))
            .collect()
    }

    /// Field name to target key, for every field that can be written on update.
    #[must_use]
    pub fn remote_mutable_targets(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter(|field| !field.is_read_only() && field.is_mutable())
            .map(|field| (field.name().to_string(), field.target_key()))
            .collect()
    }

    /// Names of all declared remote fields.
    #[must_use]
    pub fn remote_fields(&self) -> Vec<&str> {
        self.fields.iter().map(RemoteField::name).collect()
    }
}

/// Builder for [`ModelMeta`].
#[derive(Debug, Default)]
pub struct ModelMetaBuilder {
    name: String,
    service: Option<String>,
    resource: Option<String>,
    label: Option<String>,
    update_method: UpdateMethod,
    update_headers: Vec<(String, String)>,
    updates_unsupported: bool,
    fields: Vec<RemoteField>,
    local_columns: Vec<String>,
}

impl ModelMetaBuilder {
    #[must_use]
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    #[must_use]
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Override the singular label (defaults to the resource minus its last character).
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn update_method(mut self, method: UpdateMethod) -> Self {
        self.update_method = method;
        self
    }

    #[must_use]
    pub fn update_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.update_headers.push((name.into(), value.into()));
        self
    }

    /// Created resources of this model cannot be saved again.
    #[must_use]
    pub fn updates_unsupported(mut self) -> Self {
        self.updates_unsupported = true;
        self
    }

    #[must_use]
    pub fn field(mut self, field: RemoteField) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn local_column(mut self, column: impl Into<String>) -> Self {
        self.local_columns.push(column.into());
        self
    }

    /// Validate the declaration.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingMetadata`] without a service or resource
    /// - [`ConfigError::ReservedField`] for a field named `id`, `pk` or `remote_id`
    /// - [`ConfigError::DuplicateField`] for a name declared twice
    /// - [`ConfigError::ReadOnlyAndWriteOnly`] for a contradictory field
    pub fn build(self) -> Result<ModelMeta, ConfigError> {
        let missing = |attribute: &str| ConfigError::MissingMetadata {
            model: self.name.clone(),
            attribute: attribute.to_string(),
        };
        let service = self
            .service
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("service"))?;
        let resource = self
            .resource
            .clone()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| missing("resource"))?;

        let mut seen = BTreeSet::new();
        for name in self
            .fields
            .iter()
            .map(RemoteField::name)
            .chain(self.local_columns.iter().map(String::as_str))
        {
            if RESERVED_FIELD_NAMES.contains(&name) || name == LOCAL_ID_COLUMN {
                return Err(ConfigError::ReservedField {
                    model: self.name.clone(),
                    field: name.to_string(),
                });
            }
            if !seen.insert(name) {
                return Err(ConfigError::DuplicateField {
                    model: self.name.clone(),
                    field: name.to_string(),
                });
            }
        }
        for field in &self.fields {
            field.check()?;
        }

        let label = self.label.unwrap_or_else(|| default_label(&resource));

        Ok(ModelMeta {
            name: self.name,
            service,
            resource,
            label,
            update_method: self.update_method,
            update_headers: self.update_headers,
            supports_updates: !self.updates_unsupported,
            fields: self.fields,
            local_columns: self.local_columns,
        })
    }
}

fn default_label(resource: &str) -> String {
    let mut label = resource.to_string();
    label.pop();
    label
}

/// Model descriptions keyed by model name, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<ModelMeta>>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe and register `M`.
    ///
    /// # Errors
    ///
    /// Returns the description error of `M`, or [`ConfigError::DuplicateModel`].
    pub fn register<M: RemoteModel>(&mut self) -> Result<Arc<ModelMeta>, ConfigError> {
        self.register_meta(M::describe()?)
    }

    /// Register an already built description.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateModel`] if the name is taken.
    pub fn register_meta(&mut self, meta: ModelMeta) -> Result<Arc<ModelMeta>, ConfigError> {
        if self.models.contains_key(meta.name()) {
            return Err(ConfigError::DuplicateModel(meta.name().to_string()));
        }
        let meta = Arc::new(meta);
        self.models.insert(meta.name().to_string(), meta.clone());
        Ok(meta)
    }

    /// Description registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownModel`] if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<ModelMeta>, ConfigError> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownModel(name.to_string()))
    }

    /// Description of `M`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownModel`] if `M` was never registered.
    pub fn meta<M: RemoteModel>(&self) -> Result<Arc<ModelMeta>, ConfigError> {
        self.get(M::NAME)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod meta_tests;
