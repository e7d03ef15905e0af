// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Keystone projects.
//!
//! Projects are updated with PATCH. Their domain is fixed at creation, so
//! updates only ever carry the name, the enabled flag and the description.

use crate::errors::ConfigError;
use crate::models::string_value;
use crate::openstack::types::UpdateMethod;
use crate::remote::fields::RemoteField;
use crate::remote::meta::ModelMeta;
use crate::remote::record::{RemoteModel, RemoteRecord};

/// Longest project name accepted, keeping derived DNS names within limits
pub const NAME_MAX_LENGTH: usize = 40;

/// A Keystone project (`projects`).
#[derive(Debug, Clone)]
pub struct Project(RemoteRecord);

impl Project {
    #[must_use]
    pub fn name(&self) -> Option<String> {
        string_value(&self.0, "name")
    }

    #[must_use]
    pub fn domain_id(&self) -> Option<String> {
        string_value(&self.0, "domain_id")
    }

    #[must_use]
    pub fn description(&self) -> Option<String> {
        string_value(&self.0, "description")
    }

    /// Disabled projects cannot be scoped to; unknown counts as disabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.0.get("enabled").and_then(|value| value.as_bool()).unwrap_or(false)
    }
}

impl RemoteModel for Project {
    const NAME: &'static str = "Project";

    fn describe() -> Result<ModelMeta, ConfigError> {
        ModelMeta::builder(Self::NAME)
            .service("identity")
            .resource("projects")
            .update_method(UpdateMethod::Patch)
            .field(RemoteField::new("domain_id").immutable())
            .field(RemoteField::char("name", NAME_MAX_LENGTH))
            .field(RemoteField::new("enabled"))
            .field(RemoteField::new("description"))
            .build()
    }

    fn from_record(record: RemoteRecord) -> Self {
        Self(record)
    }

    fn record(&self) -> &RemoteRecord {
        &self.0
    }

    fn record_mut(&mut self) -> &mut RemoteRecord {
        &mut self.0
    }
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod project_tests;
