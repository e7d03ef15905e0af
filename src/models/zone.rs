// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zones (failure domains) backed by Nova host aggregates.
//!
//! A zone's availability zone always carries the zone name. Hosts are
//! assigned through aggregate actions, and a zone with hosts cannot be deleted.

use crate::errors::{ConfigError, ModelError, OpenStackError};
use crate::models::string_value;
use crate::remote::fields::RemoteField;
use crate::remote::meta::ModelMeta;
use crate::remote::objects::{apply_remote, RemoteObjects};
use crate::remote::record::{RemoteModel, RemoteRecord};
use serde_json::{json, Value};
use tracing::info;

/// A Nova host aggregate (`os-aggregates`).
#[derive(Debug, Clone)]
pub struct Zone(RemoteRecord);

impl Zone {
    #[must_use]
    pub fn name(&self) -> Option<String> {
        string_value(&self.0, "name")
    }

    #[must_use]
    pub fn availability_zone(&self) -> Option<String> {
        string_value(&self.0, "availability_zone")
    }

    /// Hostnames of the computes assigned to the aggregate.
    #[must_use]
    pub fn hosts(&self) -> Vec<String> {
        match self.0.get("hosts") {
            Some(Value::Array(hosts)) => hosts
                .iter()
                .filter_map(|host| host.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    #[must_use]
    pub fn created_at(&self) -> Option<String> {
        string_value(&self.0, "created_at")
    }

    #[must_use]
    pub fn updated_at(&self) -> Option<String> {
        string_value(&self.0, "updated_at")
    }
}

impl RemoteModel for Zone {
    const NAME: &'static str = "Zone";
    const REFRESH_BEFORE_DELETE: bool = true;

    fn describe() -> Result<ModelMeta, ConfigError> {
        ModelMeta::builder(Self::NAME)
            .service("compute")
            .resource("os-aggregates")
            .label("aggregate")
            .field(RemoteField::new("name").unique())
            .field(RemoteField::new("availability_zone"))
            .field(RemoteField::new("created_at").read_only())
            .field(RemoteField::new("updated_at").read_only())
            .field(RemoteField::new("hosts").read_only())
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

    fn before_save(&mut self) -> Result<(), ModelError> {
        let name = self.0.get("name").unwrap_or(Value::Null);
        self.0.set("availability_zone", name)
    }

    fn before_delete(&self) -> Result<(), ModelError> {
        if self.hosts().is_empty() {
            return Ok(());
        }
        Err(ModelError::Refused {
            model: Self::NAME.to_string(),
            reason: format!(
                "Can't remove zone <{}> since it has assigned computes.",
                self.name().unwrap_or_default()
            ),
        })
    }
}

impl RemoteObjects<Zone> {
    /// Assign `host` to the zone's aggregate.
    ///
    /// # Errors
    ///
    /// The remote error, or [`ModelError::NotPersisted`] for an unsaved zone.
    pub async fn add_host(&self, zone: &mut Zone, host: &str) -> Result<(), ModelError> {
        self.host_action(zone, "add_host", host).await
    }

    /// Remove `host` from the zone's aggregate.
    ///
    /// # Errors
    ///
    /// The remote error, or [`ModelError::NotPersisted`] for an unsaved zone.
    pub async fn remove_host(&self, zone: &mut Zone, host: &str) -> Result<(), ModelError> {
        self.host_action(zone, "remove_host", host).await
    }

    async fn host_action(&self, zone: &mut Zone, action: &str, host: &str) -> Result<(), ModelError> {
        let response = self.action(zone, action, json!({ "host": host })).await?;
        let Some(aggregate) = response.get(self.meta().label()) else {
            return Err(OpenStackError::InvalidResponse(format!(
                "{action} on aggregate {} returned no '{}' key",
                zone.record().remote_id().unwrap_or_default(),
                self.meta().label()
            ))
            .into());
        };
        apply_remote(zone.record_mut(), aggregate);

        info!(
            zone = zone.name().unwrap_or_default(),
            host = %host,
            action = %action,
            "Updated zone hosts"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod zone_tests;
