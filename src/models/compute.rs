// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hypervisors registered with Nova.
//!
//! Hypervisors are discovered, never created through Kamaji, so saving an
//! existing record fails with [`ModelError::UpdatesNotSupported`].
//!
//! [`ModelError::UpdatesNotSupported`]: crate::errors::ModelError::UpdatesNotSupported

use crate::errors::ConfigError;
use crate::models::{string_value, u64_value};
use crate::remote::fields::RemoteField;
use crate::remote::meta::ModelMeta;
use crate::remote::record::{RemoteModel, RemoteRecord};

/// Longest hostname accepted, keeping derived DNS names within limits
pub const HOSTNAME_MAX_LENGTH: usize = 126;

/// A Nova hypervisor (`os-hypervisors`).
#[derive(Debug, Clone)]
pub struct Compute(RemoteRecord);

impl Compute {
    #[must_use]
    pub fn hostname(&self) -> Option<String> {
        string_value(&self.0, "hostname")
    }

    #[must_use]
    pub fn status(&self) -> Option<String> {
        string_value(&self.0, "status")
    }

    #[must_use]
    pub fn state(&self) -> Option<String> {
        string_value(&self.0, "state")
    }

    #[must_use]
    pub fn host_ip(&self) -> Option<String> {
        string_value(&self.0, "host_ip")
    }

    /// Hypervisor version as reported by Nova (an encoded integer).
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        u64_value(&self.0, "version")
    }

    #[must_use]
    pub fn vcpus(&self) -> Option<u64> {
        u64_value(&self.0, "vcpus")
    }

    #[must_use]
    pub fn vcpus_used(&self) -> Option<u64> {
        u64_value(&self.0, "vcpus_used")
    }

    #[must_use]
    pub fn memory_mb(&self) -> Option<u64> {
        u64_value(&self.0, "memory_mb")
    }

    #[must_use]
    pub fn memory_mb_used(&self) -> Option<u64> {
        u64_value(&self.0, "memory_mb_used")
    }

    #[must_use]
    pub fn free_ram_mb(&self) -> Option<u64> {
        u64_value(&self.0, "free_ram_mb")
    }

    #[must_use]
    pub fn free_disk_gb(&self) -> Option<u64> {
        u64_value(&self.0, "free_disk_gb")
    }

    #[must_use]
    pub fn local_gb_used(&self) -> Option<u64> {
        u64_value(&self.0, "local_gb_used")
    }

    #[must_use]
    pub fn running_vms(&self) -> Option<u64> {
        u64_value(&self.0, "running_vms")
    }

    #[must_use]
    pub fn current_workload(&self) -> Option<u64> {
        u64_value(&self.0, "current_workload")
    }

    /// Whether the hypervisor is enabled and its compute service is up.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status().as_deref() == Some("enabled") && self.state().as_deref() == Some("up")
    }
}

impl RemoteModel for Compute {
    const NAME: &'static str = "Compute";

    fn describe() -> Result<ModelMeta, ConfigError> {
        ModelMeta::builder(Self::NAME)
            .service("compute")
            .resource("os-hypervisors")
            .label("hypervisor")
            .updates_unsupported()
            .field(RemoteField::char("hostname", HOSTNAME_MAX_LENGTH).source("hypervisor_hostname"))
            .field(RemoteField::new("status"))
            .field(RemoteField::new("state"))
            .field(RemoteField::new("version").source("hypervisor_version"))
            .field(RemoteField::new("host_ip"))
            .field(RemoteField::new("free_disk_gb"))
            .field(RemoteField::new("free_ram_mb"))
            .field(RemoteField::new("vcpus"))
            .field(RemoteField::new("vcpus_used"))
            .field(RemoteField::new("local_gb_used"))
            .field(RemoteField::new("memory_mb"))
            .field(RemoteField::new("memory_mb_used"))
            .field(RemoteField::new("running_vms"))
            .field(RemoteField::new("current_workload"))
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
#[path = "compute_tests.rs"]
mod compute_tests;
