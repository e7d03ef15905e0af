// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Concrete remote-backed models.
//!
//! - [`compute::Compute`] - Nova hypervisors, read-only
//! - [`project::Project`] - Keystone projects, updated with PATCH
//! - [`zone::Zone`] - Nova host aggregates used as failure domains

pub mod compute;
pub mod project;
pub mod zone;

pub use compute::Compute;
pub use project::Project;
pub use zone::Zone;

use crate::errors::ConfigError;
use crate::remote::meta::ModelRegistry;
use crate::remote::record::RemoteRecord;
use serde_json::Value;

/// Registry holding every model defined in this crate.
///
/// # Errors
///
/// Returns the [`ConfigError`] of the first invalid model declaration.
pub fn registry() -> Result<ModelRegistry, ConfigError> {
    let mut registry = ModelRegistry::new();
    registry.register::<Compute>()?;
    registry.register::<Project>()?;
    registry.register::<Zone>()?;
    Ok(registry)
}

fn string_value(record: &RemoteRecord, name: &str) -> Option<String> {
    match record.get(name)? {
        Value::String(value) => Some(value),
        _ => None,
    }
}

/// Integer attribute; some services report counters as strings.
fn u64_value(record: &RemoteRecord, name: &str) -> Option<u64> {
    match record.get(name)? {
        Value::Number(value) => value.as_u64(),
        Value::String(value) => value.parse().ok(),
        _ => None,
    }
}
