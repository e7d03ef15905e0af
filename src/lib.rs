// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Kamaji - remote-backed models for OpenStack
//!
//! Kamaji keeps local records in step with resources owned by an OpenStack
//! cloud. Each remote-backed model has a local shadow row holding its remote
//! identity, while its fields are read from and written to the remote API.
//!
//! ## Overview
//!
//! - Keystone sessions cached per scope, with one transparent re-authentication on 401
//! - Typed request errors mapped from HTTP status codes
//! - Model-less access to any collection through resource shortcuts
//! - Per-field mapping between local attribute names and remote JSON keys
//! - Create, save, refresh, delete and additive synchronize of remote-backed models
//! - Queries mixing local columns and remote fields
//!
//! ## Modules
//!
//! - [`openstack`] - Sessions, the request client and resource shortcuts
//! - [`remote`] - Field mapping, model descriptions and the synchronization engine
//! - [`models`] - Concrete models (hypervisors, projects and zones)
//! - [`context`] - Shared configuration, sessions, store and model registry
//! - [`config`] - Configuration loading from YAML or the environment
//! - [`errors`] - Error types
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use kamaji::{config::OpenStackConfig, context::Context, models::Zone, remote::MemoryStore};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = OpenStackConfig::from_env()?;
//! let ctx = Context::new(config, Arc::new(MemoryStore::new()))?;
//!
//! let zones = ctx.objects::<Zone>()?;
//! zones.synchronize().await?;
//! let zone = zones.create(&[("name", json!("rack-a"))]).await?;
//! println!("{:?}", zone.hosts());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod http_errors;
pub mod metrics;
pub mod models;
pub mod openstack;
pub mod remote;
