// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Remote-backed models: OpenStack resources mirrored by local shadow rows.
//!
//! - [`fields`] - per-attribute mapping to the remote JSON representation
//! - [`meta`] - model descriptions and the registry
//! - [`record`] - one mirrored resource and the [`RemoteModel`] trait
//! - [`store`] - the local shadow-row store
//! - [`objects`] - create, save, delete, refresh and synchronize
//! - [`query`] - filtering on columns and remote fields

pub mod fields;
pub mod meta;
pub mod objects;
pub mod query;
pub mod record;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use fields::{FieldKind, FieldValues, RemoteField, Validator};
pub use meta::{ModelMeta, ModelMetaBuilder, ModelRegistry};
pub use objects::{apply_remote, RemoteObjects, SyncContext, SyncReport};
pub use record::{RecordState, RemoteModel, RemoteRecord};
pub use store::{Filters, MemoryStore, NewShadowRow, ShadowRow, ShadowStore};
