// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! One mirrored remote resource and the typed model trait built on it.
//!
//! A [`RemoteRecord`] holds the two identities (local and remote), the local
//! column values, and the record-local cache of remote field values. Typed
//! models such as [`crate::models::Compute`] wrap a record and implement
//! [`RemoteModel`].

use crate::constants::{LOCAL_ID_COLUMN, REMOTE_ID_COLUMN};
use crate::errors::{ConfigError, ModelError};
use crate::openstack::types::Scope;
use crate::remote::fields::FieldValues;
use crate::remote::meta::ModelMeta;
use crate::remote::store::{NewShadowRow, ShadowRow};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lifecycle of a record as seen from the local shadow store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Built locally, not created remotely yet
    New,
    /// Local row exists; remote field values have not been fetched
    Shadow,
    /// Field cache reflects a successful remote read or write
    Live,
    /// Removed remotely and locally
    Deleted,
}

/// A remote resource mirrored by a local shadow row.
#[derive(Debug, Clone)]
pub struct RemoteRecord {
    meta: Arc<ModelMeta>,
    local_id: Option<u64>,
    remote_id: Option<String>,
    scope: Scope,
    values: FieldValues,
    columns: BTreeMap<String, Value>,
    state: RecordState,
}

impl RemoteRecord {
    /// Empty record of the described model.
    #[must_use]
    pub fn new(meta: Arc<ModelMeta>) -> Self {
        Self {
            meta,
            local_id: None,
            remote_id: None,
            scope: Scope::Admin,
            values: FieldValues::new(),
            columns: BTreeMap::new(),
            state: RecordState::New,
        }
    }

    /// Record loaded from a shadow row; field values are not fetched yet.
    #[must_use]
    pub fn from_row(meta: Arc<ModelMeta>, row: ShadowRow, scope: Scope) -> Self {
        Self {
            meta,
            local_id: Some(row.local_id),
            remote_id: Some(row.remote_id),
            scope,
            values: FieldValues::new(),
            columns: row.columns,
            state: RecordState::Shadow,
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn meta(&self) -> &Arc<ModelMeta> {
        &self.meta
    }

    /// Local store identity; never sent remotely.
    #[must_use]
    pub fn local_id(&self) -> Option<u64> {
        self.local_id
    }

    /// Identity of the resource in OpenStack.
    #[must_use]
    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    #[must_use]
    pub fn state(&self) -> RecordState {
        self.state
    }

    /// Whether the resource exists remotely.
    #[must_use]
    pub fn is_created(&self) -> bool {
        self.remote_id.is_some()
    }

    /// Whether a local shadow row exists.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.local_id.is_some()
    }

    /// Raw field cache keyed by source.
    #[must_use]
    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    /// Value of a remote field, identity or local column.
    ///
    /// Remote fields yield their cached value or default; `None` means the
    /// model has no attribute of that name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(field) = self.meta.field(name) {
            return Some(field.get_value(&self.values));
        }
        match name {
            LOCAL_ID_COLUMN => Some(self.local_id.map_or(Value::Null, Value::from)),
            REMOTE_ID_COLUMN => Some(self.remote_id.clone().map_or(Value::Null, Value::String)),
            _ if self.meta.is_column(name) => {
                Some(self.columns.get(name).cloned().unwrap_or(Value::Null))
            }
            _ => None,
        }
    }

    /// Set a remote field or local column.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownField`] for identities and undeclared names.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ModelError> {
        let value = value.into();
        if let Some(field) = self.meta.field(name) {
            field.set_value(&mut self.values, value);
            return Ok(());
        }
        if self.meta.local_columns().iter().any(|column| column == name) {
            self.columns.insert(name.to_string(), value);
            return Ok(());
        }
        Err(ModelError::UnknownField {
            model: self.meta.name().to_string(),
            field: name.to_string(),
        })
    }

    /// Local column value.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Value> {
        self.columns.get(name)
    }

    pub(crate) fn set_remote_id(&mut self, remote_id: impl Into<String>) {
        self.remote_id = Some(remote_id.into());
    }

    pub(crate) fn set_state(&mut self, state: RecordState) {
        self.state = state;
    }

    pub(crate) fn values_mut(&mut self) -> &mut FieldValues {
        &mut self.values
    }

    pub(crate) fn attach(&mut self, row: ShadowRow) {
        self.local_id = Some(row.local_id);
        self.remote_id = Some(row.remote_id);
        self.columns = row.columns;
    }

    pub(crate) fn detach(&mut self) {
        self.local_id = None;
        self.state = RecordState::Deleted;
    }

    pub(crate) fn new_row(&self) -> Option<NewShadowRow> {
        Some(NewShadowRow {
            remote_id: self.remote_id.clone()?,
            columns: self.columns.clone(),
        })
    }

    pub(crate) fn row(&self) -> Option<ShadowRow> {
        Some(ShadowRow {
            local_id: self.local_id?,
            remote_id: self.remote_id.clone()?,
            columns: self.columns.clone(),
        })
    }
}

/// A typed remote-backed model.
///
/// Implementors wrap a [`RemoteRecord`] and describe their OpenStack metadata
/// once in [`RemoteModel::describe`]. The hooks let a model adjust a record
/// before it is saved or refuse a delete.
pub trait RemoteModel: Sized + Send + Sync + 'static {
    /// Registry key and name used in error messages.
    const NAME: &'static str;

    /// Fetch the current remote state before running [`RemoteModel::before_delete`].
    const REFRESH_BEFORE_DELETE: bool = false;

    /// Build the model description.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the declaration is invalid.
    fn describe() -> Result<ModelMeta, ConfigError>;

    fn from_record(record: RemoteRecord) -> Self;

    fn record(&self) -> &RemoteRecord;

    fn record_mut(&mut self) -> &mut RemoteRecord;

    /// Called before validation on every save.
    ///
    /// # Errors
    ///
    /// Any error aborts the save before a remote call is made.
    fn before_save(&mut self) -> Result<(), ModelError> {
        Ok(())
    }

    /// Called before the remote delete.
    ///
    /// # Errors
    ///
    /// Any error aborts the delete before a remote call is made.
    fn before_delete(&self) -> Result<(), ModelError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod record_tests;
