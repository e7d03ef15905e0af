// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Local shadow-row storage.
//!
//! The synchronization engine persists one [`ShadowRow`] per mirrored remote
//! resource through the [`ShadowStore`] trait. A row carries only the local
//! identity, the remote identity and the model's local columns; remote field
//! values are never stored.
//!
//! [`MemoryStore`] is the in-process implementation used by the CLI and the
//! tests. It enforces uniqueness of the remote identity per model.

use crate::constants::{LOCAL_ID_COLUMN, REMOTE_ID_COLUMN};
use crate::errors::StoreError;
use crate::remote::meta::ModelMeta;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Equality filters over row columns.
pub type Filters<'a> = [(&'a str, Value)];

/// A persisted shadow row.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowRow {
    pub local_id: u64,
    pub remote_id: String,
    pub columns: BTreeMap<String, Value>,
}

impl ShadowRow {
    /// Value of a native column, `None` if the row has no such column.
    #[must_use]
    pub fn column(&self, meta: &ModelMeta, name: &str) -> Option<Value> {
        match name {
            LOCAL_ID_COLUMN => Some(Value::from(self.local_id)),
            REMOTE_ID_COLUMN => Some(Value::String(self.remote_id.clone())),
            _ if meta.is_column(name) => {
                Some(self.columns.get(name).cloned().unwrap_or(Value::Null))
            }
            _ => None,
        }
    }

    fn matches(&self, meta: &ModelMeta, filters: &Filters<'_>) -> bool {
        filters
            .iter()
            .all(|(key, expected)| self.column(meta, key).as_ref() == Some(expected))
    }
}

/// A row that has not been assigned a local identity yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewShadowRow {
    pub remote_id: String,
    pub columns: BTreeMap<String, Value>,
}

/// Row-oriented persistent store keyed by local identity.
///
/// Filters are plain equality on native columns. Callers ask
/// [`ShadowStore::can_filter`] before filtering; a filter on a column the
/// store cannot resolve fails with [`StoreError::UnknownColumn`].
#[async_trait]
pub trait ShadowStore: Send + Sync {
    /// Whether `key` can be filtered natively for this model.
    fn can_filter(&self, meta: &ModelMeta, key: &str) -> bool {
        meta.is_column(key)
    }

    /// Persist a new row and assign its local identity.
    async fn insert(&self, meta: &ModelMeta, row: NewShadowRow) -> Result<ShadowRow, StoreError>;

    /// Overwrite an existing row.
    async fn update(&self, meta: &ModelMeta, row: &ShadowRow) -> Result<(), StoreError>;

    /// Exactly one row matching `filters`.
    async fn get(&self, meta: &ModelMeta, filters: &Filters<'_>) -> Result<ShadowRow, StoreError>;

    /// Rows matching all `filters`, ordered by local identity.
    async fn filter(
        &self,
        meta: &ModelMeta,
        filters: &Filters<'_>,
    ) -> Result<Vec<ShadowRow>, StoreError>;

    /// Every row of the model, ordered by local identity.
    async fn all(&self, meta: &ModelMeta) -> Result<Vec<ShadowRow>, StoreError>;

    /// Rows not matching all `filters`.
    async fn exclude(
        &self,
        meta: &ModelMeta,
        filters: &Filters<'_>,
    ) -> Result<Vec<ShadowRow>, StoreError>;

    /// Remove the row with `local_id`.
    async fn delete(&self, meta: &ModelMeta, local_id: u64) -> Result<(), StoreError>;
}

/// In-process [`ShadowStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, BTreeMap<u64, ShadowRow>>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(meta: &ModelMeta, filters: &Filters<'_>) -> Result<(), StoreError> {
        match filters.iter().find(|(key, _)| !meta.is_column(key)) {
            Some((key, _)) => Err(StoreError::UnknownColumn {
                model: meta.name().to_string(),
                key: (*key).to_string(),
            }),
            None => Ok(()),
        }
    }

    fn select<F>(&self, meta: &ModelMeta, predicate: F) -> Vec<ShadowRow>
    where
        F: Fn(&ShadowRow) -> bool,
    {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .get(meta.name())
            .map(|table| table.values().filter(|row| predicate(row)).cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ShadowStore for MemoryStore {
    async fn insert(&self, meta: &ModelMeta, row: NewShadowRow) -> Result<ShadowRow, StoreError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables.entry(meta.name().to_string()).or_default();

        if table.values().any(|existing| existing.remote_id == row.remote_id) {
            return Err(StoreError::DuplicateRemoteId {
                model: meta.name().to_string(),
                remote_id: row.remote_id,
            });
        }

        let local_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let row = ShadowRow {
            local_id,
            remote_id: row.remote_id,
            columns: row.columns,
        };
        table.insert(local_id, row.clone());
        Ok(row)
    }

    async fn update(&self, meta: &ModelMeta, row: &ShadowRow) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables.entry(meta.name().to_string()).or_default();

        if table
            .values()
            .any(|existing| existing.local_id != row.local_id && existing.remote_id == row.remote_id)
        {
            return Err(StoreError::DuplicateRemoteId {
                model: meta.name().to_string(),
                remote_id: row.remote_id.clone(),
            });
        }
        match table.get_mut(&row.local_id) {
            Some(existing) => {
                *existing = row.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                model: meta.name().to_string(),
            }),
        }
    }

    async fn get(&self, meta: &ModelMeta, filters: &Filters<'_>) -> Result<ShadowRow, StoreError> {
        let mut rows = self.filter(meta, filters).await?;
        match rows.len() {
            0 => Err(StoreError::NotFound {
                model: meta.name().to_string(),
            }),
            1 => Ok(rows.remove(0)),
            count => Err(StoreError::MultipleFound {
                model: meta.name().to_string(),
                count,
            }),
        }
    }

    async fn filter(
        &self,
        meta: &ModelMeta,
        filters: &Filters<'_>,
    ) -> Result<Vec<ShadowRow>, StoreError> {
        Self::resolve(meta, filters)?;
        Ok(self.select(meta, |row| row.matches(meta, filters)))
    }

    async fn all(&self, meta: &ModelMeta) -> Result<Vec<ShadowRow>, StoreError> {
        Ok(self.select(meta, |_| true))
    }

    async fn exclude(
        &self,
        meta: &ModelMeta,
        filters: &Filters<'_>,
    ) -> Result<Vec<ShadowRow>, StoreError> {
        Self::resolve(meta, filters)?;
        Ok(self.select(meta, |row| !row.matches(meta, filters)))
    }

    async fn delete(&self, meta: &ModelMeta, local_id: u64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let removed = tables
            .get_mut(meta.name())
            .and_then(|table| table.remove(&local_id));
        match removed {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                model: meta.name().to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
