// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Queries over remote-backed records.
//!
//! Filters on native columns are answered by the [`ShadowStore`]. Filters on
//! remote fields have no column to match against, so the matching rows are
//! materialized, refreshed from OpenStack and compared in memory.
//!
//! [`ShadowStore`]: crate::remote::store::ShadowStore

use crate::errors::{ModelError, StoreError};
use crate::remote::objects::{RemoteObjects, SyncContext};
use crate::remote::record::RemoteModel;
use crate::remote::store::Filters;
use serde_json::Value;
use tracing::debug;

impl<M: RemoteModel> RemoteObjects<M> {
    /// Every record of the model.
    ///
    /// # Errors
    ///
    /// A store error, or a synchronize error on a synchronizing handle.
    pub async fn all(&self) -> Result<Vec<M>, ModelError> {
        let rows = self.rows_in(&SyncContext::new()).await?;
        Ok(rows.into_iter().map(|row| self.wrap(row)).collect())
    }

    /// Records whose attributes equal every filter value.
    ///
    /// Keys may be local columns or remote fields. Records matched through a
    /// remote field come back refreshed.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownColumn`] for a key that is neither a column nor a
    /// remote field, or any store, synchronize or refresh error.
    pub async fn filter(&self, filters: &Filters<'_>) -> Result<Vec<M>, ModelError> {
        if self.is_synchronizing() {
            self.synchronize_in(&SyncContext::new()).await?;
        }

        let (native, remote): (Vec<(&str, Value)>, Vec<(&str, Value)>) = filters
            .iter()
            .cloned()
            .partition(|(key, _)| self.store.can_filter(&self.meta, key));

        if let Some((key, _)) = remote.iter().find(|(key, _)| !self.meta.is_remote_field(key)) {
            return Err(StoreError::UnknownColumn {
                model: self.meta.name().to_string(),
                key: (*key).to_string(),
            }
            .into());
        }

        let rows = self.store.filter(&self.meta, &native).await?;
        if remote.is_empty() {
            return Ok(rows.into_iter().map(|row| self.wrap(row)).collect());
        }

        let mut matches = Vec::with_capacity(rows.len());
        for row in rows {
            let mut model = self.wrap(row);
            if !self.refresh_or_skip(model.record_mut()).await? {
                continue;
            }
            let record = model.record();
            if remote
                .iter()
                .all(|(key, expected)| record.get(key).as_ref() == Some(expected))
            {
                matches.push(model);
            } else {
                debug!(
                    model = %self.meta.name(),
                    remote_id = record.remote_id().unwrap_or_default(),
                    "Excluding record from remote field filter"
                );
            }
        }
        Ok(matches)
    }

    /// The single record matching `filters`.
    ///
    /// # Errors
    ///
    /// - [`ModelError::DoesNotExist`] if nothing matches
    /// - [`ModelError::MultipleObjectsReturned`] naming the count if several match
    /// - any error of [`RemoteObjects::filter`]
    pub async fn get(&self, filters: &Filters<'_>) -> Result<M, ModelError> {
        let native = filters
            .iter()
            .all(|(key, _)| self.store.can_filter(&self.meta, key));

        if native && !self.is_synchronizing() {
            return match self.store.get(&self.meta, filters).await {
                Ok(row) => Ok(self.wrap(row)),
                Err(StoreError::NotFound { .. }) => Err(self.does_not_exist()),
                Err(StoreError::MultipleFound { count, .. }) => Err(self.multiple(count)),
                Err(e) => Err(e.into()),
            };
        }

        let mut matches = self.filter(filters).await?;
        match matches.len() {
            0 => Err(self.does_not_exist()),
            1 => Ok(matches.remove(0)),
            count => Err(self.multiple(count)),
        }
    }

    /// Delete every matching record one at a time; returns how many were deleted.
    ///
    /// Stops at the first failing delete.
    ///
    /// # Errors
    ///
    /// Any error of [`RemoteObjects::filter`] or [`RemoteObjects::delete`].
    pub async fn delete_matching(&self, filters: &Filters<'_>) -> Result<usize, ModelError> {
        let matches = self.filter(filters).await?;
        let mut deleted = 0;
        for mut model in matches {
            self.delete(&mut model).await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    fn does_not_exist(&self) -> ModelError {
        ModelError::DoesNotExist {
            model: self.meta.name().to_string(),
        }
    }

    fn multiple(&self, count: usize) -> ModelError {
        ModelError::MultipleObjectsReturned {
            model: self.meta.name().to_string(),
            count,
        }
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod query_tests;
