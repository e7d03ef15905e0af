// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The synchronization engine for remote-backed models.
//!
//! [`RemoteObjects`] binds one model description to a [`RemoteClient`] and a
//! [`ShadowStore`]. It creates, updates, refreshes and deletes remote resources
//! and keeps one local shadow row per resource.
//!
//! # Record lifecycle
//!
//! ```text
//! (unsynced) --synchronize--> Shadow --refresh/save--> Live --delete--> Deleted
//!       New --create/save--> Live
//! ```
//!
//! # Remote/local asymmetries
//!
//! Remote and local writes are not transactional. A failed remote delete
//! leaves the local row untouched; a failed local delete after a successful
//! remote delete leaves a ghost row behind. `synchronize` only adds missing
//! rows unless [`Compatibility::prune_on_sync`] is set.

use crate::config::Compatibility;
use crate::constants::{ACTION_PATH_SEGMENT, LOCAL_ID_COLUMN, REMOTE_ID_KEY, UNIQUE_VIOLATION_MESSAGE};
use crate::errors::{ModelError, OpenStackError, StoreError, ValidationErrors};
use crate::metrics;
use crate::openstack::request::RemoteClient;
use crate::openstack::shortcut::unwrap_envelope;
use crate::openstack::types::{RawResponse, ResourcePath, Scope};
use crate::remote::fields::RemoteField;
use crate::remote::meta::ModelMeta;
use crate::remote::record::{RecordState, RemoteModel, RemoteRecord};
use crate::remote::store::{ShadowRow, ShadowStore};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of one synchronize pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Shadow rows created for previously unknown remote resources
    pub created: usize,
    /// Remote resources left unsynchronized because their row was rejected
    pub skipped: usize,
    /// Local rows removed because their remote resource is gone
    pub pruned: usize,
}

/// Models whose synchronize is in progress on the current call path.
///
/// Saving a shadow row validates it, validation reads the model's rows, and a
/// synchronizing handle would synchronize again on that read. The context is
/// threaded through those calls so the nested synchronize is skipped.
#[derive(Debug, Clone, Default)]
pub struct SyncContext {
    active: BTreeSet<String>,
}

impl SyncContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_active(&self, model: &str) -> bool {
        self.active.contains(model)
    }

    /// Context with `model` marked active, or `None` if it already is.
    #[must_use]
    pub fn enter(&self, model: &str) -> Option<SyncContext> {
        if self.is_active(model) {
            return None;
        }
        let mut active = self.active.clone();
        active.insert(model.to_string());
        Some(Self { active })
    }
}

/// Remote-backed access to the records of model `M`.
pub struct RemoteObjects<M> {
    pub(crate) meta: Arc<ModelMeta>,
    pub(crate) client: RemoteClient,
    pub(crate) store: Arc<dyn ShadowStore>,
    compatibility: Compatibility,
    synchronizing: bool,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for RemoteObjects<M> {
    fn clone(&self) -> Self {
        Self {
            meta: self.meta.clone(),
            client: self.client.clone(),
            store: self.store.clone(),
            compatibility: self.compatibility,
            synchronizing: self.synchronizing,
            _model: PhantomData,
        }
    }
}

impl<M> std::fmt::Debug for RemoteObjects<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteObjects")
            .field("model", &self.meta.name())
            .field("scope", self.client.scope())
            .field("compatibility", &self.compatibility)
            .field("synchronizing", &self.synchronizing)
            .finish_non_exhaustive()
    }
}

impl<M: RemoteModel> RemoteObjects<M> {
    #[must_use]
    pub fn new(meta: Arc<ModelMeta>, client: RemoteClient, store: Arc<dyn ShadowStore>) -> Self {
        Self {
            meta,
            client,
            store,
            compatibility: Compatibility::default(),
            synchronizing: false,
            _model: PhantomData,
        }
    }

    /// Handle whose requests and new records use `scope`.
    #[must_use]
    pub fn with_scope(&self, scope: Scope) -> Self {
        let mut scoped = self.clone();
        scoped.client = self.client.with_scope(scope);
        scoped
    }

    #[must_use]
    pub fn with_compatibility(mut self, compatibility: Compatibility) -> Self {
        self.compatibility = compatibility;
        self
    }

    /// Handle whose reads synchronize with OpenStack first.
    #[must_use]
    pub fn synced(&self) -> Self {
        let mut synced = self.clone();
        synced.synchronizing = true;
        synced
    }

    #[must_use]
    pub fn is_synchronizing(&self) -> bool {
        self.synchronizing
    }

    #[must_use]
    pub fn meta(&self) -> &Arc<ModelMeta> {
        &self.meta
    }

    #[must_use]
    pub fn client(&self) -> &RemoteClient {
        &self.client
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ShadowStore> {
        &self.store
    }

    #[must_use]
    pub fn compatibility(&self) -> Compatibility {
        self.compatibility
    }

    /// New, unsaved record with `fields` set.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownField`] for a name that is neither a remote
    /// field nor a local column.
    pub fn build(&self, fields: &[(&str, Value)]) -> Result<M, ModelError> {
        let mut record = RemoteRecord::new(self.meta.clone()).with_scope(self.client.scope().clone());
        for (name, value) in fields {
            record.set(name, value.clone())?;
        }
        Ok(M::from_record(record))
    }

    /// Validate, POST and persist a new record.
    ///
    /// Nothing is stored locally if the remote call fails.
    ///
    /// # Errors
    ///
    /// Validation errors, the typed remote errors of the request client, or a
    /// store error from the local insert.
    pub async fn create(&self, fields: &[(&str, Value)]) -> Result<M, ModelError> {
        let mut model = self.build(fields)?;
        self.save(&mut model, None).await?;
        Ok(model)
    }

    /// Write the record remotely, then persist its shadow row.
    ///
    /// A record that does not exist remotely yet is POSTed with every writable
    /// field. An existing one is PUT or PATCHed with its mutable fields,
    /// restricted to `update_fields` when given.
    ///
    /// # Errors
    ///
    /// - [`ModelError::UpdatesNotSupported`] for an existing record of a read-only model
    /// - [`ModelError::Validation`] with every failing field
    /// - the typed remote errors of the request client
    /// - a store error from the local write
    pub async fn save(&self, model: &mut M, update_fields: Option<&[&str]>) -> Result<(), ModelError> {
        let ctx = SyncContext::new();
        let existed = model.record().is_created();
        if existed && !self.meta.supports_updates() {
            return Err(ModelError::UpdatesNotSupported {
                model: self.meta.name().to_string(),
            });
        }

        model.before_save()?;

        let mut errors = self.validate(model).err().unwrap_or_default();
        errors.merge(self.unique_violations(&ctx, model.record(), &[]).await?);
        errors.into_result()?;

        let payload = self.save_payload(model.record(), update_fields);
        let client = self.client_for(model.record());
        let response = match model.record().remote_id() {
            Some(remote_id) => {
                client
                    .update(
                        self.meta.update_method(),
                        self.meta.service(),
                        self.meta.resource(),
                        &ResourcePath::from(remote_id),
                        &payload,
                        self.meta.update_headers(),
                    )
                    .await?
            }
            None => {
                client
                    .post(
                        self.meta.service(),
                        self.meta.resource(),
                        &ResourcePath::collection(),
                        &payload,
                    )
                    .await?
            }
        };

        match response_remote_id(&response, self.meta.label()) {
            Some(remote_id) => model.record_mut().set_remote_id(remote_id),
            None if !existed => {
                return Err(OpenStackError::InvalidResponse(format!(
                    "{} {} returned no '{}.{REMOTE_ID_KEY}'",
                    response.method,
                    response.url,
                    self.meta.label()
                ))
                .into());
            }
            None => {}
        }

        let record = model.record_mut();
        if let Some(row) = record.row() {
            self.store.update(&self.meta, &row).await?;
        } else if let Some(new_row) = record.new_row() {
            let row = self.store.insert(&self.meta, new_row).await?;
            record.attach(row);
        }
        record.set_state(RecordState::Live);

        info!(
            model = %self.meta.name(),
            remote_id = record.remote_id().unwrap_or_default(),
            local_id = record.local_id(),
            created = !existed,
            "Saved remote-backed record"
        );
        Ok(())
    }

    /// Delete the remote resource, then the local shadow row.
    ///
    /// If the remote delete fails the local row is left in place. If the local
    /// delete fails after the remote one succeeded, the error is returned and
    /// the row remains as a ghost. With `forgive_missing_on_delete`, a 404 from
    /// either the pre-delete refresh or the DELETE removes the local row.
    ///
    /// # Errors
    ///
    /// - [`ModelError::NotPersisted`] for a record that was never created remotely
    /// - a model hook refusal, the remote error, or the store error
    pub async fn delete(&self, model: &mut M) -> Result<(), ModelError> {
        let Some(remote_id) = model.record().remote_id().map(str::to_string) else {
            return Err(ModelError::NotPersisted {
                model: self.meta.name().to_string(),
            });
        };

        let mut remote_gone = false;
        if M::REFRESH_BEFORE_DELETE && model.record().state() != RecordState::Live {
            match self.refresh(model).await {
                Ok(()) => {}
                Err(ModelError::Remote(e))
                    if e.is_not_found() && self.compatibility.forgive_missing_on_delete =>
                {
                    remote_gone = true;
                }
                Err(e) => return Err(e),
            }
        }

        if !remote_gone {
            model.before_delete()?;
            remote_gone = self.delete_remote(model.record(), &remote_id).await?;
        }
        if remote_gone {
            warn!(
                model = %self.meta.name(),
                remote_id = %remote_id,
                "Remote resource already gone, removing local row"
            );
        }

        if let Some(local_id) = model.record().local_id() {
            if let Err(e) = self.store.delete(&self.meta, local_id).await {
                error!(
                    model = %self.meta.name(),
                    remote_id = %remote_id,
                    local_id = local_id,
                    error = %e,
                    "Remote resource deleted but local row could not be removed"
                );
                return Err(e.into());
            }
        }
        model.record_mut().detach();

        info!(model = %self.meta.name(), remote_id = %remote_id, "Deleted remote-backed record");
        Ok(())
    }

    /// DELETE the remote resource. Returns `true` when a forgiven 404 said it was already gone.
    async fn delete_remote(&self, record: &RemoteRecord, remote_id: &str) -> Result<bool, ModelError> {
        match self
            .client_for(record)
            .delete(
                self.meta.service(),
                self.meta.resource(),
                &ResourcePath::from(remote_id),
            )
            .await
        {
            Ok(_) => Ok(false),
            Err(e) if e.is_not_found() && self.compatibility.forgive_missing_on_delete => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the field cache with the current remote representation.
    ///
    /// Unsaved local changes to fields present remotely are discarded.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotPersisted`] without a remote identity, or the remote error.
    pub async fn refresh(&self, model: &mut M) -> Result<(), ModelError> {
        self.refresh_record(model.record_mut()).await
    }

    pub(crate) async fn refresh_record(&self, record: &mut RemoteRecord) -> Result<(), ModelError> {
        let Some(remote_id) = record.remote_id().map(str::to_string) else {
            return Err(ModelError::NotPersisted {
                model: self.meta.name().to_string(),
            });
        };

        let response = self
            .client_for(record)
            .get(
                self.meta.service(),
                self.meta.resource(),
                &ResourcePath::from(remote_id),
            )
            .await?;
        let body = response.json()?;
        let Some(remote) = body.get(self.meta.label()) else {
            return Err(OpenStackError::InvalidResponse(format!(
                "{} {} has no '{}' key",
                response.method,
                response.url,
                self.meta.label()
            ))
            .into());
        };

        apply_remote(record, remote);
        Ok(())
    }

    /// POST `{"<action>": args}` to `<resource>/<remote_id>/action`.
    ///
    /// Returns the decoded response body, or `null` when it is empty.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotPersisted`] without a remote identity, or the remote error.
    pub async fn action(&self, model: &M, action: &str, args: Value) -> Result<Value, ModelError> {
        let Some(remote_id) = model.record().remote_id() else {
            return Err(ModelError::NotPersisted {
                model: self.meta.name().to_string(),
            });
        };

        let mut body = Map::new();
        body.insert(action.to_string(), args);

        debug!(model = %self.meta.name(), remote_id = %remote_id, action = %action, "Posting resource action");
        let response = self
            .client_for(model.record())
            .post(
                self.meta.service(),
                self.meta.resource(),
                &ResourcePath::from((remote_id, ACTION_PATH_SEGMENT)),
                &Value::Object(body),
            )
            .await?;

        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(response.json()?)
    }

    /// Create shadow rows for every remote resource that has none.
    ///
    /// # Errors
    ///
    /// The remote listing error, or a store error other than a rejected insert.
    pub async fn synchronize(&self) -> Result<SyncReport, ModelError> {
        self.synchronize_in(&SyncContext::new()).await
    }

    /// [`RemoteObjects::synchronize`] within an existing call context.
    ///
    /// Returns an empty report without touching OpenStack if this model is
    /// already being synchronized on the current call path.
    pub fn synchronize_in<'a>(
        &'a self,
        ctx: &'a SyncContext,
    ) -> BoxFuture<'a, Result<SyncReport, ModelError>> {
        Box::pin(async move {
            let Some(ctx) = ctx.enter(self.meta.name()) else {
                debug!(model = %self.meta.name(), "Synchronize already in progress, skipping");
                return Ok(SyncReport::default());
            };

            let response = self
                .client
                .get(
                    self.meta.service(),
                    self.meta.resource(),
                    &ResourcePath::collection(),
                )
                .await?;
            let Value::Array(items) = unwrap_envelope(response.json()?) else {
                return Err(OpenStackError::InvalidResponse(format!(
                    "{} {} did not return a collection",
                    response.method, response.url
                ))
                .into());
            };

            let remote_ids: Vec<String> = items
                .iter()
                .filter_map(|item| item.get(REMOTE_ID_KEY).and_then(remote_id_string))
                .collect();
            let local_rows = self.store.all(&self.meta).await?;
            let known: HashSet<&str> = local_rows.iter().map(|row| row.remote_id.as_str()).collect();

            let mut report = SyncReport::default();
            for remote_id in remote_ids.iter().filter(|id| !known.contains(id.as_str())) {
                match self.insert_shadow(&ctx, remote_id).await {
                    Ok(()) => report.created += 1,
                    Err(
                        e @ (ModelError::Validation(_)
                        | ModelError::Store(StoreError::DuplicateRemoteId { .. })),
                    ) => {
                        warn!(
                            model = %self.meta.name(),
                            remote_id = %remote_id,
                            error = %e,
                            "Skipping remote resource during synchronize"
                        );
                        report.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }

            if self.compatibility.prune_on_sync {
                let listed: HashSet<&str> = remote_ids.iter().map(String::as_str).collect();
                for row in local_rows.iter().filter(|row| !listed.contains(row.remote_id.as_str())) {
                    self.store.delete(&self.meta, row.local_id).await?;
                    debug!(model = %self.meta.name(), remote_id = %row.remote_id, "Pruned stale shadow row");
                    report.pruned += 1;
                }
            }

            metrics::record_sync(self.meta.name(), &report);
            info!(
                model = %self.meta.name(),
                listed = remote_ids.len(),
                created = report.created,
                skipped = report.skipped,
                pruned = report.pruned,
                "Synchronized with OpenStack"
            );
            Ok(report)
        })
    }

    async fn insert_shadow(&self, ctx: &SyncContext, remote_id: &str) -> Result<(), ModelError> {
        let mut record = RemoteRecord::new(self.meta.clone()).with_scope(self.client.scope().clone());
        record.set_remote_id(remote_id);

        self.unique_violations(ctx, &record, &[]).await?.into_result()?;
        if let Some(new_row) = record.new_row() {
            self.store.insert(&self.meta, new_row).await?;
        }
        Ok(())
    }

    /// Run every field's validators on its non-null value.
    ///
    /// # Errors
    ///
    /// Returns all failures keyed by field name.
    pub fn validate(&self, model: &M) -> Result<(), ValidationErrors> {
        let record = model.record();
        let mut errors = ValidationErrors::new();
        for field in self.meta.fields() {
            let value = field.get_value(record.values());
            if value.is_null() {
                continue;
            }
            if let Err(message) = field.validate(&value) {
                errors.add(field.name(), message);
            }
        }
        errors.into_result()
    }

    /// Check unique fields against every other local record.
    ///
    /// # Errors
    ///
    /// [`ModelError::Validation`] naming each clashing field, or an error
    /// raised while reading the other records.
    pub async fn validate_unique(&self, model: &M, exclude: &[&str]) -> Result<(), ModelError> {
        self.unique_violations(&SyncContext::new(), model.record(), exclude)
            .await?
            .into_result()?;
        Ok(())
    }

    async fn unique_violations(
        &self,
        ctx: &SyncContext,
        record: &RemoteRecord,
        exclude: &[&str],
    ) -> Result<ValidationErrors, ModelError> {
        let mut errors = ValidationErrors::new();
        let unique: Vec<&RemoteField> = self
            .meta
            .fields()
            .iter()
            .filter(|field| field.is_unique() && !exclude.contains(&field.name()))
            .collect();
        if unique.is_empty() {
            return Ok(errors);
        }

        let checked: Vec<(&RemoteField, Value)> = unique
            .into_iter()
            .map(|field| (field, field.get_value(record.values())))
            .filter(|(_, value)| !value.is_null())
            .collect();
        if checked.is_empty() {
            return Ok(errors);
        }

        for row in self.others_in(ctx, record).await? {
            if record.remote_id() == Some(row.remote_id.as_str()) {
                continue;
            }
            let mut other = RemoteRecord::from_row(self.meta.clone(), row, record.scope().clone());
            if !self.refresh_or_skip(&mut other).await? {
                continue;
            }
            for (field, value) in &checked {
                if errors.get(field.name()).is_none() && field.get_value(other.values()) == *value {
                    errors.add(field.name(), UNIQUE_VIOLATION_MESSAGE);
                }
            }
        }
        Ok(errors)
    }

    /// Rows of every record except `record`, synchronizing first if requested.
    async fn others_in(
        &self,
        ctx: &SyncContext,
        record: &RemoteRecord,
    ) -> Result<Vec<ShadowRow>, ModelError> {
        if self.synchronizing {
            self.synchronize_in(ctx).await?;
        }
        let rows = match record.local_id() {
            Some(local_id) => {
                self.store
                    .exclude(&self.meta, &[(LOCAL_ID_COLUMN, Value::from(local_id))])
                    .await?
            }
            None => self.store.all(&self.meta).await?,
        };
        Ok(rows)
    }

    /// Every row, synchronizing first if requested.
    pub(crate) async fn rows_in(&self, ctx: &SyncContext) -> Result<Vec<ShadowRow>, ModelError> {
        if self.synchronizing {
            self.synchronize_in(ctx).await?;
        }
        Ok(self.store.all(&self.meta).await?)
    }

    /// Refresh a loaded record; `false` if its remote resource no longer exists.
    pub(crate) async fn refresh_or_skip(&self, record: &mut RemoteRecord) -> Result<bool, ModelError> {
        match self.refresh_record(record).await {
            Ok(()) => Ok(true),
            Err(ModelError::Remote(e)) if e.is_not_found() => {
                warn!(
                    model = %self.meta.name(),
                    remote_id = record.remote_id().unwrap_or_default(),
                    "Shadow row has no remote resource"
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) fn wrap(&self, row: ShadowRow) -> M {
        M::from_record(RemoteRecord::from_row(
            self.meta.clone(),
            row,
            self.client.scope().clone(),
        ))
    }

    fn client_for(&self, record: &RemoteRecord) -> RemoteClient {
        self.client.with_scope(record.scope().clone())
    }

    /// Body for POST/PUT/PATCH: non-null writable values under the singular label.
    fn save_payload(&self, record: &RemoteRecord, update_fields: Option<&[&str]>) -> Value {
        let targets = if record.is_created() {
            let mut targets = self.meta.remote_mutable_targets();
            if let Some(subset) = update_fields {
                targets.retain(|name, _| subset.contains(&name.as_str()));
            }
            targets
        } else {
            self.meta.remote_targets()
        };

        let mut fields = Map::new();
        for (name, target) in targets {
            let Some(field) = self.meta.field(&name) else {
                continue;
            };
            let value = field.raw_value(record.values());
            if !value.is_null() {
                fields.insert(target, value);
            }
        }

        let mut payload = Map::new();
        payload.insert(self.meta.label().to_string(), Value::Object(fields));
        Value::Object(payload)
    }
}

/// Load every readable field present in `remote` into the record's cache.
pub fn apply_remote(record: &mut RemoteRecord, remote: &Value) {
    let meta = record.meta().clone();
    for field in meta.fields().iter().filter(|field| !field.is_write_only()) {
        if let Some(raw) = remote.get(field.source_key()) {
            field.set_value(record.values_mut(), field.from_remote(raw));
        }
    }
    record.set_state(RecordState::Live);
}

/// Remote identities arrive as strings or integers depending on the service.
pub(crate) fn remote_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn response_remote_id(response: &RawResponse, label: &str) -> Option<String> {
    if response.body.trim().is_empty() {
        return None;
    }
    let body = response.json().ok()?;
    body.get(label)?.get(REMOTE_ID_KEY).and_then(remote_id_string)
}

#[cfg(test)]
#[path = "objects_tests.rs"]
mod objects_tests;
