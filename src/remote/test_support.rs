// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Test models and handles backed by a mock OpenStack and a memory store.

use crate::errors::ConfigError;
use crate::openstack::request::RemoteClient;
use crate::openstack::test_support::StaticSessions;
use crate::openstack::types::{Scope, UpdateMethod};
use crate::remote::fields::RemoteField;
use crate::remote::meta::ModelMeta;
use crate::remote::objects::RemoteObjects;
use crate::remote::record::{RemoteModel, RemoteRecord};
use crate::remote::store::{MemoryStore, ShadowStore};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Nova flavor: unique name, validated ram, immutable vcpus, PATCH updates.
#[derive(Debug, Clone)]
pub(crate) struct Flavor(RemoteRecord);

impl RemoteModel for Flavor {
    const NAME: &'static str = "Flavor";

    fn describe() -> Result<ModelMeta, ConfigError> {
        ModelMeta::builder(Self::NAME)
            .service("compute")
            .resource("flavors")
            .update_method(UpdateMethod::Patch)
            .update_header("OpenStack-API-Version", "compute 2.55")
            .field(RemoteField::char("name", 32).unique())
            .field(RemoteField::new("ram").validator(|value| {
                if value.as_u64().is_some_and(|ram| ram > 0) {
                    Ok(())
                } else {
                    Err("Must be a positive integer".to_string())
                }
            }))
            .field(RemoteField::new("vcpus").immutable())
            .field(RemoteField::new("description"))
            .field(RemoteField::new("is_public").source("os-flavor-access:is_public").read_only())
            .local_column("owner")
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

/// Nova server: reference fields and a write-only password.
#[derive(Debug, Clone)]
pub(crate) struct Server(RemoteRecord);

impl RemoteModel for Server {
    const NAME: &'static str = "Server";

    fn describe() -> Result<ModelMeta, ConfigError> {
        ModelMeta::builder(Self::NAME)
            .service("compute")
            .resource("servers")
            .field(RemoteField::new("name"))
            .field(RemoteField::reference("image").immutable())
            .field(RemoteField::reference("flavor").immutable())
            .field(RemoteField::new("admin_pass").source("adminPass").target("adminPass").write_only())
            .field(RemoteField::new("status").read_only())
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

/// Handle for `M` against `{server}/compute` and `store`.
pub(crate) fn objects_with<M: RemoteModel>(
    server: &MockServer,
    store: Arc<dyn ShadowStore>,
) -> RemoteObjects<M> {
    let meta = Arc::new(M::describe().unwrap());
    let client = RemoteClient::new(StaticSessions::compute(server), Scope::Admin);
    RemoteObjects::new(meta, client, store)
}

/// Handle for `M` with a fresh memory store.
pub(crate) fn objects<M: RemoteModel>(server: &MockServer) -> (RemoteObjects<M>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (objects_with(server, store.clone()), store)
}

/// Serve `GET /compute/<resource>/<id>` with `{label: body}`.
pub(crate) async fn mount_item(server: &MockServer, resource: &str, label: &str, id: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/compute/{resource}/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ label: body })))
        .mount(server)
        .await;
}

/// Serve `GET /compute/<resource>/` with `{resource: items}`.
pub(crate) async fn mount_listing(server: &MockServer, resource: &str, items: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/compute/{resource}/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ resource: items })))
        .mount(server)
        .await;
}
