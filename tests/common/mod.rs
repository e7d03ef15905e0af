// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common test utilities for integration tests: a mock cloud and a flavor model.

#![allow(dead_code)]

use kamaji::config::{Compatibility, OpenStackConfig};
use kamaji::context::Context;
use kamaji::errors::ConfigError;
use kamaji::openstack::Scope;
use kamaji::remote::{ModelMeta, RemoteField, RemoteModel, RemoteObjects, RemoteRecord, ShadowStore};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "gAAAAAB-integration-token";
pub const AUTH_PATH: &str = "/v3/auth/tokens";

/// Nova flavor declared through the public model API.
#[derive(Debug, Clone)]
pub struct Flavor(RemoteRecord);

impl RemoteModel for Flavor {
    const NAME: &'static str = "Flavor";

    fn describe() -> Result<ModelMeta, ConfigError> {
        ModelMeta::builder(Self::NAME)
            .service("compute")
            .resource("flavors")
            .field(RemoteField::new("name").unique())
            .field(RemoteField::new("ram"))
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

/// Mount Keystone on `server` with a catalog holding `compute` at `{server}/compute`.
pub async fn mount_keystone(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("X-Subject-Token", TOKEN)
                .set_body_json(json!({
                    "token": {
                        "expires_at": "2999-01-01T00:00:00.000000Z",
                        "catalog": [{
                            "type": "compute",
                            "endpoints": [
                                {"interface": "admin", "url": "http://admin.invalid/compute"},
                                {"interface": "public", "url": format!("{}/compute", server.uri())}
                            ]
                        }]
                    }
                })),
        )
        .mount(server)
        .await;
}

/// YAML config file pointing at the mock Keystone.
pub fn write_config(server: &MockServer, compatibility: Compatibility) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    writeln!(
        file,
        "auth_url_template: \"{}{AUTH_PATH}\"\nusername: admin\npassword: secret\ntimeout_secs: 5\ncompatibility:\n  prune_on_sync: {}\n  forgive_missing_on_delete: {}",
        server.uri(),
        compatibility.prune_on_sync,
        compatibility.forgive_missing_on_delete
    )
    .expect("write temp config");
    file
}

/// Context loaded from a YAML file, backed by `store`.
pub fn context(server: &MockServer, store: Arc<dyn ShadowStore>) -> Context {
    let file = write_config(server, Compatibility::default());
    let config = OpenStackConfig::from_yaml_file(file.path()).expect("load config");
    Context::new(config, store).expect("build context")
}

/// Admin flavor handle on `ctx`.
pub fn flavors(ctx: &Context) -> RemoteObjects<Flavor> {
    let meta = Arc::new(Flavor::describe().expect("valid flavor model"));
    RemoteObjects::new(meta, ctx.client(Scope::Admin), ctx.store().clone())
        .with_compatibility(ctx.config().compatibility)
}
