// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared fixtures for unit tests that talk to a mock OpenStack.

use crate::config::OpenStackConfig;
use crate::constants::{AUTH_TOKEN_HEADER, SUBJECT_TOKEN_HEADER};
use crate::errors::OpenStackError;
use crate::openstack::session::{SessionInfo, SessionProvider};
use crate::openstack::types::Scope;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub(crate) const TEST_TOKEN: &str = "gAAAAAB-test-token";
pub(crate) const AUTH_PATH: &str = "/v3/auth/tokens";

/// Config whose auth URL points at the mock server.
pub(crate) fn test_config(server: &MockServer) -> OpenStackConfig {
    OpenStackConfig::new("", "admin", "secret")
        .with_auth_url_template(format!("{}{AUTH_PATH}", server.uri()))
        .with_timeout_secs(5)
}

/// Keystone token body listing `services` as `(type, path on the mock server)`.
pub(crate) fn token_body(server: &MockServer, services: &[(&str, &str)]) -> Value {
    let catalog: Vec<Value> = services
        .iter()
        .map(|(service_type, service_path)| {
            json!({
                "type": service_type,
                "endpoints": [
                    {"interface": "internal", "url": format!("http://internal.invalid{service_path}")},
                    {"interface": "public", "url": format!("{}{service_path}", server.uri())},
                ]
            })
        })
        .collect();

    json!({
        "token": {
            "expires_at": "2999-01-01T00:00:00.000000Z",
            "catalog": catalog
        }
    })
}

/// Keystone responder issuing `token` for `services`.
pub(crate) fn identity_response(
    server: &MockServer,
    token: &str,
    services: &[(&str, &str)],
) -> ResponseTemplate {
    ResponseTemplate::new(201)
        .insert_header(SUBJECT_TOKEN_HEADER, token)
        .set_body_json(token_body(server, services))
}

/// Mount a Keystone token endpoint expecting exactly `calls` authentications.
pub(crate) async fn mount_identity(server: &MockServer, services: &[(&str, &str)], calls: u64) {
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .respond_with(identity_response(server, TEST_TOKEN, services))
        .expect(calls)
        .mount(server)
        .await;
}

/// Session provider with a fixed catalog, counting builds and invalidations.
pub(crate) struct StaticSessions {
    endpoints: BTreeMap<String, String>,
    current: Mutex<Option<Arc<SessionInfo>>>,
    builds: AtomicUsize,
    invalidations: AtomicUsize,
}

impl StaticSessions {
    pub(crate) fn new(endpoints: &[(&str, String)]) -> Self {
        Self {
            endpoints: endpoints
                .iter()
                .map(|(service, url)| ((*service).to_string(), url.clone()))
                .collect(),
            current: Mutex::new(None),
            builds: AtomicUsize::new(0),
            invalidations: AtomicUsize::new(0),
        }
    }

    /// Catalog with a single `compute` service rooted at `{server}/compute`.
    pub(crate) fn compute(server: &MockServer) -> Arc<Self> {
        Arc::new(Self::new(&[(
            "compute",
            format!("{}/compute", server.uri()),
        )]))
    }

    pub(crate) fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub(crate) fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for StaticSessions {
    async fn get_session(&self, _scope: &Scope) -> Result<Arc<SessionInfo>, OpenStackError> {
        let mut current = self.current.lock().unwrap();
        if let Some(info) = current.as_ref() {
            return Ok(info.clone());
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_bytes(AUTH_TOKEN_HEADER.as_bytes()).unwrap(),
            HeaderValue::from_static(TEST_TOKEN),
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .unwrap();

        let info = Arc::new(SessionInfo::new(client, self.endpoints.clone(), None));
        *current = Some(info.clone());
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(info)
    }

    fn invalidate(&self, _scope: &Scope) {
        *self.current.lock().unwrap() = None;
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}
