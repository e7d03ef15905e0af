// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Remote request client: one HTTP call against `{service, resource, path}`.
//!
//! The client resolves the service endpoint from the session catalog of its
//! scope, issues the request, and translates failures into [`OpenStackError`].
//! A 401 response invalidates the scope's session and retries the same request
//! exactly once with a fresh session.

use crate::constants::HTTP_UNAUTHORIZED;
use crate::errors::OpenStackError;
use crate::http_errors::{map_status_to_error, map_transport_error};
use crate::metrics;
use crate::openstack::session::{SessionInfo, SessionProvider};
use crate::openstack::types::{RawResponse, RequestOptions, ResourcePath, Scope, UpdateMethod};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Compose `<endpoint>/<resource>/<path>`.
///
/// The collection itself keeps its trailing slash: `<endpoint>/<resource>/`.
#[must_use]
pub fn compose_url(endpoint: &str, resource: &str, path: &ResourcePath) -> String {
    format!(
        "{}/{}/{}",
        endpoint.trim_end_matches('/'),
        resource.trim_matches('/'),
        path.joined()
    )
}

/// HTTP client bound to one authorization scope.
#[derive(Clone)]
pub struct RemoteClient {
    sessions: Arc<dyn SessionProvider>,
    scope: Scope,
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl RemoteClient {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionProvider>, scope: Scope) -> Self {
        Self { sessions, scope }
    }

    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Same session source, different scope.
    #[must_use]
    pub fn with_scope(&self, scope: Scope) -> Self {
        Self {
            sessions: self.sessions.clone(),
            scope,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<dyn SessionProvider> {
        &self.sessions
    }

    /// Issue one request, re-authenticating and retrying once on HTTP 401.
    ///
    /// # Errors
    ///
    /// - [`OpenStackError::EndpointNotFound`] if the catalog has no `service`
    /// - [`OpenStackError::Transport`] on connection, timeout or DNS failure
    /// - the mapped status error for any final status >= 400
    pub async fn request(
        &self,
        method: Method,
        service: &str,
        resource: &str,
        path: &ResourcePath,
        options: RequestOptions<'_>,
    ) -> Result<RawResponse, OpenStackError> {
        let session = self.sessions.get_session(&self.scope).await?;
        let mut response = send(&session, &method, service, resource, path, options).await?;

        if response.status.as_u16() == HTTP_UNAUTHORIZED {
            warn!(
                scope = %self.scope,
                method = %method,
                url = %response.url,
                "OpenStack session expired, re-authenticating"
            );
            self.sessions.invalidate(&self.scope);
            metrics::record_reauthentication(self.scope.kind());

            let session = self.sessions.get_session(&self.scope).await?;
            response = send(&session, &method, service, resource, path, options).await?;
        }

        raise_on_failure(response)
    }

    /// GET `resource[/path]`.
    ///
    /// # Errors
    ///
    /// See [`RemoteClient::request`].
    pub async fn get(
        &self,
        service: &str,
        resource: &str,
        path: &ResourcePath,
    ) -> Result<RawResponse, OpenStackError> {
        self.request(Method::GET, service, resource, path, RequestOptions::default())
            .await
    }

    /// POST a JSON body to `resource[/path]`.
    ///
    /// # Errors
    ///
    /// See [`RemoteClient::request`].
    pub async fn post(
        &self,
        service: &str,
        resource: &str,
        path: &ResourcePath,
        body: &Value,
    ) -> Result<RawResponse, OpenStackError> {
        self.request(
            Method::POST,
            service,
            resource,
            path,
            RequestOptions::json(body),
        )
        .await
    }

    /// PUT or PATCH a JSON body to `resource[/path]` with extra headers.
    ///
    /// # Errors
    ///
    /// See [`RemoteClient::request`].
    pub async fn update(
        &self,
        method: UpdateMethod,
        service: &str,
        resource: &str,
        path: &ResourcePath,
        body: &Value,
        headers: &[(String, String)],
    ) -> Result<RawResponse, OpenStackError> {
        self.request(
            method.into(),
            service,
            resource,
            path,
            RequestOptions::json(body).with_headers(headers),
        )
        .await
    }

    /// DELETE `resource[/path]`.
    ///
    /// # Errors
    ///
    /// See [`RemoteClient::request`].
    pub async fn delete(
        &self,
        service: &str,
        resource: &str,
        path: &ResourcePath,
    ) -> Result<RawResponse, OpenStackError> {
        self.request(
            Method::DELETE,
            service,
            resource,
            path,
            RequestOptions::default(),
        )
        .await
    }
}

async fn send(
    session: &SessionInfo,
    method: &Method,
    service: &str,
    resource: &str,
    path: &ResourcePath,
    options: RequestOptions<'_>,
) -> Result<RawResponse, OpenStackError> {
    let url = compose_url(session.endpoint(service)?, resource, path);

    let mut request = session.client().request(method.clone(), &url);
    if let Some(body) = options.json {
        request = request.json(body);
    }
    for (name, value) in options.headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let start = Instant::now();
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            error!(method = %method, url = %url, error = %e, "OpenStack request failed");
            metrics::record_transport_failure(service, method.as_str());
            return Err(map_transport_error(&e));
        }
    };

    let status = response.status();
    let headers = response.headers().clone();
    let body = response.text().await.map_err(|e| map_transport_error(&e))?;
    let elapsed = start.elapsed();

    debug!(
        method = %method,
        url = %url,
        status = status.as_u16(),
        elapsed_ms = elapsed.as_millis() as u64,
        "OpenStack request"
    );
    if let Some(request_body) = options.json {
        debug!(request = %request_body, "Request");
    }
    debug!(response = %body, "Response Text");
    metrics::record_request(service, method.as_str(), status.as_u16(), elapsed);

    Ok(RawResponse {
        method: method.clone(),
        url,
        status,
        headers,
        body,
        elapsed,
    })
}

fn raise_on_failure(response: RawResponse) -> Result<RawResponse, OpenStackError> {
    let status = response.status.as_u16();
    match map_status_to_error(status, response.body.clone()) {
        Some(err) => {
            error!(
                method = %response.method,
                url = %response.url,
                status = status,
                error = %response.body,
                "OpenStack request returned an error"
            );
            Err(err)
        }
        None => Ok(response),
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod request_tests;
