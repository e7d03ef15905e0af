// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for Kamaji's OpenStack layer.
//!
//! This module provides specialized error types for:
//! - Remote OpenStack calls (authentication, endpoint resolution, HTTP failures, transport)
//! - Local validation of remote-backed models (per-field, aggregated)
//! - Model definitions and configuration
//! - The local shadow-row store
//!
//! [`ModelError`] is the union surfaced by the synchronization engine; the HTTP
//! boundary maps it to a response with [`ModelError::status_code`].

use crate::openstack::types::Scope;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while talking to OpenStack.
///
/// Every variant translated from an HTTP response carries the raw response body
/// verbatim as its message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpenStackError {
    /// Keystone rejected the configured credentials (HTTP 401 on token creation)
    ///
    /// Not retried automatically; the caller re-invokes the top-level operation.
    #[error("{}", authentication_message(.scope))]
    Authentication {
        /// Scope the token was requested for
        scope: Scope,
    },

    /// The service catalog has no endpoint for the requested service
    #[error("No endpoint for service {service}, existing endpoints are {known:?}")]
    EndpointNotFound {
        /// The service that was requested (e.g. "compute")
        service: String,
        /// Services present in the catalog
        known: Vec<String>,
    },

    /// Version negotiation against a catalog endpoint failed at the network level
    #[error("Error when retrieving versioned endpoint at {endpoint}: {reason}")]
    EndpointResolution {
        /// The bare catalog endpoint that was queried
        endpoint: String,
        /// Underlying transport failure
        reason: String,
    },

    /// A catalog or version list lacked a required item
    #[error("No item with {value} for {key}")]
    MissingCatalogItem {
        /// Attribute that was searched (e.g. "interface")
        key: String,
        /// Value that was expected (e.g. "public")
        value: String,
    },

    /// HTTP 400
    #[error("{0}")]
    BadRequest(String),

    /// HTTP 401 that persisted after one re-authentication
    #[error("{0}")]
    Unauthorized(String),

    /// HTTP 404
    #[error("{0}")]
    NotFound(String),

    /// HTTP 409
    #[error("{0}")]
    Conflict(String),

    /// Any other status code >= 400
    #[error("{body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Connection refused, timeout, DNS failure or body read failure
    #[error("OpenStack transport error: {0}")]
    Transport(String),

    /// A filtered lookup matched more than one remote item
    #[error("{0}")]
    MultipleObjectsReturned(String),

    /// The remote answered with a body that does not have the expected shape
    #[error("Unexpected OpenStack response: {0}")]
    InvalidResponse(String),
}

fn authentication_message(scope: &Scope) -> String {
    match scope.project_id() {
        Some(project) => format!("Could not authenticate towards OpenStack project '{project}'"),
        None => "Could not authenticate towards OpenStack.".to_string(),
    }
}

impl OpenStackError {
    /// HTTP status code that the boundary layer should answer with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Authentication { .. } | Self::Unauthorized(_) => 401,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Http { status, .. } => *status,
            Self::Transport(_) | Self::EndpointResolution { .. } => 503,
            _ => 500,
        }
    }

    /// Whether this error is a remote 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Aggregated validation failures keyed by field name.
///
/// Field-level validators fail fast; model-level validation collects every
/// failing field into one report.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("Validation failed: {}", format_field_errors(.errors))]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

fn format_field_errors(errors: &BTreeMap<String, Vec<String>>) -> String {
    errors
        .iter()
        .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Names of the failing fields, sorted.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.errors.keys().map(String::as_str).collect()
    }

    /// Messages recorded for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing failed, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns the report itself when it holds at least one failure.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Errors in model definitions or process configuration.
///
/// Model definition errors are raised once when the model registry is built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A model was declared without required OpenStack metadata
    #[error("Model {model} is missing OpenStack metadata '{attribute}'")]
    MissingMetadata {
        /// Model name
        model: String,
        /// Missing attribute ("service" or "resource")
        attribute: String,
    },

    /// A field was declared both read-only and write-only
    #[error("Field '{field}' cannot be read_only and write_only at the same time")]
    ReadOnlyAndWriteOnly {
        /// Field name
        field: String,
    },

    /// A model tried to declare a remote field under a reserved name
    #[error("Model {model} may not override reserved field '{field}'")]
    ReservedField {
        /// Model name
        model: String,
        /// Offending field name
        field: String,
    },

    /// A field name was declared twice on one model
    #[error("Model {model} declares field '{field}' more than once")]
    DuplicateField {
        /// Model name
        model: String,
        /// Offending field name
        field: String,
    },

    /// A model name was registered twice
    #[error("Model {0} is already registered")]
    DuplicateModel(String),

    /// A model name is not present in the registry
    #[error("Model {0} is not registered")]
    UnknownModel(String),

    /// A configuration setting is missing or malformed
    #[error("Invalid setting '{setting}': {reason}")]
    InvalidSetting {
        /// Setting name
        setting: String,
        /// Why the value was rejected
        reason: String,
    },
}

/// Signals raised by the local shadow-row store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No row matched a unique lookup
    #[error("{model} matching query does not exist")]
    NotFound {
        /// Model name
        model: String,
    },

    /// More than one row matched a unique lookup
    #[error("get() returned more than one {model} -- it returned {count}!")]
    MultipleFound {
        /// Model name
        model: String,
        /// Number of matching rows
        count: usize,
    },

    /// A row with this remote identity already exists
    #[error("{model} with remote id '{remote_id}' already exists")]
    DuplicateRemoteId {
        /// Model name
        model: String,
        /// Clashing remote identity
        remote_id: String,
    },

    /// A filter key does not resolve to a stored column
    #[error("Cannot resolve keyword '{key}' into field of {model}")]
    UnknownColumn {
        /// Model name
        model: String,
        /// Unresolvable key
        key: String,
    },

    /// The backing store failed
    #[error("Store backend failure: {0}")]
    Backend(String),
}

/// Errors surfaced by remote-backed model operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error(transparent)]
    Remote(#[from] OpenStackError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The remote resource type is read/associate-only
    #[error("Updates are not supported for {model}")]
    UpdatesNotSupported {
        /// Model name
        model: String,
    },

    /// A query matched nothing
    #[error("{model} matching query does not exist")]
    DoesNotExist {
        /// Model name
        model: String,
    },

    /// A unique query matched several records
    #[error("get() returned more than one {model} -- it returned {count}!")]
    MultipleObjectsReturned {
        /// Model name
        model: String,
        /// Number of matching records
        count: usize,
    },

    /// The named attribute is neither a remote field nor a local column
    #[error("{model} has no field named '{field}'")]
    UnknownField {
        /// Model name
        model: String,
        /// Requested field
        field: String,
    },

    /// The operation needs a remote identity the record does not have yet
    #[error("{model} has not been created remotely yet")]
    NotPersisted {
        /// Model name
        model: String,
    },

    /// A model-specific rule refused the operation
    #[error("{reason}")]
    Refused {
        /// Model name
        model: String,
        /// Human-readable reason
        reason: String,
    },
}

impl ModelError {
    /// HTTP status code that the boundary layer should answer with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Remote(e) => e.status_code(),
            Self::Validation(_) | Self::UnknownField { .. } | Self::Refused { .. } => 400,
            Self::DoesNotExist { .. } | Self::Store(StoreError::NotFound { .. }) => 404,
            Self::UpdatesNotSupported { .. } => 405,
            Self::NotPersisted { .. } => 409,
            _ => 500,
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
