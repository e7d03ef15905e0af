// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Types shared by the session, request and shortcut layers.

use crate::errors::OpenStackError;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Authorization context a session and its endpoint catalog are valid for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Unscoped global admin session
    #[default]
    Admin,
    /// Session scoped to one OpenStack project id
    Project(String),
}

impl Scope {
    #[must_use]
    pub fn project(id: impl Into<String>) -> Self {
        Self::Project(id.into())
    }

    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::Admin => None,
            Self::Project(id) => Some(id),
        }
    }

    /// Low-cardinality label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Project(_) => "project",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Project(id) => write!(f, "project:{id}"),
        }
    }
}

/// HTTP verb used to update an existing remote resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdateMethod {
    #[default]
    Put,
    Patch,
}

impl From<UpdateMethod> for Method {
    fn from(method: UpdateMethod) -> Self {
        match method {
            UpdateMethod::Put => Method::PUT,
            UpdateMethod::Patch => Method::PATCH,
        }
    }
}

/// Path below a resource collection.
///
/// Empty for the collection itself, one segment for a single item, or several
/// segments such as `(id, "action")`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    /// The collection itself.
    #[must_use]
    pub fn collection() -> Self {
        Self::default()
    }

    /// Append a segment.
    #[must_use]
    pub fn push(mut self, segment: impl fmt::Display) -> Self {
        self.segments.push(segment.to_string());
        self
    }

    /// Append a segment if present; `None` segments are skipped.
    #[must_use]
    pub fn push_opt<T: fmt::Display>(self, segment: Option<T>) -> Self {
        match segment {
            Some(segment) => self.push(segment),
            None => self,
        }
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments joined with `/`.
    #[must_use]
    pub fn joined(&self) -> String {
        self.segments.join("/")
    }
}

macro_rules! resource_path_from_display {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ResourcePath {
                fn from(segment: $ty) -> Self {
                    Self::collection().push(segment)
                }
            }
        )*
    };
}

resource_path_from_display!(&str, String, &String, u32, u64, i32, i64, usize);

impl<A: fmt::Display, B: fmt::Display> From<(A, B)> for ResourcePath {
    fn from((first, second): (A, B)) -> Self {
        Self::collection().push(first).push(second)
    }
}

impl<T: fmt::Display> From<Option<T>> for ResourcePath {
    fn from(segment: Option<T>) -> Self {
        Self::collection().push_opt(segment)
    }
}

impl<T: fmt::Display> From<Vec<T>> for ResourcePath {
    fn from(segments: Vec<T>) -> Self {
        segments
            .into_iter()
            .fold(Self::collection(), |path, segment| path.push(segment))
    }
}

/// Extra request inputs: JSON body and headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions<'a> {
    pub json: Option<&'a Value>,
    pub headers: &'a [(String, String)],
}

impl<'a> RequestOptions<'a> {
    #[must_use]
    pub fn json(body: &'a Value) -> Self {
        Self {
            json: Some(body),
            headers: &[],
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: &'a [(String, String)]) -> Self {
        self.headers = headers;
        self
    }
}

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub method: Method,
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
    pub elapsed: Duration,
}

impl RawResponse {
    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::InvalidResponse`] if the body is not JSON.
    pub fn json(&self) -> Result<Value, OpenStackError> {
        serde_json::from_str(&self.body).map_err(|e| {
            OpenStackError::InvalidResponse(format!(
                "{} {} returned a non-JSON body: {e}",
                self.method, self.url
            ))
        })
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
