// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP error code mapping to typed OpenStack errors.
//!
//! This module converts HTTP status codes returned by OpenStack services into
//! [`OpenStackError`] variants, and transport failures reported by `reqwest`
//! into [`OpenStackError::Transport`]. It is the single place where the
//! status-code taxonomy lives.
//!
//! # Usage
//!
//! ```rust
//! use kamaji::errors::OpenStackError;
//! use kamaji::http_errors::map_status_to_error;
//!
//! let err = map_status_to_error(404, "no such flavor".into());
//! assert_eq!(err, Some(OpenStackError::NotFound("no such flavor".into())));
//!
//! assert_eq!(map_status_to_error(200, String::new()), None);
//! ```

use crate::constants::HTTP_FAILURE_THRESHOLD;
use crate::errors::OpenStackError;

/// Map an HTTP status code and its body to a typed error.
///
/// Returns `None` for status codes below 400.
///
/// # HTTP Code Mapping
///
/// | HTTP Code | Error |
/// |-----------|-------|
/// | 400 | `BadRequest` |
/// | 401 | `Unauthorized` |
/// | 404 | `NotFound` |
/// | 409 | `Conflict` |
/// | Other >= 400 | `Http { status, body }` |
///
/// The body is carried verbatim in every variant.
#[must_use]
pub fn map_status_to_error(status_code: u16, body: String) -> Option<OpenStackError> {
    if status_code < HTTP_FAILURE_THRESHOLD {
        return None;
    }

    Some(match status_code {
        400 => OpenStackError::BadRequest(body),
        401 => OpenStackError::Unauthorized(body),
        404 => OpenStackError::NotFound(body),
        409 => OpenStackError::Conflict(body),
        status => OpenStackError::Http { status, body },
    })
}

/// Map a `reqwest` failure (connection refused, timeout, DNS, body read) to
/// [`OpenStackError::Transport`].
#[must_use]
pub fn map_transport_error(error: &reqwest::Error) -> OpenStackError {
    let kind = if error.is_timeout() {
        "timeout"
    } else if error.is_connect() {
        "connection failed"
    } else if error.is_decode() || error.is_body() {
        "invalid body"
    } else {
        "request failed"
    };

    OpenStackError::Transport(format!("{kind}: {error}"))
}

/// Short label for a status code, used as a metrics label.
#[must_use]
pub fn status_label(status_code: u16) -> String {
    status_code.to_string()
}

#[cfg(test)]
#[path = "http_errors_tests.rs"]
mod http_errors_tests;
