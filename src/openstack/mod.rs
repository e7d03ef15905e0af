// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! OpenStack transport: sessions, requests and model-less resource access.
//!
//! - [`session`] - Keystone authentication and the per-scope session cache
//! - [`request`] - one HTTP call with error translation and a single 401 retry
//! - [`shortcut`] - typed-error access to a collection without a local model
//! - [`types`] - scopes, resource paths and raw responses

pub mod request;
pub mod session;
pub mod shortcut;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use request::RemoteClient;
pub use session::{SessionCache, SessionInfo, SessionProvider};
pub use shortcut::ResourceShortcut;
pub use types::{RawResponse, RequestOptions, ResourcePath, Scope, UpdateMethod};
