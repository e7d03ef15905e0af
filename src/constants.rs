// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Kamaji OpenStack layer.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Identity (Keystone) Constants
// ============================================================================

/// Default Keystone v3 token endpoint template; `$url` is replaced by the configured domain
pub const DEFAULT_KEYSTONE_AUTH_TEMPLATE: &str = "http://keystone.service.$url:5000/v3/auth/tokens";

/// Default Keystone domain of the admin user
pub const DEFAULT_KEYSTONE_USER_DOMAIN_NAME: &str = "default";

/// Placeholder substituted with the configured domain in the auth URL template
pub const AUTH_TEMPLATE_PLACEHOLDER: &str = "url";

/// Response header carrying the issued token
pub const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Request header carrying the token on authenticated calls
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Only authentication method used against Keystone
pub const PASSWORD_AUTH_METHOD: &str = "password";

// ============================================================================
// Service Catalog Constants
// ============================================================================

/// Catalog interface used for all remote calls
pub const PUBLIC_INTERFACE: &str = "public";

/// Version status selected during version negotiation
pub const CURRENT_VERSION_STATUS: &str = "CURRENT";

/// Link relation holding the versioned endpoint
pub const SELF_LINK_REL: &str = "self";

// ============================================================================
// Resource Constants
// ============================================================================

/// Key of the remote identity inside a resource representation
pub const REMOTE_ID_KEY: &str = "id";

/// Suffix appended to the target key of reference fields (`flavor` -> `flavorRef`)
pub const REFERENCE_TARGET_SUFFIX: &str = "Ref";

/// Trailing path segment for resource actions
pub const ACTION_PATH_SEGMENT: &str = "action";

/// Suffix of the pagination links key that accompanies OpenStack collections
pub const COLLECTION_LINKS_SUFFIX: &str = "_links";

/// Field names a model may not declare as remote fields
pub const RESERVED_FIELD_NAMES: &[&str] = &["id", "pk", "remote_id"];

/// Store column holding the local identity
pub const LOCAL_ID_COLUMN: &str = "local_id";

/// Store column holding the remote identity
pub const REMOTE_ID_COLUMN: &str = "remote_id";

/// Message attached to a unique-field violation
pub const UNIQUE_VIOLATION_MESSAGE: &str = "Must be unique.";

// ============================================================================
// HTTP Constants
// ============================================================================

/// Default per-request timeout (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// First status code treated as a failure
pub const HTTP_FAILURE_THRESHOLD: u16 = 400;

/// Status code returned by services that offer several API versions
pub const HTTP_MULTIPLE_CHOICES: u16 = 300;

/// Status code returned when a token expired or was revoked
pub const HTTP_UNAUTHORIZED: u16 = 401;

// ============================================================================
// Configuration Environment Variables
// ============================================================================

/// Environment variable overriding the auth URL template
pub const ENV_AUTH_URL_TEMPLATE: &str = "KAMAJI_KEYSTONE_AUTH_TEMPLATE";

/// Environment variable holding the domain substituted into the template
pub const ENV_DOMAIN: &str = "KAMAJI_DOMAIN";

/// Environment variable holding the admin username
pub const ENV_USERNAME: &str = "KAMAJI_OPENSTACK_USERNAME";

/// Environment variable holding the admin password
pub const ENV_PASSWORD: &str = "KAMAJI_OPENSTACK_PASSWORD";

/// Environment variable overriding the Keystone user domain name
pub const ENV_USER_DOMAIN_NAME: &str = "KAMAJI_KEYSTONE_USER_DOMAIN_NAME";

/// Environment variable overriding the request timeout in seconds
pub const ENV_TIMEOUT_SECS: &str = "KAMAJI_HTTP_TIMEOUT_SECS";

/// Environment variable enabling removal of stale shadow rows during synchronize
pub const ENV_PRUNE_ON_SYNC: &str = "KAMAJI_PRUNE_ON_SYNC";

/// Environment variable enabling local cleanup when the remote resource is already gone
pub const ENV_FORGIVE_MISSING_ON_DELETE: &str = "KAMAJI_FORGIVE_MISSING_ON_DELETE";
