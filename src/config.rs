// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process configuration for the OpenStack layer.
//!
//! [`OpenStackConfig`] can be loaded from a YAML document or from environment
//! variables. It carries the Keystone endpoint template, the admin credentials,
//! the per-request timeout and the [`Compatibility`] flags that decide how the
//! synchronization engine treats stale and ghost shadow rows.
//!
//! # Example
//!
//! ```rust
//! use kamaji::config::OpenStackConfig;
//!
//! let config = OpenStackConfig::from_yaml_str(
//!     "domain: lab.example.com\nusername: admin\npassword: secret\n",
//! )
//! .unwrap();
//! assert_eq!(
//!     config.auth_url().unwrap(),
//!     "http://keystone.service.lab.example.com:5000/v3/auth/tokens"
//! );
//! ```

use crate::constants::{
    AUTH_TEMPLATE_PLACEHOLDER, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_KEYSTONE_AUTH_TEMPLATE,
    DEFAULT_KEYSTONE_USER_DOMAIN_NAME, ENV_AUTH_URL_TEMPLATE, ENV_DOMAIN,
    ENV_FORGIVE_MISSING_ON_DELETE, ENV_PASSWORD, ENV_PRUNE_ON_SYNC, ENV_TIMEOUT_SECS,
    ENV_USERNAME, ENV_USER_DOMAIN_NAME,
};
use crate::errors::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Behavior switches for the two known remote/local asymmetries.
///
/// Both default to `false`, which keeps the historical behavior:
/// synchronize only adds missing shadow rows, and a failed remote delete
/// always leaves the local row in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Compatibility {
    /// Remove shadow rows whose remote resource no longer exists during synchronize
    pub prune_on_sync: bool,
    /// Treat a remote 404 on delete as success so the local row is removed too
    pub forgive_missing_on_delete: bool,
}

/// Connection settings for the OpenStack identity service and its catalog.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct OpenStackConfig {
    /// Token endpoint template; `$url` / `${url}` is replaced by `domain`
    #[serde(default = "default_auth_url_template")]
    pub auth_url_template: String,
    /// Domain substituted into the template
    #[serde(default)]
    pub domain: String,
    /// Admin username
    pub username: String,
    /// Admin password
    pub password: String,
    /// Keystone domain the admin user lives in
    #[serde(default = "default_user_domain_name")]
    pub user_domain_name: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub compatibility: Compatibility,
}

fn default_auth_url_template() -> String {
    DEFAULT_KEYSTONE_AUTH_TEMPLATE.to_string()
}

fn default_user_domain_name() -> String {
    DEFAULT_KEYSTONE_USER_DOMAIN_NAME.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

// The password never reaches logs.
impl std::fmt::Debug for OpenStackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenStackConfig")
            .field("auth_url_template", &self.auth_url_template)
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("user_domain_name", &self.user_domain_name)
            .field("timeout_secs", &self.timeout_secs)
            .field("compatibility", &self.compatibility)
            .finish()
    }
}

impl OpenStackConfig {
    /// Build a configuration with default template, user domain and timeout.
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            auth_url_template: default_auth_url_template(),
            domain: domain.into(),
            username: username.into(),
            password: password.into(),
            user_domain_name: default_user_domain_name(),
            timeout_secs: default_timeout_secs(),
            compatibility: Compatibility::default(),
        }
    }

    /// Replace the auth URL template (e.g. a literal URL in tests).
    #[must_use]
    pub fn with_auth_url_template(mut self, template: impl Into<String>) -> Self {
        self.auth_url_template = template.into();
        self
    }

    #[must_use]
    pub fn with_compatibility(mut self, compatibility: Compatibility) -> Self {
        self.compatibility = compatibility;
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSetting`] if the document does not parse.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::InvalidSetting {
            setting: "config".to_string(),
            reason: e.to_string(),
        })
    }

    /// Read and parse a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSetting`] if the file cannot be read or parsed.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidSetting {
            setting: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSetting`] if a required variable is missing
    /// or a numeric/boolean variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (environment-shaped).
    ///
    /// # Errors
    ///
    /// Same as [`OpenStackConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| ConfigError::InvalidSetting {
                setting: key.to_string(),
                reason: "environment variable is not set".to_string(),
            })
        };

        let mut config = Self::new(
            required(ENV_DOMAIN)?,
            required(ENV_USERNAME)?,
            required(ENV_PASSWORD)?,
        );

        if let Some(template) = lookup(ENV_AUTH_URL_TEMPLATE) {
            config.auth_url_template = template;
        }
        if let Some(domain) = lookup(ENV_USER_DOMAIN_NAME) {
            config.user_domain_name = domain;
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_SECS) {
            config.timeout_secs = timeout.parse().map_err(|_| ConfigError::InvalidSetting {
                setting: ENV_TIMEOUT_SECS.to_string(),
                reason: format!("'{timeout}' is not a number of seconds"),
            })?;
        }
        if let Some(flag) = lookup(ENV_PRUNE_ON_SYNC) {
            config.compatibility.prune_on_sync = parse_flag(ENV_PRUNE_ON_SYNC, &flag)?;
        }
        if let Some(flag) = lookup(ENV_FORGIVE_MISSING_ON_DELETE) {
            config.compatibility.forgive_missing_on_delete =
                parse_flag(ENV_FORGIVE_MISSING_ON_DELETE, &flag)?;
        }

        Ok(config)
    }

    /// The Keystone token endpoint with the domain substituted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSetting`] if the result is not an absolute URL.
    pub fn auth_url(&self) -> Result<String, ConfigError> {
        let braced = format!("${{{AUTH_TEMPLATE_PLACEHOLDER}}}");
        let bare = format!("${AUTH_TEMPLATE_PLACEHOLDER}");
        let substituted = self
            .auth_url_template
            .replace(&braced, &self.domain)
            .replace(&bare, &self.domain);

        url::Url::parse(&substituted).map_err(|e| ConfigError::InvalidSetting {
            setting: "auth_url_template".to_string(),
            reason: format!("'{substituted}' is not a valid URL: {e}"),
        })?;

        Ok(substituted)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_flag(setting: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidSetting {
            setting: setting.to_string(),
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
