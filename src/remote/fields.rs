// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Remote field descriptors.
//!
//! A [`RemoteField`] declares how one attribute of a remote-backed model maps to
//! the OpenStack JSON representation: which key it is read from (`source`),
//! which key it is written to (`target`), whether it may be written at all, and
//! how it is validated. Per-record values live in a [`FieldValues`] map keyed by
//! `source`; the descriptor itself is shared by every record of the model.
//!
//! # Field kinds
//!
//! - [`FieldKind::Plain`] - any JSON value
//! - [`FieldKind::Reference`] - written as `<target>Ref`, read from `<source>`
//!   which may be either the id or an object carrying `id`
//! - [`FieldKind::Char`] - a string with a maximum length
//! - [`FieldKind::StringEncodedInt`] - stored remotely as a string, exposed as an integer
//!
//! # Example
//!
//! ```rust
//! use kamaji::remote::fields::RemoteField;
//! use serde_json::json;
//!
//! let image = RemoteField::reference("image");
//! assert_eq!(image.target_key(), "imageRef");
//! assert_eq!(image.from_remote(&json!({"id": "abc"})), json!("abc"));
//! ```

use crate::constants::{REFERENCE_TARGET_SUFFIX, REMOTE_ID_KEY};
use crate::errors::ConfigError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Per-record field values keyed by the field's `source`.
pub type FieldValues = BTreeMap<String, Value>;

/// Custom validation predicate; the error string is reported under the field name.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// How a field's value is typed and serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Plain,
    Reference,
    Char { max_length: usize },
    StringEncodedInt,
}

/// Declaration of one remote attribute.
#[derive(Clone)]
pub struct RemoteField {
    name: String,
    kind: FieldKind,
    source: Option<String>,
    target: Option<String>,
    read_only: bool,
    write_only: bool,
    mutable: bool,
    default: Value,
    unique: bool,
    validators: Vec<Validator>,
}

impl fmt::Debug for RemoteField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteField")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("source", &self.source_key())
            .field("target", &self.target_key())
            .field("read_only", &self.read_only)
            .field("write_only", &self.write_only)
            .field("mutable", &self.mutable)
            .field("default", &self.default)
            .field("unique", &self.unique)
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl RemoteField {
    fn with_kind(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            source: None,
            target: None,
            read_only: false,
            write_only: false,
            mutable: true,
            default: Value::Null,
            unique: false,
            validators: Vec::new(),
        }
    }

    /// Untyped field.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::Plain)
    }

    /// Reference field written under `<name>Ref` (`flavorRef`, `imageRef`).
    #[must_use]
    pub fn reference(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::Reference)
    }

    /// String field of at most `max_length` characters.
    #[must_use]
    pub fn char(name: impl Into<String>, max_length: usize) -> Self {
        Self::with_kind(name, FieldKind::Char { max_length })
    }

    /// Integer that OpenStack transports as a string.
    #[must_use]
    pub fn string_encoded_int(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::StringEncodedInt)
    }

    /// Read the value from `source` instead of the field name.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Write the value to `target` instead of the field name.
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    #[must_use]
    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    /// Sent on create but never on update.
    #[must_use]
    pub fn immutable(mut self) -> Self {
        self.mutable = false;
        self
    }

    #[must_use]
    pub fn default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    /// No two records of the model may hold the same non-null value.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Append a validator; validators run in declaration order.
    #[must_use]
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Reject contradictory declarations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadOnlyAndWriteOnly`] when both flags are set.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.read_only && self.write_only {
            return Err(ConfigError::ReadOnlyAndWriteOnly {
                field: self.name.clone(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Key read from remote representations.
    #[must_use]
    pub fn source_key(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.name)
    }

    /// Key written to remote payloads.
    #[must_use]
    pub fn target_key(&self) -> String {
        let target = self.target.as_deref().unwrap_or(&self.name);
        match self.kind {
            FieldKind::Reference => format!("{target}{REFERENCE_TARGET_SUFFIX}"),
            _ => target.to_string(),
        }
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    #[must_use]
    pub fn is_write_only(&self) -> bool {
        self.write_only
    }

    #[must_use]
    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    #[must_use]
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// Value as exposed locally: the cached value, or the default if never set.
    #[must_use]
    pub fn get_value(&self, values: &FieldValues) -> Value {
        let raw = self.raw_value(values);
        match self.kind {
            FieldKind::StringEncodedInt => decode_int(&raw),
            _ => raw,
        }
    }

    /// Value as sent remotely, without local coercion.
    #[must_use]
    pub fn raw_value(&self, values: &FieldValues) -> Value {
        values
            .get(self.source_key())
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    /// Store `value` in the record-local cache.
    pub fn set_value(&self, values: &mut FieldValues, value: Value) {
        let value = match (self.kind, value) {
            (FieldKind::StringEncodedInt, Value::Number(n)) => Value::String(n.to_string()),
            (_, value) => value,
        };
        values.insert(self.source_key().to_string(), value);
    }

    /// Normalize a value read from a remote representation.
    #[must_use]
    pub fn from_remote(&self, raw: &Value) -> Value {
        match (self.kind, raw) {
            (FieldKind::Reference, Value::Object(map)) => {
                map.get(REMOTE_ID_KEY).cloned().unwrap_or(Value::Null)
            }
            _ => raw.clone(),
        }
    }

    /// Run the type check and every validator; the first failure wins.
    ///
    /// # Errors
    ///
    /// Returns the message of the first failing check.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        if let FieldKind::Char { max_length } = self.kind {
            let Some(text) = value.as_str() else {
                return Err("Must be a string".to_string());
            };
            let length = text.chars().count();
            if length > max_length {
                return Err(format!(
                    "Ensure this value has at most {max_length} characters (it has {length})."
                ));
            }
        }

        for validator in &self.validators {
            validator(value)?;
        }
        Ok(())
    }
}

fn decode_int(raw: &Value) -> Value {
    match raw {
        Value::String(s) if s.is_empty() => Value::Null,
        Value::String(s) => s.trim().parse::<i64>().map_or(Value::Null, Value::from),
        Value::Number(_) => raw.clone(),
        _ => Value::Null,
    }
}

#[cfg(test)]
#[path = "fields_tests.rs"]
mod fields_tests;
