//! Unified error model shared by every validation strategy.
//!
//! Tag, schema and interface strategies all report through [`FieldError`]
//! and the [`ValidationErrors`] aggregate, so callers inspect one shape no
//! matter which technique produced the failure.
//!
//! The aggregate enforces the `max_errors` limit at insertion time: once
//! the limit is hit the aggregate is marked truncated and every further
//! insertion is dropped.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capability::BoxError;

/// HTTP status callers should use when turning a validation failure into a
/// response (422 Unprocessable Entity).
pub const HTTP_STATUS: u16 = 422;

/// Placeholder written over values whose path matched a redactor.
pub const REDACTED: &str = "[REDACTED]";

/// Stable, machine-readable error codes produced outside of the
/// strategy-namespaced `tag.*` / `schema.*` families.
pub mod codes {
    /// The validated value itself was nil (`null`, `()`).
    pub const NIL: &str = "nil";
    /// The validated value was an empty pointer-like wrapper (`None`).
    pub const NIL_POINTER: &str = "nil_pointer";
    /// A JSON Schema could not be parsed or compiled.
    pub const SCHEMA_COMPILE_ERROR: &str = "schema_compile_error";
    /// The value could not be serialized to JSON.
    pub const MARSHAL_ERROR: &str = "marshal_error";
    /// The raw JSON attached to the context could not be parsed.
    pub const UNMARSHAL_ERROR: &str = "unmarshal_error";
    /// Generic code for errors returned by a type's own validation method.
    pub const VALIDATION_ERROR: &str = "validation_error";
    /// Partial validation was asked to process more fields than allowed.
    pub const MAX_FIELDS_EXCEEDED: &str = "max_fields_exceeded";
    /// A field rule referenced a tag that is not registered.
    pub const UNKNOWN_TAG: &str = "unknown_tag";
    /// A presence path named a field the type does not declare.
    pub const UNKNOWN_FIELD: &str = "tag.unknown_field";
}

// ============================================================================
// FIELD ERROR
// ============================================================================

/// A single validation failure.
///
/// An empty `path` means the failure applies to the value as a whole rather
/// than to one of its fields.
///
/// # Examples
///
/// ```rust
/// use vigil_validator::FieldError;
///
/// let error = FieldError::new("tag.required", "is required")
///     .with_path("email")
///     .with_meta("tag", "required");
///
/// assert_eq!(error.to_string(), "email: is required");
/// assert_eq!(error.http_status(), 422);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dot-delimited field path, e.g. `items.2.price`.
    #[serde(default)]
    pub path: String,

    /// Namespaced error code, e.g. `tag.required` or `schema.minLength`.
    pub code: String,

    /// Human-readable message.
    pub message: String,

    /// Optional structured details (tag name, parameter, offending value).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl FieldError {
    /// Creates a value-level error with a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: String::new(),
            code: code.into(),
            message: message.into(),
            meta: None,
        }
    }

    /// Sets the field path for this error.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Adds a metadata entry.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Looks up a metadata entry by key.
    #[must_use]
    pub fn meta_value(&self, key: &str) -> Option<&Value> {
        self.meta.as_ref().and_then(|meta| meta.get(key))
    }

    /// Returns `true` if the error is not attached to a field.
    #[must_use]
    pub fn is_value_level(&self) -> bool {
        self.path.is_empty()
    }

    /// HTTP status hint for this failure. Always 422.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        HTTP_STATUS
    }

    /// Replaces each of `renderings` in the message with [`REDACTED`].
    ///
    /// Longer renderings should come first: a JSON rendering such as
    /// `"pw\"x"` contains the raw text and must be replaced as a whole.
    /// The `value` metadata entry is overwritten unconditionally so the
    /// marker is present even when the raw value was empty.
    pub fn redact(&mut self, renderings: &[&str]) {
        for rendering in renderings.iter().filter(|r| !r.is_empty()) {
            self.message = self.message.replace(rendering, REDACTED);
        }
        self.meta
            .get_or_insert_with(Map::new)
            .insert("value".to_owned(), Value::String(REDACTED.to_owned()));
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

impl StdError for FieldError {}

// ============================================================================
// VALIDATION ERRORS
// ============================================================================

/// Ordered collection of [`FieldError`]s produced by one validation call.
///
/// Serializes as `{ "errors": [...], "truncated": bool }`.
///
/// # Examples
///
/// ```rust
/// use vigil_validator::{FieldError, ValidationErrors};
///
/// let mut errors = ValidationErrors::with_limit(1);
/// assert!(errors.add(FieldError::new("tag.required", "is required").with_path("name")));
/// assert!(!errors.add(FieldError::new("tag.required", "is required").with_path("age")));
///
/// assert_eq!(errors.len(), 1);
/// assert!(errors.is_truncated());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
    #[serde(default)]
    truncated: bool,
    #[serde(skip)]
    limit: usize,
}

impl ValidationErrors {
    /// Creates an empty, unlimited aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty aggregate that holds at most `limit` errors.
    ///
    /// A limit of `0` means unlimited.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            errors: Vec::new(),
            truncated: false,
            limit,
        }
    }

    /// Appends an error.
    ///
    /// Returns `false` when the error was dropped because the aggregate is
    /// (or just became) truncated.
    pub fn add(&mut self, error: FieldError) -> bool {
        if self.truncated {
            return false;
        }
        if self.limit > 0 && self.errors.len() >= self.limit {
            self.truncated = true;
            return false;
        }
        self.errors.push(error);
        true
    }

    /// Appends every error of another aggregate, propagating its
    /// truncation flag.
    pub fn extend(&mut self, other: ValidationErrors) {
        for error in other.errors {
            if !self.add(error) {
                break;
            }
        }
        if other.truncated {
            self.truncated = true;
        }
    }

    /// Coerces an arbitrary error into this aggregate.
    ///
    /// - `ValidationErrors` are flattened in (the limit still applies),
    /// - `FieldError`s are appended as-is,
    /// - anything else becomes a single `validation_error` entry carrying
    ///   the original message.
    pub fn add_error(&mut self, error: BoxError) {
        let error = match error.downcast::<ValidationErrors>() {
            Ok(errors) => {
                self.extend(*errors);
                return;
            }
            Err(other) => other,
        };
        match error.downcast::<FieldError>() {
            Ok(field) => {
                self.add(*field);
            }
            Err(other) => {
                self.add(FieldError::new(codes::VALIDATION_ERROR, other.to_string()));
            }
        }
    }

    /// Sorts errors by `(path, code)`.
    pub fn sort(&mut self) {
        self.errors
            .sort_by(|a, b| (&a.path, &a.code).cmp(&(&b.path, &b.code)));
    }

    /// Returns `true` if any error carries `code`.
    #[must_use]
    pub fn has_code(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    /// Returns `true` if any error is attached to `path`.
    #[must_use]
    pub fn has(&self, path: &str) -> bool {
        self.errors.iter().any(|e| e.path == path)
    }

    /// Returns the first error attached to `path`.
    #[must_use]
    pub fn get_field(&self, path: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.path == path)
    }

    /// All errors in their current order.
    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        &self.errors
    }

    /// Iterates over the errors.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.errors.iter()
    }

    /// Number of errors held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` if no error was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns `true` if the error limit cut the report short.
    ///
    /// When set, the absence of a code does not prove the absence of that
    /// failure class.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Converts into `Ok(())` when empty, otherwise sorts and returns
    /// `Err(self)`.
    pub fn into_result(mut self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() && !self.truncated {
            Ok(())
        } else {
            self.sort();
            Err(self)
        }
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self {
            errors: vec![error],
            truncated: false,
            limit: 0,
        }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed")?;
        for (i, error) in self.errors.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            write!(f, "{error}")?;
        }
        if self.truncated {
            write!(f, " (truncated)")?;
        }
        Ok(())
    }
}

impl StdError for ValidationErrors {}

/// Returns `true` if `error` or anything in its `source()` chain is a
/// validation failure produced by this crate.
///
/// # Examples
///
/// ```rust
/// use vigil_validator::{FieldError, is_validation_error};
///
/// let error = FieldError::new("tag.required", "is required");
/// assert!(is_validation_error(&error));
///
/// let io = std::io::Error::other("disk full");
/// assert!(!is_validation_error(&io));
/// ```
#[must_use]
pub fn is_validation_error(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(error) = current {
        if error.is::<FieldError>() || error.is::<ValidationErrors>() {
            return true;
        }
        current = error.source();
    }
    false
}

// ============================================================================
// CONFIGURATION ERRORS
// ============================================================================

/// Errors raised while building a [`Validator`](crate::Validator) or
/// registering tags. Never produced by a validation call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A numeric limit from a settings source was negative.
    #[error("`{name}` must not be negative, got {value}")]
    NegativeLimit {
        /// Setting name.
        name: &'static str,
        /// Offending value.
        value: i64,
    },

    /// A tag was registered after the tag engine was built.
    #[error("cannot register tag `{tag}`: tag registry is frozen after the first validation")]
    TagRegistryFrozen {
        /// Tag name.
        tag: String,
    },

    /// A tag name cannot be used.
    #[error("invalid tag name `{tag}`: {reason}")]
    InvalidTagName {
        /// Tag name.
        tag: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A custom schema was configured with an empty id.
    #[error("custom schema id must not be empty")]
    EmptySchemaId,
}

// ============================================================================
// TESTS
// ============================================================================
