//! # vigil-validator
//!
//! A multi-strategy validation engine. Given any serializable value it picks
//! the applicable technique, runs it, and returns one normalized error
//! report:
//!
//! - **Interface**: the type validates itself ([`Validatable::validate`],
//!   optionally context-aware).
//! - **Tags**: declarative per-field rules ([`FieldRules`]) such as
//!   `"required,email"` or `"omitempty,min=3"`.
//! - **JSON Schema**: a schema attached to the type or passed per call,
//!   compiled once and kept in an LRU cache.
//!
//! Partial (PATCH-style) validation is driven by a [`PresenceMap`] computed
//! from the raw request body, so only the fields a client actually sent are
//! checked.
//!
//! ## Quick Start
//!
//! ```rust
//! use serde::Serialize;
//! use vigil_validator::{FieldRules, Options, Validatable, Validator};
//!
//! #[derive(Serialize)]
//! struct Signup {
//!     email: String,
//!     password: String,
//! }
//!
//! impl Validatable for Signup {
//!     fn field_rules() -> Option<FieldRules> {
//!         Some(
//!             FieldRules::new()
//!                 .rule("email", "required,email")
//!                 .rule("password", "required,strong_password"),
//!         )
//!     }
//! }
//!
//! let validator = Validator::default();
//! let signup = Signup { email: "a@b.co".into(), password: "hunter2".into() };
//! let options = Options::new().redactor(|path| path == "password");
//!
//! let errors = validator.validate_with(&signup, &options).unwrap_err();
//! let error = errors.get_field("password").unwrap();
//! assert_eq!(error.code, "tag.strong_password");
//! assert!(!error.message.contains("hunter2"));
//! ```
//!
//! ## Errors
//!
//! Every strategy reports through [`FieldError`] and the
//! [`ValidationErrors`] aggregate, which serializes as
//! `{"errors": [...], "truncated": bool}`. Configuration problems surface as
//! [`ConfigError`] when building a [`Validator`] or registering a tag, never
//! during validation.

pub mod capability;
pub mod config;
pub mod context;
pub mod error;
mod interface;
pub mod options;
pub mod prelude;
pub mod presence;
mod schema;
pub mod tags;
mod validator;

pub use capability::{BoxError, Dispatch, NilState, SchemaSource, SelfValidation, Validatable};
pub use config::{
    CustomValidatorFn, DEFAULT_MAX_CACHED_SCHEMAS, DEFAULT_MAX_FIELDS, FieldNameMapper, Redactor,
    Strategy, ValidatorSettings,
};
pub use context::Context;
pub use error::{
    ConfigError, FieldError, HTTP_STATUS, REDACTED, ValidationErrors, codes, is_validation_error,
};
pub use options::Options;
pub use presence::{MAX_DEPTH, PresenceMap, compute_presence};
pub use tags::{FieldRule, FieldRules, MessageFn, TagFn, ValueKind};
pub use validator::{Validator, ValidatorBuilder, default_validator, validate};
