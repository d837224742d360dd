//! Prelude module for convenient imports.
//!
//! ```rust
//! use vigil_validator::prelude::*;
//!
//! let validator = Validator::builder()
//!     .defaults(Options::new().strategy(Strategy::Tags))
//!     .build_or_panic();
//! # let _ = validator;
//! ```

pub use crate::{
    BoxError, Context, FieldError, FieldRule, FieldRules, Options, PresenceMap, SchemaSource,
    SelfValidation, Strategy, Validatable, ValidationErrors, Validator, compute_presence,
};
