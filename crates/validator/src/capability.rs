//! Capability contract between application types and the engine.
//!
//! A type opts into validation by implementing [`Validatable`]. The trait
//! exposes every capability the engine can use:
//!
//! - a self-validation method (plain and/or context-aware),
//! - declarative field rules for the tag strategy,
//! - an attached JSON Schema for the schema strategy.
//!
//! Capabilities are type-level facts, so the orchestrator resolves them once
//! per concrete type and memoizes the result in a [`TypeCache`].
//!
//! Pointer-like wrappers (`Box`, `Arc`, `Option`) forward every capability
//! to the value they hold, which is how "the pointee has the method" is
//! expressed here.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::context::Context;
use crate::tags::FieldRules;

/// Boxed error returned by a type's own validation method.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ============================================================================
// SELF VALIDATION
// ============================================================================

/// Which self-validation methods a type provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SelfValidation {
    /// No self-validation.
    #[default]
    None,
    /// [`Validatable::validate`] only.
    Plain,
    /// [`Validatable::validate_with_context`] only.
    Contextual,
    /// Both methods.
    Both,
}

/// The concrete method a call dispatches to, resolved from
/// [`SelfValidation`] and whether a context is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dispatch {
    /// Nothing to call; the type passes.
    NoValidator,
    /// Call [`Validatable::validate`].
    ValueValidator,
    /// Call [`Validatable::validate_with_context`].
    ContextValidator,
}

impl Dispatch {
    /// Picks the method to call. The context-aware method wins whenever a
    /// context is available.
    #[must_use]
    pub fn resolve(capability: SelfValidation, has_context: bool) -> Self {
        match capability {
            SelfValidation::None => Self::NoValidator,
            SelfValidation::Plain => Self::ValueValidator,
            SelfValidation::Contextual => Self::ContextValidator,
            SelfValidation::Both if has_context => Self::ContextValidator,
            SelfValidation::Both => Self::ValueValidator,
        }
    }
}

/// Whether a value is present or one of the nil forms the engine rejects
/// before running any strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NilState {
    /// A real value.
    Present,
    /// A nil value (`null`, `()`).
    Nil,
    /// An empty pointer-like wrapper (`None`).
    NilPointer,
}

// ============================================================================
// SCHEMA SOURCE
// ============================================================================

/// A JSON Schema document identified by a caller-chosen id.
///
/// The id is the cache key: two sources with the same id are assumed to
/// carry the same document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSource {
    id: Cow<'static, str>,
    text: Cow<'static, str>,
}

impl SchemaSource {
    /// Creates a schema source from an id and the schema's JSON text.
    pub fn new(id: impl Into<Cow<'static, str>>, text: impl Into<Cow<'static, str>>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Cache id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Schema JSON text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

// ============================================================================
// VALIDATABLE
// ============================================================================

/// A value the engine can validate.
///
/// Every method has a default, so an empty `impl Validatable for T {}` is a
/// type with no capabilities; validating it succeeds (under the tag
/// fallback it simply has no rules).
///
/// # Examples
///
/// ```rust
/// use serde::Serialize;
/// use vigil_validator::{BoxError, FieldRule, FieldRules, SelfValidation, Validatable};
///
/// #[derive(Serialize)]
/// struct Signup {
///     email: String,
///     age: u32,
/// }
///
/// impl Validatable for Signup {
///     fn field_rules() -> Option<FieldRules> {
///         Some(
///             FieldRules::new()
///                 .rule("email", "required,email")
///                 .field(FieldRule::new("age").tags("min=18")),
///         )
///     }
/// }
///
/// #[derive(Serialize)]
/// struct Range {
///     lo: u32,
///     hi: u32,
/// }
///
/// impl Validatable for Range {
///     const SELF_VALIDATION: SelfValidation = SelfValidation::Plain;
///
///     fn validate(&self) -> Result<(), BoxError> {
///         if self.lo <= self.hi { Ok(()) } else { Err("lo must not exceed hi".into()) }
///     }
/// }
/// ```
pub trait Validatable: Serialize + Sized + 'static {
    /// Self-validation methods this type implements.
    const SELF_VALIDATION: SelfValidation = SelfValidation::None;

    /// Plain self-validation.
    fn validate(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Context-aware self-validation. Defaults to [`validate`](Self::validate).
    fn validate_with_context(&self, ctx: &Context) -> Result<(), BoxError> {
        let _ = ctx;
        self.validate()
    }

    /// Declarative field rules for the tag strategy.
    fn field_rules() -> Option<FieldRules> {
        None
    }

    /// JSON Schema this value should be validated against.
    fn json_schema(&self) -> Option<SchemaSource> {
        None
    }

    /// Nil classification, checked before any strategy runs.
    fn nil_state(&self) -> NilState {
        NilState::Present
    }

    /// The underlying value as `Any`, handed to custom validator callbacks.
    /// Wrappers return the value they hold.
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: Validatable> Validatable for Option<T> {
    const SELF_VALIDATION: SelfValidation = T::SELF_VALIDATION;

    fn validate(&self) -> Result<(), BoxError> {
        self.as_ref().map_or(Ok(()), T::validate)
    }

    fn validate_with_context(&self, ctx: &Context) -> Result<(), BoxError> {
        self.as_ref()
            .map_or(Ok(()), |value| value.validate_with_context(ctx))
    }

    fn field_rules() -> Option<FieldRules> {
        T::field_rules()
    }

    fn json_schema(&self) -> Option<SchemaSource> {
        self.as_ref().and_then(T::json_schema)
    }

    fn nil_state(&self) -> NilState {
        self.as_ref().map_or(NilState::NilPointer, T::nil_state)
    }

    fn as_any(&self) -> &dyn Any {
        match self {
            Some(value) => value.as_any(),
            None => self,
        }
    }
}

macro_rules! forward_validatable {
    ($($wrapper:ident),+) => {$(
        impl<T: Validatable> Validatable for $wrapper<T> {
            const SELF_VALIDATION: SelfValidation = T::SELF_VALIDATION;

            fn validate(&self) -> Result<(), BoxError> {
                (**self).validate()
            }

            fn validate_with_context(&self, ctx: &Context) -> Result<(), BoxError> {
                (**self).validate_with_context(ctx)
            }

            fn field_rules() -> Option<FieldRules> {
                T::field_rules()
            }

            fn json_schema(&self) -> Option<SchemaSource> {
                (**self).json_schema()
            }

            fn nil_state(&self) -> NilState {
                (**self).nil_state()
            }

            fn as_any(&self) -> &dyn Any {
                (**self).as_any()
            }
        }
    )+};
}

forward_validatable!(Box, Arc);

impl Validatable for serde_json::Value {
    fn nil_state(&self) -> NilState {
        if self.is_null() {
            NilState::Nil
        } else {
            NilState::Present
        }
    }
}

impl Validatable for () {
    fn nil_state(&self) -> NilState {
        NilState::Nil
    }
}

// ============================================================================
// TYPE CACHE
// ============================================================================

/// Concurrent per-type memo table.
///
/// Lookups never block each other. On a miss the value is computed outside
/// any lock and then stored with load-or-store semantics, so concurrent
/// first callers may both compute but all observe the same stored value.
pub(crate) struct TypeCache<V> {
    entries: DashMap<TypeId, V>,
}

impl<V: Clone> TypeCache<V> {
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub(crate) fn get_or_compute(&self, key: TypeId, compute: impl FnOnce() -> V) -> V {
        if let Some(hit) = self.entries.get(&key) {
            return hit.value().clone();
        }
        let computed = compute();
        self.entries.entry(key).or_insert(computed).value().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================
