//! Per-call validation context.
//!
//! A [`Context`] carries request-scoped data into validation: the raw JSON
//! body (so the schema strategy can validate the original bytes instead of
//! re-serializing the decoded value) and arbitrary typed values that a
//! type's context-aware validation method can read.
//!
//! The engine never checks a context for cancellation; validations are
//! short and run to completion.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

/// Request-scoped data passed to validation.
///
/// Cloning is cheap: the raw body is reference-counted and the value map is
/// shared until a clone adds a value of its own.
///
/// # Examples
///
/// ```rust
/// use vigil_validator::Context;
///
/// struct TenantId(u32);
///
/// let ctx = Context::new()
///     .with_raw_json(r#"{"email":"a@b.co"}"#)
///     .with_value(TenantId(7));
///
/// assert_eq!(ctx.raw_json(), Some(&br#"{"email":"a@b.co"}"#[..]));
/// assert_eq!(ctx.value::<TenantId>().map(|t| t.0), Some(7));
/// ```
#[derive(Clone, Default)]
pub struct Context {
    raw_json: Option<Bytes>,
    values: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the raw JSON payload the value was decoded from.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_raw_json(mut self, raw: impl Into<Bytes>) -> Self {
        self.raw_json = Some(raw.into());
        self
    }

    /// Raw JSON payload, if one was attached.
    #[must_use]
    pub fn raw_json(&self) -> Option<&[u8]> {
        self.raw_json.as_deref()
    }

    /// Stores a typed value, replacing any previous value of the same type.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_value<T: Any + Send + Sync>(mut self, value: T) -> Self {
        Arc::make_mut(&mut self.values).insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    /// Looks up a typed value.
    #[must_use]
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("raw_json_len", &self.raw_json.as_ref().map(Bytes::len))
            .field("values", &self.values.len())
            .finish()
    }
}
