//! Per-call validation options.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::capability::{BoxError, SchemaSource};
use crate::config::{CustomValidatorFn, FieldNameMapper, Redactor, Strategy};
use crate::context::Context;
use crate::presence::PresenceMap;
use crate::tags::{MessageFn, ValueKind};

/// Options for one validation call, or validator-wide defaults when passed
/// to [`ValidatorBuilder::defaults`](crate::ValidatorBuilder::defaults).
///
/// Unset options keep the validator's value; set ones replace it for the
/// duration of the call only.
///
/// # Examples
///
/// ```rust
/// use vigil_validator::{Options, Strategy};
///
/// let options = Options::new()
///     .strategy(Strategy::Tags)
///     .max_errors(10)
///     .redactor(|path| path.ends_with("password"))
///     .message("required", "must not be blank");
///
/// assert!(!options.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct Options {
    pub(crate) strategy: Option<Strategy>,
    pub(crate) run_all: Option<bool>,
    pub(crate) require_any: Option<bool>,
    pub(crate) partial: Option<bool>,
    pub(crate) max_errors: Option<usize>,
    pub(crate) max_fields: Option<usize>,
    pub(crate) disallow_unknown_fields: Option<bool>,
    pub(crate) context: Option<Context>,
    pub(crate) presence: Option<Arc<PresenceMap>>,
    pub(crate) custom_schema: Option<SchemaSource>,
    pub(crate) custom_validator: Option<CustomValidatorFn>,
    pub(crate) field_name_mapper: Option<FieldNameMapper>,
    pub(crate) redactor: Option<Redactor>,
    pub(crate) messages: Vec<(String, String)>,
    pub(crate) message_fns: Vec<(String, MessageFn)>,
}

impl Options {
    /// Creates an empty option set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no option is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategy.is_none()
            && self.run_all.is_none()
            && self.require_any.is_none()
            && self.partial.is_none()
            && self.max_errors.is_none()
            && self.max_fields.is_none()
            && self.disallow_unknown_fields.is_none()
            && self.context.is_none()
            && self.presence.is_none()
            && self.custom_schema.is_none()
            && self.custom_validator.is_none()
            && self.field_name_mapper.is_none()
            && self.redactor.is_none()
            && self.messages.is_empty()
            && self.message_fns.is_empty()
    }

    /// Forces a strategy instead of auto-detection.
    #[must_use = "builder methods must be chained or built"]
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Runs every applicable strategy and merges their errors.
    #[must_use = "builder methods must be chained or built"]
    pub fn run_all(mut self, enabled: bool) -> Self {
        self.run_all = Some(enabled);
        self
    }

    /// With [`run_all`](Self::run_all): succeed if at least one applicable
    /// strategy reported no errors.
    #[must_use = "builder methods must be chained or built"]
    pub fn require_any(mut self, enabled: bool) -> Self {
        self.require_any = Some(enabled);
        self
    }

    /// Validates only the paths in the [`presence`](Self::presence) map.
    /// Without a presence map the call validates everything.
    #[must_use = "builder methods must be chained or built"]
    pub fn partial(mut self, enabled: bool) -> Self {
        self.partial = Some(enabled);
        self
    }

    /// Caps the number of reported errors; `0` means unlimited.
    #[must_use = "builder methods must be chained or built"]
    pub fn max_errors(mut self, limit: usize) -> Self {
        self.max_errors = Some(limit);
        self
    }

    /// Caps the number of presence leaves processed in partial mode; `0`
    /// means unlimited.
    #[must_use = "builder methods must be chained or built"]
    pub fn max_fields(mut self, limit: usize) -> Self {
        self.max_fields = Some(limit);
        self
    }

    /// Reports presence paths naming fields the type does not declare.
    #[must_use = "builder methods must be chained or built"]
    pub fn disallow_unknown_fields(mut self, enabled: bool) -> Self {
        self.disallow_unknown_fields = Some(enabled);
        self
    }

    /// Replaces the call's context.
    #[must_use = "builder methods must be chained or built"]
    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// Presence map for partial validation.
    #[must_use = "builder methods must be chained or built"]
    pub fn presence(mut self, presence: impl Into<Arc<PresenceMap>>) -> Self {
        self.presence = Some(presence.into());
        self
    }

    /// Validates against this JSON Schema instead of the value's own. The
    /// compiled schema is cached under `id`.
    #[must_use = "builder methods must be chained or built"]
    pub fn custom_schema(
        mut self,
        id: impl Into<Cow<'static, str>>,
        schema: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.custom_schema = Some(SchemaSource::new(id, schema));
        self
    }

    /// Runs `validator` before any strategy. An error short-circuits the
    /// call.
    #[must_use = "builder methods must be chained or built"]
    pub fn custom_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&dyn Any) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.custom_validator = Some(Arc::new(validator));
        self
    }

    /// Maps each field name segment of tag error paths.
    #[must_use = "builder methods must be chained or built"]
    pub fn field_name_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.field_name_mapper = Some(Arc::new(mapper));
        self
    }

    /// Redacts the offending value of every tag or schema error whose path
    /// matches.
    #[must_use = "builder methods must be chained or built"]
    pub fn redactor<F>(mut self, redactor: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.redactor = Some(Arc::new(redactor));
        self
    }

    /// Static message for a tag. `{param}` and `{value}` are substituted.
    #[must_use = "builder methods must be chained or built"]
    pub fn message(mut self, tag: impl Into<String>, template: impl Into<String>) -> Self {
        self.messages.push((tag.into(), template.into()));
        self
    }

    /// Message function for a tag, used when no static message is set.
    #[must_use = "builder methods must be chained or built"]
    pub fn message_fn<F>(mut self, tag: impl Into<String>, message: F) -> Self
    where
        F: Fn(Option<&str>, ValueKind) -> String + Send + Sync + 'static,
    {
        self.message_fns.push((tag.into(), Arc::new(message)));
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let custom_schema = self.custom_schema.as_ref().map(SchemaSource::id);
        let message_fns: Vec<_> = self.message_fns.iter().map(|(tag, _)| tag).collect();
        f.debug_struct("Options")
            .field("strategy", &self.strategy)
            .field("run_all", &self.run_all)
            .field("require_any", &self.require_any)
            .field("partial", &self.partial)
            .field("max_errors", &self.max_errors)
            .field("max_fields", &self.max_fields)
            .field("disallow_unknown_fields", &self.disallow_unknown_fields)
            .field("context", &self.context)
            .field("presence", &self.presence.as_ref().map(|p| p.len()))
            .field("custom_schema", &custom_schema)
            .field("custom_validator", &self.custom_validator.is_some())
            .field("field_name_mapper", &self.field_name_mapper.is_some())
            .field("redactor", &self.redactor.is_some())
            .field("messages", &self.messages)
            .field("message_fns", &message_fns)
            .finish()
    }
}
