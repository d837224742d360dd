//! Effective validation configuration.
//!
//! A [`Validator`](crate::Validator) owns one base [`Config`] fixed at
//! construction. Each call merges its [`Options`] into a fresh copy; calls
//! without options borrow the base. Nothing here is mutated after it has
//! been handed to a validation call.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::capability::{BoxError, SchemaSource};
use crate::context::Context;
use crate::error::ConfigError;
use crate::options::Options;
use crate::presence::PresenceMap;
use crate::tags::MessageOverrides;

/// Default for [`ValidatorSettings::max_fields`].
pub const DEFAULT_MAX_FIELDS: usize = 10_000;

/// Default schema cache capacity.
pub const DEFAULT_MAX_CACHED_SCHEMAS: usize = 1024;

/// Callback that runs before any strategy. Receives the unwrapped value.
pub type CustomValidatorFn = Arc<dyn Fn(&dyn Any) -> Result<(), BoxError> + Send + Sync>;

/// Maps a field's JSON name to the name used in error paths.
pub type FieldNameMapper = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Decides whether the value at a dot path must be redacted.
pub type Redactor = Arc<dyn Fn(&str) -> bool + Send + Sync>;

// ============================================================================
// STRATEGY
// ============================================================================

/// Validation technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Detect from the value's capabilities: interface, then tags, then
    /// JSON Schema, falling back to tags.
    #[default]
    Auto,
    /// Declarative field rules.
    Tags,
    /// JSON Schema.
    JsonSchema,
    /// The type's own validation method.
    Interface,
}

impl Strategy {
    /// Concrete strategies in run-all order.
    pub(crate) const CONCRETE: [Self; 3] = [Self::Interface, Self::Tags, Self::JsonSchema];
}

// ============================================================================
// CONFIG
// ============================================================================

/// Snapshot of every per-call option.
#[derive(Clone)]
pub(crate) struct Config {
    pub(crate) strategy: Strategy,
    pub(crate) run_all: bool,
    pub(crate) require_any: bool,
    pub(crate) partial: bool,
    pub(crate) max_errors: usize,
    pub(crate) max_fields: usize,
    pub(crate) disallow_unknown_fields: bool,
    pub(crate) context: Option<Context>,
    pub(crate) presence: Option<Arc<PresenceMap>>,
    pub(crate) custom_schema: Option<SchemaSource>,
    pub(crate) custom_validator: Option<CustomValidatorFn>,
    pub(crate) field_name_mapper: Option<FieldNameMapper>,
    pub(crate) redactor: Option<Redactor>,
    pub(crate) messages: Arc<MessageOverrides>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: Strategy::Auto,
            run_all: false,
            require_any: false,
            partial: false,
            max_errors: 0,
            max_fields: DEFAULT_MAX_FIELDS,
            disallow_unknown_fields: false,
            context: None,
            presence: None,
            custom_schema: None,
            custom_validator: None,
            field_name_mapper: None,
            redactor: None,
            messages: Arc::new(MessageOverrides::default()),
        }
    }
}

impl Config {
    /// Base config with `options` applied; borrows `self` when there is
    /// nothing to apply.
    pub(crate) fn merged<'a>(&'a self, options: &Options) -> Cow<'a, Self> {
        if options.is_empty() {
            return Cow::Borrowed(self);
        }
        let mut config = self.clone();
        config.apply(options);
        Cow::Owned(config)
    }

    pub(crate) fn apply(&mut self, options: &Options) {
        fn set<T: Clone>(slot: &mut T, value: Option<&T>) {
            if let Some(value) = value {
                slot.clone_from(value);
            }
        }
        fn set_some<T: Clone>(slot: &mut Option<T>, value: Option<&T>) {
            if let Some(value) = value {
                *slot = Some(value.clone());
            }
        }

        set(&mut self.strategy, options.strategy.as_ref());
        set(&mut self.run_all, options.run_all.as_ref());
        set(&mut self.require_any, options.require_any.as_ref());
        set(&mut self.partial, options.partial.as_ref());
        set(&mut self.max_errors, options.max_errors.as_ref());
        set(&mut self.max_fields, options.max_fields.as_ref());
        set(
            &mut self.disallow_unknown_fields,
            options.disallow_unknown_fields.as_ref(),
        );
        set_some(&mut self.context, options.context.as_ref());
        set_some(&mut self.presence, options.presence.as_ref());
        set_some(&mut self.custom_schema, options.custom_schema.as_ref());
        set_some(
            &mut self.custom_validator,
            options.custom_validator.as_ref(),
        );
        set_some(
            &mut self.field_name_mapper,
            options.field_name_mapper.as_ref(),
        );
        set_some(&mut self.redactor, options.redactor.as_ref());

        if !options.messages.is_empty() || !options.message_fns.is_empty() {
            let messages = Arc::make_mut(&mut self.messages);
            for (tag, template) in &options.messages {
                messages.set_static(tag.clone(), template.clone());
            }
            for (tag, message) in &options.message_fns {
                messages.set_dynamic(tag.clone(), Arc::clone(message));
            }
        }
    }

    /// Returns `true` if the redactor matches `path`.
    pub(crate) fn redacts(&self, path: &str) -> bool {
        self.redactor
            .as_ref()
            .is_some_and(|redactor| redactor(path))
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let custom_schema = self.custom_schema.as_ref().map(SchemaSource::id);
        f.debug_struct("Config")
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
            .finish()
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Serializable validator settings, e.g. loaded from a config file.
///
/// Limits are signed so out-of-range input is reported as
/// [`ConfigError::NegativeLimit`] instead of failing deserialization.
///
/// # Examples
///
/// ```rust
/// use vigil_validator::{Strategy, Validator, ValidatorSettings};
///
/// let settings: ValidatorSettings =
///     serde_json::from_str(r#"{"strategy":"json_schema","max_errors":5}"#).unwrap();
/// assert_eq!(settings.strategy, Strategy::JsonSchema);
/// assert_eq!(settings.max_fields, 10_000);
///
/// let validator = Validator::from_settings(&settings).unwrap();
/// # let _ = validator;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorSettings {
    /// Default strategy.
    pub strategy: Strategy,
    /// Run every applicable strategy and merge their errors.
    pub run_all: bool,
    /// With `run_all`, succeed if any applicable strategy passed.
    pub require_any: bool,
    /// Maximum errors per call; `0` means unlimited.
    pub max_errors: i64,
    /// Maximum presence leaves processed in partial mode; `0` means
    /// unlimited.
    pub max_fields: i64,
    /// Schema cache capacity.
    pub max_cached_schemas: i64,
    /// Report presence paths that name undeclared fields.
    pub disallow_unknown_fields: bool,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            strategy: Strategy::Auto,
            run_all: false,
            require_any: false,
            max_errors: 0,
            max_fields: DEFAULT_MAX_FIELDS as i64,
            max_cached_schemas: DEFAULT_MAX_CACHED_SCHEMAS as i64,
            disallow_unknown_fields: false,
        }
    }
}

impl ValidatorSettings {
    /// Default options and schema cache capacity described by these
    /// settings.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NegativeLimit`] if any limit is negative.
    pub fn resolve(&self) -> Result<(Options, usize), ConfigError> {
        let options = Options::new()
            .strategy(self.strategy)
            .run_all(self.run_all)
            .require_any(self.require_any)
            .max_errors(limit("max_errors", self.max_errors)?)
            .max_fields(limit("max_fields", self.max_fields)?)
            .disallow_unknown_fields(self.disallow_unknown_fields);
        let capacity = limit("max_cached_schemas", self.max_cached_schemas)?;
        Ok((options, capacity))
    }
}

fn limit(name: &'static str, value: i64) -> Result<usize, ConfigError> {
    if value < 0 {
        return Err(ConfigError::NegativeLimit { name, value });
    }
    Ok(usize::try_from(value).unwrap_or(usize::MAX))
}
