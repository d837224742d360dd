//! The validation orchestrator.
//!
//! A [`Validator`] owns the base configuration, the lazily built tag engine,
//! the per-type rule cache and the compiled-schema cache. It is `Send +
//! Sync`; share one instance (behind an `Arc` or a `static`) across threads.
//!
//! A call runs in this order:
//!
//! 1. merge the call's [`Options`] into the base configuration,
//! 2. reject nil values,
//! 3. run the custom validator callback, stopping on error,
//! 4. in partial mode, enforce the `max_fields` limit on presence leaves,
//! 5. run every applicable strategy (`run_all`) or the selected one,
//! 6. sort the errors and return.

use std::any::type_name;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, LazyLock};

use serde_json::Value;

use crate::capability::{NilState, Validatable};
use crate::config::{Config, DEFAULT_MAX_CACHED_SCHEMAS, Strategy, ValidatorSettings};
use crate::context::Context;
use crate::error::{ConfigError, FieldError, ValidationErrors, codes};
use crate::interface;
use crate::options::Options;
use crate::presence::PresenceMap;
use crate::schema::{self, SchemaCache};
use crate::tags::{self, RulesCache, TagEngineCell, TagFn};

static DEFAULT_VALIDATOR: LazyLock<Validator> = LazyLock::new(Validator::default);

/// Validates `value` with a process-wide default [`Validator`].
///
/// # Errors
///
/// Returns the validation failures, sorted by path and code.
///
/// # Examples
///
/// ```rust
/// use serde::Serialize;
/// use vigil_validator::{FieldRules, Validatable};
///
/// #[derive(Serialize)]
/// struct Login {
///     email: String,
/// }
///
/// impl Validatable for Login {
///     fn field_rules() -> Option<FieldRules> {
///         Some(FieldRules::new().rule("email", "required,email"))
///     }
/// }
///
/// let errors = vigil_validator::validate(&Login { email: "nope".into() }).unwrap_err();
/// assert!(errors.has_code("tag.email"));
/// ```
pub fn validate<T: Validatable>(value: &T) -> Result<(), ValidationErrors> {
    DEFAULT_VALIDATOR.validate(value)
}

/// The process-wide default [`Validator`] used by [`validate`].
#[must_use]
pub fn default_validator() -> &'static Validator {
    &DEFAULT_VALIDATOR
}

// ============================================================================
// BUILDER
// ============================================================================

/// Builder for [`Validator`].
///
/// # Examples
///
/// ```rust
/// use vigil_validator::{Options, Validator};
///
/// let validator = Validator::builder()
///     .defaults(Options::new().max_errors(20))
///     .max_cached_schemas(64)
///     .tag("is_even", |value, _| value.as_i64().is_some_and(|n| n % 2 == 0))
///     .build()
///     .unwrap();
/// # let _ = validator;
/// ```
#[derive(Default)]
pub struct ValidatorBuilder {
    defaults: Options,
    max_cached_schemas: Option<usize>,
    tags: Vec<(String, TagFn)>,
}

impl ValidatorBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options applied to every call made through the validator. Per-call
    /// options override them.
    #[must_use = "builder methods must be chained or built"]
    pub fn defaults(mut self, options: Options) -> Self {
        self.defaults = options;
        self
    }

    /// Schema cache capacity. `0` disables caching.
    #[must_use = "builder methods must be chained or built"]
    pub fn max_cached_schemas(mut self, capacity: usize) -> Self {
        self.max_cached_schemas = Some(capacity);
        self
    }

    /// Registers a custom tag.
    #[must_use = "builder methods must be chained or built"]
    pub fn tag<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value, Option<&str>) -> bool + Send + Sync + 'static,
    {
        self.tags.push((name.into(), Arc::new(check)));
        self
    }

    /// Builds the validator.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidTagName`] for an unusable custom tag name.
    /// - [`ConfigError::EmptySchemaId`] if the defaults carry a custom
    ///   schema without an id.
    pub fn build(self) -> Result<Validator, ConfigError> {
        let engine = TagEngineCell::new(Vec::new());
        for (name, check) in self.tags {
            engine.register(&name, check)?;
        }
        if self
            .defaults
            .custom_schema
            .as_ref()
            .is_some_and(|schema| schema.id().is_empty())
        {
            return Err(ConfigError::EmptySchemaId);
        }

        let mut config = Config::default();
        config.apply(&self.defaults);
        let capacity = self
            .max_cached_schemas
            .unwrap_or(DEFAULT_MAX_CACHED_SCHEMAS);

        tracing::debug!(
            strategy = ?config.strategy,
            max_errors = config.max_errors,
            max_fields = config.max_fields,
            schema_cache_capacity = capacity,
            "validator built"
        );

        Ok(Validator {
            config,
            tags: engine,
            rules: RulesCache::new(),
            schemas: SchemaCache::new(capacity),
        })
    }

    /// Builds the validator, panicking on invalid configuration.
    ///
    /// # Panics
    ///
    /// Panics if [`build`](Self::build) fails.
    #[must_use]
    pub fn build_or_panic(self) -> Validator {
        match self.build() {
            Ok(validator) => validator,
            Err(err) => panic!("invalid validator configuration: {err}"),
        }
    }
}

impl fmt::Debug for ValidatorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<_> = self.tags.iter().map(|(name, _)| name).collect();
        f.debug_struct("ValidatorBuilder")
            .field("defaults", &self.defaults)
            .field("max_cached_schemas", &self.max_cached_schemas)
            .field("tags", &tags)
            .finish()
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

/// Multi-strategy validator.
///
/// # Examples
///
/// ```rust
/// use serde::Serialize;
/// use vigil_validator::{FieldRule, FieldRules, Validatable, Validator};
///
/// #[derive(Serialize)]
/// struct Signup {
///     #[serde(rename = "email")]
///     email_address: String,
///     age: u32,
/// }
///
/// impl Validatable for Signup {
///     fn field_rules() -> Option<FieldRules> {
///         Some(
///             FieldRules::new()
///                 .field(FieldRule::new("email_address").json("email").tags("required,email"))
///                 .rule("age", "min=18"),
///         )
///     }
/// }
///
/// let validator = Validator::default();
/// let errors = validator
///     .validate(&Signup { email_address: "invalid".into(), age: 15 })
///     .unwrap_err();
///
/// assert_eq!(errors.len(), 2);
/// assert!(errors.has("email"));
/// assert!(errors.has("age"));
/// ```
pub struct Validator {
    config: Config,
    tags: TagEngineCell,
    rules: RulesCache,
    schemas: SchemaCache,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            config: Config::default(),
            tags: TagEngineCell::new(Vec::new()),
            rules: RulesCache::new(),
            schemas: SchemaCache::new(DEFAULT_MAX_CACHED_SCHEMAS),
        }
    }
}

/// Per-call state shared by the strategies.
struct Call<'a> {
    config: Cow<'a, Config>,
    context: Option<Context>,
    leaves: Option<Vec<String>>,
}

impl Validator {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder::new()
    }

    /// Builds a validator from a configured builder.
    ///
    /// # Errors
    ///
    /// See [`ValidatorBuilder::build`].
    pub fn new(builder: ValidatorBuilder) -> Result<Self, ConfigError> {
        builder.build()
    }

    /// Builds a validator from serialized settings.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NegativeLimit`] if any limit is negative.
    pub fn from_settings(settings: &ValidatorSettings) -> Result<Self, ConfigError> {
        let (defaults, capacity) = settings.resolve()?;
        Self::builder()
            .defaults(defaults)
            .max_cached_schemas(capacity)
            .build()
    }

    /// Registers a custom tag. Only possible before the first tag
    /// validation; afterwards the registry is frozen.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidTagName`] for an unusable name.
    /// - [`ConfigError::TagRegistryFrozen`] once a tag validation has run.
    pub fn register_tag<F>(&self, name: &str, check: F) -> Result<(), ConfigError>
    where
        F: Fn(&Value, Option<&str>) -> bool + Send + Sync + 'static,
    {
        self.tags.register(name, Arc::new(check))
    }

    /// Validates with the validator's default options.
    ///
    /// # Errors
    ///
    /// Returns the validation failures, sorted by path and code.
    pub fn validate<T: Validatable>(&self, value: &T) -> Result<(), ValidationErrors> {
        self.run(None, value, &Options::default())
    }

    /// Validates with per-call options.
    ///
    /// # Errors
    ///
    /// Returns the validation failures, sorted by path and code.
    pub fn validate_with<T: Validatable>(
        &self,
        value: &T,
        options: &Options,
    ) -> Result<(), ValidationErrors> {
        self.run(None, value, options)
    }

    /// Validates with a context and per-call options.
    ///
    /// The context reaches context-aware self-validation and supplies the raw
    /// JSON the schema strategy validates.
    ///
    /// # Errors
    ///
    /// Returns the validation failures, sorted by path and code.
    pub fn validate_in<T: Validatable>(
        &self,
        ctx: &Context,
        value: &T,
        options: &Options,
    ) -> Result<(), ValidationErrors> {
        self.run(Some(ctx), value, options)
    }

    /// Validates only the fields recorded in `presence`, e.g. the fields of a
    /// PATCH body.
    ///
    /// # Errors
    ///
    /// Returns the validation failures, sorted by path and code.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde::{Deserialize, Serialize};
    /// use vigil_validator::{Context, FieldRules, Options, Validatable, Validator, compute_presence};
    ///
    /// #[derive(Default, Serialize, Deserialize)]
    /// #[serde(default)]
    /// struct User {
    ///     name: String,
    ///     email: String,
    /// }
    ///
    /// impl Validatable for User {
    ///     fn field_rules() -> Option<FieldRules> {
    ///         Some(FieldRules::new().rule("name", "required").rule("email", "required,email"))
    ///     }
    /// }
    ///
    /// let body = br#"{"email":"new@example.com"}"#;
    /// let user: User = serde_json::from_slice(body).unwrap();
    /// let presence = compute_presence(body).unwrap();
    ///
    /// let validator = Validator::default();
    /// assert!(validator.validate(&user).is_err());
    /// assert!(validator
    ///     .validate_partial(&Context::new(), &user, presence, &Options::new())
    ///     .is_ok());
    /// ```
    pub fn validate_partial<T: Validatable>(
        &self,
        ctx: &Context,
        value: &T,
        presence: PresenceMap,
        options: &Options,
    ) -> Result<(), ValidationErrors> {
        let options = options.clone().partial(true).presence(presence);
        self.run(Some(ctx), value, &options)
    }

    /// Number of compiled schemas currently cached.
    #[must_use]
    pub fn cached_schema_count(&self) -> usize {
        self.schemas.len()
    }

    /// Returns `true` if a compiled schema is cached under `id`.
    #[must_use]
    pub fn is_schema_cached(&self, id: &str) -> bool {
        self.schemas.contains(id)
    }

    /// Drops every cached schema.
    pub fn clear_schema_cache(&self) {
        self.schemas.clear();
        tracing::debug!("schema cache cleared");
    }

    fn run<T: Validatable>(
        &self,
        ctx: Option<&Context>,
        value: &T,
        options: &Options,
    ) -> Result<(), ValidationErrors> {
        let config = self.config.merged(options);

        match value.nil_state() {
            NilState::Present => {}
            NilState::Nil => {
                return Err(FieldError::new(codes::NIL, "value is nil").into());
            }
            NilState::NilPointer => {
                return Err(FieldError::new(codes::NIL_POINTER, "value is a nil pointer").into());
            }
        }

        if let Some(custom) = &config.custom_validator
            && let Err(err) = custom(value.as_any())
        {
            let mut errors = ValidationErrors::with_limit(config.max_errors);
            errors.add_error(err);
            return errors.into_result();
        }

        let leaves = if config.partial {
            config.presence.as_deref().map(PresenceMap::leaf_paths)
        } else {
            None
        };
        if let Some(leaves) = &leaves
            && config.max_fields > 0
            && leaves.len() > config.max_fields
        {
            let count = leaves.len();
            let max = config.max_fields;
            let message = format!("payload has {count} fields, at most {max} are allowed");
            let error = FieldError::new(codes::MAX_FIELDS_EXCEEDED, message)
                .with_meta("max_fields", max);
            return Err(error.into());
        }

        let context = config.context.clone().or_else(|| ctx.cloned());
        let call = Call {
            config,
            context,
            leaves,
        };

        if call.config.run_all {
            return self.run_all(&call, value);
        }

        let strategy = match call.config.strategy {
            Strategy::Auto => self.detect(&call, value),
            explicit => explicit,
        };
        tracing::debug!(strategy = ?strategy, type_name = type_name::<T>(), "validating");

        let mut errors = ValidationErrors::with_limit(call.config.max_errors);
        self.execute(strategy, &call, value, &mut errors);
        errors.into_result()
    }

    fn run_all<T: Validatable>(&self, call: &Call<'_>, value: &T) -> Result<(), ValidationErrors> {
        let limit = call.config.max_errors;
        let mut merged = ValidationErrors::with_limit(limit);
        let mut applied = 0_usize;
        let mut any_clean = false;

        for strategy in Strategy::CONCRETE {
            if !self.applies(strategy, call, value) {
                continue;
            }
            applied += 1;
            let mut errors = ValidationErrors::with_limit(limit);
            self.execute(strategy, call, value, &mut errors);
            any_clean |= errors.is_empty() && !errors.is_truncated();
            merged.extend(errors);
        }

        tracing::debug!(
            applied,
            any_clean,
            require_any = call.config.require_any,
            type_name = type_name::<T>(),
            "ran all applicable strategies"
        );
        if call.config.require_any && applied > 0 && any_clean {
            return Ok(());
        }
        merged.into_result()
    }

    /// Interface, then tags, then JSON Schema; tags when nothing applies.
    fn detect<T: Validatable>(&self, call: &Call<'_>, value: &T) -> Strategy {
        [Strategy::Interface, Strategy::Tags, Strategy::JsonSchema]
            .into_iter()
            .find(|&strategy| self.applies(strategy, call, value))
            .unwrap_or(Strategy::Tags)
    }

    fn applies<T: Validatable>(&self, strategy: Strategy, call: &Call<'_>, value: &T) -> bool {
        match strategy {
            Strategy::Interface => interface::applies::<T>(),
            Strategy::Tags => tags::has_rules::<T>(&self.rules),
            Strategy::JsonSchema => schema::source(&call.config, value).is_some(),
            Strategy::Auto => false,
        }
    }

    fn execute<T: Validatable>(
        &self,
        strategy: Strategy,
        call: &Call<'_>,
        value: &T,
        errors: &mut ValidationErrors,
    ) {
        match strategy {
            Strategy::Interface => interface::validate(call.context.as_ref(), value, errors),
            Strategy::Tags => tags::validate(
                self.tags.get(),
                &self.rules,
                &call.config,
                call.leaves.as_deref(),
                value,
                errors,
            ),
            Strategy::JsonSchema => schema::validate(
                &self.schemas,
                &call.config,
                call.context.as_ref(),
                value,
                errors,
            ),
            Strategy::Auto => {}
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("config", &self.config)
            .field("tags", &self.tags)
            .field("cached_rule_types", &self.rules.len())
            .field("schemas", &self.schemas)
            .finish()
    }
}
