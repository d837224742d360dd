//! Tag registry and its one-way build lifecycle.
//!
//! Custom tags can be registered until the first tag validation runs. That
//! call builds the engine from the built-ins plus everything registered so
//! far and freezes the registry:
//!
//! ```text
//! Unbuilt { pending } ──first use──▶ Building ──▶ Frozen
//! ```
//!
//! Registration in `Building` or `Frozen` returns
//! [`ConfigError::TagRegistryFrozen`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde_json::Value;

use super::builtin::BUILTINS;
use crate::error::ConfigError;

/// A custom tag check: receives the field's JSON value and the tag
/// parameter, returns whether the value passes.
pub type TagFn = Arc<dyn Fn(&Value, Option<&str>) -> bool + Send + Sync>;

/// Names handled by the tag parser itself or with fixed meaning.
const RESERVED: &[&str] = &["required", "omitempty", "dive"];

/// Characters that would be split apart by the tag parser.
const SEPARATORS: &[char] = &[',', '|', '='];

// ============================================================================
// ENGINE
// ============================================================================

/// Immutable tag registry used during validation.
pub(crate) struct TagEngine {
    checks: HashMap<String, TagFn>,
}

impl TagEngine {
    fn build(custom: Vec<(String, TagFn)>) -> Self {
        let mut checks: HashMap<String, TagFn> = BUILTINS
            .iter()
            .map(|&(name, check)| (name.to_owned(), Arc::new(check) as TagFn))
            .collect();
        checks.extend(custom);
        Self { checks }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&TagFn> {
        self.checks.get(name)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.checks.contains_key(name)
    }

    pub(crate) fn len(&self) -> usize {
        self.checks.len()
    }
}

impl fmt::Debug for TagEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagEngine")
            .field("tags", &self.checks.len())
            .finish()
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

enum BuildState {
    Unbuilt { pending: Vec<(String, TagFn)> },
    Building,
    Frozen,
}

/// Lazily built [`TagEngine`] with a frozen-after-build registry.
pub(crate) struct TagEngineCell {
    engine: OnceLock<TagEngine>,
    state: Mutex<BuildState>,
}

impl TagEngineCell {
    pub(crate) fn new(pending: Vec<(String, TagFn)>) -> Self {
        Self {
            engine: OnceLock::new(),
            state: Mutex::new(BuildState::Unbuilt { pending }),
        }
    }

    /// Registers a custom tag, replacing an earlier registration (or
    /// built-in) of the same name.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidTagName`] for empty, reserved or unparsable
    /// names; [`ConfigError::TagRegistryFrozen`] once the engine is built.
    pub(crate) fn register(&self, name: &str, check: TagFn) -> Result<(), ConfigError> {
        validate_tag_name(name)?;
        match &mut *self.state.lock() {
            BuildState::Unbuilt { pending } => {
                pending.retain(|(existing, _)| existing != name);
                pending.push((name.to_owned(), check));
                Ok(())
            }
            BuildState::Building | BuildState::Frozen => Err(ConfigError::TagRegistryFrozen {
                tag: name.to_owned(),
            }),
        }
    }

    /// The engine, building and freezing it on first call.
    pub(crate) fn get(&self) -> &TagEngine {
        if let Some(engine) = self.engine.get() {
            return engine;
        }

        let mut state = self.state.lock();
        if let Some(engine) = self.engine.get() {
            return engine;
        }
        let pending = match std::mem::replace(&mut *state, BuildState::Building) {
            BuildState::Unbuilt { pending } => pending,
            BuildState::Building | BuildState::Frozen => Vec::new(),
        };
        let custom = pending.len();
        let engine = self.engine.get_or_init(|| TagEngine::build(pending));
        *state = BuildState::Frozen;
        tracing::debug!(
            custom_tags = custom,
            total_tags = engine.len(),
            "tag engine built, registry frozen"
        );
        engine
    }

    pub(crate) fn is_frozen(&self) -> bool {
        matches!(*self.state.lock(), BuildState::Frozen)
    }
}

impl fmt::Debug for TagEngineCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagEngineCell")
            .field("frozen", &self.is_frozen())
            .finish_non_exhaustive()
    }
}

pub(crate) fn validate_tag_name(name: &str) -> Result<(), ConfigError> {
    let reason = if name.trim().is_empty() {
        "name is empty"
    } else if name.contains(SEPARATORS) {
        "name contains a tag separator (`,`, `|` or `=`)"
    } else if RESERVED.contains(&name) {
        "name is reserved"
    } else {
        return Ok(());
    };
    Err(ConfigError::InvalidTagName {
        tag: name.to_owned(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn is_even() -> TagFn {
        Arc::new(|value: &Value, _: Option<&str>| value.as_i64().is_some_and(|n| n % 2 == 0))
    }

    #[test]
    fn registration_is_frozen_after_first_build() {
        let cell = TagEngineCell::new(Vec::new());
        cell.register("is_even", is_even()).unwrap();
        assert!(!cell.is_frozen());

        let engine = cell.get();
        assert!(cell.is_frozen());
        let check = engine.get("is_even").unwrap();
        assert!(check(&json!(4), None));
        assert!(!check(&json!(3), None));

        let err = cell.register("is_odd", is_even()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::TagRegistryFrozen {
                tag: "is_odd".to_owned()
            }
        );
    }

    #[test]
    fn builtins_are_present() {
        let cell = TagEngineCell::new(Vec::new());
        for tag in ["required", "email", "strong_password", "ipv6"] {
            assert!(cell.get().contains(tag), "missing {tag}");
        }
    }

    #[test]
    fn rejects_bad_names() {
        for name in ["", "  ", "a,b", "a|b", "a=b", "dive", "omitempty", "required"] {
            let result = validate_tag_name(name);
            assert!(
                matches!(result, Err(ConfigError::InvalidTagName { .. })),
                "accepted {name:?}"
            );
        }
        assert!(validate_tag_name("is_even").is_ok());
    }

    #[test]
    fn concurrent_first_use_builds_once() {
        let cell = TagEngineCell::new(vec![("is_even".to_owned(), is_even())]);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| assert!(cell.get().contains("is_even")));
            }
        });
        assert!(cell.is_frozen());
    }
}
