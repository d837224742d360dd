//! Tag strategy: declarative per-field rules.
//!
//! Rules are evaluated over the value's serialized JSON form. Each field
//! stops at its first failing tag position; `omitempty` skips a field whose
//! value is empty; `dive` applies the remaining tags to every element of an
//! array (or every value of a map).
//!
//! In partial mode only the presence map's leaf paths are visited, along
//! with the field-level tags of every field a leaf passes through. A leaf
//! that cannot be resolved against the declared rules is skipped, or
//! reported as `tag.unknown_field` when unknown fields are disallowed.

mod builtin;
mod engine;
mod messages;
mod rules;

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

pub use builtin::STRONG_PASSWORD_MIN_LEN;
pub use engine::TagFn;
pub use messages::{MessageFn, ValueKind, default_message};
pub use rules::{FieldRule, FieldRules, SUPPRESSED_NAME};

pub(crate) use engine::{TagEngine, TagEngineCell};
pub(crate) use messages::{MessageOverrides, scalar_text};
pub(crate) use rules::RulesCache;

use crate::capability::Validatable;
use crate::config::Config;
use crate::error::{FieldError, ValidationErrors, codes};
use crate::presence::join_path;
use builtin::is_empty;
use rules::{CompiledField, CompiledRules, NestedType, TagAlternatives, TagList};

/// Runs the tag strategy for `value`. Types without field rules pass.
pub(crate) fn validate<T: Validatable>(
    engine: &TagEngine,
    rules: &RulesCache,
    config: &Config,
    leaves: Option<&[String]>,
    value: &T,
    errors: &mut ValidationErrors,
) {
    let Some(root) = rules.of::<T>() else {
        return;
    };
    let json = match serde_json::to_value(value) {
        Ok(json) => json,
        Err(err) => {
            errors.add(FieldError::new(
                codes::MARSHAL_ERROR,
                format!("cannot serialize value: {err}"),
            ));
            return;
        }
    };

    let mut run = TagRun {
        engine,
        rules,
        config,
        errors,
        entered: HashMap::new(),
    };
    match leaves {
        Some(leaves) => {
            for leaf in leaves {
                run.validate_leaf(Arc::clone(&root), &json, leaf);
            }
        }
        None => run.validate_object(&root, &json, ""),
    }
}

/// Returns `true` if the type declares field rules.
pub(crate) fn has_rules<T: Validatable>(rules: &RulesCache) -> bool {
    rules.of::<T>().is_some()
}

// ============================================================================
// TAG RUN
// ============================================================================

struct TagRun<'a> {
    engine: &'a TagEngine,
    rules: &'a RulesCache,
    config: &'a Config,
    errors: &'a mut ValidationErrors,
    /// Outcome of the field-level tags of every field a leaf walked through.
    entered: HashMap<String, bool>,
}

impl TagRun<'_> {
    fn validate_object(&mut self, rules: &CompiledRules, value: &Value, path: &str) {
        let Value::Object(map) = value else {
            return;
        };
        for field in &rules.fields {
            let child = map.get(&field.key).unwrap_or(&Value::Null);
            let child_path = join_path(path, &self.segment(&field.key));
            self.validate_field(field, child, &child_path);
        }
    }

    fn validate_field(&mut self, field: &CompiledField, value: &Value, path: &str) {
        if !self.apply(&field.tags, value, path) {
            return;
        }
        match &field.elements {
            Some(elements) => match value {
                Value::Array(items) => {
                    for (index, item) in items.iter().enumerate() {
                        let item_path = join_path(path, &index.to_string());
                        self.validate_element(Some(elements), field.nested, item, &item_path);
                    }
                }
                Value::Object(map) => {
                    for (key, item) in map {
                        let item_path = join_path(path, key);
                        self.validate_element(Some(elements), field.nested, item, &item_path);
                    }
                }
                _ => {}
            },
            None => {
                if let Some(nested) = field.nested {
                    self.validate_nested(nested, value, path);
                }
            }
        }
    }

    fn validate_element(
        &mut self,
        tags: Option<&TagList>,
        nested: Option<NestedType>,
        value: &Value,
        path: &str,
    ) {
        if let Some(tags) = tags
            && !tags.is_empty()
            && !self.apply(tags, value, path)
        {
            return;
        }
        if let Some(nested) = nested {
            self.validate_nested(nested, value, path);
        }
    }

    /// Applies a nested type's rules to an object, or to each element of an
    /// array of such objects.
    fn validate_nested(&mut self, nested: NestedType, value: &Value, path: &str) {
        let Some(rules) = self.rules.get(nested) else {
            return;
        };
        match value {
            Value::Object(_) => self.validate_object(&rules, value, path),
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    self.validate_object(&rules, item, &join_path(path, &index.to_string()));
                }
            }
            _ => {}
        }
    }

    /// Walks one presence leaf down the declared rules and validates what it
    /// lands on.
    fn validate_leaf(&mut self, root: Arc<CompiledRules>, value: &Value, leaf: &str) {
        let segments: Vec<&str> = leaf.split('.').collect();
        let mut rules = root;
        let mut value = value;
        let mut path = String::new();
        let mut at = 0;

        while at < segments.len() {
            let segment = segments[at];
            let Some(field) = rules.field(segment) else {
                if self.config.disallow_unknown_fields {
                    let unknown = join_path(&path, &self.segment(segment));
                    self.errors.add(
                        FieldError::new(
                            codes::UNKNOWN_FIELD,
                            format!("unknown field for {}", rules.type_name),
                        )
                        .with_path(unknown),
                    );
                }
                return;
            };
            let Some(child) = value.get(segment) else {
                return;
            };
            let child_path = join_path(&path, &self.segment(segment));

            if at + 1 == segments.len() {
                self.validate_field(field, child, &child_path);
                return;
            }
            if !self.enter(field, child, &child_path) {
                return;
            }

            let nested = field.nested;
            if field.elements.is_some() || child.is_array() {
                let key = segments[at + 1];
                let element = match child {
                    Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
                    Value::Object(map) if field.elements.is_some() => map.get(key),
                    _ => None,
                };
                let Some(element) = element else {
                    return;
                };
                let element_path = join_path(&child_path, key);
                if at + 2 == segments.len() {
                    self.validate_element(field.elements.as_ref(), nested, element, &element_path);
                    return;
                }
                let Some(next) = nested.and_then(|n| self.rules.get(n)) else {
                    return;
                };
                rules = next;
                value = element;
                path = element_path;
                at += 2;
            } else {
                let Some(next) = nested.and_then(|n| self.rules.get(n)) else {
                    return;
                };
                rules = next;
                value = child;
                path = child_path;
                at += 1;
            }
        }
    }

    /// Applies the field-level tags of a field that a leaf passes through,
    /// once per path. Returns `false` when nothing below it should be validated.
    fn enter(&mut self, field: &CompiledField, value: &Value, path: &str) -> bool {
        if let Some(&passed) = self.entered.get(path) {
            return passed;
        }
        let passed = self.apply(&field.tags, value, path);
        self.entered.insert(path.to_owned(), passed);
        passed
    }

    /// Applies a tag list. Returns `false` when the field should not be
    /// validated further: it was omitted as empty or a position failed.
    fn apply(&mut self, tags: &TagList, value: &Value, path: &str) -> bool {
        if tags.omit_empty && is_empty(value) {
            return false;
        }
        for alternatives in &tags.checks {
            if let Some(unknown) = alternatives.iter().find(|c| !self.engine.contains(&c.name)) {
                self.errors.add(
                    FieldError::new(
                        codes::UNKNOWN_TAG,
                        format!("unknown validation tag '{}'", unknown.name),
                    )
                    .with_path(path)
                    .with_meta("tag", unknown.name.clone()),
                );
                return false;
            }
            let passed = alternatives.iter().any(|call| {
                self.engine
                    .get(&call.name)
                    .is_some_and(|check| check(value, call.param.as_deref()))
            });
            if !passed {
                let error = self.tag_error(alternatives, value, path);
                self.errors.add(error);
                return false;
            }
        }
        true
    }

    fn tag_error(&self, alternatives: &TagAlternatives, value: &Value, path: &str) -> FieldError {
        let tag = alternatives
            .iter()
            .map(|call| call.name.as_str())
            .collect::<Vec<_>>()
            .join("|");
        let param = match alternatives.as_slice() {
            [single] => single.param.as_deref(),
            _ => None,
        };
        let message = self.config.messages.render(&tag, param, value);
        let raw = scalar_text(value);

        let mut error = FieldError::new(format!("tag.{tag}"), message)
            .with_path(path)
            .with_meta("tag", tag);
        if let Some(param) = param {
            error = error.with_meta("param", param);
        }
        if raw.is_some() {
            error = error.with_meta("value", value.clone());
        }
        if self.config.redacts(path) {
            error.redact(&[raw.as_deref().unwrap_or_default()]);
        }
        error
    }

    fn segment<'k>(&self, key: &'k str) -> Cow<'k, str> {
        match &self.config.field_name_mapper {
            Some(mapper) => Cow::Owned(mapper(key)),
            None => Cow::Borrowed(key),
        }
    }
}
