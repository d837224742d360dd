//! Declarative field rules and their compiled, cached form.
//!
//! Types describe their fields with [`FieldRules`]; the engine parses the
//! tag strings once per type into [`CompiledRules`] and keeps them in a
//! per-type cache for the lifetime of the validator.

use std::any::{TypeId, type_name};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::capability::{TypeCache, Validatable};

/// JSON name that suppresses a field's JSON name; the Rust name is used
/// for lookup and error paths instead.
pub const SUPPRESSED_NAME: &str = "-";

// ============================================================================
// FIELD RULES
// ============================================================================

/// Field constraints declared by a type.
///
/// # Examples
///
/// ```rust
/// use vigil_validator::{FieldRule, FieldRules};
///
/// let rules = FieldRules::new()
///     .rule("email", "required,email")
///     .field(FieldRule::new("display_name").json("displayName").tags("omitempty,max=40"));
///
/// assert_eq!(rules.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    fields: Vec<FieldRule>,
}

impl FieldRules {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field rule.
    #[must_use = "builder methods must be chained or built"]
    pub fn field(mut self, rule: FieldRule) -> Self {
        self.fields.push(rule);
        self
    }

    /// Shorthand for a field whose Rust and JSON names agree.
    #[must_use = "builder methods must be chained or built"]
    pub fn rule(
        self,
        name: impl Into<Cow<'static, str>>,
        tags: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.field(FieldRule::new(name).tags(tags))
    }

    /// Declared fields, in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    /// Number of declared fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no field is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Constraints on one field.
///
/// The field is looked up in the serialized value under its JSON name, so
/// the JSON name must match the key serde writes for the field. Without a
/// JSON name (or with `"-"`) the Rust name is used.
#[derive(Debug, Clone)]
pub struct FieldRule {
    name: Cow<'static, str>,
    json: Option<Cow<'static, str>>,
    tags: Cow<'static, str>,
    nested: Option<NestedType>,
}

impl FieldRule {
    /// Creates a rule for the field with the given Rust name.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            json: None,
            tags: Cow::Borrowed(""),
            nested: None,
        }
    }

    /// Sets the JSON name.
    #[must_use = "builder methods must be chained or built"]
    pub fn json(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.json = Some(name.into());
        self
    }

    /// Sets the tag string, e.g. `"required,min=3"`.
    #[must_use = "builder methods must be chained or built"]
    pub fn tags(mut self, tags: impl Into<Cow<'static, str>>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Declares that the field holds a `T` (or a collection of `T`) whose
    /// own field rules apply recursively.
    #[must_use = "builder methods must be chained or built"]
    pub fn nested<T: Validatable>(mut self) -> Self {
        self.nested = Some(NestedType::of::<T>());
        self
    }

    /// Rust field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key used for lookup and error paths.
    #[must_use]
    pub fn key(&self) -> &str {
        match self.json.as_deref() {
            Some(json) if !json.is_empty() && json != SUPPRESSED_NAME => json,
            _ => &self.name,
        }
    }
}

/// Type-erased handle to a type's field rules.
#[derive(Clone, Copy)]
pub(crate) struct NestedType {
    id: TypeId,
    name: &'static str,
    rules: fn() -> Option<FieldRules>,
}

impl NestedType {
    pub(crate) fn of<T: Validatable>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            rules: T::field_rules,
        }
    }
}

impl fmt::Debug for NestedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ============================================================================
// TAG PARSING
// ============================================================================

/// Tag with its optional `=param`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TagCall {
    pub(crate) name: String,
    pub(crate) param: Option<String>,
}

/// Alternatives separated by `|`; the position passes if any one passes.
pub(crate) type TagAlternatives = SmallVec<[TagCall; 1]>;

/// Parsed tag positions for a field or for its elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TagList {
    pub(crate) omit_empty: bool,
    pub(crate) checks: SmallVec<[TagAlternatives; 4]>,
}

impl TagList {
    pub(crate) fn is_empty(&self) -> bool {
        !self.omit_empty && self.checks.is_empty()
    }
}

/// Splits a tag string into field-level and element-level lists. Everything
/// after `dive` applies to the elements.
pub(crate) fn parse_tags(tags: &str) -> (TagList, Option<TagList>) {
    let mut field = TagList::default();
    let mut elements: Option<TagList> = None;

    for raw in tags.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let target = elements.as_mut().unwrap_or(&mut field);
        match raw {
            "dive" => {
                elements.get_or_insert_with(TagList::default);
            }
            "omitempty" => target.omit_empty = true,
            _ => {
                let alternatives = raw
                    .split('|')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(|alternative| match alternative.split_once('=') {
                        Some((name, param)) => TagCall {
                            name: name.trim().to_owned(),
                            param: Some(param.to_owned()),
                        },
                        None => TagCall {
                            name: alternative.to_owned(),
                            param: None,
                        },
                    })
                    .collect::<TagAlternatives>();
                if !alternatives.is_empty() {
                    target.checks.push(alternatives);
                }
            }
        }
    }

    (field, elements)
}

// ============================================================================
// COMPILED RULES
// ============================================================================

#[derive(Debug)]
pub(crate) struct CompiledField {
    pub(crate) key: String,
    pub(crate) tags: TagList,
    pub(crate) elements: Option<TagList>,
    pub(crate) nested: Option<NestedType>,
}

/// A type's field rules with tags parsed and fields indexed by key.
#[derive(Debug)]
pub(crate) struct CompiledRules {
    pub(crate) type_name: &'static str,
    pub(crate) fields: Vec<CompiledField>,
    by_key: HashMap<String, usize>,
}

impl CompiledRules {
    fn compile(type_name: &'static str, rules: FieldRules) -> Self {
        let fields: Vec<CompiledField> = rules
            .fields
            .iter()
            .map(|rule| {
                let (tags, elements) = parse_tags(&rule.tags);
                CompiledField {
                    key: rule.key().to_owned(),
                    tags,
                    elements,
                    nested: rule.nested,
                }
            })
            .collect();
        let by_key = fields
            .iter()
            .enumerate()
            .map(|(index, field)| (field.key.clone(), index))
            .collect();
        Self {
            type_name,
            fields,
            by_key,
        }
    }

    pub(crate) fn field(&self, key: &str) -> Option<&CompiledField> {
        self.by_key.get(key).map(|&index| &self.fields[index])
    }
}

/// Per-type cache of compiled rules. `None` is cached too, so types without
/// rules are compiled once.
pub(crate) struct RulesCache {
    cache: TypeCache<Option<Arc<CompiledRules>>>,
}

impl RulesCache {
    pub(crate) fn new() -> Self {
        Self {
            cache: TypeCache::new(),
        }
    }

    pub(crate) fn get(&self, ty: NestedType) -> Option<Arc<CompiledRules>> {
        self.cache.get_or_compute(ty.id, || {
            let compiled =
                (ty.rules)().map(|rules| Arc::new(CompiledRules::compile(ty.name, rules)));
            tracing::trace!(
                type_name = ty.name,
                has_rules = compiled.is_some(),
                "compiled field rules"
            );
            compiled
        })
    }

    pub(crate) fn of<T: Validatable>(&self) -> Option<Arc<CompiledRules>> {
        self.get(NestedType::of::<T>())
    }

    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(name: &str, param: Option<&str>) -> TagCall {
        TagCall {
            name: name.to_owned(),
            param: param.map(str::to_owned),
        }
    }

    #[test]
    fn parses_params_and_alternatives() {
        let (field, elements) = parse_tags("required, min=3 ,email|url");
        assert!(elements.is_none());
        assert!(!field.omit_empty);
        assert_eq!(field.checks.len(), 3);
        assert_eq!(field.checks[1][0], call("min", Some("3")));
        assert_eq!(
            field.checks[2].as_slice(),
            &[call("email", None), call("url", None)]
        );
    }

    #[test]
    fn dive_splits_element_tags() {
        let (field, elements) = parse_tags("omitempty,min=1,dive,required,max=5");
        assert!(field.omit_empty);
        assert_eq!(field.checks.len(), 1);

        let elements = elements.unwrap();
        assert!(!elements.omit_empty);
        assert_eq!(elements.checks.len(), 2);
        assert_eq!(elements.checks[1][0], call("max", Some("5")));
    }

    #[test]
    fn oneof_param_keeps_spaces() {
        let (field, _) = parse_tags("oneof=red green blue");
        assert_eq!(field.checks[0][0], call("oneof", Some("red green blue")));
    }

    #[test]
    fn empty_tags_parse_to_empty_list() {
        let (field, elements) = parse_tags(" , ");
        assert!(field.is_empty());
        assert!(elements.is_none());
    }

    #[test]
    fn key_falls_back_to_rust_name() {
        assert_eq!(FieldRule::new("Email").json("email").key(), "email");
        assert_eq!(FieldRule::new("Email").json("-").key(), "Email");
        assert_eq!(FieldRule::new("Email").key(), "Email");
    }
}
