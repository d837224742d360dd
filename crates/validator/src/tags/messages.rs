//! Error messages for tag failures.
//!
//! Resolution order for a failing tag:
//!
//! 1. a static override registered for the tag name,
//! 2. a message function registered for the tag name,
//! 3. the built-in default below.
//!
//! Static overrides are templates: `{param}` and `{value}` are substituted
//! with the tag parameter and the offending scalar value.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Produces a message from the tag parameter and the kind of the failing
/// value.
pub type MessageFn = Arc<dyn Fn(Option<&str>, ValueKind) -> String + Send + Sync>;

/// JSON kind of the value a tag rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `null`.
    Null,
    /// `true` / `false`.
    Bool,
    /// Any number.
    Number,
    /// A string.
    String,
    /// An array.
    Array,
    /// An object.
    Object,
}

impl ValueKind {
    /// Kind of a JSON value.
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

/// Message overrides attached to a validator or a single call.
#[derive(Clone, Default)]
pub(crate) struct MessageOverrides {
    statics: HashMap<String, String>,
    dynamic: HashMap<String, MessageFn>,
}

impl MessageOverrides {
    pub(crate) fn set_static(&mut self, tag: String, template: String) {
        self.statics.insert(tag, template);
    }

    pub(crate) fn set_dynamic(&mut self, tag: String, message: MessageFn) {
        self.dynamic.insert(tag, message);
    }

    pub(crate) fn render(&self, tag: &str, param: Option<&str>, value: &Value) -> String {
        if let Some(template) = self.statics.get(tag) {
            return template
                .replace("{param}", param.unwrap_or_default())
                .replace("{value}", &scalar_text(value).unwrap_or_default());
        }
        if let Some(message) = self.dynamic.get(tag) {
            return message(param, ValueKind::of(value));
        }
        default_message(tag, param, ValueKind::of(value))
    }
}

impl fmt::Debug for MessageOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageOverrides")
            .field("statics", &self.statics)
            .field("dynamic", &self.dynamic.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Text of a scalar value as it would appear in a message; `None` for
/// null, arrays and objects.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Built-in message for a failing tag.
#[must_use]
pub fn default_message(tag: &str, param: Option<&str>, kind: ValueKind) -> String {
    let p = param.unwrap_or_default();
    let sized = |chars: &str, items: &str, number: &str| match kind {
        ValueKind::String => format!("{chars} {p} characters"),
        ValueKind::Array | ValueKind::Object => format!("{items} {p} items"),
        _ => format!("{number} {p}"),
    };

    match tag {
        "required" => "is required".to_owned(),
        "min" | "gte" => sized(
            "must be at least",
            "must contain at least",
            "must be at least",
        ),
        "max" | "lte" => sized(
            "must be at most",
            "must contain no more than",
            "must be at most",
        ),
        "len" => sized("must be exactly", "must contain exactly", "must be"),
        "gt" => sized(
            "must be longer than",
            "must contain more than",
            "must be greater than",
        ),
        "lt" => sized(
            "must be shorter than",
            "must contain fewer than",
            "must be less than",
        ),
        "eq" => format!("must be equal to {p}"),
        "ne" => format!("must not be equal to {p}"),
        "oneof" => format!("must be one of [{p}]"),
        "email" => "must be a valid email address".to_owned(),
        "url" => "must be a valid URL".to_owned(),
        "uuid" => "must be a valid UUID".to_owned(),
        "alpha" => "must contain only letters".to_owned(),
        "alphanum" => "must contain only letters and digits".to_owned(),
        "numeric" => "must be numeric".to_owned(),
        "lowercase" => "must be lowercase".to_owned(),
        "uppercase" => "must be uppercase".to_owned(),
        "contains" => format!("must contain '{p}'"),
        "excludes" => format!("must not contain '{p}'"),
        "startswith" => format!("must start with '{p}'"),
        "endswith" => format!("must end with '{p}'"),
        "ip" => "must be a valid IP address".to_owned(),
        "ipv4" => "must be a valid IPv4 address".to_owned(),
        "ipv6" => "must be a valid IPv6 address".to_owned(),
        "username" => "must be 3-20 letters, digits or underscores".to_owned(),
        "slug" => "must be lowercase letters and digits separated by single hyphens".to_owned(),
        "strong_password" => format!(
            "must be at least {} characters",
            super::builtin::STRONG_PASSWORD_MIN_LEN
        ),
        alternatives if alternatives.contains('|') => {
            format!("must satisfy one of: {}", alternatives.replace('|', ", "))
        }
        other => format!("failed '{other}' validation"),
    }
}
