//! Built-in tag checks.
//!
//! Every check receives the field's serialized JSON value and the tag
//! parameter (the text after `=`). A check that does not understand the
//! value's shape fails rather than passing silently.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

use serde_json::Value;

static EMAIL_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email regex is valid")
});

static URL_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").expect("url regex is valid")
});

static UUID_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("uuid regex is valid")
});

static NUMERIC_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[-+]?[0-9]+(?:\.[0-9]+)?$").expect("numeric regex is valid")
});

static USERNAME_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[a-zA-Z0-9_]{3,20}$").expect("username regex is valid")
});

static SLUG_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug regex is valid")
});

/// Minimum character count accepted by `strong_password`.
pub const STRONG_PASSWORD_MIN_LEN: usize = 8;

/// Signature shared by built-in checks.
pub(crate) type BuiltinCheck = fn(&Value, Option<&str>) -> bool;

/// Name and check of every built-in tag. `omitempty` and `dive` are
/// handled by the parser and have no entry here.
pub(crate) const BUILTINS: &[(&str, BuiltinCheck)] = &[
    ("required", required),
    ("min", min),
    ("max", max),
    ("len", len),
    ("eq", eq),
    ("ne", ne),
    ("gt", gt),
    ("gte", min),
    ("lt", lt),
    ("lte", max),
    ("oneof", one_of),
    ("email", |v, _| matches(v, &EMAIL_REGEX)),
    ("url", |v, _| matches(v, &URL_REGEX)),
    ("uuid", |v, _| matches(v, &UUID_REGEX)),
    ("alpha", alpha),
    ("alphanum", alphanum),
    ("numeric", numeric),
    ("lowercase", lowercase),
    ("uppercase", uppercase),
    ("contains", contains),
    ("excludes", excludes),
    ("startswith", startswith),
    ("endswith", endswith),
    ("ip", |v, _| parses::<IpAddr>(v)),
    ("ipv4", |v, _| parses::<Ipv4Addr>(v)),
    ("ipv6", |v, _| parses::<Ipv6Addr>(v)),
    ("username", |v, _| matches(v, &USERNAME_REGEX)),
    ("slug", |v, _| matches(v, &SLUG_REGEX)),
    ("strong_password", |v, _| {
        v.as_str()
            .is_some_and(|s| s.chars().count() >= STRONG_PASSWORD_MIN_LEN)
    }),
];

// ============================================================================
// EMPTINESS
// ============================================================================

/// Zero value of its JSON kind: `null`, `""`, `0` or `false`.
pub(crate) fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// What `omitempty` skips: zero values plus empty arrays and objects.
pub(crate) fn is_empty(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        other => is_zero(other),
    }
}

// ============================================================================
// CHECKS
// ============================================================================

fn required(value: &Value, _: Option<&str>) -> bool {
    !is_zero(value)
}

/// Length for strings (in characters), arrays and objects; the value itself
/// for numbers.
fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(items) => Some(items.len() as f64),
        Value::Object(map) => Some(map.len() as f64),
        Value::Number(n) => n.as_f64(),
        Value::Null | Value::Bool(_) => None,
    }
}

fn compare(value: &Value, param: Option<&str>, accept: fn(f64, f64) -> bool) -> bool {
    let Some(bound) = param.and_then(|p| p.trim().parse::<f64>().ok()) else {
        return false;
    };
    measure(value).is_some_and(|actual| accept(actual, bound))
}

fn min(value: &Value, param: Option<&str>) -> bool {
    compare(value, param, |actual, bound| actual >= bound)
}

fn max(value: &Value, param: Option<&str>) -> bool {
    compare(value, param, |actual, bound| actual <= bound)
}

fn gt(value: &Value, param: Option<&str>) -> bool {
    compare(value, param, |actual, bound| actual > bound)
}

fn lt(value: &Value, param: Option<&str>) -> bool {
    compare(value, param, |actual, bound| actual < bound)
}

fn len(value: &Value, param: Option<&str>) -> bool {
    compare(value, param, |actual, bound| actual == bound)
}

/// Strings compare by content, booleans by their literal, everything else
/// like `len`.
fn eq(value: &Value, param: Option<&str>) -> bool {
    let Some(param) = param else {
        return false;
    };
    match value {
        Value::String(s) => s == param,
        Value::Bool(b) => param.trim().parse::<bool>().is_ok_and(|p| p == *b),
        Value::Null => false,
        other => compare(other, Some(param), |actual, bound| actual == bound),
    }
}

fn ne(value: &Value, param: Option<&str>) -> bool {
    param.is_some() && !eq(value, param)
}

fn one_of(value: &Value, param: Option<&str>) -> bool {
    let Some(param) = param else {
        return false;
    };
    let rendered = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return false,
    };
    param.split_whitespace().any(|option| option == rendered)
}

fn numeric(value: &Value, _: Option<&str>) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => NUMERIC_REGEX.is_match(s),
        _ => false,
    }
}

fn matches(value: &Value, regex: &regex::Regex) -> bool {
    value.as_str().is_some_and(|s| regex.is_match(s))
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

fn non_empty_str_all(value: &Value, accept: fn(char) -> bool) -> bool {
    non_empty_str(value).is_some_and(|s| s.chars().all(accept))
}

fn alpha(value: &Value, _: Option<&str>) -> bool {
    non_empty_str_all(value, |c| c.is_ascii_alphabetic())
}

fn alphanum(value: &Value, _: Option<&str>) -> bool {
    non_empty_str_all(value, |c| c.is_ascii_alphanumeric())
}

fn lowercase(value: &Value, _: Option<&str>) -> bool {
    non_empty_str(value).is_some_and(|s| s == s.to_lowercase())
}

fn uppercase(value: &Value, _: Option<&str>) -> bool {
    non_empty_str(value).is_some_and(|s| s == s.to_uppercase())
}

fn with_param(value: &Value, param: Option<&str>, accept: fn(&str, &str) -> bool) -> bool {
    match (value.as_str(), param) {
        (Some(s), Some(p)) => accept(s, p),
        _ => false,
    }
}

fn contains(value: &Value, param: Option<&str>) -> bool {
    with_param(value, param, |s, p| s.contains(p))
}

fn excludes(value: &Value, param: Option<&str>) -> bool {
    with_param(value, param, |s, p| !s.contains(p))
}

fn startswith(value: &Value, param: Option<&str>) -> bool {
    with_param(value, param, |s, p| s.starts_with(p))
}

fn endswith(value: &Value, param: Option<&str>) -> bool {
    with_param(value, param, |s, p| s.ends_with(p))
}

fn parses<T: std::str::FromStr>(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.parse::<T>().is_ok())
}

// ============================================================================
// TESTS
// ============================================================================
