//! JSON Schema strategy.
//!
//! The schema comes from the call's custom schema option or from
//! [`Validatable::json_schema`]. The instance is the raw JSON attached to the
//! context when present, otherwise the value serialized with `serde_json`.
//! In partial mode the instance is pruned to the presence map first.
//!
//! Schema errors are flattened into leaf [`FieldError`]s with dot paths and
//! `schema.<keyword>` codes.

mod cache;

use jsonschema::error::ValidationErrorKind;
use serde_json::Value;

pub(crate) use cache::SchemaCache;

use crate::capability::{SchemaSource, Validatable};
use crate::config::Config;
use crate::context::Context;
use crate::error::{FieldError, ValidationErrors, codes};
use crate::presence::join_path;
use crate::tags::scalar_text;

/// Keyword reported when a schema path does not end in one.
const FALLBACK_KEYWORD: &str = "invalid";

/// Schema to validate `value` against, if any.
pub(crate) fn source<T: Validatable>(config: &Config, value: &T) -> Option<SchemaSource> {
    match &config.custom_schema {
        Some(schema) => Some(schema.clone()),
        None => value.json_schema(),
    }
}

/// Runs the schema strategy for `value`. Values without a schema pass.
pub(crate) fn validate<T: Validatable>(
    cache: &SchemaCache,
    config: &Config,
    context: Option<&Context>,
    value: &T,
    errors: &mut ValidationErrors,
) {
    let Some(source) = source(config, value) else {
        return;
    };

    let compiled = match cache.get_or_compile(&source) {
        Ok(compiled) => compiled,
        Err(err) => {
            tracing::warn!(schema_id = %source.id(), error = %err, "schema compilation failed");
            errors.add(
                FieldError::new(codes::SCHEMA_COMPILE_ERROR, err.to_string())
                    .with_meta("schema_id", source.id()),
            );
            return;
        }
    };

    let Some(instance) = instance(context, value, errors) else {
        return;
    };
    let instance = match config.presence.as_deref() {
        Some(presence) if config.partial => presence.prune(instance),
        _ => instance,
    };

    for error in compiled.validator().iter_errors(&instance) {
        if !flatten(config, &error, errors) {
            break;
        }
    }
}

fn instance<T: Validatable>(
    context: Option<&Context>,
    value: &T,
    errors: &mut ValidationErrors,
) -> Option<Value> {
    if let Some(raw) = context.and_then(Context::raw_json) {
        return match serde_json::from_slice(raw) {
            Ok(instance) => Some(instance),
            Err(err) => {
                errors.add(FieldError::new(
                    codes::UNMARSHAL_ERROR,
                    format!("cannot parse raw JSON: {err}"),
                ));
                None
            }
        };
    }
    match serde_json::to_value(value) {
        Ok(instance) => Some(instance),
        Err(err) => {
            errors.add(FieldError::new(
                codes::MARSHAL_ERROR,
                format!("cannot serialize value: {err}"),
            ));
            None
        }
    }
}

/// Adds the leaf causes of `error`. Returns `false` once the aggregate
/// stops accepting errors.
fn flatten(
    config: &Config,
    error: &jsonschema::ValidationError<'_>,
    errors: &mut ValidationErrors,
) -> bool {
    if let ValidationErrorKind::PropertyNames { error: cause } = &error.kind {
        return flatten(config, cause, errors);
    }

    let keyword = keyword(&error.schema_path.to_string());
    let mut path = dot_path(&error.instance_path.to_string());
    if let ValidationErrorKind::Required { property } = &error.kind
        && let Some(property) = property.as_str()
    {
        path = join_path(&path, property);
    }

    let mut field = FieldError::new(format!("schema.{keyword}"), error.to_string())
        .with_path(path)
        .with_meta("keyword", keyword.as_str());
    let raw = scalar_text(&error.instance);
    if raw.is_some() {
        field = field.with_meta("value", error.instance.as_ref().clone());
    }
    if config.redacts(&field.path) {
        // Messages embed the instance as JSON: escaped strings, objects and
        // arrays only match their serialized form.
        let rendered = error.instance.to_string();
        field.redact(&[&rendered, raw.as_deref().unwrap_or_default()]);
    }
    errors.add(field)
}

/// Last segment of a schema location, e.g. `minLength` for
/// `/properties/name/minLength`.
fn keyword(schema_path: &str) -> String {
    schema_path
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.bytes().all(|b| b.is_ascii_digit()))
        .map_or_else(|| FALLBACK_KEYWORD.to_owned(), unescape)
}

/// Converts a JSON pointer (`/items/0/price`) into a dot path
/// (`items.0.price`).
fn dot_path(pointer: &str) -> String {
    pointer
        .split('/')
        .skip(1)
        .map(unescape)
        .collect::<Vec<_>>()
        .join(".")
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}
