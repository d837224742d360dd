//! Interface strategy: the type validates itself.

use crate::capability::{Dispatch, Validatable};
use crate::context::Context;
use crate::error::ValidationErrors;

/// Returns `true` if `T` implements any self-validation method.
pub(crate) fn applies<T: Validatable>() -> bool {
    Dispatch::resolve(T::SELF_VALIDATION, false) != Dispatch::NoValidator
}

/// Calls the type's validation method and coerces whatever it returns into
/// `errors`.
pub(crate) fn validate<T: Validatable>(
    context: Option<&Context>,
    value: &T,
    errors: &mut ValidationErrors,
) {
    let result = match Dispatch::resolve(T::SELF_VALIDATION, context.is_some()) {
        Dispatch::NoValidator => return,
        Dispatch::ValueValidator => value.validate(),
        Dispatch::ContextValidator => match context {
            Some(ctx) => value.validate_with_context(ctx),
            None => value.validate_with_context(&Context::default()),
        },
    };
    if let Err(err) = result {
        errors.add_error(err);
    }
}
