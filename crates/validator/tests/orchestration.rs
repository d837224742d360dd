//! Strategy selection, merging and the surrounding call pipeline.

use std::any::Any;
use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;
use rstest::rstest;
use serde::Serialize;
use serde_json::json;
use vigil_validator::{
    BoxError, ConfigError, Context, FieldError, FieldRules, HTTP_STATUS, Options, SchemaSource,
    SelfValidation, Strategy, Validatable, ValidationErrors, Validator, ValidatorSettings, codes,
    is_validation_error,
};

// ============================================================================
// FIXTURES
// ============================================================================

/// Self-validation passes, tags and schema both fail.
#[derive(Serialize)]
struct Account {
    handle: String,
}

impl Validatable for Account {
    const SELF_VALIDATION: SelfValidation = SelfValidation::Plain;

    fn validate(&self) -> Result<(), BoxError> {
        Ok(())
    }

    fn field_rules() -> Option<FieldRules> {
        Some(FieldRules::new().rule("handle", "required,username"))
    }

    fn json_schema(&self) -> Option<SchemaSource> {
        Some(SchemaSource::new(
            "account",
            r#"{"properties": {"handle": {"minLength": 3}}}"#,
        ))
    }
}

#[derive(Serialize, Default)]
struct Wide {
    f0: String,
    f1: String,
    f2: String,
    f3: String,
    f4: String,
    f5: String,
    f6: String,
    f7: String,
    f8: String,
    f9: String,
}

impl Validatable for Wide {
    fn field_rules() -> Option<FieldRules> {
        let mut rules = FieldRules::new();
        for i in 0..10 {
            rules = rules.rule(format!("f{i}"), "required");
        }
        Some(rules)
    }
}

fn account(handle: &str) -> Account {
    Account {
        handle: handle.to_owned(),
    }
}

struct Region(&'static str);

#[derive(Serialize)]
struct Shipment {
    weight: u32,
}

impl Validatable for Shipment {
    const SELF_VALIDATION: SelfValidation = SelfValidation::Both;

    fn validate(&self) -> Result<(), BoxError> {
        if self.weight == 0 {
            return Err(Box::new(
                FieldError::new("shipment.empty", "weight must be positive").with_path("weight"),
            ));
        }
        Ok(())
    }

    fn validate_with_context(&self, ctx: &Context) -> Result<(), BoxError> {
        self.validate()?;
        match ctx.value::<Region>() {
            Some(Region("eu")) if self.weight > 30 => {
                Err(format!("{} kg exceeds the EU parcel limit", self.weight).into())
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// STRATEGY SELECTION
// ============================================================================

#[test]
fn interface_wins_over_tags_and_schema() {
    assert!(Validator::default().validate(&account("x")).is_ok());
}

#[rstest]
#[case(Strategy::Tags, "tag.username")]
#[case(Strategy::JsonSchema, "schema.minLength")]
fn explicit_strategy_bypasses_detection(#[case] strategy: Strategy, #[case] code: &str) {
    let options = Options::new().strategy(strategy);
    let errors = Validator::default()
        .validate_with(&account("x"), &options)
        .unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(errors.has_code(code), "{errors}");
}

#[test]
fn run_all_merges_every_strategy() {
    let options = Options::new().run_all(true);
    let errors = Validator::default()
        .validate_with(&account("x"), &options)
        .unwrap_err();

    let codes: Vec<_> = errors.iter().map(|e| e.code.as_str()).collect();
    assert_eq!(codes, vec!["schema.minLength", "tag.username"]);
}

#[test]
fn require_any_passes_when_one_strategy_is_clean() {
    let options = Options::new().run_all(true).require_any(true);
    let result = Validator::default().validate_with(&account("x"), &options);
    assert!(result.is_ok());
}

#[test]
fn require_any_fails_when_every_strategy_fails() {
    let options = Options::new().run_all(true).require_any(true);
    let errors = Validator::default()
        .validate_with(&Wide::default(), &options)
        .unwrap_err();
    assert_eq!(errors.len(), 10);
}

#[test]
fn types_without_capabilities_pass() {
    #[derive(Serialize)]
    struct Plain {
        anything: i32,
    }
    impl Validatable for Plain {}

    let plain = Plain { anything: -1 };
    assert!(Validator::default().validate(&plain).is_ok());
    let options = Options::new().run_all(true).require_any(true);
    let result = Validator::default().validate_with(&plain, &options);
    assert!(result.is_ok());
}

// ============================================================================
// INTERFACE STRATEGY
// ============================================================================

#[test]
fn interface_errors_are_coerced() {
    let validator = Validator::default();

    let errors = validator.validate(&Shipment { weight: 0 }).unwrap_err();
    assert_eq!(errors.fields()[0].code, "shipment.empty");
    assert_eq!(errors.fields()[0].path, "weight");

    let ctx = Context::new().with_value(Region("eu"));
    let errors = validator
        .validate_in(&ctx, &Shipment { weight: 40 }, &Options::new())
        .unwrap_err();
    let error = &errors.fields()[0];
    assert_eq!(error.code, codes::VALIDATION_ERROR);
    assert_eq!(error.message, "40 kg exceeds the EU parcel limit");
    assert!(error.path.is_empty());
}

#[test]
fn context_option_reaches_contextual_validation() {
    let options = Options::new().context(Context::new().with_value(Region("eu")));
    let heavy = Shipment { weight: 40 };
    let validator = Validator::default();
    assert!(validator.validate_with(&heavy, &options).is_err());
    assert!(validator.validate(&heavy).is_ok());
}

#[test]
fn wrappers_forward_to_the_pointee() {
    let validator = Validator::default();
    let empty = Box::new(Shipment { weight: 0 });
    let light = Arc::new(Shipment { weight: 1 });
    assert!(validator.validate(&empty).is_err());
    assert!(validator.validate(&light).is_ok());
    assert!(validator.validate(&Some(Shipment { weight: 0 })).is_err());

    let errors = validator.validate(&None::<Shipment>).unwrap_err();
    assert!(errors.has_code(codes::NIL_POINTER));
}

// ============================================================================
// LIMITS
// ============================================================================

#[test]
fn max_errors_truncates_the_report() {
    let options = Options::new().max_errors(1);
    let errors = Validator::default()
        .validate_with(&Wide::default(), &options)
        .unwrap_err();

    assert_eq!(errors.len(), 1);
    assert!(errors.is_truncated());
    assert_eq!(
        serde_json::to_value(&errors).unwrap()["truncated"],
        json!(true)
    );
}

#[rstest]
#[case(0, 10, false)]
#[case(3, 3, true)]
#[case(10, 10, false)]
#[case(11, 10, false)]
fn truncation_flag_tracks_the_limit(
    #[case] limit: usize,
    #[case] expected_len: usize,
    #[case] truncated: bool,
) {
    let options = Options::new().max_errors(limit);
    let errors = Validator::default()
        .validate_with(&Wide::default(), &options)
        .unwrap_err();
    assert_eq!(errors.len(), expected_len);
    assert_eq!(errors.is_truncated(), truncated);
}

// ============================================================================
// CUSTOM VALIDATOR
// ============================================================================

fn reject_short_handles(value: &dyn Any) -> Result<(), BoxError> {
    match value.downcast_ref::<Account>() {
        Some(account) if account.handle.len() < 2 => Err(Box::new(
            FieldError::new("account.handle_short", "handle too short").with_path("handle"),
        )),
        _ => Ok(()),
    }
}

#[test]
fn custom_validator_short_circuits() {
    let options = Options::new().custom_validator(reject_short_handles);
    let errors = Validator::default()
        .validate_with(&account("x"), &options)
        .unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.fields()[0].code, "account.handle_short");
}

#[test]
fn custom_validator_sees_through_wrappers() {
    let options = Options::new().custom_validator(reject_short_handles);
    let wrapped = Some(Box::new(account("x")));
    let result = Validator::default().validate_with(&wrapped, &options);
    assert!(result.is_err());
}

#[test]
fn passing_custom_validator_continues_to_strategies() {
    let options = Options::new()
        .custom_validator(reject_short_handles)
        .strategy(Strategy::Tags);
    let errors = Validator::default()
        .validate_with(&account("a!"), &options)
        .unwrap_err();
    assert!(errors.has_code("tag.username"));
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[test]
fn builder_defaults_apply_to_every_call() {
    let validator = Validator::builder()
        .defaults(Options::new().max_errors(2))
        .build()
        .unwrap();
    let errors = validator.validate(&Wide::default()).unwrap_err();
    assert_eq!(errors.len(), 2);

    let errors = validator
        .validate_with(&Wide::default(), &Options::new().max_errors(0))
        .unwrap_err();
    assert_eq!(errors.len(), 10);
}

#[test]
fn settings_reject_negative_limits() {
    let settings: ValidatorSettings = serde_json::from_str(r#"{"max_errors": -1}"#).unwrap();
    let err = Validator::from_settings(&settings).unwrap_err();
    assert_eq!(
        err,
        ConfigError::NegativeLimit {
            name: "max_errors",
            value: -1
        }
    );
    assert!(serde_json::from_str::<ValidatorSettings>(r#"{"max_erors": 1}"#).is_err());
}

#[test]
fn settings_build_a_working_validator() {
    let settings: ValidatorSettings =
        serde_json::from_str(r#"{"strategy": "tags", "max_errors": 4}"#).unwrap();
    let validator = Validator::from_settings(&settings).unwrap();

    let errors = validator.validate(&account("x")).unwrap_err();
    assert!(errors.has_code("tag.username"));
    assert_eq!(validator.validate(&Wide::default()).unwrap_err().len(), 4);
}

// ============================================================================
// ERROR REPORT
// ============================================================================

#[test]
fn report_serializes_in_wire_shape() {
    let errors = Validator::default()
        .validate_with(&Wide::default(), &Options::new().max_errors(1))
        .unwrap_err();
    let wire = serde_json::to_value(&errors).unwrap();
    assert_eq!(
        wire,
        json!({
            "errors": [{
                "path": "f0",
                "code": "tag.required",
                "message": "is required",
                "meta": {"tag": "required", "value": ""}
            }],
            "truncated": true
        })
    );

    let back: ValidationErrors = serde_json::from_value(wire).unwrap();
    assert_eq!(back.len(), 1);
    assert!(back.is_truncated());
    assert_eq!(back.fields()[0].http_status(), HTTP_STATUS);
}

#[test]
fn validation_errors_are_recognizable_in_error_chains() {
    let errors = vigil_validator::validate(&Wide::default()).unwrap_err();
    assert!(is_validation_error(&errors));
    let rendered = errors.to_string();
    assert!(rendered.starts_with("validation failed: f0: is required"));

    let boxed: BoxError = Box::new(errors);
    assert!(is_validation_error(boxed.as_ref()));
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[test]
fn one_validator_serves_many_threads() {
    let validator = Arc::new(Validator::default());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let validator = Arc::clone(&validator);
            thread::spawn(move || {
                let id = format!("schema-{}", i % 3);
                let options = Options::new()
                    .custom_schema(id, r#"{"required": ["f0"]}"#)
                    .run_all(true);
                for _ in 0..50 {
                    let errors = validator
                        .validate_with(&Wide::default(), &options)
                        .unwrap_err();
                    assert_eq!(errors.len(), 10);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(validator.cached_schema_count(), 3);
}

#[test]
fn per_call_overrides_stay_on_their_thread() {
    let validator = Arc::new(Validator::default());
    let handles: Vec<_> = (1..=8)
        .map(|limit| {
            let validator = Arc::clone(&validator);
            thread::spawn(move || {
                let message = format!("missing in call {limit}");
                let options = Options::new()
                    .max_errors(limit)
                    .message("required", message.clone());
                for _ in 0..50 {
                    let errors = validator
                        .validate_with(&Wide::default(), &options)
                        .unwrap_err();
                    assert_eq!(errors.len(), limit);
                    assert!(errors.is_truncated());
                    assert!(errors.iter().all(|e| e.message == message), "{errors:?}");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let errors = validator.validate(&Wide::default()).unwrap_err();
    assert_eq!(errors.len(), 10);
    assert!(!errors.is_truncated());
    assert!(errors.iter().all(|e| e.message == "is required"));
}

#[test]
fn default_validator_is_shared() {
    let first = vigil_validator::default_validator();
    let second = vigil_validator::default_validator();
    assert!(std::ptr::eq(first, second));
}
