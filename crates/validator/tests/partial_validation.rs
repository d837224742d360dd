//! Presence tracking and partial (PATCH) validation.

use pretty_assertions::assert_eq;
use rstest::rstest;
use serde::{Deserialize, Serialize};
use serde_json::json;
use vigil_validator::{
    Context, FieldRule, FieldRules, MAX_DEPTH, Options, PresenceMap, Strategy, Validatable,
    Validator, codes, compute_presence,
};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Profile {
    bio: String,
    website: String,
}

impl Validatable for Profile {
    fn field_rules() -> Option<FieldRules> {
        Some(
            FieldRules::new()
                .rule("bio", "required,max=10")
                .rule("website", "required,url"),
        )
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct User {
    name: String,
    email: String,
    age: u32,
    tags: Vec<String>,
    profile: Profile,
}

impl Validatable for User {
    fn field_rules() -> Option<FieldRules> {
        Some(
            FieldRules::new()
                .rule("name", "required")
                .rule("email", "required,email")
                .rule("age", "required,min=18")
                .rule("tags", "dive,lowercase")
                .field(FieldRule::new("profile").nested::<Profile>()),
        )
    }
}

fn patch(validator: &Validator, body: &[u8]) -> Result<(), vigil_validator::ValidationErrors> {
    patch_with(validator, body, &Options::new())
}

fn patch_with(
    validator: &Validator,
    body: &[u8],
    options: &Options,
) -> Result<(), vigil_validator::ValidationErrors> {
    let user: User = serde_json::from_slice(body).unwrap();
    let presence = compute_presence(body).unwrap();
    validator.validate_partial(&Context::new(), &user, presence, options)
}

// ============================================================================
// PRESENCE MAP
// ============================================================================

#[test]
fn presence_records_every_depth() {
    let presence = compute_presence(br#"{"user":{"name":"Alice","age":30}}"#).unwrap();
    assert_eq!(presence.len(), 3);
    assert!(presence.has("user"));
    assert!(presence.has("user.name"));
    assert!(presence.has("user.age"));
    assert_eq!(presence.leaf_paths(), vec!["user.age", "user.name"]);
}

#[test]
fn presence_indexes_arrays() {
    let presence = compute_presence(br#"{"tags":["a","b"],"items":[{"id":1}]}"#).unwrap();
    assert_eq!(
        presence.leaf_paths(),
        vec!["items.0.id", "tags.0", "tags.1"]
    );
    assert!(presence.has_prefix("items.0"));
    assert!(!presence.has_prefix("items.1"));
}

#[test]
fn scalar_and_empty_payloads_record_nothing() {
    assert!(compute_presence(b"42").unwrap().is_empty());
    assert!(compute_presence(b"{}").unwrap().is_empty());
    assert!(compute_presence(b"{not json").is_err());
}

#[test]
fn presence_stops_at_max_depth_without_failing() {
    let depth = MAX_DEPTH + 20;
    let body = format!("{}1{}", r#"{"a":"#.repeat(depth), "}".repeat(depth));
    let presence = compute_presence(body.as_bytes()).unwrap();

    assert_eq!(presence.len(), MAX_DEPTH);
    let deepest = presence.leaf_paths();
    assert_eq!(deepest.len(), 1);
    assert_eq!(deepest[0].split('.').count(), MAX_DEPTH);
}

#[test]
fn presence_serializes_as_sorted_list() {
    let presence: PresenceMap = ["b", "a", "a.x"].into_iter().collect();
    let json = serde_json::to_value(&presence).unwrap();
    assert_eq!(json, json!(["a", "a.x", "b"]));
    let back: PresenceMap = serde_json::from_value(json).unwrap();
    assert_eq!(back, presence);
}

// ============================================================================
// TAG STRATEGY
// ============================================================================

#[test]
fn patch_with_only_email_succeeds() {
    let validator = Validator::default();
    let body = br#"{"email":"new@x.com"}"#;

    let user: User = serde_json::from_slice(body).unwrap();
    assert!(validator.validate(&user).is_err());
    assert!(patch(&validator, body).is_ok());
}

#[test]
fn patch_still_checks_sent_fields() {
    let errors = patch(&Validator::default(), br#"{"email":"nope","age":12}"#).unwrap_err();
    let found: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(found, vec!["age", "email"]);
}

#[rstest]
#[case(br#"{"profile":{"bio":"short"}}"#.as_slice(), None)]
#[case(br#"{"profile":{"bio":"much too long for this"}}"#.as_slice(), Some("profile.bio"))]
#[case(br#"{"profile":{"website":"not a url"}}"#.as_slice(), Some("profile.website"))]
#[case(br#"{"tags":["ok","NOPE"]}"#.as_slice(), Some("tags.1"))]
#[case(br#"{"tags":["ok"]}"#.as_slice(), None)]
fn patch_resolves_nested_and_indexed_leaves(#[case] body: &[u8], #[case] failing: Option<&str>) {
    let result = patch(&Validator::default(), body);
    match failing {
        None => assert!(result.is_ok(), "{result:?}"),
        Some(path) => {
            let errors = result.unwrap_err();
            assert_eq!(errors.len(), 1);
            assert!(errors.has(path), "{errors:?}");
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Post {
    title: String,
    labels: Vec<String>,
}

impl Validatable for Post {
    fn field_rules() -> Option<FieldRules> {
        Some(
            FieldRules::new()
                .rule("title", "required")
                .rule("labels", "max=2,dive,alpha"),
        )
    }
}

#[rstest]
#[case::too_many(br#"{"labels":["a","b","c","d"]}"#.as_slice(), Some(("labels", "tag.max")))]
#[case::too_many_and_bad(br#"{"labels":["a","1","2"]}"#.as_slice(), Some(("labels", "tag.max")))]
#[case::bad_element(br#"{"labels":["a","1"]}"#.as_slice(), Some(("labels.1", "tag.alpha")))]
#[case::within_limit(br#"{"labels":["a","b"]}"#.as_slice(), None)]
#[case::empty(br#"{"labels":[]}"#.as_slice(), None)]
fn patch_checks_collection_tags_once(#[case] body: &[u8], #[case] expected: Option<(&str, &str)>) {
    let validator = Validator::default();
    let post: Post = serde_json::from_slice(body).unwrap();
    let presence = compute_presence(body).unwrap();
    let result = validator.validate_partial(&Context::new(), &post, presence, &Options::new());

    let Some(expected) = expected else {
        assert!(result.is_ok(), "{result:?}");
        return;
    };
    let errors = result.unwrap_err();
    let found: Vec<_> = errors
        .iter()
        .map(|e| (e.path.as_str(), e.code.as_str()))
        .collect();
    assert_eq!(found, vec![expected]);

    // Sending the whole document reports the same collection failure.
    let full = validator.validate(&post).unwrap_err();
    assert!(full.has(expected.0));
}

#[test]
fn unknown_fields_are_skipped_by_default() {
    let body = br#"{"nickname":"al","email":"a@b.co"}"#;
    assert!(patch(&Validator::default(), body).is_ok());
}

#[test]
fn unknown_fields_reported_when_disallowed() {
    let options = Options::new().disallow_unknown_fields(true);
    let errors = patch_with(
        &Validator::default(),
        br#"{"nickname":"al","profile":{"color":"red"}}"#,
        &options,
    )
    .unwrap_err();

    let found: Vec<_> = errors
        .iter()
        .map(|e| (e.path.as_str(), e.code.as_str()))
        .collect();
    assert_eq!(
        found,
        vec![
            ("nickname", codes::UNKNOWN_FIELD),
            ("profile.color", codes::UNKNOWN_FIELD),
        ]
    );
}

#[test]
fn out_of_range_index_is_skipped() {
    let user = User {
        tags: vec!["ok".into()],
        ..User::default()
    };
    let presence: PresenceMap = ["tags", "tags.0", "tags.5"].into_iter().collect();
    let validator = Validator::default();
    let result = validator.validate_partial(&Context::new(), &user, presence, &Options::new());
    assert!(result.is_ok());
}

#[test]
fn too_many_fields_are_rejected_before_validation() {
    let options = Options::new().max_fields(2);
    let errors = patch_with(
        &Validator::default(),
        br#"{"name":"a","email":"a@b.co","age":30}"#,
        &options,
    )
    .unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(errors.has_code(codes::MAX_FIELDS_EXCEEDED));
}

#[test]
fn zero_max_fields_is_unlimited() {
    let options = Options::new().max_fields(0);
    let body = br#"{"name":"a","email":"a@b.co","age":30}"#;
    assert!(patch_with(&Validator::default(), body, &options).is_ok());
}

#[test]
fn partial_without_presence_validates_everything() {
    let options = Options::new().partial(true);
    let result = Validator::default().validate_with(&User::default(), &options);
    assert!(result.is_err());
}

// ============================================================================
// SCHEMA STRATEGY
// ============================================================================

const USER_SCHEMA: &str = r#"{
    "type": "object",
    "properties": {
        "name": {"type": "string", "minLength": 1},
        "email": {"type": "string", "pattern": "@"},
        "age": {"type": "integer", "minimum": 18},
        "tags": {"type": "array", "items": {"type": "string", "minLength": 1}}
    }
}"#;

#[test]
fn schema_instance_is_pruned_to_presence() {
    let options = Options::new()
        .strategy(Strategy::JsonSchema)
        .custom_schema("user", USER_SCHEMA);
    let validator = Validator::default();

    // Serialized form has name "" and age 0; neither was sent.
    assert!(patch_with(&validator, br#"{"email":"a@b.co"}"#, &options).is_ok());
    assert!(validator.validate_with(&User::default(), &options).is_err());

    let errors = patch_with(&validator, br#"{"email":"nope"}"#, &options).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.fields()[0].path, "email");
    assert_eq!(errors.fields()[0].code, "schema.pattern");
}

#[test]
fn pruned_array_elements_become_null() {
    let presence: PresenceMap = ["tags", "tags.1"].into_iter().collect();
    let pruned = presence.prune(json!({"tags": ["", "x"], "name": ""}));
    assert_eq!(pruned, json!({"tags": [null, "x"]}));
}
