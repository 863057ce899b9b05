//! Integration tests for mapping raw lead payloads with the built-in rules.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use leadrelay_core::{RawRecord, TestClock};
use leadrelay_mapping::{
    FieldKind, FieldMapper, FieldRuleOverride, MappingErrorKind, RuleConfigError, RuleOverrides,
    Transformation, Validation,
};
use serde_json::{json, Value};

fn record(value: Value) -> RawRecord {
    value.as_object().cloned().expect("test payload must be a JSON object")
}

fn complete_lead() -> RawRecord {
    record(json!({
        "firstName": "John",
        "lastName": "Smith",
        "email": "john@x.com",
        "phone": "5551234567"
    }))
}

#[test]
fn maps_contact_scenario_without_last_name() {
    let mapper = FieldMapper::new();
    let raw = record(json!({
        "firstName": "John",
        "phone": "5551234567",
        "email": "john@x.com"
    }));

    let result = mapper.map(&raw);

    assert_eq!(result.get("firstName"), Some(&json!("John")));
    assert_eq!(result.get("phone"), Some(&json!("(555) 123-4567")));
    assert_eq!(result.get("email"), Some(&json!("john@x.com")));
    assert!(!result.is_valid());
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].field, "lastName");
    assert_eq!(result.errors()[0].kind, MappingErrorKind::RequiredMissing);
    assert!(result.get("lastName").is_none());
}

#[test]
fn complete_contact_is_valid_with_defaults_applied() {
    let result = FieldMapper::new().map(&complete_lead());

    assert!(result.is_valid());
    assert!(result.errors().is_empty());
    assert_eq!(result.get("country"), Some(&json!("US")));
    assert_eq!(result.get("propertyType"), Some(&json!("residential")));
    assert_eq!(result.get("serviceType"), Some(&json!("estimate")));
    assert_eq!(result.get("urgency"), Some(&json!("normal")));
    assert_eq!(result.get("preferredContactTime"), Some(&json!("anytime")));
    assert_eq!(result.get("source"), Some(&json!("website")));
    assert_eq!(result.get("medium"), Some(&json!("organic")));
    assert_eq!(result.get("tags"), Some(&json!(["website-lead"])));
    assert!(result.get("roofType").is_none());
    assert!(result.get("campaign").is_none());
}

#[test]
fn missing_phone_is_reported_and_omitted() {
    let mut raw = complete_lead();
    raw.remove("phone");

    let result = FieldMapper::new().map(&raw);

    assert!(!result.is_valid());
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].field, "phone");
    assert_eq!(result.errors()[0].reason, "Required field 'phone' is missing");
    assert!(result.get("phone").is_none());
    assert!(!result.metadata.mapped_fields.contains(&"phone".to_string()));
}

#[test]
fn source_aliases_are_probed_in_order() {
    let raw = record(json!({
        "fname": "Ana",
        "surname": "Lopez",
        "mail": "ana@example.org",
        "mobile": "1-555-987-6543",
        "zip": "30301",
        "province": "georgia",
        "country": "Canada",
        "utm_source": "google",
        "utm_campaign": "spring-roofs"
    }));

    let result = FieldMapper::new().map(&raw);

    assert!(result.is_valid(), "{:?}", result.errors());
    assert_eq!(result.get("firstName"), Some(&json!("Ana")));
    assert_eq!(result.get("lastName"), Some(&json!("Lopez")));
    assert_eq!(result.get("phone"), Some(&json!("+1 (555) 987-6543")));
    assert_eq!(result.get("postalCode"), Some(&json!("30301")));
    assert_eq!(result.get("state"), Some(&json!("GA")));
    assert_eq!(result.get("country"), Some(&json!("CA")));
    assert_eq!(result.get("source"), Some(&json!("google")));
    assert_eq!(result.get("campaign"), Some(&json!("spring-roofs")));
}

#[test]
fn unrecognized_state_passes_through() {
    let mut raw = complete_lead();
    raw.insert("state".into(), json!("Ontario"));

    let result = FieldMapper::new().map(&raw);
    assert_eq!(result.get("state"), Some(&json!("Ontario")));
}

#[test]
fn invalid_email_and_postal_code_are_errors() {
    let mut raw = complete_lead();
    raw.insert("email".into(), json!("john.at.example"));
    raw.insert("zipCode".into(), json!("ABC"));

    let result = FieldMapper::new().map(&raw);

    assert!(!result.is_valid());
    let fields: Vec<_> = result.errors().iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["postalCode", "email"]);
    assert_eq!(result.errors()[1].kind, MappingErrorKind::InvalidFormat {
        validation: Validation::Email
    });
    assert_eq!(result.errors()[1].reason, "Invalid email format");
}

#[test]
fn long_notes_are_truncated_with_one_warning() {
    let mut raw = complete_lead();
    raw.insert("message".into(), json!("x".repeat(2500)));

    let result = FieldMapper::new().map(&raw);

    assert!(result.is_valid());
    assert_eq!(result.get("notes").and_then(Value::as_str).map(str::len), Some(2000));
    assert_eq!(result.warnings(), ["Field 'notes' truncated to 2000 characters"]);
}

#[test]
fn lead_score_out_of_range_is_rejected() {
    let mut raw = complete_lead();
    raw.insert("score".into(), json!("150"));

    let result = FieldMapper::new().map(&raw);

    assert!(!result.is_valid());
    assert_eq!(result.errors()[0].field, "leadScore");
    assert_eq!(result.errors()[0].kind, MappingErrorKind::AboveMaximum { max: 100.0 });
}

#[test]
fn metadata_lists_original_and_mapped_fields() {
    let clock = TestClock::with_start_time(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000));
    let mapper = FieldMapper::new().with_clock(Arc::new(clock));

    let mut raw = complete_lead();
    raw.insert("unrelated".into(), json!(true));
    let result = mapper.map(&raw);

    assert_eq!(result.metadata.mapped_at.timestamp(), 1_700_000_000);
    assert!(result.metadata.original_fields.contains(&"unrelated".to_string()));
    assert!(!result.metadata.mapped_fields.contains(&"unrelated".to_string()));
    assert_eq!(result.metadata.mapped_fields.len(), result.record.len());
}

#[test]
fn result_serializes_flat_with_metadata_block() {
    let result = FieldMapper::new().map(&complete_lead());
    let value = serde_json::to_value(&result).expect("mapping result serializes");

    assert_eq!(value["firstName"], "John");
    assert_eq!(value["_metadata"]["isValid"], true);
    assert!(value["_metadata"]["mappedAt"].is_string());
    assert!(value["_metadata"]["errors"].as_array().is_some_and(Vec::is_empty));
}

#[test]
fn mapping_is_idempotent_apart_from_timestamp() {
    let mapper = FieldMapper::new();
    let mut raw = complete_lead();
    raw.insert("message".into(), json!("  Hail damage on the north slope  "));
    raw.insert("tags".into(), json!("storm, insurance"));

    let first = mapper.map(&raw);
    let second = mapper.map(&raw);

    assert_eq!(first.record, second.record);
    assert_eq!(first.metadata.errors, second.metadata.errors);
    assert_eq!(first.metadata.warnings, second.metadata.warnings);
    assert_eq!(first.metadata.mapped_fields, second.metadata.mapped_fields);
}

#[test]
fn per_call_overrides_do_not_stick() {
    let mapper = FieldMapper::new();
    let overrides = RuleOverrides::new().with(
        "contact",
        "lastName",
        FieldRuleOverride::new().with_required(false).with_default("Unknown"),
    );
    let raw = record(json!({
        "firstName": "John",
        "phone": "5551234567",
        "email": "john@x.com"
    }));

    let overridden = mapper.map_with(&raw, &overrides).expect("overrides merge");
    assert!(overridden.is_valid());
    assert_eq!(overridden.get("lastName"), Some(&json!("Unknown")));

    assert!(!mapper.map(&raw).is_valid());
}

#[test]
fn baked_overrides_add_fields() {
    let overrides = RuleOverrides::new().with(
        "roofing",
        "stories",
        FieldRuleOverride::new()
            .with_type(FieldKind::Number)
            .with_sources(&["stories", "floors"])
            .with_bounds(1.0, 5.0),
    );
    let mapper = FieldMapper::new().with_overrides(&overrides).expect("overrides merge");

    let mut raw = complete_lead();
    raw.insert("floors".into(), json!("2"));
    let result = mapper.map(&raw);

    assert!(result.is_valid());
    assert_eq!(result.get("stories"), Some(&json!(2)));
}

#[test]
fn override_can_attach_transformation() {
    let overrides = RuleOverrides::new().with(
        "attribution",
        "term",
        FieldRuleOverride::new().with_transformation(Transformation::CountryCode),
    );
    let mapper = FieldMapper::new().with_overrides(&overrides).expect("overrides merge");

    let mut raw = complete_lead();
    raw.insert("keyword".into(), json!("Mexico"));
    assert_eq!(mapper.map(&raw).get("term"), Some(&json!("MX")));
}

#[test]
fn malformed_override_is_a_precondition_error() {
    let overrides = RuleOverrides::new().with(
        "contact",
        "email",
        FieldRuleOverride::new().with_options(&["a"]),
    );

    let err = FieldMapper::new().map_with(&complete_lead(), &overrides).unwrap_err();
    assert!(matches!(err, RuleConfigError::InapplicableAttribute { attribute: "options", .. }));
}

#[test]
fn schema_reflects_effective_rules() {
    let schema = FieldMapper::new().schema();
    let value = serde_json::to_value(&schema).expect("schema serializes");

    assert_eq!(value["version"], "1.0.0");
    assert_eq!(value["categories"]["contact"]["fields"]["email"]["validation"], "email");
    assert_eq!(value["categories"]["address"]["fields"]["state"]["transformation"], "stateCode");
    assert_eq!(value["categories"]["roofing"]["fields"]["roofAge"]["options"][6], "unknown");
}
