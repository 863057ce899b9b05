#![no_main]

//! Fuzz target for lead mapping and scoring.
//!
//! Any JSON object a lead source might post must map and score without
//! panicking, and a valid result must carry every required field.

use leadrelay_core::score_lead;
use leadrelay_mapping::FieldMapper;
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(Value::Object(raw)) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    let mapper = FieldMapper::new();
    let result = mapper.map(&raw);

    if result.is_valid() {
        for field in ["firstName", "lastName", "email", "phone"] {
            assert!(result.get(field).is_some(), "valid mapping without {field}");
        }
    } else {
        assert!(!result.errors().is_empty());
    }

    let assessment = score_lead(&result.record);
    assert!(assessment.score <= 100);
});
