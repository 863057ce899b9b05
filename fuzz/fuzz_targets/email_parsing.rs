#![no_main]

//! Fuzz target for forwarded email parsing.
//!
//! Notification emails are free text from third parties. Extraction must
//! never panic and must always yield a lead the mapper can process.

use leadrelay_api::email::parse_forwarded_email;
use leadrelay_mapping::FieldMapper;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let record = parse_forwarded_email(text);
    assert_eq!(record.get("source").and_then(|v| v.as_str()), Some("yelp"));

    let _ = FieldMapper::new().map(&record);
});
