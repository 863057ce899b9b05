//! Forwarded lead-notification emails.
//!
//! Some sources only notify by email. The mailbox forwards the raw text to
//! the relay, which pulls out what it can and hands the result to the mapper
//! like any other raw record.

use std::sync::LazyLock;

use leadrelay_core::RawRecord;
use regex::Regex;
use serde_json::{json, Value};

static FROM_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*From:\s*([^<\r\n]+?)\s*(?:<|$)").expect("from-name regex is valid")
});

static SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*Subject:\s*(.*?)\s*$").expect("subject regex is valid")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("email regex is valid")
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}").expect("phone regex is valid")
});

const FALLBACK_FIRST_NAME: &str = "Yelp";
const FALLBACK_LAST_NAME: &str = "Customer";

/// Parses forwarded email text into a raw lead record.
///
/// The record carries the sender's display name split into first and last
/// name, the first email address and phone number found anywhere in the
/// text, and the subject plus full text as notes. A missing or too short
/// display name falls back to `Yelp Customer`; a missing email address is
/// left out so the mapper reports it.
///
/// # Example
///
/// ```
/// use leadrelay_api::email::parse_forwarded_email;
///
/// let record = parse_forwarded_email(
///     "From: Jane Roe <jane@example.com>\nSubject: Roof leak\n\nCall me at 555-123-4567",
/// );
/// assert_eq!(record["firstName"], "Jane");
/// assert_eq!(record["email"], "jane@example.com");
/// assert_eq!(record["phone"], "555-123-4567");
/// ```
pub fn parse_forwarded_email(text: &str) -> RawRecord {
    let (first_name, last_name) = sender_name(text);
    let subject = SUBJECT
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or("", |m| m.as_str());

    let mut record = RawRecord::new();
    record.insert("firstName".into(), Value::String(first_name));
    record.insert("lastName".into(), Value::String(last_name));
    if let Some(email) = EMAIL.find(text) {
        record.insert("email".into(), Value::String(email.as_str().to_string()));
    }
    if let Some(phone) = PHONE.find(text) {
        record.insert("phone".into(), Value::String(phone.as_str().to_string()));
    }
    record.insert("notes".into(), Value::String(format!("Yelp Lead: {subject}\n\n{text}")));
    record.insert("source".into(), json!("yelp"));
    record.insert("medium".into(), json!("email_forward"));
    record.insert("tags".into(), json!(["yelp-lead", "email-forward"]));
    record
}

fn sender_name(text: &str) -> (String, String) {
    let name = FROM_NAME
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().trim_matches('"').trim())
        .filter(|name| name.chars().count() > 2 && !name.contains('@'));

    let Some(name) = name else {
        return (FALLBACK_FIRST_NAME.to_string(), FALLBACK_LAST_NAME.to_string());
    };

    let mut words = name.split_whitespace();
    let first = words.next().unwrap_or(FALLBACK_FIRST_NAME).to_string();
    let rest = words.collect::<Vec<_>>().join(" ");
    let last = if rest.is_empty() { FALLBACK_LAST_NAME.to_string() } else { rest };
    (first, last)
}
