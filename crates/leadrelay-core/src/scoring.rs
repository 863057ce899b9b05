//! Lead priority scoring.
//!
//! A weighted sum over a canonical lead record. Each signal contributes a
//! fixed number of points and the total is capped at 100.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::RawRecord;

const MAX_SCORE: u32 = 100;

/// Keywords in free-form notes that mark a lead as urgent.
const URGENT_KEYWORDS: &[&str] =
    &["urgent", "asap", "emergency", "leak", "damage", "immediately", "help"];

/// Priority bucket derived from a lead score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    /// Score of 40 or below.
    Low,
    /// Score above 40.
    Medium,
    /// Score above 70.
    High,
}

impl Priority {
    /// Buckets a score.
    pub fn from_score(score: u32) -> Self {
        if score > 70 {
            Self::High
        } else if score > 40 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Outcome of scoring one lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadAssessment {
    /// Total score, 0 to 100.
    pub score: u32,
    /// Priority bucket for the score.
    pub priority: Priority,
    /// Human-readable list of signals that contributed points.
    pub factors: Vec<String>,
}

/// Scores a canonical lead record.
///
/// # Example
///
/// ```
/// use leadrelay_core::{score_lead, Priority};
/// use serde_json::json;
///
/// let record = json!({"phone": "(555) 123-4567", "email": "a@b.co"});
/// let assessment = score_lead(record.as_object().unwrap());
/// assert_eq!(assessment.score, 35);
/// assert_eq!(assessment.priority, Priority::Low);
/// ```
pub fn score_lead(record: &RawRecord) -> LeadAssessment {
    let mut score = 0;
    let mut factors = Vec::new();
    let mut add = |points: u32, factor: &str| {
        score += points;
        factors.push(format!("{factor} (+{points})"));
    };

    if text(record, "phone").is_some_and(|p| p.chars().filter(char::is_ascii_digit).count() >= 10) {
        add(20, "valid phone number");
    }

    if text(record, "email").is_some_and(|e| e.contains('@')) {
        add(15, "email address");
    }

    let name = [text(record, "firstName"), text(record, "lastName")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if name.trim().chars().count() > 2 {
        add(10, "name provided");
    }

    let notes = text(record, "notes").unwrap_or_default();
    let notes_len = notes.chars().count();
    if notes_len > 20 {
        add(10, "detailed message");
    }
    if notes_len > 100 {
        add(5, "long message");
    }

    if text(record, "serviceType").is_some_and(|s| !s.trim().is_empty()) {
        add(15, "service requested");
    }

    let urgent_field = text(record, "urgency")
        .is_some_and(|u| matches!(u.to_ascii_lowercase().as_str(), "emergency" | "urgent"));
    let lower_notes = notes.to_lowercase();
    let urgent_notes = URGENT_KEYWORDS.iter().any(|keyword| lower_notes.contains(keyword));
    if urgent_field || urgent_notes {
        add(25, "urgency detected");
    }

    if text(record, "source").is_some_and(|s| s.eq_ignore_ascii_case("yelp")) {
        add(15, "high-quality source");
    }

    let score = score.min(MAX_SCORE);
    LeadAssessment { score, priority: Priority::from_score(score), factors }
}

fn text<'a>(record: &'a RawRecord, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}
