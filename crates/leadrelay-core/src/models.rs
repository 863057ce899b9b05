//! Identifiers and inbound record types shared across the relay.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An inbound lead as received: arbitrary keys mapped to JSON values.
///
/// Third-party sources name their fields differently (`first_name`,
/// `fname`, `given_name`, ...); the mapper resolves those aliases.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Identifier assigned to every inbound webhook request.
///
/// # Example
///
/// ```
/// use leadrelay_core::RequestId;
/// let id = RequestId::new();
/// assert!(id.to_string().starts_with("req_"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Creates a new random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req_{}", self.0.simple())
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Intake channel a lead arrived through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadSource {
    /// Website contact or estimate form.
    Website,
    /// Yelp lead notification.
    Yelp,
    /// Facebook lead ad.
    Facebook,
    /// Google lead form.
    Google,
    /// Forwarded notification email.
    Email,
    /// Manual test submission.
    Test,
    /// Any other named integration.
    #[serde(untagged)]
    Other(String),
}

impl LeadSource {
    /// Lowercase name used in routes, metrics and the canonical record.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Website => "website",
            Self::Yelp => "yelp",
            Self::Facebook => "facebook",
            Self::Google => "google",
            Self::Email => "email",
            Self::Test => "test",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for LeadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Ok(match lower.as_str() {
            "website" | "web" | "form" => Self::Website,
            "yelp" => Self::Yelp,
            "facebook" | "fb" => Self::Facebook,
            "google" => Self::Google,
            "email" => Self::Email,
            "test" => Self::Test,
            "" => Self::Other("unknown".to_string()),
            _ => Self::Other(lower),
        })
    }
}
