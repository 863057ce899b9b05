//! Named pattern validators.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{0,15}$").expect("phone pattern"));

static US_POSTAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("US postal pattern"));

static CA_POSTAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]\d[A-Za-z][ -]?\d[A-Za-z]\d$").expect("CA postal pattern")
});

static ROOF_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d+(\.\d+)?\s*(sq\s?ft|square\s?feet|sqft|sf)?$").expect("roof size pattern")
});

/// Validator referenced by name from a [`crate::FieldRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Validation {
    /// `local@domain.tld` shape.
    Email,
    /// Up to 16 digits with optional leading `+`; normalizes North American
    /// numbers.
    Phone,
    /// US ZIP / ZIP+4 or Canadian `A1A 1A1`.
    PostalCode,
    /// A number with an optional square-feet unit.
    RoofSize,
}

impl Validation {
    /// Wire name of the validator.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::PostalCode => "postalCode",
            Self::RoofSize => "roofSize",
        }
    }

    /// Failure message reported when the pattern does not match.
    pub const fn message(self) -> &'static str {
        match self {
            Self::Email => "Invalid email format",
            Self::Phone => "Invalid phone number format",
            Self::PostalCode => "Invalid postal code format",
            Self::RoofSize => "Invalid roof size format (e.g., \"2500 sq ft\")",
        }
    }

    /// Checks `value` and returns it, normalized where the validator
    /// defines a normalization.
    ///
    /// # Errors
    ///
    /// Returns [`Validation::message`] when the pattern does not match.
    pub fn apply(self, value: &str) -> Result<String, &'static str> {
        let matches = match self {
            Self::Email => EMAIL.is_match(value),
            Self::Phone => PHONE.is_match(&strip_phone_separators(value)),
            Self::PostalCode => US_POSTAL.is_match(value) || CA_POSTAL.is_match(value),
            Self::RoofSize => ROOF_SIZE.is_match(value),
        };

        if !matches {
            return Err(self.message());
        }

        Ok(match self {
            Self::Phone => format_phone_number(value),
            _ => value.to_string(),
        })
    }
}

fn strip_phone_separators(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, ' ' | '.' | '-' | '(' | ')')).collect()
}

/// Formats 10-digit numbers as `(NNN) NNN-NNNN` and 11-digit numbers with
/// a leading `1` as `+1 (NNN) NNN-NNNN`. Anything else is returned as is.
///
/// ```
/// use leadrelay_mapping::format_phone_number;
///
/// assert_eq!(format_phone_number("555.123.4567"), "(555) 123-4567");
/// assert_eq!(format_phone_number("+1 555 123 4567"), "+1 (555) 123-4567");
/// assert_eq!(format_phone_number("12345"), "12345");
/// ```
pub fn format_phone_number(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();

    match digits.len() {
        10 => format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]),
        11 if digits.starts_with('1') => {
            format!("+1 ({}) {}-{}", &digits[1..4], &digits[4..7], &digits[7..])
        },
        _ => phone.to_string(),
    }
}
