//! Named lookup tables applied after validation.

use serde::{Deserialize, Serialize};

const STATE_CODES: &[(&str, &str)] = &[
    ("alabama", "AL"),
    ("alaska", "AK"),
    ("arizona", "AZ"),
    ("arkansas", "AR"),
    ("california", "CA"),
    ("colorado", "CO"),
    ("connecticut", "CT"),
    ("delaware", "DE"),
    ("florida", "FL"),
    ("georgia", "GA"),
    ("hawaii", "HI"),
    ("idaho", "ID"),
    ("illinois", "IL"),
    ("indiana", "IN"),
    ("iowa", "IA"),
    ("kansas", "KS"),
    ("kentucky", "KY"),
    ("louisiana", "LA"),
    ("maine", "ME"),
    ("maryland", "MD"),
    ("massachusetts", "MA"),
    ("michigan", "MI"),
    ("minnesota", "MN"),
    ("mississippi", "MS"),
    ("missouri", "MO"),
    ("montana", "MT"),
    ("nebraska", "NE"),
    ("nevada", "NV"),
    ("new hampshire", "NH"),
    ("new jersey", "NJ"),
    ("new mexico", "NM"),
    ("new york", "NY"),
    ("north carolina", "NC"),
    ("north dakota", "ND"),
    ("ohio", "OH"),
    ("oklahoma", "OK"),
    ("oregon", "OR"),
    ("pennsylvania", "PA"),
    ("rhode island", "RI"),
    ("south carolina", "SC"),
    ("south dakota", "SD"),
    ("tennessee", "TN"),
    ("texas", "TX"),
    ("utah", "UT"),
    ("vermont", "VT"),
    ("virginia", "VA"),
    ("washington", "WA"),
    ("west virginia", "WV"),
    ("wisconsin", "WI"),
    ("wyoming", "WY"),
];

const COUNTRY_CODES: &[(&str, &str)] = &[
    ("united states", "US"),
    ("canada", "CA"),
    ("mexico", "MX"),
    ("united kingdom", "GB"),
    ("australia", "AU"),
];

/// Lookup table referenced by name from a [`crate::FieldRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Transformation {
    /// US state name to two-letter postal code.
    StateCode,
    /// Country name to ISO 3166 alpha-2 code.
    CountryCode,
}

impl Transformation {
    /// Wire name of the table.
    pub const fn name(self) -> &'static str {
        match self {
            Self::StateCode => "stateCode",
            Self::CountryCode => "countryCode",
        }
    }

    fn table(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::StateCode => STATE_CODES,
            Self::CountryCode => COUNTRY_CODES,
        }
    }

    /// Looks up `value` case-insensitively, ignoring surrounding whitespace.
    /// Misses return `None`.
    pub fn lookup(self, value: &str) -> Option<&'static str> {
        let key = value.trim().to_lowercase();
        self.table().iter().find(|(name, _)| *name == key).map(|(_, code)| *code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_lookup_ignores_case() {
        assert_eq!(Transformation::StateCode.lookup("California"), Some("CA"));
        assert_eq!(Transformation::StateCode.lookup("NEW YORK"), Some("NY"));
        assert_eq!(Transformation::StateCode.lookup("CA"), None);
    }

    #[test]
    fn state_table_covers_fifty_states() {
        assert_eq!(STATE_CODES.len(), 50);
    }

    #[test]
    fn country_lookup() {
        assert_eq!(Transformation::CountryCode.lookup("united kingdom"), Some("GB"));
        assert_eq!(Transformation::CountryCode.lookup("Narnia"), None);
    }
}
