//! Rule configuration errors.

use thiserror::Error;

use crate::rules::FieldKind;

/// A rule set or override that cannot produce a well-formed rule.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleConfigError {
    /// New field supplied without a type or without sources.
    #[error("rule '{category}.{field}' is incomplete: {missing} must be provided")]
    IncompleteRule {
        /// Category name.
        category: String,
        /// Field name.
        field: String,
        /// What was missing.
        missing: &'static str,
    },

    /// Attribute set that the resulting type does not carry.
    #[error("rule '{category}.{field}': attribute '{attribute}' does not apply to type '{kind}'")]
    InapplicableAttribute {
        /// Category name.
        category: String,
        /// Field name.
        field: String,
        /// Attribute name in its wire spelling.
        attribute: &'static str,
        /// Type the rule resolved to.
        kind: FieldKind,
    },

    /// Select field without any options.
    #[error("rule '{category}.{field}': select fields require a non-empty options list")]
    MissingOptions {
        /// Category name.
        category: String,
        /// Field name.
        field: String,
    },

    /// No usable source key.
    #[error("rule '{category}.{field}' has no source keys")]
    NoSources {
        /// Category name.
        category: String,
        /// Field name.
        field: String,
    },

    /// `min` greater than `max`.
    #[error("rule '{category}.{field}': min {min} exceeds max {max}")]
    InvertedBounds {
        /// Category name.
        category: String,
        /// Field name.
        field: String,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
}
