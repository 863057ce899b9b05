//! Typed field-rule schema.
//!
//! A [`FieldRule`] describes how to produce one canonical field: which raw
//! keys to probe, what type to coerce to, and which checks and lookups to
//! run. Type-specific attributes live on the [`FieldType`] variant they
//! apply to, so a `maxLength` on a number field cannot be expressed.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::RuleConfigError, transforms::Transformation, validators::Validation};

/// Field type with its type-specific attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    /// Short string; non-string values are stringified.
    String {
        /// Truncation bound in characters.
        #[serde(default, rename = "maxLength", skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    /// Free-form text; non-string values are stringified.
    Text {
        /// Truncation bound in characters.
        #[serde(default, rename = "maxLength", skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    /// Numeric value parsed from numbers or numeric strings.
    Number {
        /// Inclusive lower bound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        /// Inclusive upper bound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// Sequence; scalars are wrapped and strings comma-split.
    Array,
    /// Nested object passed through untouched.
    Object,
    /// Email address.
    Email,
    /// Phone number.
    Phone,
    /// One of a fixed set of options. Out-of-set values only warn.
    Select {
        /// Allowed values.
        options: Vec<String>,
    },
}

/// Field type discriminant without attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// See [`FieldType::String`].
    String,
    /// See [`FieldType::Text`].
    Text,
    /// See [`FieldType::Number`].
    Number,
    /// See [`FieldType::Array`].
    Array,
    /// See [`FieldType::Object`].
    Object,
    /// See [`FieldType::Email`].
    Email,
    /// See [`FieldType::Phone`].
    Phone,
    /// See [`FieldType::Select`].
    Select,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Number => "number",
            Self::Array => "array",
            Self::Object => "object",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Select => "select",
        };
        f.write_str(name)
    }
}

impl FieldKind {
    pub(crate) fn accepts(self, attribute: Attribute) -> bool {
        match attribute {
            Attribute::MaxLength => matches!(self, Self::String | Self::Text),
            Attribute::Min | Attribute::Max => self == Self::Number,
            Attribute::Options => self == Self::Select,
        }
    }
}

/// Type-specific attribute names, used for merge validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attribute {
    MaxLength,
    Min,
    Max,
    Options,
}

impl Attribute {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::MaxLength => "maxLength",
            Self::Min => "min",
            Self::Max => "max",
            Self::Options => "options",
        }
    }
}

/// Loose bag of type attributes, the shape overrides are expressed in.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TypeAttributes {
    pub max_length: Option<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub options: Option<Vec<String>>,
}

impl TypeAttributes {
    /// Attributes that are set, by name.
    pub(crate) fn present(&self) -> Vec<Attribute> {
        let mut present = Vec::new();
        if self.max_length.is_some() {
            present.push(Attribute::MaxLength);
        }
        if self.min.is_some() {
            present.push(Attribute::Min);
        }
        if self.max.is_some() {
            present.push(Attribute::Max);
        }
        if self.options.is_some() {
            present.push(Attribute::Options);
        }
        present
    }

    /// Drops attributes the kind does not carry.
    pub(crate) fn retain_for(mut self, kind: FieldKind) -> Self {
        if !kind.accepts(Attribute::MaxLength) {
            self.max_length = None;
        }
        if !kind.accepts(Attribute::Min) {
            self.min = None;
            self.max = None;
        }
        if !kind.accepts(Attribute::Options) {
            self.options = None;
        }
        self
    }

    /// Layers `other` on top of `self`; set values in `other` win.
    pub(crate) fn overlay(self, other: Self) -> Self {
        Self {
            max_length: other.max_length.or(self.max_length),
            min: other.min.or(self.min),
            max: other.max.or(self.max),
            options: other.options.or(self.options),
        }
    }
}

impl FieldType {
    /// String field without a length bound.
    pub fn string() -> Self {
        Self::String { max_length: None }
    }

    /// String field truncated to `max_length` characters.
    pub fn string_max(max_length: usize) -> Self {
        Self::String { max_length: Some(max_length) }
    }

    /// Text field truncated to `max_length` characters.
    pub fn text_max(max_length: usize) -> Self {
        Self::Text { max_length: Some(max_length) }
    }

    /// Number field with inclusive bounds.
    pub fn number_between(min: f64, max: f64) -> Self {
        Self::Number { min: Some(min), max: Some(max) }
    }

    /// Select field over the given options.
    pub fn select(options: &[&str]) -> Self {
        Self::Select { options: options.iter().map(ToString::to_string).collect() }
    }

    /// Discriminant of this type.
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::String { .. } => FieldKind::String,
            Self::Text { .. } => FieldKind::Text,
            Self::Number { .. } => FieldKind::Number,
            Self::Array => FieldKind::Array,
            Self::Object => FieldKind::Object,
            Self::Email => FieldKind::Email,
            Self::Phone => FieldKind::Phone,
            Self::Select { .. } => FieldKind::Select,
        }
    }

    /// Truncation bound for string and text fields.
    pub fn max_length(&self) -> Option<usize> {
        match self {
            Self::String { max_length } | Self::Text { max_length } => *max_length,
            _ => None,
        }
    }

    /// Allowed options for select fields.
    pub fn options(&self) -> Option<&[String]> {
        match self {
            Self::Select { options } => Some(options),
            _ => None,
        }
    }

    pub(crate) fn attributes(&self) -> TypeAttributes {
        match self {
            Self::String { max_length } | Self::Text { max_length } => {
                TypeAttributes { max_length: *max_length, ..TypeAttributes::default() }
            },
            Self::Number { min, max } => {
                TypeAttributes { min: *min, max: *max, ..TypeAttributes::default() }
            },
            Self::Select { options } => {
                TypeAttributes { options: Some(options.clone()), ..TypeAttributes::default() }
            },
            Self::Array | Self::Object | Self::Email | Self::Phone => TypeAttributes::default(),
        }
    }

    /// Builds a type from a kind and attributes already filtered for it.
    ///
    /// Returns `None` for a select without options.
    pub(crate) fn from_parts(kind: FieldKind, attributes: TypeAttributes) -> Option<Self> {
        Some(match kind {
            FieldKind::String => Self::String { max_length: attributes.max_length },
            FieldKind::Text => Self::Text { max_length: attributes.max_length },
            FieldKind::Number => Self::Number { min: attributes.min, max: attributes.max },
            FieldKind::Array => Self::Array,
            FieldKind::Object => Self::Object,
            FieldKind::Email => Self::Email,
            FieldKind::Phone => Self::Phone,
            FieldKind::Select => {
                let options = attributes.options.filter(|options| !options.is_empty())?;
                Self::Select { options }
            },
        })
    }
}

/// How to produce one canonical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRule {
    /// Raw keys probed in order; the first non-empty value wins.
    pub sources: Vec<String>,
    /// Target type and its attributes.
    #[serde(flatten)]
    pub field_type: FieldType,
    /// Whether a missing value is an error.
    #[serde(default)]
    pub required: bool,
    /// Emitted when no source yields a value and the field is optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Named pattern check, optionally normalizing the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
    /// Named lookup table applied after validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<Transformation>,
}

impl FieldRule {
    /// Optional rule with the given type and source keys.
    pub fn new(field_type: FieldType, sources: &[&str]) -> Self {
        Self {
            sources: sources.iter().map(ToString::to_string).collect(),
            field_type,
            required: false,
            default: None,
            validation: None,
            transformation: None,
        }
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default emitted for a missing optional field.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Attaches a named validator.
    pub fn validated(mut self, validation: Validation) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Attaches a named transformation table.
    pub fn transformed(mut self, transformation: Transformation) -> Self {
        self.transformation = Some(transformation);
        self
    }

    fn check(&self, category: &str, field: &str) -> Result<(), RuleConfigError> {
        if self.sources.iter().all(|source| source.is_empty()) {
            return Err(RuleConfigError::NoSources {
                category: category.to_string(),
                field: field.to_string(),
            });
        }

        match &self.field_type {
            FieldType::Number { min: Some(min), max: Some(max) } if min > max => {
                Err(RuleConfigError::InvertedBounds {
                    category: category.to_string(),
                    field: field.to_string(),
                    min: *min,
                    max: *max,
                })
            },
            FieldType::Select { options } if options.is_empty() => {
                Err(RuleConfigError::MissingOptions {
                    category: category.to_string(),
                    field: field.to_string(),
                })
            },
            _ => Ok(()),
        }
    }
}

/// Rules of one category, keyed by canonical field name.
pub type CategoryRules = BTreeMap<String, FieldRule>;

/// Complete mapping configuration: category name to field rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    categories: BTreeMap<String, CategoryRules>,
}

impl RuleSet {
    /// Creates an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a rule.
    pub fn insert(&mut self, category: &str, field: &str, rule: FieldRule) {
        self.categories.entry(category.to_string()).or_default().insert(field.to_string(), rule);
    }

    /// Builder form of [`RuleSet::insert`].
    pub fn with(mut self, category: &str, field: &str, rule: FieldRule) -> Self {
        self.insert(category, field, rule);
        self
    }

    /// Looks up a rule.
    pub fn get(&self, category: &str, field: &str) -> Option<&FieldRule> {
        self.categories.get(category).and_then(|fields| fields.get(field))
    }

    /// Rules of a category.
    pub fn category(&self, category: &str) -> Option<&CategoryRules> {
        self.categories.get(category)
    }

    /// Category names in iteration order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Every rule as `(category, field, rule)`, categories and fields in
    /// name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &FieldRule)> {
        self.categories.iter().flat_map(|(category, fields)| {
            fields.iter().map(move |(field, rule)| (category.as_str(), field.as_str(), rule))
        })
    }

    /// Total number of field rules.
    pub fn len(&self) -> usize {
        self.categories.values().map(BTreeMap::len).sum()
    }

    /// Whether the set holds no rules.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks rule shapes that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first malformed rule: no usable source key, inverted
    /// numeric bounds, or a select without options.
    pub fn validate(&self) -> Result<(), RuleConfigError> {
        self.iter().try_for_each(|(category, field, rule)| rule.check(category, field))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn field_rule_serializes_flat() {
        let rule = FieldRule::new(FieldType::string_max(50), &["firstName", "first_name"])
            .required();

        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            value,
            json!({
                "sources": ["firstName", "first_name"],
                "type": "string",
                "maxLength": 50,
                "required": true
            })
        );
    }

    #[test]
    fn field_rule_deserializes_typed_attributes() {
        let rule: FieldRule = serde_json::from_value(json!({
            "sources": ["score"],
            "type": "number",
            "min": 0,
            "max": 100
        }))
        .unwrap();

        assert_eq!(rule.field_type, FieldType::number_between(0.0, 100.0));
        assert!(!rule.required);
    }

    #[test]
    fn unknown_validation_name_is_rejected() {
        let result: Result<FieldRule, _> = serde_json::from_value(json!({
            "sources": ["zip"],
            "type": "string",
            "validation": "zipcode"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        let rules = RuleSet::new().with(
            "additional",
            "leadScore",
            FieldRule::new(FieldType::number_between(10.0, 1.0), &["score"]),
        );

        assert!(matches!(rules.validate(), Err(RuleConfigError::InvertedBounds { .. })));
    }

    #[test]
    fn validate_rejects_empty_sources() {
        let rules = RuleSet::new().with("contact", "email", FieldRule::new(FieldType::Email, &[]));

        assert!(matches!(rules.validate(), Err(RuleConfigError::NoSources { .. })));
    }

    #[test]
    fn attributes_retained_only_for_matching_kind() {
        let attributes = TypeAttributes {
            max_length: Some(10),
            min: Some(1.0),
            max: None,
            options: Some(vec!["a".into()]),
        };

        let for_number = attributes.clone().retain_for(FieldKind::Number);
        assert_eq!(for_number.max_length, None);
        assert_eq!(for_number.min, Some(1.0));
        assert_eq!(for_number.options, None);

        let for_select = attributes.retain_for(FieldKind::Select);
        assert_eq!(for_select.options, Some(vec!["a".to_string()]));
    }

    #[test]
    fn select_without_options_cannot_be_built() {
        assert!(FieldType::from_parts(FieldKind::Select, TypeAttributes::default()).is_none());
        assert_eq!(
            FieldType::from_parts(FieldKind::Email, TypeAttributes::default()),
            Some(FieldType::Email)
        );
    }

    #[test]
    fn iteration_is_ordered_by_category_then_field() {
        let rules = RuleSet::new()
            .with("contact", "phone", FieldRule::new(FieldType::Phone, &["phone"]))
            .with("address", "city", FieldRule::new(FieldType::string(), &["city"]))
            .with("contact", "email", FieldRule::new(FieldType::Email, &["email"]));

        let order: Vec<_> = rules.iter().map(|(c, f, _)| format!("{c}.{f}")).collect();
        assert_eq!(order, vec!["address.city", "contact.email", "contact.phone"]);
        assert_eq!(rules.len(), 3);
    }
}
