//! Typed rule overrides and their recursive merge over a [`RuleSet`].
//!
//! An override names a category and field and sets any subset of the
//! rule's attributes. Merging walks both trees: categories and fields
//! missing from the base are added, existing ones are patched attribute by
//! attribute with the override winning. Changing a field's type drops
//! inherited attributes the new type does not carry; an attribute set
//! explicitly on the override that does not fit the resulting type is an
//! error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::RuleConfigError,
    rules::{FieldKind, FieldRule, FieldType, RuleSet, TypeAttributes},
    transforms::Transformation,
    validators::Validation,
};

/// Patch for one field rule. Unset attributes are inherited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FieldRuleOverride {
    /// Replacement field type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<FieldKind>,
    /// Replacement source keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    /// Replacement required flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Replacement default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Replacement truncation bound (string/text).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Replacement lower bound (number).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Replacement upper bound (number).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Replacement options (select).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Replacement validator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
    /// Replacement transformation table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<Transformation>,
}

impl FieldRuleOverride {
    /// Empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the field type.
    pub fn with_type(mut self, kind: FieldKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Sets the source keys.
    pub fn with_sources(mut self, sources: &[&str]) -> Self {
        self.sources = Some(sources.iter().map(ToString::to_string).collect());
        self
    }

    /// Sets the required flag.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Sets the default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Sets the truncation bound.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Sets both numeric bounds.
    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Sets the select options.
    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = Some(options.iter().map(ToString::to_string).collect());
        self
    }

    /// Sets the validator.
    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Sets the transformation table.
    pub fn with_transformation(mut self, transformation: Transformation) -> Self {
        self.transformation = Some(transformation);
        self
    }

    fn attributes(&self) -> TypeAttributes {
        TypeAttributes {
            max_length: self.max_length,
            min: self.min,
            max: self.max,
            options: self.options.clone(),
        }
    }

    /// Produces the rule this patch yields over `base`.
    fn apply_to(
        &self,
        base: Option<&FieldRule>,
        category: &str,
        field: &str,
    ) -> Result<FieldRule, RuleConfigError> {
        let incomplete = |missing| RuleConfigError::IncompleteRule {
            category: category.to_string(),
            field: field.to_string(),
            missing,
        };

        let kind = match (self.kind, base) {
            (Some(kind), _) => kind,
            (None, Some(base)) => base.field_type.kind(),
            (None, None) => return Err(incomplete("type")),
        };

        let explicit = self.attributes();
        if let Some(attribute) = explicit.present().into_iter().find(|a| !kind.accepts(*a)) {
            return Err(RuleConfigError::InapplicableAttribute {
                category: category.to_string(),
                field: field.to_string(),
                attribute: attribute.name(),
                kind,
            });
        }

        let inherited =
            base.map(|rule| rule.field_type.attributes().retain_for(kind)).unwrap_or_default();
        let field_type = FieldType::from_parts(kind, inherited.overlay(explicit)).ok_or_else(|| {
            RuleConfigError::MissingOptions {
                category: category.to_string(),
                field: field.to_string(),
            }
        })?;

        let sources = match (&self.sources, base) {
            (Some(sources), _) => sources.clone(),
            (None, Some(base)) => base.sources.clone(),
            (None, None) => return Err(incomplete("sources")),
        };

        Ok(FieldRule {
            sources,
            field_type,
            required: self.required.or(base.map(|rule| rule.required)).unwrap_or(false),
            default: self.default.clone().or_else(|| base.and_then(|rule| rule.default.clone())),
            validation: self.validation.or(base.and_then(|rule| rule.validation)),
            transformation: self.transformation.or(base.and_then(|rule| rule.transformation)),
        })
    }
}

/// Override tree: category name to field name to patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleOverrides {
    categories: BTreeMap<String, BTreeMap<String, FieldRuleOverride>>,
}

impl RuleOverrides {
    /// No overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a patch, replacing any earlier patch for the same field.
    pub fn with(mut self, category: &str, field: &str, patch: FieldRuleOverride) -> Self {
        self.categories.entry(category.to_string()).or_default().insert(field.to_string(), patch);
        self
    }

    /// Whether no patches are present.
    pub fn is_empty(&self) -> bool {
        self.categories.values().all(BTreeMap::is_empty)
    }

    /// Every patch as `(category, field, patch)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &FieldRuleOverride)> {
        self.categories.iter().flat_map(|(category, fields)| {
            fields.iter().map(move |(field, patch)| (category.as_str(), field.as_str(), patch))
        })
    }

    fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }
}

impl RuleSet {
    /// Returns this rule set with `overrides` merged in.
    ///
    /// # Errors
    ///
    /// Fails when a patch cannot produce a well-formed rule or the merged
    /// set does not pass [`RuleSet::validate`].
    pub fn merged(&self, overrides: &RuleOverrides) -> Result<RuleSet, RuleConfigError> {
        let mut merged = self.clone();
        for (category, field, patch) in overrides.iter() {
            let rule = patch.apply_to(self.get(category, field), category, field)?;
            merged.insert(category, field, rule);
        }
        merged.validate()?;
        Ok(merged)
    }
}

/// Findings from checking an override set against a base rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideReport {
    /// True when the overrides merge cleanly.
    pub is_valid: bool,
    /// Merge failures.
    pub errors: Vec<String>,
    /// Unknown categories and fields. These are accepted as additions.
    pub warnings: Vec<String>,
}

pub(crate) fn lint(base: &RuleSet, overrides: &RuleOverrides) -> OverrideReport {
    let mut warnings = Vec::new();
    for category in overrides.categories() {
        if base.category(category).is_none() {
            warnings.push(format!("Unknown category: {category}"));
        }
    }
    for (category, field, _) in overrides.iter() {
        if base.category(category).is_some() && base.get(category, field).is_none() {
            warnings.push(format!("Unknown field in category {category}: {field}"));
        }
    }

    let errors = match base.merged(overrides) {
        Ok(_) => Vec::new(),
        Err(err) => vec![err.to_string()],
    };

    OverrideReport { is_valid: errors.is_empty(), errors, warnings }
}
