//! Documentation schema describing a rule set.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::{
    defaults::{category_description, field_description},
    rules::{FieldKind, RuleSet},
    transforms::Transformation,
    validators::Validation,
};

/// Schema title.
pub const SCHEMA_TITLE: &str = "Lead Relay Data Mapping Schema";

/// Schema version.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Self-describing view of a rule set, served to integrators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingSchema {
    pub title: &'static str,
    pub version: &'static str,
    pub generated: DateTime<Utc>,
    pub categories: BTreeMap<String, CategorySchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySchema {
    pub description: &'static str,
    pub fields: BTreeMap<String, FieldSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub sources: Vec<String>,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub required: bool,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformation: Option<Transformation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl MappingSchema {
    pub(crate) fn describe(rules: &RuleSet, generated: DateTime<Utc>) -> Self {
        let mut categories: BTreeMap<String, CategorySchema> = BTreeMap::new();

        for (category, field, rule) in rules.iter() {
            let entry = categories.entry(category.to_string()).or_insert_with(|| CategorySchema {
                description: category_description(category),
                fields: BTreeMap::new(),
            });

            entry.fields.insert(field.to_string(), FieldSchema {
                sources: rule.sources.clone(),
                kind: rule.field_type.kind(),
                required: rule.required,
                description: field_description(field),
                validation: rule.validation,
                transformation: rule.transformation,
                options: rule.field_type.options().map(<[String]>::to_vec),
                default: rule.default.clone(),
                max_length: rule.field_type.max_length(),
            });
        }

        Self { title: SCHEMA_TITLE, version: SCHEMA_VERSION, generated, categories }
    }
}
