//! Rule-driven mapping of raw lead records into the canonical contact shape.
//!
//! Every rule in the effective [`RuleSet`] is evaluated independently:
//! extract the first non-empty source value, coerce it to the rule's type,
//! then truncate, bound-check, option-check, validate, transform and trim.
//! Problems are collected into [`MappingMetadata`]; mapping itself never
//! fails.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use leadrelay_core::{Clock, RawRecord, RealClock};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;
use tracing::debug;

use crate::{
    defaults::default_rules,
    error::RuleConfigError,
    overrides::{lint, OverrideReport, RuleOverrides},
    rules::{FieldRule, FieldType, RuleSet},
    schema::MappingSchema,
    validators::Validation,
};

/// Why a field was left out of the canonical record.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum MappingErrorKind {
    /// Required field with no usable source value.
    #[error("required field missing")]
    RequiredMissing,

    /// Number field whose value does not parse as a finite number.
    #[error("invalid number")]
    InvalidNumber,

    /// Number below the rule's lower bound.
    #[error("below minimum {min}")]
    BelowMinimum {
        /// Inclusive lower bound.
        min: f64,
    },

    /// Number above the rule's upper bound.
    #[error("above maximum {max}")]
    AboveMaximum {
        /// Inclusive upper bound.
        max: f64,
    },

    /// Value rejected by a named validator.
    #[error("failed {validation:?} validation")]
    InvalidFormat {
        /// Validator that rejected the value.
        validation: Validation,
    },
}

/// Per-field mapping failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingError {
    /// Canonical field name.
    pub field: String,
    /// Machine-readable failure.
    #[serde(flatten)]
    pub kind: MappingErrorKind,
    /// Human-readable failure.
    pub reason: String,
    /// Offending input value, absent for missing fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Bookkeeping attached to every mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingMetadata {
    /// When the mapping ran.
    pub mapped_at: DateTime<Utc>,
    /// Keys present on the raw record.
    pub original_fields: Vec<String>,
    /// Canonical keys produced.
    pub mapped_fields: Vec<String>,
    /// Fields left out because of a failure.
    pub errors: Vec<MappingError>,
    /// Non-blocking findings such as truncation.
    pub warnings: Vec<String>,
    /// True iff `errors` is empty.
    pub is_valid: bool,
}

/// Canonical record plus its metadata. Serializes as the flat record with
/// the metadata under `_metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingResult {
    /// Canonical field values.
    #[serde(flatten)]
    pub record: RawRecord,
    /// Mapping bookkeeping.
    #[serde(rename = "_metadata")]
    pub metadata: MappingMetadata,
}

impl MappingResult {
    /// Whether every rule was satisfied.
    pub fn is_valid(&self) -> bool {
        self.metadata.is_valid
    }

    /// Canonical value of a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.record.get(field)
    }

    /// Errors recorded for the mapping.
    pub fn errors(&self) -> &[MappingError] {
        &self.metadata.errors
    }

    /// Warnings recorded for the mapping.
    pub fn warnings(&self) -> &[String] {
        &self.metadata.warnings
    }
}

/// Maps raw records through a fixed rule set.
#[derive(Debug, Clone)]
pub struct FieldMapper {
    rules: RuleSet,
    clock: Arc<dyn Clock>,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldMapper {
    /// Mapper over the built-in rules.
    pub fn new() -> Self {
        Self { rules: default_rules(), clock: Arc::new(RealClock::new()) }
    }

    /// Mapper over a caller-supplied rule set.
    ///
    /// # Errors
    ///
    /// Returns an error if `rules` fails [`RuleSet::validate`].
    pub fn with_rules(rules: RuleSet) -> Result<Self, RuleConfigError> {
        rules.validate()?;
        Ok(Self { rules, clock: Arc::new(RealClock::new()) })
    }

    /// Bakes `overrides` into this mapper's rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the overrides do not merge into a well-formed
    /// rule set.
    pub fn with_overrides(mut self, overrides: &RuleOverrides) -> Result<Self, RuleConfigError> {
        self.rules = self.rules.merged(overrides)?;
        Ok(self)
    }

    /// Replaces the clock used for `mappedAt`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Effective rule set.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Maps `raw` with the effective rules.
    pub fn map(&self, raw: &RawRecord) -> MappingResult {
        map_with_rules(&self.rules, raw, self.clock.now_utc())
    }

    /// Maps `raw` with `overrides` merged over the effective rules for this
    /// call only.
    ///
    /// # Errors
    ///
    /// Returns an error if the overrides do not merge. The mapping itself
    /// never fails.
    pub fn map_with(
        &self,
        raw: &RawRecord,
        overrides: &RuleOverrides,
    ) -> Result<MappingResult, RuleConfigError> {
        if overrides.is_empty() {
            return Ok(self.map(raw));
        }
        let rules = self.rules.merged(overrides)?;
        Ok(map_with_rules(&rules, raw, self.clock.now_utc()))
    }

    /// Documentation schema for the effective rules.
    pub fn schema(&self) -> MappingSchema {
        MappingSchema::describe(&self.rules, self.clock.now_utc())
    }

    /// Checks `overrides` against the effective rules without applying
    /// them.
    pub fn lint_overrides(&self, overrides: &RuleOverrides) -> OverrideReport {
        lint(&self.rules, overrides)
    }
}

fn map_with_rules(rules: &RuleSet, raw: &RawRecord, mapped_at: DateTime<Utc>) -> MappingResult {
    let mut record = RawRecord::new();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (_, field, rule) in rules.iter() {
        match extract(raw, &rule.sources) {
            Some(candidate) => match process(field, rule, candidate) {
                Ok((value, mut field_warnings)) => {
                    record.insert(field.to_string(), value);
                    warnings.append(&mut field_warnings);
                },
                Err(error) => errors.push(error),
            },
            None if rule.required => errors.push(MappingError {
                field: field.to_string(),
                kind: MappingErrorKind::RequiredMissing,
                reason: format!("Required field '{field}' is missing"),
                value: None,
            }),
            None => {
                if let Some(default) = &rule.default {
                    record.insert(field.to_string(), default.clone());
                }
            },
        }
    }

    let is_valid = errors.is_empty();
    debug!(
        mapped = record.len(),
        errors = errors.len(),
        warnings = warnings.len(),
        is_valid,
        "mapped raw record"
    );

    MappingResult {
        metadata: MappingMetadata {
            mapped_at,
            original_fields: raw.keys().cloned().collect(),
            mapped_fields: record.keys().cloned().collect(),
            errors,
            warnings,
            is_valid,
        },
        record,
    }
}

/// First source value that is neither null nor the empty string.
fn extract<'a>(raw: &'a RawRecord, sources: &[String]) -> Option<&'a Value> {
    sources.iter().filter_map(|source| raw.get(source)).find(|value| match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

fn process(
    field: &str,
    rule: &FieldRule,
    candidate: &Value,
) -> Result<(Value, Vec<String>), MappingError> {
    let fail = |kind: MappingErrorKind, reason: String| MappingError {
        field: field.to_string(),
        kind,
        reason,
        value: Some(candidate.clone()),
    };
    let mut warnings = Vec::new();

    let mut value = match &rule.field_type {
        FieldType::Number { .. } => match to_number(candidate) {
            Some(number) => number,
            None => {
                return Err(fail(
                    MappingErrorKind::InvalidNumber,
                    format!("Invalid number format for field '{field}'"),
                ));
            },
        },
        FieldType::Array => to_array(candidate),
        FieldType::Object => candidate.clone(),
        FieldType::String { .. }
        | FieldType::Text { .. }
        | FieldType::Email
        | FieldType::Phone
        | FieldType::Select { .. } => Value::String(to_text(candidate)),
    };

    if let (Some(max_length), Value::String(text)) = (rule.field_type.max_length(), &value) {
        if text.chars().count() > max_length {
            value = Value::String(text.chars().take(max_length).collect());
            warnings.push(format!("Field '{field}' truncated to {max_length} characters"));
        }
    }

    if let FieldType::Number { min, max } = rule.field_type {
        let number = value.as_f64().unwrap_or_default();
        if let Some(min) = min.filter(|min| number < *min) {
            return Err(fail(
                MappingErrorKind::BelowMinimum { min },
                format!("Field '{field}' must be at least {min}"),
            ));
        }
        if let Some(max) = max.filter(|max| number > *max) {
            return Err(fail(
                MappingErrorKind::AboveMaximum { max },
                format!("Field '{field}' must be at most {max}"),
            ));
        }
    }

    if let (Some(options), Value::String(text)) = (rule.field_type.options(), &value) {
        if !options.iter().any(|option| option == text) {
            warnings.push(format!("Field '{field}' value '{text}' not in predefined options"));
        }
    }

    if let Some(validation) = rule.validation {
        match validation.apply(&to_text(&value)) {
            Ok(normalized) => {
                if value.is_string() {
                    value = Value::String(normalized);
                }
            },
            Err(message) => {
                return Err(fail(
                    MappingErrorKind::InvalidFormat { validation },
                    message.to_string(),
                ));
            },
        }
    }

    if let (Some(transformation), Value::String(text)) = (rule.transformation, &value) {
        if let Some(code) = transformation.lookup(text) {
            value = Value::String(code.to_string());
        }
    }

    if let Value::String(text) = &value {
        let trimmed = text.trim();
        if trimmed.len() != text.len() {
            value = Value::String(trimmed.to_string());
        }
    }

    Ok((value, warnings))
}

/// Text form of a value. Arrays join their elements with commas.
fn to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(to_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// Finite number from a JSON number or a numeric string. Integral values
/// stay integers.
///
/// The whole trimmed string must parse: `"12abc"` and `"1,200"` are not
/// numbers.
fn to_number(value: &Value) -> Option<Value> {
    let number = match value {
        Value::Number(number) => return Some(Value::Number(number.clone())),
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if !number.is_finite() {
        return None;
    }

    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        #[allow(clippy::cast_possible_truncation)]
        let integer = number as i64;
        return Some(Value::from(integer));
    }

    Number::from_f64(number).map(Value::Number)
}

/// Sequences pass through, strings split on commas, anything else is
/// wrapped.
fn to_array(value: &Value) -> Value {
    match value {
        Value::Array(_) => value.clone(),
        Value::String(text) => {
            Value::Array(text.split(',').map(|part| Value::String(part.trim().to_string())).collect())
        },
        other => Value::Array(vec![other.clone()]),
    }
}
