//! Field mapping engine.
//!
//! Turns heterogeneous inbound lead payloads into one canonical contact
//! record using declarative, typed field rules. Rules name the raw keys to
//! probe, the target type, and optional validators and lookup tables.
//!
//! ```
//! use leadrelay_mapping::FieldMapper;
//! use serde_json::json;
//!
//! let raw = json!({
//!     "first_name": "Jane",
//!     "last_name": "Roe",
//!     "email": "jane@example.com",
//!     "phone": "555-123-4567",
//!     "state": "Texas"
//! });
//!
//! let result = FieldMapper::new().map(raw.as_object().unwrap());
//! assert!(result.is_valid());
//! assert_eq!(result.get("phone").unwrap(), "(555) 123-4567");
//! assert_eq!(result.get("state").unwrap(), "TX");
//! ```

#![forbid(unsafe_code)]

pub mod defaults;
pub mod error;
pub mod mapper;
pub mod overrides;
pub mod rules;
pub mod schema;
pub mod transforms;
pub mod validators;

pub use defaults::default_rules;
pub use error::RuleConfigError;
pub use mapper::{FieldMapper, MappingError, MappingErrorKind, MappingMetadata, MappingResult};
pub use overrides::{FieldRuleOverride, OverrideReport, RuleOverrides};
pub use rules::{CategoryRules, FieldKind, FieldRule, FieldType, RuleSet};
pub use schema::MappingSchema;
pub use transforms::Transformation;
pub use validators::{format_phone_number, Validation};
