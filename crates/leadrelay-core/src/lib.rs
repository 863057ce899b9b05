//! Shared primitives for the lead relay.
//!
//! Holds the clock abstraction used by the mapper and the retry engine, the
//! identifiers and raw-record types that flow between the relay and its
//! engines, the relay error taxonomy, and the lead scoring contract.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod scoring;
pub mod time;

pub use error::{RelayError, Result};
pub use models::{LeadSource, RawRecord, RequestId};
pub use scoring::{score_lead, LeadAssessment, Priority};
pub use time::{Clock, RealClock, TestClock};
