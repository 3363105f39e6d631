// Enforce at crate level
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![allow(clippy::significant_drop_tightening)]

//! Lead Extraction
//!
//! Turns enquiry emails from business-listing portals into validated lead
//! records and forwards each one to a queue exactly once.
//!
//! # Features
//!
//! - Source detection that needs corroborating evidence before naming a portal
//! - Per-portal parsers with ordered, first-match extraction rules
//! - Generic fallback parser so unrecognised emails are not dropped
//! - Validation that blanks bad fields instead of discarding the lead
//! - Retry and circuit breaking around every storage and queue call
//! - Delete-after-publish ordering with deterministic message ids
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use lead_extract::{ParserRegistry, RawEmail, SourceDetector, StorageKey, Validator, ValidationConfig};
//!
//! let email = RawEmail::new(
//!     StorageKey::new("inbox/1.eml"),
//!     "BusinessesForSale.com <enquiries@businessesforsale.com>",
//!     "Someone is interested in your listing",
//!     vec!["Your listing ref:BFS125 Leading Oakhouse Foods Franchise\nName: dildo baggins\nEmail: dildo@example.com".into()],
//!     Utc::now(),
//! );
//!
//! let detection = SourceDetector::builtin().unwrap().detect(&email);
//! let registry = ParserRegistry::builtin().unwrap();
//! let fields = registry.resolve(detection.source).extract(&email);
//! let lead = Validator::new(ValidationConfig::default()).unwrap().validate(&fields).unwrap();
//!
//! println!("Source: {}", detection.source);
//! println!("Reference: {:?}", lead.reference);
//! println!("Name: {:?} {:?}", lead.contact.first_name, lead.contact.last_name);
//! ```

mod boundary;
mod config;
mod detect;
mod enrich;
mod error;
mod mime;
mod parser;
pub mod patterns;
mod pipeline;
mod registry;
mod resilience;
mod types;
mod validate;

pub use boundary::{LeadMessage, LeadQueue, ObjectStore};
pub use config::{CircuitConfig, EnvMsDuration, PipelineConfig, RetryConfig};
pub use detect::{
    Channel, DetectionOutcome, DetectionPolicy, DetectionResult, Evidence, SourceDetector,
};
pub use enrich::{enrich, quality_score};
pub use error::{BoundaryError, LeadError, ResilienceError, Result};
pub use mime::decode_raw_email;
pub use parser::{
    ContactMatches, FallbackParser, FieldMatch, LeadParser, ParseContext, PatternSet,
    PortalParser, RawFields,
};
pub use pipeline::{DRY_RUN_RECEIPT, DegradedReason, Delivery, LeadPipeline, Outcome, RejectReason};
pub use registry::ParserRegistry;
pub use resilience::{
    Backoff, CircuitBreaker, CircuitPolicy, CircuitState, OperationClass, Permit, Resilience,
    RetryPolicy,
};
pub use types::*;
pub use validate::{
    Rule, Severity, ValidatedLead, ValidationConfig, ValidationFailure, Validator, Violation,
    normalize_name,
};
