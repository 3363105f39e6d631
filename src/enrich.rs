//! Lead enrichment: quality score and processing metadata

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::detect::DetectionResult;
use crate::parser::RawFields;
use crate::types::{Field, FieldStatus, LeadRecord, ProcessingMetadata, RawEmail};
use crate::validate::ValidatedLead;

/// Fraction of [`Field::SCORED`] fields that are present and valid
#[must_use]
pub fn quality_score(field_status: &BTreeMap<Field, FieldStatus>) -> f64 {
    let valid = Field::SCORED
        .iter()
        .filter(|f| field_status.get(*f) == Some(&FieldStatus::Valid))
        .count();
    let valid = u32::try_from(valid).unwrap_or(u32::MAX);
    let total = u32::try_from(Field::SCORED.len()).unwrap_or(u32::MAX);
    f64::from(valid) / f64::from(total)
}

/// Assemble the final lead record. Pure; the caller supplies the clock.
#[must_use]
pub fn enrich(
    email: &RawEmail,
    detection: &DetectionResult,
    parser: &str,
    raw: &RawFields,
    lead: ValidatedLead,
    processed_at: DateTime<Utc>,
) -> LeadRecord {
    let source = detection.source;
    let metadata = ProcessingMetadata {
        parser: parser.to_string(),
        quality_score: quality_score(&lead.field_status),
        processed_at,
        detection_score: detection.score,
        source_display_name: source.display_name().to_string(),
        source_category: source.category().to_string(),
        field_status: lead.field_status,
        confidence: raw.confidence(),
        custom_fields: raw.custom.clone(),
        warnings: lead.warnings,
    };

    LeadRecord {
        lead_source: source,
        reference: lead.reference,
        contact: lead.contact,
        sender: email.sender_key(),
        received_at: email.received_at,
        storage_key: email.storage_key.clone(),
        raw_body: email.body_text(),
        metadata,
    }
}
