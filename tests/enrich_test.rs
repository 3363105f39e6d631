use chrono::{TimeZone, Utc};
use lead_extract::*;
use std::collections::BTreeMap;

fn b4s_email() -> RawEmail {
    RawEmail::new(
        StorageKey::new("inbox/b4s.eml"),
        "BusinessesForSale.com <enquiries@businessesforsale.com>",
        "Someone is interested in your listing BFS125",
        vec![
            "BusinessesForSale.com has received the following message for you.\n\n\
             Your listing ref:BFS125 Leading Oakhouse Foods Franchise\n\
             Name: dildo baggins\n\
             Email: dildo.baggins@example.com\n\
             Tel: 12 34\n\n\
             Reply directly to this email to respond."
                .to_string(),
        ],
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap(),
    )
}

// --- Quality score ---

#[test]
fn test_quality_score_counts_only_scored_valid_fields() {
    let status = BTreeMap::from([
        (Field::Reference, FieldStatus::Valid),
        (Field::Email, FieldStatus::Valid),
        (Field::Telephone, FieldStatus::Invalid),
        (Field::Mobile, FieldStatus::Valid),
    ]);
    assert!((quality_score(&status) - 0.4).abs() < 1e-9);
}

#[test]
fn test_quality_score_empty() {
    assert!(quality_score(&BTreeMap::new()).abs() < f64::EPSILON);
}

// --- Record assembly ---

#[test]
fn test_enrich_attaches_metadata() {
    let email = b4s_email();
    let detection = SourceDetector::builtin().unwrap().detect(&email);
    let registry = ParserRegistry::builtin().unwrap();
    let parser = registry.resolve(detection.source);
    let raw = parser.extract(&email);
    let lead = Validator::new(ValidationConfig::default())
        .unwrap()
        .validate(&raw)
        .unwrap();
    let processed_at = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();

    let record = enrich(&email, &detection, parser.name(), &raw, lead, processed_at);

    assert_eq!(record.lead_source, LeadSource::BusinessesForSale);
    assert_eq!(record.reference.as_deref(), Some("BFS125"));
    assert_eq!(record.sender, "enquiries@businessesforsale.com");
    assert_eq!(record.received_at, email.received_at);
    assert_eq!(record.storage_key.as_str(), "inbox/b4s.eml");
    assert!(record.raw_body.contains("Tel: 12 34"));

    let metadata = &record.metadata;
    assert_eq!(metadata.parser, parser.name());
    assert_eq!(metadata.processed_at, processed_at);
    assert_eq!(metadata.detection_score, detection.score);
    assert_eq!(metadata.source_display_name, "BusinessesForSale.com");
    assert_eq!(metadata.source_category, "business_marketplace");
    // reference, names and email valid; the short telephone is not
    assert!((metadata.quality_score - 0.8).abs() < 1e-9);
    assert_eq!(record.invalid_fields(), vec![Field::Telephone]);
    assert_eq!(metadata.warnings.len(), 1);
    assert_eq!(metadata.warnings[0].rule, Rule::PhoneTooShort);
    assert!(metadata.confidence.contains_key(&Field::Reference));
    assert_eq!(
        metadata.custom_fields.get("listing_title").map(String::as_str),
        Some("Leading Oakhouse Foods Franchise")
    );
}
