use chrono::{TimeZone, Utc};
use lead_extract::*;

const B4S: &[u8] = include_bytes!("fixtures/b4s.eml");
const HOMECARE_MULTIPART: &[u8] = include_bytes!("fixtures/homecare_multipart.eml");
const RIGHTBIZ_HTML: &[u8] = include_bytes!("fixtures/rightbiz_html.eml");

fn fallback_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

// --- Headers ---

#[test]
fn test_decode_headers() {
    let email = decode_raw_email(StorageKey::new("inbox/b4s.eml"), B4S, fallback_time()).unwrap();

    assert_eq!(email.storage_key.as_str(), "inbox/b4s.eml");
    assert_eq!(
        email.sender,
        "BusinessesForSale.com <enquiries@businessesforsale.com>"
    );
    assert_eq!(email.subject, "Someone is interested in your listing BFS125");
    assert_eq!(
        email.received_at,
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap()
    );
    assert_eq!(email.body_parts.len(), 1);
    assert!(email.body_text().contains("Your listing ref:BFS125"));
}

#[test]
fn test_date_converted_to_utc() {
    let email = decode_raw_email(StorageKey::new("k"), RIGHTBIZ_HTML, fallback_time()).unwrap();
    assert_eq!(
        email.received_at,
        Utc.with_ymd_and_hms(2025, 2, 3, 13, 5, 10).unwrap()
    );
}

#[test]
fn test_missing_date_uses_receipt_time() {
    let email =
        decode_raw_email(StorageKey::new("k"), HOMECARE_MULTIPART, fallback_time()).unwrap();
    assert_eq!(email.received_at, fallback_time());
}

#[test]
fn test_unparseable_date_uses_receipt_time() {
    let raw = b"From: a@example.com\nSubject: hi\nDate: sometime yesterday\n\nbody";
    let email = decode_raw_email(StorageKey::new("k"), raw, fallback_time()).unwrap();
    assert_eq!(email.received_at, fallback_time());
}

#[test]
fn test_missing_from_is_error() {
    let raw = b"Subject: hi\n\nNo sender here";
    let err = decode_raw_email(StorageKey::new("k"), raw, fallback_time()).unwrap_err();
    assert!(matches!(err, LeadError::Decode(_)));
}

#[test]
fn test_missing_subject_is_empty() {
    let raw = b"From: a@example.com\n\nbody text";
    let email = decode_raw_email(StorageKey::new("k"), raw, fallback_time()).unwrap();
    assert!(email.subject.is_empty());
    assert_eq!(email.content().trim(), "body text");
}

// --- Bodies ---

#[test]
fn test_multipart_collects_plain_parts_skips_attachments() {
    let email =
        decode_raw_email(StorageKey::new("k"), HOMECARE_MULTIPART, fallback_time()).unwrap();

    assert_eq!(email.body_parts.len(), 2);
    let body = email.body_text();
    assert!(body.contains("Your Reference: HC778"));
    assert!(body.contains("Sent via homecare.co.uk"));
    assert!(!body.contains("<p>"));
    assert!(!body.contains("Attachment text"));
}

#[test]
fn test_html_only_message_is_stripped() {
    let email = decode_raw_email(StorageKey::new("k"), RIGHTBIZ_HTML, fallback_time()).unwrap();

    assert_eq!(email.body_parts.len(), 1);
    let body = email.body_text();
    assert!(body.starts_with("You have received a new enquiry."));
    assert!(body.contains("\nRef: RB150\n"));
    assert!(body.contains("\nRegards,\nRightbiz Team"));
    assert!(!body.contains('<'));
}

#[test]
fn test_decoded_email_detects_and_parses() {
    let email = decode_raw_email(StorageKey::new("k"), RIGHTBIZ_HTML, fallback_time()).unwrap();

    let detection = SourceDetector::builtin().unwrap().detect(&email);
    assert_eq!(detection.source, LeadSource::Rightbiz);

    let fields = ParserRegistry::builtin()
        .unwrap()
        .resolve(detection.source)
        .extract(&email);
    assert_eq!(fields.value(Field::Reference), Some("RB150"));
    assert_eq!(fields.value(Field::Telephone), Some("07700 900123"));
}
