use chrono::{TimeZone, Utc};
use lead_extract::*;

fn received() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap()
}

// --- MessageId ---

#[test]
fn test_message_id_is_deterministic() {
    let a = MessageId::derive(
        LeadSource::BusinessesForSale,
        Some("BFS125"),
        "enquiries@businessesforsale.com",
        received(),
    );
    let b = MessageId::derive(
        LeadSource::BusinessesForSale,
        Some("BFS125"),
        "enquiries@businessesforsale.com",
        received(),
    );
    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), 64);
    assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_message_id_ignores_sender_case() {
    let a = MessageId::derive(LeadSource::Rightbiz, Some("RB1"), "Info@Rightbiz.co.uk", received());
    let b = MessageId::derive(LeadSource::Rightbiz, Some("RB1"), "info@rightbiz.co.uk", received());
    assert_eq!(a, b);
}

#[test]
fn test_message_id_changes_with_reference() {
    let a = MessageId::derive(LeadSource::Rightbiz, Some("RB1"), "info@rightbiz.co.uk", received());
    let b = MessageId::derive(LeadSource::Rightbiz, Some("RB2"), "info@rightbiz.co.uk", received());
    let c = MessageId::derive(LeadSource::Rightbiz, None, "info@rightbiz.co.uk", received());
    assert_ne!(a, b);
    assert_ne!(a, c);
}

// --- LeadSource ---

#[test]
fn test_lead_source_ids() {
    assert_eq!(LeadSource::BusinessesForSale.as_str(), "b4s");
    assert_eq!(LeadSource::RegisterInterest.to_string(), "registerinterest");
    assert_eq!(
        serde_json::to_string(&LeadSource::Unknown).unwrap(),
        "\"unknown\""
    );
}

#[test]
fn test_lead_source_catalogue() {
    assert!(LeadSource::KNOWN.iter().all(|s| s.is_known()));
    assert!(!LeadSource::Unknown.is_known());
    assert_eq!(LeadSource::Daltons.category(), "business_broker");
    assert_eq!(LeadSource::Unknown.display_name(), "Unknown");
}

// --- EmailAddress ---

#[test]
fn test_email_address_with_name() {
    let addr = EmailAddress::parse("\"Rightbiz Enquiry\" <Info@RightBiz.co.uk>").unwrap();
    assert_eq!(addr.name.as_deref(), Some("Rightbiz Enquiry"));
    assert_eq!(addr.address, "Info@rightbiz.co.uk");
    assert_eq!(addr.domain, "rightbiz.co.uk");
    assert_eq!(addr.local_part, "Info");
}

#[test]
fn test_email_address_plain() {
    let addr = EmailAddress::parse("  someone@example.com ").unwrap();
    assert!(addr.name.is_none());
    assert_eq!(addr.to_string(), "someone@example.com");
}

#[test]
fn test_email_address_invalid() {
    assert!(EmailAddress::parse("not an address").is_none());
    assert!(EmailAddress::parse("@example.com").is_none());
    assert!(EmailAddress::parse("a@b@c").is_none());
}

#[test]
fn test_email_address_subdomain() {
    let addr = EmailAddress::parse("noreply@mail.homecare.co.uk").unwrap();
    assert!(addr.is_from_domain("homecare.co.uk"));
    assert!(addr.is_from_domain("HOMECARE.co.uk"));
    assert!(!addr.is_from_domain("care.co.uk"));
}

// --- PersonName ---

#[test]
fn test_person_name_split() {
    let name = PersonName::parse("Dildo Baggins");
    assert_eq!(name.first.as_deref(), Some("Dildo"));
    assert_eq!(name.last.as_deref(), Some("Baggins"));
}

#[test]
fn test_person_name_remainder_is_last() {
    let name = PersonName::parse("Anna Maria de Souza");
    assert_eq!(name.first.as_deref(), Some("Anna"));
    assert_eq!(name.last.as_deref(), Some("Maria de Souza"));
}

#[test]
fn test_person_name_single_and_empty() {
    let single = PersonName::parse("Madonna");
    assert_eq!(single.first.as_deref(), Some("Madonna"));
    assert!(single.last.is_none());

    let empty = PersonName::parse("   ");
    assert!(empty.first.is_none());
    assert!(empty.last.is_none());
}

// --- RawEmail ---

#[test]
fn test_raw_email_content() {
    let email = RawEmail::new(
        StorageKey::new("k"),
        "Portal <portal@example.com>",
        "New enquiry",
        vec!["*Name:* Dildo\r\nTel: 1".into(), "second".into()],
        received(),
    );
    assert_eq!(email.body_text(), "Name: Dildo\nTel: 1\nsecond");
    assert_eq!(email.content(), "Subject: New enquiry\nName: Dildo\nTel: 1\nsecond");
    assert_eq!(email.sender_key(), "portal@example.com");
}

#[test]
fn test_raw_email_without_subject() {
    let email = RawEmail::new(StorageKey::new("k"), "x", "  ", vec!["body".into()], received());
    assert_eq!(email.content(), "body");
    assert_eq!(email.sender_key(), "x");
}
