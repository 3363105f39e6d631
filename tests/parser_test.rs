use chrono::{TimeZone, Utc};
use lead_extract::*;
use std::sync::Arc;

fn email(sender: &str, subject: &str, body: &str) -> RawEmail {
    RawEmail::new(
        StorageKey::new("inbox/test.eml"),
        sender,
        subject,
        vec![body.to_string()],
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap(),
    )
}

fn b4s_email() -> RawEmail {
    email(
        "BusinessesForSale.com <enquiries@businessesforsale.com>",
        "Someone is interested in your listing BFS125",
        "BusinessesForSale.com has received the following message for you.\n\n\
         Your listing ref:BFS125 Leading Oakhouse Foods Franchise\n\
         Name: dildo baggins\n\
         Email: dildo.baggins@example.com\n\
         Tel: +44 1234567890\n\n\
         Reply directly to this email to respond.",
    )
}

fn rightbiz_email() -> RawEmail {
    email(
        "Rightbiz <info@rightbiz.co.uk>",
        "New Enquiry for RB150 from Sandeep Shah",
        "You have received a new enquiry.\n\n\
         Ref: RB150\n\
         Name: Sandeep Shah\n\
         Email: sandeep.shah@example.co.uk\n\
         Telephone: 07700 900123\n\n\
         Regards,\nRightbiz Team",
    )
}

fn parser_for(source: LeadSource) -> Arc<dyn LeadParser> {
    ParserRegistry::builtin().unwrap().resolve(source).clone()
}

// --- Portal parsers ---

#[test]
fn test_businesses_for_sale_extraction() {
    let fields = parser_for(LeadSource::BusinessesForSale).extract(&b4s_email());

    assert_eq!(fields.value(Field::Reference), Some("BFS125"));
    assert_eq!(fields.value(Field::FirstName), Some("dildo"));
    assert_eq!(fields.value(Field::LastName), Some("baggins"));
    assert_eq!(fields.value(Field::Email), Some("dildo.baggins@example.com"));
    assert_eq!(fields.value(Field::Telephone), Some("+44 1234567890"));
    assert_eq!(fields.value(Field::Mobile), None);
    assert_eq!(
        fields.custom.get("listing_title").map(String::as_str),
        Some("Leading Oakhouse Foods Franchise")
    );
}

#[test]
fn test_rightbiz_extraction() {
    let fields = parser_for(LeadSource::Rightbiz).extract(&rightbiz_email());

    assert_eq!(fields.value(Field::Reference), Some("RB150"));
    assert_eq!(fields.value(Field::FirstName), Some("Sandeep"));
    assert_eq!(fields.value(Field::LastName), Some("Shah"));
    assert_eq!(fields.value(Field::Email), Some("sandeep.shah@example.co.uk"));
    assert_eq!(fields.value(Field::Telephone), Some("07700 900123"));
    assert!(fields.custom.is_empty());
}

#[test]
fn test_rightbiz_name_from_subject() {
    let email = email(
        "Rightbiz <info@rightbiz.co.uk>",
        "New Enquiry for RB150 from Sandeep Shah",
        "Ref: RB150\nEmail: sandeep.shah@example.co.uk\nRightbiz Team",
    );

    let fields = parser_for(LeadSource::Rightbiz).extract(&email);
    let first = fields.get(Field::FirstName).unwrap();

    assert_eq!(first.value, "Sandeep");
    assert_eq!(first.rule, 1);
    assert!((first.confidence - 0.9).abs() < 1e-9);
    assert_eq!(fields.value(Field::LastName), Some("Shah"));
}

#[test]
fn test_daltons_extraction() {
    let email = email(
        "DaltonsBusiness <noreply@daltonssupportmail.com>",
        "DaltonsBusiness enquiry - Business Ref.: DAL4521",
        "More Details are required for business with reference: DAL4521\n\n\
         Contact details:- Name : Bilbo Daggins\n\
         Email Address : bilbo@example.org\n\
         Contact Phone : 01632 960001",
    );

    let fields = parser_for(LeadSource::Daltons).extract(&email);

    assert_eq!(fields.value(Field::Reference), Some("DAL4521"));
    assert_eq!(fields.value(Field::FirstName), Some("Bilbo"));
    assert_eq!(fields.value(Field::LastName), Some("Daggins"));
    assert_eq!(fields.value(Field::Email), Some("bilbo@example.org"));
    assert_eq!(fields.value(Field::Telephone), Some("01632 960001"));
}

#[test]
fn test_homecare_separate_name_fields() {
    let email = email(
        "homecare.co.uk <enquiries@homecare.co.uk>",
        "New enquiry from homecare.co.uk",
        "Your Reference: HC778\n\
         First Name: frodo\n\
         Last Name: baggins\n\
         Email Address: frodo@example.net\n\
         Telephone Number: 01632 960555",
    );

    let fields = parser_for(LeadSource::Homecare).extract(&email);

    assert_eq!(fields.value(Field::Reference), Some("HC778"));
    assert_eq!(fields.value(Field::FirstName), Some("frodo"));
    assert_eq!(fields.value(Field::LastName), Some("baggins"));
    assert_eq!(fields.value(Field::Email), Some("frodo@example.net"));
    assert_eq!(fields.value(Field::Telephone), Some("01632 960555"));
}

#[test]
fn test_first_rule_wins_confidence() {
    let fields = parser_for(LeadSource::BusinessesForSale).extract(&b4s_email());
    let confidence = fields.confidence();

    assert_eq!(confidence.len(), 5);
    assert!(confidence.values().all(|c| (*c - 1.0).abs() < f64::EPSILON));
}

#[test]
fn test_missing_fields_stay_unset() {
    let email = email(
        "BusinessesForSale.com <enquiries@businessesforsale.com>",
        "Someone is interested in your listing",
        "Your listing ref:BFS9\nReply directly to this email",
    );

    let fields = parser_for(LeadSource::BusinessesForSale).extract(&email);

    assert_eq!(fields.value(Field::Reference), Some("BFS9"));
    assert!(fields.contact.first_name.is_none());
    assert!(fields.contact.email.is_none());
    assert!(fields.contact.telephone.is_none());
}

#[test]
fn test_every_catalogue_pattern_compiles() {
    let parsers = PortalParser::catalogue().unwrap();
    assert_eq!(parsers.len(), patterns::CATALOGUE.len());
    assert!(FallbackParser::new().is_ok());
}

#[test]
fn test_rule_confidence_decreases_with_order() {
    assert!((FieldMatch::new("x", 0).confidence - 1.0).abs() < f64::EPSILON);
    assert!((FieldMatch::new("x", 2).confidence - 0.8).abs() < 1e-9);
    assert!((FieldMatch::new("x", 9).confidence - 0.5).abs() < 1e-9);
}

// --- can_parse ---

#[test]
fn test_can_parse_own_source() {
    assert!(parser_for(LeadSource::BusinessesForSale).can_parse(&b4s_email()));
    assert!(parser_for(LeadSource::Rightbiz).can_parse(&rightbiz_email()));
}

#[test]
fn test_can_parse_rejects_other_source() {
    assert!(!parser_for(LeadSource::BusinessesForSale).can_parse(&rightbiz_email()));
    assert!(!parser_for(LeadSource::Homecare).can_parse(&b4s_email()));
}

// --- Fallback ---

#[test]
fn test_fallback_line_prefix_rules() {
    let email = email(
        "someone@gmail.com",
        "Business enquiry",
        "Hi,\nName: Peter Parker\nPhone: 020 7946 0000\nYou can reach me at peter.parker@example.com\nThanks",
    );

    let fallback = FallbackParser::new().unwrap();
    assert!(fallback.can_parse(&email));
    assert_eq!(fallback.source(), LeadSource::Unknown);

    let fields = fallback.extract(&email);

    assert_eq!(fields.value(Field::FirstName), Some("Peter"));
    assert_eq!(fields.value(Field::LastName), Some("Parker"));
    assert_eq!(fields.value(Field::Telephone), Some("020 7946 0000"));
    assert!((fields.get(Field::Telephone).unwrap().confidence - 0.5).abs() < 1e-9);

    let email_match = fields.get(Field::Email).unwrap();
    assert_eq!(email_match.value, "peter.parker@example.com");
    assert!((email_match.confidence - 0.25).abs() < 1e-9);
    assert!(fields.reference.is_none());
}

#[test]
fn test_fallback_bare_scan_skips_sender() {
    let email = email(
        "Someone <someone@gmail.com>",
        "Fwd: enquiry",
        "Sent by someone@gmail.com on behalf of\njane@example.org",
    );

    let fields = FallbackParser::new().unwrap().extract(&email);

    assert_eq!(fields.value(Field::Email), Some("jane@example.org"));
}

#[test]
fn test_fallback_labelled_email_preferred() {
    let email = email(
        "someone@gmail.com",
        "Enquiry",
        "Contact jane@example.org\nEmail: peter@example.com",
    );

    let fields = FallbackParser::new().unwrap().extract(&email);
    let found = fields.get(Field::Email).unwrap();

    assert_eq!(found.value, "peter@example.com");
    assert!((found.confidence - 0.5).abs() < 1e-9);
}

// --- Registry ---

#[derive(Debug)]
struct FixedParser;

impl LeadParser for FixedParser {
    fn name(&self) -> &'static str {
        "nda-inhouse"
    }

    fn source(&self) -> LeadSource {
        LeadSource::Nda
    }

    fn can_parse(&self, _email: &RawEmail) -> bool {
        true
    }

    fn extract_reference(&self, _ctx: &ParseContext<'_>) -> Option<FieldMatch> {
        Some(FieldMatch::new("NDA1", 0))
    }

    fn extract_contact(&self, _ctx: &ParseContext<'_>) -> ContactMatches {
        ContactMatches::default()
    }
}

#[test]
fn test_registry_builtin_sources() {
    let registry = ParserRegistry::builtin().unwrap();
    assert_eq!(registry.sources(), LeadSource::KNOWN.to_vec());
    assert!(registry.get(LeadSource::Unknown).is_none());
    assert_eq!(registry.resolve(LeadSource::Unknown).name(), FallbackParser::NAME);
    assert_eq!(registry.resolve(LeadSource::Daltons).name(), "daltons");
}

#[test]
fn test_registry_register_replaces() {
    let mut registry = ParserRegistry::builtin().unwrap();
    registry.register(Arc::new(FixedParser));

    let parser = registry.resolve(LeadSource::Nda);
    assert_eq!(parser.name(), "nda-inhouse");
    assert_eq!(parser.extract(&b4s_email()).value(Field::Reference), Some("NDA1"));
    assert_eq!(registry.sources().len(), LeadSource::KNOWN.len());
}

#[test]
fn test_registry_without_portal_parsers() {
    let registry = ParserRegistry::with_fallback(Arc::new(FallbackParser::new().unwrap()));
    assert!(registry.sources().is_empty());
    assert_eq!(registry.resolve(LeadSource::Rightbiz).name(), FallbackParser::NAME);
}
