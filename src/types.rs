//! Core types for inbound emails and lead records

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::validate::Violation;

/// Opaque object-store key identifying the raw email
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(pub String);

impl StorageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic message identifier handed to the queue's deduplication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    /// Derive the id from the lead's deduplication key.
    ///
    /// Hex SHA-256 over `source|reference|sender|receipt`, so re-delivery of
    /// the same stored email always yields the same id.
    #[must_use]
    pub fn derive(
        source: LeadSource,
        reference: Option<&str>,
        sender: &str,
        received_at: DateTime<Utc>,
    ) -> Self {
        let key = format!(
            "{}|{}|{}|{}",
            source.as_str(),
            reference.unwrap_or(""),
            sender.trim().to_lowercase(),
            received_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        Self(hex::encode(Sha256::digest(key.as_bytes())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Portal that originated an enquiry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LeadSource {
    #[serde(rename = "rightbiz")]
    Rightbiz,
    #[serde(rename = "daltons")]
    Daltons,
    #[serde(rename = "homecare")]
    Homecare,
    #[serde(rename = "b4s")]
    BusinessesForSale,
    #[serde(rename = "nda")]
    Nda,
    #[serde(rename = "registerinterest")]
    RegisterInterest,
    #[serde(rename = "unknown")]
    Unknown,
}

impl LeadSource {
    /// Every named source, in detection order
    pub const KNOWN: [Self; 6] = [
        Self::Rightbiz,
        Self::Daltons,
        Self::Homecare,
        Self::BusinessesForSale,
        Self::Nda,
        Self::RegisterInterest,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rightbiz => "rightbiz",
            Self::Daltons => "daltons",
            Self::Homecare => "homecare",
            Self::BusinessesForSale => "b4s",
            Self::Nda => "nda",
            Self::RegisterInterest => "registerinterest",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Rightbiz => "RightBiz",
            Self::Daltons => "Daltons Business",
            Self::Homecare => "Homecare.co.uk",
            Self::BusinessesForSale => "BusinessesForSale.com",
            Self::Nda => "NDA Submission",
            Self::RegisterInterest => "Register Interest",
            Self::Unknown => "Unknown",
        }
    }

    #[must_use]
    pub const fn category(self) -> &'static str {
        match self {
            Self::Rightbiz | Self::BusinessesForSale => "business_marketplace",
            Self::Daltons => "business_broker",
            Self::Homecare => "franchise_portal",
            Self::Nda | Self::RegisterInterest => "direct_inquiry",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for LeadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound email as delivered by the event source. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawEmail {
    /// Key of the stored raw object
    pub storage_key: StorageKey,

    /// `From` header value, possibly `Name <addr>`
    pub sender: String,

    /// Subject line
    pub subject: String,

    /// Plain-text body parts, in message order
    pub body_parts: Vec<String>,

    /// When the message was received
    pub received_at: DateTime<Utc>,
}

impl RawEmail {
    pub fn new(
        storage_key: StorageKey,
        sender: impl Into<String>,
        subject: impl Into<String>,
        body_parts: Vec<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            storage_key,
            sender: sender.into(),
            subject: subject.into(),
            body_parts,
            received_at,
        }
    }

    /// Parsed sender address, if the header holds one
    #[must_use]
    pub fn sender_address(&self) -> Option<EmailAddress> {
        EmailAddress::parse(&self.sender)
    }

    /// Address used in the deduplication key
    #[must_use]
    pub fn sender_key(&self) -> String {
        self.sender_address()
            .map_or_else(|| self.sender.trim().to_string(), |a| a.address)
    }

    /// Body parts joined with line breaks normalised and `*` emphasis removed
    #[must_use]
    pub fn body_text(&self) -> String {
        self.body_parts
            .iter()
            .map(|part| part.replace("\r\n", "\n").replace('*', ""))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Text scanned by the parsers: a `Subject:` line followed by the body
    #[must_use]
    pub fn content(&self) -> String {
        let body = self.body_text();
        if self.subject.trim().is_empty() {
            body
        } else {
            format!("Subject: {}\n{}", self.subject.trim(), body)
        }
    }
}

/// Email address with optional display name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Display name (e.g., "Rightbiz Enquiry")
    pub name: Option<String>,

    /// Email address (e.g., "info@rightbiz.co.uk")
    pub address: String,

    /// Domain, lower-cased
    pub domain: String,

    /// Local part (before @)
    pub local_part: String,
}

impl EmailAddress {
    /// Parse an address from a header value
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();

        // "Name <email@domain.com>"
        if let Some(start) = s.find('<')
            && let Some(end) = s[start..].find('>').map(|e| start + e)
        {
            let name_part = s[..start].trim().trim_matches('"').trim();
            let address = s[start + 1..end].trim();
            let mut parsed = Self::plain(address)?;
            parsed.name = (!name_part.is_empty()).then(|| name_part.to_string());
            return Some(parsed);
        }

        Self::plain(s)
    }

    fn plain(s: &str) -> Option<Self> {
        let (local, domain) = s.split_once('@')?;
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return None;
        }
        let domain = domain.to_lowercase();
        Some(Self {
            name: None,
            address: format!("{local}@{domain}"),
            local_part: local.to_string(),
            domain,
        })
    }

    /// True when the domain is `domain` or one of its subdomains
    #[must_use]
    pub fn is_from_domain(&self, domain: &str) -> bool {
        let domain = domain.to_lowercase();
        self.domain == domain || self.domain.ends_with(&format!(".{domain}"))
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

/// Person name split into first name and the remainder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonName {
    /// First name (if present)
    pub first: Option<String>,

    /// Everything after the first word
    pub last: Option<String>,
}

impl PersonName {
    /// Split a full-name string on whitespace
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let s = s.trim().trim_matches('"');
        let parts: Vec<&str> = s.split_whitespace().collect();

        match parts.as_slice() {
            [] => Self {
                first: None,
                last: None,
            },
            [only] => Self {
                first: Some((*only).to_string()),
                last: None,
            },
            [first, rest @ ..] => Self {
                first: Some((*first).to_string()),
                last: Some(rest.join(" ")),
            },
        }
    }
}

/// Logical lead fields tracked through extraction and validation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Reference,
    FirstName,
    LastName,
    Email,
    Telephone,
    Mobile,
}

impl Field {
    /// Fields counted by the quality score
    pub const SCORED: [Self; 5] = [
        Self::Reference,
        Self::FirstName,
        Self::LastName,
        Self::Email,
        Self::Telephone,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Email => "email",
            Self::Telephone => "telephone",
            Self::Mobile => "mobile",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation verdict for one field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Valid,
    Missing,
    /// Present but failed its rule; the value was blanked
    Invalid,
}

/// Normalised contact details
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactInfo {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    pub mobile: Option<String>,
}

/// Processing details attached by the enricher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingMetadata {
    /// Identity of the parser that produced the raw fields
    pub parser: String,

    /// Fraction of scored fields present and valid, in [0, 1]
    pub quality_score: f64,

    /// When enrichment ran
    pub processed_at: DateTime<Utc>,

    /// Indicators matched for the detected source
    pub detection_score: u32,

    pub source_display_name: String,
    pub source_category: String,

    /// Per-field validation verdicts
    pub field_status: BTreeMap<Field, FieldStatus>,

    /// Per-field extraction confidence, for fields that matched a rule
    pub confidence: BTreeMap<Field, f64>,

    /// Source-specific extras (listing title, ...)
    pub custom_fields: BTreeMap<String, String>,

    /// Non-fatal validation findings
    pub warnings: Vec<Violation>,
}

/// Validated, enriched lead: the unit handed to the publish boundary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeadRecord {
    pub lead_source: LeadSource,
    pub reference: Option<String>,
    pub contact: ContactInfo,
    pub sender: String,
    pub received_at: DateTime<Utc>,
    pub storage_key: StorageKey,

    /// Body retained for audit
    pub raw_body: String,

    pub metadata: ProcessingMetadata,
}

impl LeadRecord {
    /// Deduplication id for the publish boundary
    #[must_use]
    pub fn message_id(&self) -> MessageId {
        MessageId::derive(
            self.lead_source,
            self.reference.as_deref(),
            &self.sender,
            self.received_at,
        )
    }

    /// Fields that were present but failed validation
    #[must_use]
    pub fn invalid_fields(&self) -> Vec<Field> {
        self.metadata
            .field_status
            .iter()
            .filter(|(_, status)| **status == FieldStatus::Invalid)
            .map(|(field, _)| *field)
            .collect()
    }
}
