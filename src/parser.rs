//! Per-source lead parsers
//!
//! A parser turns a [`RawEmail`] into [`RawFields`]. Missing fields are left
//! unset; deciding whether that matters is the validator's job.

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{LeadError, Result};
use crate::patterns::{self, FieldPatterns, SourceSpec};
use crate::types::{EmailAddress, Field, LeadSource, PersonName, RawEmail};

/// Confidence of a first-rule match; each later rule costs 0.1
const TOP_CONFIDENCE: f64 = 1.0;
const CONFIDENCE_STEP: f64 = 0.1;
const MIN_RULE_CONFIDENCE: f64 = 0.5;

/// Scale applied to everything the fallback parser finds
const FALLBACK_FACTOR: f64 = 0.5;
const BARE_EMAIL_CONFIDENCE: f64 = 0.25;

/// Markers a portal parser needs before it claims an email
const MIN_MARKERS: usize = 2;

/// A value captured by an extraction rule
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    pub value: String,
    /// Index of the rule that matched, in declared order
    pub rule: usize,
    pub confidence: f64,
}

impl FieldMatch {
    #[must_use]
    pub fn new(value: impl Into<String>, rule: usize) -> Self {
        let step = f64::from(u32::try_from(rule).unwrap_or(u32::MAX));
        Self {
            value: value.into(),
            rule,
            confidence: CONFIDENCE_STEP.mul_add(-step, TOP_CONFIDENCE).max(MIN_RULE_CONFIDENCE),
        }
    }

    #[must_use]
    pub fn scaled(mut self, factor: f64) -> Self {
        self.confidence *= factor;
        self
    }
}

/// Contact fields as matched, before validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactMatches {
    pub first_name: Option<FieldMatch>,
    pub last_name: Option<FieldMatch>,
    pub email: Option<FieldMatch>,
    pub telephone: Option<FieldMatch>,
    pub mobile: Option<FieldMatch>,
}

/// Everything a parser extracted from one email
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFields {
    pub reference: Option<FieldMatch>,
    pub contact: ContactMatches,
    pub custom: BTreeMap<String, String>,
}

impl RawFields {
    #[must_use]
    pub const fn get(&self, field: Field) -> Option<&FieldMatch> {
        match field {
            Field::Reference => self.reference.as_ref(),
            Field::FirstName => self.contact.first_name.as_ref(),
            Field::LastName => self.contact.last_name.as_ref(),
            Field::Email => self.contact.email.as_ref(),
            Field::Telephone => self.contact.telephone.as_ref(),
            Field::Mobile => self.contact.mobile.as_ref(),
        }
    }

    #[must_use]
    pub fn value(&self, field: Field) -> Option<&str> {
        self.get(field).map(|m| m.value.as_str())
    }

    /// Extraction confidence for every field that matched
    #[must_use]
    pub fn confidence(&self) -> BTreeMap<Field, f64> {
        [
            Field::Reference,
            Field::FirstName,
            Field::LastName,
            Field::Email,
            Field::Telephone,
            Field::Mobile,
        ]
        .into_iter()
        .filter_map(|field| self.get(field).map(|m| (field, m.confidence)))
        .collect()
    }
}

/// Email plus the text the rules run over
#[derive(Debug)]
pub struct ParseContext<'a> {
    pub email: &'a RawEmail,
    /// Subject line followed by the cleaned body
    pub text: String,
}

impl<'a> ParseContext<'a> {
    #[must_use]
    pub fn new(email: &'a RawEmail) -> Self {
        Self {
            email,
            text: email.content(),
        }
    }
}

/// Extraction capabilities shared by every parser
pub trait LeadParser: Send + Sync + fmt::Debug {
    /// Identity recorded on produced leads
    fn name(&self) -> &'static str;

    fn source(&self) -> LeadSource;

    /// Whether the email looks like something this parser understands
    fn can_parse(&self, email: &RawEmail) -> bool;

    fn extract_reference(&self, ctx: &ParseContext<'_>) -> Option<FieldMatch>;

    fn extract_contact(&self, ctx: &ParseContext<'_>) -> ContactMatches;

    fn extract_custom_fields(&self, _ctx: &ParseContext<'_>) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Run every extraction step. Never fails; unmatched fields stay unset.
    fn extract(&self, email: &RawEmail) -> RawFields {
        let ctx = ParseContext::new(email);
        RawFields {
            reference: self.extract_reference(&ctx),
            contact: self.extract_contact(&ctx),
            custom: self.extract_custom_fields(&ctx),
        }
    }
}

fn compile(owner: &str, rule: &str) -> Result<Regex> {
    Regex::new(&format!("(?im){rule}")).map_err(|e| LeadError::pattern(owner, e))
}

fn compile_all(owner: &str, rules: &[&str]) -> Result<Vec<Regex>> {
    rules.iter().map(|rule| compile(owner, rule)).collect()
}

/// Compiled form of [`FieldPatterns`]
#[derive(Debug, Clone)]
pub struct PatternSet {
    reference: Vec<Regex>,
    full_name: Vec<Regex>,
    first_name: Vec<Regex>,
    last_name: Vec<Regex>,
    email: Vec<Regex>,
    telephone: Vec<Regex>,
    mobile: Vec<Regex>,
    custom: Vec<(String, Regex)>,
}

impl PatternSet {
    pub fn compile(owner: &str, patterns: &FieldPatterns) -> Result<Self> {
        Ok(Self {
            reference: compile_all(owner, patterns.reference)?,
            full_name: compile_all(owner, patterns.full_name)?,
            first_name: compile_all(owner, patterns.first_name)?,
            last_name: compile_all(owner, patterns.last_name)?,
            email: compile_all(owner, patterns.email)?,
            telephone: compile_all(owner, patterns.telephone)?,
            mobile: compile_all(owner, patterns.mobile)?,
            custom: patterns
                .custom
                .iter()
                .map(|(key, rule)| Ok(((*key).to_string(), compile(owner, rule)?)))
                .collect::<Result<_>>()?,
        })
    }

    /// First rule, in declared order, that captures a non-blank value.
    #[must_use]
    pub fn first_match(rules: &[Regex], text: &str) -> Option<FieldMatch> {
        rules.iter().enumerate().find_map(|(index, rule)| {
            rule.captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().trim())
                .find(|v| !v.is_empty())
                .map(|v| FieldMatch::new(v, index))
        })
    }

    #[must_use]
    pub fn reference(&self, text: &str) -> Option<FieldMatch> {
        Self::first_match(&self.reference, text)
    }

    /// Name, email and phone fields. A full-name match is split into first
    /// name and remainder; separate first/last rules apply only without one.
    #[must_use]
    pub fn contact(&self, text: &str) -> ContactMatches {
        let (first_name, last_name) = match Self::first_match(&self.full_name, text) {
            Some(full) => {
                let name = PersonName::parse(&full.value);
                let part = |value: Option<String>| {
                    value.map(|value| FieldMatch {
                        value,
                        ..full.clone()
                    })
                };
                (part(name.first), part(name.last))
            }
            None => (
                Self::first_match(&self.first_name, text),
                Self::first_match(&self.last_name, text),
            ),
        };

        ContactMatches {
            first_name,
            last_name,
            email: Self::first_match(&self.email, text),
            telephone: Self::first_match(&self.telephone, text),
            mobile: Self::first_match(&self.mobile, text),
        }
    }

    #[must_use]
    pub fn custom(&self, text: &str) -> BTreeMap<String, String> {
        self.custom
            .iter()
            .filter_map(|(key, rule)| {
                Self::first_match(std::slice::from_ref(rule), text).map(|m| (key.clone(), m.value))
            })
            .collect()
    }
}

/// Pattern-driven parser for one known portal
#[derive(Debug, Clone)]
pub struct PortalParser {
    source: LeadSource,
    name: &'static str,
    markers: Vec<Regex>,
    patterns: PatternSet,
}

impl PortalParser {
    pub fn new(
        source: LeadSource,
        name: &'static str,
        markers: &[&str],
        patterns: &FieldPatterns,
    ) -> Result<Self> {
        Ok(Self {
            source,
            name,
            markers: compile_all(name, markers)?,
            patterns: PatternSet::compile(name, patterns)?,
        })
    }

    pub fn from_spec(spec: &SourceSpec) -> Result<Self> {
        Self::new(spec.source, spec.parser, spec.markers, &spec.fields)
    }

    /// Parsers for every catalogued source
    pub fn catalogue() -> Result<Vec<Self>> {
        patterns::CATALOGUE.iter().map(Self::from_spec).collect()
    }
}

impl LeadParser for PortalParser {
    fn name(&self) -> &'static str {
        self.name
    }

    fn source(&self) -> LeadSource {
        self.source
    }

    fn can_parse(&self, email: &RawEmail) -> bool {
        let content = email.content();
        let needed = MIN_MARKERS.min(self.markers.len()).max(1);
        self.markers.iter().filter(|m| m.is_match(&content)).count() >= needed
    }

    fn extract_reference(&self, ctx: &ParseContext<'_>) -> Option<FieldMatch> {
        self.patterns.reference(&ctx.text)
    }

    fn extract_contact(&self, ctx: &ParseContext<'_>) -> ContactMatches {
        self.patterns.contact(&ctx.text)
    }

    fn extract_custom_fields(&self, ctx: &ParseContext<'_>) -> BTreeMap<String, String> {
        self.patterns.custom(&ctx.text)
    }
}

/// Source-agnostic parser for emails no portal parser claims.
///
/// Uses line-prefix rules, then a bare address scan that skips the sender's
/// own address. Everything it finds carries reduced confidence.
#[derive(Debug, Clone)]
pub struct FallbackParser {
    patterns: PatternSet,
    bare_email: Regex,
}

impl FallbackParser {
    pub const NAME: &'static str = "generic";

    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: PatternSet::compile(Self::NAME, &patterns::GENERIC)?,
            bare_email: Regex::new(patterns::BARE_EMAIL)
                .map_err(|e| LeadError::pattern(Self::NAME, e))?,
        })
    }

    fn scan_email(&self, ctx: &ParseContext<'_>) -> Option<FieldMatch> {
        let sender = ctx.email.sender_address().map(|a| a.address.to_lowercase());
        self.bare_email
            .find_iter(&ctx.text)
            .map(|m| m.as_str())
            .find(|candidate| {
                let parsed = EmailAddress::parse(candidate).map(|a| a.address.to_lowercase());
                parsed.is_some() && parsed != sender
            })
            .map(|address| FieldMatch {
                value: address.to_string(),
                rule: 0,
                confidence: BARE_EMAIL_CONFIDENCE,
            })
    }
}

impl LeadParser for FallbackParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn source(&self) -> LeadSource {
        LeadSource::Unknown
    }

    fn can_parse(&self, _email: &RawEmail) -> bool {
        true
    }

    fn extract_reference(&self, ctx: &ParseContext<'_>) -> Option<FieldMatch> {
        self.patterns
            .reference(&ctx.text)
            .map(|m| m.scaled(FALLBACK_FACTOR))
    }

    fn extract_contact(&self, ctx: &ParseContext<'_>) -> ContactMatches {
        let scale = |m: Option<FieldMatch>| m.map(|m| m.scaled(FALLBACK_FACTOR));
        let found = self.patterns.contact(&ctx.text);
        ContactMatches {
            first_name: scale(found.first_name),
            last_name: scale(found.last_name),
            email: scale(found.email).or_else(|| self.scan_email(ctx)),
            telephone: scale(found.telephone),
            mobile: scale(found.mobile),
        }
    }
}
