//! Field validation and normalisation
//!
//! Every rule is evaluated; nothing short-circuits on the first failure.
//! Invalid optional fields are blanked and flagged rather than failing the
//! lead. The only fatal outcome is a lead with no usable contact channel.

use envconfig::Envconfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::error::{LeadError, Result};
use crate::parser::RawFields;
use crate::types::{ContactInfo, Field, FieldStatus};

const EMAIL_GRAMMAR: &str = r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$";

// One number: digits and separators, with a `+` only at the start or just
// inside an opening bracket. Letters, `/` and `,` never appear.
const PHONE_GRAMMAR: &str = r"^\(?\s*\+?[0-9\s().-]+$";

/// Rule a field broke
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// No extraction rule matched
    Missing,
    EmailGrammar,
    /// Not a single number: letters, list separators or a misplaced `+`
    PhoneGrammar,
    PhoneTooShort,
    PhoneTooLong,
    /// Name was blank after trimming
    EmptyName,
    /// Neither email, telephone nor mobile survived
    NoContactChannel,
}

impl Rule {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::EmailGrammar => "email_grammar",
            Self::PhoneGrammar => "phone_grammar",
            Self::PhoneTooShort => "phone_too_short",
            Self::PhoneTooLong => "phone_too_long",
            Self::EmptyName => "empty_name",
            Self::NoContactChannel => "no_contact_channel",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// One broken rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violation {
    /// `None` for record-level rules
    pub field: Option<Field>,
    pub rule: Rule,
    /// Offending raw value, when there was one
    pub value: Option<String>,
    pub severity: Severity,
}

impl Violation {
    const fn warning(field: Field, rule: Rule, value: Option<String>) -> Self {
        Self {
            field: Some(field),
            rule,
            value,
            severity: Severity::Warning,
        }
    }

    const fn error(field: Field, rule: Rule, value: String) -> Self {
        Self {
            field: Some(field),
            rule,
            value: Some(value),
            severity: Severity::Error,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.field, &self.value) {
            (Some(field), Some(value)) => write!(f, "{field}: {} ({value:?})", self.rule.as_str()),
            (Some(field), None) => write!(f, "{field}: {}", self.rule.as_str()),
            (None, _) => f.write_str(self.rule.as_str()),
        }
    }
}

/// Fatal validation result: lists every violation found, not only the first
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no usable contact channel ({} violation(s))", .violations.len())]
pub struct ValidationFailure {
    pub violations: Vec<Violation>,
}

#[derive(Envconfig, Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Calling code applied to numbers without an international prefix,
    /// digits only (e.g. `44`). `None` keeps such numbers as bare digits.
    #[envconfig(from = "LEAD_DEFAULT_CALLING_CODE")]
    pub default_calling_code: Option<String>,

    /// Fewer digits than this marks a phone number invalid
    #[envconfig(from = "LEAD_MIN_PHONE_DIGITS", default = "7")]
    pub min_phone_digits: usize,

    /// More digits than this marks a phone number invalid
    #[envconfig(from = "LEAD_MAX_PHONE_DIGITS", default = "15")]
    pub max_phone_digits: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            default_calling_code: None,
            min_phone_digits: 7,
            max_phone_digits: 15,
        }
    }
}

/// Normalised fields plus the per-field verdicts
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedLead {
    pub reference: Option<String>,
    pub contact: ContactInfo,
    pub field_status: BTreeMap<Field, FieldStatus>,
    /// Non-fatal findings carried onto the lead
    pub warnings: Vec<Violation>,
}

impl ValidatedLead {
    /// True when any present field failed its rule
    #[must_use]
    pub fn has_invalid_fields(&self) -> bool {
        self.field_status.values().any(|s| *s == FieldStatus::Invalid)
    }
}

#[derive(Default)]
struct Report {
    status: BTreeMap<Field, FieldStatus>,
    violations: Vec<Violation>,
}

impl Report {
    fn valid(&mut self, field: Field) {
        self.status.insert(field, FieldStatus::Valid);
    }

    fn missing(&mut self, field: Field, rule: Rule, value: Option<String>) {
        self.status.insert(field, FieldStatus::Missing);
        self.violations.push(Violation::warning(field, rule, value));
    }

    fn invalid(&mut self, field: Field, rule: Rule, value: &str) {
        self.status.insert(field, FieldStatus::Invalid);
        self.violations
            .push(Violation::error(field, rule, value.to_string()));
    }
}

#[derive(Debug, Clone)]
pub struct Validator {
    config: ValidationConfig,
    email_grammar: Regex,
    phone_grammar: Regex,
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Result<Self> {
        let email_grammar =
            Regex::new(EMAIL_GRAMMAR).map_err(|e| LeadError::pattern("email grammar", e))?;
        let phone_grammar =
            Regex::new(PHONE_GRAMMAR).map_err(|e| LeadError::pattern("phone grammar", e))?;
        Ok(Self {
            config,
            email_grammar,
            phone_grammar,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate and normalise extracted fields.
    pub fn validate(&self, raw: &RawFields) -> std::result::Result<ValidatedLead, ValidationFailure> {
        let mut report = Report::default();

        let reference = match raw.value(Field::Reference).map(str::trim) {
            Some(r) if !r.is_empty() => {
                report.valid(Field::Reference);
                Some(r.to_string())
            }
            _ => {
                report.missing(Field::Reference, Rule::Missing, None);
                None
            }
        };

        let first_name = Self::check_name(&mut report, Field::FirstName, raw.value(Field::FirstName));
        let last_name = Self::check_name(&mut report, Field::LastName, raw.value(Field::LastName));

        let email = match raw.value(Field::Email) {
            None => {
                report.missing(Field::Email, Rule::Missing, None);
                None
            }
            Some(value) => {
                let normalized = self.normalize_email(value);
                if normalized.is_some() {
                    report.valid(Field::Email);
                } else {
                    report.invalid(Field::Email, Rule::EmailGrammar, value);
                }
                normalized
            }
        };

        let telephone = match raw.value(Field::Telephone) {
            Some(value) => self.check_phone(&mut report, Field::Telephone, value),
            None => {
                report.missing(Field::Telephone, Rule::Missing, None);
                None
            }
        };
        // mobile is optional; its absence is not worth a warning
        let mobile = raw
            .value(Field::Mobile)
            .and_then(|value| self.check_phone(&mut report, Field::Mobile, value));

        if email.is_none() && telephone.is_none() && mobile.is_none() {
            let mut violations = report.violations;
            violations.push(Violation {
                field: None,
                rule: Rule::NoContactChannel,
                value: None,
                severity: Severity::Error,
            });
            return Err(ValidationFailure { violations });
        }

        Ok(ValidatedLead {
            reference,
            contact: ContactInfo {
                first_name,
                last_name,
                email,
                telephone,
                mobile,
            },
            field_status: report.status,
            warnings: report.violations,
        })
    }

    fn check_name(report: &mut Report, field: Field, value: Option<&str>) -> Option<String> {
        match value {
            None => {
                report.missing(field, Rule::Missing, None);
                None
            }
            Some(value) => {
                let normalized = normalize_name(value);
                if normalized.is_some() {
                    report.valid(field);
                } else {
                    report.missing(field, Rule::EmptyName, Some(value.to_string()));
                }
                normalized
            }
        }
    }

    fn check_phone(&self, report: &mut Report, field: Field, value: &str) -> Option<String> {
        match self.classify_phone(value) {
            Ok(normalized) => {
                report.valid(field);
                Some(normalized)
            }
            Err(rule) => {
                report.invalid(field, rule, value);
                None
            }
        }
    }

    /// Trim, drop stray wrapping punctuation, lower-case the domain.
    ///
    /// Returns `None` when the result does not match the address grammar.
    #[must_use]
    pub fn normalize_email(&self, raw: &str) -> Option<String> {
        let trimmed = raw
            .trim()
            .trim_start_matches(['<', '(', '"'])
            .trim_end_matches(['>', ')', '"', '.', ',', ';']);
        let (local, domain) = trimmed.rsplit_once('@')?;
        let candidate = format!("{local}@{}", domain.to_lowercase());
        self.email_grammar.is_match(&candidate).then_some(candidate)
    }

    /// Reduce to digits with an optional leading `+`.
    ///
    /// A `+` (possibly inside an opening bracket) or a `00` prefix marks an
    /// international number. Numbers without either get the configured
    /// default calling code (dropping one trunk `0`), or stay digits-only
    /// when none is configured. Returns `None` for anything that is not a
    /// single number of acceptable length.
    #[must_use]
    pub fn normalize_phone(&self, raw: &str) -> Option<String> {
        self.classify_phone(raw).ok()
    }

    fn classify_phone(&self, raw: &str) -> std::result::Result<String, Rule> {
        let trimmed = raw.trim();
        if !self.phone_grammar.is_match(trimmed) {
            return Err(Rule::PhoneGrammar);
        }

        let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
        if digits.len() < self.config.min_phone_digits {
            return Err(Rule::PhoneTooShort);
        }
        if digits.len() > self.config.max_phone_digits {
            return Err(Rule::PhoneTooLong);
        }

        if trimmed.contains('+') {
            return Ok(format!("+{digits}"));
        }
        if let Some(international) = digits.strip_prefix("00") {
            return Ok(format!("+{international}"));
        }

        Ok(match self.config.default_calling_code.as_deref() {
            Some(code) => {
                let national = digits.strip_prefix('0').unwrap_or(&digits);
                format!("+{}{national}", code.trim_start_matches('+'))
            }
            None => digits,
        })
    }
}

/// Collapse whitespace and title-case each word.
///
/// Returns `None` when nothing but whitespace remains.
#[must_use]
pub fn normalize_name(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then(|| title_case(&collapsed))
}

// Upper-case a letter following any non-letter, lower-case the rest,
// so "o'brien" becomes "O'Brien" and "mary-jane" becomes "Mary-Jane".
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_boundary = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_boundary {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_boundary = false;
        } else {
            out.push(c);
            at_boundary = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case_boundaries() {
        assert_eq!(title_case("dildo baggins"), "Dildo Baggins");
        assert_eq!(title_case("O'BRIEN"), "O'Brien");
        assert_eq!(title_case("mary-jane"), "Mary-Jane");
    }
}
