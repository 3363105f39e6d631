//! Source detection by indicator scoring
//!
//! Each known source has indicators on three channels (sender, subject,
//! body). A source's score is the number of its indicators that match. A
//! named source is chosen only when it is the strict top scorer and its
//! evidence is corroborated; otherwise the email is `unknown`.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use crate::error::{LeadError, Result};
use crate::patterns::{self, IndicatorSpec, SourceSpec};
use crate::types::{EmailAddress, LeadSource, RawEmail};

/// Independent evidence channel
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sender,
    Subject,
    Body,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sender => "sender",
            Self::Subject => "subject",
            Self::Body => "body",
        })
    }
}

/// One matched indicator
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Evidence {
    pub channel: Channel,
    pub indicator: String,
}

/// Why detection ended where it did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionOutcome {
    Matched,
    /// Several sources share the top score
    Ambiguous { tied: Vec<LeadSource> },
    /// Top scorer lacks enough indicators or channels
    Uncorroborated { best: LeadSource },
    NoEvidence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionResult {
    pub source: LeadSource,
    /// Indicators matched by the top-scoring source
    pub score: u32,
    /// Matches behind `score`; empty when the top score is shared
    pub evidence: Vec<Evidence>,
    pub outcome: DetectionOutcome,
}

impl DetectionResult {
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        !self.source.is_known()
    }

    /// Distinct channels among the evidence
    #[must_use]
    pub fn channels(&self) -> BTreeSet<Channel> {
        self.evidence.iter().map(|e| e.channel).collect()
    }
}

/// Corroboration required before a source is named
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionPolicy {
    pub min_indicators: u32,
    pub min_channels: usize,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            min_indicators: 2,
            min_channels: 2,
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Domain(String),
    Pattern(Regex),
}

#[derive(Debug, Clone)]
struct Indicator {
    channel: Channel,
    label: String,
    matcher: Matcher,
}

impl Indicator {
    fn compile(owner: LeadSource, spec: IndicatorSpec) -> Result<Self> {
        let pattern = |channel: Channel, rule: &str| -> Result<Self> {
            let regex = Regex::new(&format!("(?im){rule}"))
                .map_err(|e| LeadError::pattern(format!("{owner} indicator"), e))?;
            Ok(Self {
                channel,
                label: rule.to_string(),
                matcher: Matcher::Pattern(regex),
            })
        };

        match spec {
            IndicatorSpec::SenderDomain(domain) => Ok(Self {
                channel: Channel::Sender,
                label: domain.to_string(),
                matcher: Matcher::Domain(domain.to_lowercase()),
            }),
            IndicatorSpec::Subject(rule) => pattern(Channel::Subject, rule),
            IndicatorSpec::Body(rule) => pattern(Channel::Body, rule),
        }
    }

    fn matches(&self, view: &EmailView<'_>) -> bool {
        match (&self.matcher, self.channel) {
            (Matcher::Domain(domain), _) => view
                .sender
                .as_ref()
                .is_some_and(|address| address.is_from_domain(domain)),
            (Matcher::Pattern(regex), Channel::Sender) => regex.is_match(view.sender_raw),
            (Matcher::Pattern(regex), Channel::Subject) => regex.is_match(view.subject),
            (Matcher::Pattern(regex), Channel::Body) => regex.is_match(&view.body),
        }
    }
}

// Per-email inputs computed once and shared by every indicator
struct EmailView<'a> {
    sender: Option<EmailAddress>,
    sender_raw: &'a str,
    subject: &'a str,
    body: String,
}

#[derive(Debug, Clone)]
struct SourceIndicators {
    source: LeadSource,
    indicators: Vec<Indicator>,
}

/// Scores emails against every registered source's indicators
#[derive(Debug, Clone)]
pub struct SourceDetector {
    sources: Vec<SourceIndicators>,
    policy: DetectionPolicy,
}

impl SourceDetector {
    /// Detector over the built-in catalogue
    pub fn builtin() -> Result<Self> {
        Self::from_specs(patterns::CATALOGUE, DetectionPolicy::default())
    }

    pub fn from_specs(specs: &[SourceSpec], policy: DetectionPolicy) -> Result<Self> {
        let mut detector = Self {
            sources: Vec::with_capacity(specs.len()),
            policy,
        };
        for spec in specs {
            detector.register(spec.source, spec.indicators)?;
        }
        Ok(detector)
    }

    /// Add indicators for a source. Indicators for an already known source
    /// are appended to its set.
    pub fn register(&mut self, source: LeadSource, indicators: &[IndicatorSpec]) -> Result<()> {
        let compiled = indicators
            .iter()
            .map(|spec| Indicator::compile(source, *spec))
            .collect::<Result<Vec<_>>>()?;

        if let Some(existing) = self.sources.iter_mut().find(|s| s.source == source) {
            existing.indicators.extend(compiled);
        } else {
            self.sources.push(SourceIndicators {
                source,
                indicators: compiled,
            });
        }
        Ok(())
    }

    #[must_use]
    pub const fn policy(&self) -> DetectionPolicy {
        self.policy
    }

    /// Score every source and pick one. Never fails: lack of evidence,
    /// ties and single-channel matches all resolve to `unknown`.
    #[must_use]
    pub fn detect(&self, email: &RawEmail) -> DetectionResult {
        let view = EmailView {
            sender: email.sender_address(),
            sender_raw: &email.sender,
            subject: &email.subject,
            body: email.body_text(),
        };

        let scored: Vec<(LeadSource, Vec<Evidence>)> = self
            .sources
            .iter()
            .map(|s| {
                let evidence = s
                    .indicators
                    .iter()
                    .filter(|i| i.matches(&view))
                    .map(|i| Evidence {
                        channel: i.channel,
                        indicator: i.label.clone(),
                    })
                    .collect();
                (s.source, evidence)
            })
            .collect();

        let score_of = |evidence: &[Evidence]| u32::try_from(evidence.len()).unwrap_or(u32::MAX);
        let top = scored.iter().map(|(_, e)| score_of(e)).max().unwrap_or(0);

        for (source, evidence) in &scored {
            if !evidence.is_empty() {
                debug!(source = %source, score = evidence.len(), "Detection score");
            }
        }

        if top == 0 {
            return unknown(0, Vec::new(), DetectionOutcome::NoEvidence);
        }

        let mut leaders = scored.into_iter().filter(|(_, e)| score_of(e) == top);
        let Some((best, evidence)) = leaders.next() else {
            return unknown(0, Vec::new(), DetectionOutcome::NoEvidence);
        };

        let others: Vec<LeadSource> = leaders.map(|(source, _)| source).collect();
        if !others.is_empty() {
            let mut tied = vec![best];
            tied.extend(others);
            return unknown(top, Vec::new(), DetectionOutcome::Ambiguous { tied });
        }

        let channels: BTreeSet<Channel> = evidence.iter().map(|e| e.channel).collect();
        if top < self.policy.min_indicators || channels.len() < self.policy.min_channels {
            return unknown(top, evidence, DetectionOutcome::Uncorroborated { best });
        }

        DetectionResult {
            source: best,
            score: top,
            evidence,
            outcome: DetectionOutcome::Matched,
        }
    }
}

const fn unknown(score: u32, evidence: Vec<Evidence>, outcome: DetectionOutcome) -> DetectionResult {
    DetectionResult {
        source: LeadSource::Unknown,
        score,
        evidence,
        outcome,
    }
}
