//! Per-email orchestration
//!
//! fetch → size guard → decode → detect → parse → validate → enrich →
//! publish → delete. The stored email is deleted only after the queue has
//! confirmed the publish; every other failure leaves it in place.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::boundary::{LeadMessage, LeadQueue, ObjectStore};
use crate::config::PipelineConfig;
use crate::detect::SourceDetector;
use crate::enrich;
use crate::error::{ResilienceError, Result};
use crate::mime::decode_raw_email;
use crate::registry::ParserRegistry;
use crate::resilience::{OperationClass, Resilience};
use crate::types::{Field, LeadRecord, MessageId, RawEmail, StorageKey};
use crate::validate::{ValidationFailure, Validator};

/// Receipt recorded when dry-run mode skips the real publish
pub const DRY_RUN_RECEIPT: &str = "dry-run";

/// A lead that reached the queue
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub lead: Box<LeadRecord>,
    pub message_id: MessageId,
    /// Queue receipt, or [`DRY_RUN_RECEIPT`]
    pub receipt: String,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradedReason {
    UnknownSource,
    /// Fields that were present but failed validation and were blanked
    InvalidFields(Vec<Field>),
}

/// Why an email produced no lead. The stored email is kept.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("email is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("undecodable email: {0}")]
    Undecodable(String),

    #[error("body has {chars} characters, minimum is {min}")]
    ContentTooShort { chars: usize, min: usize },

    #[error("source not recognised and fallback parsing is disabled")]
    UnknownSource,

    #[error(transparent)]
    NoContact(ValidationFailure),

    /// A collaborator refused a call with a permanent error
    #[error("{0}")]
    Refused(ResilienceError),
}

/// Terminal outcome of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Published and the stored email deleted
    Delivered(Delivery),
    /// Published with an unknown source or blanked fields; stored email deleted
    DeliveredDegraded {
        delivery: Delivery,
        reasons: Vec<DegradedReason>,
    },
    Rejected(RejectReason),
    /// A boundary call ran out of retries or hit an open circuit; the stored
    /// email is kept for reprocessing
    TransientFailure(ResilienceError),
}

impl Outcome {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Delivered(_) => "delivered",
            Self::DeliveredDegraded { .. } => "delivered-degraded",
            Self::Rejected(_) => "rejected",
            Self::TransientFailure(_) => "transient-failure",
        }
    }

    #[must_use]
    pub const fn delivery(&self) -> Option<&Delivery> {
        match self {
            Self::Delivered(delivery) | Self::DeliveredDegraded { delivery, .. } => Some(delivery),
            Self::Rejected(_) | Self::TransientFailure(_) => None,
        }
    }

    /// Whether the stored email was deleted
    #[must_use]
    pub const fn source_deleted(&self) -> bool {
        self.delivery().is_some()
    }

    // Permanent errors end the email as rejected; everything else may
    // clear up on a later run.
    fn from_boundary(error: ResilienceError) -> Self {
        if error.is_transient() {
            Self::TransientFailure(error)
        } else {
            Self::Rejected(RejectReason::Refused(error))
        }
    }
}

/// Lead extraction pipeline with its collaborators
pub struct LeadPipeline {
    config: PipelineConfig,
    detector: SourceDetector,
    registry: ParserRegistry,
    validator: Validator,
    resilience: Arc<Resilience>,
    store: Arc<dyn ObjectStore>,
    queue: Arc<dyn LeadQueue>,
}

impl LeadPipeline {
    /// Pipeline over the built-in catalogue, with circuits sized from `config`
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn ObjectStore>,
        queue: Arc<dyn LeadQueue>,
    ) -> Result<Self> {
        let resilience = Arc::new(Resilience::new(
            config.retry.policy(),
            config.circuit.policy(),
        ));
        Self::with_components(
            config,
            SourceDetector::builtin()?,
            ParserRegistry::builtin()?,
            resilience,
            store,
            queue,
        )
    }

    /// Pipeline with caller-supplied detector, parsers and circuits
    pub fn with_components(
        config: PipelineConfig,
        detector: SourceDetector,
        registry: ParserRegistry,
        resilience: Arc<Resilience>,
        store: Arc<dyn ObjectStore>,
        queue: Arc<dyn LeadQueue>,
    ) -> Result<Self> {
        let validator = Validator::new(config.validation.clone())?;
        Ok(Self {
            config,
            detector,
            registry,
            validator,
            resilience,
            store,
            queue,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub const fn detector(&self) -> &SourceDetector {
        &self.detector
    }

    #[must_use]
    pub const fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    #[must_use]
    pub fn resilience(&self) -> &Resilience {
        &self.resilience
    }

    /// Fetch the stored email under `key` and run it through the pipeline.
    ///
    /// `received_at` stands in for a missing or unparseable `Date` header.
    pub async fn process_key(&self, key: &StorageKey, received_at: DateTime<Utc>) -> Outcome {
        let raw = match self
            .resilience
            .call(OperationClass::Fetch, || self.store.fetch(key))
            .await
        {
            Ok(raw) => raw,
            Err(error) => return finish(key, Outcome::from_boundary(error)),
        };

        if raw.len() > self.config.max_email_bytes {
            return finish(
                key,
                Outcome::Rejected(RejectReason::TooLarge {
                    size: raw.len(),
                    limit: self.config.max_email_bytes,
                }),
            );
        }

        match decode_raw_email(key.clone(), &raw, received_at) {
            Ok(email) => self.process_email(&email).await,
            Err(e) => finish(key, Outcome::Rejected(RejectReason::Undecodable(e.to_string()))),
        }
    }

    /// Run an already decoded email through extraction and delivery.
    pub async fn process_email(&self, email: &RawEmail) -> Outcome {
        let outcome = match self.extract_lead(email, Utc::now()) {
            Ok(lead) => self.deliver(lead).await,
            Err(reason) => Outcome::Rejected(reason),
        };
        finish(&email.storage_key, outcome)
    }

    /// Detection, parsing, validation and enrichment. No I/O.
    pub fn extract_lead(
        &self,
        email: &RawEmail,
        processed_at: DateTime<Utc>,
    ) -> std::result::Result<LeadRecord, RejectReason> {
        let min = self.config.min_content_chars;
        if min > 0 {
            let chars = email.body_text().trim().chars().count();
            if chars < min {
                return Err(RejectReason::ContentTooShort { chars, min });
            }
        }

        let detection = self.detector.detect(email);
        debug!(
            key = %email.storage_key,
            source = %detection.source,
            score = detection.score,
            outcome = ?detection.outcome,
            "Source detected"
        );
        if detection.is_unknown() && !self.config.fallback_parsing {
            return Err(RejectReason::UnknownSource);
        }

        let parser = self.registry.resolve(detection.source);
        if !parser.can_parse(email) {
            warn!(
                key = %email.storage_key,
                parser = parser.name(),
                "Parser markers not found, extracting anyway"
            );
        }

        let raw = parser.extract(email);
        let lead = self.validator.validate(&raw).map_err(|failure| {
            warn!(
                key = %email.storage_key,
                source = %detection.source,
                parser = parser.name(),
                confidence = ?raw.confidence(),
                violations = ?failure.violations,
                "No usable contact channel"
            );
            RejectReason::NoContact(failure)
        })?;

        Ok(enrich::enrich(
            email,
            &detection,
            parser.name(),
            &raw,
            lead,
            processed_at,
        ))
    }

    async fn deliver(&self, lead: LeadRecord) -> Outcome {
        let message = LeadMessage::from(&lead);
        let message_id = lead.message_id();

        let receipt = if self.config.dry_run {
            match message.to_json() {
                Ok(payload) => info!(message_id = %message_id, payload = %payload, "Dry run, not publishing"),
                Err(e) => warn!(message_id = %message_id, error = %e, "Dry run, payload not serialisable"),
            }
            DRY_RUN_RECEIPT.to_string()
        } else {
            match self
                .resilience
                .call(OperationClass::Publish, || self.queue.publish(&message))
                .await
            {
                Ok(receipt) => receipt,
                Err(error) => return Outcome::from_boundary(error),
            }
        };

        // Past this point the lead is on the queue; a delete failure keeps the
        // email, and a rerun republishes under the same deduplicated message id.
        if let Err(error) = self
            .resilience
            .call(OperationClass::Delete, || self.store.delete(&lead.storage_key))
            .await
        {
            return Outcome::from_boundary(error);
        }

        let mut reasons = Vec::new();
        if !lead.lead_source.is_known() {
            reasons.push(DegradedReason::UnknownSource);
        }
        let invalid = lead.invalid_fields();
        if !invalid.is_empty() {
            reasons.push(DegradedReason::InvalidFields(invalid));
        }

        let delivery = Delivery {
            lead: Box::new(lead),
            message_id,
            receipt,
            dry_run: self.config.dry_run,
        };
        if reasons.is_empty() {
            Outcome::Delivered(delivery)
        } else {
            Outcome::DeliveredDegraded { delivery, reasons }
        }
    }
}

fn finish(key: &StorageKey, outcome: Outcome) -> Outcome {
    log_outcome(key, &outcome);
    outcome
}

fn log_outcome(key: &StorageKey, outcome: &Outcome) {
    match outcome {
        Outcome::Delivered(delivery) | Outcome::DeliveredDegraded { delivery, .. } => {
            let lead = &delivery.lead;
            let meta = &lead.metadata;
            info!(
                key = %key,
                outcome = outcome.label(),
                source = %lead.lead_source,
                reference = ?lead.reference,
                message_id = %delivery.message_id,
                receipt = %delivery.receipt,
                parser = %meta.parser,
                detection_score = meta.detection_score,
                quality_score = meta.quality_score,
                field_status = ?meta.field_status,
                confidence = ?meta.confidence,
                custom_fields = ?meta.custom_fields,
                "Lead delivered"
            );
            if let Outcome::DeliveredDegraded { reasons, .. } = outcome {
                warn!(key = %key, reasons = ?reasons, warnings = ?meta.warnings, "Delivery degraded");
            }
        }
        Outcome::Rejected(reason) => {
            warn!(key = %key, outcome = outcome.label(), reason = %reason, "Lead rejected, email retained");
        }
        Outcome::TransientFailure(error) => {
            error!(
                key = %key,
                outcome = outcome.label(),
                stage = %error.operation(),
                error = %error,
                "Boundary failure, email retained for reprocessing"
            );
        }
    }
}
