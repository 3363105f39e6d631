//! Object-store and queue collaborators
//!
//! Adapters are pure I/O. They classify their own failures as transient or
//! permanent; retrying and circuit breaking happen in the pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BoundaryError;
use crate::types::{LeadRecord, LeadSource, StorageKey};

/// Where raw emails are stored
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Raw message bytes stored under `key`
    async fn fetch(&self, key: &StorageKey) -> Result<Vec<u8>, BoundaryError>;

    /// Remove the stored message. Only called after a confirmed publish.
    async fn delete(&self, key: &StorageKey) -> Result<(), BoundaryError>;
}

/// Downstream lead queue
#[async_trait]
pub trait LeadQueue: Send + Sync {
    /// Publish one lead; returns the queue's receipt id.
    ///
    /// The queue must deduplicate on `message.message_id`.
    async fn publish(&self, message: &LeadMessage) -> Result<String, BoundaryError>;
}

/// Flat wire form of a lead record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeadMessage {
    /// Deduplication id derived from source, reference, sender and receipt time
    pub message_id: String,
    pub lead_source: LeadSource,
    pub resale_reference: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    pub mobile: Option<String>,
    pub receipt_date: DateTime<Utc>,
    pub quality_score: f64,
    pub parser: String,
}

impl From<&LeadRecord> for LeadMessage {
    fn from(lead: &LeadRecord) -> Self {
        Self {
            message_id: lead.message_id().0,
            lead_source: lead.lead_source,
            resale_reference: lead.reference.clone(),
            first_name: lead.contact.first_name.clone(),
            last_name: lead.contact.last_name.clone(),
            email: lead.contact.email.clone(),
            telephone: lead.contact.telephone.clone(),
            mobile: lead.contact.mobile.clone(),
            receipt_date: lead.received_at,
            quality_score: lead.metadata.quality_score,
            parser: lead.metadata.parser.clone(),
        }
    }
}

impl LeadMessage {
    /// JSON body as sent to the queue
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
