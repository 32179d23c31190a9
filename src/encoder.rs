//! Record encoding
//!
//! This module encodes published indices into the JSON records handed to the
//! host publishing layer. Every batch carries producer metadata so a consumer
//! can tell engine instances apart.

use crate::error::ComfortError;
use crate::types::{Kind, PublishedIndex};
use crate::{ENGINE_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Current record schema version
pub const RECORD_SCHEMA_VERSION: &str = "1.0.0";

/// Who produced a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// One published index as seen by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostRecord {
    pub identifier: String,
    pub entity_id: String,
    pub display_category: Kind,
    pub display_name: String,
    /// Numeric value as string, category token or "unknown"
    pub state: String,
    pub attributes: BTreeMap<String, f64>,
    pub computed_at_utc: String,
}

/// A batch of records from one recompute or replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordBatch {
    pub schema_version: String,
    pub producer: RecordProducer,
    pub records: Vec<HostRecord>,
}

/// Encoder for host records
pub struct RecordEncoder {
    instance_id: String,
}

impl Default for RecordEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Convert one published index
    pub fn record(&self, index: &PublishedIndex, computed_at: DateTime<Utc>) -> HostRecord {
        HostRecord {
            identifier: index.identifier.clone(),
            entity_id: index.entity_id.clone(),
            display_category: index.kind,
            display_name: index.kind.display_name(),
            state: index.state.as_state_string(),
            attributes: index.attributes.clone(),
            computed_at_utc: computed_at.to_rfc3339(),
        }
    }

    /// Encode a set of published indices into a batch
    pub fn encode(&self, indices: &[PublishedIndex], computed_at: DateTime<Utc>) -> RecordBatch {
        RecordBatch {
            schema_version: RECORD_SCHEMA_VERSION.to_string(),
            producer: RecordProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGINE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            records: indices
                .iter()
                .map(|index| self.record(index, computed_at))
                .collect(),
        }
    }

    /// Encode to a pretty JSON string
    pub fn encode_to_json(
        &self,
        indices: &[PublishedIndex],
        computed_at: DateTime<Utc>,
    ) -> Result<String, ComfortError> {
        let batch = self.encode(indices, computed_at);
        Ok(serde_json::to_string_pretty(&batch)?)
    }

    /// Encode to a single JSON line, for NDJSON output
    pub fn encode_to_line(
        &self,
        indices: &[PublishedIndex],
        computed_at: DateTime<Utc>,
    ) -> Result<String, ComfortError> {
        let batch = self.encode(indices, computed_at);
        Ok(serde_json::to_string(&batch)?)
    }
}
