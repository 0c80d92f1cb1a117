//! The segmentation payload as accepted from API callers.

use serde::{Deserialize, Serialize};

use crate::event_filter::EventFilter;
use crate::predicates::SegmentGroup;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentationPayload {
    /// Required; checked at compile time so a missing value reports as an
    /// invalid payload rather than a deserialization failure.
    #[serde(default)]
    pub store_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_conditions: Option<SegmentGroup>,
    #[serde(default)]
    pub event_filters: Vec<EventFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default)]
    pub return_count_only: bool,
}

impl SegmentationPayload {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Same payload, switched to the count-only projection.
    pub fn as_count(&self) -> Self {
        Self {
            return_count_only: true,
            ..self.clone()
        }
    }
}
