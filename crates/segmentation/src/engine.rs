//! Segment catalog — named segments with their compiled queries, keyed by id.

use chrono::{DateTime, Utc};
use segment_core::SegmentResult;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::compiler::SegmentCompiler;
use crate::payload::SegmentationPayload;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: Uuid,
    pub store_id: String,
    pub name: String,
    pub description: Option<String>,
    pub payload: SegmentationPayload,
    /// Row query as compiled from the payload.
    pub query: String,
    pub count_query: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct SegmentCatalog {
    compiler: SegmentCompiler,
    segments: dashmap::DashMap<Uuid, Segment>,
}

impl SegmentCatalog {
    pub fn new(compiler: SegmentCompiler) -> Self {
        Self {
            compiler,
            segments: dashmap::DashMap::new(),
        }
    }

    /// Compile and store a segment. Nothing is stored if compilation fails.
    pub fn register(&self, payload: SegmentationPayload) -> SegmentResult<Segment> {
        let query = self.compiler.compile(&payload)?;
        let count_query = self.compiler.compile_count(&payload)?;
        let now = Utc::now();
        let segment = Segment {
            id: Uuid::new_v4(),
            store_id: payload.store_id.clone(),
            name: payload
                .name
                .clone()
                .unwrap_or_else(|| "Untitled segment".to_string()),
            description: payload.description.clone(),
            payload,
            query,
            count_query,
            created_at: now,
            updated_at: now,
        };
        info!(segment_id = %segment.id, store_id = %segment.store_id, name = %segment.name, "Segment registered");
        self.segments.insert(segment.id, segment.clone());
        Ok(segment)
    }

    /// Replace the payload of an existing segment and recompile it.
    pub fn update(&self, id: &Uuid, payload: SegmentationPayload) -> SegmentResult<Option<Segment>> {
        let query = self.compiler.compile(&payload)?;
        let count_query = self.compiler.compile_count(&payload)?;
        let Some(mut entry) = self.segments.get_mut(id) else {
            return Ok(None);
        };
        let segment = entry.value_mut();
        if let Some(name) = &payload.name {
            segment.name = name.clone();
        }
        segment.description = payload.description.clone();
        segment.store_id = payload.store_id.clone();
        segment.payload = payload;
        segment.query = query;
        segment.count_query = count_query;
        segment.updated_at = Utc::now();
        Ok(Some(segment.clone()))
    }

    pub fn get(&self, id: &Uuid) -> Option<Segment> {
        self.segments.get(id).map(|s| s.clone())
    }

    pub fn remove(&self, id: &Uuid) -> Option<Segment> {
        self.segments.remove(id).map(|(_, s)| s)
    }

    /// Segments of one store, oldest first.
    pub fn list_for_store(&self, store_id: &str) -> Vec<Segment> {
        let mut segments: Vec<Segment> = self
            .segments
            .iter()
            .filter(|s| s.store_id == store_id)
            .map(|s| s.value().clone())
            .collect();
        segments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl Default for SegmentCatalog {
    fn default() -> Self {
        Self::new(SegmentCompiler::default())
    }
}
