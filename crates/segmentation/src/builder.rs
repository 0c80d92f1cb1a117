//! Segment builder — fluent API for constructing segmentation payloads.

use serde_json::Value;

use crate::event_filter::EventFilter;
use crate::payload::SegmentationPayload;
use crate::predicates::{LogicalOperator, Operator, SegmentCondition, SegmentGroup};
use crate::schema::PIXEL_EVENTS_TABLE;
use crate::timeframe::RelativeWindow;

pub struct SegmentBuilder {
    store_id: String,
    name: Option<String>,
    description: Option<String>,
    conditions: Vec<SegmentCondition>,
    groups: Vec<SegmentGroup>,
    operator: LogicalOperator,
    event_filters: Vec<EventFilter>,
    limit: Option<u64>,
    offset: Option<u64>,
    count_only: bool,
}

impl SegmentBuilder {
    pub fn new(store_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            name: None,
            description: None,
            conditions: Vec::new(),
            groups: Vec::new(),
            operator: LogicalOperator::And,
            event_filters: Vec::new(),
            limit: None,
            offset: None,
            count_only: false,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_or(mut self) -> Self {
        self.operator = LogicalOperator::Or;
        self
    }

    pub fn condition(
        mut self,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.conditions
            .push(SegmentCondition::new(field, operator, value));
        self
    }

    pub fn attribute_equals(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(field, Operator::Equals, value)
    }

    pub fn attribute_gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(field, Operator::GreaterThan, value)
    }

    pub fn attribute_between(
        mut self,
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.conditions
            .push(SegmentCondition::between(field, low, high));
        self
    }

    /// Nested group, compiled as one parenthesized operand.
    pub fn group(mut self, group: SegmentGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn event(mut self, filter: EventFilter) -> Self {
        self.event_filters.push(filter);
        self
    }

    /// Subscribers with at least one pixel event of `event_type` in `window`.
    pub fn did_event(self, event_type: impl Into<String>, window: RelativeWindow) -> Self {
        self.event(pixel_event(event_type.into(), window))
    }

    /// Subscribers with no pixel event of `event_type` in `window`.
    pub fn did_not_do_event(self, event_type: impl Into<String>, window: RelativeWindow) -> Self {
        self.event(pixel_event(event_type.into(), window).excluded())
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn count_only(mut self) -> Self {
        self.count_only = true;
        self
    }

    pub fn build(self) -> SegmentationPayload {
        let base = SegmentGroup {
            logic: self.operator,
            conditions: self.conditions,
            groups: self.groups,
        };
        SegmentationPayload {
            store_id: self.store_id,
            name: self.name,
            description: self.description,
            base_conditions: (!base.is_empty()).then_some(base),
            event_filters: self.event_filters,
            limit: self.limit,
            offset: self.offset,
            return_count_only: self.count_only,
        }
    }
}

fn pixel_event(event_type: String, window: RelativeWindow) -> EventFilter {
    EventFilter::on(PIXEL_EVENTS_TABLE)
        .within(window)
        .matching(SegmentCondition::new("event_type", Operator::Equals, event_type))
}
