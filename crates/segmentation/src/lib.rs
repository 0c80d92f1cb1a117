//! Segmentation query compiler — translates declarative segment payloads
//! (attribute conditions plus behavioral event filters) into a single
//! ClickHouse statement.

pub mod ast;
pub mod builder;
pub mod compiler;
pub mod engine;
pub mod escape;
pub mod event_filter;
pub mod payload;
pub mod predicates;
pub mod schema;
pub mod timeframe;

pub use builder::SegmentBuilder;
pub use compiler::{compile, SegmentCompiler};
pub use engine::{Segment, SegmentCatalog};
pub use event_filter::{Aggregation, AggregationType, EventFilter};
pub use payload::SegmentationPayload;
pub use predicates::{LogicalOperator, Operator, SegmentCondition, SegmentGroup};
pub use timeframe::{RelativeWindow, Timeframe};
