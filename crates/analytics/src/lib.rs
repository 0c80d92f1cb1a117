//! Executes compiled segmentation queries against ClickHouse.

pub mod executor;

pub use executor::SegmentExecutor;
