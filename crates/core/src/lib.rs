pub mod config;
pub mod error;

pub use config::{AppConfig, ClickHouseConfig, CompilerConfig};
pub use error::{SegmentError, SegmentResult};
