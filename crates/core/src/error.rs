use thiserror::Error;

pub type SegmentResult<T> = Result<T, SegmentError>;

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("Invalid segmentation payload: {0}")]
    InvalidPayload(String),

    #[error("Unsupported operator `{operator}` on field `{field}`")]
    UnsupportedOperator { operator: String, field: String },

    #[error("Unsupported aggregation type: {0}")]
    UnsupportedAggregationType(String),

    #[error("Unknown field `{field}` for table `{table}`")]
    UnknownField { table: String, field: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("ClickHouse analytics error: {0}")]
    Analytics(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SegmentError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidPayload(reason.into())
    }

    /// True for errors caused by the caller's payload rather than the environment.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPayload(_)
                | Self::UnsupportedOperator { .. }
                | Self::UnsupportedAggregationType(_)
                | Self::UnknownField { .. }
                | Self::Serialization(_)
        )
    }
}

impl From<::config::ConfigError> for SegmentError {
    fn from(e: ::config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
