use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `SEGMENT_EXPRESS__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub clickhouse: ClickHouseConfig,
    #[serde(default)]
    pub compiler: CompilerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClickHouseConfig {
    #[serde(default = "default_clickhouse_url")]
    pub url: String,
    #[serde(default = "default_clickhouse_db")]
    pub database: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

/// Knobs for the segmentation query compiler. All of them default to the
/// permissive behavior.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompilerConfig {
    /// Log every compiled statement at info level.
    #[serde(default)]
    pub debug: bool,
    /// Reject condition fields that are not registered for their table
    /// instead of escaping them as strings.
    #[serde(default)]
    pub strict_fields: bool,
    /// Applied to row queries whose payload carries no `limit`.
    #[serde(default)]
    pub default_limit: Option<u64>,
}

// Default functions
fn default_node_id() -> String {
    "segment-01".to_string()
}
fn default_clickhouse_url() -> String {
    "http://localhost:8123".to_string()
}
fn default_clickhouse_db() -> String {
    "segmentation".to_string()
}
fn default_query_timeout_ms() -> u64 {
    30_000
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: default_clickhouse_url(),
            database: default_clickhouse_db(),
            user: None,
            password: None,
            query_timeout_ms: default_query_timeout_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            clickhouse: ClickHouseConfig::default(),
            compiler: CompilerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("SEGMENT_EXPRESS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
