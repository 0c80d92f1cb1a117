//! ClickHouse executor for compiled segment queries. The compiler stays pure;
//! connection settings arrive through `ClickHouseConfig` instead of a global
//! client.

use std::time::{Duration, Instant};

use clickhouse::Row;
use segment_compiler::{SegmentCompiler, SegmentationPayload};
use segment_core::config::ClickHouseConfig;
use segment_core::{SegmentError, SegmentResult};
use serde::Deserialize;
use tracing::{debug, error, info};

#[derive(Debug, Row, Deserialize)]
struct CountRow {
    total: u64,
}

#[derive(Debug, Row, Deserialize)]
struct IdRow {
    id: String,
}

/// Runs segment payloads through the compiler and then ClickHouse.
pub struct SegmentExecutor {
    client: clickhouse::Client,
    compiler: SegmentCompiler,
    timeout: Duration,
}

impl SegmentExecutor {
    /// Build an executor. The client connects lazily on the first query.
    pub fn new(config: &ClickHouseConfig, compiler: SegmentCompiler) -> Self {
        let mut client = clickhouse::Client::default()
            .with_url(&config.url)
            .with_database(&config.database);
        if let Some(user) = &config.user {
            client = client.with_user(user);
        }
        if let Some(password) = &config.password {
            client = client.with_password(password);
        }

        info!(url = %config.url, database = %config.database, "Segment executor configured");

        Self {
            client,
            compiler,
            timeout: Duration::from_millis(config.query_timeout_ms),
        }
    }

    /// Number of subscribers matching `payload`.
    pub async fn count(&self, payload: &SegmentationPayload) -> SegmentResult<u64> {
        let sql = self.compiler.compile_count(payload)?;
        let started = Instant::now();
        let query = self.client.query(&escape_placeholders(&sql));
        let row: CountRow = self.with_timeout(query.fetch_one::<CountRow>()).await?;
        debug!(total = row.total, elapsed_ms = started.elapsed().as_millis() as u64, "Segment counted");
        metrics::counter!("segmentation.counts").increment(1);
        Ok(row.total)
    }

    /// Ids of the subscribers matching `payload`, honoring its ordering and
    /// pagination.
    pub async fn fetch_ids(&self, payload: &SegmentationPayload) -> SegmentResult<Vec<String>> {
        let row_payload = SegmentationPayload {
            return_count_only: false,
            ..payload.clone()
        };
        let sql = ids_query(&self.compiler.compile(&row_payload)?);
        let started = Instant::now();
        let query = self.client.query(&escape_placeholders(&sql));
        let rows: Vec<IdRow> = self.with_timeout(query.fetch_all::<IdRow>()).await?;
        debug!(rows = rows.len(), elapsed_ms = started.elapsed().as_millis() as u64, "Segment ids fetched");
        metrics::counter!("segmentation.fetches").increment(1);
        Ok(rows.into_iter().map(|r| r.id).collect())
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = clickhouse::error::Result<T>>,
    ) -> SegmentResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                metrics::counter!("segmentation.query_errors").increment(1);
                error!(error = %e, "Segment query failed");
                Err(SegmentError::Analytics(e.to_string()))
            }
            Err(_) => {
                metrics::counter!("segmentation.query_timeouts").increment(1);
                error!(timeout_ms = self.timeout.as_millis() as u64, "Segment query timed out");
                Err(SegmentError::Analytics(format!(
                    "query timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

/// `?` is the client's bind placeholder; `??` is its literal form.
pub fn escape_placeholders(sql: &str) -> String {
    sql.replace('?', "??")
}

/// Project only subscriber ids out of a compiled row query.
pub fn ids_query(sql: &str) -> String {
    format!("SELECT id FROM ({sql})")
}
