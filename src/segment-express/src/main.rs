//! Segment Express — compiles segmentation payloads into ClickHouse SQL and
//! optionally runs them.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use segment_analytics::SegmentExecutor;
use segment_compiler::{SegmentCompiler, SegmentationPayload};
use segment_core::config::AppConfig;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "segment-express")]
#[command(about = "Segmentation query compiler for the ClickHouse event store")]
#[command(version)]
struct Cli {
    /// ClickHouse HTTP URL (overrides config)
    #[arg(long, env = "SEGMENT_EXPRESS__CLICKHOUSE__URL")]
    clickhouse_url: Option<String>,

    /// ClickHouse database (overrides config)
    #[arg(long, env = "SEGMENT_EXPRESS__CLICKHOUSE__DATABASE")]
    database: Option<String>,

    /// Reject fields missing from the schema registry
    #[arg(long, default_value_t = false)]
    strict_fields: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the SQL for a payload.
    Compile {
        /// Path to the JSON payload ("-" for stdin).
        #[arg(long)]
        payload: PathBuf,

        /// Print the count-only form.
        #[arg(long, default_value_t = false)]
        count: bool,
    },
    /// Count the subscribers matching a payload.
    Count {
        #[arg(long)]
        payload: PathBuf,
    },
    /// List the subscriber ids matching a payload.
    Ids {
        #[arg(long)]
        payload: PathBuf,
    },
}

fn read_payload(path: &Path) -> anyhow::Result<SegmentationPayload> {
    let text = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("reading payload from stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading payload {}", path.display()))?
    };
    SegmentationPayload::from_json(&text).context("parsing segmentation payload")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so compiled SQL on stdout stays pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "segment_express=info,segment_compiler=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(url) = cli.clickhouse_url {
        config.clickhouse.url = url;
    }
    if let Some(database) = cli.database {
        config.clickhouse.database = database;
    }
    if cli.strict_fields {
        config.compiler.strict_fields = true;
    }

    info!(
        node_id = %config.node_id,
        database = %config.clickhouse.database,
        strict_fields = config.compiler.strict_fields,
        "Configuration loaded"
    );

    let compiler = SegmentCompiler::new(config.compiler.clone());

    match cli.command {
        Command::Compile { payload, count } => {
            let payload = read_payload(&payload)?;
            let sql = if count {
                compiler.compile_count(&payload)?
            } else {
                compiler.compile(&payload)?
            };
            println!("{sql}");
        }
        Command::Count { payload } => {
            let payload = read_payload(&payload)?;
            let executor = SegmentExecutor::new(&config.clickhouse, compiler);
            let total = executor.count(&payload).await?;
            println!("{}", serde_json::json!({ "total": total }));
        }
        Command::Ids { payload } => {
            let payload = read_payload(&payload)?;
            let executor = SegmentExecutor::new(&config.clickhouse, compiler);
            let ids = executor.fetch_ids(&payload).await?;
            info!(count = ids.len(), "Segment ids fetched");
            for id in ids {
                println!("{id}");
            }
        }
    }

    Ok(())
}
