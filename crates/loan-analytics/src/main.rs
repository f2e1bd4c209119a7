use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use loan_analytics::config::{self, ConfigBuilder, parse_host};
use loan_analytics::observability::init_observability;
use loan_analytics::warehouse::DatabricksClient;
use loan_analytics::{QueryExecutor, RawParams, spawn_sweeper, validate_tables};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "loan-analytics")]
#[command(about = "Run loan analytics queries against a Databricks SQL warehouse", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Workspace host (adb-....azuredatabricks.net)
    #[arg(long, global = true)]
    host: Option<String>,

    /// SQL warehouse id
    #[arg(long, global = true)]
    warehouse_id: Option<String>,

    /// Catalog holding the loan tables
    #[arg(long, global = true)]
    catalog: Option<String>,

    /// Schema holding the loan tables
    #[arg(long, global = true)]
    schema: Option<String>,

    /// Statement timeout in seconds
    #[arg(long, global = true)]
    query_timeout: Option<u64>,

    /// Disable the result cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable JSON logging output
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the query catalog
    List,
    /// Run a catalog query
    Run {
        query: String,
        /// Query parameter as name=value (repeatable)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Show the SQL a catalog query would run
    Explain {
        query: String,
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Run an ad-hoc read-only statement
    Sql { statement: String },
    /// Check warehouse connectivity
    Ping,
    /// Check the loan tables expose the columns the catalog reads
    ValidateSchema,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

fn raw_params(params: Vec<(String, String)>) -> RawParams {
    params
        .into_iter()
        .map(|(name, value)| (name, serde_json::Value::String(value)))
        .collect()
}

/// CLI flags form the lowest configuration layer
fn cli_builder(args: &Args) -> anyhow::Result<ConfigBuilder> {
    let mut builder = ConfigBuilder::new();

    if let Some(ref host) = args.host {
        builder = builder.host(parse_host(host)?);
    }
    if let Some(ref id) = args.warehouse_id {
        builder = builder.warehouse_id(id.clone());
    }
    if let Some(ref catalog) = args.catalog {
        builder = builder.catalog(catalog.clone());
    }
    if let Some(ref schema) = args.schema {
        builder = builder.schema(schema.clone());
    }
    if let Some(secs) = args.query_timeout {
        builder = builder.query_timeout(Duration::from_secs(secs));
    }
    if args.no_cache {
        builder = builder.cache_enabled(false);
    }
    if args.verbose {
        builder = builder.log_level("debug");
    }

    Ok(builder.json_logs(args.json_logs))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Precedence: env > file > CLI > defaults
    let builder = config::layer_config(cli_builder(&args)?, args.config.as_deref())?;
    let config = builder.build()?;

    init_observability(&config.telemetry)?;

    let executor = Arc::new(QueryExecutor::from_config(DatabricksClient::new(), &config)?);
    let sweeper = config
        .cache
        .sweep_interval
        .filter(|_| config.cache.is_active())
        .map(|interval| spawn_sweeper(Arc::clone(executor.cache()), interval));

    tracing::debug!(
        catalog = %config.tables.catalog,
        schema = %config.tables.schema,
        warehouse_configured = config.warehouse.is_complete(),
        "Starting loan-analytics"
    );

    let result = run_command(&executor, &config, args.command).await;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    if let Err(e) = executor.shutdown().await {
        tracing::warn!(error = %e, "Failed to close warehouse connection");
    }

    result
}

async fn run_command(
    executor: &QueryExecutor<DatabricksClient>,
    config: &config::Config,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::List => print_json(&executor.available_queries()),
        Command::Run { query, params } => {
            let outcome = executor.run(&query, &raw_params(params)).await?;
            print_json(&outcome)
        }
        Command::Explain { query, params } => {
            print_json(&executor.explain(&query, &raw_params(params))?)
        }
        Command::Sql { statement } => print_json(&executor.execute_custom(&statement).await?),
        Command::Ping => {
            let report = executor.ping().await?;
            print_json(&report)?;
            if report.healthy {
                Ok(())
            } else {
                anyhow::bail!("warehouse is unhealthy")
            }
        }
        Command::ValidateSchema => {
            let report = validate_tables(executor, &config.tables).await?;
            print_json(&report)?;
            if report.valid {
                Ok(())
            } else {
                anyhow::bail!("loan tables are missing expected columns")
            }
        }
    }
}
