use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

use relaylab::config::{AppConfig, LoggingConfig};
use relaylab::relay::RawTestRequest;

#[derive(Parser)]
#[command(
    name = "relaylab",
    about = "Relay HTTP requests, classify the outcome, and keep an audit trail",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (falls back to $RELAYLAB_CONFIG, then /etc/relaylab)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address (overrides the config file)
        #[arg(long, env = "RELAYLAB_BIND")]
        bind: Option<String>,
    },

    /// Relay one request and record it
    Send {
        /// HTTP method
        #[arg(long, short = 'X', default_value = "GET")]
        method: String,

        /// Target URL
        #[arg(long)]
        url: String,

        /// Request header as "Name: value" (repeatable)
        #[arg(long = "header", short = 'H')]
        headers: Vec<String>,

        /// Request body; parsed as JSON when possible, otherwise sent as text
        #[arg(long)]
        body: Option<String>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// List the most recent test records
    History {
        /// Maximum number of records to show
        #[arg(long)]
        limit: Option<usize>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Show one test record by id
    Show {
        /// Record id
        id: String,
    },
}

/// Resolve the configuration under a temporary stderr subscriber, so its
/// messages are not lost before the configured subscriber exists.
fn resolve_config(explicit: Option<&std::path::Path>) -> Result<AppConfig> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::with_default(bootstrap, || AppConfig::resolve(explicit))
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = resolve_config(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.storage.path = db;
    }

    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting relaylab daemon");
            relaylab::serve(&config).await?;
        }
        Commands::Send {
            method,
            url,
            headers,
            body,
            json,
        } => {
            let state = relaylab::build_state(&config)?;
            let raw = RawTestRequest {
                method: Some(method),
                url: Some(url),
                headers: Some(parse_headers(&headers)?),
                body: body.map(|b| serde_json::from_str(&b).unwrap_or(Value::String(b))),
            };

            let completed = state.relay.run(raw).await?;
            let reply = relaylab::api::test_reply(&completed.outcome);

            if json {
                println!("{}", serde_json::to_string_pretty(&reply)?);
            } else {
                let o = &completed.outcome;
                println!("\nOutcome:       {}", o.kind);
                println!("Status:        {}", o.status);
                println!("Response time: {} ms", o.response_time_ms);
                if let Some(msg) = &o.error_message {
                    println!("Message:       {}", msg);
                }
                println!(
                    "Record:        {}{}",
                    completed.record_id,
                    if completed.saved { "" } else { " (not saved)" }
                );
                if let Some(body) = &o.body {
                    println!("\n{}", serde_json::to_string_pretty(body)?);
                }
                println!();
            }
        }
        Commands::History { limit, json } => {
            let state = relaylab::build_state(&config)?;
            let limit = limit.unwrap_or(config.history.limit);
            let records = state.history.list_recent(limit).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No test records found.");
            } else {
                println!(
                    "{:<36} | {:<7} | {:<12} | {:>6} | {:>8} | URL",
                    "Id", "Method", "Outcome", "Status", "Time ms"
                );
                println!(
                    "{:-<36}-|-{:-<7}-|-{:-<12}-|-{:-<6}-|-{:-<8}-|-{:-<30}",
                    "", "", "", "", "", ""
                );
                for r in &records {
                    let status = r
                        .response_status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<36} | {:<7} | {:<12} | {:>6} | {:>8} | {}",
                        r.id, r.method, r.outcome_kind, status, r.response_time_ms, r.url
                    );
                }
            }
        }
        Commands::Show { id } => {
            let state = relaylab::build_state(&config)?;
            let record = state
                .history
                .get_by_id(&id)
                .await
                .with_context(|| format!("failed to load test record '{id}'"))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}

fn parse_headers(raw: &[String]) -> Result<Map<String, Value>> {
    let mut headers = Map::new();
    for h in raw {
        let Some((name, value)) = h.split_once(':') else {
            bail!("invalid header '{h}', expected 'Name: value'");
        };
        headers.insert(name.trim().to_string(), Value::String(value.trim().to_string()));
    }
    Ok(headers)
}
