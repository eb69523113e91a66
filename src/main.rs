//! sailing-risk: batch runner for ferry cancellation risk
//!
//! # Usage
//!
//! ```bash
//! # Load collector output
//! sailing-risk ingest --forecasts forecasts.jsonl --operations operations.jsonl
//!
//! # Score tomorrow's sailings
//! sailing-risk score --date 2026-02-17
//!
//! # Evaluate last week once actuals are in
//! sailing-risk evaluate --from 2026-02-09 --to 2026-02-15
//!
//! # Propose threshold changes, review, then apply
//! sailing-risk calibrate --end 2026-02-15
//! sailing-risk proposals
//! sailing-risk apply --proposal 3
//! ```
//!
//! # Environment Variables
//!
//! - `SAILING_RISK_CONFIG`: Path to the TOML config (default: ./sailing_risk.toml)
//! - `SAILING_RISK_DATA_DIR`: Override `store.data_dir`
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use tracing::{error, info, warn};

use sailing_risk::config::RiskConfig;
use sailing_risk::pipeline::BatchPipeline;
use sailing_risk::report::render_proposal;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "sailing-risk")]
#[command(about = "Ferry sailing cancellation risk scoring and calibration")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config (otherwise $SAILING_RISK_CONFIG, ./sailing_risk.toml, defaults)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Override the store directory from config
    #[arg(long, env = "SAILING_RISK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct DateRange {
    /// Single date (YYYY-MM-DD)
    #[arg(long, conflicts_with_all = ["from", "to"])]
    date: Option<NaiveDate>,

    /// First date of the range, inclusive
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,

    /// Last date of the range, inclusive
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,
}

impl DateRange {
    fn resolve(self, default: NaiveDate) -> (NaiveDate, NaiveDate) {
        match (self.date, self.from, self.to) {
            (Some(d), _, _) => (d, d),
            (None, Some(from), Some(to)) => (from, to),
            _ => (default, default),
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Load collector JSON-lines files into the store
    Ingest {
        /// Forecast snapshots, one JSON object per line
        #[arg(long)]
        forecasts: Option<PathBuf>,
        /// Actual operations, one JSON object per line
        #[arg(long)]
        operations: Option<PathBuf>,
    },

    /// Score scheduled sailings (default: tomorrow)
    Score {
        #[command(flatten)]
        range: DateRange,
    },

    /// Match predictions to actual operations and recompute accuracy (default: yesterday)
    Evaluate {
        #[command(flatten)]
        range: DateRange,
        /// Reference date for the unmatched-prediction grace period (default: today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Build a threshold calibration proposal over the window ending on --end
    Calibrate {
        /// Last day of the window (default: yesterday)
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Apply a stored calibration proposal, making its profiles active
    Apply {
        /// Proposal id as listed by `proposals`
        #[arg(long)]
        proposal: u64,
    },

    /// List stored calibration proposals
    Proposals {
        /// Show one proposal in full
        #[arg(long)]
        id: Option<u64>,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Accuracy report over a date range (default: the last 7 days)
    Report {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Include every individual outcome
        #[arg(long)]
        outcomes: bool,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Validate the config and print it with defaults filled in
    CheckConfig,
}

// ============================================================================
// Main
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn load_config(args: &CliArgs) -> Result<RiskConfig> {
    let mut config = match &args.config {
        Some(path) => RiskConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RiskConfig::load().context("Failed to load config")?,
    };
    if let Some(dir) = &args.data_dir {
        config.store.data_dir = dir.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json_logs);

    let config = load_config(&args)?;

    if let SubCommand::CheckConfig = args.command {
        println!("{}", config.to_toml().context("Failed to serialize config")?);
        info!("Config is valid");
        return Ok(());
    }

    std::fs::create_dir_all(&config.store.data_dir).with_context(|| {
        format!("Failed to create data directory {}", config.store.data_dir.display())
    })?;
    let pipeline = BatchPipeline::open(config).context("Failed to open forecast store")?;

    let now = Utc::now();
    let today = now.date_naive();
    let yesterday = today.pred_opt().unwrap_or(today);
    let tomorrow = today.succ_opt().unwrap_or(today);

    match args.command {
        SubCommand::Ingest {
            forecasts,
            operations,
        } => {
            if forecasts.is_none() && operations.is_none() {
                bail!("Nothing to ingest: pass --forecasts and/or --operations");
            }
            if let Some(path) = forecasts {
                let stats = pipeline
                    .ingest_forecast_file(&path, now)
                    .with_context(|| format!("Failed to ingest {}", path.display()))?;
                println!("forecasts: {stats}");
            }
            if let Some(path) = operations {
                let stats = pipeline
                    .ingest_operation_file(&path, now)
                    .with_context(|| format!("Failed to ingest {}", path.display()))?;
                println!("operations: {stats}");
            }
        }

        SubCommand::Score { range } => {
            let (start, end) = range.resolve(tomorrow);
            let stats = pipeline.score(start, end).context("Scoring failed")?;
            println!("{stats}");
        }

        SubCommand::Evaluate { range, today: reference } => {
            let (start, end) = range.resolve(yesterday);
            let stats = pipeline
                .evaluate(start, end, reference.unwrap_or(today), now)
                .context("Evaluation failed")?;
            println!("{stats}");
            if stats.route_mismatches() > 0 {
                warn!(
                    count = stats.route_mismatches(),
                    "Route labels need adding to [routes] in config"
                );
            }
        }

        SubCommand::Calibrate { end, format } => {
            let proposal = pipeline
                .calibrate(end.unwrap_or(yesterday), now)
                .context("Calibration failed")?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&proposal)?);
            } else {
                println!("{}", render_proposal(&proposal));
            }
        }

        SubCommand::Apply { proposal } => {
            let applied = pipeline
                .apply(proposal)
                .with_context(|| format!("Failed to apply proposal {proposal}"))?;
            println!("Profile version {} is now active", applied.version);
        }

        SubCommand::Proposals { id: Some(id), format } => {
            let Some(proposal) = pipeline.store().proposal(id)? else {
                bail!("No calibration proposal with id {id}");
            };
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&proposal)?);
            } else {
                println!("{}", render_proposal(&proposal));
            }
        }

        SubCommand::Proposals { id: None, format } => {
            let proposals = pipeline.store().proposals()?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&proposals)?);
            } else if proposals.is_empty() {
                println!("No calibration proposals");
            } else {
                for p in &proposals {
                    println!(
                        "#{:<4} {} to {}  base v{}  {}{}",
                        p.id,
                        p.window_start,
                        p.window_end,
                        p.base_version,
                        if p.changed() { "changes proposed" } else { "no changes" },
                        if p.applied { "  [applied]" } else { "" }
                    );
                }
            }
        }

        SubCommand::Report {
            from,
            to,
            outcomes,
            format,
        } => {
            let end = to.unwrap_or(yesterday);
            let start = from.unwrap_or_else(|| end - chrono::Duration::days(6));
            let report = pipeline
                .report(start, end, outcomes)
                .context("Failed to build report")?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.render_text());
            }
        }

        SubCommand::CheckConfig => {}
    }

    if let Err(e) = pipeline.store().flush() {
        error!("Failed to flush store on exit: {}", e);
    }
    Ok(())
}
