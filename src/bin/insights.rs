//! Insights CLI - Command-line interface for activity insights
//!
//! Commands:
//! - compare: Current period against the previous one from two category payloads
//! - series: Bin a stochastic series, optionally split into current/previous windows
//! - density: Time-of-day density contours from an event payload
//! - fetch-span: Days of history needed to cover a date range and its previous window
//! - config: Print the effective configuration (defaults merged with --config)

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use activity_insights::config::PipelineConfig;
use activity_insights::period::PeriodDeriver;
use activity_insights::pipeline::{DateRange, InsightsProcessor, Request};
use activity_insights::types::{CategoryPayload, EventPayload, StochasticPayload};
use activity_insights::{ComputeError, VERSION};

/// Insights - Dashboard analytics over tracked activity time
#[derive(Parser)]
#[command(name = "insights")]
#[command(version = VERSION)]
#[command(about = "Period comparison, series binning and time-of-day density", long_about = None)]
struct Cli {
    /// Pipeline configuration file (JSON); defaults apply to missing fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the current period with the previous one
    Compare {
        /// Category payload for the current period (use - for stdin)
        #[arg(long)]
        current: PathBuf,

        /// Category payload covering twice the current period
        #[arg(long)]
        combined: PathBuf,

        /// Named categories before the Other bucket
        #[arg(short = 'n', long)]
        categories: Option<usize>,
    },

    /// Bin a stochastic series into its top categories
    Series {
        /// Stochastic payload file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Start of the current window (RFC 3339, inclusive)
        #[arg(long, requires = "to")]
        from: Option<DateTime<Utc>>,

        /// End of the current window (RFC 3339, exclusive)
        #[arg(long, requires = "from")]
        to: Option<DateTime<Utc>>,

        /// Named categories before the Other bucket
        #[arg(short = 'n', long)]
        categories: Option<usize>,
    },

    /// Time-of-day density contours
    Density {
        /// Event payload file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Days of stochastic data to request for a date range
    FetchSpan {
        /// Start of the current window (RFC 3339)
        #[arg(long)]
        from: DateTime<Utc>,

        /// End of the current window (RFC 3339)
        #[arg(long)]
        to: DateTime<Utc>,

        /// Reference time the server counts back from (defaults to now)
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },

    /// Print the effective configuration (defaults merged with --config)
    Config,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), InsightsCliError> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json(&read_input(path)?)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Compare {
            current,
            combined,
            categories,
        } => {
            let request = Request::Comparison {
                current: read_json::<CategoryPayload>(&current)?,
                combined: read_json::<CategoryPayload>(&combined)?,
                category_count: categories,
            };
            cmd_process(config, &request, cli.pretty)
        }

        Commands::Series {
            input,
            from,
            to,
            categories,
        } => {
            let range = match (from, to) {
                (Some(from), Some(to)) => Some(DateRange { from, to }),
                _ => None,
            };
            let request = Request::Series {
                payload: read_json::<StochasticPayload>(&input)?,
                category_count: categories,
                range,
            };
            cmd_process(config, &request, cli.pretty)
        }

        Commands::Density { input } => {
            let request = Request::Density {
                payload: read_json::<EventPayload>(&input)?,
                config: None,
            };
            cmd_process(config, &request, cli.pretty)
        }

        Commands::FetchSpan { from, to, now } => {
            let days = PeriodDeriver::fetch_span_days(from, to, now.unwrap_or_else(Utc::now))?;
            let report = serde_json::json!({
                "from": from,
                "to": to,
                "timeframe_days": days,
            });
            print_json(&report, cli.pretty)
        }

        Commands::Config => {
            println!("{}", config.to_json()?);
            Ok(())
        }
    }
}

fn cmd_process(
    config: PipelineConfig,
    request: &Request,
    pretty: bool,
) -> Result<(), InsightsCliError> {
    let processor = InsightsProcessor::with_config(config)?;
    let response = processor.process(request)?;
    print_json(&response, pretty)
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<(), InsightsCliError> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", output);
    Ok(())
}

fn read_input(path: &Path) -> Result<String, InsightsCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, InsightsCliError> {
    let data = read_input(path)?;
    if data.trim().is_empty() {
        return Err(InsightsCliError::EmptyInput(path.display().to_string()));
    }
    Ok(serde_json::from_str(&data)?)
}

// Error types

#[derive(Debug)]
enum InsightsCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    EmptyInput(String),
}

impl From<io::Error> for InsightsCliError {
    fn from(e: io::Error) -> Self {
        InsightsCliError::Io(e)
    }
}

impl From<ComputeError> for InsightsCliError {
    fn from(e: ComputeError) -> Self {
        InsightsCliError::Compute(e)
    }
}

impl From<serde_json::Error> for InsightsCliError {
    fn from(e: serde_json::Error) -> Self {
        InsightsCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<InsightsCliError> for CliError {
    fn from(e: InsightsCliError) -> Self {
        match e {
            InsightsCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            InsightsCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            InsightsCliError::EmptyInput(path) => CliError {
                code: "EMPTY_INPUT".to_string(),
                message: format!("No data in {}", path),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            InsightsCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::InvalidSnapshot(_) => (
                        "INVALID_SNAPSHOT",
                        "Category durations must be non-negative and names unique",
                    ),
                    ComputeError::EmptySeries(_) => (
                        "EMPTY_SERIES",
                        "Widen the date range or fetch more history",
                    ),
                    ComputeError::InvalidDateRange(_) => {
                        ("INVALID_DATE_RANGE", "--from must be earlier than --to")
                    }
                    ComputeError::InsufficientSamples(_) => (
                        "INSUFFICIENT_SAMPLES",
                        "Density needs events at two or more times of day",
                    ),
                    ComputeError::ParseError(_) => ("PARSE_ERROR", "Check timestamp formats"),
                    ComputeError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
                    ComputeError::InvalidConfig(_) => (
                        "INVALID_CONFIG",
                        "Run 'insights config' to see valid defaults",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
        }
    }
}
