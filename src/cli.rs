//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// volume-agents - volume analysis for OHLCV stock data
///
/// Runs five volume agents (anomaly, institutional activity, confirmation,
/// support/resistance, momentum) over daily OHLCV CSV files and writes a
/// report per symbol plus a batch summary.
///
/// Examples:
///   volume-agents --data ./data/RELIANCE.csv
///   volume-agents --data ./data --format json --concurrency 4
///   volume-agents --data ./data --agents volume_anomaly,volume_momentum
///   volume-agents --data ./data --fail-on-risk high
///   volume-agents --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// OHLCV CSV file, or a directory of them
    #[arg(
        short,
        long,
        value_name = "PATH",
        required_unless_present_any = ["init_config", "list_agents"]
    )]
    pub data: Option<PathBuf>,

    /// Directory reports are written to
    ///
    /// Defaults to the config file's output_dir, or ./volume_reports.
    #[arg(short, long, value_name = "DIR", env = "VOLUME_AGENTS_OUTPUT")]
    pub output_dir: Option<PathBuf>,

    /// Symbol name for a single input file
    ///
    /// By default the symbol is the upper-cased file stem.
    #[arg(short, long, value_name = "SYMBOL")]
    pub symbol: Option<String>,

    /// Agents to run (comma-separated)
    ///
    /// Example: --agents volume_anomaly,support_resistance
    #[arg(short, long, value_name = "AGENTS", value_delimiter = ',')]
    pub agents: Option<Vec<String>>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .volume-agents.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of symbols analyzed concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Maximum number of input files
    ///
    /// Defaults to the config file's max_files, or 500.
    #[arg(long, value_name = "COUNT")]
    pub max_files: Option<usize>,

    /// Reject series shorter than this many bars
    #[arg(long, value_name = "BARS")]
    pub min_bars: Option<usize>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Fail if any symbol's integrated risk is at or above this level
    ///
    /// Useful for screening pipelines. Exit code 2 when the threshold is hit.
    /// Values: low, medium, high
    #[arg(long, value_name = "LEVEL")]
    pub fail_on_risk: Option<FailOnRisk>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: list the input files that would be analyzed and exit
    #[arg(long)]
    pub dry_run: bool,

    /// List the available agents and exit
    #[arg(long)]
    pub list_agents: bool,

    /// Generate a default .volume-agents.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for per-symbol reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

/// Risk level for --fail-on-risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum FailOnRisk {
    Low,
    Medium,
    High,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config || self.list_agents {
            return Ok(());
        }

        let data = match self.data {
            Some(ref data) => data,
            None => return Err("An input path is required (--data)".to_string()),
        };

        if !data.exists() {
            return Err(format!("Input path does not exist: {}", data.display()));
        }

        if self.symbol.is_some() && !data.is_file() {
            return Err("--symbol can only be used with a single input file".to_string());
        }

        if let Some(ref symbol) = self.symbol {
            if symbol.trim().is_empty() {
                return Err("Symbol must not be empty".to_string());
            }
        }

        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 {
                return Err("Concurrency must be at least 1".to_string());
            }
        }

        if self.max_files == Some(0) {
            return Err("Max files must be at least 1".to_string());
        }

        if let Some(ref agents) = self.agents {
            let available = crate::agents::list_agents();
            for name in agents {
                if !available.contains(&name.as_str()) {
                    return Err(format!(
                        "Unknown agent '{}'. Available: {}",
                        name,
                        available.join(", ")
                    ));
                }
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
