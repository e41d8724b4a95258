//! volume-agents - volume analysis for OHLCV stock data
//!
//! Runs a set of volume agents over daily OHLCV CSV files and writes a
//! report per symbol plus a batch summary.
//!
//! Exit codes:
//!   0 - Success (no symbol at or above --fail-on-risk, or no threshold set)
//!   1 - Runtime error (bad input path, config, output directory, etc.)
//!   2 - A symbol's integrated risk is at or above the --fail-on-risk level

mod agents;
mod analysis;
mod cli;
mod config;
mod error;
mod loader;
mod models;
mod report;
mod stats;

use analysis::{Analyzer, BatchSummary};
use anyhow::{Context, Result};
use cli::{Args, FailOnRisk};
use config::{Config, CONFIG_FILE_NAME};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use models::{RiskLevel, StockAnalysis};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config and --list-agents early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    if args.list_agents {
        handle_list_agents();
        return Ok(());
    }

    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    if let Err(e) = config.validate() {
        eprintln!("Error: invalid configuration: {}", e);
        std::process::exit(1);
    }

    // Initialize logging
    init_logging(&args, &config)?;

    info!("volume-agents v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {}", config_source);

    // Run the analysis
    match run_analysis(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .volume-agents.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to tune agent windows, thresholds, health cut-offs, and more.");
    Ok(())
}

/// Handle --list-agents: print the registry.
fn handle_list_agents() {
    println!("Available agents:\n");
    for kind in agents::AgentKind::ALL {
        println!("  {:<24} {}", kind.as_str(), kind.description());
    }
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) -> Result<()> {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run the complete analysis workflow. Returns exit code (0 or 2).
async fn run_analysis(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let data = args
        .data
        .clone()
        .context("An input path is required (--data)")?;

    // Step 1: Find the input files
    println!("📥 Discovering input files: {}", data.display());
    let files = loader::discover(&data, &config.loader)
        .with_context(|| format!("Failed to read input path {}", data.display()))?;
    info!("Found {} input file(s)", files.len());

    // Handle --dry-run: list files and exit
    if args.dry_run {
        return handle_dry_run(&files);
    }

    if files.is_empty() {
        anyhow::bail!(
            "No input files with extensions [{}] found in {}",
            config.loader.extensions.join(", "),
            data.display()
        );
    }

    // Step 2: Build the agents
    let analyzer = Analyzer::from_config(&config).context("Failed to build agents")?;
    let names: Vec<&str> = analyzer.agent_kinds().iter().map(|k| k.as_str()).collect();

    println!("🤖 Running volume agents...");
    println!("   Agents: {}", names.join(", "));
    println!("   Symbols: {}", files.len());
    println!("   Concurrency: {}", config.general.concurrency);

    // Step 3: Analyze every symbol
    let progress = if args.quiet {
        None
    } else {
        Some(progress_bar(files.len()))
    };

    let analyses = analyze_batch(
        files,
        args.symbol.clone(),
        Arc::new(analyzer),
        config.general.concurrency,
        progress.clone(),
    )
    .await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    // Step 4: Write the reports
    println!("\n📝 Generating reports...");

    let output_dir = PathBuf::from(&config.general.output_dir);
    std::fs::create_dir_all(&output_dir).with_context(|| {
        format!("Failed to create output directory {}", output_dir.display())
    })?;

    let paths =
        report::write_stock_reports(&output_dir, &analyses, args.format, &config.report)?;
    debug!("Wrote {} report(s)", paths.len());

    let duration = start_time.elapsed().as_secs_f64();
    let summary = BatchSummary::from_analyses(&analyses, duration);

    let summary_path = output_dir.join(report::SUMMARY_MARKDOWN);
    std::fs::write(
        &summary_path,
        report::generate_summary_markdown(&summary, &analyses),
    )
    .with_context(|| format!("Failed to write summary to {}", summary_path.display()))?;

    if config.report.write_csv_summary {
        report::write_summary_csv(&output_dir.join(report::SUMMARY_CSV), &analyses)?;
    }

    // Print summary
    print_summary(&summary);
    println!(
        "\n✅ Analysis complete! Reports saved to: {}",
        output_dir.display()
    );

    // Check --fail-on-risk threshold
    if let Some(fail_level) = args.fail_on_risk {
        let threshold = fail_on_to_risk(fail_level);
        let flagged = symbols_at_risk(&analyses, threshold);

        if !flagged.is_empty() {
            eprintln!(
                "\n⛔ Risk at or above {} for: {}. Failing (exit code 2).",
                threshold,
                flagged.join(", ")
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Symbols whose integrated risk is at or above `threshold`. Degraded
/// analyses carry high risk and are included; symbols that failed to load
/// have no integrated reading and are not.
fn symbols_at_risk(analyses: &[StockAnalysis], threshold: RiskLevel) -> Vec<&str> {
    analyses
        .iter()
        .filter(|a| a.risk_level().is_some_and(|r| r >= threshold))
        .map(|a| a.symbol.as_str())
        .collect()
}

/// Analyze every file, `concurrency` at a time. Results are sorted by symbol,
/// then source.
async fn analyze_batch(
    files: Vec<PathBuf>,
    symbol: Option<String>,
    analyzer: Arc<Analyzer>,
    concurrency: usize,
    progress: Option<ProgressBar>,
) -> Vec<StockAnalysis> {
    let mut analyses: Vec<StockAnalysis> = stream::iter(files)
        .map(|path| {
            let analyzer = Arc::clone(&analyzer);
            let symbol = symbol.clone();
            let progress = progress.clone();
            async move {
                let source = path.display().to_string();
                let fallback = loader::symbol_from_path(&path);
                let result = tokio::task::spawn_blocking(move || {
                    analyze_file(&analyzer, &path, symbol.as_deref())
                })
                .await;

                let analysis = match result {
                    Ok(analysis) => analysis,
                    Err(e) => {
                        error!("{}: analysis task failed: {}", source, e);
                        StockAnalysis::failed(fallback, source, format!("Task failed: {}", e))
                    }
                };

                if let Some(pb) = progress {
                    pb.set_message(analysis.symbol.clone());
                    pb.inc(1);
                }
                analysis
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    analyses.sort_by(|a, b| {
        a.symbol
            .cmp(&b.symbol)
            .then_with(|| a.source.cmp(&b.source))
    });
    analyses
}

/// Load one file and run the analyzer over it. Load errors become a failed
/// result for that symbol.
fn analyze_file(analyzer: &Analyzer, path: &Path, symbol: Option<&str>) -> StockAnalysis {
    let source = path.display().to_string();

    match loader::load_csv(path, symbol) {
        Ok(series) => analyzer.analyze(&series, &source),
        Err(e) => {
            warn!("{}: {}", source, e);
            let symbol = symbol
                .map(|s| s.trim().to_uppercase())
                .unwrap_or_else(|| loader::symbol_from_path(path));
            StockAnalysis::failed(symbol, source, e.to_string())
        }
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

fn print_summary(summary: &BatchSummary) {
    println!("\n📊 Analysis Summary:");
    println!(
        "   Symbols: {} | ✅ Successful: {} | ❌ Failed: {} | ⚠️ Degraded: {}",
        summary.total_symbols, summary.successful, summary.failed, summary.degraded
    );
    println!("   Average quality: {:.1}", summary.average_quality);
    println!(
        "   Anomaly detection rate: {:.1}%",
        summary.anomaly_detection_rate
    );

    if !summary.signal_distribution.is_empty() {
        let signals: Vec<String> = summary
            .signal_distribution
            .iter()
            .map(|(signal, count)| format!("{} {}: {}", signal.emoji(), signal, count))
            .collect();
        println!("   Signals: {}", signals.join(" | "));
    }

    if !summary.risk_distribution.is_empty() {
        let risks: Vec<String> = summary
            .risk_distribution
            .iter()
            .map(|(risk, count)| format!("{} {}: {}", risk.emoji(), risk, count))
            .collect();
        println!("   Risk: {}", risks.join(" | "));
    }

    println!("   Duration: {:.1}s", summary.duration_seconds);
}

/// Handle --dry-run: print what would be analyzed, exit.
fn handle_dry_run(files: &[PathBuf]) -> Result<i32> {
    println!("\n🔍 Dry run: listing input files (no analysis)...\n");

    if files.is_empty() {
        println!("   No matching input files found.");
    } else {
        println!("   Found {} files that would be analyzed:\n", files.len());
        for file in files {
            println!(
                "     📄 {} ({})",
                file.display(),
                loader::symbol_from_path(file)
            );
        }
        println!("\n   Total: {} files", files.len());
    }

    println!("\n✅ Dry run complete. Nothing was analyzed.");
    Ok(0)
}

/// Convert FailOnRisk to RiskLevel for comparison.
fn fail_on_to_risk(level: FailOnRisk) -> RiskLevel {
    match level {
        FailOnRisk::Low => RiskLevel::Low,
        FailOnRisk::Medium => RiskLevel::Medium,
        FailOnRisk::High => RiskLevel::High,
    }
}

/// Load configuration from file or use defaults. Runs before logging is set
/// up, so it also returns where the configuration came from.
fn load_config(args: &Args) -> Result<(Config, String)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, format!("loaded from {}", config_path.display())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, format!("loaded from {}", CONFIG_FILE_NAME))),
        Ok(None) => Ok((Config::default(), "defaults".to_string())),
        Err(e) => {
            eprintln!("⚠️  Failed to load config: {:#}", e);
            Ok((Config::default(), "defaults (config file invalid)".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_csv(dir: &Path, name: &str, rows: usize) -> PathBuf {
        let mut content = String::from("Date,Open,High,Low,Close,Volume\n");
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for i in 0..rows {
            let date = start + chrono::Duration::days(i as i64);
            let close = 100.0 + (i % 5) as f64;
            let volume = if i % 2 == 0 { 1_050 } else { 950 };
            content.push_str(&format!(
                "{},{:.2},{:.2},{:.2},{:.2},{}\n",
                date,
                close,
                close * 1.01,
                close * 0.99,
                close,
                volume
            ));
        }
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_analyze_batch_sorted_and_isolated() {
        let dir = tempfile::TempDir::new().unwrap();
        let files = vec![
            write_csv(dir.path(), "zeta.csv", 80),
            write_csv(dir.path(), "alpha.csv", 80),
            write_csv(dir.path(), "broken.csv", 0),
        ];
        let analyzer = Arc::new(Analyzer::from_config(&Config::default()).unwrap());

        let analyses = tokio_test::block_on(analyze_batch(files, None, analyzer, 2, None));

        let symbols: Vec<&str> = analyses.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ALPHA", "BROKEN", "ZETA"]);
        assert!(analyses[0].is_success());
        assert!(analyses[1].error.is_some());
        assert!(analyses[2].is_success());
    }

    #[test]
    fn test_analyze_file_symbol_override() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_csv(dir.path(), "data.csv", 60);
        let analyzer = Analyzer::from_config(&Config::default()).unwrap();

        let analysis = analyze_file(&analyzer, &path, Some("INFY"));
        assert_eq!(analysis.symbol, "INFY");
        assert_eq!(analysis.bars, 60);
    }

    #[test]
    fn test_symbols_at_risk() {
        let dir = tempfile::TempDir::new().unwrap();
        let healthy = write_csv(dir.path(), "good.csv", 80);
        let short = write_csv(dir.path(), "short.csv", 30);

        let analyzer = Analyzer::from_config(&Config::default()).unwrap();
        let good = analyze_file(&analyzer, &healthy, None);

        let mut config = Config::default();
        config.agents.enabled = vec![
            "support_resistance".to_string(),
            "volume_momentum".to_string(),
        ];
        config.agents.momentum.window = 40;
        let degraded = analyze_file(&Analyzer::from_config(&config).unwrap(), &short, None);
        assert!(degraded.degraded);

        let missing = analyze_file(&analyzer, &dir.path().join("missing.csv"), None);
        assert!(missing.error.is_some());

        let good_risk = good.risk_level().unwrap();
        let analyses = vec![good, degraded, missing];

        // only the degraded symbol reaches high risk
        assert_eq!(symbols_at_risk(&analyses, RiskLevel::High), vec!["SHORT"]);

        let at_good = symbols_at_risk(&analyses, good_risk);
        assert!(at_good.contains(&"GOOD"));
        assert!(!at_good.contains(&"MISSING"));
    }

    #[test]
    fn test_duplicate_symbols_sorted_by_source() {
        let dir = tempfile::TempDir::new().unwrap();
        for sub in ["us", "eu"] {
            std::fs::create_dir(dir.path().join(sub)).unwrap();
        }
        let files = vec![
            write_csv(&dir.path().join("us"), "aapl.csv", 60),
            write_csv(&dir.path().join("eu"), "aapl.csv", 60),
        ];
        let analyzer = Arc::new(Analyzer::from_config(&Config::default()).unwrap());

        let analyses = tokio_test::block_on(analyze_batch(files, None, analyzer, 2, None));
        assert_eq!(analyses.len(), 2);
        assert!(analyses[0].source < analyses[1].source);
        assert!(analyses[0].source.contains("eu"));
    }

    #[test]
    fn test_fail_on_to_risk_ordering() {
        assert!(RiskLevel::High >= fail_on_to_risk(FailOnRisk::Medium));
        assert!(RiskLevel::Low < fail_on_to_risk(FailOnRisk::Medium));
        assert_eq!(fail_on_to_risk(FailOnRisk::High), RiskLevel::High);
    }
}
