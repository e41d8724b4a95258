//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.volume-agents.toml` files. Every agent threshold lives here so a run can
//! be tuned without recompiling.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".volume-agents.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Agent selection and thresholds.
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Agent health thresholds.
    #[serde(default)]
    pub health: HealthConfig,

    /// Input discovery settings.
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory reports are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of symbols analyzed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Series shorter than this are rejected before any agent runs.
    #[serde(default = "default_min_bars")]
    pub min_bars: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            verbose: false,
            concurrency: default_concurrency(),
            min_bars: default_min_bars(),
        }
    }
}

fn default_output_dir() -> String {
    "volume_reports".to_string()
}

fn default_concurrency() -> usize {
    2
}

fn default_min_bars() -> usize {
    10
}

/// Which agents run, and the thresholds each one uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Agent names to run. Empty means all of them.
    #[serde(default)]
    pub enabled: Vec<String>,

    #[serde(default)]
    pub anomaly: AnomalyConfig,

    #[serde(default)]
    pub institutional: InstitutionalConfig,

    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    #[serde(default)]
    pub levels: LevelsConfig,

    #[serde(default)]
    pub momentum: MomentumConfig,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            enabled: Vec::new(),
            anomaly: AnomalyConfig::default(),
            institutional: InstitutionalConfig::default(),
            confirmation: ConfirmationConfig::default(),
            levels: LevelsConfig::default(),
            momentum: MomentumConfig::default(),
        }
    }
}

/// Volume spike detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Rolling window for the volume baseline.
    #[serde(default = "default_window")]
    pub window: usize,

    /// z-score a session must exceed to count as an anomaly.
    #[serde(default = "default_sigma")]
    pub sigma_threshold: f64,

    /// z-score above which an anomaly is high significance.
    #[serde(default = "default_high_sigma")]
    pub high_sigma: f64,

    /// z-score above which an anomaly is medium significance.
    #[serde(default = "default_medium_sigma")]
    pub medium_sigma: f64,

    /// Number of most recent anomalies kept in the report.
    #[serde(default = "default_max_retained")]
    pub max_retained: usize,

    /// Close-to-close move (percent) that makes a spike a breakout/breakdown.
    #[serde(default = "default_context_move")]
    pub context_move_pct: f64,

    /// Bars used to rank the latest volume.
    #[serde(default = "default_status_lookback")]
    pub status_lookback: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            sigma_threshold: default_sigma(),
            high_sigma: default_high_sigma(),
            medium_sigma: default_medium_sigma(),
            max_retained: default_max_retained(),
            context_move_pct: default_context_move(),
            status_lookback: default_status_lookback(),
        }
    }
}

fn default_window() -> usize {
    20
}

fn default_sigma() -> f64 {
    2.0
}

fn default_high_sigma() -> f64 {
    3.0
}

fn default_medium_sigma() -> f64 {
    2.5
}

fn default_max_retained() -> usize {
    10
}

fn default_context_move() -> f64 {
    3.0
}

fn default_status_lookback() -> usize {
    60
}

/// Large-volume day classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstitutionalConfig {
    #[serde(default = "default_window")]
    pub window: usize,

    /// Standard deviations above the mean that make a large-volume day.
    #[serde(default = "default_sigma")]
    pub sigma_threshold: f64,

    /// Average return (fraction) on large days that marks accumulation or
    /// distribution.
    #[serde(default = "default_move_threshold")]
    pub move_threshold: f64,

    /// Number of recent large days listed in the report.
    #[serde(default = "default_recent_days")]
    pub recent_days: usize,
}

impl Default for InstitutionalConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            sigma_threshold: default_sigma(),
            move_threshold: default_move_threshold(),
            recent_days: default_recent_days(),
        }
    }
}

fn default_move_threshold() -> f64 {
    0.01
}

fn default_recent_days() -> usize {
    5
}

/// Price/volume trend confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default = "default_window")]
    pub window: usize,

    #[serde(default = "default_long_window")]
    pub long_window: usize,

    /// Normalized slope separating a trend from sideways drift.
    #[serde(default = "default_trend_threshold")]
    pub trend_threshold: f64,

    /// Bars scanned for recent price movements.
    #[serde(default = "default_movement_lookback")]
    pub movement_lookback: usize,

    /// Minimum absolute close-to-close move (percent) to list a movement.
    #[serde(default = "default_movement_min_pct")]
    pub movement_min_pct: f64,

    #[serde(default = "default_confirming_ratio")]
    pub confirming_ratio: f64,

    #[serde(default = "default_diverging_ratio")]
    pub diverging_ratio: f64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            long_window: default_long_window(),
            trend_threshold: default_trend_threshold(),
            movement_lookback: default_movement_lookback(),
            movement_min_pct: default_movement_min_pct(),
            confirming_ratio: default_confirming_ratio(),
            diverging_ratio: default_diverging_ratio(),
        }
    }
}

fn default_long_window() -> usize {
    50
}

fn default_trend_threshold() -> f64 {
    0.001
}

fn default_movement_lookback() -> usize {
    10
}

fn default_movement_min_pct() -> f64 {
    1.0
}

fn default_confirming_ratio() -> f64 {
    1.2
}

fn default_diverging_ratio() -> f64 {
    0.8
}

/// Volume-at-price support and resistance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelsConfig {
    /// Price bins in the volume profile.
    #[serde(default = "default_bins")]
    pub bins: usize,

    /// Share of bins (by volume) treated as significant levels.
    #[serde(default = "default_top_fraction")]
    pub top_fraction: f64,

    /// Maximum support and resistance levels reported on each side.
    #[serde(default = "default_max_levels")]
    pub max_levels: usize,

    /// Share of volume the value area must hold.
    #[serde(default = "default_value_area")]
    pub value_area_pct: f64,

    #[serde(default = "default_levels_min_bars")]
    pub min_bars: usize,
}

impl Default for LevelsConfig {
    fn default() -> Self {
        Self {
            bins: default_bins(),
            top_fraction: default_top_fraction(),
            max_levels: default_max_levels(),
            value_area_pct: default_value_area(),
            min_bars: default_levels_min_bars(),
        }
    }
}

fn default_bins() -> usize {
    20
}

fn default_top_fraction() -> f64 {
    0.3
}

fn default_max_levels() -> usize {
    3
}

fn default_value_area() -> f64 {
    0.7
}

fn default_levels_min_bars() -> usize {
    50
}

/// Volume trend and momentum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumConfig {
    #[serde(default = "default_short_window")]
    pub short_window: usize,

    #[serde(default = "default_window")]
    pub window: usize,

    #[serde(default = "default_long_window")]
    pub long_window: usize,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            short_window: default_short_window(),
            window: default_window(),
            long_window: default_long_window(),
        }
    }
}

fn default_short_window() -> usize {
    5
}

/// Thresholds on the share of agents that succeeded for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// At or above this percentage the system is healthy.
    #[serde(default = "default_healthy_pct")]
    pub healthy_pct: f64,

    /// Below this percentage the integrated result is replaced by a degraded one.
    #[serde(default = "default_degraded_pct")]
    pub degraded_pct: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            healthy_pct: default_healthy_pct(),
            degraded_pct: default_degraded_pct(),
        }
    }
}

fn default_healthy_pct() -> f64 {
    80.0
}

fn default_degraded_pct() -> f64 {
    40.0
}

/// Input discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// File extensions treated as OHLCV input.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Maximum input files per run.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Maximum directory depth when walking an input directory.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            max_files: default_max_files(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["csv".to_string()]
}

fn default_max_files() -> usize {
    500
}

fn default_max_depth() -> usize {
    3
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the full volume profile table in markdown reports.
    #[serde(default = "default_true")]
    pub include_profile: bool,

    /// Maximum anomalies listed per report.
    #[serde(default = "default_max_listed")]
    pub max_anomalies_listed: usize,

    /// Write summary.csv next to summary.md.
    #[serde(default = "default_true")]
    pub write_csv_summary: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_profile: true,
            max_anomalies_listed: default_max_listed(),
            write_csv_summary: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_listed() -> usize {
    10
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid config file {}: {}", path.display(), e))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings. Options
    /// without a CLI default only override when given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref dir) = args.output_dir {
            self.general.output_dir = dir.display().to_string();
        }

        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }

        if let Some(min_bars) = args.min_bars {
            self.general.min_bars = min_bars;
        }

        if let Some(ref agents) = args.agents {
            self.agents.enabled = agents.clone();
        }

        if let Some(max_files) = args.max_files {
            self.loader.max_files = max_files;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check the settings every agent indexes or divides by.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let agents = &self.agents;
        let positive = [
            ("general.concurrency", self.general.concurrency),
            ("agents.anomaly.window", agents.anomaly.window),
            ("agents.anomaly.max_retained", agents.anomaly.max_retained),
            ("agents.anomaly.status_lookback", agents.anomaly.status_lookback),
            ("agents.institutional.window", agents.institutional.window),
            ("agents.confirmation.window", agents.confirmation.window),
            ("agents.confirmation.long_window", agents.confirmation.long_window),
            ("agents.levels.bins", agents.levels.bins),
            ("agents.levels.max_levels", agents.levels.max_levels),
            ("agents.momentum.short_window", agents.momentum.short_window),
            ("agents.momentum.window", agents.momentum.window),
            ("agents.momentum.long_window", agents.momentum.long_window),
            ("loader.max_files", self.loader.max_files),
            ("loader.max_depth", self.loader.max_depth),
        ];

        for (key, value) in positive {
            if value == 0 {
                return Err(format!("{} must be at least 1", key));
            }
        }

        if agents.confirmation.long_window < agents.confirmation.window {
            return Err(
                "agents.confirmation.long_window must not be shorter than window".to_string(),
            );
        }

        if !(0.0..=1.0).contains(&agents.levels.value_area_pct) {
            return Err("agents.levels.value_area_pct must be between 0 and 1".to_string());
        }

        if self.health.degraded_pct > self.health.healthy_pct {
            return Err("health.degraded_pct must not exceed health.healthy_pct".to_string());
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.concurrency, 2);
        assert_eq!(config.agents.anomaly.window, 20);
        assert_eq!(config.agents.anomaly.sigma_threshold, 2.0);
        assert_eq!(config.agents.levels.bins, 20);
        assert_eq!(config.health.degraded_pct, 40.0);
        assert!(config.loader.extensions.contains(&"csv".to_string()));
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
[general]
output_dir = "out"
verbose = true

[agents]
enabled = ["volume_anomaly", "volume_momentum"]

[agents.anomaly]
sigma_threshold = 2.5

[loader]
extensions = ["csv", "txt"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output_dir, "out");
        assert!(config.general.verbose);
        assert_eq!(config.general.concurrency, 2);
        assert_eq!(config.agents.enabled.len(), 2);
        assert_eq!(config.agents.anomaly.sigma_threshold, 2.5);
        assert_eq!(config.agents.anomaly.window, 20);
        assert_eq!(config.agents.levels.min_bars, 50);
        assert_eq!(config.loader.extensions, vec!["csv", "txt"]);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[agents.anomaly]"));
        assert!(toml_str.contains("[health]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.agents.confirmation.long_window, 50);
    }

    #[test]
    fn test_merge_with_args_precedence() {
        use crate::cli::Args;
        use clap::Parser;

        let mut config: Config = toml::from_str(
            "[general]\nconcurrency = 6\nmin_bars = 30\n\n[loader]\nmax_files = 3\n",
        )
        .unwrap();

        // flags left off keep the file's values
        config.merge_with_args(&Args::parse_from(["volume-agents", "--data", "."]));
        assert_eq!(config.loader.max_files, 3);
        assert_eq!(config.general.concurrency, 6);
        assert_eq!(config.general.min_bars, 30);
        assert!(config.agents.enabled.is_empty());

        config.merge_with_args(&Args::parse_from([
            "volume-agents",
            "--data",
            ".",
            "--max-files",
            "7",
            "--concurrency",
            "1",
            "--min-bars",
            "15",
            "--agents",
            "volume_anomaly,volume_momentum",
            "--output-dir",
            "out",
        ]));
        assert_eq!(config.loader.max_files, 7);
        assert_eq!(config.general.concurrency, 1);
        assert_eq!(config.general.min_bars, 15);
        assert_eq!(config.agents.enabled, vec!["volume_anomaly", "volume_momentum"]);
        assert_eq!(config.general.output_dir, "out");
    }

    #[test]
    fn test_validate_rejects_zero_windows() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.agents.anomaly.window = 0;
        assert!(config.validate().unwrap_err().contains("agents.anomaly.window"));

        let mut config = Config::default();
        config.agents.momentum.short_window = 0;
        assert!(config
            .validate()
            .unwrap_err()
            .contains("agents.momentum.short_window"));

        let mut config = Config::default();
        config.agents.levels.bins = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.agents.confirmation.long_window = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[agents.anomaly]\nwindow = 0\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("agents.anomaly.window"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[general]\nconcurrency = 6\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.general.concurrency, 6);
        assert_eq!(config.general.min_bars, 10);
    }
}
