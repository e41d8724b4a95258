//! Volume spike detection.
//!
//! A session is anomalous when its volume sits more than `sigma_threshold`
//! sample standard deviations above the rolling baseline of the preceding
//! window. The baseline never includes the session being tested.

use super::{ensure_len, AgentKind, AgentReport, VolumeAgent};
use crate::config::AnomalyConfig;
use crate::error::AnalysisError;
use crate::models::{PriceContext, PriceSeries, Significance, VolumePattern, VolumeStatus};
use crate::stats::{mean, percentile_rank, rolling_mean, rolling_std, round_to, tail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One detected volume spike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub date: NaiveDate,
    pub volume_ratio: f64,
    pub z_score: f64,
    pub significance: Significance,
    pub price_change_pct: f64,
    pub price_context: PriceContext,
}

/// The latest session against its recent history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentVolumeStatus {
    pub current_volume: f64,
    pub volume_ma_20: f64,
    pub volume_ratio: f64,
    pub percentile: f64,
    pub current_status: VolumeStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    /// Most recent anomalies, oldest first.
    pub significant_anomalies: Vec<Anomaly>,
    pub total_anomalies: usize,
    pub anomaly_frequency: Significance,
    pub volume_patterns: Vec<VolumePattern>,
    pub current_volume_status: CurrentVolumeStatus,
}

impl AnomalyReport {
    /// Retained anomalies graded high significance.
    pub fn high_significance_count(&self) -> usize {
        self.significant_anomalies
            .iter()
            .filter(|a| a.significance == Significance::High)
            .count()
    }

    pub fn has_high_significance(&self) -> bool {
        self.high_significance_count() > 0
    }
}

pub struct AnomalyAgent {
    config: AnomalyConfig,
}

impl AnomalyAgent {
    pub fn new(config: AnomalyConfig) -> Self {
        Self { config }
    }

    fn detect(&self, series: &PriceSeries, ma: &[Option<f64>], sd: &[Option<f64>]) -> Vec<Anomaly> {
        // the baseline for bar i ends at i - 1
        let window = self.config.window.max(1);
        let mut anomalies = Vec::new();

        for i in window..series.len() {
            let (Some(base), Some(spread)) = (ma[i - 1], sd[i - 1]) else {
                continue;
            };
            if base <= 0.0 || spread <= 0.0 {
                continue;
            }

            let bar = &series.bars[i];
            let z = (bar.volume - base) / spread;
            if z <= self.config.sigma_threshold {
                continue;
            }

            let prev_close = series.bars[i - 1].close;
            let change_pct = if prev_close != 0.0 {
                (bar.close - prev_close) / prev_close * 100.0
            } else {
                0.0
            };

            anomalies.push(Anomaly {
                date: bar.date,
                volume_ratio: round_to(bar.volume / base, 2),
                z_score: round_to(z, 2),
                significance: self.grade(z),
                price_change_pct: round_to(change_pct, 2),
                price_context: self.price_context(change_pct),
            });
        }

        anomalies
    }

    fn grade(&self, z: f64) -> Significance {
        if z > self.config.high_sigma {
            Significance::High
        } else if z > self.config.medium_sigma {
            Significance::Medium
        } else {
            Significance::Low
        }
    }

    fn price_context(&self, change_pct: f64) -> PriceContext {
        if change_pct > self.config.context_move_pct {
            PriceContext::Breakout
        } else if change_pct < -self.config.context_move_pct {
            PriceContext::Breakdown
        } else {
            PriceContext::Consolidation
        }
    }

    fn current_status(&self, volumes: &[f64], ma: &[Option<f64>]) -> CurrentVolumeStatus {
        let current = volumes.last().copied().unwrap_or(0.0);
        let baseline = ma.last().copied().flatten().unwrap_or(0.0);
        let ratio = if baseline > 0.0 { current / baseline } else { 0.0 };
        let lookback = tail(volumes, self.config.status_lookback.max(1));
        let percentile = percentile_rank(lookback, current);

        CurrentVolumeStatus {
            current_volume: current,
            volume_ma_20: round_to(baseline, 2),
            volume_ratio: round_to(ratio, 2),
            percentile: round_to(percentile, 1),
            current_status: status_from_percentile(percentile),
        }
    }
}

fn frequency(total: usize, bars: usize) -> Significance {
    let rate = if bars > 0 { total as f64 / bars as f64 } else { 0.0 };
    if rate > 0.10 {
        Significance::High
    } else if rate > 0.05 {
        Significance::Medium
    } else {
        Significance::Low
    }
}

fn status_from_percentile(p: f64) -> VolumeStatus {
    match p {
        p if p >= 95.0 => VolumeStatus::ExtremelyHigh,
        p if p >= 90.0 => VolumeStatus::VeryHigh,
        p if p >= 75.0 => VolumeStatus::High,
        p if p > 25.0 => VolumeStatus::Normal,
        p if p > 10.0 => VolumeStatus::Low,
        p if p > 5.0 => VolumeStatus::VeryLow,
        _ => VolumeStatus::ExtremelyLow,
    }
}

impl VolumeAgent for AnomalyAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::VolumeAnomaly
    }

    fn min_bars(&self) -> usize {
        self.config.window.max(2)
    }

    fn analyze(&self, series: &PriceSeries) -> Result<AgentReport, AnalysisError> {
        ensure_len(series, self.min_bars())?;

        let volumes = series.volumes();
        let ma = rolling_mean(&volumes, self.config.window);
        let sd = rolling_std(&volumes, self.config.window);

        let anomalies = self.detect(series, &ma, &sd);
        let total = anomalies.len();
        let retained = anomalies[total.saturating_sub(self.config.max_retained)..].to_vec();

        let mut patterns = Vec::new();
        if retained.len() >= 3 {
            patterns.push(VolumePattern::FrequentSpikes);
        }

        let recent_ma: Vec<f64> = tail(&ma, 5).iter().filter_map(|m| *m).collect();
        if let (Some(recent), Some(baseline)) = (mean(tail(&volumes, 5)), mean(&recent_ma)) {
            if baseline > 0.0 {
                let ratio = recent / baseline;
                if ratio > 1.2 {
                    patterns.push(VolumePattern::ElevatedBaseline);
                } else if ratio < 0.8 {
                    patterns.push(VolumePattern::DecliningInterest);
                }
            }
        }

        debug!(
            "{}: {} volume anomalies over {} bars",
            series.symbol,
            total,
            series.len()
        );

        Ok(AgentReport::VolumeAnomaly(AnomalyReport {
            significant_anomalies: retained,
            total_anomalies: total,
            anomaly_frequency: frequency(total, series.len()),
            volume_patterns: patterns,
            current_volume_status: self.current_status(&volumes, &ma),
        }))
    }
}
