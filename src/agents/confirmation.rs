//! Volume confirmation of price trends.
//!
//! Combines four readings:
//! - the correlation between daily price and volume changes;
//! - the direction of the price trend;
//! - divergence between the price and volume regressions;
//! - how volume responded to the most recent sizeable price moves.

use super::{ensure_len, AgentKind, AgentReport, VolumeAgent};
use crate::config::ConfirmationConfig;
use crate::error::AnalysisError;
use crate::models::{
    ConfirmationStatus, CorrelationDirection, CorrelationTrend, DivergenceStrength, DivergenceType,
    PriceSeries, PrimaryTrend, Significance, TrendAlignment, TrendDirection, VolumeResponse,
};
use crate::stats::{mean, pct_change, pearson, round_to, tail, trend_line};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationAnalysis {
    pub correlation_20: f64,
    pub correlation_50: f64,
    pub correlation_direction: CorrelationDirection,
    pub correlation_significance: Significance,
    pub correlation_trend: CorrelationTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub primary_trend: PrimaryTrend,
    /// Regression slope divided by the mean close.
    pub normalized_slope: f64,
    pub trend_strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub divergence_detected: bool,
    pub divergence_type: DivergenceType,
    pub divergence_strength: DivergenceStrength,
    pub divergence_significance: Significance,
    pub price_trend: TrendDirection,
    pub volume_trend: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSignals {
    pub volume_trend_alignment: TrendAlignment,
    pub recent_volume: f64,
    pub volume_ma_20: f64,
    pub volume_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceMovement {
    pub date: NaiveDate,
    pub price_change_pct: f64,
    pub volume_ratio: f64,
    pub volume_response: VolumeResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallAssessment {
    pub confirmation_status: ConfirmationStatus,
    pub confidence_score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationReport {
    pub price_volume_correlation: CorrelationAnalysis,
    pub trend_analysis: TrendAnalysis,
    pub divergence: Divergence,
    pub volume_signals: VolumeSignals,
    pub recent_movements: Vec<PriceMovement>,
    pub overall_assessment: OverallAssessment,
}

pub struct ConfirmationAgent {
    config: ConfirmationConfig,
}

impl ConfirmationAgent {
    pub fn new(config: ConfirmationConfig) -> Self {
        Self { config }
    }

    fn correlation(&self, closes: &[f64], volumes: &[f64]) -> CorrelationAnalysis {
        let price_changes = pct_change(closes);
        let volume_changes = pct_change(volumes);
        let n = price_changes.len();
        let short = self.config.window;
        let long = self.config.long_window;

        let corr_over = |w: usize| {
            pearson(tail(&price_changes, w), tail(&volume_changes, w))
        };

        let c20 = if n >= short { corr_over(short).unwrap_or(0.0) } else { 0.0 };
        let c50 = if n >= long { corr_over(long).unwrap_or(c20) } else { c20 };

        let correlation_direction = if c20 > 0.1 {
            CorrelationDirection::Positive
        } else if c20 < -0.1 {
            CorrelationDirection::Negative
        } else {
            CorrelationDirection::Neutral
        };

        let strength = c20.abs();
        let correlation_significance = if strength > 0.5 {
            Significance::High
        } else if strength > 0.3 {
            Significance::Medium
        } else {
            Significance::Low
        };

        let correlation_trend = if c50 < c20 {
            CorrelationTrend::Increasing
        } else if c50 > c20 {
            CorrelationTrend::Decreasing
        } else {
            CorrelationTrend::Stable
        };

        CorrelationAnalysis {
            correlation_20: round_to(c20, 3),
            correlation_50: round_to(c50, 3),
            correlation_direction,
            correlation_significance,
            correlation_trend,
        }
    }

    fn trend(&self, closes: &[f64]) -> TrendAnalysis {
        let recent = tail(closes, self.config.window);
        let fit = trend_line(recent);
        let normalized = match mean(recent) {
            Some(m) if m > 0.0 => fit.slope / m,
            _ => 0.0,
        };

        let primary_trend = if normalized > self.config.trend_threshold {
            PrimaryTrend::Uptrend
        } else if normalized < -self.config.trend_threshold {
            PrimaryTrend::Downtrend
        } else {
            PrimaryTrend::Sideways
        };

        TrendAnalysis {
            primary_trend,
            normalized_slope: round_to(normalized, 5),
            trend_strength: round_to(fit.r_value.abs(), 3),
        }
    }

    fn divergence(&self, closes: &[f64], volumes: &[f64]) -> Divergence {
        let prices = tail(closes, self.config.window);
        let vols = tail(volumes, self.config.window);
        let price_fit = trend_line(prices);
        let volume_fit = trend_line(vols);

        let direction = |slope: f64| {
            if slope > 0.0 {
                TrendDirection::Up
            } else {
                TrendDirection::Down
            }
        };
        let price_trend = direction(price_fit.slope);
        let volume_trend = direction(volume_fit.slope);

        let divergence_type = match (price_trend, volume_trend) {
            (TrendDirection::Up, TrendDirection::Down) => DivergenceType::Bearish,
            (TrendDirection::Down, TrendDirection::Up) => DivergenceType::Bullish,
            _ => DivergenceType::None,
        };

        let avg_r = (price_fit.r_value.abs() + volume_fit.r_value.abs()) / 2.0;
        let divergence_strength = if avg_r > 0.6 {
            DivergenceStrength::Strong
        } else if avg_r > 0.4 {
            DivergenceStrength::Medium
        } else {
            DivergenceStrength::Weak
        };

        let relative = |slope: f64, xs: &[f64]| match mean(xs) {
            Some(m) if m > 0.0 => (slope / m).abs(),
            _ => 0.0,
        };
        let avg_slope =
            (relative(price_fit.slope, prices) + relative(volume_fit.slope, vols)) / 2.0;
        let divergence_significance = if avg_slope > 0.02 {
            Significance::High
        } else if avg_slope > 0.01 {
            Significance::Medium
        } else {
            Significance::Low
        };

        Divergence {
            divergence_detected: divergence_type != DivergenceType::None,
            divergence_type,
            divergence_strength,
            divergence_significance,
            price_trend,
            volume_trend,
        }
    }

    fn signals(
        &self,
        volumes: &[f64],
        correlation: &CorrelationAnalysis,
        divergence: &Divergence,
    ) -> VolumeSignals {
        let recent = mean(tail(volumes, 5)).unwrap_or(0.0);
        let baseline = mean(tail(volumes, self.config.window)).unwrap_or(0.0);
        let ratio = if baseline > 0.0 { recent / baseline } else { 0.0 };

        let volume_trend_alignment = if divergence.divergence_detected {
            TrendAlignment::Divergence
        } else if ratio > 1.0 {
            if correlation.correlation_significance == Significance::High || ratio > 1.5 {
                TrendAlignment::StrongConfirmation
            } else {
                TrendAlignment::ModerateConfirmation
            }
        } else {
            TrendAlignment::WeakConfirmation
        };

        VolumeSignals {
            volume_trend_alignment,
            recent_volume: round_to(recent, 2),
            volume_ma_20: round_to(baseline, 2),
            volume_ratio: round_to(ratio, 2),
        }
    }

    fn recent_movements(&self, series: &PriceSeries) -> Vec<PriceMovement> {
        let n = series.len();
        let start = n.saturating_sub(self.config.movement_lookback).max(1);
        let mut movements = Vec::new();

        for i in start..n {
            let prev = series.bars[i - 1].close;
            let bar = &series.bars[i];
            if prev == 0.0 {
                continue;
            }
            let change_pct = (bar.close - prev) / prev * 100.0;
            if change_pct.abs() < self.config.movement_min_pct {
                continue;
            }

            let prior: Vec<f64> = series.bars[i.saturating_sub(self.config.window)..i]
                .iter()
                .map(|b| b.volume)
                .collect();
            let ratio = match mean(&prior) {
                Some(m) if m > 0.0 => bar.volume / m,
                _ => 0.0,
            };

            let volume_response = if ratio >= self.config.confirming_ratio {
                VolumeResponse::Confirming
            } else if ratio <= self.config.diverging_ratio {
                VolumeResponse::Diverging
            } else {
                VolumeResponse::Neutral
            };

            movements.push(PriceMovement {
                date: bar.date,
                price_change_pct: round_to(change_pct, 2),
                volume_ratio: round_to(ratio, 2),
                volume_response,
            });
        }

        movements
    }
}

fn assess(alignment: TrendAlignment, correlation: &CorrelationAnalysis) -> OverallAssessment {
    let (confirmation_status, base) = match alignment {
        TrendAlignment::StrongConfirmation => (ConfirmationStatus::VolumeConfirmsPrice, 85),
        TrendAlignment::ModerateConfirmation => (ConfirmationStatus::VolumeConfirmsPrice, 70),
        TrendAlignment::WeakConfirmation => (ConfirmationStatus::Inconclusive, 50),
        TrendAlignment::Divergence => (ConfirmationStatus::VolumeDivergesFromPrice, 60),
    };
    let bonus = if correlation.correlation_significance == Significance::High {
        5
    } else {
        0
    };

    OverallAssessment {
        confirmation_status,
        confidence_score: (base + bonus).min(100),
    }
}

impl VolumeAgent for ConfirmationAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::VolumeConfirmation
    }

    fn min_bars(&self) -> usize {
        self.config.window.max(3)
    }

    fn analyze(&self, series: &PriceSeries) -> Result<AgentReport, AnalysisError> {
        ensure_len(series, self.min_bars())?;

        let closes = series.closes();
        let volumes = series.volumes();

        let price_volume_correlation = self.correlation(&closes, &volumes);
        let trend_analysis = self.trend(&closes);
        let divergence = self.divergence(&closes, &volumes);
        let volume_signals = self.signals(&volumes, &price_volume_correlation, &divergence);
        let overall_assessment = assess(
            volume_signals.volume_trend_alignment,
            &price_volume_correlation,
        );

        Ok(AgentReport::VolumeConfirmation(ConfirmationReport {
            recent_movements: self.recent_movements(series),
            price_volume_correlation,
            trend_analysis,
            divergence,
            volume_signals,
            overall_assessment,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{noisy_volumes, series};

    fn run(closes: &[f64], volumes: &[f64]) -> ConfirmationReport {
        let agent = ConfirmationAgent::new(ConfirmationConfig::default());
        match agent.analyze(&series(closes, volumes)).unwrap() {
            AgentReport::VolumeConfirmation(r) => r,
            other => panic!("unexpected report: {:?}", other.kind()),
        }
    }

    #[test]
    fn test_rising_price_falling_volume_is_bearish_divergence() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let volumes: Vec<f64> = (0..30).map(|i| 10_000.0 - 200.0 * i as f64).collect();

        let report = run(&closes, &volumes);
        assert!(report.divergence.divergence_detected);
        assert_eq!(report.divergence.divergence_type, DivergenceType::Bearish);
        assert_eq!(report.divergence.divergence_strength, DivergenceStrength::Strong);
        assert_eq!(report.trend_analysis.primary_trend, PrimaryTrend::Uptrend);
        assert_eq!(
            report.volume_signals.volume_trend_alignment,
            TrendAlignment::Divergence
        );
        assert_eq!(
            report.overall_assessment.confirmation_status,
            ConfirmationStatus::VolumeDivergesFromPrice
        );
    }

    #[test]
    fn test_rising_price_rising_volume_confirms() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let volumes: Vec<f64> = (0..30).map(|i| 1_000.0 + 100.0 * i as f64).collect();

        let report = run(&closes, &volumes);
        assert!(!report.divergence.divergence_detected);
        assert_eq!(report.divergence.divergence_type, DivergenceType::None);
        assert!(matches!(
            report.volume_signals.volume_trend_alignment,
            TrendAlignment::StrongConfirmation | TrendAlignment::ModerateConfirmation
        ));
        assert_eq!(
            report.overall_assessment.confirmation_status,
            ConfirmationStatus::VolumeConfirmsPrice
        );
        assert!(report.overall_assessment.confidence_score >= 70);
    }

    #[test]
    fn test_flat_series_is_sideways_and_inconclusive() {
        let closes = vec![100.0; 30];
        let volumes = vec![1_000.0; 30];

        let report = run(&closes, &volumes);
        assert_eq!(report.trend_analysis.primary_trend, PrimaryTrend::Sideways);
        assert_eq!(report.price_volume_correlation.correlation_20, 0.0);
        assert_eq!(
            report.price_volume_correlation.correlation_direction,
            CorrelationDirection::Neutral
        );
        assert_eq!(
            report.price_volume_correlation.correlation_trend,
            CorrelationTrend::Stable
        );
        // both slopes are zero, so both read as "down"
        assert!(!report.divergence.divergence_detected);
        assert_eq!(
            report.volume_signals.volume_trend_alignment,
            TrendAlignment::WeakConfirmation
        );
        assert_eq!(report.overall_assessment.confidence_score, 50);
        assert!(report.recent_movements.is_empty());
    }

    #[test]
    fn test_positive_correlation() {
        // volume jumps on up days and shrinks on down days
        let mut closes = Vec::new();
        let mut volumes = Vec::new();
        let mut price = 100.0;
        for i in 0..40 {
            if i % 2 == 0 {
                price *= 1.02;
                volumes.push(2_000.0);
            } else {
                price *= 0.99;
                volumes.push(1_000.0);
            }
            closes.push(price);
        }

        let report = run(&closes, &volumes);
        let corr = &report.price_volume_correlation;
        assert!(corr.correlation_20 > 0.5);
        assert_eq!(corr.correlation_direction, CorrelationDirection::Positive);
        assert_eq!(corr.correlation_significance, Significance::High);
        // 39 changes: the long window falls back to the short one
        assert_eq!(corr.correlation_50, corr.correlation_20);
    }

    #[test]
    fn test_recent_movement_responses() {
        let mut closes = vec![100.0; 30];
        let mut volumes = noisy_volumes(30, 1_000.0);
        // +2% on heavy volume, then -2% on light volume
        closes[27] = 102.0;
        volumes[27] = 3_000.0;
        closes[28] = 99.96;
        volumes[28] = 500.0;
        closes[29] = 99.96;

        let report = run(&closes, &volumes);
        let moves = &report.recent_movements;
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[0].volume_response, VolumeResponse::Confirming);
        assert!((moves[0].price_change_pct - 2.0).abs() < 1e-9);
        assert_eq!(moves[1].volume_response, VolumeResponse::Diverging);
        assert!(moves[1].price_change_pct < 0.0);
    }

    #[test]
    fn test_confidence_bonus_capped() {
        let correlation = CorrelationAnalysis {
            correlation_20: 0.9,
            correlation_50: 0.8,
            correlation_direction: CorrelationDirection::Positive,
            correlation_significance: Significance::High,
            correlation_trend: CorrelationTrend::Increasing,
        };
        let strong = assess(TrendAlignment::StrongConfirmation, &correlation);
        assert_eq!(strong.confidence_score, 90);
        let weak = assess(TrendAlignment::WeakConfirmation, &correlation);
        assert_eq!(weak.confidence_score, 55);
        assert_eq!(weak.confirmation_status, ConfirmationStatus::Inconclusive);
    }
}
