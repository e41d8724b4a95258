//! Volume trend and momentum.

use super::{ensure_len, AgentKind, AgentReport, VolumeAgent};
use crate::config::MomentumConfig;
use crate::error::AnalysisError;
use crate::models::{
    Consistency, Momentum, PriceSeries, TrendDirection, VolumeConfirmation, VolumeTrend,
};
use crate::stats::{coefficient_of_variation, mean, round_to, tail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumReport {
    pub overall_volume_trend: VolumeTrend,
    pub price_trend: TrendDirection,
    pub volume_direction: TrendDirection,
    pub volume_confirmation: VolumeConfirmation,
    pub volume_momentum: Momentum,
    pub volume_consistency: Consistency,
    /// Mean of the last `short_window` volumes.
    pub current_volume: f64,
    pub volume_ma_20: f64,
    pub volume_ma_50: f64,
    pub current_vs_ma20: f64,
    /// Percent change between the last two short windows.
    pub rate_of_change_5: Option<f64>,
}

pub struct MomentumAgent {
    config: MomentumConfig,
}

impl MomentumAgent {
    pub fn new(config: MomentumConfig) -> Self {
        Self { config }
    }

    fn rate_of_change(&self, volumes: &[f64]) -> Option<f64> {
        let w = self.config.short_window;
        if w == 0 || volumes.len() < 2 * w {
            return None;
        }
        let recent = mean(tail(volumes, w))?;
        let previous = mean(&volumes[volumes.len() - 2 * w..volumes.len() - w])?;
        if previous <= 0.0 {
            return None;
        }
        Some(round_to((recent / previous - 1.0) * 100.0, 2))
    }
}

impl VolumeAgent for MomentumAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::VolumeMomentum
    }

    fn min_bars(&self) -> usize {
        self.config.window.max(self.config.short_window).max(2)
    }

    fn analyze(&self, series: &PriceSeries) -> Result<AgentReport, AnalysisError> {
        ensure_len(series, self.min_bars())?;

        let volumes = series.volumes();
        let closes = series.closes();

        let current = mean(tail(&volumes, self.config.short_window)).unwrap_or(0.0);
        let ma20 = mean(tail(&volumes, self.config.window)).unwrap_or(0.0);
        let ma50 = if volumes.len() >= self.config.long_window {
            mean(tail(&volumes, self.config.long_window)).unwrap_or(ma20)
        } else {
            ma20
        };

        let overall_volume_trend = if current > ma20 * 1.1 && ma20 > ma50 * 1.05 {
            VolumeTrend::Increasing
        } else if current < ma20 * 0.9 && ma20 < ma50 * 0.95 {
            VolumeTrend::Decreasing
        } else {
            VolumeTrend::Stable
        };

        let last = closes[closes.len() - 1];
        let reference = closes[closes.len().saturating_sub(self.config.short_window.max(1))];
        let price_trend = if last > reference {
            TrendDirection::Up
        } else {
            TrendDirection::Down
        };

        // heavier volume reads as confirmation in either price direction
        let (volume_direction, volume_confirmation) = if current > ma20 {
            (TrendDirection::Up, VolumeConfirmation::Confirmed)
        } else {
            (TrendDirection::Down, VolumeConfirmation::Diverging)
        };

        let acceleration = if ma20 > 0.0 { current / ma20 } else { 1.0 };
        let volume_momentum = if acceleration > 1.5 {
            Momentum::Strong
        } else if acceleration > 1.2 {
            Momentum::Medium
        } else {
            Momentum::Weak
        };

        let cv = coefficient_of_variation(tail(&volumes, self.config.window)).unwrap_or(1.0);
        let volume_consistency = if cv < 0.5 {
            Consistency::High
        } else if cv < 1.0 {
            Consistency::Medium
        } else {
            Consistency::Low
        };

        Ok(AgentReport::VolumeMomentum(MomentumReport {
            overall_volume_trend,
            price_trend,
            volume_direction,
            volume_confirmation,
            volume_momentum,
            volume_consistency,
            current_volume: round_to(current, 2),
            volume_ma_20: round_to(ma20, 2),
            volume_ma_50: round_to(ma50, 2),
            current_vs_ma20: round_to(acceleration, 2),
            rate_of_change_5: self.rate_of_change(&volumes),
        }))
    }
}
