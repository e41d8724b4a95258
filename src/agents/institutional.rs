//! Institutional activity from large-volume days.

use super::{ensure_len, AgentKind, AgentReport, VolumeAgent};
use crate::config::InstitutionalConfig;
use crate::error::AnalysisError;
use crate::models::{ActivityPattern, PriceSeries, Sentiment, Significance};
use crate::stats::{mean, rolling_mean, rolling_std, round_to};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A session whose volume cleared `ma + sigma·sd` for its own window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargeVolumeDay {
    pub date: NaiveDate,
    pub volume_multiple: f64,
    /// Close-to-close return in percent. `None` for the first bar.
    pub return_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionalReport {
    pub activity_level: Significance,
    pub activity_pattern: ActivityPattern,
    pub institutional_sentiment: Sentiment,
    pub activity_significance: Significance,
    pub large_volume_days: usize,
    /// Average return on large days, in percent.
    pub average_return_pct: f64,
    pub average_volume_multiple: f64,
    pub recent_large_days: Vec<LargeVolumeDay>,
}

pub struct InstitutionalAgent {
    config: InstitutionalConfig,
}

impl InstitutionalAgent {
    pub fn new(config: InstitutionalConfig) -> Self {
        Self { config }
    }

    fn large_days(&self, series: &PriceSeries) -> Vec<LargeVolumeDay> {
        let volumes = series.volumes();
        let ma = rolling_mean(&volumes, self.config.window);
        let sd = rolling_std(&volumes, self.config.window);

        let mut days = Vec::new();
        for (i, bar) in series.bars.iter().enumerate() {
            let (Some(base), Some(spread)) = (ma[i], sd[i]) else {
                continue;
            };
            if bar.volume <= base + self.config.sigma_threshold * spread {
                continue;
            }

            let return_pct = i
                .checked_sub(1)
                .map(|p| series.bars[p].close)
                .filter(|prev| *prev != 0.0)
                .map(|prev| (bar.close - prev) / prev * 100.0);

            days.push(LargeVolumeDay {
                date: bar.date,
                volume_multiple: if base > 0.0 { bar.volume / base } else { 0.0 },
                return_pct,
            });
        }
        days
    }
}

impl VolumeAgent for InstitutionalAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::InstitutionalActivity
    }

    fn min_bars(&self) -> usize {
        self.config.window.max(2)
    }

    fn analyze(&self, series: &PriceSeries) -> Result<AgentReport, AnalysisError> {
        ensure_len(series, self.min_bars())?;

        let days = self.large_days(series);
        let ratio = days.len() as f64 / series.len() as f64;
        let activity_level = if ratio > 0.10 {
            Significance::High
        } else if ratio > 0.05 {
            Significance::Medium
        } else {
            Significance::Low
        };

        let returns: Vec<f64> = days.iter().filter_map(|d| d.return_pct).collect();
        let avg_return = mean(&returns).unwrap_or(0.0);
        let threshold_pct = self.config.move_threshold * 100.0;
        let (activity_pattern, institutional_sentiment) = if avg_return > threshold_pct {
            (ActivityPattern::Accumulation, Sentiment::Bullish)
        } else if avg_return < -threshold_pct {
            (ActivityPattern::Distribution, Sentiment::Bearish)
        } else {
            (ActivityPattern::Neutral, Sentiment::Neutral)
        };

        let multiples: Vec<f64> = days.iter().map(|d| d.volume_multiple).collect();
        let avg_multiple = mean(&multiples).unwrap_or(0.0);
        let activity_significance = if days.len() < 3 {
            Significance::Low
        } else if avg_multiple > 3.0 {
            Significance::High
        } else if avg_multiple > 2.0 {
            Significance::Medium
        } else {
            Significance::Low
        };

        let recent_large_days = days
            .iter()
            .rev()
            .take(self.config.recent_days)
            .rev()
            .map(|d| LargeVolumeDay {
                date: d.date,
                volume_multiple: round_to(d.volume_multiple, 2),
                return_pct: d.return_pct.map(|r| round_to(r, 2)),
            })
            .collect();

        Ok(AgentReport::InstitutionalActivity(InstitutionalReport {
            activity_level,
            activity_pattern,
            institutional_sentiment,
            activity_significance,
            large_volume_days: days.len(),
            average_return_pct: round_to(avg_return, 2),
            average_volume_multiple: round_to(avg_multiple, 2),
            recent_large_days,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{noisy_volumes, series};

    fn run(closes: &[f64], volumes: &[f64]) -> InstitutionalReport {
        let agent = InstitutionalAgent::new(InstitutionalConfig::default());
        match agent.analyze(&series(closes, volumes)).unwrap() {
            AgentReport::InstitutionalActivity(r) => r,
            other => panic!("unexpected report: {:?}", other.kind()),
        }
    }

    #[test]
    fn test_quiet_tape_is_neutral() {
        let report = run(&vec![100.0; 40], &noisy_volumes(40, 1000.0));
        assert_eq!(report.large_volume_days, 0);
        assert_eq!(report.activity_level, Significance::Low);
        assert_eq!(report.activity_pattern, ActivityPattern::Neutral);
        assert_eq!(report.institutional_sentiment, Sentiment::Neutral);
        assert_eq!(report.activity_significance, Significance::Low);
        assert!(report.recent_large_days.is_empty());
    }

    #[test]
    fn test_accumulation_on_up_days() {
        // three well separated spikes, each on a +3% day
        let n = 90;
        let mut volumes = noisy_volumes(n, 1000.0);
        let mut closes = Vec::with_capacity(n);
        let mut price = 100.0;
        for i in 0..n {
            if i == 30 || i == 55 || i == 80 {
                volumes[i] = 20_000.0;
                price *= 1.03;
            }
            closes.push(price);
        }

        let report = run(&closes, &volumes);
        assert_eq!(report.large_volume_days, 3);
        assert_eq!(report.activity_pattern, ActivityPattern::Accumulation);
        assert_eq!(report.institutional_sentiment, Sentiment::Bullish);
        assert!((report.average_return_pct - 3.0).abs() < 1e-6);
        assert_eq!(report.activity_significance, Significance::High);
        assert_eq!(report.recent_large_days.len(), 3);
        assert_eq!(report.activity_level, Significance::Low);
    }

    #[test]
    fn test_distribution_on_down_days() {
        let n = 60;
        let mut volumes = noisy_volumes(n, 1000.0);
        let mut closes = Vec::with_capacity(n);
        let mut price = 100.0;
        for i in 0..n {
            if i == 30 || i == 50 {
                volumes[i] = 20_000.0;
                price *= 0.97;
            }
            closes.push(price);
        }

        let report = run(&closes, &volumes);
        assert_eq!(report.large_volume_days, 2);
        assert_eq!(report.activity_pattern, ActivityPattern::Distribution);
        assert_eq!(report.institutional_sentiment, Sentiment::Bearish);
        // fewer than three large days
        assert_eq!(report.activity_significance, Significance::Low);
    }
}
