//! Volume-at-price support and resistance.

use super::{ensure_len, AgentKind, AgentReport, VolumeAgent};
use crate::config::LevelsConfig;
use crate::error::AnalysisError;
use crate::models::{LevelStrength, PriceSeries, VolumeConfirmation};
use crate::stats::{mean, population_std, round_to, vwap};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One price bin of the volume profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileBin {
    pub price: f64,
    pub volume: f64,
}

/// Price band around the point of control holding the configured share of
/// total volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueArea {
    pub low: f64,
    pub high: f64,
    pub volume_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelsReport {
    /// Nearest first.
    pub support_levels: Vec<f64>,
    /// Nearest first.
    pub resistance_levels: Vec<f64>,
    pub level_strength: LevelStrength,
    pub volume_confirmation: VolumeConfirmation,
    pub current_price: f64,
    pub current_vwap: f64,
    pub point_of_control: Option<f64>,
    pub value_area: Option<ValueArea>,
    /// Ascending by price.
    pub volume_profile: Vec<ProfileBin>,
}

pub struct LevelsAgent {
    config: LevelsConfig,
}

impl LevelsAgent {
    pub fn new(config: LevelsConfig) -> Self {
        Self { config }
    }

    fn significant_levels(&self, profile: &[ProfileBin], price: f64) -> (Vec<f64>, Vec<f64>) {
        if profile.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let mut ranked = profile.to_vec();
        // stable: equal volumes keep ascending price order
        ranked.sort_by(|a, b| b.volume.partial_cmp(&a.volume).unwrap_or(Ordering::Equal));

        let top = ((ranked.len() as f64 * self.config.top_fraction).floor() as usize).max(1);
        let significant: Vec<f64> = ranked.iter().take(top).map(|b| b.price).collect();

        let mut support: Vec<f64> = significant.iter().copied().filter(|p| *p < price).collect();
        let mut resistance: Vec<f64> = significant.iter().copied().filter(|p| *p > price).collect();
        support.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
        resistance.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        support.truncate(self.config.max_levels);
        resistance.truncate(self.config.max_levels);

        (support, resistance)
    }

    fn value_area(&self, profile: &[ProfileBin], poc: usize) -> Option<ValueArea> {
        let total: f64 = profile.iter().map(|b| b.volume).sum();
        if total <= 0.0 {
            return None;
        }
        let target = total * self.config.value_area_pct;

        let (mut lo, mut hi) = (poc, poc);
        let mut held = profile[poc].volume;
        while held < target && (lo > 0 || hi + 1 < profile.len()) {
            let below = if lo > 0 { Some(profile[lo - 1].volume) } else { None };
            let above = profile.get(hi + 1).map(|b| b.volume);
            match (below, above) {
                (Some(b), Some(a)) if a > b => {
                    hi += 1;
                    held += a;
                }
                (Some(b), _) => {
                    lo -= 1;
                    held += b;
                }
                (None, Some(a)) => {
                    hi += 1;
                    held += a;
                }
                (None, None) => break,
            }
        }

        Some(ValueArea {
            low: round_to(profile[lo].price, 2),
            high: round_to(profile[hi].price, 2),
            volume_pct: round_to(held / total * 100.0, 1),
        })
    }
}

/// Bin each bar's volume at its typical price. Bins span
/// `[min low, max high]`; a bar goes to the bin with the nearest centre, the
/// lower bin on a tie.
pub fn volume_profile(series: &PriceSeries, bins: usize) -> Vec<ProfileBin> {
    if bins == 0 || series.is_empty() {
        return Vec::new();
    }

    let min = series.lows().into_iter().fold(f64::INFINITY, f64::min);
    let max = series.highs().into_iter().fold(f64::NEG_INFINITY, f64::max);
    if max <= min {
        return Vec::new();
    }

    let width = (max - min) / bins as f64;
    let mut profile: Vec<ProfileBin> = (0..bins)
        .map(|i| ProfileBin {
            price: min + width * (i as f64 + 0.5),
            volume: 0.0,
        })
        .collect();

    for (tp, volume) in series.typical_prices().into_iter().zip(series.volumes()) {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, bin) in profile.iter().enumerate() {
            let dist = (bin.price - tp).abs();
            if dist < best_dist {
                best = i;
                best_dist = dist;
            }
        }
        profile[best].volume += volume;
    }

    profile
}

fn strength(profile: &[ProfileBin]) -> LevelStrength {
    if profile.len() < 2 {
        return LevelStrength::Weak;
    }
    let volumes: Vec<f64> = profile.iter().map(|b| b.volume).collect();
    let concentration = match (mean(&volumes), population_std(&volumes)) {
        (Some(m), Some(sd)) if m > 0.0 => sd / m,
        _ => 0.0,
    };

    if concentration > 0.5 {
        LevelStrength::Strong
    } else if concentration > 0.3 {
        LevelStrength::Medium
    } else {
        LevelStrength::Weak
    }
}

impl VolumeAgent for LevelsAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::SupportResistance
    }

    fn min_bars(&self) -> usize {
        self.config.min_bars.max(1)
    }

    fn analyze(&self, series: &PriceSeries) -> Result<AgentReport, AnalysisError> {
        ensure_len(series, self.min_bars())?;

        let price = series.last_close().unwrap_or(0.0);
        let profile = volume_profile(series, self.config.bins);
        let (support, resistance) = self.significant_levels(&profile, price);

        // lowest price wins a tie
        let poc = profile
            .iter()
            .enumerate()
            .filter(|(_, b)| b.volume > 0.0)
            .fold(None::<(usize, f64)>, |best, (i, b)| match best {
                Some((_, v)) if v >= b.volume => best,
                _ => Some((i, b.volume)),
            })
            .map(|(i, _)| i);

        let volume_confirmation = if support.is_empty() && resistance.is_empty() {
            VolumeConfirmation::Neutral
        } else {
            VolumeConfirmation::Confirmed
        };

        Ok(AgentReport::SupportResistance(LevelsReport {
            support_levels: support.iter().map(|p| round_to(*p, 2)).collect(),
            resistance_levels: resistance.iter().map(|p| round_to(*p, 2)).collect(),
            level_strength: strength(&profile),
            volume_confirmation,
            current_price: price,
            current_vwap: round_to(vwap(series), 2),
            point_of_control: poc.map(|i| round_to(profile[i].price, 2)),
            value_area: poc.and_then(|i| self.value_area(&profile, i)),
            volume_profile: profile
                .iter()
                .map(|b| ProfileBin {
                    price: round_to(b.price, 2),
                    volume: b.volume,
                })
                .collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::series;

    fn run(closes: &[f64], volumes: &[f64]) -> LevelsReport {
        let agent = LevelsAgent::new(LevelsConfig::default());
        match agent.analyze(&series(closes, volumes)).unwrap() {
            AgentReport::SupportResistance(r) => r,
            other => panic!("unexpected report: {:?}", other.kind()),
        }
    }

    /// Price oscillating between 90 and 110 with heavy volume at both ends,
    /// finishing mid-range at 100.
    fn ranging() -> (Vec<f64>, Vec<f64>) {
        let mut closes = Vec::new();
        let mut volumes = Vec::new();
        for i in 0..60 {
            let phase = i % 4;
            let (c, v) = match phase {
                0 => (90.0, 5_000.0),
                1 => (100.0, 500.0),
                2 => (110.0, 5_000.0),
                _ => (100.0, 500.0),
            };
            closes.push(c);
            volumes.push(v);
        }
        (closes, volumes)
    }

    #[test]
    fn test_profile_conserves_volume() {
        let (closes, volumes) = ranging();
        let s = series(&closes, &volumes);
        let profile = volume_profile(&s, 20);
        assert_eq!(profile.len(), 20);
        let binned: f64 = profile.iter().map(|b| b.volume).sum();
        let total: f64 = volumes.iter().sum();
        assert!((binned - total).abs() < 1e-6);
        assert!(profile.windows(2).all(|w| w[0].price < w[1].price));
    }

    #[test]
    fn test_levels_sit_on_the_right_side() {
        let (closes, volumes) = ranging();
        let report = run(&closes, &volumes);

        assert!(!report.support_levels.is_empty());
        assert!(!report.resistance_levels.is_empty());
        assert!(report.support_levels.iter().all(|p| *p < report.current_price));
        assert!(report
            .resistance_levels
            .iter()
            .all(|p| *p > report.current_price));
        assert!(report.support_levels.windows(2).all(|w| w[0] > w[1]));
        assert!(report.resistance_levels.windows(2).all(|w| w[0] < w[1]));
        assert!(report.support_levels.len() <= 3);
        assert_eq!(report.volume_confirmation, VolumeConfirmation::Confirmed);
        assert_eq!(report.level_strength, LevelStrength::Strong);
    }

    #[test]
    fn test_point_of_control_and_value_area() {
        let (closes, volumes) = ranging();
        let report = run(&closes, &volumes);

        let poc = report.point_of_control.unwrap();
        assert!(poc < 92.0 || poc > 108.0);
        let va = report.value_area.unwrap();
        assert!(va.low <= poc && poc <= va.high);
        assert!(va.volume_pct >= 70.0);
    }

    #[test]
    fn test_flat_range_has_empty_profile() {
        let s = crate::models::PriceSeries::new(
            "FLAT",
            series(&[100.0; 60], &[1_000.0; 60])
                .bars
                .into_iter()
                .map(|mut b| {
                    b.high = 100.0;
                    b.low = 100.0;
                    b
                })
                .collect(),
        );
        let agent = LevelsAgent::new(LevelsConfig::default());
        let report = match agent.analyze(&s).unwrap() {
            AgentReport::SupportResistance(r) => r,
            other => panic!("unexpected report: {:?}", other.kind()),
        };
        assert!(report.volume_profile.is_empty());
        assert!(report.point_of_control.is_none());
        assert_eq!(report.volume_confirmation, VolumeConfirmation::Neutral);
        assert_eq!(report.level_strength, LevelStrength::Weak);
        assert!((report.current_vwap - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_requires_fifty_bars() {
        let agent = LevelsAgent::new(LevelsConfig::default());
        let err = agent
            .analyze(&series(&[100.0; 49], &[1_000.0; 49]))
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientData {
                required: 50,
                available: 49
            }
        ));
    }
}
