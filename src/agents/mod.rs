//! Volume analysis agents.
//!
//! Each agent is a single-purpose statistical routine over one symbol's
//! OHLCV history. Agents are selected by name through the registry functions
//! below and run behind the [`VolumeAgent`] trait.

pub mod anomaly;
pub mod confirmation;
pub mod institutional;
pub mod levels;
pub mod momentum;

pub use anomaly::{AnomalyAgent, AnomalyReport};
pub use confirmation::{ConfirmationAgent, ConfirmationReport};
pub use institutional::{InstitutionalAgent, InstitutionalReport};
pub use levels::{LevelsAgent, LevelsReport};
pub use momentum::{MomentumAgent, MomentumReport};

use crate::config::AgentsConfig;
use crate::error::AnalysisError;
use crate::models::PriceSeries;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A volume agent.
pub trait VolumeAgent: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// Fewest bars the agent can work with.
    fn min_bars(&self) -> usize;

    fn analyze(&self, series: &PriceSeries) -> Result<AgentReport, AnalysisError>;
}

/// The five agents, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    VolumeAnomaly,
    InstitutionalActivity,
    VolumeConfirmation,
    SupportResistance,
    VolumeMomentum,
}

impl AgentKind {
    pub const ALL: [AgentKind; 5] = [
        AgentKind::VolumeAnomaly,
        AgentKind::InstitutionalActivity,
        AgentKind::VolumeConfirmation,
        AgentKind::SupportResistance,
        AgentKind::VolumeMomentum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::VolumeAnomaly => "volume_anomaly",
            AgentKind::InstitutionalActivity => "institutional_activity",
            AgentKind::VolumeConfirmation => "volume_confirmation",
            AgentKind::SupportResistance => "support_resistance",
            AgentKind::VolumeMomentum => "volume_momentum",
        }
    }

    /// Human-readable title used in reports.
    pub fn title(&self) -> &'static str {
        match self {
            AgentKind::VolumeAnomaly => "Volume Anomalies",
            AgentKind::InstitutionalActivity => "Institutional Activity",
            AgentKind::VolumeConfirmation => "Volume Confirmation",
            AgentKind::SupportResistance => "Support & Resistance",
            AgentKind::VolumeMomentum => "Volume Momentum",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AgentKind::VolumeAnomaly => "Statistical volume spikes and current volume status",
            AgentKind::InstitutionalActivity => {
                "Large-volume days and accumulation/distribution patterns"
            }
            AgentKind::VolumeConfirmation => {
                "Price-volume correlation, trend confirmation and divergence"
            }
            AgentKind::SupportResistance => "Volume-at-price levels, point of control and VWAP",
            AgentKind::VolumeMomentum => "Volume trend, momentum and consistency",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        AgentKind::ALL
            .into_iter()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| AnalysisError::UnknownAgent {
                name: s.to_string(),
                available: list_agents().join(", "),
            })
    }
}

/// The result record of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentReport {
    VolumeAnomaly(AnomalyReport),
    InstitutionalActivity(InstitutionalReport),
    VolumeConfirmation(ConfirmationReport),
    SupportResistance(LevelsReport),
    VolumeMomentum(MomentumReport),
}

impl AgentReport {
    pub fn kind(&self) -> AgentKind {
        match self {
            AgentReport::VolumeAnomaly(_) => AgentKind::VolumeAnomaly,
            AgentReport::InstitutionalActivity(_) => AgentKind::InstitutionalActivity,
            AgentReport::VolumeConfirmation(_) => AgentKind::VolumeConfirmation,
            AgentReport::SupportResistance(_) => AgentKind::SupportResistance,
            AgentReport::VolumeMomentum(_) => AgentKind::VolumeMomentum,
        }
    }
}

/// Every agent, configured from `config`.
pub fn all_agents(config: &AgentsConfig) -> Vec<Box<dyn VolumeAgent>> {
    AgentKind::ALL
        .into_iter()
        .map(|kind| build_agent(kind, config))
        .collect()
}

/// Look up one agent by name.
pub fn get_agent(name: &str, config: &AgentsConfig) -> Result<Box<dyn VolumeAgent>, AnalysisError> {
    let kind: AgentKind = name.parse()?;
    Ok(build_agent(kind, config))
}

/// Names of all registered agents.
pub fn list_agents() -> Vec<&'static str> {
    AgentKind::ALL.iter().map(AgentKind::as_str).collect()
}

/// The agents named in `config.enabled`, or all of them when it is empty.
///
/// Duplicates are dropped and the run order is always the registry order.
pub fn select_agents(config: &AgentsConfig) -> Result<Vec<Box<dyn VolumeAgent>>, AnalysisError> {
    if config.enabled.is_empty() {
        return Ok(all_agents(config));
    }

    let mut kinds = config
        .enabled
        .iter()
        .map(|name| name.parse::<AgentKind>())
        .collect::<Result<Vec<_>, _>>()?;
    kinds.sort();
    kinds.dedup();

    Ok(kinds.into_iter().map(|k| build_agent(k, config)).collect())
}

fn build_agent(kind: AgentKind, config: &AgentsConfig) -> Box<dyn VolumeAgent> {
    match kind {
        AgentKind::VolumeAnomaly => Box::new(AnomalyAgent::new(config.anomaly.clone())),
        AgentKind::InstitutionalActivity => {
            Box::new(InstitutionalAgent::new(config.institutional.clone()))
        }
        AgentKind::VolumeConfirmation => {
            Box::new(ConfirmationAgent::new(config.confirmation.clone()))
        }
        AgentKind::SupportResistance => Box::new(LevelsAgent::new(config.levels.clone())),
        AgentKind::VolumeMomentum => Box::new(MomentumAgent::new(config.momentum.clone())),
    }
}

/// Fail with `InsufficientData` when the series is shorter than `required`.
pub(crate) fn ensure_len(series: &PriceSeries, required: usize) -> Result<(), AnalysisError> {
    if series.len() < required {
        return Err(AnalysisError::InsufficientData {
            required,
            available: series.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::{OhlcvBar, PriceSeries};
    use chrono::{Duration, NaiveDate};

    /// Build a daily series from closes and volumes. High/low sit 1% around
    /// the close.
    pub fn series(closes: &[f64], volumes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&close, &volume))| OhlcvBar {
                date: start + Duration::days(i as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume,
            })
            .collect();
        PriceSeries::new("TEST", bars)
    }

    /// Volumes alternating around `base` so rolling std is never zero.
    pub fn noisy_volumes(n: usize, base: f64) -> Vec<f64> {
        (0..n)
            .map(|i| base + if i % 2 == 0 { base * 0.05 } else { -base * 0.05 })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_agents() {
        let names = list_agents();
        assert_eq!(names.len(), 5);
        assert_eq!(names[0], "volume_anomaly");
        assert!(names.contains(&"support_resistance"));
    }

    #[test]
    fn test_get_agent() {
        let config = AgentsConfig::default();
        let agent = get_agent("volume_momentum", &config).unwrap();
        assert_eq!(agent.kind(), AgentKind::VolumeMomentum);
        assert_eq!(agent.min_bars(), 20);

        let levels = get_agent("Support_Resistance", &config).unwrap();
        assert_eq!(levels.min_bars(), 50);
    }

    #[test]
    fn test_unknown_agent() {
        let config = AgentsConfig::default();
        let err = get_agent("rsi", &config).err().unwrap();
        match err {
            AnalysisError::UnknownAgent { name, available } => {
                assert_eq!(name, "rsi");
                assert!(available.contains("volume_anomaly"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_select_agents_orders_and_dedups() {
        let config = AgentsConfig {
            enabled: vec![
                "volume_momentum".to_string(),
                "volume_anomaly".to_string(),
                "volume_momentum".to_string(),
            ],
            ..AgentsConfig::default()
        };
        let agents = select_agents(&config).unwrap();
        let kinds: Vec<_> = agents.iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec![AgentKind::VolumeAnomaly, AgentKind::VolumeMomentum]);

        assert_eq!(select_agents(&AgentsConfig::default()).unwrap().len(), 5);
    }

    #[test]
    fn test_insufficient_data_for_every_agent() {
        let series = test_support::series(&[100.0; 5], &[1000.0; 5]);
        for agent in all_agents(&AgentsConfig::default()) {
            let err = agent.analyze(&series).unwrap_err();
            assert!(matches!(
                err,
                AnalysisError::InsufficientData { available: 5, .. }
            ));
        }
    }

    #[test]
    fn test_report_serializes_with_agent_tag() {
        let series = test_support::series(&[100.0; 30], &test_support::noisy_volumes(30, 1000.0));
        let report = get_agent("volume_momentum", &AgentsConfig::default())
            .unwrap()
            .analyze(&series)
            .unwrap();
        assert_eq!(report.kind(), AgentKind::VolumeMomentum);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.starts_with("{\"volume_momentum\""));
    }
}
