//! Agent health for a single symbol's run.

use crate::agents::AgentKind;
use crate::config::HealthConfig;
use crate::models::{AgentOutcome, SystemStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHealth {
    pub agent: AgentKind,
    pub healthy: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub health_percentage: f64,
    pub healthy_agents: usize,
    pub total_agents: usize,
    pub system_status: SystemStatus,
    pub recommendation: String,
    pub should_use_volume_agents: bool,
    pub reason: String,
    pub agents: Vec<AgentHealth>,
}

impl SystemHealth {
    pub fn from_outcomes(outcomes: &[AgentOutcome], config: &HealthConfig) -> Self {
        let agents: Vec<AgentHealth> = outcomes
            .iter()
            .map(|o| AgentHealth {
                agent: o.agent(),
                healthy: o.is_success(),
                status: if o.is_success() { "healthy" } else { "failed" }.to_string(),
                error: o.error().map(str::to_string),
                duration_ms: o.duration_ms(),
            })
            .collect();

        let total = agents.len();
        let healthy = agents.iter().filter(|a| a.healthy).count();
        let pct = if total > 0 {
            healthy as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        let system_status = if pct >= config.healthy_pct {
            SystemStatus::Healthy
        } else if pct >= config.degraded_pct {
            SystemStatus::Degraded
        } else {
            SystemStatus::Critical
        };

        let recommendation = match system_status {
            SystemStatus::Healthy => "All volume agents operating normally".to_string(),
            SystemStatus::Degraded => format!(
                "Some volume agents failed ({}/{} healthy); treat results with caution",
                healthy, total
            ),
            SystemStatus::Critical => format!(
                "Most volume agents failed ({}/{} healthy); volume analysis is unreliable",
                healthy, total
            ),
        };

        let should_use = pct >= config.degraded_pct;
        let reason = if should_use {
            format!("{:.0}% of agents healthy", pct)
        } else {
            format!(
                "Only {:.0}% of agents healthy (minimum {:.0}%)",
                pct, config.degraded_pct
            )
        };

        Self {
            health_percentage: (pct * 10.0).round() / 10.0,
            healthy_agents: healthy,
            total_agents: total,
            system_status,
            recommendation,
            should_use_volume_agents: should_use,
            reason,
            agents,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.system_status == SystemStatus::Critical
    }

    /// Errors of the failed agents, prefixed with the agent name.
    pub fn failure_reasons(&self) -> Vec<String> {
        self.agents
            .iter()
            .filter_map(|a| a.error.as_ref().map(|e| format!("{}: {}", a.agent, e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(agent: AgentKind) -> AgentOutcome {
        AgentOutcome::Failed {
            agent,
            error: "Insufficient data".to_string(),
            duration_ms: 1,
        }
    }

    fn ok(agent: AgentKind) -> AgentOutcome {
        // the report content does not matter for health
        let report = crate::agents::AgentReport::VolumeMomentum(crate::agents::MomentumReport {
            overall_volume_trend: crate::models::VolumeTrend::Stable,
            price_trend: crate::models::TrendDirection::Up,
            volume_direction: crate::models::TrendDirection::Up,
            volume_confirmation: crate::models::VolumeConfirmation::Confirmed,
            volume_momentum: crate::models::Momentum::Weak,
            volume_consistency: crate::models::Consistency::High,
            current_volume: 1.0,
            volume_ma_20: 1.0,
            volume_ma_50: 1.0,
            current_vs_ma20: 1.0,
            rate_of_change_5: None,
        });
        AgentOutcome::Completed {
            agent,
            report,
            duration_ms: 2,
        }
    }

    #[test]
    fn test_all_healthy() {
        let outcomes: Vec<_> = AgentKind::ALL.into_iter().map(ok).collect();
        let health = SystemHealth::from_outcomes(&outcomes, &HealthConfig::default());
        assert_eq!(health.system_status, SystemStatus::Healthy);
        assert_eq!(health.health_percentage, 100.0);
        assert!(health.should_use_volume_agents);
        assert!(health.failure_reasons().is_empty());
    }

    #[test]
    fn test_thresholds() {
        let config = HealthConfig::default();
        let kinds = AgentKind::ALL;

        // 4/5 = 80%
        let mut outcomes: Vec<_> = kinds[..4].iter().copied().map(ok).collect();
        outcomes.push(failed(kinds[4]));
        let health = SystemHealth::from_outcomes(&outcomes, &config);
        assert_eq!(health.system_status, SystemStatus::Healthy);

        // 2/5 = 40%
        let mut outcomes: Vec<_> = kinds[..2].iter().copied().map(ok).collect();
        outcomes.extend(kinds[2..].iter().copied().map(failed));
        let health = SystemHealth::from_outcomes(&outcomes, &config);
        assert_eq!(health.system_status, SystemStatus::Degraded);
        assert!(health.should_use_volume_agents);

        // 1/5 = 20%
        let mut outcomes = vec![ok(kinds[0])];
        outcomes.extend(kinds[1..].iter().copied().map(failed));
        let health = SystemHealth::from_outcomes(&outcomes, &config);
        assert!(health.is_critical());
        assert!(!health.should_use_volume_agents);
        assert_eq!(health.failure_reasons().len(), 4);
        assert!(health.failure_reasons()[0].starts_with("institutional_activity:"));
    }

    #[test]
    fn test_no_agents_is_critical() {
        let health = SystemHealth::from_outcomes(&[], &HealthConfig::default());
        assert!(health.is_critical());
        assert_eq!(health.total_agents, 0);
    }
}
