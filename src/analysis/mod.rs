//! Per-symbol analysis pipeline and batch statistics.
//!
//! [`Analyzer`] runs the selected agents over one series, then derives the
//! integrated reading, agent health and quality metrics from their outcomes.

pub mod aggregator;
pub mod health;
pub mod integration;
pub mod quality;

pub use aggregator::*;
pub use health::SystemHealth;
pub use integration::{integrate, IntegratedAnalysis, SupportingReports};
pub use quality::QualityMetrics;

use crate::agents::{select_agents, AgentKind, VolumeAgent};
use crate::config::{Config, HealthConfig};
use crate::error::AnalysisError;
use crate::models::{AgentOutcome, PriceSeries, StockAnalysis};
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, warn};

pub struct Analyzer {
    agents: Vec<Box<dyn VolumeAgent>>,
    health: HealthConfig,
    min_bars: usize,
}

impl Analyzer {
    pub fn from_config(config: &Config) -> Result<Self, AnalysisError> {
        Ok(Self {
            agents: select_agents(&config.agents)?,
            health: config.health.clone(),
            min_bars: config.general.min_bars,
        })
    }

    pub fn agent_kinds(&self) -> Vec<AgentKind> {
        self.agents.iter().map(|a| a.kind()).collect()
    }

    /// Run every agent over `series`. Agent failures are recorded in the
    /// result; they never abort the symbol.
    pub fn analyze(&self, series: &PriceSeries, source: &str) -> StockAnalysis {
        let start = Instant::now();

        if series.len() < self.min_bars {
            let err = AnalysisError::InsufficientData {
                required: self.min_bars,
                available: series.len(),
            };
            warn!("{}: {}", series.symbol, err);
            let mut failed =
                StockAnalysis::failed(series.symbol.clone(), source.to_string(), err.to_string());
            failed.bars = series.len();
            failed.first_date = series.first_date();
            failed.last_date = series.last_date();
            return failed;
        }

        let outcomes: Vec<AgentOutcome> = self
            .agents
            .iter()
            .map(|agent| run_agent(agent.as_ref(), series))
            .collect();

        let mut analysis = StockAnalysis {
            symbol: series.symbol.clone(),
            source: source.to_string(),
            bars: series.len(),
            first_date: series.first_date(),
            last_date: series.last_date(),
            analyzed_at: Utc::now(),
            outcomes,
            integrated: None,
            health: None,
            quality: None,
            degraded: false,
            error: None,
            duration_ms: 0,
        };

        let health = SystemHealth::from_outcomes(&analysis.outcomes, &self.health);
        let integrated = if health.is_critical() {
            warn!(
                "{}: agent health critical ({:.0}%), integrated analysis withheld",
                analysis.symbol, health.health_percentage
            );
            analysis.degraded = true;
            IntegratedAnalysis::degraded(health.failure_reasons())
        } else {
            integrate(
                analysis
                    .confirmation()
                    .ok_or_else(|| failure_reason(&analysis, AgentKind::VolumeConfirmation)),
                analysis
                    .anomaly()
                    .ok_or_else(|| failure_reason(&analysis, AgentKind::VolumeAnomaly)),
                SupportingReports {
                    institutional: analysis.institutional(),
                    momentum: analysis.momentum(),
                    levels: analysis.levels(),
                },
            )
        };

        let quality = QualityMetrics::compute(
            analysis.anomaly(),
            analysis.confirmation(),
            analysis.momentum(),
            analysis.institutional(),
        );

        analysis.integrated = Some(integrated);
        analysis.health = Some(health);
        analysis.quality = Some(quality);
        analysis.duration_ms = start.elapsed().as_millis() as u64;

        debug!(
            "{}: analyzed {} bars in {}ms",
            analysis.symbol, analysis.bars, analysis.duration_ms
        );

        analysis
    }
}

fn run_agent(agent: &dyn VolumeAgent, series: &PriceSeries) -> AgentOutcome {
    let start = Instant::now();
    let result = agent.analyze(series);
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(report) => {
            debug!(
                "{}: {} completed in {}ms",
                series.symbol,
                agent.kind(),
                duration_ms
            );
            AgentOutcome::completed(report, duration_ms)
        }
        Err(e) => {
            warn!("{}: {} failed: {}", series.symbol, agent.kind(), e);
            AgentOutcome::Failed {
                agent: agent.kind(),
                error: e.to_string(),
                duration_ms,
            }
        }
    }
}

fn failure_reason(analysis: &StockAnalysis, kind: AgentKind) -> &str {
    analysis
        .outcome(kind)
        .and_then(AgentOutcome::error)
        .unwrap_or("agent not run")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{noisy_volumes, series};
    use crate::models::{AnalysisQuality, TradingSignal};

    #[test]
    fn test_full_run() {
        let analyzer = Analyzer::from_config(&Config::default()).unwrap();
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i % 7) as f64).collect();
        let s = series(&closes, &noisy_volumes(80, 1_000.0));

        let result = analyzer.analyze(&s, "test.csv");
        assert!(result.is_success());
        assert!(!result.degraded);
        assert_eq!(result.outcomes.len(), 5);
        assert!(result.outcomes.iter().all(AgentOutcome::is_success));

        let integrated = result.integrated.as_ref().unwrap();
        assert_eq!(integrated.analysis_quality, AnalysisQuality::Excellent);
        assert!(integrated.overall_score >= 75);
        assert_eq!(result.quality.as_ref().unwrap().completeness, 100.0);
        assert_eq!(result.bars, 80);
    }

    #[test]
    fn test_short_series_is_partial() {
        // enough for four agents, too short for support/resistance
        let analyzer = Analyzer::from_config(&Config::default()).unwrap();
        let s = series(&vec![100.0; 30], &noisy_volumes(30, 1_000.0));

        let result = analyzer.analyze(&s, "short.csv");
        assert!(!result.degraded);
        let levels = result.outcome(AgentKind::SupportResistance).unwrap();
        assert!(!levels.is_success());
        assert!(levels.error().unwrap().contains("50 bars required"));
        let health = result.health.as_ref().unwrap();
        assert_eq!(health.healthy_agents, 4);
    }

    #[test]
    fn test_critical_health_degrades() {
        let mut config = Config::default();
        config.agents.enabled = vec![
            "support_resistance".to_string(),
            "volume_momentum".to_string(),
        ];
        config.agents.momentum.window = 40;
        let analyzer = Analyzer::from_config(&config).unwrap();
        let s = series(&vec![100.0; 30], &noisy_volumes(30, 1_000.0));

        let result = analyzer.analyze(&s, "x.csv");
        assert!(result.degraded);
        assert!(!result.is_success());
        let integrated = result.integrated.as_ref().unwrap();
        assert_eq!(integrated.overall_score, 0);
        assert_eq!(integrated.trading_signal, TradingSignal::Unknown);
        assert_eq!(integrated.failure_reasons.len(), 2);
    }

    #[test]
    fn test_min_bars_rejects_before_agents() {
        let analyzer = Analyzer::from_config(&Config::default()).unwrap();
        let s = series(&[100.0; 5], &[1_000.0; 5]);
        let result = analyzer.analyze(&s, "tiny.csv");
        assert!(result.error.is_some());
        assert!(result.outcomes.is_empty());
        assert_eq!(result.bars, 5);
    }
}
