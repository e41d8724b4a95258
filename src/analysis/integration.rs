//! Combines the confirmation and anomaly readings into one trading signal.
//!
//! The score, signal and risk level are derived only from the confirmation
//! and anomaly agents. The other agents contribute insight lines.

use crate::agents::{
    AnomalyReport, ConfirmationReport, InstitutionalReport, LevelsReport, MomentumReport,
};
use crate::models::{
    AnalysisQuality, RiskFactor, RiskLevel, SignalComponent, SignalStrength, Significance,
    TradingSignal, TrendAlignment, VolumeStatus,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<RiskFactor>,
    pub risk_score: u32,
}

/// The integrated reading for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratedAnalysis {
    pub analysis_quality: AnalysisQuality,
    pub overall_score: u32,
    pub trading_signal: TradingSignal,
    pub signal_strength: SignalStrength,
    pub signal_components: Vec<SignalComponent>,
    pub key_insights: Vec<String>,
    pub risk_assessment: RiskAssessment,
    pub recommendations: Vec<String>,
    /// Why the reading was withheld, when too few agents succeeded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_reasons: Vec<String>,
}

/// Reports from the agents that only feed insight lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupportingReports<'a> {
    pub institutional: Option<&'a InstitutionalReport>,
    pub momentum: Option<&'a MomentumReport>,
    pub levels: Option<&'a LevelsReport>,
}

/// Build the integrated analysis. A failed input is passed as `Err(reason)`.
pub fn integrate(
    confirmation: Result<&ConfirmationReport, &str>,
    anomaly: Result<&AnomalyReport, &str>,
    supporting: SupportingReports<'_>,
) -> IntegratedAnalysis {
    let confirmation_ok = confirmation.is_ok();
    let anomaly_ok = anomaly.is_ok();

    let mut components = Vec::new();
    let mut risks = Vec::new();
    let mut insights = Vec::new();

    if let Ok(report) = confirmation {
        let alignment = report.volume_signals.volume_trend_alignment;
        insights.push(format!(
            "Primary trend: {}",
            report.trend_analysis.primary_trend
        ));
        insights.push(format!("Volume-trend alignment: {}", alignment));

        match alignment {
            TrendAlignment::StrongConfirmation | TrendAlignment::ModerateConfirmation => {
                components.push(SignalComponent::PositiveConfirmation);
            }
            TrendAlignment::Divergence | TrendAlignment::WeakConfirmation => {
                components.push(SignalComponent::NegativeConfirmation);
                risks.push(RiskFactor::VolumePriceDivergence);
            }
        }
    }

    if let Ok(report) = anomaly {
        let high = report.high_significance_count();
        let status = report.current_volume_status.current_status;

        insights.push(format!(
            "Volume anomalies detected: {}",
            report.significant_anomalies.len()
        ));
        insights.push(format!("High significance anomalies: {}", high));
        insights.push(format!("Current volume status: {}", status));

        if report.has_high_significance() {
            components.push(SignalComponent::HighAnomalyActivity);
            risks.push(RiskFactor::UnusualVolumeActivity);
        }

        match status {
            VolumeStatus::ExtremelyHigh | VolumeStatus::VeryHigh => {
                components.push(SignalComponent::ElevatedVolume);
            }
            VolumeStatus::ExtremelyLow | VolumeStatus::VeryLow => {
                components.push(SignalComponent::SuppressedVolume);
                risks.push(RiskFactor::LowLiquidity);
            }
            _ => {}
        }

        if report.anomaly_frequency == Significance::High {
            risks.push(RiskFactor::HighVolatilityPattern);
        }
    }

    insights.extend(supporting_insights(&supporting));

    let (trading_signal, signal_strength) = if !confirmation_ok && !anomaly_ok {
        (TradingSignal::Unknown, SignalStrength::Weak)
    } else {
        (signal(&components), strength(components.len()))
    };

    let risk_assessment = RiskAssessment {
        risk_level: risk_level(risks.len()),
        risk_score: (risks.len() as u32 * 20).min(100),
        risk_factors: risks,
    };

    let overall_score = score(
        confirmation_ok,
        anomaly_ok,
        components.len(),
        risk_assessment.risk_factors.len(),
    );

    let mut failure_reasons = Vec::new();
    if let Err(reason) = confirmation {
        failure_reasons.push(format!("volume_confirmation: {}", reason));
    }
    if let Err(reason) = anomaly {
        failure_reasons.push(format!("volume_anomaly: {}", reason));
    }

    IntegratedAnalysis {
        analysis_quality: quality(confirmation_ok, anomaly_ok),
        overall_score,
        trading_signal,
        signal_strength,
        recommendations: recommendations(trading_signal, &risk_assessment),
        signal_components: components,
        key_insights: insights,
        risk_assessment,
        failure_reasons,
    }
}

impl IntegratedAnalysis {
    /// Placeholder reading used when too few agents succeeded to trust one.
    pub fn degraded(reasons: Vec<String>) -> Self {
        Self {
            analysis_quality: AnalysisQuality::Failed,
            overall_score: 0,
            trading_signal: TradingSignal::Unknown,
            signal_strength: SignalStrength::VeryWeak,
            signal_components: Vec::new(),
            key_insights: Vec::new(),
            risk_assessment: RiskAssessment {
                risk_level: RiskLevel::High,
                risk_factors: Vec::new(),
                risk_score: 100,
            },
            recommendations: vec![
                "Volume analysis unavailable; do not act on volume signals for this symbol"
                    .to_string(),
            ],
            failure_reasons: reasons,
        }
    }
}

fn quality(confirmation_ok: bool, anomaly_ok: bool) -> AnalysisQuality {
    match (confirmation_ok, anomaly_ok) {
        (true, true) => AnalysisQuality::Excellent,
        (false, false) => AnalysisQuality::Failed,
        _ => AnalysisQuality::Partial,
    }
}

fn signal(components: &[SignalComponent]) -> TradingSignal {
    let count = |wanted: &[SignalComponent]| {
        components.iter().filter(|c| wanted.contains(c)).count()
    };
    let bullish = count(&[
        SignalComponent::PositiveConfirmation,
        SignalComponent::ElevatedVolume,
    ]);
    let bearish = count(&[
        SignalComponent::NegativeConfirmation,
        SignalComponent::SuppressedVolume,
    ]);
    let neutral = count(&[SignalComponent::HighAnomalyActivity]);

    if bullish > bearish + neutral {
        TradingSignal::Bullish
    } else if bearish > bullish + neutral {
        TradingSignal::Bearish
    } else {
        TradingSignal::Neutral
    }
}

fn strength(components: usize) -> SignalStrength {
    match components {
        0 => SignalStrength::VeryWeak,
        1 => SignalStrength::Weak,
        2 => SignalStrength::Moderate,
        _ => SignalStrength::Strong,
    }
}

fn risk_level(factors: usize) -> RiskLevel {
    match factors {
        0 => RiskLevel::VeryLow,
        1 => RiskLevel::Low,
        2 => RiskLevel::Medium,
        _ => RiskLevel::High,
    }
}

fn score(confirmation_ok: bool, anomaly_ok: bool, components: usize, risks: usize) -> u32 {
    let mut score: i64 = 0;
    if confirmation_ok {
        score += 30;
    }
    if anomaly_ok {
        score += 30;
    }
    score += (components as i64 * 8).min(25);
    score -= (risks as i64 * 5).min(20);
    if confirmation_ok && anomaly_ok {
        score += 15;
    }
    score.clamp(0, 100) as u32
}

fn recommendations(signal: TradingSignal, risk: &RiskAssessment) -> Vec<String> {
    let mut recs = Vec::new();

    recs.push(
        match signal {
            TradingSignal::Bullish => "Consider bullish positions with volume confirmation",
            TradingSignal::Bearish => "Consider bearish positions or reduce exposure",
            _ => "Maintain neutral stance until clearer signals emerge",
        }
        .to_string(),
    );

    match risk.risk_level {
        RiskLevel::High => {
            recs.push("Exercise increased caution due to high risk factors".to_string());
            recs.push("Consider smaller position sizes".to_string());
        }
        RiskLevel::Medium => recs.push("Monitor risk factors closely".to_string()),
        _ => {}
    }

    for factor in &risk.risk_factors {
        let text = match factor {
            RiskFactor::VolumePriceDivergence => {
                "Watch for potential trend reversal due to volume divergence"
            }
            RiskFactor::UnusualVolumeActivity => "Monitor news and events causing volume spikes",
            RiskFactor::LowLiquidity => "Be cautious of wider bid-ask spreads",
            RiskFactor::HighVolatilityPattern => continue,
        };
        recs.push(text.to_string());
    }

    recs
}

fn supporting_insights(supporting: &SupportingReports<'_>) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(inst) = supporting.institutional {
        lines.push(format!(
            "Institutional activity: {} ({}, {} large-volume days)",
            inst.activity_level, inst.activity_pattern, inst.large_volume_days
        ));
    }

    if let Some(m) = supporting.momentum {
        lines.push(format!(
            "Volume momentum: {} with {} trend ({:.2}x 20-day average)",
            m.volume_momentum, m.overall_volume_trend, m.current_vs_ma20
        ));
    }

    if let Some(levels) = supporting.levels {
        if let Some(support) = levels.support_levels.first() {
            lines.push(format!("Nearest volume support: {:.2}", support));
        }
        if let Some(resistance) = levels.resistance_levels.first() {
            lines.push(format!("Nearest volume resistance: {:.2}", resistance));
        }
    }

    lines
}
