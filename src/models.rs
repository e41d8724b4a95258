//! Data models for the volume agents.
//!
//! This module contains the OHLCV input types, the classification labels the
//! agents emit, and the per-symbol result record that reports are built from.

use crate::agents::{
    AgentKind, AgentReport, AnomalyReport, ConfirmationReport, InstitutionalReport, LevelsReport,
    MomentumReport,
};
use crate::analysis::{IntegratedAnalysis, QualityMetrics, SystemHealth};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single daily OHLCV record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Date-ordered OHLCV history of one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub bars: Vec<OhlcvBar>,
}

impl PriceSeries {
    /// Build a series, sorting by date. When a date repeats the later row wins.
    pub fn new(symbol: impl Into<String>, mut bars: Vec<OhlcvBar>) -> Self {
        // stable sort keeps file order within a date, so dedup keeps the last
        bars.sort_by_key(|b| b.date);
        let mut deduped: Vec<OhlcvBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }

        Self {
            symbol: symbol.into(),
            bars: deduped,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn typical_prices(&self) -> Vec<f64> {
        self.bars.iter().map(OhlcvBar::typical_price).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }
}

/// Declares a closed label set that serializes as snake_case and displays
/// the same text.
macro_rules! label {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

label!(
    /// Low / medium / high grading used by several agents.
    Significance { Low => "low", Medium => "medium", High => "high" }
);

label!(
    /// Price behaviour on the day of a volume spike.
    PriceContext {
        Breakout => "breakout",
        Breakdown => "breakdown",
        Consolidation => "consolidation",
    }
);

label!(
    /// Where the latest volume sits in its recent distribution.
    VolumeStatus {
        ExtremelyLow => "extremely_low",
        VeryLow => "very_low",
        Low => "low",
        Normal => "normal",
        High => "high",
        VeryHigh => "very_high",
        ExtremelyHigh => "extremely_high",
    }
);

label!(TrendDirection { Up => "up", Down => "down" });

label!(
    PrimaryTrend {
        Uptrend => "uptrend",
        Downtrend => "downtrend",
        Sideways => "sideways",
    }
);

label!(
    DivergenceType { None => "none", Bullish => "bullish", Bearish => "bearish" }
);

label!(
    /// How well volume supports the prevailing price trend.
    TrendAlignment {
        StrongConfirmation => "strong_confirmation",
        ModerateConfirmation => "moderate_confirmation",
        WeakConfirmation => "weak_confirmation",
        Divergence => "divergence",
    }
);

label!(
    ConfirmationStatus {
        VolumeConfirmsPrice => "volume_confirms_price",
        VolumeDivergesFromPrice => "volume_diverges_from_price",
        Inconclusive => "inconclusive",
    }
);

label!(
    VolumeResponse {
        Confirming => "confirming",
        Neutral => "neutral",
        Diverging => "diverging",
    }
);

label!(
    CorrelationDirection {
        Positive => "positive",
        Negative => "negative",
        Neutral => "neutral",
    }
);

label!(
    CorrelationTrend {
        Increasing => "increasing",
        Decreasing => "decreasing",
        Stable => "stable",
    }
);

label!(
    ActivityPattern {
        Accumulation => "accumulation",
        Distribution => "distribution",
        Neutral => "neutral",
    }
);

label!(Sentiment { Bullish => "bullish", Bearish => "bearish", Neutral => "neutral" });

label!(
    VolumeTrend {
        Increasing => "increasing",
        Decreasing => "decreasing",
        Stable => "stable",
    }
);

label!(
    VolumeConfirmation { Confirmed => "confirmed", Diverging => "diverging", Neutral => "neutral" }
);

label!(Momentum { Weak => "weak", Medium => "medium", Strong => "strong" });

label!(Consistency { Low => "low", Medium => "medium", High => "high" });

label!(LevelStrength { Weak => "weak", Medium => "medium", Strong => "strong" });

label!(
    DivergenceStrength { Weak => "weak", Medium => "medium", Strong => "strong" }
);

label!(
    /// Direction suggested by the integrated volume reading.
    TradingSignal {
        Unknown => "unknown",
        Bearish => "bearish",
        Neutral => "neutral",
        Bullish => "bullish",
    }
);

label!(
    SignalStrength {
        VeryWeak => "very_weak",
        Weak => "weak",
        Moderate => "moderate",
        Strong => "strong",
    }
);

label!(
    /// Integrated risk, ordered from lowest to highest.
    RiskLevel { VeryLow => "very_low", Low => "low", Medium => "medium", High => "high" }
);

label!(
    AnalysisQuality { Failed => "failed", Partial => "partial", Excellent => "excellent" }
);

label!(
    VolumePattern {
        FrequentSpikes => "frequent_spikes",
        ElevatedBaseline => "elevated_baseline",
        DecliningInterest => "declining_interest",
    }
);

label!(
    /// Evidence that feeds the integrated trading signal.
    SignalComponent {
        PositiveConfirmation => "positive_confirmation",
        NegativeConfirmation => "negative_confirmation",
        HighAnomalyActivity => "high_anomaly_activity",
        ElevatedVolume => "elevated_volume",
        SuppressedVolume => "suppressed_volume",
    }
);

label!(
    RiskFactor {
        VolumePriceDivergence => "volume_price_divergence",
        UnusualVolumeActivity => "unusual_volume_activity",
        LowLiquidity => "low_liquidity",
        HighVolatilityPattern => "high_volatility_pattern",
    }
);

label!(
    SystemStatus { Critical => "critical", Degraded => "degraded", Healthy => "healthy" }
);

label!(DataQuality { Poor => "poor", Excellent => "excellent" });

impl SystemStatus {
    pub fn emoji(&self) -> &'static str {
        match self {
            SystemStatus::Healthy => "✅",
            SystemStatus::Degraded => "⚠️",
            SystemStatus::Critical => "❌",
        }
    }
}

impl RiskLevel {
    /// Returns an emoji representation of the risk level.
    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::VeryLow => "🟢",
            RiskLevel::Low => "🟡",
            RiskLevel::Medium => "🟠",
            RiskLevel::High => "🔴",
        }
    }
}

impl TradingSignal {
    pub fn emoji(&self) -> &'static str {
        match self {
            TradingSignal::Bullish => "📈",
            TradingSignal::Bearish => "📉",
            TradingSignal::Neutral => "➖",
            TradingSignal::Unknown => "❔",
        }
    }
}

/// The result of running one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentOutcome {
    Completed {
        agent: AgentKind,
        report: AgentReport,
        duration_ms: u64,
    },
    Failed {
        agent: AgentKind,
        error: String,
        duration_ms: u64,
    },
}

impl AgentOutcome {
    /// A successful run, attributed to the agent that produced `report`.
    pub fn completed(report: AgentReport, duration_ms: u64) -> Self {
        AgentOutcome::Completed {
            agent: report.kind(),
            report,
            duration_ms,
        }
    }

    pub fn agent(&self) -> AgentKind {
        match self {
            AgentOutcome::Completed { agent, .. } | AgentOutcome::Failed { agent, .. } => *agent,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AgentOutcome::Completed { .. })
    }

    pub fn report(&self) -> Option<&AgentReport> {
        match self {
            AgentOutcome::Completed { report, .. } => Some(report),
            AgentOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            AgentOutcome::Failed { error, .. } => Some(error),
            AgentOutcome::Completed { .. } => None,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        match self {
            AgentOutcome::Completed { duration_ms, .. }
            | AgentOutcome::Failed { duration_ms, .. } => *duration_ms,
        }
    }
}

/// Everything computed for one symbol in one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAnalysis {
    pub symbol: String,
    /// Input file the series was read from.
    pub source: String,
    pub bars: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub analyzed_at: DateTime<Utc>,
    pub outcomes: Vec<AgentOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrated: Option<IntegratedAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<SystemHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityMetrics>,
    /// Too few agents succeeded for the integrated reading to be trusted.
    pub degraded: bool,
    /// Set when the series could not be loaded at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl StockAnalysis {
    /// A symbol whose input could not be loaded or validated.
    pub fn failed(symbol: String, source: String, error: String) -> Self {
        Self {
            symbol,
            source,
            bars: 0,
            first_date: None,
            last_date: None,
            analyzed_at: Utc::now(),
            outcomes: Vec::new(),
            integrated: None,
            health: None,
            quality: None,
            degraded: false,
            error: Some(error),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.outcomes.iter().any(AgentOutcome::is_success)
    }

    pub fn outcome(&self, kind: AgentKind) -> Option<&AgentOutcome> {
        self.outcomes.iter().find(|o| o.agent() == kind)
    }

    fn report(&self, kind: AgentKind) -> Option<&AgentReport> {
        self.outcome(kind).and_then(AgentOutcome::report)
    }

    pub fn anomaly(&self) -> Option<&AnomalyReport> {
        match self.report(AgentKind::VolumeAnomaly)? {
            AgentReport::VolumeAnomaly(r) => Some(r),
            _ => None,
        }
    }

    pub fn institutional(&self) -> Option<&InstitutionalReport> {
        match self.report(AgentKind::InstitutionalActivity)? {
            AgentReport::InstitutionalActivity(r) => Some(r),
            _ => None,
        }
    }

    pub fn confirmation(&self) -> Option<&ConfirmationReport> {
        match self.report(AgentKind::VolumeConfirmation)? {
            AgentReport::VolumeConfirmation(r) => Some(r),
            _ => None,
        }
    }

    pub fn levels(&self) -> Option<&LevelsReport> {
        match self.report(AgentKind::SupportResistance)? {
            AgentReport::SupportResistance(r) => Some(r),
            _ => None,
        }
    }

    pub fn momentum(&self) -> Option<&MomentumReport> {
        match self.report(AgentKind::VolumeMomentum)? {
            AgentReport::VolumeMomentum(r) => Some(r),
            _ => None,
        }
    }

    pub fn risk_level(&self) -> Option<RiskLevel> {
        self.integrated.as_ref().map(|i| i.risk_assessment.risk_level)
    }

    pub fn trading_signal(&self) -> TradingSignal {
        self.integrated
            .as_ref()
            .map(|i| i.trading_signal)
            .unwrap_or(TradingSignal::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64, volume: f64) -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume,
        }
    }

    #[test]
    fn test_series_sorted_and_deduped() {
        let series = PriceSeries::new(
            "TEST",
            vec![bar(3, 30.0, 3.0), bar(1, 10.0, 1.0), bar(3, 31.0, 4.0), bar(2, 20.0, 2.0)],
        );
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![10.0, 20.0, 31.0]);
        assert_eq!(series.volumes(), vec![1.0, 2.0, 4.0]);
        assert_eq!(series.last_close(), Some(31.0));
    }

    #[test]
    fn test_column_accessors() {
        let series = PriceSeries::new("TEST", vec![bar(2, 20.0, 2.0), bar(1, 10.0, 1.0)]);
        assert_eq!(series.highs(), vec![11.0, 21.0]);
        assert_eq!(series.lows(), vec![9.0, 19.0]);
        assert_eq!(series.typical_prices(), vec![10.0, 20.0]);
    }

    #[test]
    fn test_typical_price() {
        let b = bar(1, 10.0, 1.0);
        assert!((b.typical_price() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::VeryLow < RiskLevel::Low);
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert_eq!(RiskLevel::High.emoji(), "🔴");
    }

    #[test]
    fn test_label_serialization_matches_display() {
        let json = serde_json::to_string(&VolumeStatus::ExtremelyHigh).unwrap();
        assert_eq!(json, "\"extremely_high\"");
        assert_eq!(VolumeStatus::ExtremelyHigh.to_string(), "extremely_high");
        assert_eq!(
            TrendAlignment::ModerateConfirmation.to_string(),
            "moderate_confirmation"
        );
    }

    #[test]
    fn test_failed_analysis() {
        let analysis =
            StockAnalysis::failed("X".to_string(), "x.csv".to_string(), "boom".to_string());
        assert!(!analysis.is_success());
        // degraded is reserved for critical agent health
        assert!(!analysis.degraded);
        assert_eq!(analysis.trading_signal(), TradingSignal::Unknown);
        assert!(analysis.anomaly().is_none());
    }
}
