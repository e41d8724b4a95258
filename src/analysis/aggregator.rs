//! Batch aggregation and statistics.
//!
//! This module provides utilities for aggregating per-symbol analyses into
//! batch-level summaries.

use crate::models::{RiskLevel, StockAnalysis, TradingSignal};
use crate::stats::mean;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Analyses that loaded and had at least one agent succeed.
pub fn successful(analyses: &[StockAnalysis]) -> Vec<&StockAnalysis> {
    analyses.iter().filter(|a| a.is_success()).collect()
}

/// Group symbols by trading signal.
pub fn group_by_signal(analyses: &[StockAnalysis]) -> BTreeMap<TradingSignal, Vec<&StockAnalysis>> {
    let mut grouped: BTreeMap<TradingSignal, Vec<&StockAnalysis>> = BTreeMap::new();

    for analysis in successful(analyses) {
        grouped
            .entry(analysis.trading_signal())
            .or_default()
            .push(analysis);
    }

    grouped
}

/// Group symbols by integrated risk level. Symbols without an integrated
/// reading are left out.
pub fn group_by_risk(analyses: &[StockAnalysis]) -> BTreeMap<RiskLevel, Vec<&StockAnalysis>> {
    let mut grouped: BTreeMap<RiskLevel, Vec<&StockAnalysis>> = BTreeMap::new();

    for analysis in successful(analyses) {
        if let Some(level) = analysis.risk_level() {
            grouped.entry(level).or_default().push(analysis);
        }
    }

    grouped
}

/// The `n` highest integrated scores, ties broken by symbol.
pub fn top_by_score(analyses: &[StockAnalysis], n: usize) -> Vec<&StockAnalysis> {
    let mut scored: Vec<&StockAnalysis> = analyses
        .iter()
        .filter(|a| a.integrated.is_some())
        .collect();

    scored.sort_by(|a, b| {
        score_of(b)
            .cmp(&score_of(a))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    scored.truncate(n);
    scored
}

fn score_of(analysis: &StockAnalysis) -> u32 {
    analysis
        .integrated
        .as_ref()
        .map(|i| i.overall_score)
        .unwrap_or(0)
}

/// Mean overall quality score of the successful symbols.
pub fn average_quality(analyses: &[StockAnalysis]) -> f64 {
    let scores: Vec<f64> = successful(analyses)
        .iter()
        .filter_map(|a| a.quality.as_ref().map(|q| q.overall))
        .collect();
    mean(&scores).unwrap_or(0.0)
}

/// Mean current/20-day volume ratio of the successful symbols.
pub fn average_volume_ratio(analyses: &[StockAnalysis]) -> f64 {
    let ratios: Vec<f64> = successful(analyses)
        .iter()
        .filter_map(|a| a.anomaly().map(|r| r.current_volume_status.volume_ratio))
        .collect();
    mean(&ratios).unwrap_or(0.0)
}

/// Percentage of successful symbols with at least one anomaly.
pub fn anomaly_detection_rate(analyses: &[StockAnalysis]) -> f64 {
    let ok = successful(analyses);
    if ok.is_empty() {
        return 0.0;
    }
    let with_anomalies = ok
        .iter()
        .filter(|a| a.anomaly().is_some_and(|r| r.total_anomalies > 0))
        .count();
    with_anomalies as f64 / ok.len() as f64 * 100.0
}

/// Batch-level statistics for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub generated_at: DateTime<Utc>,
    pub total_symbols: usize,
    pub successful: usize,
    pub failed: usize,
    pub degraded: usize,
    pub success_rate: f64,
    pub average_quality: f64,
    pub average_volume_ratio: f64,
    pub anomaly_detection_rate: f64,
    pub average_score: f64,
    pub signal_distribution: BTreeMap<TradingSignal, usize>,
    pub risk_distribution: BTreeMap<RiskLevel, usize>,
    pub duration_seconds: f64,
}

impl BatchSummary {
    pub fn from_analyses(analyses: &[StockAnalysis], duration_seconds: f64) -> Self {
        let total = analyses.len();
        let ok = successful(analyses).len();
        let scores: Vec<f64> = analyses
            .iter()
            .filter_map(|a| a.integrated.as_ref().map(|i| i.overall_score as f64))
            .collect();

        Self {
            generated_at: Utc::now(),
            total_symbols: total,
            successful: ok,
            failed: total - ok,
            degraded: analyses.iter().filter(|a| a.degraded).count(),
            success_rate: if total > 0 {
                ok as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            average_quality: average_quality(analyses),
            average_volume_ratio: average_volume_ratio(analyses),
            anomaly_detection_rate: anomaly_detection_rate(analyses),
            average_score: mean(&scores).unwrap_or(0.0),
            signal_distribution: group_by_signal(analyses)
                .into_iter()
                .map(|(k, v)| (k, v.len()))
                .collect(),
            risk_distribution: group_by_risk(analyses)
                .into_iter()
                .map(|(k, v)| (k, v.len()))
                .collect(),
            duration_seconds,
        }
    }
}
