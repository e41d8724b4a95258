//! Per-symbol analysis quality metrics.

use crate::agents::{AnomalyReport, ConfirmationReport, InstitutionalReport, MomentumReport};
use crate::models::{DataQuality, Significance};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Share of the core agents that produced a report, 0-100.
    pub completeness: f64,
    /// Points for each notable finding, 0-100.
    pub depth: f64,
    pub data_quality: DataQuality,
    pub overall: f64,
}

impl QualityMetrics {
    pub fn compute(
        anomaly: Option<&AnomalyReport>,
        confirmation: Option<&ConfirmationReport>,
        momentum: Option<&MomentumReport>,
        institutional: Option<&InstitutionalReport>,
    ) -> Self {
        let present = [
            anomaly.is_some(),
            confirmation.is_some(),
            momentum.is_some(),
            institutional.is_some(),
        ];
        let completeness =
            present.iter().filter(|p| **p).count() as f64 / present.len() as f64 * 100.0;

        let findings = [
            anomaly.is_some_and(|a| a.total_anomalies > 0),
            confirmation.is_some_and(|c| c.price_volume_correlation.correlation_20.abs() > 0.3),
            institutional.is_some_and(|i| {
                matches!(i.activity_level, Significance::Medium | Significance::High)
            }),
            confirmation.is_some_and(|c| c.divergence.divergence_detected),
        ];
        let depth = findings.iter().filter(|f| **f).count() as f64 * 25.0;

        let data_quality = match anomaly {
            Some(a)
                if a.current_volume_status.current_volume > 0.0
                    && a.current_volume_status.volume_ratio > 0.0 =>
            {
                DataQuality::Excellent
            }
            _ => DataQuality::Poor,
        };

        Self {
            completeness,
            depth,
            data_quality,
            overall: 0.5 * completeness + 0.5 * depth,
        }
    }
}
