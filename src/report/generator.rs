//! Markdown, JSON and CSV report generation.
//!
//! This module renders one report per symbol and the batch summary files.

use crate::agents::{
    AgentKind, AnomalyReport, ConfirmationReport, InstitutionalReport, LevelsReport,
    MomentumReport,
};
use crate::analysis::{top_by_score, BatchSummary, IntegratedAnalysis, SystemHealth};
use crate::cli::OutputFormat;
use crate::config::ReportConfig;
use crate::models::{AgentOutcome, StockAnalysis};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const SUMMARY_MARKDOWN: &str = "summary.md";
pub const SUMMARY_CSV: &str = "summary.csv";

/// `<SYMBOL>_volume_analysis.<ext>`
pub fn report_file_name(symbol: &str, format: OutputFormat) -> String {
    format!("{}_volume_analysis.{}", safe_stem(symbol), format.extension())
}

fn safe_stem(symbol: &str) -> String {
    symbol
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

/// One report file name per analysis, in order. Symbols that collide after
/// sanitising (`us/AAPL.csv` and `eu/AAPL.csv`, `M&M` and `M_M`) get a
/// numeric suffix, `AAPL_2_volume_analysis.md`, so no report overwrites
/// another.
pub fn report_file_names(analyses: &[StockAnalysis], format: OutputFormat) -> Vec<String> {
    let mut used = HashSet::new();

    analyses
        .iter()
        .map(|analysis| {
            let stem = safe_stem(&analysis.symbol);
            let mut candidate = stem.clone();
            let mut n = 1;
            // compare case-insensitively for case-folding filesystems
            while !used.insert(candidate.to_lowercase()) {
                n += 1;
                candidate = format!("{}_{}", stem, n);
            }
            format!("{}_volume_analysis.{}", candidate, format.extension())
        })
        .collect()
}

/// Generate a complete Markdown report for one symbol.
pub fn generate_markdown_report(analysis: &StockAnalysis, options: &ReportConfig) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Volume Analysis: {}\n\n", analysis.symbol));
    output.push_str(&generate_metadata_section(analysis));

    if let Some(ref error) = analysis.error {
        output.push_str("## Error\n\n");
        output.push_str(&format!("Analysis could not run: {}\n\n", error));
        output.push_str(&generate_footer());
        return output;
    }

    if let Some(ref health) = analysis.health {
        output.push_str(&generate_health_section(health));
    }

    if let Some(ref integrated) = analysis.integrated {
        output.push_str(&generate_integrated_section(integrated, analysis.degraded));
    }

    for outcome in &analysis.outcomes {
        output.push_str(&generate_agent_section(analysis, outcome, options));
    }

    if let Some(ref integrated) = analysis.integrated {
        output.push_str(&generate_recommendations_section(&integrated.recommendations));
    }

    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(analysis: &StockAnalysis) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Symbol:** {}\n", analysis.symbol));
    section.push_str(&format!("- **Source:** `{}`\n", analysis.source));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        analysis.analyzed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Bars:** {}\n", analysis.bars));
    if let (Some(first), Some(last)) = (analysis.first_date, analysis.last_date) {
        section.push_str(&format!("- **Period:** {} to {}\n", first, last));
    }
    if let Some(ref quality) = analysis.quality {
        section.push_str(&format!(
            "- **Quality Score:** {:.1} (completeness {:.0}%, depth {:.0}, data {})\n",
            quality.overall, quality.completeness, quality.depth, quality.data_quality
        ));
    }
    section.push_str(&format!("- **Duration:** {}ms\n", analysis.duration_ms));
    section.push('\n');

    section
}

fn generate_health_section(health: &SystemHealth) -> String {
    let mut section = String::new();

    section.push_str("## Agent Health\n\n");
    section.push_str(&format!(
        "{} **{}** - {}/{} agents healthy ({:.1}%)\n\n",
        health.system_status.emoji(),
        health.system_status.as_str().to_uppercase(),
        health.healthy_agents,
        health.total_agents,
        health.health_percentage
    ));
    section.push_str(&format!("> {}\n\n", health.recommendation));

    section.push_str("| Agent | Status | Duration | Error |\n");
    section.push_str("|:---|:---:|---:|:---|\n");
    for agent in &health.agents {
        section.push_str(&format!(
            "| {} | {} | {}ms | {} |\n",
            agent.agent.title(),
            if agent.healthy { "✅" } else { "❌" },
            agent.duration_ms,
            agent.error.as_deref().unwrap_or("")
        ));
    }
    section.push('\n');

    section
}

fn generate_integrated_section(integrated: &IntegratedAnalysis, degraded: bool) -> String {
    let mut section = String::new();

    section.push_str("## Integrated Analysis\n\n");

    if degraded {
        section.push_str("⚠️ **Degraded:** too few agents succeeded for a reliable reading.\n\n");
        for reason in &integrated.failure_reasons {
            section.push_str(&format!("- {}\n", reason));
        }
        section.push('\n');
        return section;
    }

    let risk = &integrated.risk_assessment;
    section.push_str("| Signal | Strength | Risk | Score | Quality |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} {} | {} | {} {} ({}) | **{}**/100 | {} |\n\n",
        integrated.trading_signal.emoji(),
        integrated.trading_signal,
        integrated.signal_strength,
        risk.risk_level.emoji(),
        risk.risk_level,
        risk.risk_score,
        integrated.overall_score,
        integrated.analysis_quality
    ));

    if !integrated.signal_components.is_empty() {
        let components: Vec<&str> = integrated
            .signal_components
            .iter()
            .map(|c| c.as_str())
            .collect();
        section.push_str(&format!(
            "**Signal components:** {}\n\n",
            components.join(", ")
        ));
    }

    if !risk.risk_factors.is_empty() {
        let factors: Vec<&str> = risk.risk_factors.iter().map(|f| f.as_str()).collect();
        section.push_str(&format!("**Risk factors:** {}\n\n", factors.join(", ")));
    }

    if !integrated.key_insights.is_empty() {
        section.push_str("### Key Insights\n\n");
        for insight in &integrated.key_insights {
            section.push_str(&format!("- {}\n", insight));
        }
        section.push('\n');
    }

    if !integrated.failure_reasons.is_empty() {
        section.push_str("### Missing Inputs\n\n");
        for reason in &integrated.failure_reasons {
            section.push_str(&format!("- {}\n", reason));
        }
        section.push('\n');
    }

    section
}

fn generate_agent_section(
    analysis: &StockAnalysis,
    outcome: &AgentOutcome,
    options: &ReportConfig,
) -> String {
    let kind = outcome.agent();
    let mut section = format!("## {}\n\n", kind.title());

    if let Some(error) = outcome.error() {
        section.push_str(&format!("❌ Agent failed: {}\n\n", error));
        return section;
    }

    let body = match kind {
        AgentKind::VolumeAnomaly => analysis
            .anomaly()
            .map(|r| anomaly_body(r, options.max_anomalies_listed)),
        AgentKind::InstitutionalActivity => analysis.institutional().map(institutional_body),
        AgentKind::VolumeConfirmation => analysis.confirmation().map(confirmation_body),
        AgentKind::SupportResistance => analysis
            .levels()
            .map(|r| levels_body(r, options.include_profile)),
        AgentKind::VolumeMomentum => analysis.momentum().map(momentum_body),
    };

    section.push_str(&body.unwrap_or_default());
    section
}

fn anomaly_body(report: &AnomalyReport, max_listed: usize) -> String {
    let mut body = String::new();
    let status = &report.current_volume_status;

    body.push_str(&format!(
        "- **Current volume:** {:.0} ({:.2}x 20-day average, {:.1} percentile, {})\n",
        status.current_volume, status.volume_ratio, status.percentile, status.current_status
    ));
    body.push_str(&format!(
        "- **Anomalies:** {} total, frequency {}\n",
        report.total_anomalies, report.anomaly_frequency
    ));
    if !report.volume_patterns.is_empty() {
        let patterns: Vec<&str> = report.volume_patterns.iter().map(|p| p.as_str()).collect();
        body.push_str(&format!("- **Patterns:** {}\n", patterns.join(", ")));
    }
    body.push('\n');

    if !report.significant_anomalies.is_empty() {
        body.push_str("| Date | Volume Ratio | Z-Score | Significance |");
        body.push_str(" Price Change | Context |\n");
        body.push_str("|:---|---:|---:|:---:|---:|:---|\n");
        for a in report.significant_anomalies.iter().rev().take(max_listed) {
            body.push_str(&format!(
                "| {} | {:.2}x | {:.2} | {} | {:+.2}% | {} |\n",
                a.date,
                a.volume_ratio,
                a.z_score,
                a.significance,
                a.price_change_pct,
                a.price_context
            ));
        }
        body.push('\n');
    }

    body
}

fn institutional_body(report: &InstitutionalReport) -> String {
    let mut body = String::new();

    body.push_str(&format!(
        "- **Activity level:** {} ({} large-volume days)\n",
        report.activity_level, report.large_volume_days
    ));
    body.push_str(&format!(
        "- **Pattern:** {} / sentiment {}\n",
        report.activity_pattern, report.institutional_sentiment
    ));
    body.push_str(&format!(
        "- **Significance:** {} (average {:.2}x volume, {:+.2}% return)\n\n",
        report.activity_significance, report.average_volume_multiple, report.average_return_pct
    ));

    if !report.recent_large_days.is_empty() {
        body.push_str("| Date | Volume Multiple | Return |\n");
        body.push_str("|:---|---:|---:|\n");
        for day in &report.recent_large_days {
            let ret = day
                .return_pct
                .map(|r| format!("{:+.2}%", r))
                .unwrap_or_else(|| "-".to_string());
            body.push_str(&format!(
                "| {} | {:.2}x | {} |\n",
                day.date, day.volume_multiple, ret
            ));
        }
        body.push('\n');
    }

    body
}

fn confirmation_body(report: &ConfirmationReport) -> String {
    let mut body = String::new();
    let corr = &report.price_volume_correlation;
    let div = &report.divergence;

    body.push_str(&format!(
        "- **Trend:** {} (normalized slope {:.5}, strength {:.3})\n",
        report.trend_analysis.primary_trend,
        report.trend_analysis.normalized_slope,
        report.trend_analysis.trend_strength
    ));
    body.push_str(&format!(
        "- **Price-volume correlation:** {:.3} (50-day {:.3}, {}, {} significance, {})\n",
        corr.correlation_20,
        corr.correlation_50,
        corr.correlation_direction,
        corr.correlation_significance,
        corr.correlation_trend
    ));
    if div.divergence_detected {
        body.push_str(&format!(
            "- **Divergence:** {} ({} strength, {} significance; price {}, volume {})\n",
            div.divergence_type,
            div.divergence_strength,
            div.divergence_significance,
            div.price_trend,
            div.volume_trend
        ));
    } else {
        body.push_str("- **Divergence:** none\n");
    }
    body.push_str(&format!(
        "- **Alignment:** {} (recent volume {:.2}x 20-day average)\n",
        report.volume_signals.volume_trend_alignment, report.volume_signals.volume_ratio
    ));
    body.push_str(&format!(
        "- **Assessment:** {} (confidence {})\n\n",
        report.overall_assessment.confirmation_status,
        report.overall_assessment.confidence_score
    ));

    if !report.recent_movements.is_empty() {
        body.push_str("| Date | Price Change | Volume Ratio | Response |\n");
        body.push_str("|:---|---:|---:|:---|\n");
        for m in &report.recent_movements {
            body.push_str(&format!(
                "| {} | {:+.2}% | {:.2}x | {} |\n",
                m.date, m.price_change_pct, m.volume_ratio, m.volume_response
            ));
        }
        body.push('\n');
    }

    body
}

fn levels_body(report: &LevelsReport, include_profile: bool) -> String {
    let mut body = String::new();
    let join = |levels: &[f64]| {
        if levels.is_empty() {
            "none".to_string()
        } else {
            levels
                .iter()
                .map(|p| format!("{:.2}", p))
                .collect::<Vec<_>>()
                .join(", ")
        }
    };

    body.push_str(&format!(
        "- **Current price:** {:.2} (VWAP {:.2})\n",
        report.current_price, report.current_vwap
    ));
    body.push_str(&format!("- **Support:** {}\n", join(&report.support_levels)));
    body.push_str(&format!(
        "- **Resistance:** {}\n",
        join(&report.resistance_levels)
    ));
    body.push_str(&format!(
        "- **Level strength:** {} / {}\n",
        report.level_strength, report.volume_confirmation
    ));
    if let Some(poc) = report.point_of_control {
        body.push_str(&format!("- **Point of control:** {:.2}\n", poc));
    }
    if let Some(va) = report.value_area {
        body.push_str(&format!(
            "- **Value area:** {:.2} - {:.2} ({:.1}% of volume)\n",
            va.low, va.high, va.volume_pct
        ));
    }
    body.push('\n');

    if include_profile && !report.volume_profile.is_empty() {
        body.push_str("<details>\n<summary>Volume profile</summary>\n\n");
        body.push_str("| Price | Volume |\n");
        body.push_str("|---:|---:|\n");
        for bin in report.volume_profile.iter().rev() {
            body.push_str(&format!("| {:.2} | {:.0} |\n", bin.price, bin.volume));
        }
        body.push_str("\n</details>\n\n");
    }

    body
}

fn momentum_body(report: &MomentumReport) -> String {
    let mut body = String::new();

    body.push_str(&format!(
        "- **Volume trend:** {} (5-day {:.0}, 20-day {:.0}, 50-day {:.0})\n",
        report.overall_volume_trend,
        report.current_volume,
        report.volume_ma_20,
        report.volume_ma_50
    ));
    body.push_str(&format!(
        "- **Momentum:** {} ({:.2}x 20-day average)\n",
        report.volume_momentum, report.current_vs_ma20
    ));
    body.push_str(&format!(
        "- **Confirmation:** {} (price {}, volume {})\n",
        report.volume_confirmation, report.price_trend, report.volume_direction
    ));
    body.push_str(&format!(
        "- **Consistency:** {}\n",
        report.volume_consistency
    ));
    if let Some(roc) = report.rate_of_change_5 {
        body.push_str(&format!("- **5-day rate of change:** {:+.2}%\n", roc));
    }
    body.push('\n');

    body
}

fn generate_recommendations_section(recommendations: &[String]) -> String {
    if recommendations.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Recommendations\n\n");
    for (i, rec) in recommendations.iter().enumerate() {
        section.push_str(&format!("{}. {}\n", i + 1, rec));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    format!(
        "---\n\n*Report generated by volume-agents v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate a JSON report for one symbol.
pub fn generate_json_report(analysis: &StockAnalysis) -> Result<String> {
    serde_json::to_string_pretty(analysis).map_err(Into::into)
}

/// Write one symbol's report to `dir/file_name`, returning the file path.
pub fn write_stock_report(
    dir: &Path,
    file_name: &str,
    analysis: &StockAnalysis,
    format: OutputFormat,
    options: &ReportConfig,
) -> Result<PathBuf> {
    let content = match format {
        OutputFormat::Json => generate_json_report(analysis)?,
        OutputFormat::Markdown => generate_markdown_report(analysis, options),
    };

    let path = dir.join(file_name);
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    Ok(path)
}

/// Write every symbol's report into `dir`, one file each.
pub fn write_stock_reports(
    dir: &Path,
    analyses: &[StockAnalysis],
    format: OutputFormat,
    options: &ReportConfig,
) -> Result<Vec<PathBuf>> {
    let names = report_file_names(analyses, format);
    let mut paths = Vec::with_capacity(analyses.len());

    for (analysis, name) in analyses.iter().zip(&names) {
        if *name != report_file_name(&analysis.symbol, format) {
            warn!(
                "{}: symbol already has a report, writing {} for {}",
                analysis.symbol, name, analysis.source
            );
        }
        paths.push(write_stock_report(dir, name, analysis, format, options)?);
    }

    Ok(paths)
}

/// Generate the batch summary in Markdown.
pub fn generate_summary_markdown(summary: &BatchSummary, analyses: &[StockAnalysis]) -> String {
    let mut output = String::new();

    output.push_str("# Volume Analysis Summary\n\n");
    output.push_str(&format!(
        "*Generated {} in {:.1}s*\n\n",
        summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        summary.duration_seconds
    ));

    output.push_str("## Overall Statistics\n\n");
    output.push_str(&format!("- **Symbols:** {}\n", summary.total_symbols));
    output.push_str(&format!(
        "- **Successful:** {} ({:.1}%)\n",
        summary.successful, summary.success_rate
    ));
    output.push_str(&format!("- **Failed:** {}\n", summary.failed));
    output.push_str(&format!("- **Degraded:** {}\n", summary.degraded));
    output.push_str(&format!(
        "- **Average quality score:** {:.1}\n",
        summary.average_quality
    ));
    output.push_str(&format!(
        "- **Average integrated score:** {:.1}\n",
        summary.average_score
    ));
    output.push_str(&format!(
        "- **Average volume ratio:** {:.2}\n",
        summary.average_volume_ratio
    ));
    output.push_str(&format!(
        "- **Anomaly detection rate:** {:.1}%\n\n",
        summary.anomaly_detection_rate
    ));

    if !summary.signal_distribution.is_empty() {
        output.push_str("## Signal Distribution\n\n");
        output.push_str("| Signal | Symbols |\n");
        output.push_str("|:---|:---:|\n");
        for (signal, count) in summary.signal_distribution.iter().rev() {
            output.push_str(&format!("| {} {} | {} |\n", signal.emoji(), signal, count));
        }
        output.push('\n');
    }

    if !summary.risk_distribution.is_empty() {
        output.push_str("## Risk Distribution\n\n");
        output.push_str("| Risk | Symbols |\n");
        output.push_str("|:---|:---:|\n");
        for (risk, count) in summary.risk_distribution.iter().rev() {
            output.push_str(&format!("| {} {} | {} |\n", risk.emoji(), risk, count));
        }
        output.push('\n');
    }

    let ranked = top_by_score(analyses, analyses.len());
    if !ranked.is_empty() {
        output.push_str("## Symbols\n\n");
        output.push_str("| Symbol | Bars | Signal | Strength | Risk | Score | Quality |\n");
        output.push_str("|:---|---:|:---:|:---:|:---:|---:|---:|\n");
        for a in ranked {
            let Some(ref integrated) = a.integrated else {
                continue;
            };
            output.push_str(&format!(
                "| {} | {} | {} {} | {} | {} {} | {} | {:.1} |\n",
                a.symbol,
                a.bars,
                integrated.trading_signal.emoji(),
                integrated.trading_signal,
                integrated.signal_strength,
                integrated.risk_assessment.risk_level.emoji(),
                integrated.risk_assessment.risk_level,
                integrated.overall_score,
                a.quality.as_ref().map(|q| q.overall).unwrap_or(0.0)
            ));
        }
        output.push('\n');
    }

    let failures: Vec<&StockAnalysis> = analyses.iter().filter(|a| !a.is_success()).collect();
    if !failures.is_empty() {
        output.push_str("## Failures\n\n");
        for a in failures {
            let reason = a.error.clone().unwrap_or_else(|| {
                a.integrated
                    .as_ref()
                    .map(|i| i.failure_reasons.join("; "))
                    .unwrap_or_default()
            });
            output.push_str(&format!("- **{}** (`{}`): {}\n", a.symbol, a.source, reason));
        }
        output.push('\n');
    }

    output.push_str(&generate_footer());

    output
}

/// One row of `summary.csv`.
#[derive(Debug, serde::Serialize)]
struct SummaryRow<'a> {
    #[serde(rename = "Symbol")]
    symbol: &'a str,
    #[serde(rename = "Success")]
    success: bool,
    #[serde(rename = "Bars")]
    bars: usize,
    #[serde(rename = "Quality Score")]
    quality_score: f64,
    #[serde(rename = "Data Quality")]
    data_quality: &'a str,
    #[serde(rename = "Volume Ratio")]
    volume_ratio: Option<f64>,
    #[serde(rename = "Anomalies Count")]
    anomalies_count: Option<usize>,
    #[serde(rename = "Correlation Strength")]
    correlation_strength: Option<f64>,
    #[serde(rename = "Institutional Activity")]
    institutional_activity: &'a str,
    #[serde(rename = "Divergence Detected")]
    divergence_detected: Option<bool>,
    #[serde(rename = "Trading Signal")]
    trading_signal: &'a str,
    #[serde(rename = "Risk Level")]
    risk_level: &'a str,
    #[serde(rename = "Overall Score")]
    overall_score: Option<u32>,
}

impl<'a> SummaryRow<'a> {
    fn from_analysis(a: &'a StockAnalysis) -> Self {
        Self {
            symbol: &a.symbol,
            success: a.is_success(),
            bars: a.bars,
            quality_score: a.quality.as_ref().map(|q| q.overall).unwrap_or(0.0),
            data_quality: a
                .quality
                .as_ref()
                .map(|q| q.data_quality.as_str())
                .unwrap_or(""),
            volume_ratio: a.anomaly().map(|r| r.current_volume_status.volume_ratio),
            anomalies_count: a.anomaly().map(|r| r.total_anomalies),
            correlation_strength: a
                .confirmation()
                .map(|r| r.price_volume_correlation.correlation_20),
            institutional_activity: a
                .institutional()
                .map(|r| r.activity_level.as_str())
                .unwrap_or(""),
            divergence_detected: a.confirmation().map(|r| r.divergence.divergence_detected),
            trading_signal: a.trading_signal().as_str(),
            risk_level: a.risk_level().map(|r| r.as_str()).unwrap_or(""),
            overall_score: a.integrated.as_ref().map(|i| i.overall_score),
        }
    }
}

/// Write `summary.csv`, one row per symbol.
pub fn write_summary_csv(path: &Path, analyses: &[StockAnalysis]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for analysis in analyses {
        writer.serialize(SummaryRow::from_analysis(analysis))?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
