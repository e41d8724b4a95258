//! Typed errors for loading and analysis.
//!
//! Library-level code returns `AnalysisError`; the binary wraps these in
//! `anyhow` with context where it needs to.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Series is shorter than the agent's minimum window.
    #[error("Insufficient data: {required} bars required, {available} available")]
    InsufficientData { required: usize, available: usize },

    /// A required CSV column is absent from the header.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A row failed validation (non-finite price, high < low, negative volume...).
    #[error("Invalid bar at row {row}: {reason}")]
    InvalidBar { row: usize, reason: String },

    #[error("Unparseable date '{value}' at row {row}")]
    DateParse { row: usize, value: String },

    #[error("No rows found in {0}")]
    EmptySeries(String),

    #[error("Unknown agent '{name}'. Available: {available}")]
    UnknownAgent { name: String, available: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
