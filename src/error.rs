use thiserror::Error;

#[derive(Error, Debug)]
pub enum PnlError {
    #[error("Unreadable file {path}: {reason}")]
    UnreadableFile { path: String, reason: String },

    #[error("Malformed report: {0}")]
    MalformedReport(String),

    #[error("Validation failed: {}", join_violations(.violations))]
    Validation { violations: Vec<Violation> },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Insight generation failed: {0}")]
    InsightGeneration(String),

    #[error("Pattern error: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "llm")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// A structural problem severe enough that no record can be finalized.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Violation {
    #[error("company name could not be detected and no override was supplied")]
    MissingCompanyName,

    #[error("reporting period could not be detected and no override was supplied")]
    MissingPeriod,

    #[error("trading income total is negative ({total})")]
    NegativeIncome { total: f64 },

    #[error("non-numeric value {value} for '{account}' in {section}")]
    NonFiniteValue {
        section: String,
        account: String,
        value: f64,
    },
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, PnlError>;
