/// Error types for the forecasting pipeline
use std::fmt;
use thiserror::Error;

/// Why there is nothing to forecast from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    /// The store returned no rows at all.
    EmptyStore,
    /// Every row failed timestamp/AQI coercion.
    NoValidRows { dropped: usize },
    /// The newest reading is older than the staleness limit.
    Stale { age_minutes: i64 },
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::EmptyStore => write!(f, "the reading store returned no rows"),
            Unavailable::NoValidRows { dropped } => {
                write!(f, "all {} rows failed timestamp/AQI coercion", dropped)
            }
            Unavailable::Stale { age_minutes } => {
                write!(f, "newest reading is {} minutes old", age_minutes)
            }
        }
    }
}

/// Pipeline stage bounded by a caller-imposed timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    StoreQuery,
    Prediction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::StoreQuery => write!(f, "Reading store query"),
            Stage::Prediction => write!(f, "Model prediction"),
        }
    }
}

/// Every way a forecast request can fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// No usable readings
    #[error("No usable data: {reason}")]
    DataUnavailable { reason: Unavailable },

    /// Not enough grid points yet
    #[error("Cold start: {points} of {required} grid points available")]
    ColdStart {
        points: usize,
        required: usize,
        wait_minutes: i64,
    },

    /// Ensemble artifact missing, corrupt or failing at prediction time
    #[error("Model ensemble unavailable: {0}")]
    ModelUnavailable(String),

    /// A timestamp was neither zone-aware nor parseable as naive UTC
    #[error("Ambiguous timestamp: {0}")]
    TimestampAmbiguity(String),

    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: Stage, seconds: u64 },

    #[error("Reading store query failed: {0}")]
    Store(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ForecastError {
    /// Short machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::DataUnavailable { .. } => "data_unavailable",
            ForecastError::ColdStart { .. } => "cold_start",
            ForecastError::ModelUnavailable(_) => "model_unavailable",
            ForecastError::TimestampAmbiguity(_) => "timestamp_ambiguity",
            ForecastError::Timeout { .. } => "timeout",
            ForecastError::Store(_) => "store",
            ForecastError::Config(_) => "config",
        }
    }

    /// Whether the process should stop rather than wait and retry.
    ///
    /// Only a bad configuration is fatal; every pipeline failure clears up
    /// on its own or after the operator replaces the model artifact.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ForecastError::Config(_))
    }

    /// What the person looking at the forecast should do about it.
    pub fn user_message(&self) -> String {
        match self {
            ForecastError::DataUnavailable { reason } => match reason {
                Unavailable::Stale { age_minutes } => format!(
                    "Waiting for data: the sensor has been silent for {} minutes.",
                    age_minutes
                ),
                _ => "Waiting for data: collecting readings, try again shortly.".to_string(),
            },
            ForecastError::ColdStart { wait_minutes, .. } => format!(
                "Cold start: not enough continuous history yet. Please wait {} minutes.",
                wait_minutes
            ),
            ForecastError::ModelUnavailable(detail) => format!(
                "Forecast model unavailable ({}). Re-upload the model artifact.",
                detail
            ),
            ForecastError::TimestampAmbiguity(text) => format!(
                "Could not interpret timestamp '{}'. Check the store's timestamp column.",
                text
            ),
            ForecastError::Timeout { stage, seconds } => format!(
                "{} took longer than {}s. Retry later.",
                stage, seconds
            ),
            ForecastError::Store(_) => {
                "Could not reach the reading store. Retry later.".to_string()
            }
            ForecastError::Config(detail) => format!("Fix the forecast configuration: {}.", detail),
        }
    }
}

/// Type alias for Results using ForecastError
pub type Result<T> = std::result::Result<T, ForecastError>;
