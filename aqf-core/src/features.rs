//! Feature vector types handed from the feature builder to the ensemble.
//!
//! The static part of the vector (lags and rolling mean) is computed once
//! per forecast call; [`FeatureVector::row_at`] adds the hour/minute of the
//! predicted instant to produce the fixed-schema [`FeatureRow`].

use chrono::{DateTime, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// AQI lags used by the models, in grid steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lag {
    Lag1,
    Lag2,
    Lag3,
    Lag6,
}

impl Lag {
    /// Number of grid points back from the newest point.
    ///
    /// `Lag1` is the newest point itself; `LagK` for `K > 1` is `K` points
    /// before it. The point one step back is deliberately not a lag: with
    /// two grid points `aqi_lag_2` must backfill from `aqi_lag_1`, and the
    /// trained models expect that layout.
    pub fn points_back(self) -> usize {
        match self {
            Lag::Lag1 => 0,
            Lag::Lag2 => 2,
            Lag::Lag3 => 3,
            Lag::Lag6 => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Lag::Lag1 => "aqi_lag_1",
            Lag::Lag2 => "aqi_lag_2",
            Lag::Lag3 => "aqi_lag_3",
            Lag::Lag6 => "aqi_lag_6",
        }
    }
}

/// How a feature value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Confidence {
    /// Read straight off the conditioned series.
    Observed,
    /// The series was too short; the value was copied from a shallower lag.
    Backfilled { from: Lag },
    /// An aggregate computed over fewer points than its nominal window.
    Partial { points: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Feature {
    pub value: f64,
    pub confidence: Confidence,
}

impl Feature {
    pub fn observed(value: f64) -> Self {
        Self {
            value,
            confidence: Confidence::Observed,
        }
    }

    pub fn is_observed(&self) -> bool {
        self.confidence == Confidence::Observed
    }
}

/// The lag/rolling features describing "now".
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector {
    pub aqi_lag_1: Feature,
    pub aqi_lag_2: Feature,
    pub aqi_lag_3: Feature,
    pub aqi_lag_6: Feature,
    pub rolling_mean_3: Feature,
}

impl FeatureVector {
    /// True when any feature was backfilled or only partially computed.
    pub fn is_degraded(&self) -> bool {
        [
            self.aqi_lag_1,
            self.aqi_lag_2,
            self.aqi_lag_3,
            self.aqi_lag_6,
            self.rolling_mean_3,
        ]
        .iter()
        .any(|f| !f.is_observed())
    }

    /// Model input for a prediction targeting `at`.
    pub fn row_at(&self, at: &DateTime<Tz>) -> FeatureRow {
        FeatureRow {
            hour: f64::from(at.hour()),
            minute: f64::from(at.minute()),
            aqi_lag_1: self.aqi_lag_1.value,
            aqi_lag_2: self.aqi_lag_2.value,
            aqi_lag_3: self.aqi_lag_3.value,
            aqi_lag_6: self.aqi_lag_6.value,
            rolling_mean: self.rolling_mean_3.value,
        }
    }
}

/// Column of the fixed model input schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    Hour,
    Minute,
    #[serde(rename = "aqi_lag_1")]
    AqiLag1,
    #[serde(rename = "aqi_lag_2")]
    AqiLag2,
    #[serde(rename = "aqi_lag_3")]
    AqiLag3,
    #[serde(rename = "aqi_lag_6")]
    AqiLag6,
    RollingMean,
}

impl FeatureColumn {
    pub const ALL: [FeatureColumn; 7] = [
        FeatureColumn::Hour,
        FeatureColumn::Minute,
        FeatureColumn::AqiLag1,
        FeatureColumn::AqiLag2,
        FeatureColumn::AqiLag3,
        FeatureColumn::AqiLag6,
        FeatureColumn::RollingMean,
    ];

    /// Column name as it appears in model artifacts.
    pub fn name(self) -> &'static str {
        match self {
            FeatureColumn::Hour => "hour",
            FeatureColumn::Minute => "minute",
            FeatureColumn::AqiLag1 => "aqi_lag_1",
            FeatureColumn::AqiLag2 => "aqi_lag_2",
            FeatureColumn::AqiLag3 => "aqi_lag_3",
            FeatureColumn::AqiLag6 => "aqi_lag_6",
            FeatureColumn::RollingMean => "rolling_mean",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// One model input row: `hour, minute, aqi_lag_1, aqi_lag_2, aqi_lag_3, aqi_lag_6, rolling_mean`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureRow {
    pub hour: f64,
    pub minute: f64,
    pub aqi_lag_1: f64,
    pub aqi_lag_2: f64,
    pub aqi_lag_3: f64,
    pub aqi_lag_6: f64,
    pub rolling_mean: f64,
}

impl FeatureRow {
    pub fn get(&self, column: FeatureColumn) -> f64 {
        match column {
            FeatureColumn::Hour => self.hour,
            FeatureColumn::Minute => self.minute,
            FeatureColumn::AqiLag1 => self.aqi_lag_1,
            FeatureColumn::AqiLag2 => self.aqi_lag_2,
            FeatureColumn::AqiLag3 => self.aqi_lag_3,
            FeatureColumn::AqiLag6 => self.aqi_lag_6,
            FeatureColumn::RollingMean => self.rolling_mean,
        }
    }
}
