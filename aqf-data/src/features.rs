//! Builds the lag/rolling feature vector describing the newest grid point.

use crate::conditioner::ConditionedSeries;
use aqf_core::error::{ForecastError, Result, Unavailable};
use aqf_core::features::{Confidence, Feature, FeatureVector, Lag};
use aqf_utils::numeric::mean;
use chrono::DateTime;
use chrono_tz::Tz;

/// Points averaged by the rolling mean.
pub const ROLLING_WINDOW: usize = 3;

/// Features for "now" plus the anchor the forecaster needs.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSnapshot {
    pub vector: FeatureVector,
    /// Time of the newest grid point.
    pub last_time: DateTime<Tz>,
    /// AQI of the newest grid point; the forecast is anchored to it.
    pub current_aqi: f64,
}

/// Derive the feature vector from the tail of `series`.
///
/// Lags the series is too short for copy the nearest shallower lag and are
/// tagged [`Confidence::Backfilled`] with the lag the value came from.
pub fn build_features(series: &ConditionedSeries) -> Result<FeatureSnapshot> {
    let last = series.last().ok_or(ForecastError::DataUnavailable {
        reason: Unavailable::EmptyStore,
    })?;
    let values = series.aqi_values();

    let lag_1 = Feature::observed(last.aqi);
    let lag_2 = lag_or_backfill(&values, Lag::Lag2, (lag_1, Lag::Lag1));
    let lag_3 = lag_or_backfill(&values, Lag::Lag3, (lag_2, Lag::Lag2));
    let lag_6 = lag_or_backfill(&values, Lag::Lag6, (lag_3, Lag::Lag3));

    let tail = &values[values.len().saturating_sub(ROLLING_WINDOW)..];
    let rolling_mean_3 = Feature {
        value: mean(tail).unwrap_or(last.aqi),
        confidence: if tail.len() == ROLLING_WINDOW {
            Confidence::Observed
        } else {
            Confidence::Partial { points: tail.len() }
        },
    };

    let vector = FeatureVector {
        aqi_lag_1: lag_1,
        aqi_lag_2: lag_2,
        aqi_lag_3: lag_3,
        aqi_lag_6: lag_6,
        rolling_mean_3,
    };
    if vector.is_degraded() {
        log::info!(
            "[AQF] features: cold-start backfill over {} grid points",
            values.len()
        );
    }

    Ok(FeatureSnapshot {
        vector,
        last_time: last.time,
        current_aqi: last.aqi,
    })
}

fn lag_or_backfill(values: &[f64], lag: Lag, shallower: (Feature, Lag)) -> Feature {
    let back = lag.points_back();
    if values.len() > back {
        return Feature::observed(values[values.len() - 1 - back]);
    }
    let (feature, shallower_lag) = shallower;
    let from = match feature.confidence {
        Confidence::Backfilled { from } => from,
        _ => shallower_lag,
    };
    Feature {
        value: feature.value,
        confidence: Confidence::Backfilled { from },
    }
}
