//! Multi-horizon forecasting anchored to the last observed AQI.
//!
//! Every horizon model sees the same lag features; only the hour/minute of
//! the target instant changes. The step-1 model's miss against the current
//! reading becomes an offset added to every step, so the curve starts at
//! the value the user is looking at.

use crate::ensemble::ModelEnsemble;
use aqf_core::error::Result;
use aqf_core::forecast::{ForecastPoint, ForecastTable};
use aqf_data::features::FeatureSnapshot;
use aqf_utils::numeric::round_to;
use aqf_utils::timestamps::wall_clock;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// How much of the step-1 offset each step receives.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BiasPolicy {
    /// Full offset on every step.
    #[default]
    Static,
    /// Full offset at step 1, falling linearly to `final_weight` at the last step.
    LinearDecay { final_weight: f64 },
    /// Raw model output.
    #[serde(rename = "none")]
    Disabled,
}

impl BiasPolicy {
    pub fn weight(&self, step: u32, horizons: u32) -> f64 {
        match *self {
            BiasPolicy::Static => 1.0,
            BiasPolicy::Disabled => 0.0,
            BiasPolicy::LinearDecay { final_weight } => {
                if horizons <= 1 {
                    return 1.0;
                }
                let progress = f64::from(step.saturating_sub(1)) / f64::from(horizons - 1);
                1.0 + (final_weight - 1.0) * progress
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnchoredForecaster {
    pub horizons: u32,
    pub step_minutes: i64,
    pub bias: BiasPolicy,
}

impl Default for AnchoredForecaster {
    fn default() -> Self {
        Self {
            horizons: 6,
            step_minutes: 10,
            bias: BiasPolicy::Static,
        }
    }
}

impl AnchoredForecaster {
    /// Produce one point per step, or fail as a whole.
    pub fn forecast(
        &self,
        ensemble: &ModelEnsemble,
        snapshot: &FeatureSnapshot,
    ) -> Result<ForecastTable> {
        let target = |step: u32| {
            snapshot.last_time + Duration::minutes(self.step_minutes * i64::from(step))
        };

        let raw_first = ensemble.predict(1, &snapshot.vector.row_at(&target(1)))?;
        let bias_offset = snapshot.current_aqi - raw_first;

        let mut points = Vec::with_capacity(self.horizons as usize);
        for step in 1..=self.horizons {
            let at = target(step);
            let raw = if step == 1 {
                raw_first
            } else {
                ensemble.predict(step, &snapshot.vector.row_at(&at))?
            };
            let corrected = raw + self.bias.weight(step, self.horizons) * bias_offset;
            points.push(ForecastPoint {
                step,
                time: wall_clock(&at),
                forecast_aqi: round_to(corrected.max(0.0), 1),
            });
        }

        log::info!(
            "[AQF] forecaster: {} steps anchored at {:.1} (offset {:+.2})",
            points.len(),
            snapshot.current_aqi,
            bias_offset
        );
        Ok(ForecastTable::new(
            points,
            snapshot.current_aqi,
            bias_offset,
            snapshot.last_time.to_rfc3339(),
            snapshot.vector.is_degraded(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::{HorizonModel, LinearModel};
    use aqf_core::error::ForecastError;
    use aqf_core::features::{Feature, FeatureColumn, FeatureVector};
    use chrono::TimeZone;
    use chrono_tz::Asia::Kolkata;

    fn snapshot(current: f64) -> FeatureSnapshot {
        FeatureSnapshot {
            vector: FeatureVector {
                aqi_lag_1: Feature::observed(current),
                aqi_lag_2: Feature::observed(current),
                aqi_lag_3: Feature::observed(current),
                aqi_lag_6: Feature::observed(current),
                rolling_mean_3: Feature::observed(current),
            },
            last_time: Kolkata.with_ymd_and_hms(2025, 1, 10, 23, 30, 0).unwrap(),
            current_aqi: current,
        }
    }

    /// Step `n` predicts `intercept + n * slope`, ignoring features.
    fn ensemble(intercept: f64, slope: f64) -> ModelEnsemble {
        let models: Vec<Box<dyn HorizonModel>> = (1..=6)
            .map(|step| {
                Box::new(LinearModel::new(intercept + slope * f64::from(step), vec![]))
                    as Box<dyn HorizonModel>
            })
            .collect();
        ModelEnsemble::from_models(models)
    }

    fn values(table: &ForecastTable) -> Vec<f64> {
        table.points.iter().map(|p| p.forecast_aqi).collect()
    }

    #[test]
    fn first_step_equals_current_reading() {
        let table = AnchoredForecaster::default()
            .forecast(&ensemble(30.0, 2.0), &snapshot(47.3))
            .unwrap();
        assert_eq!(table.points[0].forecast_aqi, 47.3);
        assert_eq!(table.anchor_aqi, 47.3);
        assert_eq!(values(&table), vec![47.3, 49.3, 51.3, 53.3, 55.3, 57.3]);
    }

    #[test]
    fn zero_model_error_means_zero_offset() {
        let models: Vec<Box<dyn HorizonModel>> = (0..6)
            .map(|_| {
                Box::new(LinearModel::new(0.0, vec![(FeatureColumn::AqiLag1, 1.0)]))
                    as Box<dyn HorizonModel>
            })
            .collect();
        let table = AnchoredForecaster::default()
            .forecast(&ModelEnsemble::from_models(models), &snapshot(64.0))
            .unwrap();
        assert_eq!(table.bias_offset, 0.0);
        assert!(values(&table).iter().all(|v| *v == 64.0));
    }

    #[test]
    fn times_roll_over_midnight() {
        let table = AnchoredForecaster::default()
            .forecast(&ensemble(30.0, 0.0), &snapshot(40.0))
            .unwrap();
        let times: Vec<&str> = table.points.iter().map(|p| p.time.as_str()).collect();
        assert_eq!(times, vec!["23:40", "23:50", "00:00", "00:10", "00:20", "00:30"]);
        let steps: Vec<u32> = table.points.iter().map(|p| p.step).collect();
        assert_eq!(steps, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn forecasts_are_clamped_at_zero() {
        let table = AnchoredForecaster::default()
            .forecast(&ensemble(50.0, -20.0), &snapshot(5.0))
            .unwrap();
        assert_eq!(table.points[0].forecast_aqi, 5.0);
        assert!(values(&table).iter().all(|v| *v >= 0.0));
        assert_eq!(table.points[5].forecast_aqi, 0.0);
        assert_eq!(table.y_range.0, 0.0);
    }

    #[test]
    fn linear_decay_fades_the_offset() {
        let forecaster = AnchoredForecaster {
            bias: BiasPolicy::LinearDecay { final_weight: 0.0 },
            ..Default::default()
        };
        // Raw output is 30 everywhere; offset is +10.
        let table = forecaster.forecast(&ensemble(30.0, 0.0), &snapshot(40.0)).unwrap();
        assert_eq!(values(&table), vec![40.0, 38.0, 36.0, 34.0, 32.0, 30.0]);
    }

    #[test]
    fn disabled_bias_returns_raw_output() {
        let forecaster = AnchoredForecaster {
            bias: BiasPolicy::Disabled,
            ..Default::default()
        };
        let table = forecaster.forecast(&ensemble(30.0, 1.0), &snapshot(40.0)).unwrap();
        assert_eq!(table.points[0].forecast_aqi, 31.0);
        assert_eq!(table.bias_offset, 9.0, "offset is still reported");
    }

    #[test]
    fn missing_horizon_fails_the_whole_forecast() {
        let models: Vec<Box<dyn HorizonModel>> = (0..5)
            .map(|_| Box::new(LinearModel::new(1.0, vec![])) as Box<dyn HorizonModel>)
            .collect();
        let result = AnchoredForecaster::default()
            .forecast(&ModelEnsemble::from_models(models), &snapshot(40.0));
        assert!(matches!(result, Err(ForecastError::ModelUnavailable(_))));
    }

    #[test]
    fn same_inputs_same_output() {
        let forecaster = AnchoredForecaster::default();
        let models = ensemble(33.3, 1.7);
        let a = forecaster.forecast(&models, &snapshot(58.9)).unwrap();
        let b = forecaster.forecast(&models, &snapshot(58.9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn bias_policy_parses_from_config() {
        let policy: BiasPolicy =
            serde_json::from_str(r#"{ "kind": "linear_decay", "final_weight": 0.5 }"#).unwrap();
        assert_eq!(policy, BiasPolicy::LinearDecay { final_weight: 0.5 });
        assert_eq!(policy.weight(1, 6), 1.0);
        assert_eq!(policy.weight(6, 6), 0.5);
        let none: BiasPolicy = serde_json::from_str(r#"{ "kind": "none" }"#).unwrap();
        assert_eq!(none, BiasPolicy::Disabled);
    }
}
