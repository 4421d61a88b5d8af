//! The forecast entry point: store rows in, forecast table or typed failure out.
//!
//! A [`Pipeline`] is built once per process. The model artifact is loaded
//! at that point; if loading fails the pipeline is still constructed and
//! every forecast request reports [`ForecastError::ModelUnavailable`] until
//! the process is restarted with a good artifact.

use crate::anchor::AnchoredForecaster;
use crate::config::PipelineConfig;
use crate::ensemble::{load_ensemble, ModelEnsemble};
use aqf_core::error::{ForecastError, Result};
use aqf_core::forecast::ForecastTable;
use aqf_core::reading::RawReading;
use aqf_core::store::ReadingStore;
use aqf_data::conditioner::SeriesConditioner;
use aqf_data::features::build_features;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    conditioner: SeriesConditioner,
    forecaster: AnchoredForecaster,
    ensemble: std::result::Result<Arc<ModelEnsemble>, String>,
}

impl Pipeline {
    /// Build from a config and the outcome of loading the ensemble.
    ///
    /// Only an invalid config is an error here.
    pub fn new(config: PipelineConfig, ensemble: anyhow::Result<ModelEnsemble>) -> Result<Self> {
        config.validate()?;
        let ensemble = match ensemble {
            Ok(e) if e.horizons() != config.horizons => Err(format!(
                "artifact has {} horizons, config expects {}",
                e.horizons(),
                config.horizons
            )),
            Ok(e) => Ok(Arc::new(e)),
            Err(e) => Err(format!("{:#}", e)),
        };
        if let Err(detail) = &ensemble {
            log::warn!("[AQF] pipeline: model ensemble unavailable: {}", detail);
        }
        Ok(Self {
            conditioner: SeriesConditioner::new(config.conditioner()?),
            forecaster: config.forecaster(),
            config,
            ensemble,
        })
    }

    /// Build with the ensemble loaded from `artifact`.
    pub fn with_artifact(config: PipelineConfig, artifact: &Path) -> Result<Self> {
        let ensemble = load_ensemble(artifact, config.horizons);
        Self::new(config, ensemble)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn model_ready(&self) -> bool {
        self.ensemble.is_ok()
    }

    /// Forecast from an already-fetched batch of rows as seen at `now`.
    ///
    /// `now` feeds the staleness check only; `None` skips it.
    pub fn forecast(
        &self,
        rows: &[RawReading],
        now: Option<DateTime<Utc>>,
    ) -> Result<ForecastTable> {
        let ensemble = self
            .ensemble
            .as_ref()
            .map_err(|detail| ForecastError::ModelUnavailable(detail.clone()))?;
        let series = self.conditioner.condition(rows, now)?;
        let snapshot = build_features(&series)?;
        self.forecaster.forecast(ensemble, &snapshot)
    }

    /// Query `store` with the configured fetch policy, then forecast.
    pub fn run(
        &self,
        store: &dyn ReadingStore,
        now: Option<DateTime<Utc>>,
    ) -> Result<ForecastTable> {
        let rows = store
            .fetch_combined(&self.config.fetch)
            .map_err(|e| ForecastError::Store(format!("{:#}", e)))?;
        self.forecast(&rows, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::{parse_ensemble, HorizonModel, LinearModel};
    use aqf_core::error::Unavailable;
    use aqf_core::features::FeatureColumn;
    use aqf_core::store::Table;
    use chrono::TimeZone;

    /// Persistence model: every horizon predicts `aqi_lag_1 + drift * step`.
    fn drifting_ensemble(drift: f64) -> ModelEnsemble {
        let models: Vec<Box<dyn HorizonModel>> = (1..=6)
            .map(|step| {
                Box::new(LinearModel::new(
                    drift * f64::from(step),
                    vec![(FeatureColumn::AqiLag1, 1.0)],
                )) as Box<dyn HorizonModel>
            })
            .collect();
        ModelEnsemble::from_models(models)
    }

    fn pipeline(ensemble: anyhow::Result<ModelEnsemble>) -> Pipeline {
        Pipeline::new(PipelineConfig::default(), ensemble).unwrap()
    }

    /// One reading every 5 minutes from 10:00 local, ids in insertion order.
    fn rows(values: &[f64]) -> Vec<RawReading> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let minutes = 5 * i;
                RawReading {
                    id: Some(i as i64 + 1),
                    timestamp: Some(format!(
                        "2025-01-10T{:02}:{:02}:00+05:30",
                        10 + minutes / 60,
                        minutes % 60
                    )),
                    aqi: Some(v.to_string()),
                    ..Default::default()
                }
            })
            .collect()
    }

    fn now_local(hour: u32, minute: u32) -> Option<DateTime<Utc>> {
        Some(
            chrono_tz::Asia::Kolkata
                .with_ymd_and_hms(2025, 1, 10, hour, minute, 0)
                .unwrap()
                .with_timezone(&Utc),
        )
    }

    struct FixedStore(Vec<RawReading>);

    impl ReadingStore for FixedStore {
        fn fetch_recent(&self, table: Table, limit: usize) -> anyhow::Result<Vec<RawReading>> {
            match table {
                Table::Realtime => Ok(self.0.iter().rev().take(limit).cloned().collect()),
                Table::History => Ok(Vec::new()),
            }
        }
    }

    struct BrokenStore;

    impl ReadingStore for BrokenStore {
        fn fetch_recent(&self, _table: Table, _limit: usize) -> anyhow::Result<Vec<RawReading>> {
            anyhow::bail!("connection refused")
        }
    }

    #[test]
    fn forecast_is_anchored_and_ordered() {
        let p = pipeline(Ok(drifting_ensemble(1.5)));
        // 10:00..10:35 -> buckets 10:00..10:30, last bucket averages 58 and 60
        let table = p
            .forecast(&rows(&[40.0, 42.0, 44.0, 46.0, 50.0, 54.0, 58.0, 60.0]), now_local(10, 36))
            .unwrap();
        assert_eq!(table.points.len(), 6);
        assert_eq!(table.anchor_aqi, 59.0);
        assert_eq!(table.points[0].forecast_aqi, 59.0);
        assert_eq!(table.points[0].time, "10:40");
        assert_eq!(table.points[5].time, "11:30");
        assert_eq!(table.points[5].forecast_aqi, 59.0 + 1.5 * 5.0);
        assert!(table.degraded_features, "four grid points cannot fill aqi_lag_6");
    }

    #[test]
    fn forecasts_are_never_negative() {
        let p = pipeline(Ok(drifting_ensemble(-30.0)));
        let table = p
            .forecast(&rows(&[20.0, 15.0, 10.0, 8.0, 6.0, 4.0, 2.0, 1.0]), None)
            .unwrap();
        assert!(table.points.iter().all(|pt| pt.forecast_aqi >= 0.0));
    }

    #[test]
    fn repeated_calls_are_identical() {
        let p = pipeline(Ok(drifting_ensemble(0.7)));
        let input = rows(&[40.0, 41.0, 45.0, 43.0, 47.0, 52.0, 50.0, 49.0]);
        assert_eq!(p.forecast(&input, None), p.forecast(&input, None));
    }

    #[test]
    fn cold_start_reports_wait_time() {
        let p = pipeline(Ok(drifting_ensemble(0.0)));
        // 10:00..10:25 -> three grid points
        let err = p.forecast(&rows(&[40.0, 42.0, 44.0, 46.0, 48.0, 50.0]), None).unwrap_err();
        assert_eq!(
            err,
            ForecastError::ColdStart {
                points: 3,
                required: 4,
                wait_minutes: 10
            }
        );
    }

    #[test]
    fn stale_data_is_unavailable() {
        let p = pipeline(Ok(drifting_ensemble(0.0)));
        let err = p
            .forecast(&rows(&[40.0, 42.0, 44.0, 46.0, 48.0, 50.0, 52.0, 54.0]), now_local(15, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            ForecastError::DataUnavailable {
                reason: Unavailable::Stale { .. }
            }
        ));
    }

    #[test]
    fn failed_artifact_load_is_reported_per_request() {
        let p = pipeline(Err(anyhow::anyhow!("cannot open model artifact model.json")));
        assert!(!p.model_ready());
        let input = rows(&[40.0, 41.0, 45.0, 43.0, 47.0, 52.0, 50.0, 49.0]);
        for _ in 0..2 {
            match p.forecast(&input, None) {
                Err(ForecastError::ModelUnavailable(detail)) => {
                    assert!(detail.contains("model.json"))
                }
                other => panic!("expected ModelUnavailable, got {:?}", other),
            }
        }
    }

    #[test]
    fn horizon_count_mismatch_is_model_unavailable() {
        let one = parse_ensemble(
            r#"{ "version": 1, "horizons": [
                { "step": 1, "model": { "kind": "linear", "intercept": 0.0, "weights": {} } } ] }"#,
            1,
        );
        let p = pipeline(one);
        assert!(!p.model_ready());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = PipelineConfig {
            horizons: 0,
            ..Default::default()
        };
        assert!(matches!(
            Pipeline::new(config, Ok(drifting_ensemble(0.0))),
            Err(ForecastError::Config(_))
        ));
    }

    #[test]
    fn run_reads_the_store() {
        let p = pipeline(Ok(drifting_ensemble(0.0)));
        let store = FixedStore(rows(&[40.0, 42.0, 44.0, 46.0, 50.0, 54.0, 58.0, 60.0]));
        let table = p.run(&store, None).unwrap();
        assert_eq!(table.anchor_aqi, 59.0);

        let empty = FixedStore(Vec::new());
        assert_eq!(
            p.run(&empty, None).unwrap_err(),
            ForecastError::DataUnavailable {
                reason: Unavailable::EmptyStore
            }
        );
    }

    #[test]
    fn store_failures_become_store_errors() {
        let p = pipeline(Ok(drifting_ensemble(0.0)));
        assert!(matches!(p.run(&BrokenStore, None), Err(ForecastError::Store(_))));
    }
}
