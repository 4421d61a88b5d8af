//! The `forecast` subcommand: fetch rows, run the pipeline, print the table.
//!
//! The store query and the model-evaluating pipeline each run under their
//! own timeout. Blocking work (SQLite, model evaluation) goes through
//! `spawn_blocking` so the timeout can fire while it runs.

use crate::remote::RestStore;
use aqf_core::error::{ForecastError, Result, Stage};
use aqf_core::forecast::ForecastTable;
use aqf_core::reading::RawReading;
use aqf_core::store::{FetchPolicy, ReadingStore};
use aqf_db::Database;
use aqf_forecast::{Pipeline, PipelineConfig};
use aqf_utils::clock::{Clock, SystemClock};
use log::{info, warn};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Where readings come from.
#[derive(Debug, Clone)]
pub enum Source {
    Sqlite(Database),
    Rest(RestStore),
}

/// Run `fut`, reporting [`ForecastError::Timeout`] if it takes longer than `seconds`.
pub async fn with_timeout<T>(
    stage: Stage,
    seconds: u64,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(Duration::from_secs(seconds), fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("[AQF] forecast: {} exceeded {}s", stage, seconds);
            Err(ForecastError::Timeout { stage, seconds })
        }
    }
}

async fn fetch_rows(source: &Source, policy: &FetchPolicy) -> Result<Vec<RawReading>> {
    let store_error = |e: anyhow::Error| ForecastError::Store(format!("{:#}", e));
    match source {
        Source::Sqlite(db) => {
            let db = db.clone();
            let policy = policy.clone();
            tokio::task::spawn_blocking(move || db.fetch_combined(&policy))
                .await
                .map_err(|e| ForecastError::Store(e.to_string()))?
                .map_err(store_error)
        }
        Source::Rest(store) => store.fetch_combined(policy).await.map_err(store_error),
    }
}

/// One forecast call against `source`, bounded by the configured timeouts.
pub async fn forecast_once(pipeline: &Arc<Pipeline>, source: &Source) -> Result<ForecastTable> {
    forecast_at(pipeline, source, &SystemClock).await
}

/// [`forecast_once`] with the staleness reference taken from `clock`.
pub async fn forecast_at(
    pipeline: &Arc<Pipeline>,
    source: &Source,
    clock: &impl Clock,
) -> Result<ForecastTable> {
    let now = clock.now();
    let config = pipeline.config();
    let rows = with_timeout(
        Stage::StoreQuery,
        config.store_timeout_secs,
        fetch_rows(source, &config.fetch),
    )
    .await?;
    info!("[AQF] forecast: fetched {} rows", rows.len());

    let pipeline = Arc::clone(pipeline);
    let seconds = pipeline.config().model_timeout_secs;
    with_timeout(Stage::Prediction, seconds, async move {
        tokio::task::spawn_blocking(move || pipeline.forecast(&rows, Some(now)))
            .await
            .map_err(|e| ForecastError::ModelUnavailable(e.to_string()))?
    })
    .await
}

/// Plain-text rendering of a forecast.
pub fn render_table(table: &ForecastTable) -> String {
    let mut out = format!(
        "Forecast anchored at {:.1} AQI (last grid point {}, offset {:+.2})\n",
        table.anchor_aqi, table.last_observed, table.bias_offset
    );
    if table.degraded_features {
        out.push_str("Note: short history, some lag features were backfilled\n");
    }
    out.push_str("STEP  TIME   AQI\n");
    for point in &table.points {
        out.push_str(&format!(
            "{:>4}  {}  {:>5.1}\n",
            point.step, point.time, point.forecast_aqi
        ));
    }
    out.push_str(&format!(
        "Display range: {:.1} .. {:.1}\n",
        table.y_range.0, table.y_range.1
    ));
    out
}

fn render_error(err: &ForecastError, json: bool) -> String {
    if json {
        serde_json::json!({
            "error": err.kind(),
            "message": err.user_message(),
            "detail": err.to_string(),
        })
        .to_string()
    } else {
        err.user_message()
    }
}

pub async fn run_forecast(
    source: Source,
    model: &Path,
    config: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let pipeline = Arc::new(Pipeline::with_artifact(config, model)?);

    match forecast_once(&pipeline, &source).await {
        Ok(table) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                print!("{}", render_table(&table));
            }
            Ok(())
        }
        Err(err) if err.is_fatal() => Err(err.into()),
        Err(err) => {
            warn!("[AQF] forecast: {} ({})", err, err.kind());
            println!("{}", render_error(&err, json));
            Ok(())
        }
    }
}
