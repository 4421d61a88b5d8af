//! Pipeline configuration, read from an optional JSON file.
//!
//! Every field has a default, so an empty object (or no file at all) gives
//! the deployed behavior: Asia/Kolkata, 10-minute grid, 2-hour window,
//! six horizons, static bias offset.

use crate::anchor::{AnchoredForecaster, BiasPolicy};
use anyhow::Context;
use aqf_core::error::ForecastError;
use aqf_core::store::FetchPolicy;
use aqf_data::conditioner::{ConditionerConfig, DuplicatePolicy};
use aqf_utils::timestamps::parse_time_zone;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// IANA zone every timestamp is normalized to.
    pub time_zone: String,
    pub step_minutes: i64,
    pub window_minutes: i64,
    /// `null` disables the staleness check.
    pub max_staleness_minutes: Option<i64>,
    pub min_points: usize,
    pub horizons: u32,
    pub duplicate_policy: DuplicatePolicy,
    pub bias: BiasPolicy,
    pub fetch: FetchPolicy,
    pub store_timeout_secs: u64,
    pub model_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            time_zone: "Asia/Kolkata".to_string(),
            step_minutes: 10,
            window_minutes: 120,
            max_staleness_minutes: Some(120),
            min_points: 4,
            horizons: 6,
            duplicate_policy: DuplicatePolicy::KeepEarliestInsert,
            bias: BiasPolicy::Static,
            fetch: FetchPolicy::default(),
            store_timeout_secs: 10,
            model_timeout_secs: 5,
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("malformed pipeline config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let config = Self::from_json(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        log::info!("[AQF] config: loaded {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        let invalid = |msg: String| Err(ForecastError::Config(msg));
        if self.step_minutes <= 0 {
            return invalid(format!("step_minutes must be positive, got {}", self.step_minutes));
        }
        if self.horizons == 0 {
            return invalid("horizons must be at least 1".to_string());
        }
        if self.window_minutes < self.step_minutes {
            return invalid(format!(
                "window_minutes ({}) must be at least step_minutes ({})",
                self.window_minutes, self.step_minutes
            ));
        }
        if self.min_points == 0 {
            return invalid("min_points must be at least 1".to_string());
        }
        if let Some(limit) = self.max_staleness_minutes {
            if limit < 0 {
                return invalid(format!(
                    "max_staleness_minutes must not be negative, got {}",
                    limit
                ));
            }
        }
        if let BiasPolicy::LinearDecay { final_weight } = self.bias {
            if !final_weight.is_finite() {
                return invalid("bias final_weight must be finite".to_string());
            }
        }
        parse_time_zone(&self.time_zone).map_err(|e| ForecastError::Config(e.to_string()))?;
        Ok(())
    }

    pub fn conditioner(&self) -> Result<ConditionerConfig, ForecastError> {
        let time_zone =
            parse_time_zone(&self.time_zone).map_err(|e| ForecastError::Config(e.to_string()))?;
        Ok(ConditionerConfig {
            time_zone,
            step_minutes: self.step_minutes,
            window_minutes: self.window_minutes,
            max_staleness_minutes: self.max_staleness_minutes,
            min_points: self.min_points,
            duplicate_policy: self.duplicate_policy,
        })
    }

    pub fn forecaster(&self) -> AnchoredForecaster {
        AnchoredForecaster {
            horizons: self.horizons,
            step_minutes: self.step_minutes,
            bias: self.bias,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = PipelineConfig::from_json("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.conditioner().unwrap(), ConditionerConfig::default());
        assert_eq!(config.forecaster(), AnchoredForecaster::default());
    }

    #[test]
    fn partial_override() {
        let config = PipelineConfig::from_json(
            r#"{
                "time_zone": "Europe/Berlin",
                "window_minutes": 180,
                "max_staleness_minutes": null,
                "duplicate_policy": "keep_latest_insert",
                "bias": { "kind": "linear_decay", "final_weight": 0.25 },
                "fetch": { "live_limit": 500 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.window_minutes, 180);
        assert_eq!(config.max_staleness_minutes, None);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::KeepLatestInsert);
        assert_eq!(config.fetch.live_limit, 500);
        assert_eq!(config.fetch.history_threshold, 1000);
        assert_eq!(config.step_minutes, 10);
        assert_eq!(config.conditioner().unwrap().time_zone, chrono_tz::Europe::Berlin);
    }

    #[test]
    fn rejects_bad_values() {
        for json in [
            r#"{ "step_minutes": 0 }"#,
            r#"{ "horizons": 0 }"#,
            r#"{ "window_minutes": 5 }"#,
            r#"{ "min_points": 0 }"#,
            r#"{ "max_staleness_minutes": -1 }"#,
            r#"{ "time_zone": "Mars/Olympus" }"#,
        ] {
            assert!(PipelineConfig::from_json(json).is_err(), "should reject {}", json);
        }
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(PipelineConfig::from_json(r#"{ "windw_minutes": 60 }"#).is_err());
    }

    #[test]
    fn validation_errors_are_config_errors() {
        let config = PipelineConfig {
            step_minutes: -10,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ForecastError::Config(_))));
    }
}
