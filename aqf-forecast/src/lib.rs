//! Short-horizon AQI forecasting.
//!
//! ```text
//! ReadingStore -> SeriesConditioner -> build_features -> AnchoredForecaster -> ForecastTable
//! ```
//!
//! [`Pipeline`] wires the stages together from a [`PipelineConfig`] and a
//! model artifact. Every failure comes back as an
//! [`aqf_core::ForecastError`]; nothing here panics on bad data.

pub mod anchor;
pub mod config;
pub mod ensemble;
pub mod pipeline;

pub use anchor::{AnchoredForecaster, BiasPolicy};
pub use config::PipelineConfig;
pub use ensemble::{
    load_ensemble, parse_ensemble, HorizonModel, LinearModel, ModelEnsemble, TreeEnsemble,
    TreeNode,
};
pub use pipeline::Pipeline;
