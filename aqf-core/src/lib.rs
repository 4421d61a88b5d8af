//! Core types shared across the air-quality forecasting workspace.
//!
//! Nothing in here performs I/O; the store crates and the forecasting
//! pipeline exchange data through these types.

pub mod error;
pub mod features;
pub mod forecast;
pub mod reading;
pub mod store;

pub use error::{ForecastError, Stage, Unavailable};
pub use features::{Confidence, Feature, FeatureColumn, FeatureRow, FeatureVector, Lag};
pub use forecast::{ForecastPoint, ForecastTable};
pub use reading::{RawReading, Reading};
pub use store::{FetchPolicy, ReadingStore, Table};
