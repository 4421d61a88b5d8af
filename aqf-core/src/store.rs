//! The reading store interface the pipeline queries.

use crate::reading::RawReading;
use serde::Deserialize;

/// The two tables written by the sensor: live samples and hourly history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Realtime,
    History,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Realtime => "realtime_data",
            Table::History => "sensor_data",
        }
    }
}

impl std::str::FromStr for Table {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "realtime" | "realtime_data" => Ok(Table::Realtime),
            "history" | "sensor_data" => Ok(Table::History),
            other => anyhow::bail!("Unknown table '{}' (expected realtime or history)", other),
        }
    }
}

/// How many rows to pull for one forecast.
///
/// Live rows are read first; when fewer than `history_threshold` come back,
/// up to `history_limit` hourly history rows are appended.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchPolicy {
    pub live_limit: usize,
    pub history_threshold: usize,
    pub history_limit: usize,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            live_limit: 3000,
            history_threshold: 1000,
            history_limit: 2000,
        }
    }
}

impl FetchPolicy {
    pub fn wants_history(&self, live_rows: usize) -> bool {
        live_rows < self.history_threshold && self.history_limit > 0
    }
}

/// Append history rows after the live rows, marking them as history.
pub fn append_history(rows: &mut Vec<RawReading>, history: Vec<RawReading>) {
    rows.extend(history.into_iter().map(|row| RawReading {
        history: true,
        ..row
    }));
}

/// Read access to a table of timestamped readings.
pub trait ReadingStore {
    /// Newest rows first (by insertion), at most `limit` of them.
    fn fetch_recent(&self, table: Table, limit: usize) -> anyhow::Result<Vec<RawReading>>;

    /// Live rows topped up with history when the live table is thin.
    fn fetch_combined(&self, policy: &FetchPolicy) -> anyhow::Result<Vec<RawReading>> {
        let mut rows = self.fetch_recent(Table::Realtime, policy.live_limit)?;
        if policy.wants_history(rows.len()) {
            let history = self.fetch_recent(Table::History, policy.history_limit)?;
            log::info!(
                "[AQF] store: {} live rows below threshold {}, added {} history rows",
                rows.len(),
                policy.history_threshold,
                history.len()
            );
            append_history(&mut rows, history);
        }
        Ok(rows)
    }
}
