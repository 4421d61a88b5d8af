//! Cleans raw store rows and resamples them onto a fixed-cadence grid.
//!
//! The conditioner is the only place where raw rows are coerced into typed
//! readings. Its output is either a [`ConditionedSeries`] whose timestamps
//! are strictly increasing and exactly one step apart, or a
//! [`ForecastError`] describing why no series could be produced.
//!
//! # Pipeline
//!
//! 1. Coerce timestamp and AQI; drop rows that fail.
//! 2. Normalize timestamps to the configured zone (naive text is UTC).
//! 3. Sort and remove exact-timestamp duplicates per [`DuplicatePolicy`].
//! 4. Refuse stale data and drop everything at or before `newest - window`.
//! 5. Average into step buckets, interpolate empty buckets.
//! 6. Report a cold start when the grid is shorter than `min_points`.

use crate::interpolation::fill_gaps;
use aqf_core::error::{ForecastError, Result, Unavailable};
use aqf_core::reading::{RawReading, Reading};
use aqf_utils::timestamps::{floor_to_step, parse_timestamp, TimestampInterpretation};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Which row survives when several share a timestamp.
///
/// Insertion order is the store id; rows without an id rank after those
/// with one, in the order they were received. The policy only decides
/// between rows of the same table: a live row always beats a history row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    #[default]
    KeepEarliestInsert,
    KeepLatestInsert,
}

/// Tunables for [`SeriesConditioner`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionerConfig {
    pub time_zone: Tz,
    pub step_minutes: i64,
    /// Only data newer than `newest - window_minutes` is used.
    pub window_minutes: i64,
    /// When set, data whose newest reading is older than this relative to
    /// "now" is refused outright.
    pub max_staleness_minutes: Option<i64>,
    pub min_points: usize,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for ConditionerConfig {
    fn default() -> Self {
        Self {
            time_zone: chrono_tz::Asia::Kolkata,
            step_minutes: 10,
            window_minutes: 120,
            max_staleness_minutes: Some(120),
            min_points: 4,
            duplicate_policy: DuplicatePolicy::KeepEarliestInsert,
        }
    }
}

/// One grid bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPoint {
    /// Left edge of the bucket.
    pub time: DateTime<Tz>,
    pub aqi: f64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    /// Readings averaged into this bucket; zero means interpolated.
    pub samples: usize,
}

impl GridPoint {
    pub fn is_interpolated(&self) -> bool {
        self.samples == 0
    }
}

/// What happened to the input rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionReport {
    pub rows_in: usize,
    pub dropped_timestamp: usize,
    pub dropped_aqi: usize,
    /// Timestamps without an offset that were taken as UTC.
    pub assumed_utc: usize,
    pub duplicates: usize,
    pub outside_window: usize,
    pub interpolated_points: usize,
}

/// Readings on an exact fixed-step grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionedSeries {
    points: Vec<GridPoint>,
    step_minutes: i64,
    report: ConditionReport,
}

impl ConditionedSeries {
    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&GridPoint> {
        self.points.last()
    }

    pub fn step_minutes(&self) -> i64 {
        self.step_minutes
    }

    pub fn report(&self) -> &ConditionReport {
        &self.report
    }

    pub fn aqi_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.aqi).collect()
    }

    /// Build a series from already-gridded points.
    ///
    /// Returns `None` unless the points are exactly `step_minutes` apart.
    pub fn from_points(points: Vec<GridPoint>, step_minutes: i64) -> Option<Self> {
        let step = Duration::minutes(step_minutes);
        let uniform = points.windows(2).all(|w| w[1].time - w[0].time == step);
        if !uniform || step_minutes <= 0 {
            return None;
        }
        Some(Self {
            points,
            step_minutes,
            report: ConditionReport::default(),
        })
    }
}

/// Why a single raw row was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Timestamp(ForecastError),
    Aqi,
}

/// Coerce one raw row into a typed reading in `tz`.
pub fn coerce(
    raw: &RawReading,
    tz: Tz,
) -> std::result::Result<(Reading, TimestampInterpretation), Rejection> {
    let text = raw.timestamp.as_deref().unwrap_or("");
    let (timestamp, how) = parse_timestamp(text, tz)
        .map_err(|e| Rejection::Timestamp(ForecastError::TimestampAmbiguity(e.0)))?;
    let aqi = parse_number(raw.aqi.as_deref())
        .filter(|v| *v >= 0.0)
        .ok_or(Rejection::Aqi)?;
    Ok((
        Reading {
            id: raw.id,
            timestamp,
            aqi,
            temperature: parse_number(raw.temperature.as_deref()),
            humidity: parse_number(raw.humidity.as_deref()),
            history: raw.history,
        },
        how,
    ))
}

fn parse_number(text: Option<&str>) -> Option<f64> {
    text.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Running mean of one channel inside a bucket.
#[derive(Debug, Clone, Copy, Default)]
struct Channel {
    sum: f64,
    count: usize,
}

impl Channel {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    aqi: Channel,
    temperature: Channel,
    humidity: Channel,
}

/// Turns raw store rows into a [`ConditionedSeries`].
#[derive(Debug, Clone, Default)]
pub struct SeriesConditioner {
    config: ConditionerConfig,
}

impl SeriesConditioner {
    pub fn new(config: ConditionerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConditionerConfig {
        &self.config
    }

    /// Condition `rows` as seen at `now`.
    ///
    /// `now` only feeds the staleness check; pass `None` to skip it.
    pub fn condition(
        &self,
        rows: &[RawReading],
        now: Option<DateTime<Utc>>,
    ) -> Result<ConditionedSeries> {
        if rows.is_empty() {
            return Err(ForecastError::DataUnavailable {
                reason: Unavailable::EmptyStore,
            });
        }

        let mut report = ConditionReport {
            rows_in: rows.len(),
            ..Default::default()
        };
        let readings = self.coerce_all(rows, &mut report);
        if readings.is_empty() {
            log::warn!(
                "[AQF] conditioner: all {} rows failed coercion",
                report.rows_in
            );
            return Err(ForecastError::DataUnavailable {
                reason: Unavailable::NoValidRows {
                    dropped: report.rows_in,
                },
            });
        }

        let readings = self.dedup(readings, &mut report);
        // Non-empty: coerce_all returned at least one reading.
        let newest = match readings.last() {
            Some(r) => r.timestamp,
            None => {
                return Err(ForecastError::DataUnavailable {
                    reason: Unavailable::EmptyStore,
                })
            }
        };

        if let (Some(now), Some(limit)) = (now, self.config.max_staleness_minutes) {
            let age_minutes = (now - newest.with_timezone(&Utc)).num_minutes();
            if age_minutes > limit {
                log::warn!(
                    "[AQF] conditioner: newest reading {} is {} minutes old (limit {})",
                    newest,
                    age_minutes,
                    limit
                );
                return Err(ForecastError::DataUnavailable {
                    reason: Unavailable::Stale { age_minutes },
                });
            }
        }

        let cutoff = newest - Duration::minutes(self.config.window_minutes);
        let before = readings.len();
        let recent: Vec<Reading> = readings
            .into_iter()
            .filter(|r| r.timestamp > cutoff)
            .collect();
        report.outside_window = before - recent.len();

        let points = self.resample(&recent, cutoff);
        report.interpolated_points = points.iter().filter(|p| p.is_interpolated()).count();

        log::info!(
            "[AQF] conditioner: {} rows -> {} grid points ({} interpolated, {} dropped, {} duplicates, {} outside window)",
            report.rows_in,
            points.len(),
            report.interpolated_points,
            report.dropped_timestamp + report.dropped_aqi,
            report.duplicates,
            report.outside_window
        );

        if points.len() < self.config.min_points {
            let missing = (self.config.min_points - points.len()) as i64;
            return Err(ForecastError::ColdStart {
                points: points.len(),
                required: self.config.min_points,
                wait_minutes: missing * self.config.step_minutes,
            });
        }

        Ok(ConditionedSeries {
            points,
            step_minutes: self.config.step_minutes,
            report,
        })
    }

    fn coerce_all(&self, rows: &[RawReading], report: &mut ConditionReport) -> Vec<Reading> {
        let mut readings = Vec::with_capacity(rows.len());
        for raw in rows {
            match coerce(raw, self.config.time_zone) {
                Ok((reading, how)) => {
                    if how == TimestampInterpretation::AssumedUtc {
                        report.assumed_utc += 1;
                    }
                    readings.push(reading);
                }
                Err(Rejection::Timestamp(err)) => {
                    log::debug!("[AQF] conditioner: dropping row {:?}: {}", raw.id, err);
                    report.dropped_timestamp += 1;
                }
                Err(Rejection::Aqi) => {
                    report.dropped_aqi += 1;
                }
            }
        }
        if report.dropped_timestamp > 0 {
            log::warn!(
                "[AQF] conditioner: {} rows had unreadable timestamps",
                report.dropped_timestamp
            );
        }
        readings
    }

    /// Sort ascending and collapse exact-timestamp duplicates.
    fn dedup(&self, readings: Vec<Reading>, report: &mut ConditionReport) -> Vec<Reading> {
        let mut keyed: Vec<(usize, Reading)> = readings.into_iter().enumerate().collect();
        keyed.sort_by(|(ia, a), (ib, b)| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.history.cmp(&b.history))
                .then(a.id.unwrap_or(i64::MAX).cmp(&b.id.unwrap_or(i64::MAX)))
                .then(ia.cmp(ib))
        });

        let mut result: Vec<Reading> = Vec::with_capacity(keyed.len());
        for (_, reading) in keyed {
            match result.last_mut() {
                Some(kept) if kept.timestamp == reading.timestamp => {
                    report.duplicates += 1;
                    if self.config.duplicate_policy == DuplicatePolicy::KeepLatestInsert
                        && kept.history == reading.history
                    {
                        *kept = reading;
                    }
                }
                _ => result.push(reading),
            }
        }
        result
    }

    /// Average readings into step buckets and interpolate the empty ones.
    ///
    /// `readings` must be sorted and non-empty for a non-empty result.
    /// Buckets labelled at or before `cutoff` are left out.
    fn resample(&self, readings: &[Reading], cutoff: DateTime<Tz>) -> Vec<GridPoint> {
        let (Some(first), Some(last)) = (readings.first(), readings.last()) else {
            return Vec::new();
        };
        let step = Duration::minutes(self.config.step_minutes);
        let step_secs = step.num_seconds();
        let origin = floor_to_step(&first.timestamp, self.config.step_minutes);
        let span = (last.timestamp - origin).num_seconds() / step_secs;
        let mut buckets = vec![Bucket::default(); span as usize + 1];

        for reading in readings {
            let idx = ((reading.timestamp - origin).num_seconds() / step_secs) as usize;
            let bucket = &mut buckets[idx];
            bucket.aqi.add(Some(reading.aqi));
            bucket.temperature.add(reading.temperature);
            bucket.humidity.add(reading.humidity);
        }

        let aqi = fill_gaps(&buckets.iter().map(|b| b.aqi.mean()).collect::<Vec<_>>());
        let temperature = fill_gaps(
            &buckets
                .iter()
                .map(|b| b.temperature.mean())
                .collect::<Vec<_>>(),
        );
        let humidity = fill_gaps(&buckets.iter().map(|b| b.humidity.mean()).collect::<Vec<_>>());

        let mut points = Vec::with_capacity(buckets.len());
        for (i, bucket) in buckets.iter().enumerate() {
            let time = origin + step * i as i32;
            if time <= cutoff {
                continue;
            }
            // First and last buckets always hold a reading, so every AQI gap
            // in between has been filled.
            let Some(value) = aqi[i] else { continue };
            points.push(GridPoint {
                time,
                aqi: value,
                temperature: temperature[i],
                humidity: humidity[i],
                samples: bucket.aqi.count,
            });
        }
        points
    }
}
