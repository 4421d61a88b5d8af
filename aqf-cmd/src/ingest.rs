//! Load exported readings into a SQLite store and derive hourly history.

use anyhow::{bail, Context};
use aqf_core::reading::RawReading;
use aqf_core::store::Table;
use aqf_data::accumulator::{HourlyAccumulator, HourlySample, HourlySummary};
use aqf_data::conditioner::coerce;
use aqf_db::Database;
use aqf_utils::clock::ManualClock;
use aqf_utils::timestamps::{floor_to_step, parse_time_zone, parse_timestamp};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use chrono_tz::Tz;
use flate2::read::GzDecoder;
use log::info;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read a CSV export, gunzipping paths that end in `.gz`.
pub fn read_csv(path: &Path) -> anyhow::Result<String> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut text = String::new();
    if path.extension().is_some_and(|ext| ext == "gz") {
        GzDecoder::new(file).read_to_string(&mut text)?;
    } else {
        let mut file = file;
        file.read_to_string(&mut text)?;
    }
    Ok(text)
}

/// Replay live rows in insertion order through an hourly accumulator.
///
/// Windows are aligned to `interval` boundaries in `time_zone`, so every
/// summary ends exactly on a boundary. Rows that fail coercion are skipped;
/// the trailing partial window is not summarized.
pub fn summarize_hourly(
    rows: &[RawReading],
    time_zone: Tz,
    interval: Duration,
) -> Vec<HourlySummary> {
    let step_minutes = interval.num_minutes();
    let readings: Vec<_> = rows
        .iter()
        .filter_map(|raw| {
            let (reading, _) = coerce(raw, time_zone).ok()?;
            let mq135 = raw.mq135.as_deref().and_then(|s| s.trim().parse::<f64>().ok());
            Some((reading, mq135))
        })
        .collect();
    let Some((first, _)) = readings.first() else {
        return Vec::new();
    };

    let window_start = floor_to_step(&first.timestamp, step_minutes);
    let clock = ManualClock::new(window_start.with_timezone(&Utc));
    let mut accumulator = HourlyAccumulator::new(&clock, interval);
    let mut summaries = Vec::new();
    for (reading, mq135) in &readings {
        let at = reading.timestamp.with_timezone(&Utc);
        let boundary = accumulator.window_start() + interval;
        if at >= boundary {
            clock.set(boundary);
            summaries.extend(accumulator.flush_if_due());
            // Hours without readings produce no summary
            let current = floor_to_step(&reading.timestamp, step_minutes).with_timezone(&Utc);
            if current > boundary {
                clock.set(current);
                accumulator.flush();
            }
        }
        clock.set(at);
        accumulator.record(HourlySample {
            aqi: reading.aqi,
            temperature: reading.temperature,
            humidity: reading.humidity,
            mq135: *mq135,
        });
    }
    if accumulator.pending() > 0 {
        info!(
            "[AQF] ingest: {} samples left in the open window",
            accumulator.pending()
        );
    }
    summaries
}

/// End of the newest window already written to the history table.
fn last_history_window(db: &Database, time_zone: Tz) -> anyhow::Result<Option<DateTime<Utc>>> {
    let rows = db.query_replay(Table::History)?;
    Ok(rows
        .iter()
        .filter_map(|raw| parse_timestamp(raw.timestamp.as_deref()?, time_zone).ok())
        .map(|(timestamp, _)| timestamp.with_timezone(&Utc))
        .max())
}

/// A history row stamped with the end of its window.
pub fn summary_row(summary: &HourlySummary) -> RawReading {
    RawReading {
        id: None,
        timestamp: Some(summary.window_end.to_rfc3339_opts(SecondsFormat::Secs, true)),
        aqi: Some(summary.aqi.to_string()),
        temperature: summary.temperature.map(|t| t.to_string()),
        humidity: summary.humidity.map(|h| h.to_string()),
        mq135: summary.mq135.map(|m| m.to_string()),
        history: true,
    }
}

pub fn run_ingest(
    db_path: &Path,
    csv_path: &Path,
    table: Table,
    hourly: bool,
    time_zone: &str,
) -> anyhow::Result<()> {
    if hourly && table != Table::Realtime {
        bail!("--hourly derives history from live rows; use --table realtime");
    }
    let time_zone = parse_time_zone(time_zone)?;
    let db = Database::open(db_path)?;
    let csv = read_csv(csv_path)?;
    let loaded = db.load_readings(table, &csv)?;
    info!("[AQF] ingest: {} rows from {}", loaded, csv_path.display());

    if hourly {
        let written = last_history_window(&db, time_zone)?;
        let rows = db.query_replay(Table::Realtime)?;
        let summaries: Vec<_> = summarize_hourly(&rows, time_zone, Duration::hours(1))
            .into_iter()
            .filter(|summary| written.map_or(true, |last| summary.window_end > last))
            .collect();
        for summary in &summaries {
            db.insert_reading(Table::History, &summary_row(summary))?;
        }
        info!("[AQF] ingest: wrote {} hourly summaries", summaries.len());
    }

    for table in [Table::Realtime, Table::History] {
        let stats = db.stats(table)?;
        println!(
            "{}: {} rows ({} .. {})",
            stats.table,
            stats.rows,
            stats.first_timestamp.as_deref().unwrap_or("-"),
            stats.last_timestamp.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
