//! Read queries over the reading tables.
//!
//! Rows come back as [`RawReading`] with every value rendered as text,
//! whatever storage class SQLite gave it. Insertion order (the row id) is
//! the only ordering the store promises; timestamps may be out of order.

use crate::models::StoreStats;
use crate::Database;
use aqf_core::reading::RawReading;
use aqf_core::store::Table;
use rusqlite::types::ValueRef;
use rusqlite::{params, Row};

const COLUMNS: &str = "id, created_at, aqi, temperature, humidity, mq135";

fn text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}

fn raw_reading(row: &Row<'_>) -> rusqlite::Result<RawReading> {
    Ok(RawReading {
        id: row.get(0)?,
        timestamp: text(row.get_ref(1)?),
        aqi: text(row.get_ref(2)?),
        temperature: text(row.get_ref(3)?),
        humidity: text(row.get_ref(4)?),
        mq135: text(row.get_ref(5)?),
        history: false,
    })
}

impl Database {
    /// Newest `limit` rows of `table`, newest insertion first.
    pub fn query_recent(&self, table: Table, limit: usize) -> anyhow::Result<Vec<RawReading>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY id DESC LIMIT ?1",
            COLUMNS,
            table.as_str()
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit], raw_reading)?
            .collect::<Result<Vec<_>, _>>()?;
        log::info!(
            "[AQF] query: query_recent({}) returned {} records",
            table.as_str(),
            rows.len()
        );
        Ok(rows)
    }

    /// Every row of `table` in insertion order, for replaying a table.
    pub fn query_replay(&self, table: Table) -> anyhow::Result<Vec<RawReading>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY id ASC",
            COLUMNS,
            table.as_str()
        ))?;
        let rows = stmt
            .query_map([], raw_reading)?
            .collect::<Result<Vec<_>, _>>()?;
        log::info!(
            "[AQF] query: query_replay({}) returned {} records",
            table.as_str(),
            rows.len()
        );
        Ok(rows)
    }

    pub fn count_readings(&self, table: Table) -> anyhow::Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.as_str()),
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count)?)
    }

    /// Row count and timestamp span of one table.
    pub fn stats(&self, table: Table) -> anyhow::Result<StoreStats> {
        let conn = self.conn()?;
        let stats = conn.query_row(
            &format!(
                "SELECT COUNT(*), MIN(created_at), MAX(created_at) FROM {}",
                table.as_str()
            ),
            [],
            |row| {
                Ok(StoreStats {
                    table: table.as_str().to_string(),
                    rows: row.get::<_, i64>(0)?.max(0) as usize,
                    first_timestamp: row.get(1)?,
                    last_timestamp: row.get(2)?,
                })
            },
        )?;
        Ok(stats)
    }
}
