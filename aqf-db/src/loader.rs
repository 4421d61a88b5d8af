//! CSV loading and single-row inserts for the reading tables.
//!
//! Exported readings arrive as CSV with a header row. Columns are matched by
//! name so exports with extra or reordered columns still load:
//!
//! - timestamp: `created_at`, `updated_at` or `timestamp`
//! - channels: `aqi`, `temperature`, `humidity`, `mq135`
//!
//! Values are stored as given. Empty cells become NULL.

use crate::Database;
use anyhow::bail;
use aqf_core::reading::RawReading;
use aqf_core::store::Table;
use rusqlite::params;

const TIMESTAMP_HEADERS: [&str; 3] = ["created_at", "updated_at", "timestamp"];

struct Columns {
    timestamp: Option<usize>,
    aqi: usize,
    temperature: Option<usize>,
    humidity: Option<usize>,
    mq135: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> anyhow::Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let Some(aqi) = find("aqi") else {
            bail!("CSV header has no 'aqi' column");
        };
        Ok(Self {
            timestamp: TIMESTAMP_HEADERS.iter().find_map(|h| find(h)),
            aqi,
            temperature: find("temperature"),
            humidity: find("humidity"),
            mq135: find("mq135"),
        })
    }
}

fn cell(record: &csv::StringRecord, index: Option<usize>) -> Option<&str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl Database {
    /// Load readings from a CSV string into `table`, in file order.
    ///
    /// Returns the number of rows inserted. Rows missing a timestamp get the
    /// table default (insertion time).
    ///
    /// # Example CSV
    /// ```text
    /// created_at,mq135,temperature,humidity,aqi
    /// 2025-01-10T04:30:00Z,812,24.5,61.0,55
    /// ```
    pub fn load_readings(&self, table: Table, csv_data: &str) -> anyhow::Result<usize> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(csv_data.as_bytes());
        let columns = Columns::from_headers(rdr.headers()?)?;

        let mut rows = Vec::new();
        for result in rdr.records() {
            let r = result?;
            rows.push(RawReading {
                id: None,
                timestamp: cell(&r, columns.timestamp).map(String::from),
                aqi: cell(&r, Some(columns.aqi)).map(String::from),
                temperature: cell(&r, columns.temperature).map(String::from),
                humidity: cell(&r, columns.humidity).map(String::from),
                mq135: cell(&r, columns.mq135).map(String::from),
                history: false,
            });
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for row in &rows {
            insert(&tx, table, row)?;
        }
        tx.commit()?;

        log::info!(
            "[AQF] loader: Loaded {} rows into {}",
            rows.len(),
            table.as_str()
        );
        Ok(rows.len())
    }

    /// Insert one reading and return its new row id.
    ///
    /// Any `id` on the reading is ignored; the table assigns one.
    pub fn insert_reading(&self, table: Table, reading: &RawReading) -> anyhow::Result<i64> {
        let conn = self.conn()?;
        insert(&conn, table, reading)?;
        Ok(conn.last_insert_rowid())
    }
}

fn insert(conn: &rusqlite::Connection, table: Table, row: &RawReading) -> anyhow::Result<()> {
    let sql = format!(
        "INSERT INTO {} (created_at, mq135, temperature, humidity, aqi)
         VALUES (COALESCE(?1, strftime('%Y-%m-%dT%H:%M:%fZ', 'now')), ?2, ?3, ?4, ?5)",
        table.as_str()
    );
    conn.execute(
        &sql,
        params![
            row.timestamp,
            row.mq135,
            row.temperature,
            row.humidity,
            row.aqi
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use aqf_core::reading::RawReading;
    use aqf_core::store::{ReadingStore, Table};

    #[test]
    fn load_readings_from_csv() {
        let db = Database::new().unwrap();
        let csv = "\
created_at,mq135,temperature,humidity,aqi
2025-01-10T04:30:00Z,812,24.5,61.0,55
2025-01-10T04:31:00Z,815,24.6,60.5,57
";
        let loaded = db.load_readings(Table::Realtime, csv).unwrap();
        assert_eq!(loaded, 2);

        let conn = db.conn().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM realtime_data", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);

        let temperature: f64 = conn
            .query_row(
                "SELECT temperature FROM realtime_data WHERE created_at = '2025-01-10T04:31:00Z'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(temperature, 24.6);
    }

    #[test]
    fn load_readings_matches_columns_by_name() {
        let db = Database::new().unwrap();
        let csv = "\
aqi,note,updated_at
61,calibrating,2025-01-10T05:00:00Z
";
        db.load_readings(Table::History, csv).unwrap();
        let rows = db.fetch_recent(Table::History, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].aqi.as_deref(), Some("61"));
        assert_eq!(rows[0].timestamp.as_deref(), Some("2025-01-10T05:00:00Z"));
        assert_eq!(rows[0].temperature, None);
    }

    #[test]
    fn load_readings_keeps_bad_values_for_the_conditioner() {
        let db = Database::new().unwrap();
        let csv = "\
created_at,aqi
not-a-time,abc
2025-01-10T05:00:00Z,
";
        db.load_readings(Table::Realtime, csv).unwrap();
        let rows = db.fetch_recent(Table::Realtime, 10).unwrap();
        assert_eq!(rows.len(), 2);
        // Newest first
        assert_eq!(rows[0].aqi, None, "Empty cell should be NULL");
        assert_eq!(rows[1].aqi.as_deref(), Some("abc"));
        assert_eq!(rows[1].timestamp.as_deref(), Some("not-a-time"));
    }

    #[test]
    fn load_readings_requires_aqi_column() {
        let db = Database::new().unwrap();
        let err = db
            .load_readings(Table::Realtime, "created_at,temperature\n2025-01-10T05:00:00Z,20\n")
            .unwrap_err();
        assert!(err.to_string().contains("aqi"));
    }

    #[test]
    fn insert_reading_assigns_increasing_ids() {
        let db = Database::new().unwrap();
        let reading = RawReading {
            timestamp: Some("2025-01-10T05:00:00Z".into()),
            aqi: Some("40".into()),
            ..Default::default()
        };
        let first = db.insert_reading(Table::Realtime, &reading).unwrap();
        let second = db.insert_reading(Table::Realtime, &reading).unwrap();
        assert!(second > first);
    }

    #[test]
    fn insert_reading_without_timestamp_uses_now() {
        let db = Database::new().unwrap();
        let reading = RawReading {
            aqi: Some("40".into()),
            ..Default::default()
        };
        db.insert_reading(Table::History, &reading).unwrap();
        let rows = db.fetch_recent(Table::History, 1).unwrap();
        let ts = rows[0].timestamp.as_deref().unwrap();
        assert!(ts.ends_with('Z'), "default timestamp should be UTC: {}", ts);
    }
}
