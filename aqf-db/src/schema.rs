//! SQL schema definitions for the reading store.
//!
//! Both tables share one layout: an autoincrement id giving insertion
//! order, the row timestamp as text, and the sensor channels. Values are
//! stored as handed in; typing them is the conditioner's job.

/// Returns the full SQL schema as a single batch string.
///
/// This creates the following tables:
///
/// - `realtime_data` - Every live sample pushed by the sensor
/// - `sensor_data` - One averaged row per hour
pub fn create_schema() -> &'static str {
    r#"
    CREATE TABLE IF NOT EXISTS realtime_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        mq135 INTEGER,
        temperature REAL,
        humidity REAL,
        aqi REAL
    );
    CREATE INDEX IF NOT EXISTS idx_realtime_created ON realtime_data(created_at);

    CREATE TABLE IF NOT EXISTS sensor_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        mq135 INTEGER,
        temperature REAL,
        humidity REAL,
        aqi REAL
    );
    CREATE INDEX IF NOT EXISTS idx_history_created ON sensor_data(created_at);
    "#
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn schema_is_valid_sql() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema())
            .expect("Schema SQL should be valid");
    }

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();

        for table in &["realtime_data", "sensor_data"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table '{}' should exist", table);
        }
    }

    #[test]
    fn created_at_defaults_to_now() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();
        conn.execute("INSERT INTO realtime_data (aqi) VALUES (42)", [])
            .unwrap();
        let created: String = conn
            .query_row("SELECT created_at FROM realtime_data", [], |row| row.get(0))
            .unwrap();
        assert!(created.ends_with('Z'), "default timestamp is UTC: {}", created);
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();
        // Applying schema a second time should not fail due to IF NOT EXISTS.
        conn.execute_batch(create_schema())
            .expect("Applying schema twice should succeed due to IF NOT EXISTS");
    }
}
