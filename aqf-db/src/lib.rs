//! SQLite reading store for air-quality sensor data.
//!
//! This crate holds the two tables the sensor writes to and exposes the
//! [`ReadingStore`] query the forecasting pipeline consumes.
//!
//! # Architecture
//!
//! - `Arc<Mutex<Connection>>` so one handle can be shared by concurrent
//!   forecast calls on different threads
//! - File-backed or in-memory SQLite via `rusqlite`
//! - CSV loading for bulk import of exported readings
//! - Query methods returning untyped [`RawReading`] rows; coercion happens
//!   in the conditioner
//!
//! # Usage
//!
//! ```rust
//! use aqf_core::store::{ReadingStore, Table};
//! use aqf_db::Database;
//!
//! let db = Database::new().unwrap();
//! db.load_readings(Table::Realtime, "created_at,aqi\n2025-01-10T04:30:00Z,55\n").unwrap();
//! let rows = db.fetch_recent(Table::Realtime, 10).unwrap();
//! assert_eq!(rows[0].aqi.as_deref(), Some("55"));
//! ```
//!
//! # Tables
//!
//! See [`schema::create_schema`] for the full SQL schema.
//! - `realtime_data` - Live samples
//! - `sensor_data` - Hourly averages

pub mod schema;
mod loader;
mod queries;
pub mod models;

use anyhow::anyhow;
use aqf_core::reading::RawReading;
use aqf_core::store::{ReadingStore, Table};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// SQLite database holding live and hourly readings.
///
/// This struct is cheaply cloneable (via `Arc`) and can be shared across
/// threads; statements are serialized on the inner mutex.
///
/// # Example
///
/// ```rust
/// use aqf_core::store::Table;
/// use aqf_db::Database;
///
/// let db = Database::new().unwrap();
/// db.load_readings(Table::History, "created_at,aqi\n2025-01-10T04:00:00Z,61\n").unwrap();
/// assert_eq!(db.count_readings(Table::History).unwrap(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Create a new in-memory database with the full schema applied.
    pub fn new() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Open (or create) a database file and apply the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        log::info!("[AQF] db: opened {}", path.display());
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(schema::create_schema())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }
}

impl ReadingStore for Database {
    fn fetch_recent(&self, table: Table, limit: usize) -> anyhow::Result<Vec<RawReading>> {
        self.query_recent(table, limit)
    }
}
