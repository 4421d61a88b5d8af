//! Command implementations for the AQF CLI.
//!
//! Provides subcommands for loading sensor readings into a SQLite store and
//! for forecasting from either that store or a remote REST store.

use anyhow::bail;
use aqf_core::store::Table;
use aqf_db::Database;
use clap::Subcommand;
use std::path::PathBuf;

pub mod forecast;
pub mod ingest;
pub mod remote;

use forecast::Source;
use remote::RestStore;

#[derive(Subcommand)]
pub enum Command {
    /// Forecast AQI for the next hour in 10-minute steps
    Forecast {
        /// SQLite database to read readings from
        #[arg(short, long)]
        db: Option<PathBuf>,

        /// Base URL of a PostgREST-style store (used when --db is absent)
        #[arg(long, env = "AQF_STORE_URL")]
        store_url: Option<String>,

        /// API key for the remote store
        #[arg(long, env = "AQF_STORE_KEY", hide_env_values = true)]
        store_key: Option<String>,

        /// Model ensemble artifact (JSON, optionally .gz)
        #[arg(short, long)]
        model: PathBuf,

        /// Pipeline config JSON; defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print JSON instead of a text table
        #[arg(long)]
        json: bool,
    },

    /// Load a CSV export of readings into a SQLite database
    Ingest {
        /// SQLite database to write (created if missing)
        #[arg(short, long)]
        db: PathBuf,

        /// CSV file with a header row (may be .gz)
        #[arg(long)]
        csv: PathBuf,

        /// Target table: realtime or history
        #[arg(short, long, default_value = "realtime")]
        table: Table,

        /// Also derive hourly averages into the history table
        #[arg(long)]
        hourly: bool,

        /// Zone used to read timestamps without an offset
        #[arg(long, default_value = "Asia/Kolkata")]
        time_zone: String,
    },
}

pub async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Forecast {
            db,
            store_url,
            store_key,
            model,
            config,
            json,
        } => {
            let source = match (db, store_url) {
                (Some(path), _) => Source::Sqlite(Database::open(path)?),
                (None, Some(url)) => Source::Rest(RestStore::new(&url, store_key)?),
                (None, None) => bail!("no reading store: pass --db or set AQF_STORE_URL"),
            };
            forecast::run_forecast(source, &model, config.as_deref(), json).await
        }
        Command::Ingest {
            db,
            csv,
            table,
            hourly,
            time_zone,
        } => ingest::run_ingest(&db, &csv, table, hourly, &time_zone),
    }
}
