//! Reading store backed by a PostgREST-style HTTP API.
//!
//! Tables are read with
//! `GET {base}/rest/v1/{table}?select=*&order=id.desc&limit={n}`, sending the
//! key as both `apikey` and bearer token. Requests are made once; the caller
//! bounds them with a timeout.

use anyhow::{bail, Context};
use aqf_core::reading::RawReading;
use aqf_core::store::{append_history, FetchPolicy, Table};
use log::{info, warn};
use reqwest::{Client, StatusCode};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    key: Option<String>,
}

impl RestStore {
    pub fn new(base_url: &str, key: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key,
        })
    }

    pub fn table_url(&self, table: Table, limit: usize) -> String {
        format!(
            "{}/rest/v1/{}?select=*&order=id.desc&limit={}",
            self.base_url,
            table.as_str(),
            limit
        )
    }

    /// Newest `limit` rows of `table`, newest id first.
    pub async fn fetch_recent(
        &self,
        table: Table,
        limit: usize,
    ) -> anyhow::Result<Vec<RawReading>> {
        let url = self.table_url(table, limit);
        let mut request = self.client.get(&url);
        if let Some(key) = &self.key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("request to {} failed", table.as_str()))?;
        if response.status() != StatusCode::OK {
            warn!(
                "[AQF] remote: bad response status for {}: {}",
                table.as_str(),
                response.status()
            );
            bail!("{} returned {}", table.as_str(), response.status());
        }
        let body: Value = response.json().await?;
        let rows = parse_rows(&body)?;
        info!("[AQF] remote: {} returned {} rows", table.as_str(), rows.len());
        Ok(rows)
    }

    /// Live rows topped up with history when the live table is thin.
    pub async fn fetch_combined(&self, policy: &FetchPolicy) -> anyhow::Result<Vec<RawReading>> {
        let mut rows = self.fetch_recent(Table::Realtime, policy.live_limit).await?;
        if policy.wants_history(rows.len()) {
            let history = self.fetch_recent(Table::History, policy.history_limit).await?;
            info!(
                "[AQF] remote: {} live rows below threshold {}, added {} history rows",
                rows.len(),
                policy.history_threshold,
                history.len()
            );
            append_history(&mut rows, history);
        }
        Ok(rows)
    }
}

/// Convert a JSON array of row objects into raw readings.
pub fn parse_rows(body: &Value) -> anyhow::Result<Vec<RawReading>> {
    let Some(items) = body.as_array() else {
        bail!("expected a JSON array of rows");
    };
    Ok(items.iter().map(RawReading::from_json).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_postgrest_query() {
        let store = RestStore::new("https://example.supabase.co/", None).unwrap();
        assert_eq!(
            store.table_url(Table::Realtime, 3000),
            "https://example.supabase.co/rest/v1/realtime_data?select=*&order=id.desc&limit=3000"
        );
        assert_eq!(
            store.table_url(Table::History, 2000),
            "https://example.supabase.co/rest/v1/sensor_data?select=*&order=id.desc&limit=2000"
        );
    }

    #[test]
    fn parses_row_array() {
        let body = json!([
            { "id": 12, "created_at": "2025-01-10T04:40:00+00:00", "aqi": 52, "temperature": 24.5 },
            { "id": 11, "updated_at": "2025-01-10T04:30:00+00:00", "aqi": "bad" }
        ]);
        let rows = parse_rows(&body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, Some(12));
        assert_eq!(rows[0].aqi.as_deref(), Some("52"));
        assert_eq!(rows[1].timestamp.as_deref(), Some("2025-01-10T04:30:00+00:00"));
        assert_eq!(rows[1].aqi.as_deref(), Some("bad"));
    }

    #[test]
    fn rejects_non_array_body() {
        let body = json!({ "message": "permission denied" });
        assert!(parse_rows(&body).is_err());
    }
}
