use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column names that may hold the row timestamp, in lookup order.
pub const TIMESTAMP_COLUMNS: [&str; 2] = ["created_at", "updated_at"];

/// One untyped row as it comes back from a reading store.
///
/// Every field is kept as text so that coercion (and the decision to drop a
/// row) happens in exactly one place: the series conditioner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    /// Store-assigned insertion id, when the store has one.
    pub id: Option<i64>,
    pub timestamp: Option<String>,
    pub aqi: Option<String>,
    pub temperature: Option<String>,
    pub humidity: Option<String>,
    /// Raw gas-sensor ADC value, carried through for hourly summaries.
    pub mq135: Option<String>,
    /// Row came from the hourly history table. Ids of history rows are not
    /// comparable with live ids.
    #[serde(skip)]
    pub history: bool,
}

impl RawReading {
    /// Build a raw row from a JSON object returned by a REST store.
    ///
    /// The timestamp is taken from `created_at`, falling back to
    /// `updated_at`. Numbers and strings are both accepted for every field.
    pub fn from_json(row: &Value) -> Self {
        let timestamp = TIMESTAMP_COLUMNS
            .iter()
            .find_map(|column| row.get(column).and_then(field_text));
        Self {
            id: row.get("id").and_then(Value::as_i64),
            timestamp,
            aqi: row.get("aqi").and_then(field_text),
            temperature: row.get("temperature").and_then(field_text),
            humidity: row.get("humidity").and_then(field_text),
            mq135: row.get("mq135").and_then(field_text),
            history: false,
        }
    }
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A coerced reading with its timestamp normalized to the pipeline zone.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub id: Option<i64>,
    pub timestamp: DateTime<Tz>,
    pub aqi: f64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub history: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_prefers_created_at() {
        let row = json!({
            "id": 17,
            "created_at": "2025-01-10T10:00:00+00:00",
            "updated_at": "2025-01-10T11:00:00+00:00",
            "aqi": 55,
            "temperature": 24.5,
            "humidity": "61.0",
            "mq135": 812
        });
        let raw = RawReading::from_json(&row);
        assert_eq!(raw.id, Some(17));
        assert_eq!(raw.timestamp.as_deref(), Some("2025-01-10T10:00:00+00:00"));
        assert_eq!(raw.aqi.as_deref(), Some("55"));
        assert_eq!(raw.temperature.as_deref(), Some("24.5"));
        assert_eq!(raw.humidity.as_deref(), Some("61.0"));
        assert_eq!(raw.mq135.as_deref(), Some("812"));
    }

    #[test]
    fn from_json_falls_back_to_updated_at() {
        let row = json!({ "updated_at": "2025-01-10 11:00:00", "aqi": null });
        let raw = RawReading::from_json(&row);
        assert_eq!(raw.id, None);
        assert_eq!(raw.timestamp.as_deref(), Some("2025-01-10 11:00:00"));
        assert_eq!(raw.aqi, None, "null AQI should stay missing");
    }
}
