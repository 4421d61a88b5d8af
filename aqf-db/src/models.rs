//! Summary structs returned by store queries.

use serde::Serialize;

/// Row count and timestamp span of one reading table.
///
/// Timestamps are the stored text, compared lexically; `None` when the
/// table is empty.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreStats {
    pub table: String,
    pub rows: usize,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_stats_serializes() {
        let stats = StoreStats {
            table: "realtime_data".into(),
            rows: 2,
            first_timestamp: Some("2025-01-10T04:30:00Z".into()),
            last_timestamp: None,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"rows\":2"));
        assert!(json.contains("\"last_timestamp\":null"));
    }
}
