use serde::Serialize;

/// Headroom added around the forecast when picking a display range.
pub const DISPLAY_PADDING: f64 = 5.0;

/// A single forecast step.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ForecastPoint {
    /// Horizon index, 1 = ten minutes ahead.
    pub step: u32,
    /// Wall-clock time of the predicted instant ("HH:MM").
    pub time: String,
    /// Bias-corrected AQI, never negative, rounded to one decimal.
    pub forecast_aqi: f64,
}

/// The ordered output of one forecast call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ForecastTable {
    pub points: Vec<ForecastPoint>,
    /// Last observed AQI the curve is anchored to.
    pub anchor_aqi: f64,
    /// Offset added to the step-1 model output.
    pub bias_offset: f64,
    /// Timestamp of the last grid point (RFC 3339, pipeline zone).
    pub last_observed: String,
    /// Suggested y-axis range for plotting: `[max(0, min - 5), max + 5]`.
    pub y_range: (f64, f64),
    /// True when some lag was backfilled during cold start.
    pub degraded_features: bool,
}

impl ForecastTable {
    pub fn new(
        points: Vec<ForecastPoint>,
        anchor_aqi: f64,
        bias_offset: f64,
        last_observed: String,
        degraded_features: bool,
    ) -> Self {
        let y_range = display_range(&points);
        Self {
            points,
            anchor_aqi,
            bias_offset,
            last_observed,
            y_range,
            degraded_features,
        }
    }
}

/// Cosmetic y-axis range for a forecast curve.
pub fn display_range(points: &[ForecastPoint]) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, DISPLAY_PADDING);
    }
    let min = points
        .iter()
        .map(|p| p.forecast_aqi)
        .fold(f64::INFINITY, f64::min);
    let max = points
        .iter()
        .map(|p| p.forecast_aqi)
        .fold(f64::NEG_INFINITY, f64::max);
    ((min - DISPLAY_PADDING).max(0.0), max + DISPLAY_PADDING)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(step: u32, aqi: f64) -> ForecastPoint {
        ForecastPoint {
            step,
            time: format!("10:{}0", step),
            forecast_aqi: aqi,
        }
    }

    #[test]
    fn display_range_pads_both_ends() {
        let points = vec![point(1, 55.0), point(2, 61.5), point(3, 58.0)];
        assert_eq!(display_range(&points), (50.0, 66.5));
    }

    #[test]
    fn display_range_floors_at_zero() {
        let points = vec![point(1, 2.0), point(2, 0.0)];
        assert_eq!(display_range(&points), (0.0, 7.0));
    }

    #[test]
    fn table_serializes_points_in_order() {
        let table = ForecastTable::new(
            vec![point(1, 55.0), point(2, 56.0)],
            55.0,
            -3.2,
            "2025-01-10T10:00:00+05:30".to_string(),
            false,
        );
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["points"][0]["step"], 1);
        assert_eq!(json["points"][1]["forecast_aqi"], 56.0);
        assert_eq!(json["y_range"][0], 50.0);
    }
}
