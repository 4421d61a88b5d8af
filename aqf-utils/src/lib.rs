//! Shared utility functions for AQF crates.

/// Timestamp parsing and grid alignment
pub mod timestamps {
    use crate::error::TimestampError;
    use chrono::{DateTime, Duration, NaiveDateTime, Offset, TimeZone, Utc};
    use chrono_tz::Tz;

    /// Offset-bearing layouts tried after RFC 3339.
    const ZONED_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

    /// Naive layouts, interpreted as UTC.
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    /// How a timestamp string was understood.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum TimestampInterpretation {
        /// The text carried its own offset.
        ZoneAware,
        /// No offset present; the value was taken as UTC.
        AssumedUtc,
    }

    /// Parse the name of an IANA time zone, e.g. "Asia/Kolkata".
    pub fn parse_time_zone(name: &str) -> anyhow::Result<Tz> {
        name.trim()
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Unknown time zone '{}': {}", name, e))
    }

    /// Parse a store timestamp and convert it to `tz`.
    ///
    /// Zone-aware text is converted directly. Anything else is retried as a
    /// naive UTC timestamp; only when both readings fail is an error returned.
    pub fn parse_timestamp(
        text: &str,
        tz: Tz,
    ) -> Result<(DateTime<Tz>, TimestampInterpretation), TimestampError> {
        let text = text.trim();
        if let Some(zoned) = parse_zoned(text) {
            return Ok((zoned.with_timezone(&tz), TimestampInterpretation::ZoneAware));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .map(|naive| {
                (
                    Utc.from_utc_datetime(&naive).with_timezone(&tz),
                    TimestampInterpretation::AssumedUtc,
                )
            })
            .ok_or_else(|| TimestampError(text.to_string()))
    }

    fn parse_zoned(text: &str) -> Option<DateTime<chrono::FixedOffset>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt);
        }
        // "2025-01-10 10:00:00Z" is common but not RFC 3339 with a space.
        let normalized = match text.strip_suffix('Z').or_else(|| text.strip_suffix('z')) {
            Some(stripped) => format!("{}+00:00", stripped),
            None => text.to_string(),
        };
        ZONED_FORMATS
            .iter()
            .find_map(|fmt| DateTime::parse_from_str(&normalized, fmt).ok())
    }

    /// Floor `dt` to the start of its `step_minutes` bucket, aligned to local midnight.
    pub fn floor_to_step(dt: &DateTime<Tz>, step_minutes: i64) -> DateTime<Tz> {
        let step_secs = step_minutes * 60;
        let local_secs = dt.timestamp() + i64::from(dt.offset().fix().local_minus_utc());
        let over = local_secs.rem_euclid(step_secs);
        let nanos = i64::from(dt.timestamp_subsec_nanos());
        *dt - Duration::seconds(over) - Duration::nanoseconds(nanos)
    }

    /// "HH:MM" wall-clock label.
    pub fn wall_clock(dt: &DateTime<Tz>) -> String {
        dt.format("%H:%M").to_string()
    }

}

/// Injectable time source
pub mod clock {
    use chrono::{DateTime, Duration, Utc};
    use std::cell::Cell;

    /// Source of "now" so time-dependent code can be tested without waiting.
    pub trait Clock {
        fn now(&self) -> DateTime<Utc>;
    }

    /// The real wall clock.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// A clock that only moves when told to.
    #[derive(Debug)]
    pub struct ManualClock {
        now: Cell<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                now: Cell::new(start),
            }
        }

        pub fn set(&self, now: DateTime<Utc>) {
            self.now.set(now);
        }

        pub fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.now.get()
        }
    }

    impl<C: Clock + ?Sized> Clock for &C {
        fn now(&self) -> DateTime<Utc> {
            (**self).now()
        }
    }

}

/// Numeric helpers
pub mod numeric {
    /// Round to `decimals` places, half away from zero.
    pub fn round_to(value: f64, decimals: i32) -> f64 {
        let factor = 10f64.powi(decimals);
        (value * factor).round() / factor
    }

    /// Arithmetic mean, `None` for an empty slice.
    pub fn mean(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

}

/// Error types
pub mod error {
    use std::fmt;

    /// A timestamp that could not be read as zone-aware nor as naive UTC.
    #[derive(Debug)]
    pub struct TimestampError(pub String);

    impl fmt::Display for TimestampError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Timestamp error: '{}' is neither zone-aware nor naive UTC", self.0)
        }
    }

    impl std::error::Error for TimestampError {}
}
