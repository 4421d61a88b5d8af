use aqf_utils::clock::Clock;
use aqf_utils::numeric::round_to;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Default history interval: one summary per hour.
pub const DEFAULT_INTERVAL_MINUTES: i64 = 60;

/// One live sample fed to the accumulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlySample {
    pub aqi: f64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub mq135: Option<f64>,
}

/// Averaged values for one accumulation window.
///
/// AQI and the raw gas-sensor value are truncated to whole numbers;
/// temperature and humidity keep two decimals.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HourlySummary {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub samples: usize,
    pub aqi: f64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub mq135: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Sum {
    total: f64,
    count: usize,
}

impl Sum {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.total += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total / self.count as f64)
    }
}

/// In-memory accumulator producing one averaged summary per interval.
///
/// Time comes from the injected [`Clock`], so the flush schedule can be
/// driven by a manual clock in tests or by reading timestamps when
/// replaying stored data.
///
/// ## Usage
///
/// ```rust
/// use aqf_data::accumulator::{HourlyAccumulator, HourlySample};
/// use aqf_utils::clock::ManualClock;
/// use chrono::{Duration, TimeZone, Utc};
///
/// let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
/// let mut acc = HourlyAccumulator::new(&clock, Duration::hours(1));
/// acc.record(HourlySample { aqi: 40.0, temperature: None, humidity: None, mq135: None });
/// assert!(acc.flush_if_due().is_none());
/// clock.advance(Duration::hours(1));
/// assert_eq!(acc.flush_if_due().unwrap().aqi, 40.0);
/// ```
pub struct HourlyAccumulator<C: Clock> {
    clock: C,
    interval: Duration,
    window_start: DateTime<Utc>,
    aqi: Sum,
    temperature: Sum,
    humidity: Sum,
    mq135: Sum,
}

impl<C: Clock> HourlyAccumulator<C> {
    pub fn new(clock: C, interval: Duration) -> Self {
        let window_start = clock.now();
        Self {
            clock,
            interval,
            window_start,
            aqi: Sum::default(),
            temperature: Sum::default(),
            humidity: Sum::default(),
            mq135: Sum::default(),
        }
    }

    /// Add one sample to the current window.
    pub fn record(&mut self, sample: HourlySample) {
        self.aqi.add(Some(sample.aqi));
        self.temperature.add(sample.temperature);
        self.humidity.add(sample.humidity);
        self.mq135.add(sample.mq135);
    }

    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Samples recorded since the last flush.
    pub fn pending(&self) -> usize {
        self.aqi.count
    }

    pub fn is_due(&self) -> bool {
        self.clock.now() - self.window_start >= self.interval
    }

    /// Flush when the interval has elapsed on the clock.
    ///
    /// The window is reset whenever it is due, even if it held no samples.
    pub fn flush_if_due(&mut self) -> Option<HourlySummary> {
        if !self.is_due() {
            return None;
        }
        self.flush()
    }

    /// Summarize and reset the current window unconditionally.
    pub fn flush(&mut self) -> Option<HourlySummary> {
        let now = self.clock.now();
        let summary = self.aqi.mean().map(|aqi| HourlySummary {
            window_start: self.window_start,
            window_end: now,
            samples: self.aqi.count,
            aqi: aqi.trunc(),
            temperature: self.temperature.mean().map(|t| round_to(t, 2)),
            humidity: self.humidity.mean().map(|h| round_to(h, 2)),
            mq135: self.mq135.mean().map(f64::trunc),
        });

        self.window_start = now;
        self.aqi = Sum::default();
        self.temperature = Sum::default();
        self.humidity = Sum::default();
        self.mq135 = Sum::default();

        if let Some(s) = &summary {
            log::info!(
                "[AQF] accumulator: flushed {} samples for window starting {}",
                s.samples,
                s.window_start
            );
        }
        summary
    }
}
