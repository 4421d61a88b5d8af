//! Data processing for raw sensor readings.
//!
//! This crate turns the unordered rows of a reading store into an evenly
//! spaced series and derives the model features from it.

pub mod accumulator;
pub mod conditioner;
pub mod features;

pub use accumulator::{HourlyAccumulator, HourlySample, HourlySummary};
pub use conditioner::{
    ConditionReport, ConditionedSeries, ConditionerConfig, DuplicatePolicy, GridPoint,
    SeriesConditioner,
};
pub use features::{build_features, FeatureSnapshot};

/// Linear interpolation for filling gaps in gridded data.
pub mod interpolation {
    /// Linearly interpolate between two values `steps` grid points apart.
    ///
    /// Returns `steps + 1` values, both ends included. If `steps` is zero,
    /// returns just the start value.
    pub fn interpolate_pair(start: f64, end: f64, steps: usize) -> Vec<f64> {
        if steps == 0 {
            return vec![start];
        }

        let slope = (end - start) / steps as f64;
        let mut result = Vec::with_capacity(steps + 1);

        for i in 0..=steps {
            result.push(start + slope * i as f64);
        }

        result
    }

    /// Fill `None` gaps on an evenly spaced grid using linear interpolation.
    ///
    /// Only gaps with a known value on both sides are filled; leading and
    /// trailing gaps stay `None` (no extrapolation).
    pub fn fill_gaps(values: &[Option<f64>]) -> Vec<Option<f64>> {
        let mut result = values.to_vec();
        let mut previous: Option<(usize, f64)> = None;

        for (i, value) in values.iter().enumerate() {
            let Some(v) = *value else { continue };
            if let Some((start_idx, start_val)) = previous {
                let steps = i - start_idx;
                if steps > 1 {
                    let filled = interpolate_pair(start_val, v, steps);
                    // Both ends are already present; only write the interior.
                    for (offset, fill) in filled.iter().enumerate().take(steps).skip(1) {
                        result[start_idx + offset] = Some(*fill);
                    }
                }
            }
            previous = Some((i, v));
        }

        result
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_interpolate_pair_basic() {
            let result = interpolate_pair(7.0, 16.0, 5);
            assert_eq!(result.len(), 6);
            assert_eq!(result[0], 7.0);
            assert!((result[1] - 8.8).abs() < 1e-9);
            assert_eq!(result[5], 16.0);
        }

        #[test]
        fn test_interpolate_pair_same_point() {
            let result = interpolate_pair(100.0, 100.0, 0);
            assert_eq!(result, vec![100.0]);
        }

        #[test]
        fn test_fill_gaps() {
            let values = [Some(100.0), Some(110.0), None, None, Some(140.0)];
            let filled = fill_gaps(&values);
            assert_eq!(
                filled,
                vec![Some(100.0), Some(110.0), Some(120.0), Some(130.0), Some(140.0)]
            );
        }

        #[test]
        fn test_fill_gaps_never_extrapolates() {
            let values = [None, Some(10.0), None, Some(20.0), None];
            let filled = fill_gaps(&values);
            assert_eq!(filled, vec![None, Some(10.0), Some(15.0), Some(20.0), None]);
        }

        #[test]
        fn test_fill_gaps_empty() {
            assert!(fill_gaps(&[]).is_empty());
        }
    }
}
