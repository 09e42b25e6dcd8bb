//! Anomalous movement detection between consecutive landmark sets.
//!
//! A simple magnitude-of-change detector: the mean 3D displacement over all
//! landmark index pairs is compared against a threshold. Cheap and
//! order-independent, at the cost of false positives on camera shake and
//! false negatives on localized single-limb motion diluted by the average.
//! That tradeoff is inherent to the chosen aggregation.

use crate::constants::{DEFAULT_ANOMALY_THRESHOLD, NUM_POSE_LANDMARKS};
use crate::landmarks::LandmarkSet;

/// Outcome of one anomaly check
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnomalyResult {
    /// Whether the mean displacement exceeded the threshold
    pub is_anomalous: bool,
    /// The mean per-landmark displacement that produced the flag,
    /// in normalized-coordinate units
    pub mean_displacement: f32,
}

/// Compares consecutive landmark sets against a displacement threshold
#[derive(Debug, Clone, Copy)]
pub struct MotionAnomalyDetector {
    threshold: f32,
}

impl MotionAnomalyDetector {
    /// Create a detector with the given mean-displacement threshold
    #[must_use]
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// The configured threshold
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Check the current landmark set against the previous one.
    ///
    /// Requires two consecutive complete sets: without a previous set the
    /// result is the non-anomalous default (insufficient history, which
    /// also covers the first frame).
    #[must_use]
    pub fn check(&self, previous: Option<&LandmarkSet>, current: &LandmarkSet) -> AnomalyResult {
        let Some(previous) = previous else {
            return AnomalyResult::default();
        };

        let total: f32 = previous
            .points()
            .iter()
            .zip(current.points())
            .map(|(prev, cur)| prev.distance_to(cur))
            .sum();
        let mean_displacement = total / NUM_POSE_LANDMARKS as f32;

        AnomalyResult {
            is_anomalous: mean_displacement > self.threshold,
            mean_displacement,
        }
    }
}

impl Default for MotionAnomalyDetector {
    fn default() -> Self {
        Self::new(DEFAULT_ANOMALY_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::Landmark;

    fn baseline() -> LandmarkSet {
        let mut points = [Landmark::default(); NUM_POSE_LANDMARKS];
        for (i, point) in points.iter_mut().enumerate() {
            *point = Landmark::new(0.01 * i as f32, 0.02 * i as f32, 0.0);
        }
        LandmarkSet::new(points)
    }

    fn shifted_y(set: &LandmarkSet, dy: f32) -> LandmarkSet {
        let mut points: [Landmark; NUM_POSE_LANDMARKS] =
            set.points().try_into().expect("complete set");
        for point in &mut points {
            point.y += dy;
        }
        LandmarkSet::new(points)
    }

    #[test]
    fn test_no_history_is_never_anomalous() {
        let detector = MotionAnomalyDetector::default();
        let result = detector.check(None, &baseline());
        assert!(!result.is_anomalous);
        assert_eq!(result.mean_displacement, 0.0);
    }

    #[test]
    fn test_identical_sets_are_not_anomalous() {
        let detector = MotionAnomalyDetector::new(1e-6);
        let set = baseline();
        let result = detector.check(Some(&set), &set);
        assert!(!result.is_anomalous);
        assert_eq!(result.mean_displacement, 0.0);
    }

    #[test]
    fn test_uniform_shift_equals_mean_displacement() {
        let previous = baseline();
        let current = shifted_y(&previous, 0.3);

        let detector = MotionAnomalyDetector::new(DEFAULT_ANOMALY_THRESHOLD);
        let result = detector.check(Some(&previous), &current);
        assert!((result.mean_displacement - 0.3).abs() < 1e-5);
        assert!(result.is_anomalous, "0.3 > 0.2 must flag");

        let lenient = MotionAnomalyDetector::new(0.5);
        let result = lenient.check(Some(&previous), &current);
        assert!(!result.is_anomalous, "0.3 <= 0.5 must not flag");
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let previous = baseline();
        let current = shifted_y(&previous, 0.2);

        // The flag holds exactly when the mean exceeds the threshold
        let detector = MotionAnomalyDetector::new(0.2);
        let result = detector.check(Some(&previous), &current);
        assert!((result.mean_displacement - 0.2).abs() < 1e-5);
        assert_eq!(result.is_anomalous, result.mean_displacement > 0.2);
    }
}
