//! Density compensation helpers

use crate::error::Result;
use crate::samples::{proper_trajectory, Samples, TrajectoryNorm};

/// Normalize sample weights to reflect their importance
///
/// Higher input weights mean lower importance: the result is proportional
/// to 1 / w and sums to one.
pub fn normalize_weights(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    let inv: Vec<f64> = weights.iter().map(|&w| total / w).collect();
    let inv_total: f64 = inv.iter().sum();
    inv.iter().map(|&v| v / inv_total).collect()
}

/// Flatten and normalise a raw trajectory, then run a density estimator on it
///
/// Explicit wrapper for estimators that expect flat `Samples` in a given
/// normalisation convention.
///
/// # Arguments
/// * `points` - Row-major trajectory, any shot structure flattened
/// * `ndim` - Coordinates per point (2 or 3)
/// * `norm` - Normalisation the estimator expects
/// * `estimator` - Density estimator to call
pub fn flat_traj<T, F>(points: &[f64], ndim: usize, norm: TrajectoryNorm, estimator: F) -> Result<T>
where
    F: FnOnce(&Samples) -> Result<T>,
{
    let samples = proper_trajectory(points, ndim, norm)?;
    estimator(&samples)
}
