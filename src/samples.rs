//! K-space sample locations
//!
//! Samples are stored dimension-major: all x coordinates, then all y, then
//! all z. The sample index varies fastest, which is the layout the transform
//! plans read from.

use std::f64::consts::PI;

use tracing::warn;

use crate::error::{NufftError, Result};

/// Tolerance used when guessing the normalisation convention of a trajectory
const NORM_TOLERANCE: f64 = 1e-4;

/// Normalisation convention of trajectory coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrajectoryNorm {
    /// Coordinates in [-0.5, 0.5)
    Unit,
    /// Coordinates in [-π, π)
    Pi,
}

/// Set of D-dimensional k-space sample locations (D = 2 or 3)
#[derive(Debug, Clone, PartialEq)]
pub struct Samples {
    ndim: usize,
    n_samples: usize,
    coords: Vec<f64>,
}

impl Samples {
    /// Build from row-major points (n_samples rows of `ndim` coordinates)
    pub fn from_points(points: &[f64], ndim: usize) -> Result<Self> {
        if ndim != 2 && ndim != 3 {
            return Err(NufftError::Configuration(format!(
                "samples must be 2D or 3D, got {}D",
                ndim
            )));
        }
        if points.len() % ndim != 0 {
            return Err(NufftError::Configuration(format!(
                "{} coordinates cannot be split into {}D points",
                points.len(),
                ndim
            )));
        }
        let n_samples = points.len() / ndim;
        if n_samples == 0 {
            return Err(NufftError::Configuration("trajectory has no samples".into()));
        }
        if let Some(pos) = points.iter().position(|v| !v.is_finite()) {
            return Err(NufftError::Configuration(format!(
                "sample {} has a non-finite coordinate",
                pos / ndim
            )));
        }

        // Transpose to dimension-major storage
        let mut coords = vec![0.0; points.len()];
        for j in 0..n_samples {
            for d in 0..ndim {
                coords[d * n_samples + j] = points[j * ndim + d];
            }
        }

        Ok(Self { ndim, n_samples, coords })
    }

    /// Build from 2D points
    pub fn from_2d(points: &[[f64; 2]]) -> Result<Self> {
        let flat: Vec<f64> = points.iter().flat_map(|p| p.iter().copied()).collect();
        Self::from_points(&flat, 2)
    }

    /// Build from 3D points
    pub fn from_3d(points: &[[f64; 3]]) -> Result<Self> {
        let flat: Vec<f64> = points.iter().flat_map(|p| p.iter().copied()).collect();
        Self::from_points(&flat, 3)
    }

    /// Build from a shot-structured trajectory (n_shots x n_per_shot x ndim, row-major)
    ///
    /// The shots are concatenated in order.
    pub fn from_shots(points: &[f64], n_shots: usize, n_per_shot: usize, ndim: usize) -> Result<Self> {
        let expected = n_shots * n_per_shot * ndim;
        if points.len() != expected {
            return Err(NufftError::shape("trajectory", expected, points.len()));
        }
        Self::from_points(points, ndim)
    }

    /// Number of spatial dimensions
    #[inline]
    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// Number of sample points
    #[inline]
    pub fn len(&self) -> usize {
        self.n_samples
    }

    /// Always false: construction rejects empty trajectories
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_samples == 0
    }

    /// Coordinates of all samples along dimension `d`
    #[inline]
    pub fn axis(&self, d: usize) -> &[f64] {
        &self.coords[d * self.n_samples..(d + 1) * self.n_samples]
    }

    /// Coordinates of sample `j`, padded with zeros to three axes
    #[inline]
    pub fn point(&self, j: usize) -> [f64; 3] {
        let mut p = [0.0; 3];
        for (d, v) in p.iter_mut().enumerate().take(self.ndim) {
            *v = self.coords[d * self.n_samples + j];
        }
        p
    }

    /// Largest coordinate magnitude
    pub fn max_abs(&self) -> f64 {
        self.coords.iter().fold(0.0f64, |m, &v| m.max(v.abs()))
    }

    /// Multiply every coordinate by `factor`
    pub fn scale(&mut self, factor: f64) {
        for v in self.coords.iter_mut() {
            *v *= factor;
        }
    }

    /// Rescale so that every coordinate lies in [-π, π]
    ///
    /// Samples already inside the range are left untouched. Otherwise all
    /// coordinates are scaled by π / max|s| and a warning is logged.
    ///
    /// # Returns
    /// The applied scale factor, if any
    pub fn rescale_to_pi(&mut self) -> Option<f64> {
        let max = self.max_abs();
        if max <= PI {
            return None;
        }
        warn!(max_abs = max, "samples will be normalized in [-pi, pi]");
        // Rounding of v * π / max can overshoot π by one ulp
        for v in self.coords.iter_mut() {
            *v = (*v * PI / max).clamp(-PI, PI);
        }
        Some(PI / max)
    }
}

/// Flatten a trajectory and normalise it to the requested convention
///
/// `points` is row-major with `ndim` coordinates per point; any leading
/// shot structure is flattened. Trajectories that look like they use the
/// other convention are rescaled by 2π with a warning.
pub fn proper_trajectory(points: &[f64], ndim: usize, norm: TrajectoryNorm) -> Result<Samples> {
    let mut samples = Samples::from_points(points, ndim)?;
    let max = samples.max_abs();
    match norm {
        TrajectoryNorm::Pi if max - NORM_TOLERANCE < 0.5 => {
            warn!("samples will be rescaled to [-pi, pi), assuming they were in [-0.5, 0.5)");
            samples.scale(2.0 * PI);
        }
        TrajectoryNorm::Unit if max - NORM_TOLERANCE > 0.5 => {
            warn!("samples will be rescaled to [-0.5, 0.5), assuming they were in [-pi, pi)");
            samples.scale(1.0 / (2.0 * PI));
        }
        _ => {}
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_dimension_major_layout() {
        let samples = Samples::from_2d(&[[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]]).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples.axis(0), &[0.1, 0.3, 0.5]);
        assert_eq!(samples.axis(1), &[0.2, 0.4, 0.6]);
        assert_eq!(samples.point(1), [0.3, 0.4, 0.0]);
    }

    #[test]
    fn test_rejects_invalid_points() {
        assert!(Samples::from_points(&[0.0, 1.0, 2.0], 2).is_err());
        assert!(Samples::from_points(&[], 2).is_err());
        assert!(Samples::from_points(&[0.0, f64::NAN], 2).is_err());
        assert!(Samples::from_points(&[0.0; 4], 4).is_err());
    }

    #[test]
    fn test_from_shots() {
        let pts: Vec<f64> = (0..12).map(|i| i as f64 * 0.01).collect();
        let samples = Samples::from_shots(&pts, 2, 3, 2).unwrap();
        assert_eq!(samples.len(), 6);
        assert!(Samples::from_shots(&pts, 3, 3, 2).is_err());
    }

    #[test]
    fn test_rescale_to_pi() {
        let mut samples = Samples::from_2d(&[[2.0 * PI, 0.0], [-PI, 1.0]]).unwrap();
        let factor = samples.rescale_to_pi().expect("samples should be rescaled");
        assert_relative_eq!(factor, 0.5);
        assert!(samples.max_abs() <= PI);
        assert_relative_eq!(samples.max_abs(), PI, max_relative = 1e-15);

        let mut inside = Samples::from_2d(&[[PI, -PI]]).unwrap();
        assert!(inside.rescale_to_pi().is_none());
    }

    #[test]
    fn test_rescale_to_pi_never_exceeds_pi() {
        for i in 1..2000 {
            let max = PI + i as f64 * 0.0137;
            let mut samples = Samples::from_2d(&[[max, -0.5 * max], [0.25 * max, -max]]).unwrap();
            samples.rescale_to_pi();
            assert!(samples.max_abs() <= PI, "max {} rescaled to {} above pi", max, samples.max_abs());
            assert_relative_eq!(samples.max_abs(), PI, max_relative = 1e-15);
        }
    }

    #[test]
    fn test_proper_trajectory_unit_to_pi() {
        let samples = proper_trajectory(&[0.5, -0.25, 0.0, 0.1], 2, TrajectoryNorm::Pi).unwrap();
        assert_relative_eq!(samples.max_abs(), PI, epsilon = 1e-12);
    }

    #[test]
    fn test_proper_trajectory_pi_to_unit() {
        let samples = proper_trajectory(&[PI, -1.0, 0.0, 0.1], 2, TrajectoryNorm::Unit).unwrap();
        assert_relative_eq!(samples.max_abs(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_proper_trajectory_keeps_matching_norm() {
        let samples = proper_trajectory(&[3.0, -1.0], 2, TrajectoryNorm::Pi).unwrap();
        assert_relative_eq!(samples.max_abs(), 3.0);
    }
}
