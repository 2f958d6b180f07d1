//! Density compensation
//!
//! Non-Cartesian trajectories oversample the k-space centre; the adjoint
//! transform weights each coefficient by a per-sample density compensation
//! factor before gridding. This module provides:
//! - `Density`: how an operator obtains its weights
//! - `DensityWeights`: validated weights owned by an operator
//! - `pipe`: fixed-point estimation through the operator itself
//! - `cell_count`, `voronoi`: geometric estimates from the sample positions
//! - `normalize_weights`, `flat_traj`: helpers

pub mod geometry;
pub mod pipe;
pub mod utils;

use num_complex::Complex64;

use crate::error::{NufftError, Result};

pub use geometry::{cell_count, voronoi};
pub use pipe::{pipe, DENSITY_MAGNITUDE_FLOOR};
pub use utils::{flat_traj, normalize_weights};

/// Density compensation setting of an operator
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Density {
    /// No compensation (identity)
    #[default]
    None,
    /// Estimate weights with the fixed-point method at construction
    Estimate {
        /// Number of fixed-point iterations (default 1)
        n_iter: usize,
    },
    /// Use the given weights, one per sample
    Weights(Vec<f64>),
}

impl Density {
    /// Fixed-point estimation with a single iteration
    pub fn estimate() -> Self {
        Density::Estimate { n_iter: 1 }
    }
}

impl From<bool> for Density {
    fn from(enabled: bool) -> Self {
        if enabled { Density::estimate() } else { Density::None }
    }
}

impl From<Vec<f64>> for Density {
    fn from(weights: Vec<f64>) -> Self {
        Density::Weights(weights)
    }
}

/// Per-sample density compensation weights
#[derive(Debug, Clone, PartialEq)]
pub struct DensityWeights {
    weights: Vec<f64>,
}

impl DensityWeights {
    /// Wrap explicit weights, checking them against the sample count
    pub fn new(weights: Vec<f64>, n_samples: usize) -> Result<Self> {
        if weights.len() != n_samples {
            return Err(NufftError::DensityLengthMismatch {
                density: weights.len(),
                samples: n_samples,
            });
        }
        if let Some(pos) = weights.iter().position(|w| !w.is_finite()) {
            return Err(NufftError::Configuration(format!(
                "density weight {} is not finite",
                pos
            )));
        }
        Ok(Self { weights })
    }

    /// Number of weights
    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// True if there are no weights
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// The weights
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    /// Multiply coefficients by the weights, in place
    ///
    /// `coeffs` may hold several coils back to back; each block of
    /// `len()` coefficients is weighted the same way.
    pub fn apply(&self, coeffs: &mut [Complex64]) {
        debug_assert_eq!(coeffs.len() % self.weights.len(), 0);
        for block in coeffs.chunks_exact_mut(self.weights.len()) {
            crate::utils::scale_by_real(block, &self.weights);
        }
    }

    /// Consume into the raw weights
    pub fn into_vec(self) -> Vec<f64> {
        self.weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_density_from_bool() {
        assert_eq!(Density::from(true), Density::Estimate { n_iter: 1 });
        assert_eq!(Density::from(false), Density::None);
        assert_eq!(Density::from(vec![1.0, 2.0]), Density::Weights(vec![1.0, 2.0]));
    }

    #[test]
    fn test_weights_length_mismatch() {
        let err = DensityWeights::new(vec![1.0; 5], 10).unwrap_err();
        assert_eq!(err, NufftError::DensityLengthMismatch { density: 5, samples: 10 });
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_weights_reject_non_finite() {
        assert!(DensityWeights::new(vec![1.0, f64::INFINITY], 2).is_err());
    }

    #[test]
    fn test_apply_multi_coil() {
        let weights = DensityWeights::new(vec![0.5, 2.0], 2).unwrap();
        let mut coeffs = vec![Complex64::new(1.0, 1.0); 4];
        weights.apply(&mut coeffs);
        assert_eq!(
            coeffs,
            vec![
                Complex64::new(0.5, 0.5),
                Complex64::new(2.0, 2.0),
                Complex64::new(0.5, 0.5),
                Complex64::new(2.0, 2.0),
            ]
        );
    }
}
