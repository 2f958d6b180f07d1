//! Fixed-point density estimation
//!
//! Starting from unit weights w, each iteration computes
//! w <- w / |F F^H w|, which drives the point spread function of the
//! weighted adjoint towards a delta.
//!
//! Reference:
//! Pipe, J.G., Menon, P. (1999). "Sampling density compensation in MRI:
//! Rationale and an iterative numerical solution." Magnetic Resonance in
//! Medicine, 41(1):179-186.
//! https://doi.org/10.1002/(SICI)1522-2594(199901)41:1<179::AID-MRM25>3.0.CO;2-V

use num_complex::Complex64;
use tracing::{debug, info};

use crate::backend::{Backend, PlanOptions};
use crate::density::Density;
use crate::error::{NufftError, Result};
use crate::operator::{FourierOperator, OperatorConfig};
use crate::samples::Samples;
use crate::shape::ImageShape;

/// Relative lower bound on |update| in the fixed-point division
///
/// Magnitudes below `DENSITY_MAGNITUDE_FLOOR * max|update|` are clamped to
/// that value, so isolated samples get a large but finite weight.
pub const DENSITY_MAGNITUDE_FLOOR: f64 = 1e-8;

/// Estimate density compensation weights with the fixed-point method
///
/// # Arguments
/// * `samples` - Sample locations in [-π, π]
/// * `shape` - Image shape
/// * `n_iter` - Number of fixed-point iterations
/// * `backend` - Backend used for the internal single-coil operator
/// * `options` - Plan options for that operator
///
/// # Returns
/// One real weight per sample
///
/// # Errors
/// `NumericHazard` if an update is non-finite or vanishes everywhere.
pub fn pipe(
    samples: &Samples,
    shape: &ImageShape,
    n_iter: usize,
    backend: Backend,
    options: &PlanOptions,
) -> Result<Vec<f64>> {
    let config = OperatorConfig {
        n_coils: 1,
        density: Density::None,
        smaps: None,
        backend,
        plan: options.clone(),
    };
    let mut oper = FourierOperator::new(samples.clone(), *shape, config)?;

    let n_samples = oper.n_samples();
    let mut density = vec![Complex64::new(1.0, 0.0); n_samples];
    let mut update = vec![Complex64::new(0.0, 0.0); n_samples];
    let mut img = vec![Complex64::new(0.0, 0.0); shape.n_voxels()];

    for iter in 0..n_iter {
        oper.adj_op_into(&density, &mut img)?;
        oper.op_into(&img, &mut update)?;

        let max_mag = divide_by_update(&mut density, &update, iter + 1)?;
        info!(iteration = iter + 1, n_iter, max_update = max_mag, "density estimation");
    }

    Ok(density.iter().map(|d| d.re).collect())
}

/// density[j] /= max(|update[j]|, floor) for one fixed-point iteration
///
/// # Returns
/// The largest update magnitude
fn divide_by_update(density: &mut [Complex64], update: &[Complex64], iteration: usize) -> Result<f64> {
    let mut max_mag = 0.0f64;
    for u in update.iter() {
        let mag = u.norm();
        if !mag.is_finite() {
            return Err(NufftError::NumericHazard(format!(
                "non-finite density update at iteration {}",
                iteration
            )));
        }
        max_mag = max_mag.max(mag);
    }
    if max_mag == 0.0 {
        return Err(NufftError::NumericHazard(format!(
            "density update vanished at iteration {}",
            iteration
        )));
    }

    let floor = DENSITY_MAGNITUDE_FLOOR * max_mag;
    let mut n_clamped = 0usize;
    for (d, u) in density.iter_mut().zip(update.iter()) {
        let mag = u.norm();
        if mag < floor {
            n_clamped += 1;
        }
        *d /= mag.max(floor);
    }
    if n_clamped > 0 {
        debug!(iteration, n_clamped, "density update clamped to floor");
    }
    Ok(max_mag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use approx::assert_relative_eq;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn test_divide_rejects_vanishing_update() {
        let mut density = vec![c(1.0, 0.0); 3];
        let err = divide_by_update(&mut density, &[c(0.0, 0.0); 3], 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NumericHazard);
        assert!(err.to_string().contains("iteration 2"), "unexpected message: {}", err);
    }

    #[test]
    fn test_divide_rejects_non_finite_update() {
        let mut density = vec![c(1.0, 0.0); 3];
        let update = [c(1.0, 0.0), c(f64::NAN, 0.0), c(2.0, 0.0)];
        let err = divide_by_update(&mut density, &update, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NumericHazard);

        let update = [c(1.0, 0.0), c(0.0, f64::INFINITY), c(2.0, 0.0)];
        assert!(divide_by_update(&mut density, &update, 1).is_err());
    }

    #[test]
    fn test_divide_clamps_near_zero_update() {
        let mut density = vec![c(1.0, 0.0); 3];
        let update = [c(4.0, 0.0), c(1e-20, 0.0), c(0.0, 2.0)];
        let max = divide_by_update(&mut density, &update, 1).unwrap();
        assert_relative_eq!(max, 4.0);
        assert_relative_eq!(density[0].re, 0.25);
        assert_relative_eq!(density[1].re, 1.0 / (DENSITY_MAGNITUDE_FLOOR * 4.0), max_relative = 1e-12);
        assert!(density[1].re.is_finite());
        assert_relative_eq!(density[2].re, 0.5);
    }

    #[test]
    fn test_zero_iterations_returns_ones() {
        let samples = Samples::from_2d(&[[0.1, 0.2], [-0.5, 1.0]]).unwrap();
        let shape = ImageShape::new_2d(4, 4).unwrap();
        let weights = pipe(&samples, &shape, 0, Backend::Spread, &PlanOptions::default()).unwrap();
        assert_eq!(weights, vec![1.0, 1.0]);
    }

    #[test]
    fn test_weights_are_positive_and_finite() {
        let pts: Vec<[f64; 2]> = (0..64)
            .map(|j| {
                let r = (j % 8) as f64 / 8.0 * 3.0;
                let a = (j / 8) as f64 * std::f64::consts::PI / 8.0;
                [r * a.cos(), r * a.sin()]
            })
            .collect();
        let samples = Samples::from_2d(&pts).unwrap();
        let shape = ImageShape::new_2d(8, 8).unwrap();
        let weights = pipe(&samples, &shape, 3, Backend::Spread, &PlanOptions::default()).unwrap();
        assert_eq!(weights.len(), 64);
        assert!(weights.iter().all(|&w| w.is_finite() && w > 0.0));
    }
}
