//! Common test utilities for mri-nufft integration tests

#![allow(dead_code)]

use std::f64::consts::PI;

use mri_nufft::{Complex64, Samples};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded random complex vector with entries in [-1, 1] + i[-1, 1]
pub fn random_complex(n: usize, seed: u64) -> Vec<Complex64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| Complex64::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0)))
        .collect()
}

/// Seeded random positive weights in [0.5, 2)
pub fn random_weights(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random_range(0.5..2.0)).collect()
}

/// Relative L2 error ||a - b|| / ||b||
pub fn rel_error(a: &[Complex64], b: &[Complex64]) -> f64 {
    assert_eq!(a.len(), b.len(), "length mismatch");
    let num: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).norm_sqr()).sum();
    let den: f64 = b.iter().map(|y| y.norm_sqr()).sum();
    if den == 0.0 {
        return num.sqrt();
    }
    (num / den).sqrt()
}

/// Hermitian inner product sum(a * conj(b))
pub fn inner(a: &[Complex64], b: &[Complex64]) -> Complex64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y.conj()).sum()
}

/// Fully sampled Cartesian grid: x_d = 2π m / N_d, m in [-N_d/2, N_d/2)
pub fn cartesian_2d(nx: usize, ny: usize) -> Samples {
    let mut pts = Vec::with_capacity(nx * ny);
    for iy in 0..ny {
        for ix in 0..nx {
            let mx = ix as f64 - (nx / 2) as f64;
            let my = iy as f64 - (ny / 2) as f64;
            pts.push([2.0 * PI * mx / nx as f64, 2.0 * PI * my / ny as f64]);
        }
    }
    Samples::from_2d(&pts).unwrap()
}

/// Radial trajectory with `n_spokes` spokes of `n_per_spoke` samples,
/// radius up to 0.95 π
pub fn radial_2d(n_spokes: usize, n_per_spoke: usize) -> Samples {
    let mut pts = Vec::with_capacity(n_spokes * n_per_spoke);
    for s in 0..n_spokes {
        let angle = s as f64 * PI / n_spokes as f64;
        for i in 0..n_per_spoke {
            let r = 0.95 * PI * (2.0 * i as f64 / (n_per_spoke - 1) as f64 - 1.0);
            pts.push([r * angle.cos(), r * angle.sin()]);
        }
    }
    Samples::from_2d(&pts).unwrap()
}

/// Uniform random 3D samples in [-π, π)
pub fn random_3d(n: usize, seed: u64) -> Samples {
    let mut rng = StdRng::seed_from_u64(seed);
    let pts: Vec<[f64; 3]> = (0..n)
        .map(|_| {
            [
                rng.random_range(-PI..PI),
                rng.random_range(-PI..PI),
                rng.random_range(-PI..PI),
            ]
        })
        .collect();
    Samples::from_3d(&pts).unwrap()
}
