//! Exact non-uniform DFT plan
//!
//! Evaluates the type-1 and type-2 sums directly, O(n_samples * n_voxels).
//! Per-axis phase factors are tabulated for each sample so the inner loop is
//! a product of three table lookups.

use num_complex::Complex64;
use tracing::debug;

use super::{batch_count, Backend, RawTransformPlan};
use crate::error::Result;
use crate::samples::Samples;
use crate::shape::{idx3d, ImageShape};

/// Direct summation plan
pub struct DirectPlan {
    shape: ImageShape,
    n_samples: usize,
    n_trans: usize,
    points: Vec<[f64; 3]>,
    /// Mode frequencies per axis (a single 0 on unused axes)
    modes: [Vec<f64>; 3],
    /// Phase tables reused across samples
    phase: [Vec<Complex64>; 3],
}

impl DirectPlan {
    /// Build a plan for `n_trans` simultaneous transforms
    pub fn new(samples: &Samples, shape: &ImageShape, n_trans: usize) -> Result<Self> {
        let dims = shape.dims3();
        let mut modes: [Vec<f64>; 3] = [vec![0.0], vec![0.0], vec![0.0]];
        for d in 0..shape.ndim() {
            modes[d] = (0..dims[d]).map(|i| i as f64 - (dims[d] / 2) as f64).collect();
        }
        let phase = [
            vec![Complex64::new(0.0, 0.0); modes[0].len()],
            vec![Complex64::new(0.0, 0.0); modes[1].len()],
            vec![Complex64::new(0.0, 0.0); modes[2].len()],
        ];
        let points = (0..samples.len()).map(|j| samples.point(j)).collect();

        debug!(shape = %shape, n_samples = samples.len(), n_trans, "direct plan created");
        Ok(Self {
            shape: *shape,
            n_samples: samples.len(),
            n_trans,
            points,
            modes,
            phase,
        })
    }

    /// Fill the phase tables with exp(sign * i k_d x_d) for sample `j`
    fn tabulate(&mut self, j: usize, sign: f64) {
        let p = self.points[j];
        for d in 0..3 {
            for (e, &k) in self.phase[d].iter_mut().zip(self.modes[d].iter()) {
                *e = Complex64::from_polar(1.0, sign * k * p[d]);
            }
        }
    }
}

impl RawTransformPlan for DirectPlan {
    fn backend(&self) -> Backend {
        Backend::Direct
    }

    fn n_samples(&self) -> usize {
        self.n_samples
    }

    fn shape(&self) -> &ImageShape {
        &self.shape
    }

    fn n_trans(&self) -> usize {
        self.n_trans
    }

    fn eps(&self) -> f64 {
        f64::EPSILON
    }

    fn execute_type1(&mut self, coeffs: &[Complex64], image: &mut [Complex64]) -> Result<()> {
        let batch = batch_count(&*self, coeffs.len(), image.len())?;
        let (m, nv) = (self.n_samples, self.shape.n_voxels());
        let [m0, m1, m2] = self.shape.dims3();
        image.fill(Complex64::new(0.0, 0.0));

        for j in 0..m {
            self.tabulate(j, 1.0);
            for t in 0..batch {
                let c = coeffs[t * m + j];
                let img = &mut image[t * nv..(t + 1) * nv];
                for i2 in 0..m2 {
                    let c2 = c * self.phase[2][i2];
                    for i1 in 0..m1 {
                        let c1 = c2 * self.phase[1][i1];
                        let row = idx3d(0, i1, i2, m0, m1);
                        for i0 in 0..m0 {
                            img[row + i0] += c1 * self.phase[0][i0];
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn execute_type2(&mut self, image: &[Complex64], coeffs: &mut [Complex64]) -> Result<()> {
        let batch = batch_count(&*self, coeffs.len(), image.len())?;
        let (m, nv) = (self.n_samples, self.shape.n_voxels());
        let [m0, m1, m2] = self.shape.dims3();

        for j in 0..m {
            self.tabulate(j, -1.0);
            for t in 0..batch {
                let img = &image[t * nv..(t + 1) * nv];
                let mut acc = Complex64::new(0.0, 0.0);
                for i2 in 0..m2 {
                    let mut acc2 = Complex64::new(0.0, 0.0);
                    for i1 in 0..m1 {
                        let row = idx3d(0, i1, i2, m0, m1);
                        let mut acc1 = Complex64::new(0.0, 0.0);
                        for i0 in 0..m0 {
                            acc1 += img[row + i0] * self.phase[0][i0];
                        }
                        acc2 += acc1 * self.phase[1][i1];
                    }
                    acc += acc2 * self.phase[2][i2];
                }
                coeffs[t * m + j] = acc;
            }
        }
        Ok(())
    }
}
