//! Gridding NUFFT plan
//!
//! Type-2: deconvolve the image by the kernel's Fourier transform, zero-pad
//! onto an oversampled grid, FFT, then interpolate at the samples with an
//! exponential-of-semicircle (ES) kernel.
//! Type-1 runs the exact transpose: spread, inverse FFT, crop, deconvolve.
//!
//! ES kernel in grid units: φ(z) = exp(β (sqrt(1 - (2z/w)²) - 1)) for |z| < w/2.
//!
//! Reference:
//! Barnett, A.H., Magland, J., af Klinteberg, L. (2019). "A parallel
//! nonuniform fast Fourier transform library based on an 'exponential of
//! semicircle' kernel." SIAM J. Sci. Comput. 41(5), C479-C504.
//! https://doi.org/10.1137/18M120885X

use std::f64::consts::PI;

use num_complex::Complex64;
use tracing::debug;

use super::{
    batch_count, check_status, Backend, PlanOptions, RawTransformPlan, MAX_GRID_ALLOC,
    STATUS_EPS_TOO_SMALL, STATUS_MAX_ALLOC, STATUS_UPSAMPFAC_TOO_SMALL,
};
use crate::error::{NufftError, Result};
use crate::fft::FftGridWorkspace;
use crate::samples::Samples;
use crate::shape::{idx3d, ImageShape};
use crate::utils::format_bytes;

const MIN_WIDTH: usize = 2;
const MAX_WIDTH: usize = 16;
/// Quadrature points per unit kernel width for the deconvolution factors
const QUAD_POINTS_PER_WIDTH: usize = 64;

/// Kernel width and shape parameter for a tolerance and oversampling factor
///
/// # Returns
/// Tuple of (width in fine grid points, beta)
pub fn kernel_params(eps: f64, upsampfac: f64) -> Result<(usize, f64)> {
    if !(eps >= f64::EPSILON) {
        check_status(STATUS_EPS_TOO_SMALL, "spread", format!("eps {:e} is below machine precision", eps))?;
    }
    if !(upsampfac > 1.0) {
        check_status(
            STATUS_UPSAMPFAC_TOO_SMALL,
            "spread",
            format!("upsampfac must be > 1, got {}", upsampfac),
        )?;
    }

    if (upsampfac - 2.0).abs() < 1e-12 {
        // exact powers of ten land on the lower width
        let digits = (-eps.log10() - 1e-12).ceil() as i64;
        let w = (digits + 1).clamp(MIN_WIDTH as i64, MAX_WIDTH as i64) as usize;
        let beta_over_w = match w {
            2 => 2.20,
            3 => 2.26,
            4 => 2.38,
            _ => 2.30,
        };
        Ok((w, beta_over_w * w as f64))
    } else {
        let w = (-eps.ln() / (PI * (1.0 - 1.0 / upsampfac).sqrt())).ceil() as i64;
        let w = w.clamp(MIN_WIDTH as i64, MAX_WIDTH as i64) as usize;
        let beta = 0.97 * PI * (1.0 - 0.5 / upsampfac) * w as f64;
        Ok((w, beta))
    }
}

/// ES kernel value at offset `z` (in fine grid points)
#[inline]
fn es_kernel(z: f64, width: usize, beta: f64) -> f64 {
    let u = 2.0 * z / width as f64;
    if u.abs() >= 1.0 {
        0.0
    } else {
        (beta * ((1.0 - u * u).sqrt() - 1.0)).exp()
    }
}

/// Fourier transform of the ES kernel at angular frequency `omega` (grid units)
///
/// ∫ φ(z) cos(ω z) dz over the kernel support, midpoint rule on the half support.
fn es_kernel_ft(omega: f64, width: usize, beta: f64) -> f64 {
    let half = 0.5 * width as f64;
    let n_quad = QUAD_POINTS_PER_WIDTH * width;
    let dz = half / n_quad as f64;
    let mut sum = 0.0;
    for m in 0..n_quad {
        let z = (m as f64 + 0.5) * dz;
        sum += es_kernel(z, width, beta) * (omega * z).cos();
    }
    2.0 * sum * dz
}

/// Smallest even grid size holding `n` modes oversampled by `upsampfac`
fn fine_grid_size(n: usize, upsampfac: f64, width: usize) -> usize {
    let mut nf = (upsampfac * n as f64).ceil() as usize;
    if nf % 2 == 1 {
        nf += 1;
    }
    nf.max(2 * width)
}

#[inline(always)]
fn wrap(i: usize, n: usize) -> usize {
    if i >= n { i - n } else { i }
}

/// Gridding NUFFT plan
pub struct SpreadPlan {
    shape: ImageShape,
    n_samples: usize,
    n_trans: usize,
    eps: f64,
    width: usize,
    beta: f64,
    /// Fine grid dimensions (1 on unused axes)
    fine: [usize; 3],
    /// Kernel width per axis (1 on unused axes)
    widths: [usize; 3],
    /// First grid index touched by each sample, layout [j*3 + d]
    starts: Vec<usize>,
    /// Kernel weights, layout [(j*3 + d)*width + i]
    weights: Vec<f64>,
    /// Fine grid position of each mode, per axis
    mode_pos: [Vec<usize>; 3],
    /// Deconvolution factor of each mode, per axis
    correction: [Vec<f64>; 3],
    fft: FftGridWorkspace,
    grid: Vec<Complex64>,
}

impl SpreadPlan {
    /// Build a plan for `n_trans` simultaneous transforms
    pub fn new(samples: &Samples, shape: &ImageShape, n_trans: usize, options: &PlanOptions) -> Result<Self> {
        let (width, beta) = kernel_params(options.eps, options.upsampfac)?;
        let ndim = shape.ndim();
        let dims = shape.dims3();

        let mut fine = [1usize; 3];
        let mut widths = [1usize; 3];
        for d in 0..ndim {
            fine[d] = fine_grid_size(dims[d], options.upsampfac, width);
            widths[d] = width;
        }
        let grid_len = fine
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .filter(|&len| len <= MAX_GRID_ALLOC);
        let Some(grid_len) = grid_len else {
            return Err(NufftError::Backend {
                backend: "spread",
                status: STATUS_MAX_ALLOC,
                message: format!("fine grid {:?} exceeds the allocation limit", &fine[..ndim]),
            });
        };

        // Per-axis mode positions on the fine grid and deconvolution factors
        let mut mode_pos: [Vec<usize>; 3] = [vec![0], vec![0], vec![0]];
        let mut correction: [Vec<f64>; 3] = [vec![1.0], vec![1.0], vec![1.0]];
        for d in 0..ndim {
            let n_modes = dims[d];
            let nf = fine[d];
            let h = 2.0 * PI / nf as f64;
            mode_pos[d] = (0..n_modes)
                .map(|i| (i as i64 - (n_modes / 2) as i64).rem_euclid(nf as i64) as usize)
                .collect();
            correction[d] = (0..n_modes)
                .map(|i| {
                    let k = i as f64 - (n_modes / 2) as f64;
                    1.0 / es_kernel_ft(k * h, width, beta)
                })
                .collect();
        }

        // Precompute kernel weights for every sample
        let n_samples = samples.len();
        let mut starts = vec![0usize; n_samples * 3];
        let mut weights = vec![0.0; n_samples * 3 * width];
        for d in 0..3 {
            if d >= ndim {
                for j in 0..n_samples {
                    weights[(j * 3 + d) * width] = 1.0;
                }
                continue;
            }
            let nf = fine[d];
            let scale = nf as f64 / (2.0 * PI);
            for (j, &x) in samples.axis(d).iter().enumerate() {
                let t = x * scale;
                let l0 = (t - 0.5 * width as f64).ceil();
                starts[j * 3 + d] = (l0 as i64).rem_euclid(nf as i64) as usize;
                let w = &mut weights[(j * 3 + d) * width..(j * 3 + d + 1) * width];
                for (i, wi) in w.iter_mut().enumerate() {
                    *wi = es_kernel(t - (l0 + i as f64), width, beta);
                }
            }
        }

        let plan = Self {
            shape: *shape,
            n_samples,
            n_trans,
            eps: options.eps,
            width,
            beta,
            fine,
            widths,
            starts,
            weights,
            mode_pos,
            correction,
            fft: FftGridWorkspace::new(fine[0], fine[1], fine[2]),
            grid: vec![Complex64::new(0.0, 0.0); grid_len],
        };
        debug!(
            shape = %plan.shape,
            fine_grid = ?&plan.fine[..ndim],
            width = plan.width,
            beta = plan.beta,
            n_samples,
            n_trans,
            memory = %format_bytes(plan.memory_bytes()),
            "spread plan created"
        );
        Ok(plan)
    }

    /// Kernel width in fine grid points
    pub fn kernel_width(&self) -> usize {
        self.width
    }

    /// Oversampled grid dimensions
    pub fn fine_grid(&self) -> &[usize] {
        &self.fine[..self.shape.ndim()]
    }

    /// Spread coefficients onto the fine grid
    fn spread(&mut self, coeffs: &[Complex64]) {
        let [n0, n1, n2] = self.fine;
        let [w0, w1, w2] = self.widths;
        let w = self.width;
        self.grid.fill(Complex64::new(0.0, 0.0));

        for (j, &c) in coeffs.iter().enumerate() {
            let s = &self.starts[j * 3..j * 3 + 3];
            let kw = &self.weights[j * 3 * w..(j + 1) * 3 * w];
            for i2 in 0..w2 {
                let l2 = wrap(s[2] + i2, n2);
                let c2 = c * kw[2 * w + i2];
                for i1 in 0..w1 {
                    let l1 = wrap(s[1] + i1, n1);
                    let c1 = c2 * kw[w + i1];
                    let row = idx3d(0, l1, l2, n0, n1);
                    for i0 in 0..w0 {
                        let l0 = wrap(s[0] + i0, n0);
                        self.grid[row + l0] += c1 * kw[i0];
                    }
                }
            }
        }
    }

    /// Interpolate the fine grid at the samples
    fn interpolate(&self, coeffs: &mut [Complex64]) {
        let [n0, n1, n2] = self.fine;
        let [w0, w1, w2] = self.widths;
        let w = self.width;

        for (j, c) in coeffs.iter_mut().enumerate() {
            let s = &self.starts[j * 3..j * 3 + 3];
            let kw = &self.weights[j * 3 * w..(j + 1) * 3 * w];
            let mut acc = Complex64::new(0.0, 0.0);
            for i2 in 0..w2 {
                let l2 = wrap(s[2] + i2, n2);
                let mut acc2 = Complex64::new(0.0, 0.0);
                for i1 in 0..w1 {
                    let l1 = wrap(s[1] + i1, n1);
                    let row = idx3d(0, l1, l2, n0, n1);
                    let mut acc1 = Complex64::new(0.0, 0.0);
                    for i0 in 0..w0 {
                        acc1 += self.grid[row + wrap(s[0] + i0, n0)] * kw[i0];
                    }
                    acc2 += acc1 * kw[w + i1];
                }
                acc += acc2 * kw[2 * w + i2];
            }
            *c = acc;
        }
    }

    /// Copy deconvolved modes from the fine grid into an image
    fn crop_to_image(&self, image: &mut [Complex64]) {
        let [n0, n1, _] = self.fine;
        let [m0, m1, m2] = self.shape.dims3();
        for i2 in 0..m2 {
            let (g2, c2) = (self.mode_pos[2][i2], self.correction[2][i2]);
            for i1 in 0..m1 {
                let (g1, c1) = (self.mode_pos[1][i1], self.correction[1][i1]);
                for i0 in 0..m0 {
                    let (g0, c0) = (self.mode_pos[0][i0], self.correction[0][i0]);
                    image[idx3d(i0, i1, i2, m0, m1)] = self.grid[idx3d(g0, g1, g2, n0, n1)] * (c0 * c1 * c2);
                }
            }
        }
    }

    /// Place deconvolved image modes on the zeroed fine grid
    fn pad_from_image(&mut self, image: &[Complex64]) {
        let [n0, n1, _] = self.fine;
        let [m0, m1, m2] = self.shape.dims3();
        self.grid.fill(Complex64::new(0.0, 0.0));
        for i2 in 0..m2 {
            let (g2, c2) = (self.mode_pos[2][i2], self.correction[2][i2]);
            for i1 in 0..m1 {
                let (g1, c1) = (self.mode_pos[1][i1], self.correction[1][i1]);
                for i0 in 0..m0 {
                    let (g0, c0) = (self.mode_pos[0][i0], self.correction[0][i0]);
                    self.grid[idx3d(g0, g1, g2, n0, n1)] = image[idx3d(i0, i1, i2, m0, m1)] * (c0 * c1 * c2);
                }
            }
        }
    }
}

impl RawTransformPlan for SpreadPlan {
    fn backend(&self) -> Backend {
        Backend::Spread
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
        self.eps
    }

    fn memory_bytes(&self) -> usize {
        self.grid.len() * std::mem::size_of::<Complex64>()
            + self.weights.len() * std::mem::size_of::<f64>()
            + self.starts.len() * std::mem::size_of::<usize>()
    }

    fn execute_type1(&mut self, coeffs: &[Complex64], image: &mut [Complex64]) -> Result<()> {
        let batch = batch_count(&*self, coeffs.len(), image.len())?;
        let m = self.n_samples;
        let nv = self.shape.n_voxels();
        for t in 0..batch {
            self.spread(&coeffs[t * m..(t + 1) * m]);
            self.fft.backward(&mut self.grid);
            self.crop_to_image(&mut image[t * nv..(t + 1) * nv]);
        }
        Ok(())
    }

    fn execute_type2(&mut self, image: &[Complex64], coeffs: &mut [Complex64]) -> Result<()> {
        let batch = batch_count(&*self, coeffs.len(), image.len())?;
        let m = self.n_samples;
        let nv = self.shape.n_voxels();
        for t in 0..batch {
            self.pad_from_image(&image[t * nv..(t + 1) * nv]);
            self.fft.forward(&mut self.grid);
            self.interpolate(&mut coeffs[t * m..(t + 1) * m]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Exact type-2 sum, 2D only
    fn exact_type2(samples: &Samples, image: &[Complex64], nx: usize, ny: usize) -> Vec<Complex64> {
        (0..samples.len())
            .map(|j| {
                let p = samples.point(j);
                let mut acc = Complex64::new(0.0, 0.0);
                for iy in 0..ny {
                    for ix in 0..nx {
                        let kx = ix as f64 - (nx / 2) as f64;
                        let ky = iy as f64 - (ny / 2) as f64;
                        acc += image[ix + iy * nx] * Complex64::from_polar(1.0, -(kx * p[0] + ky * p[1]));
                    }
                }
                acc
            })
            .collect()
    }

    fn test_samples() -> Samples {
        let pts: Vec<[f64; 2]> = (0..40)
            .map(|j| {
                let a = j as f64 * 0.7;
                [3.0 * (a * 1.3).sin(), -PI + (j as f64 * 0.157) % (2.0 * PI)]
            })
            .collect();
        Samples::from_2d(&pts).unwrap()
    }

    #[test]
    fn test_kernel_params_table() {
        let (w, beta) = kernel_params(1e-6, 2.0).unwrap();
        assert_eq!(w, 7);
        assert_relative_eq!(beta, 2.30 * 7.0);

        let (w, beta) = kernel_params(1e-1, 2.0).unwrap();
        assert_eq!(w, 2);
        assert_relative_eq!(beta, 4.4);
    }

    #[test]
    fn test_kernel_params_rejects_bad_options() {
        assert!(kernel_params(0.0, 2.0).is_err());
        assert!(kernel_params(1e-6, 1.0).is_err());
        assert!(kernel_params(f64::NAN, 2.0).is_err());
    }

    #[test]
    fn test_kernel_params_general_upsampfac() {
        let (w, beta) = kernel_params(1e-6, 1.25).unwrap();
        assert!(w > 7 && w <= MAX_WIDTH, "width {} should grow for small upsampfac", w);
        assert!(beta > 0.0);
    }

    #[test]
    fn test_fine_grid_size() {
        assert_eq!(fine_grid_size(16, 2.0, 7), 32);
        assert_eq!(fine_grid_size(5, 2.0, 7), 14);
        assert_eq!(fine_grid_size(15, 1.25, 4), 20);
    }

    #[test]
    fn test_kernel_ft_at_zero_is_integral() {
        let (w, beta) = kernel_params(1e-6, 2.0).unwrap();
        let n = 20_000;
        let dz = w as f64 / n as f64;
        let integral: f64 = (0..n)
            .map(|m| es_kernel(-0.5 * w as f64 + (m as f64 + 0.5) * dz, w, beta) * dz)
            .sum();
        assert_relative_eq!(es_kernel_ft(0.0, w, beta), integral, max_relative = 1e-6);
    }

    #[test]
    fn test_type2_matches_exact_sum() {
        let (nx, ny) = (12, 10);
        let samples = test_samples();
        let shape = ImageShape::new_2d(nx, ny).unwrap();
        let mut plan = SpreadPlan::new(&samples, &shape, 1, &PlanOptions::default()).unwrap();

        let image: Vec<Complex64> = (0..nx * ny)
            .map(|i| Complex64::new((i as f64 * 0.37).sin(), (i as f64 * 0.11).cos()))
            .collect();
        let mut coeffs = vec![Complex64::new(0.0, 0.0); samples.len()];
        plan.execute_type2(&image, &mut coeffs).unwrap();

        let exact = exact_type2(&samples, &image, nx, ny);
        let err: f64 = coeffs.iter().zip(exact.iter()).map(|(a, b)| (a - b).norm_sqr()).sum::<f64>().sqrt();
        let norm: f64 = exact.iter().map(|v| v.norm_sqr()).sum::<f64>().sqrt();
        assert!(err / norm < 1e-4, "relative error {} too large", err / norm);
    }

    #[test]
    fn test_type1_is_adjoint_of_type2() {
        let (nx, ny) = (8, 6);
        let samples = test_samples();
        let shape = ImageShape::new_2d(nx, ny).unwrap();
        let mut plan = SpreadPlan::new(&samples, &shape, 1, &PlanOptions { eps: 1e-3, upsampfac: 2.0 }).unwrap();

        let x: Vec<Complex64> = (0..nx * ny).map(|i| Complex64::new((i as f64).cos(), 0.5 * (i as f64).sin())).collect();
        let y: Vec<Complex64> = (0..samples.len()).map(|j| Complex64::new(0.3 * j as f64, 1.0 - 0.1 * j as f64)).collect();

        let mut ax = vec![Complex64::new(0.0, 0.0); samples.len()];
        let mut ahy = vec![Complex64::new(0.0, 0.0); nx * ny];
        plan.execute_type2(&x, &mut ax).unwrap();
        plan.execute_type1(&y, &mut ahy).unwrap();

        let lhs: Complex64 = ax.iter().zip(y.iter()).map(|(a, b)| a * b.conj()).sum();
        let rhs: Complex64 = x.iter().zip(ahy.iter()).map(|(a, b)| a * b.conj()).sum();
        assert!((lhs - rhs).norm() < 1e-9 * lhs.norm().max(1.0), "<Ax, y> = {} but <x, A^H y> = {}", lhs, rhs);
    }

    #[test]
    fn test_batched_execution_matches_single() {
        let samples = test_samples();
        let shape = ImageShape::new_2d(8, 8).unwrap();
        let mut plan = SpreadPlan::new(&samples, &shape, 2, &PlanOptions::default()).unwrap();
        let m = samples.len();

        let images: Vec<Complex64> = (0..128).map(|i| Complex64::new(i as f64, -(i as f64))).collect();
        let mut batched = vec![Complex64::new(0.0, 0.0); 2 * m];
        plan.execute_type2(&images, &mut batched).unwrap();

        let mut single = vec![Complex64::new(0.0, 0.0); m];
        plan.execute_type2(&images[64..], &mut single).unwrap();
        for (a, b) in batched[m..].iter().zip(single.iter()) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_3d_plan_runs() {
        let samples = Samples::from_3d(&[[0.1, -0.2, 0.3], [PI, -PI, 0.0], [-1.0, 2.0, -3.0]]).unwrap();
        let shape = ImageShape::new_3d(6, 4, 4).unwrap();
        let mut plan = SpreadPlan::new(&samples, &shape, 1, &PlanOptions::default()).unwrap();
        assert_eq!(plan.fine_grid(), &[14, 14, 14]);

        let image = vec![Complex64::new(1.0, 0.0); shape.n_voxels()];
        let mut coeffs = vec![Complex64::new(0.0, 0.0); 3];
        plan.execute_type2(&image, &mut coeffs).unwrap();
        assert!(coeffs.iter().all(|c| c.re.is_finite() && c.im.is_finite()));
    }
}
