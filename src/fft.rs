//! FFT wrapper for the oversampled NUFFT grid using rustfft
//!
//! Provides unnormalized 2D/3D transforms on Fortran-order (column-major)
//! data. Axes of length 1 are skipped, so a 2D grid is a 3D grid with nz = 1.

use num_complex::Complex64;
use rustfft::{Fft, FftDirection, FftPlanner};
use std::sync::Arc;

use crate::shape::idx3d;

/// FFT workspace that caches plans and scratch buffers for reuse
pub struct FftGridWorkspace {
    nx: usize,
    ny: usize,
    nz: usize,
    // Forward FFT plans
    fft_x: Arc<dyn Fft<f64>>,
    fft_y: Arc<dyn Fft<f64>>,
    fft_z: Arc<dyn Fft<f64>>,
    // Inverse FFT plans
    ifft_x: Arc<dyn Fft<f64>>,
    ifft_y: Arc<dyn Fft<f64>>,
    ifft_z: Arc<dyn Fft<f64>>,
    // Scratch buffers
    scratch: Vec<Complex64>,
    buffer_y: Vec<Complex64>,
    buffer_z: Vec<Complex64>,
}

impl FftGridWorkspace {
    /// Create a new FFT workspace for the given grid dimensions
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        let mut planner = FftPlanner::new();

        let fft_x = planner.plan_fft(nx, FftDirection::Forward);
        let fft_y = planner.plan_fft(ny, FftDirection::Forward);
        let fft_z = planner.plan_fft(nz, FftDirection::Forward);

        let ifft_x = planner.plan_fft(nx, FftDirection::Inverse);
        let ifft_y = planner.plan_fft(ny, FftDirection::Inverse);
        let ifft_z = planner.plan_fft(nz, FftDirection::Inverse);

        let scratch_len = [&fft_x, &fft_y, &fft_z, &ifft_x, &ifft_y, &ifft_z]
            .iter()
            .map(|p| p.get_inplace_scratch_len())
            .max()
            .unwrap_or(0);

        Self {
            nx, ny, nz,
            fft_x, fft_y, fft_z,
            ifft_x, ifft_y, ifft_z,
            scratch: vec![Complex64::new(0.0, 0.0); scratch_len],
            buffer_y: vec![Complex64::new(0.0, 0.0); ny],
            buffer_z: vec![Complex64::new(0.0, 0.0); nz],
        }
    }

    /// In-place forward transform, kernel exp(-2πi kn/N), no normalization
    pub fn forward(&mut self, data: &mut [Complex64]) {
        let plans = [self.fft_x.clone(), self.fft_y.clone(), self.fft_z.clone()];
        self.transform(data, &plans);
    }

    /// In-place inverse transform, kernel exp(+2πi kn/N), no normalization
    pub fn backward(&mut self, data: &mut [Complex64]) {
        let plans = [self.ifft_x.clone(), self.ifft_y.clone(), self.ifft_z.clone()];
        self.transform(data, &plans);
    }

    fn transform(&mut self, data: &mut [Complex64], plans: &[Arc<dyn Fft<f64>>; 3]) {
        let (nx, ny, nz) = (self.nx, self.ny, self.nz);
        debug_assert_eq!(data.len(), nx * ny * nz);

        // Transform along x-axis (stride 1, rows are contiguous)
        if nx > 1 {
            for k in 0..nz {
                for j in 0..ny {
                    let start = idx3d(0, j, k, nx, ny);
                    plans[0].process_with_scratch(&mut data[start..start + nx], &mut self.scratch);
                }
            }
        }

        // Transform along y-axis (stride nx)
        if ny > 1 {
            for k in 0..nz {
                for i in 0..nx {
                    for j in 0..ny {
                        self.buffer_y[j] = data[idx3d(i, j, k, nx, ny)];
                    }
                    plans[1].process_with_scratch(&mut self.buffer_y, &mut self.scratch);
                    for j in 0..ny {
                        data[idx3d(i, j, k, nx, ny)] = self.buffer_y[j];
                    }
                }
            }
        }

        // Transform along z-axis (stride nx*ny)
        if nz > 1 {
            for j in 0..ny {
                for i in 0..nx {
                    for k in 0..nz {
                        self.buffer_z[k] = data[idx3d(i, j, k, nx, ny)];
                    }
                    plans[2].process_with_scratch(&mut self.buffer_z, &mut self.scratch);
                    for k in 0..nz {
                        data[idx3d(i, j, k, nx, ny)] = self.buffer_z[k];
                    }
                }
            }
        }
    }
}
