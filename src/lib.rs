//! MRI-NUFFT: non-uniform Fourier operators for non-Cartesian MRI
//!
//! This crate provides the forward and adjoint Fourier operators used to
//! reconstruct images from non-Cartesian k-space.
//!
//! # Modules
//! - `operator`: Fourier operator (single coil, SENSE, calibrationless)
//! - `backend`: raw type-1/type-2 NUFFT plans (gridding, direct DFT)
//! - `density`: density compensation (fixed point, cell count, Voronoi)
//! - `sense`: coil sensitivity maps and coil combination
//! - `samples`, `shape`: trajectory and image geometry
//! - `solvers`: iterative reconstruction (CG)
//! - `fft`: uniform FFTs using rustfft
//! - `utils`: complex buffer kernels, formatting
//!
//! # Example
//! ```
//! use mri_nufft::{FourierOperator, ImageShape, OperatorConfig, Samples};
//!
//! let samples = Samples::from_2d(&[[0.0, 0.0], [0.5, -1.0], [2.0, 1.5]]).unwrap();
//! let shape = ImageShape::new_2d(8, 8).unwrap();
//! let mut op = FourierOperator::new(samples, shape, OperatorConfig::default()).unwrap();
//!
//! let image = vec![mri_nufft::Complex64::new(1.0, 0.0); 64];
//! let kspace = op.op(&image).unwrap();
//! let back = op.adj_op(&kspace).unwrap();
//! assert_eq!(back.len(), 64);
//! ```

// Core modules
pub mod error;
pub mod fft;
pub mod samples;
pub mod shape;

// Transform modules
pub mod backend;
pub mod density;
pub mod operator;
pub mod sense;

// Reconstruction
pub mod solvers;
pub mod utils;

pub use num_complex::Complex64;

pub use backend::{check_backend, list_backends, Backend, PlanOptions, RawTransformPlan};
pub use density::{Density, DensityWeights};
pub use error::{ErrorKind, NufftError, Result};
pub use operator::{get_operator, FourierOperator, Mode, OperatorConfig};
pub use samples::{proper_trajectory, Samples, TrajectoryNorm};
pub use sense::SensitivityMaps;
pub use shape::ImageShape;
