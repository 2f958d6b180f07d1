//! Raw NUFFT transform plans
//!
//! A plan is built once for a fixed set of sample locations and image shape
//! and then executes:
//! - type-1 (adjoint, non-uniform -> uniform): `f_k = Σ_j c_j exp(+i k·x_j)`
//! - type-2 (forward, uniform -> non-uniform): `c_j = Σ_k f_k exp(-i k·x_j)`
//!
//! Modes are ordered k_d = -N_d/2 .. (N_d-1)/2 along each axis, with images
//! in Fortran order. Both directions accept a batch of up to `n_trans`
//! transforms stored back to back.
//!
//! Available backends:
//! - `spread`: gridding NUFFT with an exponential-of-semicircle kernel
//! - `direct`: exact non-uniform DFT (feature `direct`)

pub mod spread;
#[cfg(feature = "direct")]
pub mod direct;

use std::fmt;

use num_complex::Complex64;

use crate::error::{NufftError, Result};
use crate::samples::Samples;
use crate::shape::ImageShape;

pub use spread::SpreadPlan;
#[cfg(feature = "direct")]
pub use direct::DirectPlan;

/// Largest fine grid a plan is allowed to allocate (in complex values)
pub const MAX_GRID_ALLOC: usize = 1 << 31;

// Plan status codes (0 = success)
pub const STATUS_EPS_TOO_SMALL: i32 = 1;
pub const STATUS_MAX_ALLOC: i32 = 2;
pub const STATUS_BATCH_TOO_LARGE: i32 = 5;
pub const STATUS_UPSAMPFAC_TOO_SMALL: i32 = 7;

/// Turn a non-zero backend status into an error
pub fn check_status(status: i32, backend: &'static str, message: impl Into<String>) -> Result<()> {
    if status != 0 {
        return Err(NufftError::Backend { backend, status, message: message.into() });
    }
    Ok(())
}

/// Options shared by all plans
#[derive(Clone, Debug, PartialEq)]
pub struct PlanOptions {
    /// Requested relative precision (default 1e-6)
    pub eps: f64,
    /// Oversampling factor of the fine grid (default 2.0)
    pub upsampfac: f64,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self { eps: 1e-6, upsampfac: 2.0 }
    }
}

/// Interface of a raw NUFFT plan
///
/// Buffers hold `b` transforms back to back, `1 <= b <= n_trans`: images are
/// `b * n_voxels` long and coefficients `b * n_samples` long.
pub trait RawTransformPlan: Send {
    /// Name of the backend that built the plan
    fn backend(&self) -> Backend;

    /// Number of sample locations
    fn n_samples(&self) -> usize;

    /// Uniform grid shape
    fn shape(&self) -> &ImageShape;

    /// Maximum number of transforms per execution
    fn n_trans(&self) -> usize;

    /// Precision tolerance of the plan
    fn eps(&self) -> f64;

    /// Bytes held by the plan's internal buffers
    fn memory_bytes(&self) -> usize {
        0
    }

    /// Type-1 (adjoint): coefficients -> image
    fn execute_type1(&mut self, coeffs: &[Complex64], image: &mut [Complex64]) -> Result<()>;

    /// Type-2 (forward): image -> coefficients
    fn execute_type2(&mut self, image: &[Complex64], coeffs: &mut [Complex64]) -> Result<()>;
}

/// Number of transforms stored in a pair of buffers
///
/// Checks that the buffers are consistent with each other and with the plan.
pub(crate) fn batch_count(
    plan: &dyn RawTransformPlan,
    n_coeffs: usize,
    n_image: usize,
) -> Result<usize> {
    let n_samples = plan.n_samples();
    let n_voxels = plan.shape().n_voxels();
    if n_image == 0 || n_image % n_voxels != 0 {
        return Err(NufftError::shape("image buffer", n_voxels, n_image));
    }
    let batch = n_image / n_voxels;
    if n_coeffs != batch * n_samples {
        return Err(NufftError::shape("coefficient buffer", batch * n_samples, n_coeffs));
    }
    if batch > plan.n_trans() {
        check_status(
            STATUS_BATCH_TOO_LARGE,
            plan.backend().name(),
            format!("batch of {} transforms exceeds plan size {}", batch, plan.n_trans()),
        )?;
    }
    Ok(batch)
}

/// Available NUFFT backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Backend {
    /// Gridding NUFFT (kernel spreading + oversampled FFT)
    #[default]
    Spread,
    /// Exact non-uniform DFT
    Direct,
}

impl Backend {
    /// All backends known to the crate, compiled in or not
    pub const ALL: [Backend; 2] = [Backend::Spread, Backend::Direct];

    /// Backend name used by [`Backend::from_name`]
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Spread => "spread",
            Backend::Direct => "direct",
        }
    }

    /// Whether the backend was compiled into this build
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Spread => true,
            Backend::Direct => cfg!(feature = "direct"),
        }
    }

    /// Look up an available backend by name
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.name() == name && b.is_available())
            .ok_or_else(|| NufftError::BackendUnavailable(name.to_string()))
    }

    /// Build a plan for the given geometry
    pub fn plan(
        &self,
        samples: &Samples,
        shape: &ImageShape,
        n_trans: usize,
        options: &PlanOptions,
    ) -> Result<Box<dyn RawTransformPlan>> {
        if !self.is_available() {
            return Err(NufftError::BackendUnavailable(self.name().to_string()));
        }
        if samples.ndim() != shape.ndim() {
            return Err(NufftError::Configuration(format!(
                "samples are {}D but the image shape {} is {}D",
                samples.ndim(),
                shape,
                shape.ndim()
            )));
        }
        if n_trans == 0 {
            return Err(NufftError::Configuration("plan needs at least one transform".into()));
        }
        match self {
            Backend::Spread => Ok(Box::new(SpreadPlan::new(samples, shape, n_trans, options)?)),
            #[cfg(feature = "direct")]
            Backend::Direct => Ok(Box::new(DirectPlan::new(samples, shape, n_trans)?)),
            #[cfg(not(feature = "direct"))]
            Backend::Direct => Err(NufftError::BackendUnavailable(self.name().to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Names of the known backends
///
/// # Arguments
/// * `available_only` - Only list backends compiled into this build
pub fn list_backends(available_only: bool) -> Vec<&'static str> {
    Backend::ALL
        .iter()
        .filter(|b| !available_only || b.is_available())
        .map(|b| b.name())
        .collect()
}

/// Whether a backend with this name is available
pub fn check_backend(name: &str) -> bool {
    Backend::from_name(name).is_ok()
}
