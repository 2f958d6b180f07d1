//! Fourier operator for non-Cartesian MRI
//!
//! Wraps a raw NUFFT plan into the forward model of an acquisition:
//! - `op`: image -> k-space (type-2)
//! - `adj_op`: k-space -> image (density compensation + type-1)
//! - `data_consistency`: gradient of 0.5 ||F x - y||² in the density
//!   weighted norm, fused per coil
//!
//! Three acquisition modes are supported: single coil, multi-coil with
//! SENSE coil combination (one image, `n_coils` k-spaces) and multi-coil
//! calibrationless (one image and one k-space per coil).
//!
//! Layouts: images are Fortran order, multi-coil buffers are coil-major
//! (coil 0 first), k-space holds `n_samples` coefficients per coil.

use std::fmt;

use num_complex::Complex64;
use tracing::{debug, trace};

use crate::backend::{Backend, PlanOptions, RawTransformPlan};
use crate::density::{pipe, Density, DensityWeights};
use crate::error::{ensure_len, NufftError, Result};
use crate::samples::Samples;
use crate::sense::SensitivityMaps;
use crate::shape::ImageShape;
use crate::utils::{format_bytes, sub_assign};

// ============================================================================
// Configuration
// ============================================================================

/// Parameters for building a [`FourierOperator`]
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// Number of receiver coils (>= 1)
    pub n_coils: usize,
    /// Density compensation
    pub density: Density,
    /// Coil sensitivity maps, enables SENSE combination
    pub smaps: Option<SensitivityMaps>,
    /// Raw transform implementation
    pub backend: Backend,
    /// Plan precision and oversampling
    pub plan: PlanOptions,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            n_coils: 1,
            density: Density::None,
            smaps: None,
            backend: Backend::default(),
            plan: PlanOptions::default(),
        }
    }
}

/// Acquisition mode of an operator
#[derive(Clone, Debug, PartialEq)]
pub enum Mode {
    /// One coil, one image
    Mono,
    /// Several coils combined into one image with sensitivity maps
    Sense(SensitivityMaps),
    /// Several coils, one independent image per coil
    Calibrationless { n_coils: usize },
}

impl Mode {
    fn from_config(n_coils: usize, smaps: Option<SensitivityMaps>, shape: &ImageShape) -> Result<Self> {
        match smaps {
            Some(smaps) => {
                if smaps.n_coils() != n_coils {
                    let expected = n_coils * shape.n_voxels();
                    let actual = smaps.n_coils() * smaps.n_voxels();
                    return Err(NufftError::shape("sensitivity maps", expected, actual));
                }
                if smaps.shape() != shape {
                    return Err(NufftError::GridMismatch {
                        what: "sensitivity maps",
                        expected: *shape,
                        actual: *smaps.shape(),
                    });
                }
                Ok(Mode::Sense(smaps))
            }
            None if n_coils == 1 => Ok(Mode::Mono),
            None => Ok(Mode::Calibrationless { n_coils }),
        }
    }

    /// Number of images the operator works on
    pub fn n_images(&self) -> usize {
        match self {
            Mode::Mono | Mode::Sense(_) => 1,
            Mode::Calibrationless { n_coils } => *n_coils,
        }
    }

    /// Whether coil images are combined with sensitivity maps
    pub fn uses_sense(&self) -> bool {
        matches!(self, Mode::Sense(_))
    }
}

// ============================================================================
// Operator
// ============================================================================

/// NUFFT based Fourier operator
///
/// Every transform reuses scratch buffers held by the operator, hence the
/// `&mut self` receivers.
pub struct FourierOperator {
    shape: ImageShape,
    samples: Samples,
    n_coils: usize,
    mode: Mode,
    density: Option<DensityWeights>,
    plan: Box<dyn RawTransformPlan>,
    rescale_factor: Option<f64>,
    /// Coil images, SENSE only
    coil_buf: Vec<Complex64>,
    /// Compensated k-space of every coil
    ksp_buf: Vec<Complex64>,
}

impl FourierOperator {
    /// Build an operator for a trajectory and image shape
    ///
    /// Samples outside [-π, π] are rescaled with a warning. If the density
    /// is `Density::Estimate`, weights are computed before the plan used by
    /// the operator is created.
    ///
    /// # Errors
    /// - `InvalidCoilCount` if `config.n_coils == 0`
    /// - `DensityLengthMismatch` for explicit weights of the wrong length
    /// - `ShapeMismatch` for sensitivity maps not shaped `(n_coils, *shape)`
    /// - `NumericHazard` if density estimation breaks down
    /// - backend errors from plan creation
    pub fn new(mut samples: Samples, shape: ImageShape, config: OperatorConfig) -> Result<Self> {
        let OperatorConfig { n_coils, density, smaps, backend, plan } = config;
        if n_coils < 1 {
            return Err(NufftError::InvalidCoilCount(n_coils));
        }
        if samples.ndim() != shape.ndim() {
            return Err(NufftError::Configuration(format!(
                "samples are {}D but the image shape {} is {}D",
                samples.ndim(),
                shape,
                shape.ndim()
            )));
        }
        let rescale_factor = samples.rescale_to_pi();
        let mode = Mode::from_config(n_coils, smaps, &shape)?;

        let n_samples = samples.len();
        let density = match density {
            Density::None => None,
            Density::Weights(weights) => Some(DensityWeights::new(weights, n_samples)?),
            Density::Estimate { n_iter } => {
                let weights = pipe(&samples, &shape, n_iter, backend, &plan)?;
                Some(DensityWeights::new(weights, n_samples)?)
            }
        };

        let raw_plan = backend.plan(&samples, &shape, n_coils, &plan)?;

        let n_voxels = shape.n_voxels();
        let coil_len = match &mode {
            Mode::Sense(_) => n_coils * n_voxels,
            _ => 0,
        };
        let op = Self {
            shape,
            samples,
            n_coils,
            mode,
            density,
            plan: raw_plan,
            rescale_factor,
            coil_buf: vec![Complex64::new(0.0, 0.0); coil_len],
            ksp_buf: vec![Complex64::new(0.0, 0.0); n_coils * n_samples],
        };
        debug!(
            shape = %op.shape,
            n_coils,
            n_samples,
            sense = op.mode.uses_sense(),
            density = op.density.is_some(),
            backend = %backend,
            "fourier operator created"
        );
        Ok(op)
    }

    /// Estimate density compensation weights for a trajectory
    ///
    /// Fixed-point iteration on a single-coil operator built with the same
    /// geometry; see `density::pipe`.
    pub fn estimate_density(
        samples: &Samples,
        shape: &ImageShape,
        n_iter: usize,
        backend: Backend,
        options: &PlanOptions,
    ) -> Result<Vec<f64>> {
        pipe(samples, shape, n_iter, backend, options)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Number of k-space samples per coil
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Number of receiver coils
    #[inline]
    pub fn n_coils(&self) -> usize {
        self.n_coils
    }

    /// Image grid shape
    #[inline]
    pub fn shape(&self) -> &ImageShape {
        &self.shape
    }

    /// Acquisition mode
    #[inline]
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Density compensation weights, if any
    pub fn density(&self) -> Option<&[f64]> {
        self.density.as_ref().map(|d| d.as_slice())
    }

    /// Whether the adjoint applies density compensation
    pub fn uses_density(&self) -> bool {
        self.density.is_some()
    }

    /// Whether the operator runs in SENSE mode
    pub fn uses_sense(&self) -> bool {
        self.mode.uses_sense()
    }

    /// Sample locations, after rescaling to [-π, π]
    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    /// Backend that built the raw plan
    pub fn backend(&self) -> Backend {
        self.plan.backend()
    }

    /// Whether the samples were rescaled into [-π, π] at construction
    pub fn samples_rescaled(&self) -> bool {
        self.rescale_factor.is_some()
    }

    /// Precision tolerance of the underlying plan
    pub fn eps(&self) -> f64 {
        self.plan.eps()
    }

    /// Length of an image buffer (all coils in calibrationless mode)
    pub fn image_len(&self) -> usize {
        self.mode.n_images() * self.shape.n_voxels()
    }

    /// Length of a k-space buffer (all coils)
    pub fn kspace_len(&self) -> usize {
        self.n_coils * self.samples.len()
    }

    // ------------------------------------------------------------------------
    // Forward
    // ------------------------------------------------------------------------

    /// Non-Cartesian k-space of an image
    pub fn op(&mut self, image: &[Complex64]) -> Result<Vec<Complex64>> {
        let mut kspace = vec![Complex64::new(0.0, 0.0); self.kspace_len()];
        self.op_into(image, &mut kspace)?;
        Ok(kspace)
    }

    /// Forward transform into a caller-provided buffer
    pub fn op_into(&mut self, image: &[Complex64], kspace: &mut [Complex64]) -> Result<()> {
        ensure_len("image", self.image_len(), image.len())?;
        ensure_len("k-space", self.kspace_len(), kspace.len())?;
        let n_voxels = self.shape.n_voxels();
        let n_samples = self.samples.len();

        match &self.mode {
            Mode::Mono => self.plan.execute_type2(image, kspace),
            Mode::Sense(smaps) => {
                smaps.expand(image, &mut self.coil_buf)?;
                self.plan.execute_type2(&self.coil_buf, kspace)
            }
            Mode::Calibrationless { .. } => {
                for (l, (img, ksp)) in image
                    .chunks_exact(n_voxels)
                    .zip(kspace.chunks_exact_mut(n_samples))
                    .enumerate()
                {
                    trace!(coil = l, "forward");
                    self.plan.execute_type2(img, ksp)?;
                }
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Adjoint
    // ------------------------------------------------------------------------

    /// Image of non-Cartesian k-space, density compensated
    pub fn adj_op(&mut self, kspace: &[Complex64]) -> Result<Vec<Complex64>> {
        let mut image = vec![Complex64::new(0.0, 0.0); self.image_len()];
        self.adj_op_into(kspace, &mut image)?;
        Ok(image)
    }

    /// Adjoint transform into a caller-provided buffer
    ///
    /// The caller's k-space is never modified; density compensation works
    /// on an internal copy.
    pub fn adj_op_into(&mut self, kspace: &[Complex64], image: &mut [Complex64]) -> Result<()> {
        ensure_len("k-space", self.kspace_len(), kspace.len())?;
        ensure_len("image", self.image_len(), image.len())?;
        let n_voxels = self.shape.n_voxels();
        let n_samples = self.samples.len();

        let coeffs: &[Complex64] = match &self.density {
            Some(density) => {
                self.ksp_buf.copy_from_slice(kspace);
                density.apply(&mut self.ksp_buf);
                &self.ksp_buf
            }
            None => kspace,
        };

        match &self.mode {
            Mode::Mono => self.plan.execute_type1(coeffs, image),
            Mode::Sense(smaps) => {
                self.plan.execute_type1(coeffs, &mut self.coil_buf)?;
                smaps.combine(&self.coil_buf, image)
            }
            Mode::Calibrationless { .. } => {
                for (l, (ksp, img)) in coeffs
                    .chunks_exact(n_samples)
                    .zip(image.chunks_exact_mut(n_voxels))
                    .enumerate()
                {
                    trace!(coil = l, "adjoint");
                    self.plan.execute_type1(ksp, img)?;
                }
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Data consistency
    // ------------------------------------------------------------------------

    /// Gradient of the data consistency term: adj_op(op(image) - observed)
    pub fn data_consistency(&mut self, image: &[Complex64], observed: &[Complex64]) -> Result<Vec<Complex64>> {
        let mut out = vec![Complex64::new(0.0, 0.0); self.image_len()];
        self.data_consistency_into(image, observed, &mut out)?;
        Ok(out)
    }

    /// Data consistency into a caller-provided buffer
    ///
    /// Works coil by coil so that only one coil's image and k-space are
    /// held in scratch at a time.
    pub fn data_consistency_into(
        &mut self,
        image: &[Complex64],
        observed: &[Complex64],
        out: &mut [Complex64],
    ) -> Result<()> {
        ensure_len("image", self.image_len(), image.len())?;
        ensure_len("observed k-space", self.kspace_len(), observed.len())?;
        ensure_len("output image", self.image_len(), out.len())?;
        let n_voxels = self.shape.n_voxels();
        let n_samples = self.samples.len();
        let ksp = &mut self.ksp_buf[..n_samples];

        match &self.mode {
            Mode::Mono => {
                self.plan.execute_type2(image, ksp)?;
                sub_assign(ksp, observed);
                if let Some(density) = &self.density {
                    density.apply(ksp);
                }
                self.plan.execute_type1(ksp, out)
            }
            Mode::Sense(smaps) => {
                let coil_img = &mut self.coil_buf[..n_voxels];
                out.fill(Complex64::new(0.0, 0.0));
                for (l, obs) in observed.chunks_exact(n_samples).enumerate() {
                    trace!(coil = l, "data consistency");
                    smaps.expand_coil(l, image, coil_img);
                    self.plan.execute_type2(coil_img, ksp)?;
                    sub_assign(ksp, obs);
                    if let Some(density) = &self.density {
                        density.apply(ksp);
                    }
                    self.plan.execute_type1(ksp, coil_img)?;
                    smaps.accumulate_coil(l, coil_img, out);
                }
                Ok(())
            }
            Mode::Calibrationless { .. } => {
                for (l, ((img, obs), dst)) in image
                    .chunks_exact(n_voxels)
                    .zip(observed.chunks_exact(n_samples))
                    .zip(out.chunks_exact_mut(n_voxels))
                    .enumerate()
                {
                    trace!(coil = l, "data consistency");
                    self.plan.execute_type2(img, ksp)?;
                    sub_assign(ksp, obs);
                    if let Some(density) = &self.density {
                        density.apply(ksp);
                    }
                    self.plan.execute_type1(ksp, dst)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for FourierOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FourierOperator")
            .field("shape", &self.shape)
            .field("n_coils", &self.n_coils)
            .field("n_samples", &self.samples.len())
            .field("mode", &self.mode)
            .field("uses_density", &self.density.is_some())
            .field("backend", &self.plan.backend())
            .finish()
    }
}

impl fmt::Display for FourierOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FourierOperator(")?;
        writeln!(f, "  backend: {}", self.plan.backend())?;
        writeln!(f, "  n_coils: {}", self.n_coils)?;
        writeln!(f, "  shape: {}", self.shape)?;
        writeln!(f, "  n_samples: {}", self.samples.len())?;
        writeln!(f, "  uses_density: {}", self.density.is_some())?;
        writeln!(f, "  uses_sense: {}", self.mode.uses_sense())?;
        writeln!(f, "  eps: {:.0e}", self.plan.eps())?;
        writeln!(f, "  memory: {}", format_bytes(self.plan.memory_bytes()))?;
        write!(f, ")")
    }
}

/// Build an operator with a backend chosen by name
///
/// Overrides `config.backend`.
///
/// # Errors
/// `BackendUnavailable` if no available backend has this name, otherwise
/// as [`FourierOperator::new`].
pub fn get_operator(
    backend_name: &str,
    samples: Samples,
    shape: ImageShape,
    mut config: OperatorConfig,
) -> Result<FourierOperator> {
    config.backend = Backend::from_name(backend_name)?;
    FourierOperator::new(samples, shape, config)
}
