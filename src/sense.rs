//! SENSE coil combination
//!
//! With coil sensitivity maps S_l the multi-coil forward model of a single
//! image x is y_l = F(S_l x). Its adjoint combines the per-coil images as
//! x = Σ_l conj(S_l) x_l.
//!
//! Reference:
//! Pruessmann, K.P., Weiger, M., Scheidegger, M.B., Boesiger, P. (1999).
//! "SENSE: Sensitivity encoding for fast MRI." Magnetic Resonance in
//! Medicine, 42(5):952-962.

use std::sync::Arc;

use num_complex::Complex64;

use crate::error::{ensure_len, NufftError, Result};
use crate::shape::ImageShape;
use crate::utils::{conj_mul_accumulate, mul_into};

/// Coil sensitivity maps, coil-major `(n_coils, *shape)`
///
/// The data is reference counted: cloning the maps or handing them to an
/// operator does not copy the array.
#[derive(Clone, Debug, PartialEq)]
pub struct SensitivityMaps {
    data: Arc<[Complex64]>,
    n_coils: usize,
    shape: ImageShape,
    n_voxels: usize,
}

impl SensitivityMaps {
    /// Wrap sensitivity maps for `n_coils` coils over `shape`
    ///
    /// # Errors
    /// `InvalidCoilCount` for zero coils, `ShapeMismatch` if the data is not
    /// `n_coils * shape.n_voxels()` long.
    pub fn new(data: impl Into<Arc<[Complex64]>>, n_coils: usize, shape: &ImageShape) -> Result<Self> {
        if n_coils == 0 {
            return Err(NufftError::InvalidCoilCount(n_coils));
        }
        let data = data.into();
        let n_voxels = shape.n_voxels();
        ensure_len("sensitivity maps", n_coils * n_voxels, data.len())?;
        Ok(Self { data, n_coils, shape: *shape, n_voxels })
    }

    /// Number of coils
    #[inline]
    pub fn n_coils(&self) -> usize {
        self.n_coils
    }

    /// Image grid of each coil map
    #[inline]
    pub fn shape(&self) -> &ImageShape {
        &self.shape
    }

    /// Voxels per coil map
    #[inline]
    pub fn n_voxels(&self) -> usize {
        self.n_voxels
    }

    /// Map of coil `l`
    #[inline]
    pub fn coil(&self, l: usize) -> &[Complex64] {
        &self.data[l * self.n_voxels..(l + 1) * self.n_voxels]
    }

    /// Shared handle to the full array
    pub fn data(&self) -> &Arc<[Complex64]> {
        &self.data
    }

    /// coil_l = image * S_l for a single coil
    pub fn expand_coil(&self, l: usize, image: &[Complex64], coil_image: &mut [Complex64]) {
        mul_into(coil_image, image, self.coil(l));
    }

    /// coil_l = image * S_l for every coil
    ///
    /// `coil_images` holds the coil images back to back.
    pub fn expand(&self, image: &[Complex64], coil_images: &mut [Complex64]) -> Result<()> {
        ensure_len("image", self.n_voxels, image.len())?;
        ensure_len("coil images", self.n_coils * self.n_voxels, coil_images.len())?;
        for (l, out) in coil_images.chunks_exact_mut(self.n_voxels).enumerate() {
            self.expand_coil(l, image, out);
        }
        Ok(())
    }

    /// image += conj(S_l) * coil_image
    pub fn accumulate_coil(&self, l: usize, coil_image: &[Complex64], image: &mut [Complex64]) {
        conj_mul_accumulate(image, coil_image, self.coil(l));
    }

    /// image = Σ_l conj(S_l) * coil_l
    pub fn combine(&self, coil_images: &[Complex64], image: &mut [Complex64]) -> Result<()> {
        ensure_len("coil images", self.n_coils * self.n_voxels, coil_images.len())?;
        ensure_len("image", self.n_voxels, image.len())?;
        image.fill(Complex64::new(0.0, 0.0));
        for (l, coil_image) in coil_images.chunks_exact(self.n_voxels).enumerate() {
            self.accumulate_coil(l, coil_image, image);
        }
        Ok(())
    }
}
