//! Image grid shape
//!
//! Images are stored flat in Fortran (column-major) order, matching the rest
//! of the crate: index = x + y*nx + z*nx*ny. A 2D shape is handled as a 3D
//! shape with nz = 1.

use std::fmt;

use crate::error::{NufftError, Result};

/// Shape of a 2D or 3D image grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageShape {
    dims: [usize; 3],
    ndim: usize,
}

impl ImageShape {
    /// 2D grid of nx * ny pixels
    pub fn new_2d(nx: usize, ny: usize) -> Result<Self> {
        Self::from_dims(&[nx, ny])
    }

    /// 3D grid of nx * ny * nz voxels
    pub fn new_3d(nx: usize, ny: usize, nz: usize) -> Result<Self> {
        Self::from_dims(&[nx, ny, nz])
    }

    /// Build from a slice of 2 or 3 dimensions
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        if dims.len() != 2 && dims.len() != 3 {
            return Err(NufftError::Configuration(format!(
                "image shape must be 2D or 3D, got {}D",
                dims.len()
            )));
        }
        if dims.iter().any(|&d| d == 0) {
            return Err(NufftError::Configuration(format!(
                "image dimensions must be non-zero, got {:?}",
                dims
            )));
        }
        let mut padded = [1usize; 3];
        padded[..dims.len()].copy_from_slice(dims);
        Ok(Self { dims: padded, ndim: dims.len() })
    }

    /// Number of spatial dimensions (2 or 3)
    #[inline]
    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// The configured dimensions
    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims[..self.ndim]
    }

    /// Dimensions padded to three axes (nz = 1 in 2D)
    #[inline]
    pub fn dims3(&self) -> [usize; 3] {
        self.dims
    }

    /// Total number of pixels/voxels
    #[inline]
    pub fn n_voxels(&self) -> usize {
        self.dims.iter().product()
    }
}

impl fmt::Display for ImageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.dims().iter().map(|d| d.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// Index into a 3D array stored in Fortran order (column-major)
/// index = x + y*nx + z*nx*ny
#[inline(always)]
pub fn idx3d(i: usize, j: usize, k: usize, nx: usize, ny: usize) -> usize {
    i + j * nx + k * nx * ny
}
