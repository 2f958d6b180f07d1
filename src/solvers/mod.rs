//! Iterative solvers
//!
//! - `cg`: conjugate gradient on the normal equations of a Fourier operator

pub mod cg;

pub use cg::{cg_solve, reconstruct_cg};
