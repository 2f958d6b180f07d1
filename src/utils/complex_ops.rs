//! Elementwise operations on complex buffers
//!
//! Small kernels shared by the operator, the coil combination and the
//! solvers. All functions expect equally sized slices.

use num_complex::Complex64;

// ============================================================================
// Elementwise Products
// ============================================================================

/// out[i] = a[i] * b[i]
#[inline]
pub fn mul_into(out: &mut [Complex64], a: &[Complex64], b: &[Complex64]) {
    debug_assert_eq!(out.len(), a.len());
    debug_assert_eq!(a.len(), b.len());
    for ((o, &x), &y) in out.iter_mut().zip(a.iter()).zip(b.iter()) {
        *o = x * y;
    }
}

/// acc[i] += a[i] * conj(b[i])
#[inline]
pub fn conj_mul_accumulate(acc: &mut [Complex64], a: &[Complex64], b: &[Complex64]) {
    debug_assert_eq!(acc.len(), a.len());
    debug_assert_eq!(a.len(), b.len());
    for ((o, &x), &y) in acc.iter_mut().zip(a.iter()).zip(b.iter()) {
        *o += x * y.conj();
    }
}

/// a[i] *= w[i]
#[inline]
pub fn scale_by_real(a: &mut [Complex64], w: &[f64]) {
    debug_assert_eq!(a.len(), w.len());
    for (x, &wi) in a.iter_mut().zip(w.iter()) {
        *x *= wi;
    }
}

// ============================================================================
// Linear Combinations
// ============================================================================

/// a[i] -= b[i]
#[inline]
pub fn sub_assign(a: &mut [Complex64], b: &[Complex64]) {
    debug_assert_eq!(a.len(), b.len());
    for (x, &y) in a.iter_mut().zip(b.iter()) {
        *x -= y;
    }
}

/// a[i] += alpha * b[i] (axpy operation)
#[inline]
pub fn axpy(a: &mut [Complex64], alpha: Complex64, b: &[Complex64]) {
    debug_assert_eq!(a.len(), b.len());
    for (x, &y) in a.iter_mut().zip(b.iter()) {
        *x += alpha * y;
    }
}

/// a[i] = b[i] + beta * a[i]
#[inline]
pub fn xpby(a: &mut [Complex64], b: &[Complex64], beta: Complex64) {
    debug_assert_eq!(a.len(), b.len());
    for (x, &y) in a.iter_mut().zip(b.iter()) {
        *x = y + beta * *x;
    }
}

// ============================================================================
// Reductions
// ============================================================================

/// Hermitian inner product: sum(a[i] * conj(b[i]))
#[inline]
pub fn inner_product(a: &[Complex64], b: &[Complex64]) -> Complex64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(&x, &y)| x * y.conj()).sum()
}

/// Squared L2 norm: sum(|a[i]|^2)
#[inline]
pub fn norm_squared(a: &[Complex64]) -> f64 {
    a.iter().map(|x| x.norm_sqr()).sum()
}
