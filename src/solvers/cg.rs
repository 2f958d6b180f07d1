//! Conjugate gradient
//!
//! Solves A x = b for a Hermitian positive semi-definite A given as a
//! closure. Used to reconstruct images from non-Cartesian k-space through
//! the normal equations F^H D F x = F^H D y of a [`FourierOperator`].
//!
//! Reference:
//! Hestenes, M.R., Stiefel, E. (1952). "Methods of conjugate gradients for
//! solving linear systems." Journal of Research of the National Bureau of
//! Standards, 49(6):409-436.

use num_complex::Complex64;
use tracing::debug;

use crate::error::Result;
use crate::operator::FourierOperator;
use crate::utils::{axpy, inner_product, norm_squared, xpby};

/// Conjugate gradient solver
///
/// # Arguments
/// * `normal_op` - Closure computing A*p into its second argument
/// * `rhs` - Right-hand side b
/// * `tol` - Relative residual tolerance ||r|| / ||b||
/// * `max_iter` - Maximum iterations
///
/// # Returns
/// Solution vector x, starting from x = 0
pub fn cg_solve<F>(mut normal_op: F, rhs: &[Complex64], tol: f64, max_iter: usize) -> Result<Vec<Complex64>>
where
    F: FnMut(&[Complex64], &mut [Complex64]) -> Result<()>,
{
    let n = rhs.len();
    let mut x = vec![Complex64::new(0.0, 0.0); n];

    let b_norm = norm_squared(rhs).sqrt();
    if b_norm < 1e-30 {
        return Ok(x);
    }

    // r = b - A*0, p = r
    let mut r = rhs.to_vec();
    let mut p = r.clone();
    let mut ap = vec![Complex64::new(0.0, 0.0); n];
    let mut rsold = norm_squared(&r);

    for iter in 0..max_iter {
        normal_op(&p, &mut ap)?;

        let pap = inner_product(&ap, &p).re;
        if pap.abs() < 1e-30 {
            break;
        }
        let alpha = Complex64::new(rsold / pap, 0.0);

        axpy(&mut x, alpha, &p);
        axpy(&mut r, -alpha, &ap);

        let rsnew = norm_squared(&r);
        let residual = rsnew.sqrt() / b_norm;
        if residual < tol {
            debug!(iterations = iter + 1, residual, "cg converged");
            break;
        }

        xpby(&mut p, &r, Complex64::new(rsnew / rsold, 0.0));
        rsold = rsnew;
    }

    Ok(x)
}

/// Least-squares image reconstruction from k-space
///
/// Runs CG on F^H D F x = F^H D y, using `data_consistency(x, 0)` as the
/// normal operator and `adj_op(y)` as the right-hand side.
///
/// # Arguments
/// * `operator` - Fourier operator of the acquisition
/// * `kspace` - Observed k-space, all coils
/// * `tol` - Relative residual tolerance
/// * `max_iter` - Maximum CG iterations
pub fn reconstruct_cg(
    operator: &mut FourierOperator,
    kspace: &[Complex64],
    tol: f64,
    max_iter: usize,
) -> Result<Vec<Complex64>> {
    let rhs = operator.adj_op(kspace)?;
    let zeros = vec![Complex64::new(0.0, 0.0); operator.kspace_len()];
    cg_solve(
        |p, ap| operator.data_consistency_into(p, &zeros, ap),
        &rhs,
        tol,
        max_iter,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cg_diagonal_system() {
        let diag = [1.0, 2.0, 4.0, 8.0];
        let b: Vec<Complex64> = vec![
            Complex64::new(1.0, 0.0),
            Complex64::new(0.0, 2.0),
            Complex64::new(-4.0, 4.0),
            Complex64::new(8.0, 0.0),
        ];
        let x = cg_solve(
            |p, ap| {
                for ((o, &v), &d) in ap.iter_mut().zip(p.iter()).zip(diag.iter()) {
                    *o = v * d;
                }
                Ok(())
            },
            &b,
            1e-12,
            20,
        )
        .unwrap();

        for i in 0..4 {
            let expected = b[i] / diag[i];
            assert_relative_eq!(x[i].re, expected.re, epsilon = 1e-9);
            assert_relative_eq!(x[i].im, expected.im, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_cg_hermitian_system() {
        // A = [[2, i], [-i, 2]]
        let a = [
            [Complex64::new(2.0, 0.0), Complex64::new(0.0, 1.0)],
            [Complex64::new(0.0, -1.0), Complex64::new(2.0, 0.0)],
        ];
        let b = [Complex64::new(1.0, 0.0), Complex64::new(0.0, 1.0)];
        let x = cg_solve(
            |p, ap| {
                for i in 0..2 {
                    ap[i] = a[i][0] * p[0] + a[i][1] * p[1];
                }
                Ok(())
            },
            &b,
            1e-12,
            10,
        )
        .unwrap();

        for i in 0..2 {
            let ax = a[i][0] * x[0] + a[i][1] * x[1];
            assert!((ax - b[i]).norm() < 1e-9, "row {}: residual {}", i, (ax - b[i]).norm());
        }
    }

    #[test]
    fn test_cg_zero_rhs() {
        let x = cg_solve(|_, _| Ok(()), &[Complex64::new(0.0, 0.0); 3], 1e-6, 10).unwrap();
        assert!(x.iter().all(|v| v.norm() == 0.0));
    }

    #[test]
    fn test_cg_propagates_operator_errors() {
        let b = [Complex64::new(1.0, 0.0)];
        let result = cg_solve(
            |_, _| Err(crate::error::NufftError::NumericHazard("boom".into())),
            &b,
            1e-6,
            5,
        );
        assert!(result.is_err());
    }
}
