//! Utility maths functions
//!
//! Polynomial least-squares fitting and evaluation. Coefficients are always
//! stored lowest power first, i.e. `coeffs[k]` multiplies `x^k`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{DMatrix, DVector};
use num_traits::Float;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur in the maths functions.
#[derive(Debug, Error)]
pub enum MathsError {
    #[error("Not enough points for a degree {degree} fit, got {got}")]
    NotEnoughPoints { degree: usize, got: usize },

    #[error("Mismatched sample lengths: {0} x values against {1} y values")]
    LengthMismatch(usize, usize),

    #[error("The fit system is singular or rank-deficient")]
    SingularSystem,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Fit a degree `degree` polynomial to the given samples in the least-squares
/// sense, returning the coefficients lowest power first.
///
/// The fit solves the normal equations of the Vandermonde system with a
/// Cholesky factorisation. The x values must be distinct enough for the
/// system to be full rank, otherwise `MathsError::SingularSystem` is
/// returned.
pub fn polyfit(xs: &[f64], ys: &[f64], degree: usize) -> Result<Vec<f64>, MathsError> {
    if xs.len() != ys.len() {
        return Err(MathsError::LengthMismatch(xs.len(), ys.len()));
    }
    if xs.len() < degree + 1 {
        return Err(MathsError::NotEnoughPoints {
            degree,
            got: xs.len(),
        });
    }

    let num_coeffs = degree + 1;

    // Build the Vandermonde matrix, one row per sample
    let mut vander = DMatrix::zeros(xs.len(), num_coeffs);
    for (i, &x) in xs.iter().enumerate() {
        let mut pow = 1.0;
        for j in 0..num_coeffs {
            vander[(i, j)] = pow;
            pow *= x;
        }
    }

    // Normal equations: (A^T A) c = A^T y
    let yvec = DVector::from_column_slice(ys);
    let ata = vander.transpose() * &vander;
    let aty = vander.transpose() * yvec;

    let coeffs = ata
        .cholesky()
        .ok_or(MathsError::SingularSystem)?
        .solve(&aty);

    if coeffs.iter().any(|c| !c.is_finite()) {
        return Err(MathsError::SingularSystem);
    }

    Ok(coeffs.iter().copied().collect())
}

/// Evaluate a polynomial at `x` using Horner's scheme.
pub fn polyeval<T>(coeffs: &[T], x: T) -> T
where
    T: Float,
{
    coeffs.iter().rev().fold(T::zero(), |acc, &c| acc * x + c)
}

/// Evaluate the first derivative of a polynomial at `x`.
pub fn polyderiv_at<T>(coeffs: &[T], x: T) -> T
where
    T: Float,
{
    let mut res = T::zero();

    for (k, &c) in coeffs.iter().enumerate().skip(1) {
        res = res + T::from(k).unwrap() * c * x.powi(k as i32 - 1);
    }

    res
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_polyfit_line() {
        // y = 2x - 1 should be recovered exactly by a degree 1 fit
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x - 1.0).collect();

        let coeffs = polyfit(&xs, &ys, 1).unwrap();

        assert_eq!(coeffs.len(), 2);
        assert!((coeffs[0] + 1.0).abs() < EPS);
        assert!((coeffs[1] - 2.0).abs() < EPS);
    }

    #[test]
    fn test_polyfit_parabola() {
        // y = 0.5x^2 - x + 3, overdetermined by 6 samples
        let xs = [-2.0, -1.0, 0.0, 1.0, 2.0, 3.0];
        let ys: Vec<f64> = xs.iter().map(|x| 0.5 * x * x - x + 3.0).collect();

        let coeffs = polyfit(&xs, &ys, 2).unwrap();

        assert!((coeffs[0] - 3.0).abs() < EPS);
        assert!((coeffs[1] + 1.0).abs() < EPS);
        assert!((coeffs[2] - 0.5).abs() < EPS);
    }

    #[test]
    fn test_polyfit_singular() {
        // All x values identical gives a rank-1 system for degree > 0
        let xs = [1.0, 1.0, 1.0, 1.0];
        let ys = [0.0, 1.0, 2.0, 3.0];

        assert!(matches!(
            polyfit(&xs, &ys, 2),
            Err(MathsError::SingularSystem)
        ));
    }

    #[test]
    fn test_polyfit_bad_inputs() {
        assert!(matches!(
            polyfit(&[0.0, 1.0], &[0.0, 1.0, 2.0], 1),
            Err(MathsError::LengthMismatch(2, 3))
        ));
        assert!(matches!(
            polyfit(&[0.0, 1.0], &[0.0, 1.0], 2),
            Err(MathsError::NotEnoughPoints { degree: 2, got: 2 })
        ));
    }

    #[test]
    fn test_polyeval() {
        // p(x) = 1 + 2x + 3x^2
        let coeffs = [1.0, 2.0, 3.0];

        assert!((polyeval(&coeffs, 0.0) - 1.0).abs() < EPS);
        assert!((polyeval(&coeffs, 1.0) - 6.0).abs() < EPS);
        assert!((polyeval(&coeffs, -2.0) - 9.0).abs() < EPS);
    }

    #[test]
    fn test_polyderiv_at() {
        // p(x) = 1 + 2x + 3x^2, p'(x) = 2 + 6x
        let coeffs = [1.0, 2.0, 3.0];

        assert!((polyderiv_at(&coeffs, 0.0) - 2.0).abs() < EPS);
        assert!((polyderiv_at(&coeffs, 2.0) - 14.0).abs() < EPS);

        // Constant polynomial has zero derivative
        assert_eq!(polyderiv_at(&[5.0], 3.0), 0.0);
    }
}
