use crate::OmsiError;

/// Scalar type of every model value and solver entry.
pub type Real = f64;

/// Pass `value` through when it is finite.
///
/// A NaN or infinity becomes [`OmsiError::NonFinite`], which callers report
/// as a recoverable warning.
pub fn check_finite(value: Real, what: &'static str) -> Result<Real, OmsiError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(OmsiError::NonFinite { what, value })
    }
}

/// True when a residual norm is acceptable. NaN is never accepted.
pub fn residual_accepted(norm: Real, tol: Real) -> bool {
    norm <= tol
}

/// Euclidean norm of a plain slice.
pub fn norm2(values: &[Real]) -> Real {
    values.iter().map(|v| v * v).sum::<Real>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_finite_rejects_nan_and_infinity() {
        assert_eq!(check_finite(2.5, "x").unwrap(), 2.5);
        for bad in [Real::NAN, Real::INFINITY, Real::NEG_INFINITY] {
            let err = check_finite(bad, "residual").unwrap_err();
            assert!(matches!(err, OmsiError::NonFinite { what: "residual", .. }));
        }
    }

    #[test]
    fn residual_acceptance() {
        assert!(residual_accepted(1e-9, 1e-8));
        assert!(residual_accepted(1e-8, 1e-8));
        assert!(!residual_accepted(1e-7, 1e-8));
        assert!(!residual_accepted(Real::NAN, 1e-8));
    }

    #[test]
    fn norm2_of_pythagorean_triple() {
        assert!((norm2(&[3.0, 4.0]) - 5.0).abs() < 1e-15);
        assert_eq!(norm2(&[]), 0.0);
    }
}
