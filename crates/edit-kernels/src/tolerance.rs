//! Relative+absolute tolerance for comparing floating-point costs.
//!
//! Co-optimality checks (`backtrace_stochastic`, `backtrace_matrix`) need to
//! decide whether a successor's cost equals the cell minimum. Exact equality
//! is unsafe once costs have accumulated through O(mn) additions, so every
//! comparison goes through [`approx_eq`] instead; [`approx_le`] is exposed for
//! callers that only need the one-sided form.

/// Relative tolerance factor applied on top of the absolute floor.
const EPS: f64 = 1e-9;

/// Returns `true` if `a <= b` up to the tolerance `EPS * max(1, |a|, |b|)`.
///
/// This is the "successor achieves the minimum" test used throughout the
/// SED/ADP/TED/UTED backtrace code: `a` is a candidate successor cost, `b`
/// is the cell's recorded minimum.
#[must_use]
pub fn approx_le(a: f64, b: f64) -> bool {
    a <= b + EPS * 1.0_f64.max(a.abs()).max(b.abs())
}

/// Returns `true` if `a` and `b` are equal up to the same tolerance.
#[must_use]
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPS * 1.0_f64.max(a.abs()).max(b.abs())
}

#[cfg(test)]
mod tests {
    use super::{approx_eq, approx_le};

    #[test]
    fn exact_values_compare_equal() {
        assert!(approx_eq(0.0, 0.0));
        assert!(approx_eq(3.5, 3.5));
        assert!(approx_le(3.5, 3.5));
    }

    #[test]
    fn drift_within_tolerance_is_accepted() {
        let a = 0.1 + 0.2;
        let b = 0.3;
        assert!(approx_eq(a, b));
        assert!(approx_le(a, b));
        assert!(approx_le(b, a));
    }

    #[test]
    fn drift_beyond_tolerance_is_rejected() {
        assert!(!approx_eq(1.0, 1.1));
        assert!(!approx_le(1.1, 1.0));
    }
}
