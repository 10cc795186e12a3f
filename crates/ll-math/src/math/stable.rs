//! Numerically stable primitives for log-domain factor arithmetic.
//!
//! Every routine here subtracts the running maximum before exponentiating, so
//! values far outside the `f64` exponent range (e.g. `-1e4` or `+800`) fold
//! without underflowing to zero or overflowing to infinity.

/// Stable log(sum(exp(values))).
///
/// Returns NEG_INFINITY for empty input or all -inf inputs.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = log_max(values);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let mut sum = 0.0;
    for v in values {
        sum += (*v - max).exp();
    }
    max + sum.ln()
}

/// Stable log(exp(a) + exp(b)).
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    if a == f64::INFINITY || b == f64::INFINITY {
        return f64::INFINITY;
    }
    let m = a.max(b);
    let diff = (a - b).abs();
    m + (-diff).exp().ln_1p()
}

/// Maximum of a slice of log values; NEG_INFINITY when empty.
pub fn log_max(values: &[f64]) -> f64 {
    values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
}

/// Convert log weights into a normalized linear distribution.
///
/// Returns `None` when the weights carry no mass (all -inf) or the rescaled
/// sum is not finite, leaving the fallback policy to the caller.
pub fn exp_normalize(log_weights: &[f64]) -> Option<Vec<f64>> {
    let max = log_max(log_weights);
    if !max.is_finite() {
        return None;
    }
    let scaled: Vec<f64> = log_weights.iter().map(|v| (*v - max).exp()).collect();
    let sum: f64 = scaled.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        return None;
    }
    Some(scaled.into_iter().map(|v| v / sum).collect())
}

/// Uniform distribution over `n` states.
pub fn uniform(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    #[test]
    fn log_sum_exp_basic() {
        let v = [0.0, 0.0];
        let out = log_sum_exp(&v);
        assert!(approx_eq(out, 2.0f64.ln(), 1e-12));
    }

    #[test]
    fn log_sum_exp_dominance() {
        let v = [-1000.0, 0.0];
        let out = log_sum_exp(&v);
        assert!(approx_eq(out, 0.0, 1e-12));
    }

    #[test]
    fn log_sum_exp_large_magnitudes() {
        let v = [800.0, 800.0];
        let out = log_sum_exp(&v);
        assert!(approx_eq(out, 800.0 + 2.0f64.ln(), 1e-9));
    }

    #[test]
    fn log_sum_exp_all_neg_inf() {
        let v = [f64::NEG_INFINITY, f64::NEG_INFINITY];
        let out = log_sum_exp(&v);
        assert!(out.is_infinite() && out.is_sign_negative());
    }

    #[test]
    fn log_sum_exp_nan_propagates() {
        let out = log_sum_exp(&[0.0, f64::NAN]);
        assert!(out.is_nan());
    }

    #[test]
    fn log_add_exp_matches_lse() {
        let a = 1.234;
        let b = -0.75;
        let out = log_add_exp(a, b);
        let lse = log_sum_exp(&[a, b]);
        assert!(approx_eq(out, lse, 1e-12));
    }

    #[test]
    fn log_add_exp_infinity_rules() {
        let out = log_add_exp(f64::INFINITY, 1.0);
        assert!(out.is_infinite() && out.is_sign_positive());

        let out2 = log_add_exp(f64::NEG_INFINITY, 2.0);
        assert!(approx_eq(out2, 2.0, 1e-12));
    }

    #[test]
    fn log_max_empty_is_neg_inf() {
        assert_eq!(log_max(&[]), f64::NEG_INFINITY);
        assert_eq!(log_max(&[-3.0, 2.0, 1.0]), 2.0);
    }

    #[test]
    fn exp_normalize_distribution() {
        let probs = exp_normalize(&[0.0, 2.0f64.ln()]).unwrap();
        assert!(approx_eq(probs[0], 1.0 / 3.0, 1e-12));
        assert!(approx_eq(probs[1], 2.0 / 3.0, 1e-12));
    }

    #[test]
    fn exp_normalize_no_mass() {
        assert!(exp_normalize(&[f64::NEG_INFINITY, f64::NEG_INFINITY]).is_none());
        assert!(exp_normalize(&[]).is_none());
    }
}
