//! Numerically safe maps between raw-stat space and model space
//!
//! OBP is modeled on the logit scale and SLG on the log scale. All forward
//! transforms clamp their input so edge-case historical seasons (a 0% or
//! 100% OBP) stay finite instead of failing a request.

/// Clamp floor/ceiling distance for logit and log inputs
pub const EPS: f64 = 1e-6;

/// Log-odds of a proportion, clamped to [EPS, 1 - EPS]
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(EPS, 1.0 - EPS);
    (p / (1.0 - p)).ln()
}

/// Inverse of `logit`; always in (0, 1)
pub fn inv_logit(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Natural log with the input floored at EPS
pub fn safe_log(x: f64) -> f64 {
    x.max(EPS).ln()
}

/// Plain exponential; the domain is bounded upstream
pub fn safe_exp(x: f64) -> f64 {
    x.exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logit_roundtrip() {
        for p in [0.01, 0.25, 0.35, 0.5, 0.75, 0.99] {
            let back = inv_logit(logit(p));
            assert!((back - p).abs() < 1e-9, "roundtrip failed for {}: {}", p, back);
        }
    }

    #[test]
    fn test_logit_clamps_at_boundaries() {
        assert!(logit(0.0).is_finite());
        assert!(logit(1.0).is_finite());
        assert!(logit(-0.5).is_finite());
        assert_eq!(logit(0.0), logit(EPS));
        assert_eq!(logit(1.0), logit(1.0 - EPS));
    }

    #[test]
    fn test_inv_logit_range() {
        for x in [-50.0, -1.0, 0.0, 1.0, 50.0] {
            let p = inv_logit(x);
            assert!(p > 0.0 && p < 1.0, "inv_logit({}) = {} out of (0,1)", x, p);
        }
        assert!((inv_logit(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_safe_log_guards_nonpositive() {
        assert!(safe_log(0.0).is_finite());
        assert!(safe_log(-1.0).is_finite());
        assert_eq!(safe_log(0.0), EPS.ln());
        assert!((safe_log(0.45) - 0.45f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_safe_exp_inverts_safe_log() {
        for x in [0.1, 0.45, 1.0, 1.9] {
            assert!((safe_exp(safe_log(x)) - x).abs() < 1e-9);
        }
    }
}
