//! # Local reference builder module
//!
//! The reference builder turns the global centerline and the
//! latency-projected pose into a car-frame polynomial describing the
//! upcoming path, together with the two tracking errors the optimiser works
//! on (cross-track error and heading error).
//!
//! Processing per cycle:
//!  1. Find the centerline point closest to the projected pose.
//!  2. Extract a window of samples around it, including a few samples behind
//!     the vehicle (this stabilises the fit at the low-x end). The
//!     centerline is treated as cyclic, so window indexing wraps.
//!  3. Rotate the window into the car frame.
//!  4. Repair degenerate x-spacing: once car-frame x stops progressing the
//!     remaining samples would make the fit ill-conditioned, so the tail is
//!     replaced by a linear extrapolation and the degradation is reported as
//!     `fraction_steps_ok`.
//!  5. Fit the polynomial and evaluate the tracking errors at the origin.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::Params;
pub use state::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Sub-sampling stride into the centerline when building the fit window.
pub const STEP_POLY: usize = 3;

/// Number of centerline samples behind the closest point included in the
/// window.
pub const NUM_STEPS_BACK: usize = 2;

/// Minimum car-frame x spacing tolerated between consecutive window samples.
///
/// Units: meters
pub const X_DELTA_MIN_M: f64 = 0.05;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Attenuate the reference speed based on how much of the fit window
/// survived stabilisation.
///
/// `alpha` of 1 keeps the configured reference speed regardless of
/// degradation, 0 scales it fully by `fraction_steps_ok`.
pub fn attenuate_ref_v(ref_v_ms: f64, alpha: f64, fraction_steps_ok: f64) -> f64 {
    alpha * ref_v_ms + (1.0 - alpha) * (fraction_steps_ok * ref_v_ms)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_attenuate_ref_v() {
        // Alpha 1 ignores the degradation
        assert_eq!(attenuate_ref_v(2.0, 1.0, 0.5), 2.0);

        // Alpha 0 scales fully by the fraction
        assert_eq!(attenuate_ref_v(2.0, 0.0, 0.5), 1.0);

        // The attenuated speed never exceeds the configured reference when
        // the window is degraded
        for alpha in [0.0, 0.3, 0.7, 1.0] {
            for fraction in [0.1, 0.5, 0.9, 1.0] {
                let v = attenuate_ref_v(2.0, alpha, fraction);
                assert!(v <= 2.0);
                assert!(v > 0.0);
            }
        }
    }
}
