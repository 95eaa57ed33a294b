//! MPC optimisation engine
//!
//! The optimiser works on the control tape only: steering and acceleration
//! for each of the `steps_ahead - 1` control intervals. States are obtained
//! by rolling the kinematic model forward from the initial state, which
//! pins the first step to the measured state and satisfies the dynamics at
//! every step by construction. Control bounds are enforced by projection.
//!
//! Minimisation is a warm-started projected gradient descent with
//! central-difference gradients and a backtracking line search, bounded to
//! [`MAX_ITERATIONS`] per solve.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::DVector;

// Internal
use super::{ModelState, Params};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Hard limit on gradient descent iterations per solve. The solve is
/// synchronous inside the control cycle so it must be strictly bounded.
pub const MAX_ITERATIONS: usize = 100;

/// Step used for the central-difference gradient estimate.
const GRAD_STEP: f64 = 1e-4;

/// Gradient norm below which the solution is considered converged.
const GRAD_NORM_TOL: f64 = 1e-6;

/// Smallest backtracking step before the line search gives up.
const MIN_LINE_STEP: f64 = 1e-10;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The applied controls and predicted trajectory produced by a solve.
#[derive(Debug, Clone, Default)]
pub struct MpcOutput {
    /// First-step steering angle.
    ///
    /// Units: radians, positive turns left
    pub steer_rad: f64,

    /// Speed setpoint, the current speed with the first-step acceleration
    /// integrated on.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Car-frame positions predicted over the rest of the horizon. Used only
    /// for diagnostics.
    pub predicted_m: Vec<[f64; 2]>,
}

/// Statistics about a single solve.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveStats {
    /// Number of gradient iterations performed
    pub iterations: usize,

    /// Final cost value
    pub cost: f64,

    /// True if the solve stopped on the convergence criterion rather than
    /// the iteration limit
    pub converged: bool,
}

/// The optimisation engine, holding the previous control tape for warm
/// starting.
#[derive(Default)]
pub(super) struct Solver {
    prev_tape: Option<DVector<f64>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by the solve.
#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    #[error("The optimiser did not produce a finite solution")]
    NonFinite,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Solver {
    /// Solve the horizon problem for the given initial state, path
    /// polynomial and reference speed.
    pub fn solve(
        &mut self,
        initial: &ModelState,
        coeffs: &[f64],
        ref_v_ms: f64,
        params: &Params,
    ) -> Result<(MpcOutput, SolveStats), SolveError> {
        let num_controls = params.steps_ahead - 1;
        let tape_len = 2 * num_controls;

        // Warm start from the previous solution shifted one step forward,
        // or a zero tape if there is none (or the horizon changed)
        let mut tape = match &self.prev_tape {
            Some(prev) if prev.len() == tape_len => shift_tape(prev, num_controls),
            _ => DVector::zeros(tape_len),
        };
        clamp_tape(&mut tape, num_controls, params);

        let mut cost = rollout_cost(&tape, initial, coeffs, ref_v_ms, params);
        if !cost.is_finite() {
            return Err(SolveError::NonFinite);
        }

        let mut stats = SolveStats::default();

        for _ in 0..MAX_ITERATIONS {
            stats.iterations += 1;

            // Central-difference gradient of the rollout cost
            let mut grad = DVector::zeros(tape_len);
            for i in 0..tape_len {
                let saved = tape[i];

                tape[i] = saved + GRAD_STEP;
                let cost_plus = rollout_cost(&tape, initial, coeffs, ref_v_ms, params);

                tape[i] = saved - GRAD_STEP;
                let cost_minus = rollout_cost(&tape, initial, coeffs, ref_v_ms, params);

                tape[i] = saved;
                grad[i] = (cost_plus - cost_minus) / (2.0 * GRAD_STEP);
            }

            if grad.norm() < GRAD_NORM_TOL {
                stats.converged = true;
                break;
            }

            // Backtracking line search along the negative gradient, with the
            // candidate projected back onto the control bounds
            let mut alpha = 1.0;
            let mut improved = false;

            while alpha >= MIN_LINE_STEP {
                let mut candidate = &tape - alpha * &grad;
                clamp_tape(&mut candidate, num_controls, params);

                let candidate_cost =
                    rollout_cost(&candidate, initial, coeffs, ref_v_ms, params);

                if candidate_cost.is_finite() && candidate_cost < cost {
                    tape = candidate;
                    cost = candidate_cost;
                    improved = true;
                    break;
                }

                alpha *= 0.5;
            }

            // No direction gave an improvement, the projected solution is as
            // good as this scheme will get
            if !improved {
                stats.converged = true;
                break;
            }
        }

        stats.cost = cost;

        trace!(
            "MPC solve: {} iterations, cost {:.3}, converged: {}",
            stats.iterations,
            stats.cost,
            stats.converged
        );

        // Extract the first-step controls
        let steer_rad = tape[0];
        let accel_mss = tape[num_controls];
        let speed_ms = initial.speed_ms + accel_mss * params.dt_s;

        if !steer_rad.is_finite() || !speed_ms.is_finite() {
            return Err(SolveError::NonFinite);
        }

        // Roll the model once more to collect the predicted trajectory
        let predicted_m = predict_trajectory(&tape, initial, coeffs, params);

        // Keep the tape for the next cycle's warm start
        self.prev_tape = Some(tape);

        Ok((
            MpcOutput {
                steer_rad,
                speed_ms,
                predicted_m,
            },
            stats,
        ))
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Evaluate the horizon cost for a control tape.
///
/// The tape layout is `[steer_0..steer_{H-2}, accel_0..accel_{H-2}]`.
fn rollout_cost(
    tape: &DVector<f64>,
    initial: &ModelState,
    coeffs: &[f64],
    ref_v_ms: f64,
    params: &Params,
) -> f64 {
    let num_controls = params.steps_ahead - 1;

    let mut state = *initial;
    let mut cost = 0.0;

    for k in 0..params.steps_ahead {
        // Tracking terms for every state along the horizon
        cost += params.cte_coeff * state.cte_m * state.cte_m
            + params.epsi_coeff * state.epsi_rad * state.epsi_rad
            + params.speed_coeff * (state.speed_ms - ref_v_ms) * (state.speed_ms - ref_v_ms);

        if k < num_controls {
            let steer = tape[k];
            let accel = tape[num_controls + k];

            // Control magnitude terms. The acceleration magnitude weight is
            // fixed at 1.
            cost += params.steer_coeff * steer * steer + accel * accel;

            // Control smoothness terms between consecutive steps
            if k + 1 < num_controls {
                let steer_diff = tape[k + 1] - steer;
                let accel_diff = tape[num_controls + k + 1] - accel;

                cost += params.consec_steer_coeff * steer_diff * steer_diff
                    + params.consec_speed_coeff * accel_diff * accel_diff;
            }

            state = state.step(steer, accel, coeffs, params.dt_s, params.wheelbase_m);
        }
    }

    cost
}

/// Project the tape onto the control box bounds.
fn clamp_tape(tape: &mut DVector<f64>, num_controls: usize, params: &Params) {
    for k in 0..num_controls {
        tape[k] = tape[k].clamp(-params.steer_max_rad, params.steer_max_rad);
        tape[num_controls + k] =
            tape[num_controls + k].clamp(params.accel_min_mss, params.accel_max_mss);
    }
}

/// Shift a tape one control interval forward, repeating the last controls.
fn shift_tape(prev: &DVector<f64>, num_controls: usize) -> DVector<f64> {
    let mut tape = DVector::zeros(2 * num_controls);

    for k in 0..num_controls {
        let src = (k + 1).min(num_controls - 1);
        tape[k] = prev[src];
        tape[num_controls + k] = prev[num_controls + src];
    }

    tape
}

/// Roll the model over the horizon collecting the predicted positions.
fn predict_trajectory(
    tape: &DVector<f64>,
    initial: &ModelState,
    coeffs: &[f64],
    params: &Params,
) -> Vec<[f64; 2]> {
    let num_controls = params.steps_ahead - 1;

    let mut state = *initial;
    let mut predicted = Vec::with_capacity(num_controls);

    for k in 0..num_controls {
        state = state.step(
            tape[k],
            tape[num_controls + k],
            coeffs,
            params.dt_s,
            params.wheelbase_m,
        );
        predicted.push([state.x_m, state.y_m]);
    }

    predicted
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn straight_coeffs() -> Vec<f64> {
        vec![0.0, 0.0, 0.0, 0.0]
    }

    #[test]
    fn test_straight_line_needs_no_steering() {
        let mut solver = Solver::default();
        let params = Params::default();

        let initial = ModelState::initial(0.0, 0.0, 1.0);
        let (out, stats) = solver
            .solve(&initial, &straight_coeffs(), 2.0, &params)
            .unwrap();

        // No lateral or heading error, the cost is symmetric in steering
        assert!(out.steer_rad.abs() < 1e-6);

        // Below the reference speed the first step accelerates
        assert!(out.speed_ms > 1.0);

        assert!(stats.iterations >= 1);
        assert_eq!(out.predicted_m.len(), params.steps_ahead - 1);
    }

    #[test]
    fn test_lateral_offset_steers_toward_the_line() {
        let mut solver = Solver::default();
        let params = Params::default();

        // Path 0.3 m below the vehicle in the car frame
        let initial = ModelState::initial(-0.3, 0.0, 1.0);
        let coeffs = vec![-0.3, 0.0, 0.0, 0.0];

        let (out, _) = solver.solve(&initial, &coeffs, 1.0, &params).unwrap();

        // Steer right (negative) to close the error
        assert!(out.steer_rad < -1e-3);
        assert!(out.steer_rad >= -params.steer_max_rad);
    }

    #[test]
    fn test_heading_offset_is_corrected() {
        let mut solver = Solver::default();
        let params = Params::default();

        // Vehicle yawed 0.2 rad left of the path: the car-frame path slope
        // is -tan(0.2) and the heading error is +0.2
        let slope = -(0.2f64).tan();
        let initial = ModelState::initial(0.0, 0.2, 1.0);
        let coeffs = vec![0.0, slope, 0.0, 0.0];

        let (out, _) = solver.solve(&initial, &coeffs, 1.0, &params).unwrap();

        // Steer right to bring the heading back onto the path
        assert!(out.steer_rad < -1e-3);
    }

    #[test]
    fn test_controls_respect_box_bounds() {
        let mut solver = Solver::default();
        let params = Params::default();

        // Huge lateral error and a huge speed demand drive both controls
        // into their bounds
        let initial = ModelState::initial(-5.0, 0.0, 1.0);
        let coeffs = vec![-5.0, 0.0, 0.0, 0.0];

        let (out, _) = solver.solve(&initial, &coeffs, 100.0, &params).unwrap();

        assert!(out.steer_rad >= -params.steer_max_rad - 1e-12);
        assert!(out.steer_rad <= params.steer_max_rad + 1e-12);

        // Speed setpoint is the current speed plus at most one bounded
        // acceleration step
        assert!(out.speed_ms <= 1.0 + params.accel_max_mss * params.dt_s + 1e-12);
        assert!(out.speed_ms >= 1.0 + params.accel_min_mss * params.dt_s - 1e-12);
    }

    #[test]
    fn test_non_finite_state_fails_the_solve() {
        let mut solver = Solver::default();
        let params = Params::default();

        let initial = ModelState::initial(f64::NAN, 0.0, 1.0);

        assert!(matches!(
            solver.solve(&initial, &straight_coeffs(), 1.0, &params),
            Err(SolveError::NonFinite)
        ));
    }

    #[test]
    fn test_warm_start_tape_is_kept() {
        let mut solver = Solver::default();
        let params = Params::default();

        let initial = ModelState::initial(-0.3, 0.0, 1.0);
        let coeffs = vec![-0.3, 0.0, 0.0, 0.0];

        solver.solve(&initial, &coeffs, 1.0, &params).unwrap();

        let tape = solver.prev_tape.as_ref().unwrap();
        assert_eq!(tape.len(), 2 * (params.steps_ahead - 1));

        // A second solve from the warm start still succeeds
        let (out, _) = solver.solve(&initial, &coeffs, 1.0, &params).unwrap();
        assert!(out.steer_rad < 0.0);
    }
}
