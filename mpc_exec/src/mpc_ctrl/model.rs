//! Kinematic single-track vehicle model
//!
//! State is expressed in the car frame of the current cycle, so the vehicle
//! always starts a horizon at the origin with zero heading. Positive steering
//! angles turn the vehicle left.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use util::maths::{polyderiv_at, polyeval};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// State of the kinematic model at one horizon step.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelState {
    /// Position along the car-frame x axis
    pub x_m: f64,

    /// Position along the car-frame y axis
    pub y_m: f64,

    /// Heading relative to the car-frame x axis
    pub psi_rad: f64,

    /// Longitudinal speed
    pub speed_ms: f64,

    /// Cross-track error to the path polynomial
    pub cte_m: f64,

    /// Heading error to the path tangent
    pub epsi_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ModelState {
    /// Build the initial horizon state from the current tracking errors and
    /// speed. The vehicle is at the origin of its own frame by construction.
    pub fn initial(cte_m: f64, epsi_rad: f64, speed_ms: f64) -> Self {
        Self {
            x_m: 0.0,
            y_m: 0.0,
            psi_rad: 0.0,
            speed_ms,
            cte_m,
            epsi_rad,
        }
    }

    /// Propagate the state one horizon step under the given controls.
    ///
    /// `coeffs` is the car-frame path polynomial, used to re-evaluate the
    /// tracking errors at the new position.
    pub fn step(
        &self,
        steer_rad: f64,
        accel_mss: f64,
        coeffs: &[f64],
        dt_s: f64,
        wheelbase_m: f64,
    ) -> Self {
        let path_y_m = polyeval(coeffs, self.x_m);
        let path_slope = polyderiv_at(coeffs, self.x_m);

        let yaw_step_rad = self.speed_ms / wheelbase_m * steer_rad * dt_s;

        Self {
            x_m: self.x_m + self.speed_ms * self.psi_rad.cos() * dt_s,
            y_m: self.y_m + self.speed_ms * self.psi_rad.sin() * dt_s,
            psi_rad: self.psi_rad + yaw_step_rad,
            speed_ms: self.speed_ms + accel_mss * dt_s,
            cte_m: (path_y_m - self.y_m) + self.speed_ms * self.epsi_rad.sin() * dt_s,
            epsi_rad: (self.psi_rad - path_slope.atan()) + yaw_step_rad,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const EPS: f64 = 1e-9;
    const WHEELBASE_M: f64 = 0.325;

    #[test]
    fn test_straight_line_propagation() {
        // Driving along a straight path with no controls keeps all errors at
        // zero
        let coeffs = [0.0, 0.0];
        let mut state = ModelState::initial(0.0, 0.0, 1.0);

        for _ in 0..10 {
            state = state.step(0.0, 0.0, &coeffs, 0.1, WHEELBASE_M);
        }

        assert!((state.x_m - 1.0).abs() < EPS);
        assert!(state.y_m.abs() < EPS);
        assert!(state.psi_rad.abs() < EPS);
        assert!((state.speed_ms - 1.0).abs() < EPS);
        assert!(state.cte_m.abs() < EPS);
        assert!(state.epsi_rad.abs() < EPS);
    }

    #[test]
    fn test_positive_steer_turns_left() {
        let coeffs = [0.0, 0.0];
        let state = ModelState::initial(0.0, 0.0, 1.0);

        let next = state.step(0.2, 0.0, &coeffs, 0.1, WHEELBASE_M);

        assert!(next.psi_rad > 0.0);
        assert!((next.psi_rad - 1.0 / WHEELBASE_M * 0.2 * 0.1).abs() < EPS);
    }

    #[test]
    fn test_acceleration_integrates_into_speed() {
        let coeffs = [0.0, 0.0];
        let state = ModelState::initial(0.0, 0.0, 1.0);

        let next = state.step(0.0, 2.0, &coeffs, 0.1, WHEELBASE_M);

        assert!((next.speed_ms - 1.2).abs() < EPS);
    }

    #[test]
    fn test_cte_tracks_path_offset() {
        // Path is a constant 0.5 m above the vehicle
        let coeffs = [0.5, 0.0];
        let state = ModelState::initial(0.5, 0.0, 1.0);

        let next = state.step(0.0, 0.0, &coeffs, 0.1, WHEELBASE_M);

        // Vehicle stays on y = 0 so the error persists
        assert!((next.cte_m - 0.5).abs() < EPS);
    }

    #[test]
    fn test_epsi_tracks_path_slope() {
        // Path climbing at slope 1, vehicle heading straight
        let coeffs = [0.0, 1.0];
        let state = ModelState::initial(0.0, 0.0, 1.0);

        let next = state.step(0.0, 0.0, &coeffs, 0.1, WHEELBASE_M);

        // Heading error is psi - atan(slope) = -pi/4
        assert!((next.epsi_rad + std::f64::consts::FRAC_PI_4).abs() < EPS);
    }
}
