//! MPC controller parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::params::{CtrlParams, PlatformParams};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the MPC controller, assembled from the command-line tuning
/// surface and the platform constants.
#[derive(Debug, Clone)]
pub struct Params {
    /// Number of steps in the optimisation horizon
    pub steps_ahead: usize,

    /// Duration of one horizon step
    ///
    /// Units: seconds
    pub dt_s: f64,

    /// Distance from the centre of mass to the front axle
    ///
    /// Units: meters
    pub wheelbase_m: f64,

    /// Steering angle bound (symmetric)
    ///
    /// Units: radians
    pub steer_max_rad: f64,

    /// Minimum commandable acceleration
    ///
    /// Units: meters/second^2
    pub accel_min_mss: f64,

    /// Maximum commandable acceleration
    ///
    /// Units: meters/second^2
    pub accel_max_mss: f64,

    // Cost weights
    pub cte_coeff: f64,
    pub epsi_coeff: f64,
    pub speed_coeff: f64,
    pub steer_coeff: f64,
    pub consec_steer_coeff: f64,
    pub consec_speed_coeff: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Assemble the controller parameters.
    pub fn new(ctrl: &CtrlParams, platform: &PlatformParams) -> Self {
        Self {
            steps_ahead: ctrl.steps_ahead,
            dt_s: ctrl.dt_s,
            wheelbase_m: platform.wheelbase_m,
            steer_max_rad: platform.steer_max_rad,
            accel_min_mss: platform.accel_min_mss,
            accel_max_mss: platform.accel_max_mss,
            cte_coeff: ctrl.cte_coeff,
            epsi_coeff: ctrl.epsi_coeff,
            speed_coeff: ctrl.speed_coeff,
            steer_coeff: ctrl.steer_coeff,
            consec_steer_coeff: ctrl.consec_steer_coeff,
            consec_speed_coeff: ctrl.consec_speed_coeff,
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            steps_ahead: 10,
            dt_s: 0.1,
            wheelbase_m: 0.325,
            steer_max_rad: 0.436,
            accel_min_mss: -4.0,
            accel_max_mss: 4.0,
            cte_coeff: 100.0,
            epsi_coeff: 100.0,
            speed_coeff: 1.0,
            steer_coeff: 1.0,
            consec_steer_coeff: 10.0,
            consec_speed_coeff: 1.0,
        }
    }
}
