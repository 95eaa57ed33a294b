//! # MPC Executable Parameters
//!
//! This module provides the controller tuning surface (taken from the
//! command line so runs can be swept without editing files), plus the network
//! and platform parameter files.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use serde::Deserialize;
use structopt::StructOpt;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Controller tuning parameters.
///
/// All arguments are positional and required. An argument count mismatch or
/// an unparseable value causes the process to exit with code 1.
#[derive(Debug, Clone, StructOpt)]
#[structopt(name = "mpc_exec", about = "MPC path-tracking controller")]
pub struct CtrlParams {
    /// Number of steps in the optimisation horizon
    pub steps_ahead: usize,

    /// Duration of one horizon step in seconds
    pub dt_s: f64,

    /// Reference longitudinal speed in meters per second
    pub ref_v_ms: f64,

    /// Reference speed smoothing factor, in [0, 1]. 1 disables the
    /// degradation-based attenuation entirely.
    pub ref_v_alpha: f64,

    /// Actuation latency to compensate for, in seconds
    pub latency_s: f64,

    /// Cost weight on the cross-track error
    pub cte_coeff: f64,

    /// Cost weight on the heading error
    pub epsi_coeff: f64,

    /// Cost weight on the speed error
    pub speed_coeff: f64,

    /// Cost weight on the steering magnitude
    pub steer_coeff: f64,

    /// Cost weight on consecutive steering differences
    pub consec_steer_coeff: f64,

    /// Cost weight on consecutive acceleration differences
    pub consec_speed_coeff: f64,

    /// Degree of the path-fit polynomial
    pub poly_degree: usize,

    /// Number of centerline samples used for the polynomial fit
    pub num_steps_poly: usize,

    /// Enable the diagnostic polyline channels ("true" or "false")
    #[structopt(parse(try_from_str))]
    pub debug: bool,
}

/// Network endpoints for the five controller channels.
#[derive(Debug, Deserialize)]
pub struct NetParams {
    /// Endpoint of the centerline publisher
    pub centerline_endpoint: String,

    /// Endpoint of the localisation pose publisher
    pub pose_endpoint: String,

    /// Endpoint of the odometry publisher
    pub odom_endpoint: String,

    /// Endpoint of the go-signal publisher
    pub go_signal_endpoint: String,

    /// Endpoint the command publisher binds to
    pub cmd_endpoint: String,
}

/// Fixed platform constants for the vehicle.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformParams {
    /// Distance from the centre of mass to the front axle.
    ///
    /// Units: meters
    pub wheelbase_m: f64,

    /// The radius of the driven wheels.
    ///
    /// Units: meters
    pub wheel_radius_m: f64,

    /// Neutral position of the steering servo, in normalised servo units.
    pub servo_centre: f64,

    /// Maximum steering angle magnitude.
    ///
    /// Units: radians
    pub steer_max_rad: f64,

    /// Minimum commandable acceleration (most negative value).
    ///
    /// Units: meters/second^2
    pub accel_min_mss: f64,

    /// Maximum commandable acceleration.
    ///
    /// Units: meters/second^2
    pub accel_max_mss: f64,

    /// Empirical gain between wheel RPM and the value the motor controller
    /// expects. The origin of this factor is unidentified, so it is kept
    /// configurable.
    pub rpm_gain: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised by parameter validation.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("steps_ahead must be at least 2, got {0}")]
    BadStepsAhead(usize),

    #[error("dt must be positive, got {0}")]
    BadDt(f64),

    #[error("ref_v must be positive, got {0}")]
    BadRefV(f64),

    #[error("ref_v_alpha must be between 0.0 and 1.0 (inclusive), got {0}")]
    BadRefVAlpha(f64),

    #[error("latency must be non-negative, got {0}")]
    BadLatency(f64),

    #[error("the {name} cost coefficient must be non-negative, got {value}")]
    BadCostCoeff { name: &'static str, value: f64 },

    #[error("poly_degree must be at least 1, got {0}")]
    BadPolyDegree(usize),

    #[error("num_steps_poly must be at least poly_degree + 2 ({0}), got {1}")]
    BadNumStepsPoly(usize, usize),

    #[error("wheelbase must be positive, got {0}")]
    BadWheelbase(f64),

    #[error("wheel radius must be positive, got {0}")]
    BadWheelRadius(f64),

    #[error("servo centre must be between 0.0 and 1.0, got {0}")]
    BadServoCentre(f64),

    #[error("steer limit must be positive, got {0}")]
    BadSteerLimit(f64),

    #[error("acceleration bounds must satisfy min < max, got [{0}, {1}]")]
    BadAccelBounds(f64, f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CtrlParams {
    /// Validate the controller parameters against their allowed ranges.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.steps_ahead < 2 {
            return Err(ParamsError::BadStepsAhead(self.steps_ahead));
        }
        if !(self.dt_s > 0.0) {
            return Err(ParamsError::BadDt(self.dt_s));
        }
        if !(self.ref_v_ms > 0.0) {
            return Err(ParamsError::BadRefV(self.ref_v_ms));
        }
        if !(0.0..=1.0).contains(&self.ref_v_alpha) {
            return Err(ParamsError::BadRefVAlpha(self.ref_v_alpha));
        }
        if !(self.latency_s >= 0.0) {
            return Err(ParamsError::BadLatency(self.latency_s));
        }

        for (name, value) in [
            ("cte", self.cte_coeff),
            ("epsi", self.epsi_coeff),
            ("speed", self.speed_coeff),
            ("steer", self.steer_coeff),
            ("consec_steer", self.consec_steer_coeff),
            ("consec_speed", self.consec_speed_coeff),
        ] {
            if !(value >= 0.0) {
                return Err(ParamsError::BadCostCoeff { name, value });
            }
        }

        if self.poly_degree < 1 {
            return Err(ParamsError::BadPolyDegree(self.poly_degree));
        }
        if self.num_steps_poly < self.poly_degree + 2 {
            return Err(ParamsError::BadNumStepsPoly(
                self.poly_degree + 2,
                self.num_steps_poly,
            ));
        }

        // Latency is valid but suspiciously large, it should be in seconds
        if self.latency_s > 1.0 {
            warn!(
                "Latency of {} s is greater than 1 s, is it really in seconds?",
                self.latency_s
            );
        }

        Ok(())
    }
}

impl PlatformParams {
    /// Validate the platform parameters.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.wheelbase_m > 0.0) {
            return Err(ParamsError::BadWheelbase(self.wheelbase_m));
        }
        if !(self.wheel_radius_m > 0.0) {
            return Err(ParamsError::BadWheelRadius(self.wheel_radius_m));
        }
        if !(0.0..=1.0).contains(&self.servo_centre) {
            return Err(ParamsError::BadServoCentre(self.servo_centre));
        }
        if !(self.steer_max_rad > 0.0) {
            return Err(ParamsError::BadSteerLimit(self.steer_max_rad));
        }
        if !(self.accel_min_mss < self.accel_max_mss) {
            return Err(ParamsError::BadAccelBounds(
                self.accel_min_mss,
                self.accel_max_mss,
            ));
        }

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn nominal_ctrl_params() -> CtrlParams {
        CtrlParams {
            steps_ahead: 10,
            dt_s: 0.1,
            ref_v_ms: 2.0,
            ref_v_alpha: 1.0,
            latency_s: 0.0,
            cte_coeff: 100.0,
            epsi_coeff: 100.0,
            speed_coeff: 1.0,
            steer_coeff: 1.0,
            consec_steer_coeff: 10.0,
            consec_speed_coeff: 1.0,
            poly_degree: 3,
            num_steps_poly: 20,
            debug: false,
        }
    }

    fn nominal_platform_params() -> PlatformParams {
        PlatformParams {
            wheelbase_m: 0.325,
            wheel_radius_m: 0.05,
            servo_centre: 0.5,
            steer_max_rad: 0.436,
            accel_min_mss: -4.0,
            accel_max_mss: 4.0,
            rpm_gain: 10.0,
        }
    }

    #[test]
    fn test_nominal_params_valid() {
        assert!(nominal_ctrl_params().validate().is_ok());
        assert!(nominal_platform_params().validate().is_ok());
    }

    #[test]
    fn test_ctrl_param_ranges() {
        let mut p = nominal_ctrl_params();
        p.steps_ahead = 1;
        assert!(matches!(p.validate(), Err(ParamsError::BadStepsAhead(1))));

        let mut p = nominal_ctrl_params();
        p.dt_s = 0.0;
        assert!(matches!(p.validate(), Err(ParamsError::BadDt(_))));

        let mut p = nominal_ctrl_params();
        p.ref_v_alpha = 1.2;
        assert!(matches!(p.validate(), Err(ParamsError::BadRefVAlpha(_))));

        let mut p = nominal_ctrl_params();
        p.latency_s = -0.1;
        assert!(matches!(p.validate(), Err(ParamsError::BadLatency(_))));

        let mut p = nominal_ctrl_params();
        p.epsi_coeff = -1.0;
        assert!(matches!(
            p.validate(),
            Err(ParamsError::BadCostCoeff { name: "epsi", .. })
        ));

        let mut p = nominal_ctrl_params();
        p.poly_degree = 0;
        assert!(matches!(p.validate(), Err(ParamsError::BadPolyDegree(0))));

        // num_steps_poly must leave room for degree + 2 samples
        let mut p = nominal_ctrl_params();
        p.num_steps_poly = p.poly_degree + 1;
        assert!(matches!(p.validate(), Err(ParamsError::BadNumStepsPoly(_, _))));
    }

    #[test]
    fn test_platform_param_ranges() {
        let mut p = nominal_platform_params();
        p.servo_centre = 1.5;
        assert!(matches!(p.validate(), Err(ParamsError::BadServoCentre(_))));

        let mut p = nominal_platform_params();
        p.accel_min_mss = 5.0;
        assert!(matches!(p.validate(), Err(ParamsError::BadAccelBounds(_, _))));
    }

    #[test]
    fn test_cli_argument_count() {
        // 13 positionals missing one must fail to parse
        let args = [
            "mpc_exec", "10", "0.1", "2.0", "1.0", "0.0", "100", "100", "1", "1", "10", "1", "3",
        ];
        assert!(CtrlParams::from_iter_safe(args).is_err());

        // Full argument set parses
        let args = [
            "mpc_exec", "10", "0.1", "2.0", "1.0", "0.0", "100", "100", "1", "1", "10", "1", "3",
            "20", "false",
        ];
        let p = CtrlParams::from_iter_safe(args).unwrap();
        assert_eq!(p.steps_ahead, 10);
        assert_eq!(p.num_steps_poly, 20);
        assert!(!p.debug);

        // Debug must be literally "true" or "false"
        let args = [
            "mpc_exec", "10", "0.1", "2.0", "1.0", "0.0", "100", "100", "1", "1", "10", "1", "3",
            "20", "yes",
        ];
        assert!(CtrlParams::from_iter_safe(args).is_err());
    }
}
