//! # Channel Messages
//!
//! This module defines the typed payloads carried on each input and output
//! channel of the controller. All payloads are serialised as JSON on the
//! wire.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Go-signal code which engages the go flag.
pub const GO_CODE: u16 = 2309;

/// Go-signal code which triggers an emergency stop.
pub const STOP_CODE: u16 = 0;

/// Topics used on the command publisher socket.
pub mod topic {
    /// Steering servo position demand, a scalar in [0, 1].
    pub const SERVO_POSITION: &str = "servo_position";

    /// Motor speed demand in platform-scaled RPM.
    pub const MOTOR_SPEED: &str = "motor_speed";

    /// Diagnostic: trajectory predicted by the optimiser (map frame).
    pub const MPC_PREDICTED: &str = "mpc/predicted";

    /// Diagnostic: centerline window used for the polynomial fit (map frame).
    pub const MPC_WINDOW: &str = "mpc/window";

    /// Diagnostic: sampled fit polynomial (map frame).
    pub const MPC_POLY: &str = "mpc/poly";
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The track centerline, an ordered polyline in the map frame.
///
/// The polyline is treated as cyclic by the controller, i.e. indexing wraps
/// modulo the number of points.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Centerline {
    /// The centerline points in the map frame.
    pub points_m: Vec<[f64; 2]>,
}

/// A localisation pose sample.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct PoseMsg {
    /// Position in the map frame.
    pub position_m: [f64; 3],

    /// Attitude as a unit quaternion in (x, y, z, w) order.
    pub attitude_q: [f64; 4],
}

/// A longitudinal speed sample from odometry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct Odom {
    /// Longitudinal speed in meters per second.
    pub speed_ms: f64,
}

/// A go/stop signal from the master control.
///
/// Only [`GO_CODE`] and [`STOP_CODE`] are meaningful, all other codes are
/// ignored by the controller.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct GoSignal {
    pub code: u16,
}

/// A polyline in the map frame, published on the diagnostic topics.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Polyline {
    pub points_m: Vec<[f64; 2]>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Centerline {
    /// Get the number of points in the centerline.
    pub fn num_points(&self) -> usize {
        self.points_m.len()
    }
}
