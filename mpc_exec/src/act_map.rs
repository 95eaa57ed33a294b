//! # Actuator mapping
//!
//! Converts the optimiser outputs (steering angle in radians, speed setpoint
//! in meters per second) into the demands the vehicle hardware expects: a
//! normalised servo position in [0, 1] and a platform-scaled wheel RPM.
//! Demands outside the actuator ranges are clipped, flagged, and still
//! published.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use serde::Serialize;
use std::f64::consts::PI;

use crate::params::PlatformParams;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Demands for the two vehicle actuators.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ActuatorDems {
    /// Steering servo position, in [0, 1]
    pub servo_position: f64,

    /// Motor speed demand in platform-scaled RPM, non-negative
    pub motor_speed_rpm: f64,
}

/// Status report for the actuator mapping.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// True if the servo demand was clipped to its range
    pub servo_clipped: bool,

    /// True if the motor demand was clipped to zero
    pub rpm_clipped: bool,
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Map the optimiser outputs onto the actuator ranges.
pub fn map_actuators(
    steer_rad: f64,
    speed_ms: f64,
    platform: &PlatformParams,
) -> (ActuatorDems, StatusReport) {
    let mut report = StatusReport::default();

    // Positive steering angles turn left, which is towards servo zero
    let mut servo_position = platform.servo_centre - steer_rad;

    if servo_position < 0.0 {
        warn!(
            "Servo demand {:.3} is below 0, clipping it to 0",
            servo_position
        );
        servo_position = 0.0;
        report.servo_clipped = true;
    } else if servo_position > 1.0 {
        warn!(
            "Servo demand {:.3} is greater than 1, clipping it to 1",
            servo_position
        );
        servo_position = 1.0;
        report.servo_clipped = true;
    }

    // Wheel revolutions per minute, scaled by the empirical platform gain
    let mut motor_speed_rpm =
        speed_ms / (2.0 * PI * platform.wheel_radius_m) * 60.0 * platform.rpm_gain;

    if motor_speed_rpm < 0.0 {
        warn!(
            "Motor demand {:.1} RPM is negative, clipping it to 0",
            motor_speed_rpm
        );
        motor_speed_rpm = 0.0;
        report.rpm_clipped = true;
    }

    (
        ActuatorDems {
            servo_position,
            motor_speed_rpm,
        },
        report,
    )
}

/// The safe-stop demand pair: servo centred, motor stopped.
pub fn safe_stop(platform: &PlatformParams) -> ActuatorDems {
    ActuatorDems {
        servo_position: platform.servo_centre,
        motor_speed_rpm: 0.0,
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn platform() -> PlatformParams {
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
    fn test_zero_steer_maps_to_centre() {
        let (dems, rpt) = map_actuators(0.0, 1.0, &platform());

        assert_eq!(dems.servo_position, 0.5);
        assert!(!rpt.servo_clipped);
        assert!(!rpt.rpm_clipped);
    }

    #[test]
    fn test_negative_steer_moves_above_centre() {
        let (dems, _) = map_actuators(-0.2, 1.0, &platform());
        assert!(dems.servo_position > 0.5);

        let (dems, _) = map_actuators(0.2, 1.0, &platform());
        assert!(dems.servo_position < 0.5);
    }

    #[test]
    fn test_servo_demand_is_clipped() {
        // A steering angle beyond the servo range clips to the limit and
        // raises the flag
        let (dems, rpt) = map_actuators(0.8, 1.0, &platform());
        assert_eq!(dems.servo_position, 0.0);
        assert!(rpt.servo_clipped);

        let (dems, rpt) = map_actuators(-0.8, 1.0, &platform());
        assert_eq!(dems.servo_position, 1.0);
        assert!(rpt.servo_clipped);
    }

    #[test]
    fn test_rpm_mapping() {
        let (dems, rpt) = map_actuators(0.0, 1.0, &platform());

        // 1 m/s on a 0.05 m wheel: 1 / (2 pi 0.05) rev/s * 60 * gain 10
        let expected = 1.0 / (2.0 * PI * 0.05) * 60.0 * 10.0;
        assert!((dems.motor_speed_rpm - expected).abs() < 1e-9);
        assert!(!rpt.rpm_clipped);
    }

    #[test]
    fn test_negative_speed_clips_to_zero_rpm() {
        let (dems, rpt) = map_actuators(0.0, -0.5, &platform());

        assert_eq!(dems.motor_speed_rpm, 0.0);
        assert!(rpt.rpm_clipped);
    }

    #[test]
    fn test_demand_invariants() {
        // For any solver output the published demands stay in range
        let platform = platform();
        for steer in [-1.0, -0.436, -0.1, 0.0, 0.1, 0.436, 1.0] {
            for speed in [-2.0, 0.0, 0.5, 3.0] {
                let (dems, _) = map_actuators(steer, speed, &platform);
                assert!((0.0..=1.0).contains(&dems.servo_position));
                assert!(dems.motor_speed_rpm >= 0.0);
            }
        }
    }

    #[test]
    fn test_safe_stop() {
        let dems = safe_stop(&platform());

        assert_eq!(dems.servo_position, 0.5);
        assert_eq!(dems.motor_speed_rpm, 0.0);
    }
}
