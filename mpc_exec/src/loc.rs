//! # Localisation types
//!
//! This module provides the vehicle pose in the map frame, heading extraction
//! from the localisation quaternion, and the latency projection which
//! estimates where the vehicle will be once the commands computed this cycle
//! actually take effect.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::msg::PoseMsg;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// The current pose (position and attitude in the map frame) of the vehicle.
#[derive(Debug, Copy, Clone, Default)]
pub struct Pose {
    /// The position in the map frame
    pub position_m: [f64; 3],

    /// The attitude in the map frame, as a unit quaternion in (x, y, z, w)
    /// order.
    pub attitude_q: [f64; 4],
}

/// A pose projected forward in time by the actuation latency, with the
/// heading trigonometry cached for the frame transforms.
#[derive(Debug, Copy, Clone)]
pub struct ProjectedPose {
    pub pos_x_m: f64,
    pub pos_y_m: f64,
    pub heading_rad: f64,
    pub sin_heading: f64,
    pub cos_heading: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Pose {
    /// Return the heading (yaw angle to the positive map X axis) of the
    /// vehicle in radians, in the range [-pi, pi].
    pub fn get_heading(&self) -> f64 {
        let [x, y, z, w] = self.attitude_q;

        let siny_cosp = 2.0 * (w * z + x * y);
        let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);

        siny_cosp.atan2(cosy_cosp)
    }

    /// Project this pose forward by `latency_s` seconds.
    ///
    /// The projection assumes the vehicle keeps its current speed (zero-order
    /// hold) and the last applied steering angle for the duration of the
    /// latency, turning with the single-track model's yaw rate
    /// `v * steer / wheelbase`.
    pub fn project_ahead(
        &self,
        latency_s: f64,
        speed_ms: f64,
        steer_last_rad: f64,
        wheelbase_m: f64,
    ) -> ProjectedPose {
        let heading_rad =
            self.get_heading() - latency_s * (speed_ms * steer_last_rad / wheelbase_m);

        let pos_x_m = self.position_m[0] + latency_s * speed_ms * heading_rad.cos();
        let pos_y_m = self.position_m[1] + latency_s * speed_ms * heading_rad.sin();

        ProjectedPose {
            pos_x_m,
            pos_y_m,
            heading_rad,
            sin_heading: heading_rad.sin(),
            cos_heading: heading_rad.cos(),
        }
    }
}

impl From<&PoseMsg> for Pose {
    fn from(msg: &PoseMsg) -> Self {
        Self {
            position_m: msg.position_m,
            attitude_q: msg.attitude_q,
        }
    }
}

impl ProjectedPose {
    /// Transform a map-frame point into the car frame at this pose.
    pub fn map_to_car(&self, point_m: &[f64; 2]) -> [f64; 2] {
        let dx = point_m[0] - self.pos_x_m;
        let dy = point_m[1] - self.pos_y_m;

        [
            dx * self.cos_heading + dy * self.sin_heading,
            -dx * self.sin_heading + dy * self.cos_heading,
        ]
    }

    /// Transform car-frame points back into the map frame, the inverse of
    /// [`ProjectedPose::map_to_car`]. Used to publish diagnostics in the map
    /// frame.
    pub fn car_to_map(&self, points_m: &[[f64; 2]]) -> Vec<[f64; 2]> {
        points_m
            .iter()
            .map(|p| {
                [
                    p[0] * self.cos_heading - p[1] * self.sin_heading + self.pos_x_m,
                    p[0] * self.sin_heading + p[1] * self.cos_heading + self.pos_y_m,
                ]
            })
            .collect()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const EPS: f64 = 1e-9;

    /// Build a pose with the given yaw only.
    fn pose_with_yaw(yaw_rad: f64) -> Pose {
        Pose {
            position_m: [0.0; 3],
            attitude_q: [0.0, 0.0, (yaw_rad / 2.0).sin(), (yaw_rad / 2.0).cos()],
        }
    }

    #[test]
    fn test_heading_round_trip() {
        for &yaw in &[0.0, 0.2, -0.2, 1.5, -1.5, 3.0, -3.0] {
            let pose = pose_with_yaw(yaw);
            assert!(
                (pose.get_heading() - yaw).abs() < EPS,
                "yaw {} not recovered",
                yaw
            );
        }
    }

    #[test]
    fn test_zero_latency_projection_is_identity() {
        let pose = Pose {
            position_m: [3.0, -2.0, 0.0],
            attitude_q: [0.0, 0.0, (0.4f64 / 2.0).sin(), (0.4f64 / 2.0).cos()],
        };

        let proj = pose.project_ahead(0.0, 1.5, 0.3, 0.3);

        assert!((proj.pos_x_m - 3.0).abs() < EPS);
        assert!((proj.pos_y_m + 2.0).abs() < EPS);
        assert!((proj.heading_rad - 0.4).abs() < EPS);
    }

    #[test]
    fn test_projection_moves_along_heading() {
        // Driving straight along +x at 2 m/s for 0.1 s of latency
        let pose = pose_with_yaw(0.0);
        let proj = pose.project_ahead(0.1, 2.0, 0.0, 0.3);

        assert!((proj.pos_x_m - 0.2).abs() < EPS);
        assert!(proj.pos_y_m.abs() < EPS);
        assert!(proj.heading_rad.abs() < EPS);
    }

    #[test]
    fn test_frame_transform_round_trip() {
        // The car->map transform must be the exact inverse of map->car
        let pose = Pose {
            position_m: [5.0, 1.0, 0.0],
            attitude_q: [0.0, 0.0, (0.7f64 / 2.0).sin(), (0.7f64 / 2.0).cos()],
        };
        let proj = pose.project_ahead(0.0, 0.0, 0.0, 0.3);

        let map_points = [[6.0, 1.5], [4.0, 0.0], [5.0, 1.0], [-3.0, 12.0]];

        let car_points: Vec<[f64; 2]> =
            map_points.iter().map(|p| proj.map_to_car(p)).collect();
        let back = proj.car_to_map(&car_points);

        for (orig, round) in map_points.iter().zip(back.iter()) {
            assert!((orig[0] - round[0]).abs() < EPS);
            assert!((orig[1] - round[1]).abs() < EPS);
        }
    }
}
