//! # Data Store

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use comms_if::msg::{self, Centerline};
use log::warn;

use crate::loc::Pose;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Global data store for the executable.
///
/// Holds the most recent value of every input channel (last-write-wins), the
/// channel readiness flags, the go flag, and the loop's monitoring counters.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    // Input slots.
    //
    // Each readiness flag is set on the first arrival of its channel and
    // never cleared.
    /// The track centerline. Held behind an `Arc` so the reference builder
    /// can snapshot it without copying the polyline.
    pub centerline: Arc<Centerline>,
    pub centerline_ok: bool,

    /// The latest localisation pose
    pub pose: Pose,
    pub position_ok: bool,
    pub heading_ok: bool,

    /// The latest longitudinal speed measurement
    pub speed_ms: f64,
    pub speed_ok: bool,

    // Gating
    /// True if the vehicle is allowed to move. Defaults to false, engaged by
    /// the go signal and cleared by the emergency stop.
    pub go_flag: bool,

    // Control feedback
    /// Steering angle applied on the previous cycle, used for the latency
    /// projection.
    ///
    /// Units: radians
    pub steer_last_rad: f64,

    // Monitoring counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DataStore {
    /// True once every input channel has delivered at least one value.
    pub fn inputs_ready(&self) -> bool {
        self.centerline_ok && self.position_ok && self.heading_ok && self.speed_ok
    }

    /// Update the centerline slot.
    pub fn set_centerline(&mut self, centerline: Centerline) {
        self.centerline = Arc::new(centerline);
        self.centerline_ok = true;
    }

    /// Update the pose slot.
    ///
    /// Position and heading arrive in the same message but are tracked as
    /// separate readiness flags, matching the channel list of the interface.
    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
        self.position_ok = true;
        self.heading_ok = true;
    }

    /// Update the speed slot.
    pub fn set_speed(&mut self, speed_ms: f64) {
        self.speed_ms = speed_ms;
        self.speed_ok = true;
    }

    /// Handle a go-signal code.
    ///
    /// Code 0 is an emergency stop which clears the go flag, the go code
    /// engages it, and any other code is ignored.
    pub fn handle_go_signal(&mut self, code: u16) {
        match code {
            msg::STOP_CODE => {
                warn!("Emergency stop!");
                self.go_flag = false;
            }
            msg::GO_CODE => {
                warn!("GO!");
                self.go_flag = true;
            }
            _ => (),
        }
    }

    /// Perform actions required at the start of a cycle.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        self.is_1_hz_cycle = self.num_cycles % (cycle_frequency_hz as u128) == 0;
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_readiness_requires_all_channels() {
        let mut ds = DataStore::default();
        assert!(!ds.inputs_ready());

        ds.set_centerline(Centerline {
            points_m: vec![[0.0, 0.0], [1.0, 0.0]],
        });
        assert!(!ds.inputs_ready());

        ds.set_speed(1.0);
        assert!(!ds.inputs_ready());

        ds.set_pose(Pose::default());
        assert!(ds.inputs_ready());
    }

    #[test]
    fn test_go_signal_codes() {
        let mut ds = DataStore::default();

        // Go flag defaults to false
        assert!(!ds.go_flag);

        // Unknown codes are ignored
        ds.handle_go_signal(7);
        assert!(!ds.go_flag);

        // Go code engages the flag
        ds.handle_go_signal(msg::GO_CODE);
        assert!(ds.go_flag);

        // Unknown codes don't clear it either
        ds.handle_go_signal(1234);
        assert!(ds.go_flag);

        // Emergency stop clears it
        ds.handle_go_signal(msg::STOP_CODE);
        assert!(!ds.go_flag);
    }

    #[test]
    fn test_last_write_wins() {
        let mut ds = DataStore::default();

        ds.set_speed(1.0);
        ds.set_speed(2.5);
        assert_eq!(ds.speed_ms, 2.5);
        assert!(ds.speed_ok);
    }
}
