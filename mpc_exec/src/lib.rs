//! # MPC controller library.
//!
//! This library allows other crates in the workspace (and the benchmarks) to
//! access items defined inside the controller crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuator mapping - converts optimiser outputs into servo and motor demands
pub mod act_map;

/// Command server - publishes actuator demands and diagnostic polylines
pub mod cmd_server;

/// Data store - input slots, readiness flags and gating state
pub mod data_store;

/// Localisation types - pose, heading extraction and latency projection
pub mod loc;

/// MPC controller module - kinematic model, cost and optimiser
pub mod mpc_ctrl;

/// Parameter surface - CLI arguments, network and platform parameter files
pub mod params;

/// Local reference builder - path window, car-frame transform and polynomial fit
pub mod ref_gen;

/// Sensor client - receives the centerline, pose, odometry and go-signal streams
pub mod sensor_client;
