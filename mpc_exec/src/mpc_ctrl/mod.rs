//! # MPC controller module
//!
//! The controller solves a finite-horizon optimal control problem over a
//! kinematic single-track (bicycle) model of the vehicle. Given the tracking
//! errors produced by the reference builder and the car-frame path
//! polynomial, it searches for the control tape (steering and acceleration
//! over the horizon) minimising a weighted cost over:
//!
//!  - cross-track and heading error at every step,
//!  - deviation from the reference speed,
//!  - control magnitude, and
//!  - control change between consecutive steps.
//!
//! Only the first step of the optimised tape is applied; the rest of the
//! predicted trajectory is kept for diagnostics.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod model;
mod params;
mod solver;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use model::ModelState;
pub use params::Params;
pub use solver::{MpcOutput, SolveError};
pub use state::*;
