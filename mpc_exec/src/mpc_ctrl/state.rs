//! Implementations for the MpcCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use serde::Serialize;

// Internal
use super::{
    solver::{SolveError, Solver},
    ModelState, MpcOutput, Params,
};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// MPC controller module state
#[derive(Default)]
pub struct MpcCtrl {
    params: Params,

    solver: Solver,

    report: StatusReport,
}

/// Input data to the MPC controller.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    /// Cross-track error from the reference builder.
    ///
    /// Units: meters
    pub cte_m: f64,

    /// Heading error from the reference builder.
    ///
    /// Units: radians
    pub epsi_rad: f64,

    /// Current measured longitudinal speed.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Reference speed after degradation attenuation.
    ///
    /// Units: meters/second
    pub ref_v_ms: f64,

    /// Car-frame path polynomial coefficients, lowest power first
    pub coeffs: Vec<f64>,
}

/// Status report for MPC controller processing.
#[derive(Clone, Copy, Default, Serialize, Debug)]
pub struct StatusReport {
    /// Number of optimiser iterations used this cycle
    pub iterations: usize,

    /// Final cost of the accepted solution
    pub cost: f64,

    /// True if the optimiser stopped on its convergence criterion
    pub converged: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during MpcCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum MpcCtrlError {
    /// The optimiser failed to produce a usable solution.
    #[error("MPC solve failed: {0}")]
    SolveFailed(#[from] SolveError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for MpcCtrl {
    type InitData = Params;
    type InitError = std::convert::Infallible;

    type InputData = InputData;
    type OutputData = MpcOutput;
    type StatusReport = StatusReport;
    type ProcError = MpcCtrlError;

    /// Initialise the MPC controller with its parameters.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        self.params = init_data;

        Ok(())
    }

    /// Solve the horizon problem for this cycle and extract the first-step
    /// controls.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        // Clear the status report
        self.report = StatusReport::default();

        // The vehicle is at the origin of its own frame at projected time
        let initial = ModelState::initial(
            input_data.cte_m,
            input_data.epsi_rad,
            input_data.speed_ms,
        );

        let (output, stats) = self.solver.solve(
            &initial,
            &input_data.coeffs,
            input_data.ref_v_ms,
            &self.params,
        )?;

        self.report.iterations = stats.iterations;
        self.report.cost = stats.cost;
        self.report.converged = stats.converged;

        debug!(
            "MPC output: steer {:.3} [rad], speed {:.3} [m/s]",
            output.steer_rad, output.speed_ms
        );

        Ok((output, self.report))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_module_solves_through_the_state_trait() {
        let mut mpc = MpcCtrl::default();
        mpc.init(Params::default()).unwrap();

        let (out, rpt) = mpc
            .proc(&InputData {
                cte_m: 0.0,
                epsi_rad: 0.0,
                speed_ms: 1.0,
                ref_v_ms: 2.0,
                coeffs: vec![0.0, 0.0, 0.0, 0.0],
            })
            .unwrap();

        assert!(out.steer_rad.abs() < 1e-6);
        assert!(out.speed_ms > 1.0);
        assert!(rpt.iterations >= 1);
    }

    #[test]
    fn test_solve_failure_is_reported() {
        let mut mpc = MpcCtrl::default();
        mpc.init(Params::default()).unwrap();

        let result = mpc.proc(&InputData {
            cte_m: f64::NAN,
            epsi_rad: 0.0,
            speed_ms: 1.0,
            ref_v_ms: 1.0,
            coeffs: vec![0.0, 0.0],
        });

        assert!(matches!(result, Err(MpcCtrlError::SolveFailed(_))));
    }
}
