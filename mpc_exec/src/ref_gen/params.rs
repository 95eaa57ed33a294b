//! Reference builder parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::params::CtrlParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the local reference builder.
#[derive(Debug, Clone, Default)]
pub struct Params {
    /// Degree of the fitted polynomial
    pub poly_degree: usize,

    /// Number of centerline samples used for the fit
    pub num_steps_poly: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl From<&CtrlParams> for Params {
    fn from(ctrl: &CtrlParams) -> Self {
        Self {
            poly_degree: ctrl.poly_degree,
            num_steps_poly: ctrl.num_steps_poly,
        }
    }
}
