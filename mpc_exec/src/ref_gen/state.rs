//! Reference builder module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;

// Internal
use super::{Params, NUM_STEPS_BACK, STEP_POLY, X_DELTA_MIN_M};
use crate::loc::ProjectedPose;
use comms_if::msg::Centerline;
use util::{
    maths::{self, MathsError},
    module::State,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Local reference builder module state
#[derive(Default)]
pub struct RefGen {
    params: Params,

    report: StatusReport,
}

/// Input data to the reference builder.
pub struct InputData {
    /// Snapshot of the track centerline
    pub centerline: Arc<Centerline>,

    /// The latency-projected pose to build the reference around
    pub pose: ProjectedPose,
}

/// Output of the reference builder.
#[derive(Debug, Clone, Default)]
pub struct OutputData {
    /// Coefficients of the car-frame path polynomial, lowest power first
    pub coeffs: Vec<f64>,

    /// Cross-track error, the polynomial evaluated at the origin.
    ///
    /// Units: meters
    pub cte_m: f64,

    /// Heading error, `-atan(p'(0))`.
    ///
    /// Units: radians
    pub epsi_rad: f64,

    /// Fraction of the window which survived stabilisation, in (0, 1]
    pub fraction_steps_ok: f64,

    /// The (possibly stabilised) car-frame window the polynomial was fitted
    /// to. Kept for the diagnostic channels.
    pub window_car_m: Vec<[f64; 2]>,
}

/// Status report for reference builder processing.
#[derive(Clone, Copy, Default, Serialize, Debug)]
pub struct StatusReport {
    /// Index of the closest centerline point
    pub closest_idx: usize,

    /// Fraction of the window which survived stabilisation
    pub fraction_steps_ok: f64,

    /// True if the stabiliser replaced the window tail with extrapolated
    /// samples
    pub tail_extrapolated: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur during processing of the module.
#[derive(Debug, thiserror::Error)]
pub enum RefGenError {
    /// The centerline cannot cover the fit window.
    #[error("Centerline has {got} points but the fit window needs at least {needed}")]
    CenterlineTooShort { needed: usize, got: usize },

    /// The polynomial fit failed, usually meaning the window was degenerate.
    #[error("Path polynomial fit failed: {0}")]
    FitError(#[from] MathsError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for RefGen {
    type InitData = Params;
    type InitError = std::convert::Infallible;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = RefGenError;

    /// Initialise the reference builder with its parameters.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        self.params = init_data;

        Ok(())
    }

    /// Build the car-frame path reference for this cycle.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        // Clear the status report
        self.report = StatusReport::default();

        let points_m = &input_data.centerline.points_m;

        // The window must fit in the centerline
        let needed = self.params.num_steps_poly * STEP_POLY + NUM_STEPS_BACK;
        if points_m.len() < needed {
            return Err(RefGenError::CenterlineTooShort {
                needed,
                got: points_m.len(),
            });
        }

        // Find the centerline point nearest the projected pose
        let closest_idx = find_closest(
            points_m,
            input_data.pose.pos_x_m,
            input_data.pose.pos_y_m,
        );
        self.report.closest_idx = closest_idx;

        // Extract the fit window around it
        let window_m = extract_window(points_m, closest_idx, self.params.num_steps_poly);

        // Rotate into the car frame and repair degenerate spacing
        let (xvals, yvals, fraction_steps_ok) =
            transform_and_stabilise(&window_m, &input_data.pose, self.params.poly_degree);

        self.report.fraction_steps_ok = fraction_steps_ok;
        self.report.tail_extrapolated = fraction_steps_ok < 1.0;

        // Fit the path polynomial in the car frame
        let coeffs = maths::polyfit(&xvals, &yvals, self.params.poly_degree)?;

        debug!("Path fit coeffs: {:?}", coeffs);

        // Tracking errors at the origin of the car frame
        let cte_m = maths::polyeval(&coeffs, 0.0);
        let epsi_rad = -maths::polyderiv_at(&coeffs, 0.0).atan();

        let window_car_m = xvals
            .iter()
            .zip(yvals.iter())
            .map(|(&x, &y)| [x, y])
            .collect();

        Ok((
            OutputData {
                coeffs,
                cte_m,
                epsi_rad,
                fraction_steps_ok,
                window_car_m,
            },
            self.report,
        ))
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Find the index of the centerline point closest to the given position.
///
/// Linear scan over squared distances. Ties are broken by the lowest index.
fn find_closest(points_m: &[[f64; 2]], pos_x_m: f64, pos_y_m: f64) -> usize {
    let mut closest_idx = 0;
    let mut closest_dist_sq = f64::INFINITY;

    for (i, point) in points_m.iter().enumerate() {
        let dx = point[0] - pos_x_m;
        let dy = point[1] - pos_y_m;
        let dist_sq = dx * dx + dy * dy;

        if dist_sq < closest_dist_sq {
            closest_idx = i;
            closest_dist_sq = dist_sq;
        }
    }

    closest_idx
}

/// Extract the fit window: `num_steps_poly` samples starting `NUM_STEPS_BACK`
/// behind the closest index, striding by `STEP_POLY`. Indexing wraps modulo
/// the centerline length.
fn extract_window(
    points_m: &[[f64; 2]],
    closest_idx: usize,
    num_steps_poly: usize,
) -> Vec<[f64; 2]> {
    let num_points = points_m.len() as isize;
    let start = closest_idx as isize - NUM_STEPS_BACK as isize;

    (0..num_steps_poly)
        .map(|i| {
            let idx = (start + (i * STEP_POLY) as isize).rem_euclid(num_points);
            points_m[idx as usize]
        })
        .collect()
}

/// Rotate the window into the car frame, replacing the tail with a linear
/// extrapolation once the x spacing degenerates.
///
/// A fit over collinear or backward-progressing x values is ill-conditioned
/// and produces wild derivatives, so from the first sample (beyond the
/// polynomial degree) whose x advance is below [`X_DELTA_MIN_M`] the rest of
/// the window is synthesised from the last two accepted samples. The
/// returned fraction reports how much of the window was genuine.
fn transform_and_stabilise(
    window_m: &[[f64; 2]],
    pose: &ProjectedPose,
    poly_degree: usize,
) -> (Vec<f64>, Vec<f64>, f64) {
    let num_steps = window_m.len();

    let mut xvals = Vec::with_capacity(num_steps);
    let mut yvals = Vec::with_capacity(num_steps);
    let mut fraction_steps_ok = 1.0;

    for (i, point) in window_m.iter().enumerate() {
        let [x_car, y_car] = pose.map_to_car(point);

        if i > poly_degree && x_car - xvals[i - 1] < X_DELTA_MIN_M {
            let num_steps_remaining = num_steps - i + 1;
            fraction_steps_ok = (i + 1) as f64 / num_steps as f64;

            warn!(
                "Car-frame x delta too low at sample {}, extrapolating the remaining {}",
                i,
                num_steps - i
            );

            // Fill out the rest of the window with synthetic samples stepped
            // from the last two accepted ones
            let delta_x = (xvals[i - 1] - xvals[i - 2]) / num_steps_remaining as f64;
            let delta_y = (yvals[i - 1] - yvals[i - 2]) / num_steps_remaining as f64;

            for sub_i in 1..num_steps_remaining {
                xvals.push(xvals[i - 1] + sub_i as f64 * delta_x);
                yvals.push(yvals[i - 1] + sub_i as f64 * delta_y);
            }

            break;
        }

        xvals.push(x_car);
        yvals.push(y_car);
    }

    (xvals, yvals, fraction_steps_ok)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::loc::Pose;

    const EPS: f64 = 1e-6;

    /// A straight centerline along +x with 0.5 m point separation.
    fn straight_centerline() -> Arc<Centerline> {
        Arc::new(Centerline {
            points_m: (0..=50).map(|i| [i as f64 * 0.5, 0.0]).collect(),
        })
    }

    fn pose_at(x_m: f64, y_m: f64, yaw_rad: f64) -> ProjectedPose {
        Pose {
            position_m: [x_m, y_m, 0.0],
            attitude_q: [0.0, 0.0, (yaw_rad / 2.0).sin(), (yaw_rad / 2.0).cos()],
        }
        .project_ahead(0.0, 0.0, 0.0, 0.325)
    }

    fn ref_gen() -> RefGen {
        let mut rg = RefGen::default();
        rg.init(Params {
            poly_degree: 3,
            num_steps_poly: 12,
        })
        .unwrap();
        rg
    }

    #[test]
    fn test_find_closest() {
        let points = [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0]];

        assert_eq!(find_closest(&points, 1.1, 0.3), 1);
        assert_eq!(find_closest(&points, -5.0, 0.0), 0);

        // Equidistant between 1 and 2, the lower index wins
        assert_eq!(find_closest(&points, 1.5, 0.0), 1);
    }

    #[test]
    fn test_window_wraps_around_the_centerline() {
        let points: Vec<[f64; 2]> = (0..30).map(|i| [i as f64, 0.0]).collect();

        // Closest near the end of the polyline, so most of the window must
        // wrap to the start
        let window = extract_window(&points, 29, 8);

        assert_eq!(window.len(), 8);
        assert_eq!(window[0], [27.0, 0.0]);
        assert_eq!(window[1], [0.0, 0.0]);
        assert_eq!(window[7], [18.0, 0.0]);

        // Closest at the very start wraps backwards
        let window = extract_window(&points, 0, 4);
        assert_eq!(window[0], [28.0, 0.0]);
        assert_eq!(window[1], [1.0, 0.0]);
    }

    #[test]
    fn test_straight_line_errors_are_zero() {
        let mut rg = ref_gen();

        let (out, rpt) = rg
            .proc(&InputData {
                centerline: straight_centerline(),
                pose: pose_at(5.0, 0.0, 0.0),
            })
            .unwrap();

        assert!(out.cte_m.abs() < EPS);
        assert!(out.epsi_rad.abs() < EPS);
        assert_eq!(out.fraction_steps_ok, 1.0);
        assert!(!rpt.tail_extrapolated);
    }

    #[test]
    fn test_lateral_offset_gives_negative_cte() {
        let mut rg = ref_gen();

        // Vehicle 0.3 m to the left of the line, so in the car frame the
        // path is 0.3 m below the origin
        let (out, _) = rg
            .proc(&InputData {
                centerline: straight_centerline(),
                pose: pose_at(5.0, 0.3, 0.0),
            })
            .unwrap();

        assert!((out.cte_m + 0.3).abs() < EPS);
        assert!(out.epsi_rad.abs() < EPS);
    }

    #[test]
    fn test_heading_offset_gives_heading_error() {
        let mut rg = ref_gen();

        // Vehicle yawed 0.2 rad left of a straight path: the car-frame path
        // slope is -tan(0.2), so epsi = -atan(slope) = +0.2
        let (out, _) = rg
            .proc(&InputData {
                centerline: straight_centerline(),
                pose: pose_at(5.0, 0.0, 0.2),
            })
            .unwrap();

        assert!(out.cte_m.abs() < 1e-3);
        assert!((out.epsi_rad - 0.2).abs() < 1e-3);
    }

    #[test]
    fn test_window_wrap_proc_succeeds() {
        let mut rg = ref_gen();

        // Pose near the end of the open polyline: window indices wrap to the
        // beginning and the fit must still succeed
        let centerline = straight_centerline();
        let result = rg.proc(&InputData {
            centerline: centerline.clone(),
            pose: pose_at(24.5, 0.0, 0.0),
        });

        assert!(result.is_ok());
    }

    #[test]
    fn test_centerline_too_short() {
        let mut rg = ref_gen();

        let result = rg.proc(&InputData {
            centerline: Arc::new(Centerline {
                points_m: vec![[0.0, 0.0]; 10],
            }),
            pose: pose_at(0.0, 0.0, 0.0),
        });

        assert!(matches!(
            result,
            Err(RefGenError::CenterlineTooShort { got: 10, .. })
        ));
    }

    #[test]
    fn test_stabiliser_repairs_backward_progress() {
        // A window which doubles back on itself in x beyond sample 5
        let window: Vec<[f64; 2]> = (0..12)
            .map(|i| {
                if i <= 5 {
                    [i as f64 * 0.5, 0.0]
                } else {
                    // Backwards in x, would break the fit
                    [2.5 - (i - 5) as f64 * 0.5, 1.0]
                }
            })
            .collect();

        let pose = pose_at(0.0, 0.0, 0.0);
        let (xvals, yvals, fraction) = transform_and_stabilise(&window, &pose, 3);

        // The full window length is preserved
        assert_eq!(xvals.len(), 12);
        assert_eq!(yvals.len(), 12);

        // Degradation reported: break at i = 6, so (6 + 1) / 12
        assert!((fraction - 7.0 / 12.0).abs() < EPS);

        // After the repair x advances monotonically everywhere past the
        // polynomial degree
        for i in 4..xvals.len() {
            assert!(
                xvals[i] > xvals[i - 1],
                "x not increasing at {}: {} -> {}",
                i,
                xvals[i - 1],
                xvals[i]
            );
        }
    }

    #[test]
    fn test_stabiliser_keeps_good_windows_intact() {
        let window: Vec<[f64; 2]> = (0..12).map(|i| [i as f64 * 0.5, 0.1]).collect();
        let pose = pose_at(0.0, 0.0, 0.0);

        let (xvals, _, fraction) = transform_and_stabilise(&window, &pose, 3);

        assert_eq!(fraction, 1.0);
        for (i, &x) in xvals.iter().enumerate() {
            assert!((x - i as f64 * 0.5).abs() < EPS);
        }
    }
}
