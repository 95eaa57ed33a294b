//! Main MPC controller executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Initialise the processing modules and network
//!     - Main loop:
//!         - Sensor ingress (centerline, pose, odometry, go signal)
//!         - Input readiness gating
//!         - Latency projection of the pose
//!         - Local reference building (window, car-frame fit)
//!         - MPC solve
//!         - Actuator mapping, go gating and command publication
//!
//! Every cycle either publishes a freshly computed command pair or a
//! safe-stop pair, never a stale command. Before all input channels have
//! delivered their first value nothing is published at all.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use mpc_lib::{
    act_map,
    cmd_server::CmdServer,
    data_store::DataStore,
    mpc_ctrl::{self, MpcCtrl},
    params::{CtrlParams, NetParams, PlatformParams},
    ref_gen::{self, RefGen},
    sensor_client::SensorClient,
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use comms_if::msg::{topic, Polyline};
use log::{debug, info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use util::{
    logger::{logger_init, LevelFilter},
    maths::polyeval,
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.01;

/// Number of cycles per second
const CYCLE_FREQUENCY_HZ: f64 = 1.0 / CYCLE_PERIOD_S;

/// Step between samples of the fitted polynomial on the diagnostic channel.
const POLY_MARKER_STEP_M: f64 = 0.2;

/// Extent of the sampled polynomial on the diagnostic channel.
const POLY_MARKER_EXTENT_M: f64 = 2.1;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("mpc_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("MPC Controller Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    // Controller tuning surface from the command line. An argument count
    // mismatch or unparseable value exits with code 1 here.
    let ctrl_params = CtrlParams::from_args();

    ctrl_params
        .validate()
        .wrap_err("Invalid controller parameters")?;

    info!("Controller parameters: {:?}", ctrl_params);

    let net_params: NetParams =
        util::params::load("params/net.toml").wrap_err("Could not load net params")?;

    let platform_params: PlatformParams =
        util::params::load("params/platform.toml").wrap_err("Could not load platform params")?;

    platform_params
        .validate()
        .wrap_err("Invalid platform parameters")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    // ---- INITIALISE MODULES ----

    let mut ref_gen = RefGen::default();
    ref_gen
        .init(ref_gen::Params::from(&ctrl_params))
        .wrap_err("Failed to initialise RefGen")?;
    info!("RefGen init complete");

    let mut mpc_ctrl = MpcCtrl::default();
    mpc_ctrl
        .init(mpc_ctrl::Params::new(&ctrl_params, &platform_params))
        .wrap_err("Failed to initialise MpcCtrl")?;
    info!("MpcCtrl init complete");

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let sensor_client = SensorClient::new(&zmq_ctx, &net_params)
        .wrap_err("Failed to initialise the SensorClient")?;
    info!("SensorClient initialised");

    let cmd_server =
        CmdServer::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise the CmdServer")?;
    info!("CmdServer initialised");

    info!("Network initialisation complete");

    // ---- SHUTDOWN HANDLER ----

    let shutdown = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler({
        let shutdown = shutdown.clone();
        move || {
            shutdown.store(true, Ordering::SeqCst);
        }
    })
    .wrap_err("Failed to install the shutdown handler")?;

    // ---- MAIN LOOP ----

    info!("Beginning main loop\n");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        ds.cycle_start(CYCLE_FREQUENCY_HZ);

        // ---- SENSOR INGRESS ----

        if let Err(e) = sensor_client.drain_into(&mut ds) {
            warn!("Sensor ingress error: {}", e);
        }

        // ---- SHUTDOWN ----

        // Exit after finishing the in-flight cycle, leaving the vehicle in a
        // safe state. Nothing is published if no actuation has been possible
        // yet.
        if shutdown.load(Ordering::SeqCst) {
            info!("Shutdown requested, stopping");

            if ds.inputs_ready() {
                if let Err(e) =
                    cmd_server.publish_demands(&act_map::safe_stop(&platform_params))
                {
                    warn!("Could not publish the shutdown safe stop: {}", e);
                }
            }

            break;
        }

        // ---- CONTROL PROCESSING ----

        if ds.inputs_ready() {
            process_cycle(
                &mut ds,
                &mut ref_gen,
                &mut mpc_ctrl,
                &cmd_server,
                &ctrl_params,
                &platform_params,
            );
        } else if ds.is_1_hz_cycle {
            warn!(
                "No optimisation, centerline_ok: {}, position_ok: {}, heading_ok: {}, \
                speed_ok: {}",
                ds.centerline_ok, ds.position_ok, ds.heading_ok, ds.speed_ok
            );
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        if ctrl_params.debug {
            debug!("dt_in_cycle: {:.6} [s]", cycle_dur.as_secs_f64());
        }

        // Get sleep duration
        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    info!("End of execution");

    Ok(())
}

/// Run the control pipeline for one cycle with all inputs ready.
///
/// On any tick-scoped failure (degenerate fit, failed solve) a safe-stop
/// command pair is published instead, so a cycle always actuates exactly
/// once.
fn process_cycle(
    ds: &mut DataStore,
    ref_gen: &mut RefGen,
    mpc_ctrl: &mut MpcCtrl,
    cmd_server: &CmdServer,
    ctrl_params: &CtrlParams,
    platform_params: &PlatformParams,
) {
    // Project the pose to where the vehicle will be when the commands take
    // effect. Speed is zero-order-held over the latency.
    let projected = ds.pose.project_ahead(
        ctrl_params.latency_s,
        ds.speed_ms,
        ds.steer_last_rad,
        platform_params.wheelbase_m,
    );

    // Build the reference and solve. Failures here are recovered locally by
    // the safe-stop policy below.
    let pipeline_result: Result<(ref_gen::OutputData, mpc_ctrl::MpcOutput), Report> = (|| {
        let (ref_out, _) = ref_gen.proc(&ref_gen::InputData {
            centerline: ds.centerline.clone(),
            pose: projected,
        })?;

        debug!(
            "CTE: {:.2} [m], ePsi: {:.2} [rad], fraction_steps_ok: {:.2}",
            ref_out.cte_m, ref_out.epsi_rad, ref_out.fraction_steps_ok
        );

        // Attenuate the reference speed by the stabiliser degradation
        let ref_v_ms = ref_gen::attenuate_ref_v(
            ctrl_params.ref_v_ms,
            ctrl_params.ref_v_alpha,
            ref_out.fraction_steps_ok,
        );

        let (mpc_out, _) = mpc_ctrl.proc(&mpc_ctrl::InputData {
            cte_m: ref_out.cte_m,
            epsi_rad: ref_out.epsi_rad,
            speed_ms: ds.speed_ms,
            ref_v_ms,
            coeffs: ref_out.coeffs.clone(),
        })?;

        Ok((ref_out, mpc_out))
    })();

    match pipeline_result {
        Ok((ref_out, mpc_out)) => {
            // Map onto the actuator ranges
            let (dems, _) = act_map::map_actuators(
                mpc_out.steer_rad,
                mpc_out.speed_ms,
                platform_params,
            );

            // Go gating: while the go flag is clear hold the vehicle still
            let dems = match ds.go_flag {
                true => dems,
                false => act_map::safe_stop(platform_params),
            };

            if let Err(e) = cmd_server.publish_demands(&dems) {
                warn!("Could not publish commands: {}", e);
            }

            if ctrl_params.debug {
                publish_diagnostics(cmd_server, &projected, &ref_out, &mpc_out);
            }

            // Remember the steering angle for the next latency projection
            ds.steer_last_rad = mpc_out.steer_rad;
        }
        Err(e) => {
            warn!("Cycle processing failed ({}), applying safe stop", e);

            if let Err(e) = cmd_server.publish_demands(&act_map::safe_stop(platform_params)) {
                warn!("Could not publish the safe stop: {}", e);
            }
        }
    }
}

/// Publish the three diagnostic polylines, all in the map frame.
fn publish_diagnostics(
    cmd_server: &CmdServer,
    projected: &mpc_lib::loc::ProjectedPose,
    ref_out: &ref_gen::OutputData,
    mpc_out: &mpc_ctrl::MpcOutput,
) {
    // Trajectory predicted by the optimiser
    let predicted = Polyline {
        points_m: projected.car_to_map(&mpc_out.predicted_m),
    };

    // The window the polynomial was fitted to
    let window = Polyline {
        points_m: projected.car_to_map(&ref_out.window_car_m),
    };

    // The fitted polynomial itself, sampled ahead of the vehicle
    let mut poly_car_m = vec![[0.0, 0.0]];
    let mut x_m = 0.0;
    while x_m < POLY_MARKER_EXTENT_M {
        poly_car_m.push([x_m, polyeval(&ref_out.coeffs, x_m)]);
        x_m += POLY_MARKER_STEP_M;
    }
    let poly = Polyline {
        points_m: projected.car_to_map(&poly_car_m),
    };

    for (polyline_topic, polyline) in [
        (topic::MPC_PREDICTED, &predicted),
        (topic::MPC_WINDOW, &window),
        (topic::MPC_POLY, &poly),
    ] {
        if let Err(e) = cmd_server.publish_polyline(polyline_topic, polyline) {
            warn!("Could not publish diagnostic {}: {}", polyline_topic, e);
        }
    }
}
