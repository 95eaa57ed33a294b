//! # Sensor Client
//!
//! The sensor client subscribes to the four input channels of the controller
//! (centerline, pose, odometry, go signal) and drains them into the data
//! store at the start of every cycle.
//!
//! The sensor streams are conflated: only the most recent sample of each is
//! kept by the transport, which matches the last-write-wins discipline of
//! the input slots. The go-signal channel is *not* conflated so that a stop
//! code can never be shadowed by a later, meaningless code arriving in the
//! same cycle. Draining never blocks: each socket is read with `DONTWAIT`
//! until it reports no more messages.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    msg,
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};
use log::warn;

use crate::{data_store::DataStore, loc::Pose, params::NetParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The sensor client
pub struct SensorClient {
    /// Centerline polyline stream
    centerline_sub: MonitoredSocket,

    /// Localisation pose stream
    pose_sub: MonitoredSocket,

    /// Odometry (longitudinal speed) stream
    odom_sub: MonitoredSocket,

    /// Go/stop signal stream
    go_sub: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SensorClientError {
    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    #[error("Could not receive a message: {0}")]
    RecvError(zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SensorClient {
    /// Create a new instance of the sensor client.
    ///
    /// This function will not block waiting for the sensor sources to be up,
    /// the readiness flags in the data store gate the loop instead.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, SensorClientError> {
        let centerline_sub = Self::subscribe(ctx, &params.centerline_endpoint, true)?;
        let pose_sub = Self::subscribe(ctx, &params.pose_endpoint, true)?;
        let odom_sub = Self::subscribe(ctx, &params.odom_endpoint, true)?;
        let go_sub = Self::subscribe(ctx, &params.go_signal_endpoint, false)?;

        Ok(Self {
            centerline_sub,
            pose_sub,
            odom_sub,
            go_sub,
        })
    }

    /// Drain all pending input messages into the data store.
    ///
    /// Each message updates exactly one slot and is handled to completion
    /// before the next, so the store always holds a coherent value per
    /// field. Unparseable messages are warned about and discarded.
    pub fn drain_into(&self, ds: &mut DataStore) -> Result<(), SensorClientError> {
        while let Some(s) = recv_pending(&self.centerline_sub)? {
            match serde_json::from_str::<msg::Centerline>(&s) {
                Ok(c) => ds.set_centerline(c),
                Err(e) => warn!("Could not parse centerline message: {}", e),
            }
        }

        while let Some(s) = recv_pending(&self.pose_sub)? {
            match serde_json::from_str::<msg::PoseMsg>(&s) {
                Ok(p) => ds.set_pose(Pose::from(&p)),
                Err(e) => warn!("Could not parse pose message: {}", e),
            }
        }

        while let Some(s) = recv_pending(&self.odom_sub)? {
            match serde_json::from_str::<msg::Odom>(&s) {
                Ok(o) => ds.set_speed(o.speed_ms),
                Err(e) => warn!("Could not parse odometry message: {}", e),
            }
        }

        while let Some(s) = recv_pending(&self.go_sub)? {
            match serde_json::from_str::<msg::GoSignal>(&s) {
                Ok(g) => ds.handle_go_signal(g.code),
                Err(e) => warn!("Could not parse go signal message: {}", e),
            }
        }

        Ok(())
    }

    /// Build one subscription socket.
    fn subscribe(
        ctx: &zmq::Context,
        endpoint: &str,
        conflate: bool,
    ) -> Result<MonitoredSocket, SensorClientError> {
        let socket_options = SocketOptions {
            conflate,
            connect_timeout: 1000,
            linger: 1,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::SUB, socket_options, endpoint)?;

        // Subscribe to everything on the channel
        socket
            .set_subscribe(b"")
            .map_err(|e| MonitoredSocketError::SocketOptionError("set_subscribe".into(), e))?;

        Ok(socket)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Receive one pending message from the socket without blocking.
///
/// Returns `Ok(None)` when the socket has no more pending messages.
fn recv_pending(socket: &MonitoredSocket) -> Result<Option<String>, SensorClientError> {
    match socket.recv_string(zmq::DONTWAIT) {
        // Valid message
        Ok(Ok(s)) => Ok(Some(s)),
        // Non UTF-8 message, discard it
        Ok(Err(_)) => {
            warn!("Discarding a message which was not valid UTF-8");
            Ok(None)
        }
        // Nothing pending
        Err(zmq::Error::EAGAIN) => Ok(None),
        // Receive error
        Err(e) => Err(SensorClientError::RecvError(e)),
    }
}
