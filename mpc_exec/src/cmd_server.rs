//! # Command Server
//!
//! The command server publishes the actuator demands on every cycle, and the
//! diagnostic polylines when debug output is enabled. All messages go out on
//! a single PUB socket, framed with a topic so subscribers can filter.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    msg::{topic, Polyline},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};
use serde::Serialize;

use crate::{act_map::ActuatorDems, params::NetParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Command server
pub struct CmdServer {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CmdServerError {
    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    #[error("Could not send the command: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the command: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CmdServer {
    /// Create a new instance of the command server.
    ///
    /// This function will not block until a subscriber connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, CmdServerError> {
        let socket_options = SocketOptions {
            bind: true,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::PUB, socket_options, &params.cmd_endpoint)?;

        Ok(Self { socket })
    }

    /// Publish the actuator demand pair.
    pub fn publish_demands(&self, dems: &ActuatorDems) -> Result<(), CmdServerError> {
        self.publish(topic::SERVO_POSITION, &dems.servo_position)?;
        self.publish(topic::MOTOR_SPEED, &dems.motor_speed_rpm)
    }

    /// Publish a diagnostic polyline on the given topic.
    pub fn publish_polyline(
        &self,
        polyline_topic: &str,
        polyline: &Polyline,
    ) -> Result<(), CmdServerError> {
        self.publish(polyline_topic, polyline)
    }

    /// Publish a serialisable value under a topic frame.
    fn publish<T: Serialize>(&self, msg_topic: &str, value: &T) -> Result<(), CmdServerError> {
        let payload =
            serde_json::to_string(value).map_err(CmdServerError::SerializationError)?;

        self.socket
            .send(msg_topic, zmq::SNDMORE)
            .map_err(CmdServerError::SendError)?;
        self.socket
            .send(&payload, 0)
            .map_err(CmdServerError::SendError)
    }
}
