//! Configuration convergence.
//!
//! After SET_SENSOR_TYPE the board needs a while before a port reports
//! VALID_DATA. The poller keeps reading until it does, the deadline passes,
//! or the exchange itself fails.

use crate::constants::SYNC_OFFSET;
use crate::error::{BrickPiError, Result, SensorErrorKind};
use crate::frame::parse_reply;
use crate::message::MessageType;
use crate::port::SensorPort;
use crate::sensor::SensorState;
use crate::transport::Transport;
use bytes::Bytes;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Index of the state flag in a sensor reply, counted from the start of the frame.
pub const STATE_OFFSET: usize = SYNC_OFFSET + 2;

/// Outcome of one read attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    /// Not there yet; `None` when the reply was too short to carry a state.
    Polling(Option<u8>),
    /// VALID_DATA, with the payload following the sync marker.
    Done(Bytes),
}

/// Classify one reply frame read from `port`.
///
/// A missing sync marker and a state byte outside [`SensorState`] are hard
/// errors; every known state other than VALID_DATA keeps polling.
pub fn classify(port: SensorPort, message_type: MessageType, reply: &Bytes) -> Result<PollState> {
    let payload = parse_reply(message_type, reply)?;
    let Some(&state) = reply.get(STATE_OFFSET) else {
        return Ok(PollState::Polling(None));
    };
    match SensorState::try_from(state) {
        Ok(SensorState::ValidData) => Ok(PollState::Done(payload)),
        Ok(_) => Ok(PollState::Polling(Some(state))),
        Err(_) => Err(BrickPiError::Sensor {
            port,
            kind: SensorErrorKind::UnknownState(state),
        }),
    }
}

/// Transfer `request` until the port reports VALID_DATA.
///
/// Attempts run back to back; the deadline is checked after every one.
/// Transport failures, missing sync markers and unknown state bytes end the
/// loop at once.
pub async fn poll_until_valid<T: Transport>(
    transport: &mut T,
    port: SensorPort,
    message_type: MessageType,
    request: &[u8],
    timeout: Duration,
) -> Result<Bytes> {
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let reply = transport.transfer(request).await?;
        match classify(port, message_type, &reply)? {
            PollState::Done(payload) => {
                debug!(attempts, ?message_type, "Sensor reported valid data");
                return Ok(payload);
            }
            PollState::Polling(state) => {
                trace!(attempts, state = ?state, "Sensor not ready");
                if Instant::now() >= deadline {
                    let last_state = state.and_then(|s| SensorState::try_from(s).ok());
                    debug!(attempts, ?last_state, "Gave up waiting for sensor");
                    return Err(BrickPiError::Timeout { timeout, last_state });
                }
            }
        }
    }
}
