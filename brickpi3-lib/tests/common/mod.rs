//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use brickpi3_lib::constants::SYNC_MARKER;
#[allow(unused_imports)]
pub use brickpi3_lib::message::MessageType;
#[allow(unused_imports)]
pub use brickpi3_lib::sensor::{SensorConfig, SensorState, SensorType, SensorValue};
#[allow(unused_imports)]
pub use brickpi3_lib::{BrickPi3, BrickPiError, MotorPort, SensorErrorKind, SensorPort, Transport};
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use hex;

use std::collections::{HashMap, VecDeque};
use std::io;

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Vec<u8> {
    hex::decode(hex_data).expect("Failed to decode hex")
}

/// A reply frame: three echo bytes, the sync marker, then `payload`.
#[allow(dead_code)]
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0x00, 0x00, 0x00, SYNC_MARKER];
    out.extend_from_slice(payload);
    out
}

/// Info string payload, NUL-padded to 20 bytes.
#[allow(dead_code)]
pub fn info_string(text: &str) -> Vec<u8> {
    let mut out = text.as_bytes().to_vec();
    out.resize(20, 0);
    out
}

/// Sensor payload: echoed type, state, data.
#[allow(dead_code)]
pub fn sensor(sensor_type: SensorType, state: SensorState, data: &[u8]) -> Vec<u8> {
    let mut out = vec![sensor_type.into(), state.into()];
    out.extend_from_slice(data);
    out
}

/// Motor status payload.
#[allow(dead_code)]
pub fn status(flags: u8, power: i8, encoder: i32, dps: i16) -> Vec<u8> {
    let mut out = vec![flags, power as u8];
    out.extend_from_slice(&encoder.to_be_bytes());
    out.extend_from_slice(&dps.to_be_bytes());
    out
}

#[derive(Debug, Clone)]
enum Step {
    Reply(Vec<u8>),
    Fail(io::ErrorKind),
}

/// In-memory bus. Replies are scripted per message type and consumed in
/// order; once a queue is empty the `always` reply for that type (if any)
/// repeats. Anything unscripted gets a zero-filled frame with no sync marker.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    queues: HashMap<u8, VecDeque<Step>>,
    sticky: HashMap<u8, Step>,
    pub requests: Vec<Vec<u8>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a synced reply carrying `payload`.
    pub fn reply(&mut self, message_type: MessageType, payload: &[u8]) -> &mut Self {
        self.raw(message_type, &frame(payload))
    }

    /// Queue an exact reply frame.
    pub fn raw(&mut self, message_type: MessageType, bytes: &[u8]) -> &mut Self {
        self.queue(message_type, Step::Reply(bytes.to_vec()))
    }

    /// Queue a transport failure.
    pub fn fail(&mut self, message_type: MessageType) -> &mut Self {
        self.queue(message_type, Step::Fail(io::ErrorKind::BrokenPipe))
    }

    /// Reply with `payload` whenever the queue for `message_type` is empty.
    pub fn always(&mut self, message_type: MessageType, payload: &[u8]) -> &mut Self {
        self.sticky
            .insert(message_type.into(), Step::Reply(frame(payload)));
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.len()
    }

    /// Requests sent with `message_type`, in order.
    pub fn requests_of(&self, message_type: MessageType) -> Vec<Vec<u8>> {
        let id = u8::from(message_type);
        self.requests
            .iter()
            .filter(|r| r.get(1) == Some(&id))
            .cloned()
            .collect()
    }

    fn queue(&mut self, message_type: MessageType, step: Step) -> &mut Self {
        self.queues
            .entry(message_type.into())
            .or_default()
            .push_back(step);
        self
    }
}

impl Transport for ScriptedTransport {
    async fn transfer(&mut self, data: &[u8]) -> io::Result<Bytes> {
        self.requests.push(data.to_vec());
        let id = data.get(1).copied().unwrap_or_default();
        let step = self
            .queues
            .get_mut(&id)
            .and_then(|queue| queue.pop_front())
            .or_else(|| self.sticky.get(&id).cloned());
        match step {
            Some(Step::Reply(bytes)) => Ok(Bytes::from(bytes)),
            Some(Step::Fail(kind)) => Err(io::Error::new(kind, "scripted bus failure")),
            None => Ok(Bytes::from(vec![0; data.len()])),
        }
    }
}
