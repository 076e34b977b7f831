use crate::message::MessageType;
use crate::port::SensorPort;
use crate::sensor::{SensorState, SensorType};
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result alias used by every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, BrickPiError>;

/// The primary error type for the `brickpi3-lib` library.
#[derive(Error, Debug)]
pub enum BrickPiError {
    /// The bus transport itself failed. Never retried inside the driver.
    #[error("SPI transport error: {0}")]
    Transport(#[from] io::Error),

    /// The reply was clocked in but the sync marker was missing.
    #[error("no SPI response to {message_type}")]
    NoResponse { message_type: MessageType },

    #[error("invalid sensor data on port {port}: {kind}")]
    Sensor { port: SensorPort, kind: SensorErrorKind },

    #[error("configuration error: {0}")]
    Configuration(String),

    /// A bounded wait ran out. `last_state` is the last sensor state seen, if any.
    #[error("timed out after {timeout:?} (last sensor state: {last_state:?})")]
    Timeout {
        timeout: Duration,
        last_state: Option<SensorState>,
    },

    #[error("device detection failed: {0}")]
    DetectionFailed(String),
}

/// Why a structurally valid sensor reply was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorErrorKind {
    #[error("configured type {expected} but board reported {actual:#04x}")]
    TypeMismatch { expected: SensorType, actual: u8 },

    #[error("board reported state {0:?}")]
    InvalidState(SensorState),

    #[error("unknown state flag {0:#04x}")]
    UnknownState(u8),

    #[error("expected {expected} I2C bytes, got {actual}")]
    I2cLength { expected: usize, actual: usize },

    #[error("reply too short: expected at least {expected} bytes, got {actual}")]
    ShortReply { expected: usize, actual: usize },
}

impl BrickPiError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        BrickPiError::Configuration(message.into())
    }
}
