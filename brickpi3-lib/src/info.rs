//! Board identity: info strings, firmware version and serial id.

use crate::constants::{ID_HEX_LEN, ID_LEN, INFO_STRING_MAX_LEN};
use crate::error::{BrickPiError, Result};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Version packed as `major * 1_000_000 + minor * 1_000 + patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    pub fn from_packed(value: u32) -> Self {
        Self {
            major: value / 1_000_000,
            minor: (value / 1_000) % 1_000,
            patch: value % 1_000,
        }
    }

    /// Whether this version satisfies a `"major.minor.x"` requirement.
    pub fn matches(&self, required: &str) -> bool {
        let mut parts = required.split('.');
        let major = parts.next().and_then(|p| p.parse::<u32>().ok());
        let minor = parts.next().and_then(|p| p.parse::<u32>().ok());
        major == Some(self.major) && minor == Some(self.minor)
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Up to 20 ASCII chars, stopping at the first NUL.
pub fn decode_info_string(payload: &[u8]) -> String {
    payload
        .iter()
        .take(INFO_STRING_MAX_LEN)
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}

/// Serial number bytes as 32 lowercase hex chars.
pub fn decode_id(payload: &[u8]) -> String {
    hex::encode(&payload[..ID_LEN.min(payload.len())])
}

/// Parse a serial id for SET_ADDRESS. An empty id means "any board".
pub fn parse_id(id: &str) -> Result<[u8; ID_LEN]> {
    let mut out = [0u8; ID_LEN];
    if id.is_empty() {
        return Ok(out);
    }
    if id.len() != ID_HEX_LEN {
        return Err(BrickPiError::config(format!(
            "serial id must be {ID_HEX_LEN} hex chars, got {}",
            id.len()
        )));
    }
    hex::decode_to_slice(id, &mut out).map_err(|e| BrickPiError::config(format!("invalid serial id {id:?}: {e}")))?;
    Ok(out)
}
