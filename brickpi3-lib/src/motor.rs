use crate::constants::PAYLOAD_OFFSET;
use modular_bitfield::prelude::*;
use zerocopy::byteorder::big_endian::{I16, I32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Status flags of a motor port.
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorStatusFlags {
    /// Battery below the motor drive threshold, outputs floating
    pub low_voltage_float: bool,
    pub overloaded: bool,
    #[skip]
    unused: B6,
}

/// GET_MOTOR_x_STATUS reply layout after the sync marker.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct MotorStatusRaw {
    pub flags: u8,
    /// Percent, -100..100, or -128 when floating
    pub power: i8,
    /// Degrees
    pub encoder: I32,
    /// Degrees per second
    pub dps: I16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorStatus {
    /// Raw flag byte, see [`MotorStatusFlags`]
    pub flags: u8,
    pub power: i8,
    pub encoder: i32,
    pub dps: i16,
}

impl MotorStatus {
    pub fn flags(&self) -> MotorStatusFlags {
        MotorStatusFlags::from_bytes([self.flags])
    }

    pub fn low_voltage_float(&self) -> bool {
        self.flags().low_voltage_float()
    }

    pub fn overloaded(&self) -> bool {
        self.flags().overloaded()
    }

    /// Decode the payload following the sync marker. `None` if it is too short.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        let (raw, _) = MotorStatusRaw::ref_from_prefix(payload).ok()?;
        Some(Self::from(*raw))
    }

    /// Length of the full transfer needed for a status read.
    pub const fn transfer_len() -> usize {
        PAYLOAD_OFFSET + size_of::<MotorStatusRaw>()
    }
}

impl From<MotorStatusRaw> for MotorStatus {
    fn from(raw: MotorStatusRaw) -> Self {
        Self {
            flags: raw.flags,
            power: raw.power,
            encoder: raw.encoder.get(),
            dps: raw.dps.get(),
        }
    }
}
