//! Port selectors.
//!
//! Ports are bit flags (1/2/4/8). "Set" requests accept any non-empty
//! combination, "read" requests need exactly one bit set.

use crate::error::{BrickPiError, Result};
use std::fmt;
use std::ops::BitOr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const PORT_BITS: u8 = 0x0F;

macro_rules! port_mask {
    ($(#[$meta:meta])* $name:ident, $what:literal, [$($port:ident = $bit:literal => $label:literal),+ $(,)?]) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name(u8);

        impl $name {
            $(pub const $port: $name = $name($bit);)+

            /// Every port of this kind
            pub const ALL: $name = $name(PORT_BITS);

            const LABELS: [&'static str; 4] = [$($label),+];

            /// Build a mask from raw bits. Zero and bits above the four ports are rejected.
            pub fn from_bits(bits: u8) -> Result<Self> {
                if bits == 0 || bits & !PORT_BITS != 0 {
                    return Err(BrickPiError::config(format!(
                        "invalid {} port mask {:#04x}",
                        $what, bits
                    )));
                }
                Ok(Self(bits))
            }

            /// Port by position (0-3)
            pub fn from_index(index: usize) -> Option<Self> {
                (index < 4).then(|| Self(1 << index))
            }

            pub const fn bits(self) -> u8 {
                self.0
            }

            pub const fn is_single(self) -> bool {
                self.0.count_ones() == 1
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Position of the single selected port, or a configuration error
            /// when more than one port is set.
            pub fn single_index(self) -> Result<usize> {
                if !self.is_single() {
                    return Err(BrickPiError::config(format!(
                        "must be one {} port at a time, got {}",
                        $what, self
                    )));
                }
                Ok(self.0.trailing_zeros() as usize)
            }

            /// Positions (0-3) of every selected port
            pub fn indices(self) -> impl Iterator<Item = usize> {
                (0..4).filter(move |i| self.0 & (1 << i) != 0)
            }
        }

        impl BitOr for $name {
            type Output = $name;

            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let names: Vec<&str> = self.indices().map(|i| Self::LABELS[i]).collect();
                write!(f, "{}", names.join("+"))
            }
        }
    };
}

port_mask!(
    /// One or more of the four sensor ports.
    SensorPort,
    "sensor",
    [PORT_1 = 0x01 => "PORT_1", PORT_2 = 0x02 => "PORT_2", PORT_3 = 0x04 => "PORT_3", PORT_4 = 0x08 => "PORT_4"]
);

port_mask!(
    /// One or more of the four motor ports.
    MotorPort,
    "motor",
    [PORT_A = 0x01 => "PORT_A", PORT_B = 0x02 => "PORT_B", PORT_C = 0x04 => "PORT_C", PORT_D = 0x08 => "PORT_D"]
);
