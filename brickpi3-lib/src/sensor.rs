//! Sensor types, configuration parameters and the per-type reply decoder.
//!
//! Every sensor reply starts (after the sync marker) with the board's echo of
//! the configured sensor type and a state flag. Only `(expected type,
//! VALID_DATA)` lets the data through; the data that follows is laid out
//! according to the [`Layout`] of the configured type.

use crate::codec::{read_be, sign_extend, Width};
use crate::constants::{I2C_MAX_OUT_BYTES, SENSOR_HEADER_SIZE};
use crate::error::{BrickPiError, Result, SensorErrorKind};
use crate::port::SensorPort;
use bytes::{BufMut, Bytes, BytesMut};
use modular_bitfield::prelude::*;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum SensorType {
    None = 1,
    #[strum(serialize = "I2C")]
    I2c = 2,
    Custom = 3,

    Touch = 4,
    NxtTouch = 5,
    Ev3Touch = 6,

    NxtLightOn = 7,
    NxtLightOff = 8,

    NxtColorRed = 9,
    NxtColorGreen = 10,
    NxtColorBlue = 11,
    NxtColorFull = 12,
    NxtColorOff = 13,

    NxtUltrasonic = 14,

    Ev3GyroAbs = 15,
    Ev3GyroDps = 16,
    Ev3GyroAbsDps = 17,

    Ev3ColorReflected = 18,
    Ev3ColorAmbient = 19,
    Ev3ColorColor = 20,
    Ev3ColorRawReflected = 21,
    Ev3ColorColorComponents = 22,

    Ev3UltrasonicCm = 23,
    Ev3UltrasonicInches = 24,
    Ev3UltrasonicListen = 25,

    Ev3InfraredProximity = 26,
    Ev3InfraredSeek = 27,
    Ev3InfraredRemote = 28,
}

impl SensorType {
    pub const ALL: [SensorType; 28] = [
        SensorType::None,
        SensorType::I2c,
        SensorType::Custom,
        SensorType::Touch,
        SensorType::NxtTouch,
        SensorType::Ev3Touch,
        SensorType::NxtLightOn,
        SensorType::NxtLightOff,
        SensorType::NxtColorRed,
        SensorType::NxtColorGreen,
        SensorType::NxtColorBlue,
        SensorType::NxtColorFull,
        SensorType::NxtColorOff,
        SensorType::NxtUltrasonic,
        SensorType::Ev3GyroAbs,
        SensorType::Ev3GyroDps,
        SensorType::Ev3GyroAbsDps,
        SensorType::Ev3ColorReflected,
        SensorType::Ev3ColorAmbient,
        SensorType::Ev3ColorColor,
        SensorType::Ev3ColorRawReflected,
        SensorType::Ev3ColorColorComponents,
        SensorType::Ev3UltrasonicCm,
        SensorType::Ev3UltrasonicInches,
        SensorType::Ev3UltrasonicListen,
        SensorType::Ev3InfraredProximity,
        SensorType::Ev3InfraredSeek,
        SensorType::Ev3InfraredRemote,
    ];

    /// Look a type up by its `SCREAMING_SNAKE_CASE` name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(name))
    }

    /// Reply layout for this type. `None` for [`SensorType::None`], which
    /// cannot be read.
    pub const fn layout(self) -> Option<Layout> {
        use SensorType as T;
        let layout = match self {
            T::None => return Option::None,
            T::I2c => Layout::I2c,
            T::Custom => Layout::Custom,
            T::Touch
            | T::NxtTouch
            | T::Ev3Touch
            | T::NxtUltrasonic
            | T::Ev3ColorReflected
            | T::Ev3ColorAmbient
            | T::Ev3ColorColor
            | T::Ev3UltrasonicListen
            | T::Ev3InfraredProximity => Layout::Byte,
            T::NxtLightOn | T::NxtLightOff | T::NxtColorRed | T::NxtColorGreen | T::NxtColorBlue | T::NxtColorOff => {
                Layout::Word {
                    signed: false,
                    tenths: false,
                }
            }
            T::Ev3GyroAbs | T::Ev3GyroDps => Layout::Word {
                signed: true,
                tenths: false,
            },
            T::Ev3UltrasonicCm | T::Ev3UltrasonicInches => Layout::Word {
                signed: false,
                tenths: true,
            },
            T::Ev3GyroAbsDps => Layout::WordPair { signed: true },
            T::Ev3ColorRawReflected => Layout::WordPair { signed: false },
            T::Ev3ColorColorComponents => Layout::WordQuad,
            T::NxtColorFull => Layout::NxtColorFull,
            T::Ev3InfraredSeek => Layout::InfraredSeek,
            T::Ev3InfraredRemote => Layout::InfraredRemote,
        };
        Some(layout)
    }

    /// Whether a reply echoing `echoed` belongs to a port configured as `self`.
    ///
    /// The generic TOUCH type is answered as NXT_TOUCH or EV3_TOUCH depending
    /// on what the board detected.
    pub fn accepts_echo(self, echoed: u8) -> bool {
        let echoed = SensorType::try_from(echoed).ok();
        match (self, echoed) {
            (SensorType::Touch, Some(SensorType::NxtTouch | SensorType::Ev3Touch)) => true,
            (expected, Some(actual)) => expected == actual,
            (_, Option::None) => false,
        }
    }
}

/// Board-reported sensor state flag (second byte of every sensor reply).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum SensorState {
    ValidData = 0,
    NotConfigured = 1,
    Configuring = 2,
    NoData = 3,
    I2cError = 4,
}

/// Pin configuration word for [`SensorType::Custom`].
#[bitfield(bytes = 2)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomPinConfig {
    #[skip]
    reserved0: B1,
    /// 9V out on pin 1 (NXT ultrasonic)
    pub pin1_9v: bool,
    #[skip]
    reserved2: B2,
    pub pin5_out: bool,
    /// Output level when `pin5_out` is set
    pub pin5_state: bool,
    #[skip]
    reserved6: B2,
    pub pin6_out: bool,
    /// Output level when `pin6_out` is set
    pub pin6_state: bool,
    #[skip]
    reserved10: B2,
    /// ADC on pin 1 (NXT analog sensors)
    pub pin1_adc: bool,
    #[skip]
    reserved13: B1,
    pub pin6_adc: bool,
    #[skip]
    reserved15: B1,
}

impl CustomPinConfig {
    /// The configuration as sent on the wire (before big-endian encoding).
    pub fn to_word(self) -> u16 {
        u16::from_le_bytes(self.into_bytes())
    }

    pub fn from_word(word: u16) -> Self {
        Self::from_bytes(word.to_le_bytes())
    }
}

/// I2C settings byte for [`SensorType::I2c`].
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct I2cFlags {
    /// Clock pulse between reading and writing (NXT ultrasonic)
    pub mid_clock: bool,
    /// 9V pull-up on pin 1
    pub pin1_9v: bool,
    /// Keep repeating the configured transaction
    pub same: bool,
    pub allow_stretch_ack: bool,
    pub allow_stretch_any: bool,
    #[skip]
    reserved: B3,
}

/// A transaction the board keeps repeating on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I2cRepeat {
    /// Delay between transactions in microseconds
    pub delay_us: u32,
    pub address: u8,
    pub out: Vec<u8>,
    pub in_bytes: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct I2cConfig {
    pub flags: I2cFlags,
    /// Target clock period in microseconds (the real speed varies)
    pub speed_us: u8,
    pub repeat: Option<I2cRepeat>,
}

impl I2cConfig {
    pub fn new(speed_us: u8) -> Self {
        Self {
            flags: I2cFlags::new(),
            speed_us,
            repeat: None,
        }
    }

    pub fn with_flags(mut self, flags: I2cFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Configure a repeated transaction; sets the SAME flag.
    pub fn repeating(mut self, repeat: I2cRepeat) -> Self {
        self.repeat = Some(repeat);
        self
    }

    fn settings_byte(&self) -> u8 {
        let flags = self.flags.with_same(self.repeat.is_some());
        flags.into_bytes()[0]
    }
}

/// What `set_sensor_type` sends for a port.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorConfig {
    /// A type without parameters.
    Plain(SensorType),
    Custom(CustomPinConfig),
    I2c(I2cConfig),
}

impl From<SensorType> for SensorConfig {
    fn from(sensor_type: SensorType) -> Self {
        SensorConfig::Plain(sensor_type)
    }
}

impl SensorConfig {
    pub fn sensor_type(&self) -> SensorType {
        match self {
            SensorConfig::Plain(sensor_type) => *sensor_type,
            SensorConfig::Custom(_) => SensorType::Custom,
            SensorConfig::I2c(_) => SensorType::I2c,
        }
    }

    /// Reply size the board will use for a repeated I2C transaction.
    pub fn i2c_in_bytes(&self) -> Option<u8> {
        match self {
            SensorConfig::I2c(I2cConfig {
                repeat: Some(repeat), ..
            }) => Some(repeat.in_bytes),
            _ => None,
        }
    }

    /// Bytes following `[ports]` in the SET_SENSOR_TYPE request.
    pub fn payload(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(16);
        buf.put_u8(self.sensor_type().into());
        match self {
            SensorConfig::Plain(SensorType::I2c) => {
                return Err(BrickPiError::config("I2C sensor type needs I2C settings"));
            }
            SensorConfig::Plain(SensorType::Custom) => buf.put_u16(0),
            SensorConfig::Plain(_) => {}
            SensorConfig::Custom(pins) => buf.put_u16(pins.to_word()),
            SensorConfig::I2c(config) => {
                buf.put_u8(config.settings_byte());
                buf.put_u8(config.speed_us);
                if let Some(repeat) = &config.repeat {
                    if repeat.out.len() > I2C_MAX_OUT_BYTES {
                        return Err(BrickPiError::config(format!(
                            "repeated I2C transaction writes {} bytes, at most {I2C_MAX_OUT_BYTES} allowed",
                            repeat.out.len()
                        )));
                    }
                    buf.put_u32(repeat.delay_us);
                    buf.put_u8(repeat.address);
                    buf.put_u8(repeat.in_bytes);
                    buf.put_u8(repeat.out.len() as u8);
                    buf.put_slice(&repeat.out);
                }
            }
        }
        Ok(buf.freeze())
    }
}

/// Byte layout of the data that follows the (type, state) echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One byte, passed through.
    Byte,
    /// One 16-bit word; `tenths` divides by 10 (fixed point).
    Word { signed: bool, tenths: bool },
    WordPair { signed: bool },
    WordQuad,
    /// Pin 1/pin 6 ADC values packed into 12 bits each plus two digital bits.
    Custom,
    /// Detected color plus four 10-bit channels split into coarse bytes and a shared fine byte.
    NxtColorFull,
    /// (heading, distance) per infrared channel.
    InfraredSeek,
    /// One remote code per infrared channel.
    InfraredRemote,
    /// Raw bytes of the last I2C transaction, length recorded per port.
    I2c,
}

impl Layout {
    /// Data bytes after the (type, state) echo.
    pub const fn data_len(self, i2c_in_bytes: usize) -> usize {
        match self {
            Layout::Byte => 1,
            Layout::Word { .. } => 2,
            Layout::WordPair { .. } | Layout::Custom | Layout::InfraredRemote => 4,
            Layout::NxtColorFull => 6,
            Layout::WordQuad | Layout::InfraredSeek => 8,
            Layout::I2c => i2c_in_bytes,
        }
    }

    /// Total transfer length of a read request for this layout.
    pub const fn transfer_len(self, i2c_in_bytes: usize) -> usize {
        crate::constants::SENSOR_DATA_OFFSET + self.data_len(i2c_in_bytes)
    }

    /// Decode `data` (exactly [`Layout::data_len`] bytes, checked by
    /// [`decode_sensor_reply`]).
    pub(crate) fn decode(self, data: &[u8]) -> SensorValue {
        match self {
            Layout::Byte => SensorValue::Value(data[0] as i32),
            Layout::Word { signed, tenths } => {
                let value = word(data, 0, signed);
                if tenths {
                    SensorValue::Scaled(value as f64 / 10.0)
                } else {
                    SensorValue::Value(value)
                }
            }
            Layout::WordPair { signed } => SensorValue::Pair([word(data, 0, signed), word(data, 2, signed)]),
            Layout::WordQuad => SensorValue::Quad([
                word(data, 0, false),
                word(data, 2, false),
                word(data, 4, false),
                word(data, 6, false),
            ]),
            Layout::Custom => SensorValue::Custom(CustomReading {
                pin1_adc: ((data[2] as u16 & 0x0F) << 8) | data[3] as u16,
                pin6_adc: ((data[2] as u16 >> 4) & 0x0F) | ((data[1] as u16) << 4),
                pin5_digital: data[0] & 0x01 != 0,
                pin6_digital: (data[0] >> 1) & 0x01 != 0,
            }),
            Layout::NxtColorFull => {
                let fine = data[5];
                let channel = |coarse: u8, shift: u8| ((coarse as u16) << 2) | ((fine >> shift) & 0x03) as u16;
                SensorValue::ColorFull(NxtColorReading {
                    color: data[0],
                    red: channel(data[1], 6),
                    green: channel(data[2], 4),
                    blue: channel(data[3], 2),
                    ambient: channel(data[4], 0),
                })
            }
            Layout::InfraredSeek => SensorValue::Seek(std::array::from_fn(|i| SeekChannel {
                heading: data[2 * i] as i8,
                distance: data[2 * i + 1] as i8,
            })),
            Layout::InfraredRemote => SensorValue::Remote(std::array::from_fn(|i| RemoteButtons::from_code(data[i]))),
            Layout::I2c => SensorValue::I2c(data.to_vec()),
        }
    }
}

fn word(data: &[u8], offset: usize, signed: bool) -> i32 {
    let raw = read_be(data, offset, Width::W16);
    if signed {
        sign_extend(raw, Width::W16)
    } else {
        raw as i32
    }
}

/// Decoded [`SensorType::Custom`] reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CustomReading {
    /// Pin 1 ADC, 5V scale, 0-4095
    pub pin1_adc: u16,
    /// Pin 6 ADC, 3.3V scale, 0-4095
    pub pin6_adc: u16,
    pub pin5_digital: bool,
    pub pin6_digital: bool,
}

/// Decoded [`SensorType::NxtColorFull`] reading. Channels are 10-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NxtColorReading {
    pub color: u8,
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub ambient: u16,
}

/// One channel of [`SensorType::Ev3InfraredSeek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeekChannel {
    /// -25 to 25
    pub heading: i8,
    /// -128 (no beacon) or 0 to 100
    pub distance: i8,
}

/// Buttons pressed on one channel of the EV3 infrared remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RemoteButtons {
    pub red_up: bool,
    pub red_down: bool,
    pub blue_up: bool,
    pub blue_down: bool,
    pub broadcast: bool,
}

// Indexed by remote code; [red up, red down, blue up, blue down, broadcast].
const REMOTE_CODES: [[u8; 5]; 12] = [
    [0, 0, 0, 0, 0],
    [1, 0, 0, 0, 0],
    [0, 1, 0, 0, 0],
    [0, 0, 1, 0, 0],
    [0, 0, 0, 1, 0],
    [1, 0, 1, 0, 0],
    [1, 0, 0, 1, 0],
    [0, 1, 1, 0, 0],
    [0, 1, 0, 1, 0],
    [0, 0, 0, 0, 1],
    [1, 1, 0, 0, 0],
    [0, 0, 1, 1, 0],
];

impl RemoteButtons {
    /// Map a raw remote code; 0 and unknown codes mean nothing pressed.
    pub fn from_code(code: u8) -> Self {
        let bits = REMOTE_CODES.get(code as usize).copied().unwrap_or_default();
        Self {
            red_up: bits[0] != 0,
            red_down: bits[1] != 0,
            blue_up: bits[2] != 0,
            blue_down: bits[3] != 0,
            broadcast: bits[4] != 0,
        }
    }

    /// `[red up, red down, blue up, blue down, broadcast]` as 0/1.
    pub fn to_array(self) -> [u8; 5] {
        [
            self.red_up as u8,
            self.red_down as u8,
            self.blue_up as u8,
            self.blue_down as u8,
            self.broadcast as u8,
        ]
    }
}

/// A decoded sensor reading.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SensorValue {
    /// Single integer (touch state, light level, gyro angle, ...).
    Value(i32),
    /// Fixed-point tenths already divided out (ultrasonic distance).
    Scaled(f64),
    Pair([i32; 2]),
    Quad([i32; 4]),
    Custom(CustomReading),
    ColorFull(NxtColorReading),
    Seek([SeekChannel; 4]),
    Remote([RemoteButtons; 4]),
    I2c(Vec<u8>),
}

impl SensorValue {
    /// Numeric value of single-value readings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SensorValue::Value(value) => Some(*value as f64),
            SensorValue::Scaled(value) => Some(*value),
            _ => None,
        }
    }
}

/// Validate and decode the bytes following the sync marker of a sensor reply.
///
/// `expected` is the port's shadow type; `i2c_in_bytes` its recorded I2C
/// reply size (ignored for other layouts).
pub fn decode_sensor_reply(
    port: SensorPort,
    expected: SensorType,
    i2c_in_bytes: usize,
    payload: &[u8],
) -> Result<SensorValue> {
    let layout = expected.layout().ok_or_else(|| not_configured(port))?;
    let sensor_error = |kind| BrickPiError::Sensor { port, kind };

    if payload.len() < SENSOR_HEADER_SIZE {
        return Err(sensor_error(SensorErrorKind::ShortReply {
            expected: SENSOR_HEADER_SIZE,
            actual: payload.len(),
        }));
    }
    let (echoed, state) = (payload[0], payload[1]);
    if !expected.accepts_echo(echoed) {
        return Err(sensor_error(SensorErrorKind::TypeMismatch {
            expected,
            actual: echoed,
        }));
    }
    match SensorState::try_from(state) {
        Ok(SensorState::ValidData) => {}
        Ok(other) => return Err(sensor_error(SensorErrorKind::InvalidState(other))),
        Err(_) => return Err(sensor_error(SensorErrorKind::UnknownState(state))),
    }

    let data = &payload[SENSOR_HEADER_SIZE..];
    let needed = layout.data_len(i2c_in_bytes);
    if layout == Layout::I2c {
        if data.len() != needed {
            return Err(sensor_error(SensorErrorKind::I2cLength {
                expected: needed,
                actual: data.len(),
            }));
        }
    } else if data.len() < needed {
        return Err(sensor_error(SensorErrorKind::ShortReply {
            expected: SENSOR_HEADER_SIZE + needed,
            actual: payload.len(),
        }));
    }
    Ok(layout.decode(&data[..needed]))
}

pub(crate) fn not_configured(port: SensorPort) -> BrickPiError {
    BrickPiError::config(format!("sensor on {port} not configured or not supported"))
}
