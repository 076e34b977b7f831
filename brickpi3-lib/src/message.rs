//! SPI message catalogue.
//!
//! Identifiers are fixed by the board firmware and never reused for another
//! meaning. Per-port read messages come in runs of four consecutive ids, one
//! per port.

use crate::codec::Width;
use crate::constants::{ID_TRANSFER_LEN, INFO_STRING_TRANSFER_LEN, MOTOR_STATUS_TRANSFER_LEN};
use crate::port::{MotorPort, SensorPort};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum MessageType {
    None = 0,

    GetManufacturer = 1,
    GetName = 2,
    GetHardwareVersion = 3,
    GetFirmwareVersion = 4,
    GetId = 5,
    SetLed = 6,
    GetVoltage3v3 = 7,
    GetVoltage5v = 8,
    GetVoltage9v = 9,
    GetVoltageVcc = 10,
    SetAddress = 11,

    SetSensorType = 12,

    GetSensor1 = 13,
    GetSensor2 = 14,
    GetSensor3 = 15,
    GetSensor4 = 16,

    I2cTransact1 = 17,
    I2cTransact2 = 18,
    I2cTransact3 = 19,
    I2cTransact4 = 20,

    SetMotorPower = 21,
    SetMotorPosition = 22,
    SetMotorPositionKp = 23,
    SetMotorPositionKd = 24,
    SetMotorDps = 25,
    SetMotorDpsKp = 26,
    SetMotorDpsKd = 27,
    SetMotorLimits = 28,
    OffsetMotorEncoder = 29,

    GetMotorAEncoder = 30,
    GetMotorBEncoder = 31,
    GetMotorCEncoder = 32,
    GetMotorDEncoder = 33,

    GetMotorAStatus = 34,
    GetMotorBStatus = 35,
    GetMotorCStatus = 36,
    GetMotorDStatus = 37,
}

/// How the reply to a message is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Write-only; the reply carries nothing.
    None,
    /// NUL-terminated ASCII string.
    InfoString,
    /// 128-bit serial number.
    Id,
    /// Single big-endian scalar.
    Scalar(Width),
    /// Echoed sensor type + state + layout-specific data.
    Sensor,
    /// Motor flags, power, encoder and speed.
    MotorStatus,
}

impl MessageType {
    /// Reply interpretation for this message.
    pub const fn reply_kind(self) -> ReplyKind {
        use MessageType::*;
        match self {
            GetManufacturer | GetName => ReplyKind::InfoString,
            GetId => ReplyKind::Id,
            GetHardwareVersion | GetFirmwareVersion => ReplyKind::Scalar(Width::W32),
            GetVoltage3v3 | GetVoltage5v | GetVoltage9v | GetVoltageVcc => ReplyKind::Scalar(Width::W16),
            GetMotorAEncoder | GetMotorBEncoder | GetMotorCEncoder | GetMotorDEncoder => {
                ReplyKind::Scalar(Width::W32)
            }
            GetSensor1 | GetSensor2 | GetSensor3 | GetSensor4 => ReplyKind::Sensor,
            GetMotorAStatus | GetMotorBStatus | GetMotorCStatus | GetMotorDStatus => ReplyKind::MotorStatus,
            _ => ReplyKind::None,
        }
    }

    /// Minimum total transfer length needed to clock in the reply.
    ///
    /// Sensor replies depend on the configured sensor type, so this only
    /// covers the sync byte plus the (type, state) echo for them.
    pub const fn min_reply_len(self) -> usize {
        match self.reply_kind() {
            ReplyKind::None => 0,
            ReplyKind::InfoString => INFO_STRING_TRANSFER_LEN,
            ReplyKind::Id => ID_TRANSFER_LEN,
            ReplyKind::Scalar(width) => 4 + width.bytes(),
            ReplyKind::Sensor => 6,
            ReplyKind::MotorStatus => MOTOR_STATUS_TRANSFER_LEN,
        }
    }

    /// Sensor read message for a single port.
    pub fn get_sensor(port: SensorPort) -> crate::Result<Self> {
        Self::per_port(MessageType::GetSensor1, port.single_index()?)
    }

    /// I2C transaction message for a single port.
    pub fn i2c_transact(port: SensorPort) -> crate::Result<Self> {
        Self::per_port(MessageType::I2cTransact1, port.single_index()?)
    }

    /// Encoder read message for a single port.
    pub fn get_motor_encoder(port: MotorPort) -> crate::Result<Self> {
        Self::per_port(MessageType::GetMotorAEncoder, port.single_index()?)
    }

    /// Status read message for a single port.
    pub fn get_motor_status(port: MotorPort) -> crate::Result<Self> {
        Self::per_port(MessageType::GetMotorAStatus, port.single_index()?)
    }

    fn per_port(first: MessageType, index: usize) -> crate::Result<Self> {
        let id = u8::from(first) + index as u8;
        MessageType::try_from(id)
            .map_err(|_| crate::BrickPiError::config(format!("no message for port index {index} after {first}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_ids_are_stable() {
        assert_eq!(u8::from(MessageType::GetManufacturer), 1);
        assert_eq!(u8::from(MessageType::SetAddress), 11);
        assert_eq!(u8::from(MessageType::SetSensorType), 12);
        assert_eq!(u8::from(MessageType::SetMotorPower), 21);
        assert_eq!(u8::from(MessageType::OffsetMotorEncoder), 29);
        assert_eq!(u8::from(MessageType::GetMotorDStatus), 37);
        for id in 0..=37u8 {
            assert_eq!(u8::from(MessageType::try_from(id).unwrap()), id);
        }
        assert!(MessageType::try_from(38).is_err());
    }

    #[test]
    fn test_per_port_selection() {
        assert_eq!(MessageType::get_sensor(SensorPort::PORT_3).unwrap(), MessageType::GetSensor3);
        assert_eq!(MessageType::i2c_transact(SensorPort::PORT_4).unwrap(), MessageType::I2cTransact4);
        assert_eq!(
            MessageType::get_motor_encoder(MotorPort::PORT_B).unwrap(),
            MessageType::GetMotorBEncoder
        );
        assert_eq!(
            MessageType::get_motor_status(MotorPort::PORT_D).unwrap(),
            MessageType::GetMotorDStatus
        );
        assert!(MessageType::get_sensor(SensorPort::PORT_1 | SensorPort::PORT_2).is_err());
    }

    #[test]
    fn test_reply_lengths() {
        assert_eq!(MessageType::GetManufacturer.min_reply_len(), 24);
        assert_eq!(MessageType::GetId.min_reply_len(), 20);
        assert_eq!(MessageType::GetVoltage5v.min_reply_len(), 6);
        assert_eq!(MessageType::GetFirmwareVersion.min_reply_len(), 8);
        assert_eq!(MessageType::GetMotorAStatus.min_reply_len(), 12);
        assert_eq!(MessageType::SetMotorPower.reply_kind(), ReplyKind::None);
    }
}
