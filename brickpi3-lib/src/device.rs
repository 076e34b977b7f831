use crate::codec::{read_be, sign_extend, Width};
use crate::constants::*;
use crate::error::{BrickPiError, Result};
use crate::frame::{parse_reply, Request};
use crate::info::{decode_id, decode_info_string, parse_id, FirmwareVersion};
use crate::message::MessageType;
use crate::motor::MotorStatus;
use crate::poller::poll_until_valid;
use crate::port::{MotorPort, SensorPort};
use crate::sensor::{decode_sensor_reply, not_configured, SensorConfig, SensorType, SensorValue};
use crate::transport::Transport;
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, info};

/// Per-device settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Bus address, 1-255
    pub address: u8,
    /// Deadline for sensor reads to reach VALID_DATA
    pub sensor_timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            sensor_timeout: SENSOR_CONFIG_TIMEOUT,
        }
    }
}

impl DeviceConfig {
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_sensor_timeout(mut self, timeout: Duration) -> Self {
        self.sensor_timeout = timeout;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.address == BROADCAST_ADDRESS {
            return Err(BrickPiError::config("SPI address must be in the range of 1 to 255"));
        }
        Ok(())
    }
}

/// Identity reported by a board that passed [`BrickPi3::detect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardInfo {
    pub manufacturer: String,
    pub board: String,
    pub firmware: FirmwareVersion,
}

/// One BrickPi3 on the bus.
///
/// Holds the driver's shadow of each sensor port's configured type and I2C
/// read length. The shadow is updated before SET_SENSOR_TYPE is sent, so a
/// failed transfer leaves it ahead of the board.
pub struct BrickPi3<T> {
    transport: T,
    config: DeviceConfig,
    sensor_types: [SensorType; 4],
    i2c_in_bytes: [u8; 4],
}

impl<T: Transport> BrickPi3<T> {
    /// Device at the default address with default timeouts.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            config: DeviceConfig::default(),
            sensor_types: [SensorType::None; 4],
            i2c_in_bytes: [0; 4],
        }
    }

    pub fn with_config(transport: T, config: DeviceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(transport)
        })
    }

    pub fn with_address(transport: T, address: u8) -> Result<Self> {
        Self::with_config(transport, DeviceConfig::default().with_address(address))
    }

    pub fn address(&self) -> u8 {
        self.config.address
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Shadow sensor type of a single port.
    pub fn sensor_type(&self, port: SensorPort) -> Result<SensorType> {
        Ok(self.sensor_types[port.single_index()?])
    }

    /// Recorded I2C read length of a single port.
    pub fn i2c_in_bytes(&self, port: SensorPort) -> Result<u8> {
        Ok(self.i2c_in_bytes[port.single_index()?])
    }

    fn request(&self, message_type: MessageType) -> Request {
        Request::new(self.config.address, message_type)
    }

    async fn transfer(&mut self, frame: &[u8]) -> Result<Bytes> {
        debug!(bytes = hex::encode(frame), "SPI Write");
        let reply = self.transport.transfer(frame).await?;
        debug!(bytes = hex::encode(&reply), "SPI Read");
        Ok(reply)
    }

    /// Send a write-only request. The reply is not inspected.
    async fn write(&mut self, request: Request) -> Result<()> {
        let frame = request.build();
        self.transfer(&frame).await?;
        Ok(())
    }

    /// Send a request padded to `len` bytes and return the payload after the sync marker.
    async fn exchange(&mut self, request: Request, len: usize) -> Result<Bytes> {
        let message_type = request.message_type();
        let frame = request.padded_to(len).build();
        let reply = self.transfer(&frame).await?;
        let payload = parse_reply(message_type, &reply)?;
        if payload.len() + PAYLOAD_OFFSET < len {
            return Err(BrickPiError::NoResponse { message_type });
        }
        Ok(payload)
    }

    async fn read_scalar(&mut self, message_type: MessageType, width: Width) -> Result<u32> {
        let payload = self.exchange(self.request(message_type), message_type.min_reply_len()).await?;
        Ok(read_be(&payload, 0, width))
    }

    async fn read_string(&mut self, message_type: MessageType) -> Result<String> {
        let payload = self.exchange(self.request(message_type), INFO_STRING_TRANSFER_LEN).await?;
        Ok(decode_info_string(&payload))
    }

    async fn read_voltage(&mut self, message_type: MessageType) -> Result<f64> {
        let millivolts = self.read_scalar(message_type, Width::W16).await?;
        Ok(millivolts as f64 / 1000.0)
    }

    pub async fn get_manufacturer(&mut self) -> Result<String> {
        self.read_string(MessageType::GetManufacturer).await
    }

    pub async fn get_board(&mut self) -> Result<String> {
        self.read_string(MessageType::GetName).await
    }

    pub async fn get_version_hardware(&mut self) -> Result<FirmwareVersion> {
        let packed = self.read_scalar(MessageType::GetHardwareVersion, Width::W32).await?;
        Ok(FirmwareVersion::from_packed(packed))
    }

    pub async fn get_version_firmware(&mut self) -> Result<FirmwareVersion> {
        let packed = self.read_scalar(MessageType::GetFirmwareVersion, Width::W32).await?;
        Ok(FirmwareVersion::from_packed(packed))
    }

    /// 128-bit serial number as 32 lowercase hex chars.
    pub async fn get_id(&mut self) -> Result<String> {
        let payload = self.exchange(self.request(MessageType::GetId), ID_TRANSFER_LEN).await?;
        Ok(decode_id(&payload))
    }

    /// LED brightness 0-100; -1 hands the LED back to the firmware.
    pub async fn set_led(&mut self, value: i8) -> Result<()> {
        self.write(self.request(MessageType::SetLed).be(Width::W8, value.into())).await
    }

    pub async fn get_voltage_3v3(&mut self) -> Result<f64> {
        self.read_voltage(MessageType::GetVoltage3v3).await
    }

    pub async fn get_voltage_5v(&mut self) -> Result<f64> {
        self.read_voltage(MessageType::GetVoltage5v).await
    }

    pub async fn get_voltage_9v(&mut self) -> Result<f64> {
        self.read_voltage(MessageType::GetVoltage9v).await
    }

    pub async fn get_voltage_battery(&mut self) -> Result<f64> {
        self.read_voltage(MessageType::GetVoltageVcc).await
    }

    /// Configure one or more sensor ports.
    pub async fn set_sensor_type(&mut self, ports: SensorPort, config: impl Into<SensorConfig>) -> Result<()> {
        let config = config.into();
        let payload = config.payload()?;
        let sensor_type = config.sensor_type();
        let in_bytes = config.i2c_in_bytes();
        for index in ports.indices() {
            self.sensor_types[index] = sensor_type;
            if let Some(in_bytes) = in_bytes {
                self.i2c_in_bytes[index] = in_bytes;
            }
        }
        debug!(%ports, %sensor_type, "Set sensor type");
        self.write(self.request(MessageType::SetSensorType).u8(ports.bits()).bytes(&payload))
            .await
    }

    /// Read a sensor, waiting up to the configured timeout for VALID_DATA.
    pub async fn get_sensor(&mut self, port: SensorPort) -> Result<SensorValue> {
        let timeout = self.config.sensor_timeout;
        self.get_sensor_within(port, timeout).await
    }

    /// Read a sensor, waiting up to `timeout` for VALID_DATA.
    pub async fn get_sensor_within(&mut self, port: SensorPort, timeout: Duration) -> Result<SensorValue> {
        let index = port.single_index()?;
        let message_type = MessageType::get_sensor(port)?;
        let sensor_type = self.sensor_types[index];
        let in_bytes = self.i2c_in_bytes[index] as usize;
        let layout = sensor_type.layout().ok_or_else(|| not_configured(port))?;

        let frame = self.request(message_type).padded_to(layout.transfer_len(in_bytes)).build();
        debug!(bytes = hex::encode(&frame), %port, "SPI Write (polling)");
        let payload = poll_until_valid(&mut self.transport, port, message_type, &frame, timeout).await?;
        debug!(bytes = hex::encode(&payload), %port, "SPI Read (valid)");
        decode_sensor_reply(port, sensor_type, in_bytes, &payload)
    }

    /// Start an I2C transaction on a port configured as I2C.
    ///
    /// At most 16 bytes of `out` are written; the result is read back with
    /// [`get_sensor`](Self::get_sensor).
    pub async fn transact_i2c(&mut self, port: SensorPort, address: u8, out: &[u8], in_bytes: u8) -> Result<()> {
        let index = port.single_index()?;
        let message_type = MessageType::i2c_transact(port)?;
        if self.sensor_types[index] != SensorType::I2c {
            return Err(BrickPiError::config(format!("{port} is not configured for I2C")));
        }
        self.i2c_in_bytes[index] = in_bytes;
        let out = &out[..out.len().min(I2C_MAX_OUT_BYTES)];
        let request = self
            .request(message_type)
            .u8(address)
            .u8(in_bytes)
            .u8(out.len() as u8)
            .bytes(out);
        self.write(request).await
    }

    /// Power in percent (-100 to 100); [`MOTOR_FLOAT`] lets the motors float.
    pub async fn set_motor_power(&mut self, ports: MotorPort, power: i8) -> Result<()> {
        let request = self
            .request(MessageType::SetMotorPower)
            .u8(ports.bits())
            .be(Width::W8, power.into());
        self.write(request).await
    }

    /// Target position in degrees.
    pub async fn set_motor_position(&mut self, ports: MotorPort, position: i32) -> Result<()> {
        let request = self
            .request(MessageType::SetMotorPosition)
            .u8(ports.bits())
            .be(Width::W32, position.into());
        self.write(request).await
    }

    pub async fn set_motor_position_kp(&mut self, ports: MotorPort, kp: u8) -> Result<()> {
        self.write(self.request(MessageType::SetMotorPositionKp).u8(ports.bits()).u8(kp))
            .await
    }

    pub async fn set_motor_position_kd(&mut self, ports: MotorPort, kd: u8) -> Result<()> {
        self.write(self.request(MessageType::SetMotorPositionKd).u8(ports.bits()).u8(kd))
            .await
    }

    /// Target speed in degrees per second.
    pub async fn set_motor_dps(&mut self, ports: MotorPort, dps: i16) -> Result<()> {
        let request = self
            .request(MessageType::SetMotorDps)
            .u8(ports.bits())
            .be(Width::W16, dps.into());
        self.write(request).await
    }

    pub async fn set_motor_dps_kp(&mut self, ports: MotorPort, kp: u8) -> Result<()> {
        self.write(self.request(MessageType::SetMotorDpsKp).u8(ports.bits()).u8(kp))
            .await
    }

    pub async fn set_motor_dps_kd(&mut self, ports: MotorPort, kd: u8) -> Result<()> {
        self.write(self.request(MessageType::SetMotorDpsKd).u8(ports.bits()).u8(kd))
            .await
    }

    /// Power limit in percent (0 = unlimited) and speed limit in dps (0 = unlimited).
    pub async fn set_motor_limits(&mut self, ports: MotorPort, power: u8, dps: u16) -> Result<()> {
        let request = self
            .request(MessageType::SetMotorLimits)
            .u8(ports.bits())
            .u8(power)
            .be(Width::W16, dps.into());
        self.write(request).await
    }

    /// Shift the encoder origin by `offset` degrees.
    pub async fn offset_motor_encoder(&mut self, ports: MotorPort, offset: i32) -> Result<()> {
        let request = self
            .request(MessageType::OffsetMotorEncoder)
            .u8(ports.bits())
            .be(Width::W32, offset.into());
        self.write(request).await
    }

    /// Encoder position in degrees.
    pub async fn get_motor_encoder(&mut self, port: MotorPort) -> Result<i32> {
        let message_type = MessageType::get_motor_encoder(port)?;
        let raw = self.read_scalar(message_type, Width::W32).await?;
        Ok(sign_extend(raw, Width::W32))
    }

    pub async fn get_motor_status(&mut self, port: MotorPort) -> Result<MotorStatus> {
        let message_type = MessageType::get_motor_status(port)?;
        let payload = self
            .exchange(self.request(message_type), MotorStatus::transfer_len())
            .await?;
        MotorStatus::from_payload(&payload).ok_or(BrickPiError::NoResponse { message_type })
    }

    /// Put every port back into its power-on state.
    ///
    /// Stops at the first failing step.
    pub async fn reset_all(&mut self) -> Result<()> {
        info!(address = self.config.address, "Resetting BrickPi3");
        self.set_sensor_type(SensorPort::ALL, SensorType::None).await?;
        self.set_motor_power(MotorPort::ALL, MOTOR_FLOAT).await?;
        self.set_motor_limits(MotorPort::ALL, 0, 0).await?;
        self.set_motor_position_kp(MotorPort::ALL, DEFAULT_POSITION_KP).await?;
        self.set_motor_position_kd(MotorPort::ALL, DEFAULT_POSITION_KD).await?;
        self.set_led(LED_FIRMWARE_CONTROL).await
    }

    /// Check that a supported BrickPi3 answers at this address.
    pub async fn detect(&mut self) -> Result<BoardInfo> {
        let manufacturer = self.get_manufacturer().await?;
        let board = self.get_board().await?;
        let firmware = self.get_version_firmware().await?;

        if manufacturer != EXPECTED_MANUFACTURER || board != EXPECTED_BOARD {
            return Err(BrickPiError::DetectionFailed(format!(
                "no BrickPi3 at address {}: manufacturer {manufacturer:?}, board {board:?}",
                self.config.address
            )));
        }
        if !firmware.matches(FIRMWARE_VERSION_REQUIRED) {
            return Err(BrickPiError::DetectionFailed(format!(
                "BrickPi3 firmware needs to be version {FIRMWARE_VERSION_REQUIRED} but is currently version {firmware}"
            )));
        }
        info!(%firmware, address = self.config.address, "Detected BrickPi3");
        Ok(BoardInfo {
            manufacturer,
            board,
            firmware,
        })
    }
}

/// Assign `address` to the board whose serial number is `id`.
///
/// Sent to the broadcast address. An empty `id` targets any board, which only
/// makes sense with a single board on the bus.
pub async fn set_address<T: Transport>(transport: &mut T, address: u8, id: &str) -> Result<()> {
    if address == BROADCAST_ADDRESS {
        return Err(BrickPiError::config("SPI address must be in the range of 1 to 255"));
    }
    let id_bytes = parse_id(id)?;
    let frame = Request::new(BROADCAST_ADDRESS, MessageType::SetAddress)
        .u8(address)
        .bytes(&id_bytes)
        .build();
    info!(address, id, "Assigning SPI address");
    debug!(bytes = hex::encode(&frame), "SPI Write");
    transport.transfer(&frame).await?;
    Ok(())
}
