// Protocol constants for the BrickPi3

use std::time::Duration;

/// Value the board writes at [`SYNC_OFFSET`] when it populated the reply
pub const SYNC_MARKER: u8 = 0xA5;

/// Offset of the sync marker in every reply (bytes 0-2 are echo/reserved)
pub const SYNC_OFFSET: usize = 3;

/// Offset of the first message-specific reply byte
pub const PAYLOAD_OFFSET: usize = SYNC_OFFSET + 1;

/// Size of the outbound header (address + message type)
pub const REQUEST_HEADER_SIZE: usize = 2;

/// Sensor replies echo (type, state) before the sensor data
pub const SENSOR_HEADER_SIZE: usize = 2;

/// Offset of the sensor data in a sensor reply
pub const SENSOR_DATA_OFFSET: usize = PAYLOAD_OFFSET + SENSOR_HEADER_SIZE;

/// Total transfer length for the 20-character info strings (manufacturer, board)
pub const INFO_STRING_TRANSFER_LEN: usize = 24;

/// Maximum characters in an info string
pub const INFO_STRING_MAX_LEN: usize = 20;

/// Total transfer length for the 128-bit serial number query
pub const ID_TRANSFER_LEN: usize = 20;

/// Length of the board serial number in bytes
pub const ID_LEN: usize = 16;

/// Length of the board serial number as a hex string
pub const ID_HEX_LEN: usize = ID_LEN * 2;

/// Total transfer length for a motor status query
pub const MOTOR_STATUS_TRANSFER_LEN: usize = 12;

/// Maximum bytes written in one I2C transaction
pub const I2C_MAX_OUT_BYTES: usize = 16;

/// Address used for the provisioning broadcast
pub const BROADCAST_ADDRESS: u8 = 0;

/// Default device address
pub const DEFAULT_ADDRESS: u8 = 1;

/// Manufacturer string reported by a genuine board
pub const EXPECTED_MANUFACTURER: &str = "Dexter Industries";

/// Board name reported by a genuine board
pub const EXPECTED_BOARD: &str = "BrickPi3";

/// Firmware line this driver speaks (major.minor must match)
pub const FIRMWARE_VERSION_REQUIRED: &str = "1.4.x";

/// Motor power value that lets the motor float
pub const MOTOR_FLOAT: i8 = -128;

/// Default position control KP constant
pub const DEFAULT_POSITION_KP: u8 = 25;

/// Default position control KD constant
pub const DEFAULT_POSITION_KD: u8 = 70;

/// LED value that hands control back to the firmware
pub const LED_FIRMWARE_CONTROL: i8 = -1;

/// Default deadline for the sensor configuration poller
pub const SENSOR_CONFIG_TIMEOUT: Duration = Duration::from_millis(3000);

/// Default deadline for the wait-for-sensor-value helper
pub const WAIT_FOR_SENSOR_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Delay between reads in the wait-for-sensor-value helper
pub const WAIT_FOR_SENSOR_INTERVAL: Duration = Duration::from_millis(10);

/// Delay between encoder/status reads in the motor helpers
pub const MOTOR_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Default time limit for motor searches
pub const MOTOR_SEARCH_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Speed (dps) at or below which a searching motor counts as stalled
pub const MOTOR_STALL_DPS: i16 = 25;

/// Default power used when searching for a mechanical limit
pub const MOTOR_SEARCH_POWER: i8 = 100;
