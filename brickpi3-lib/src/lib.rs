pub mod codec;
pub mod constants;
pub mod device;
pub mod error;
pub mod frame;
pub mod gear;
pub mod helpers;
pub mod info;
pub mod message;
pub mod motor;
pub mod poller;
pub mod port;
pub mod sensor;
pub mod transport;

// Re-export the main types for easy access
pub use device::{set_address, BoardInfo, BrickPi3, DeviceConfig};
pub use error::{BrickPiError, Result, SensorErrorKind};
pub use port::{MotorPort, SensorPort};
pub use sensor::{SensorConfig, SensorType, SensorValue};
pub use transport::{SharedTransport, Transport};
