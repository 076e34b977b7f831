use anyhow::{Context, Result, bail};
use brickpi3_lib::sensor::{CustomPinConfig, I2cConfig};
use brickpi3_lib::{BrickPi3, DeviceConfig, MotorPort, SensorConfig, SensorPort, SensorType, Transport, set_address};
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Build BrickPi3 request frames and decode captured replies, without a bus.
///
/// Every frame the driver would send is printed as hex. Replies are taken
/// from `--reply` in order; once they run out the bus answers with zeros.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Device address
    #[arg(short, long, default_value_t = 1)]
    address: u8,
    /// Reply frame as hex (repeatable, consumed in order)
    #[arg(short, long = "reply", value_name = "HEX")]
    replies: Vec<String>,
    /// Sensor poll timeout in milliseconds
    #[arg(long, default_value_t = 3000)]
    sensor_timeout_ms: u64,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read the manufacturer string
    Manufacturer,
    /// Read the board name
    Board,
    /// Read the firmware (or hardware) version
    Version {
        #[arg(long)]
        hardware: bool,
    },
    /// Read the serial number
    Id,
    /// Read a supply voltage
    Voltage {
        #[arg(value_enum)]
        rail: Rail,
    },
    /// Set the LED (-1 returns it to the firmware)
    Led {
        #[arg(allow_hyphen_values = true)]
        value: i8,
    },
    /// Assign an address to the board with the given serial number
    SetAddress {
        new_address: u8,
        #[arg(default_value = "")]
        id: String,
    },
    /// Configure sensor ports (e.g. `1+3 EV3_TOUCH`)
    SensorType {
        ports: String,
        sensor_type: String,
        /// CUSTOM pin configuration word, hex
        #[arg(long, value_name = "HEX")]
        pins: Option<String>,
        /// I2C target speed in microseconds
        #[arg(long, default_value_t = 0)]
        i2c_speed: u8,
    },
    /// Configure a port and read it
    Sensor { port: String, sensor_type: String },
    /// Set motor power in percent (-128 floats)
    MotorPower {
        ports: String,
        #[arg(allow_hyphen_values = true)]
        power: i8,
    },
    /// Set motor target position in degrees
    MotorPosition {
        ports: String,
        #[arg(allow_hyphen_values = true)]
        position: i32,
    },
    /// Set motor target speed in degrees per second
    MotorDps {
        ports: String,
        #[arg(allow_hyphen_values = true)]
        dps: i16,
    },
    /// Set motor power and speed limits (0 = unlimited)
    MotorLimits { ports: String, power: u8, dps: u16 },
    /// Offset motor encoders
    OffsetEncoder {
        ports: String,
        #[arg(allow_hyphen_values = true)]
        offset: i32,
    },
    /// Read a motor encoder
    Encoder { port: String },
    /// Read a motor status
    Status { port: String },
    /// Send the full reset sequence
    ResetAll,
    /// Query identity and firmware
    Detect,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Rail {
    #[value(name = "3v3")]
    V3v3,
    #[value(name = "5v")]
    V5,
    #[value(name = "9v")]
    V9,
    Battery,
}

/// Prints every transfer and plays back canned replies.
struct Replay {
    replies: VecDeque<Vec<u8>>,
}

impl Transport for Replay {
    async fn transfer(&mut self, data: &[u8]) -> io::Result<Bytes> {
        println!("-> {}", hex::encode(data));
        let reply = self.replies.pop_front().unwrap_or_else(|| vec![0; data.len()]);
        println!("<- {}", hex::encode(&reply));
        Ok(Bytes::from(reply))
    }
}

fn setup_logging(verbosity: &Verbosity<InfoLevel>) {
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).without_time())
        .init();
}

fn parse_motor_ports(text: &str) -> Result<MotorPort> {
    let mut bits = 0u8;
    for name in text.split('+') {
        bits |= match name.trim().to_ascii_uppercase().trim_start_matches("PORT_") {
            "A" => 0x01,
            "B" => 0x02,
            "C" => 0x04,
            "D" => 0x08,
            other => bail!("unknown motor port {other:?}"),
        };
    }
    Ok(MotorPort::from_bits(bits)?)
}

fn parse_sensor_ports(text: &str) -> Result<SensorPort> {
    let mut bits = 0u8;
    for name in text.split('+') {
        let index: usize = name
            .trim()
            .to_ascii_uppercase()
            .trim_start_matches("PORT_")
            .parse()
            .with_context(|| format!("unknown sensor port {name:?}"))?;
        let port = index
            .checked_sub(1)
            .and_then(SensorPort::from_index)
            .with_context(|| format!("sensor port {index} out of range 1-4"))?;
        bits |= port.bits();
    }
    Ok(SensorPort::from_bits(bits)?)
}

fn parse_sensor_type(name: &str) -> Result<SensorType> {
    SensorType::from_name(name).with_context(|| format!("unknown sensor type {name:?}"))
}

fn sensor_config(sensor_type: SensorType, pins: Option<&str>, i2c_speed: u8) -> Result<SensorConfig> {
    Ok(match sensor_type {
        SensorType::Custom => {
            let word = match pins {
                Some(hex) => u16::from_str_radix(hex.trim_start_matches("0x"), 16)
                    .with_context(|| format!("invalid pin configuration {hex:?}"))?,
                None => 0,
            };
            SensorConfig::Custom(CustomPinConfig::from_word(word))
        }
        SensorType::I2c => SensorConfig::I2c(I2cConfig::new(i2c_speed)),
        other => SensorConfig::Plain(other),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.verbose);

    let replies = cli
        .replies
        .iter()
        .map(|r| hex::decode(r.replace([' ', ':'], "")).with_context(|| format!("invalid reply hex {r:?}")))
        .collect::<Result<VecDeque<_>>>()?;
    debug!(count = replies.len(), "Loaded canned replies");
    let transport = Replay { replies };

    let config = DeviceConfig::default()
        .with_address(cli.address)
        .with_sensor_timeout(Duration::from_millis(cli.sensor_timeout_ms));
    let mut brick = BrickPi3::with_config(transport, config)?;
    run(&mut brick, cli.command).await
}

async fn run(brick: &mut BrickPi3<Replay>, command: Command) -> Result<()> {
    match command {
        Command::Manufacturer => println!("{}", brick.get_manufacturer().await?),
        Command::Board => println!("{}", brick.get_board().await?),
        Command::Version { hardware: false } => println!("firmware {}", brick.get_version_firmware().await?),
        Command::Version { hardware: true } => println!("hardware {}", brick.get_version_hardware().await?),
        Command::Id => println!("{}", brick.get_id().await?),
        Command::Voltage { rail } => {
            let volts = match rail {
                Rail::V3v3 => brick.get_voltage_3v3().await?,
                Rail::V5 => brick.get_voltage_5v().await?,
                Rail::V9 => brick.get_voltage_9v().await?,
                Rail::Battery => brick.get_voltage_battery().await?,
            };
            println!("{volts:.3} V");
        }
        Command::Led { value } => brick.set_led(value).await?,
        Command::SensorType {
            ports,
            sensor_type,
            pins,
            i2c_speed,
        } => {
            let config = sensor_config(parse_sensor_type(&sensor_type)?, pins.as_deref(), i2c_speed)?;
            brick.set_sensor_type(parse_sensor_ports(&ports)?, config).await?;
        }
        Command::Sensor { port, sensor_type } => {
            let port = parse_sensor_ports(&port)?;
            let config = sensor_config(parse_sensor_type(&sensor_type)?, None, 0)?;
            brick.set_sensor_type(port, config).await?;
            println!("{:?}", brick.get_sensor(port).await?);
        }
        Command::MotorPower { ports, power } => brick.set_motor_power(parse_motor_ports(&ports)?, power).await?,
        Command::MotorPosition { ports, position } => {
            brick.set_motor_position(parse_motor_ports(&ports)?, position).await?
        }
        Command::MotorDps { ports, dps } => brick.set_motor_dps(parse_motor_ports(&ports)?, dps).await?,
        Command::MotorLimits { ports, power, dps } => {
            brick.set_motor_limits(parse_motor_ports(&ports)?, power, dps).await?
        }
        Command::OffsetEncoder { ports, offset } => {
            brick.offset_motor_encoder(parse_motor_ports(&ports)?, offset).await?
        }
        Command::Encoder { port } => {
            println!("{} degrees", brick.get_motor_encoder(parse_motor_ports(&port)?).await?)
        }
        Command::Status { port } => {
            let status = brick.get_motor_status(parse_motor_ports(&port)?).await?;
            println!(
                "power {} %, encoder {} deg, speed {} dps, low voltage float: {}, overloaded: {}",
                status.power,
                status.encoder,
                status.dps,
                status.low_voltage_float(),
                status.overloaded()
            );
        }
        Command::ResetAll => brick.reset_all().await?,
        Command::Detect => {
            let board = brick.detect().await?;
            println!("{} {} firmware {}", board.manufacturer, board.board, board.firmware);
        }
        Command::SetAddress { new_address, id } => {
            set_address(brick.transport_mut(), new_address, &id).await?;
            info!(new_address, "Address assignment sent");
        }
    }
    Ok(())
}
