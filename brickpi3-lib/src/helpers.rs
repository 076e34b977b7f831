//! Multi-step motor and sensor routines built on the [`BrickPi3`] primitives.
//!
//! None of these know anything about frames; they poll the facade with a
//! fixed delay between reads until a condition holds or a time limit runs out.

use crate::constants::{
    MOTOR_POLL_INTERVAL, MOTOR_SEARCH_POWER, MOTOR_SEARCH_TIMEOUT, MOTOR_STALL_DPS, WAIT_FOR_SENSOR_INTERVAL,
    WAIT_FOR_SENSOR_TIMEOUT,
};
use crate::device::BrickPi3;
use crate::error::{BrickPiError, Result};
use crate::port::{MotorPort, SensorPort};
use crate::sensor::SensorValue;
use crate::transport::Transport;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Which point becomes the new encoder origin in [`reset_motor_encoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetLimit {
    /// Where the motor is now.
    CurrentPosition,
    /// Drive forward until the motor stalls.
    Forward,
    /// Drive backward until the motor stalls.
    Backward,
    /// Halfway between the forward and backward stall points.
    Midpoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekOptions {
    pub poll_interval: Duration,
    /// Give up after this long; `None` waits until the motor settles.
    pub time_limit: Option<Duration>,
    /// Power limit in percent applied before moving (0 = unlimited)
    pub power_limit: Option<u8>,
}

impl Default for SeekOptions {
    fn default() -> Self {
        Self {
            poll_interval: MOTOR_POLL_INTERVAL,
            time_limit: None,
            power_limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetEncoderOptions {
    pub poll_interval: Duration,
    /// Time allowed for each stall search
    pub time_limit: Duration,
    /// Speed at or below which the motor counts as blocked.
    // Status replies carry no PWM power, so speed stands in for it.
    pub stall_dps: i16,
    /// Power used while searching (backward searches negate it)
    pub search_power: i8,
}

impl Default for ResetEncoderOptions {
    fn default() -> Self {
        Self {
            poll_interval: MOTOR_POLL_INTERVAL,
            time_limit: MOTOR_SEARCH_TIMEOUT,
            stall_dps: MOTOR_STALL_DPS,
            search_power: MOTOR_SEARCH_POWER,
        }
    }
}

/// Move a motor to `target` and wait until two consecutive encoder reads agree.
///
/// Returns the settled encoder position. On any failure, including the time
/// limit, the motor power is set to 0 before the error is returned.
pub async fn set_motor_position_and_wait<T: Transport>(
    brick: &mut BrickPi3<T>,
    port: MotorPort,
    target: i32,
    options: SeekOptions,
) -> Result<i32> {
    port.single_index()?;
    let result = seek(brick, port, target, options).await;
    stop_on_failure(brick, port, result, "Position seek failed, stopping motor").await
}

async fn seek<T: Transport>(
    brick: &mut BrickPi3<T>,
    port: MotorPort,
    target: i32,
    options: SeekOptions,
) -> Result<i32> {
    if let Some(power) = options.power_limit.filter(|&p| p > 0) {
        brick.set_motor_limits(port, power, 0).await?;
    }
    brick.set_motor_position(port, target).await?;

    let start = Instant::now();
    let mut last = None;
    loop {
        sleep(options.poll_interval).await;
        let encoder = brick.get_motor_encoder(port).await?;
        if last == Some(encoder) {
            debug!(%port, encoder, target, "Motor settled");
            return Ok(encoder);
        }
        last = Some(encoder);
        if let Some(limit) = options.time_limit {
            if start.elapsed() > limit {
                return Err(BrickPiError::Timeout {
                    timeout: limit,
                    last_state: None,
                });
            }
        }
    }
}

/// Pass `result` through, zeroing the motor power first if it is an error.
async fn stop_on_failure<T: Transport, R>(
    brick: &mut BrickPi3<T>,
    port: MotorPort,
    result: Result<R>,
    message: &str,
) -> Result<R> {
    if let Err(err) = &result {
        warn!(%port, error = %err, "{message}");
        if let Err(stop_err) = brick.set_motor_power(port, 0).await {
            warn!(%port, error = %stop_err, "Could not stop motor");
        }
    }
    result
}

/// Poll a sensor every 10 ms until it reads `target`.
pub async fn wait_for_sensor<T: Transport>(
    brick: &mut BrickPi3<T>,
    port: SensorPort,
    target: &SensorValue,
    time_limit: Option<Duration>,
) -> Result<()> {
    let time_limit = time_limit.unwrap_or(WAIT_FOR_SENSOR_TIMEOUT);
    let start = Instant::now();
    while start.elapsed() <= time_limit {
        sleep(WAIT_FOR_SENSOR_INTERVAL).await;
        if brick.get_sensor(port).await? == *target {
            return Ok(());
        }
    }
    Err(BrickPiError::Timeout {
        timeout: time_limit,
        last_state: None,
    })
}

/// Move the encoder origin of `port` so the chosen point reads `new_offset`.
///
/// Stall searches drive the motor until its speed drops to
/// `options.stall_dps`. If anything fails mid-search the motor is stopped
/// before the error is returned.
pub async fn reset_motor_encoder<T: Transport>(
    brick: &mut BrickPi3<T>,
    port: MotorPort,
    limit: ResetLimit,
    new_offset: i32,
    options: ResetEncoderOptions,
) -> Result<()> {
    port.single_index()?;
    let (backward, forward) = match limit {
        ResetLimit::CurrentPosition => {
            let origin = brick.get_motor_encoder(port).await?;
            (origin, origin)
        }
        _ => {
            let result = search(brick, port, limit, options).await;
            stop_on_failure(brick, port, result, "Encoder search failed, stopping motor").await?
        }
    };
    let offset = encoder_offset(backward, forward, new_offset);
    info!(%port, ?limit, backward, forward, new_offset, offset, "Resetting motor encoder");
    brick.offset_motor_encoder(port, offset).await
}

/// Offset that makes the midpoint of `backward..=forward` read `new_offset`.
///
/// Halves truncate toward zero and the result wraps to 32 bits, matching the
/// board's signed encoder arithmetic.
fn encoder_offset(backward: i32, forward: i32, new_offset: i32) -> i32 {
    let doubled = i64::from(backward) + i64::from(forward) - 2 * i64::from(new_offset);
    (doubled / 2) as i32
}

/// Stall points `(backward, forward)`; single-sided searches repeat one point.
async fn search<T: Transport>(
    brick: &mut BrickPi3<T>,
    port: MotorPort,
    limit: ResetLimit,
    options: ResetEncoderOptions,
) -> Result<(i32, i32)> {
    let power = options.search_power;
    match limit {
        ResetLimit::Forward => find_stall(brick, port, power, &options).await.map(|f| (f, f)),
        ResetLimit::Backward => find_stall(brick, port, power.saturating_neg(), &options)
            .await
            .map(|b| (b, b)),
        ResetLimit::Midpoint => {
            let forward = find_stall(brick, port, power, &options).await?;
            let backward = find_stall(brick, port, power.saturating_neg(), &options).await?;
            Ok((backward, forward))
        }
        ResetLimit::CurrentPosition => {
            let origin = brick.get_motor_encoder(port).await?;
            Ok((origin, origin))
        }
    }
}

/// Run at `power` until the motor stalls; returns the encoder reading there.
async fn find_stall<T: Transport>(
    brick: &mut BrickPi3<T>,
    port: MotorPort,
    power: i8,
    options: &ResetEncoderOptions,
) -> Result<i32> {
    brick.set_motor_power(port, power).await?;
    let start = Instant::now();
    while start.elapsed() <= options.time_limit {
        sleep(options.poll_interval).await;
        let status = brick.get_motor_status(port).await?;
        if status.dps.unsigned_abs() <= options.stall_dps.unsigned_abs() {
            brick.set_motor_power(port, 0).await?;
            debug!(%port, power, encoder = status.encoder, "Motor stalled");
            return Ok(status.encoder);
        }
    }
    Err(BrickPiError::Timeout {
        timeout: options.time_limit,
        last_state: None,
    })
}
