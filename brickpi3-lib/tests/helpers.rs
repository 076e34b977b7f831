//! Position seek, wait-for-value and encoder reset, on tokio's paused clock.

mod common;

use brickpi3_lib::helpers::{
    reset_motor_encoder, set_motor_position_and_wait, wait_for_sensor, ResetEncoderOptions, ResetLimit, SeekOptions,
};
use common::*;
use std::time::Duration;

fn encoder(value: i32) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

fn power_requests(brick: &mut BrickPi3<ScriptedTransport>) -> Vec<i8> {
    brick
        .transport_mut()
        .requests_of(MessageType::SetMotorPower)
        .iter()
        .map(|r| r[3] as i8)
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_position_seek_waits_for_two_equal_reads() {
    let mut t = ScriptedTransport::new();
    for value in [10, 50, 88, 90, 90, 91] {
        t.reply(MessageType::GetMotorAEncoder, &encoder(value));
    }
    let mut brick = BrickPi3::new(t);

    let settled = set_motor_position_and_wait(&mut brick, MotorPort::PORT_A, 90, SeekOptions::default())
        .await
        .unwrap();
    assert_eq!(settled, 90);

    let transport = brick.transport_mut();
    assert_eq!(transport.requests[0], vec![1, 22, 0x01, 0, 0, 0, 90]);
    assert_eq!(transport.requests_of(MessageType::GetMotorAEncoder).len(), 5);
    assert!(power_requests(&mut brick).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_position_seek_applies_power_limit_and_time_limit() {
    let mut t = ScriptedTransport::new();
    let mut value = 0;
    for _ in 0..100 {
        value += 7;
        t.reply(MessageType::GetMotorBEncoder, &encoder(value));
    }
    let mut brick = BrickPi3::new(t);

    let options = SeekOptions {
        time_limit: Some(Duration::from_millis(200)),
        power_limit: Some(40),
        ..SeekOptions::default()
    };
    let result = set_motor_position_and_wait(&mut brick, MotorPort::PORT_B, 10_000, options).await;
    assert!(matches!(result, Err(BrickPiError::Timeout { .. })));
    assert_eq!(brick.transport_mut().requests[0], vec![1, 28, 0x02, 40, 0, 0]);
    assert_eq!(
        brick.transport_mut().requests_of(MessageType::SetMotorPower),
        vec![vec![1, 21, 0x02, 0]]
    );
}

#[tokio::test(start_paused = true)]
async fn test_position_seek_stops_motor_when_encoder_read_fails() {
    let mut t = ScriptedTransport::new();
    t.reply(MessageType::GetMotorCEncoder, &encoder(15))
        .fail(MessageType::GetMotorCEncoder);
    let mut brick = BrickPi3::new(t);

    let result = set_motor_position_and_wait(&mut brick, MotorPort::PORT_C, 360, SeekOptions::default()).await;
    assert!(matches!(result, Err(BrickPiError::Transport(_))));
    assert_eq!(power_requests(&mut brick), vec![0]);
    assert_eq!(brick.transport_mut().requests_of(MessageType::GetMotorCEncoder).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_position_seek_stops_motor_when_move_fails() {
    let mut t = ScriptedTransport::new();
    t.fail(MessageType::SetMotorPosition);
    let mut brick = BrickPi3::new(t);

    let result = set_motor_position_and_wait(&mut brick, MotorPort::PORT_D, -90, SeekOptions::default()).await;
    assert!(matches!(result, Err(BrickPiError::Transport(_))));
    assert_eq!(
        brick.transport_mut().requests_of(MessageType::SetMotorPower),
        vec![vec![1, 21, 0x08, 0]]
    );
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_sensor_value() {
    let mut t = ScriptedTransport::new();
    t.reply(MessageType::GetSensor1, &sensor(SensorType::Touch, SensorState::ValidData, &[0]))
        .reply(MessageType::GetSensor1, &sensor(SensorType::NxtTouch, SensorState::ValidData, &[0]))
        .reply(MessageType::GetSensor1, &sensor(SensorType::NxtTouch, SensorState::ValidData, &[1]));
    let mut brick = BrickPi3::new(t);
    brick.set_sensor_type(SensorPort::PORT_1, SensorType::Touch).await.unwrap();

    wait_for_sensor(&mut brick, SensorPort::PORT_1, &SensorValue::Value(1), None)
        .await
        .unwrap();
    assert_eq!(brick.transport_mut().requests_of(MessageType::GetSensor1).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_sensor_times_out() {
    let mut t = ScriptedTransport::new();
    t.always(MessageType::GetSensor1, &sensor(SensorType::Touch, SensorState::ValidData, &[0]));
    let mut brick = BrickPi3::new(t);
    brick.set_sensor_type(SensorPort::PORT_1, SensorType::Touch).await.unwrap();

    let limit = Duration::from_millis(100);
    let result = wait_for_sensor(&mut brick, SensorPort::PORT_1, &SensorValue::Value(1), Some(limit)).await;
    assert!(matches!(result, Err(BrickPiError::Timeout { timeout, .. }) if timeout == limit));
}

#[tokio::test(start_paused = true)]
async fn test_reset_to_current_position() {
    let mut t = ScriptedTransport::new();
    t.reply(MessageType::GetMotorCEncoder, &encoder(250));
    let mut brick = BrickPi3::new(t);

    reset_motor_encoder(&mut brick, MotorPort::PORT_C, ResetLimit::CurrentPosition, 10, ResetEncoderOptions::default())
        .await
        .unwrap();
    assert_eq!(
        brick.transport_mut().requests_of(MessageType::OffsetMotorEncoder),
        vec![vec![1, 29, 0x04, 0, 0, 0, 240]]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reset_to_backward_limit() {
    let mut t = ScriptedTransport::new();
    t.reply(MessageType::GetMotorAStatus, &status(0, -100, -40, -310))
        .reply(MessageType::GetMotorAStatus, &status(0, -100, -120, 25));
    let mut brick = BrickPi3::new(t);

    reset_motor_encoder(&mut brick, MotorPort::PORT_A, ResetLimit::Backward, 0, ResetEncoderOptions::default())
        .await
        .unwrap();
    assert_eq!(power_requests(&mut brick), vec![-100, 0]);
    assert_eq!(
        brick.transport_mut().requests_of(MessageType::OffsetMotorEncoder),
        vec![vec![1, 29, 0x01, 0xFF, 0xFF, 0xFF, 0x88]]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reset_midpoint_truncates_toward_zero() {
    let mut t = ScriptedTransport::new();
    t.reply(MessageType::GetMotorAStatus, &status(0, 100, 0, 0))
        .reply(MessageType::GetMotorAStatus, &status(0, -100, -3, 0));
    let mut brick = BrickPi3::new(t);

    reset_motor_encoder(&mut brick, MotorPort::PORT_A, ResetLimit::Midpoint, 0, ResetEncoderOptions::default())
        .await
        .unwrap();
    assert_eq!(
        brick.transport_mut().requests_of(MessageType::OffsetMotorEncoder),
        vec![vec![1, 29, 0x01, 0xFF, 0xFF, 0xFF, 0xFF]]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reset_offset_wraps_instead_of_overflowing() {
    let mut t = ScriptedTransport::new();
    t.reply(MessageType::GetMotorBEncoder, &encoder(1));
    let mut brick = BrickPi3::new(t);

    reset_motor_encoder(&mut brick, MotorPort::PORT_B, ResetLimit::CurrentPosition, i32::MIN, ResetEncoderOptions::default())
        .await
        .unwrap();
    assert_eq!(
        brick.transport_mut().requests_of(MessageType::OffsetMotorEncoder),
        vec![vec![1, 29, 0x02, 0x80, 0x00, 0x00, 0x01]]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reset_to_midpoint() {
    let mut t = ScriptedTransport::new();
    t.reply(MessageType::GetMotorAStatus, &status(0, 100, 100, 300))
        .reply(MessageType::GetMotorAStatus, &status(0x02, 100, 400, 10))
        .reply(MessageType::GetMotorAStatus, &status(0, -100, 0, -300))
        .reply(MessageType::GetMotorAStatus, &status(0x02, -100, -200, -5));
    let mut brick = BrickPi3::new(t);

    reset_motor_encoder(&mut brick, MotorPort::PORT_A, ResetLimit::Midpoint, 0, ResetEncoderOptions::default())
        .await
        .unwrap();
    assert_eq!(power_requests(&mut brick), vec![100, 0, -100, 0]);
    assert_eq!(
        brick.transport_mut().requests_of(MessageType::OffsetMotorEncoder),
        vec![vec![1, 29, 0x01, 0, 0, 0, 100]]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_search_stops_motor() {
    let mut t = ScriptedTransport::new();
    t.reply(MessageType::GetMotorDStatus, &status(0, 100, 10, 400))
        .fail(MessageType::GetMotorDStatus);
    let mut brick = BrickPi3::new(t);

    let result = reset_motor_encoder(&mut brick, MotorPort::PORT_D, ResetLimit::Forward, 0, ResetEncoderOptions::default()).await;
    assert!(matches!(result, Err(BrickPiError::Transport(_))));
    assert_eq!(power_requests(&mut brick), vec![100, 0]);
    assert!(brick.transport_mut().requests_of(MessageType::OffsetMotorEncoder).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_search_time_limit_stops_motor() {
    let mut t = ScriptedTransport::new();
    t.always(MessageType::GetMotorBStatus, &status(0, 60, 0, 200));
    let mut brick = BrickPi3::new(t);

    let options = ResetEncoderOptions {
        time_limit: Duration::from_millis(300),
        search_power: 60,
        ..ResetEncoderOptions::default()
    };
    let result = reset_motor_encoder(&mut brick, MotorPort::PORT_B, ResetLimit::Forward, 0, options).await;
    assert!(matches!(result, Err(BrickPiError::Timeout { .. })));
    assert_eq!(power_requests(&mut brick), vec![60, 0]);
}

#[tokio::test]
async fn test_helpers_reject_multiple_ports() {
    let mut brick = BrickPi3::new(ScriptedTransport::new());
    let ports = MotorPort::PORT_A | MotorPort::PORT_C;

    assert!(matches!(
        set_motor_position_and_wait(&mut brick, ports, 0, SeekOptions::default()).await,
        Err(BrickPiError::Configuration(_))
    ));
    assert!(matches!(
        reset_motor_encoder(&mut brick, ports, ResetLimit::Forward, 0, ResetEncoderOptions::default()).await,
        Err(BrickPiError::Configuration(_))
    ));
    assert_eq!(brick.transport_mut().calls(), 0);
}
