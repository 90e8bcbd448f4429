mod common;

use common::{MockSink, ScriptedSource};
use h2trickle::h2::consts::{
    CONNECTION_PREFACE, SETTINGS_INITIAL_WINDOW_SIZE, SETTINGS_MAX_FRAME_SIZE,
};
use h2trickle::h2::perform_handshake;
use h2trickle::types::{Frame, FrameSource, FrameType, H2ErrorCode, ProtocolError};
use std::time::Duration;

fn valid_script() -> Vec<Frame> {
    vec![
        Frame::settings(&[
            (SETTINGS_INITIAL_WINDOW_SIZE, 1_048_576),
            (SETTINGS_MAX_FRAME_SIZE, 32_768),
        ]),
        Frame::window_update(0, 983_041),
    ]
}

#[tokio::test]
async fn test_handshake_completes_on_valid_sequence() {
    let mut source = ScriptedSource::new(valid_script());
    let mut sink = MockSink::new();

    let outcome = perform_handshake(&mut source, &mut sink, None).await.unwrap();

    assert_eq!(sink.raw, vec![CONNECTION_PREFACE.to_vec()]);
    assert_eq!(sink.frames, vec![Frame::settings_ack()]);
    assert_eq!(outcome.peer_settings.initial_window_size, 1_048_576);
    assert_eq!(outcome.peer_settings.max_frame_size, 32_768);
    assert_eq!(outcome.window_update.stream_id, 0);
    assert_eq!(outcome.window_update.increment, 983_041);
    // 65535 + 983041 on the connection, 1 MiB on the stream.
    assert_eq!(outcome.send_budget(), 1_048_576);
}

#[tokio::test]
async fn test_empty_settings_keep_defaults() {
    let mut source =
        ScriptedSource::new(vec![Frame::settings(&[]), Frame::window_update(0, 100)]);
    let mut sink = MockSink::new();

    let outcome = perform_handshake(&mut source, &mut sink, None).await.unwrap();

    assert_eq!(outcome.peer_settings.max_frame_size, 16_384);
    assert_eq!(outcome.send_budget(), 65_535);
}

#[tokio::test]
async fn test_other_frame_instead_of_settings_is_rejected() {
    let mut source = ScriptedSource::new(vec![
        Frame::window_update(0, 100),
        Frame::window_update(0, 100),
    ]);
    let mut sink = MockSink::new();

    let err = perform_handshake(&mut source, &mut sink, None).await.unwrap_err();

    match err {
        ProtocolError::UnexpectedFrame {
            expected, received, ..
        } => {
            assert_eq!(expected, FrameType::Settings);
            assert_eq!(received, FrameType::WindowUpdate);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    // No ack goes out for a handshake that never saw SETTINGS.
    assert!(sink.frames.is_empty());
}

#[tokio::test]
async fn test_other_frame_instead_of_window_update_is_rejected() {
    let mut source = ScriptedSource::new(vec![
        Frame::settings(&[]),
        Frame::ping([0; 8], false),
    ]);
    let mut sink = MockSink::new();

    let err = perform_handshake(&mut source, &mut sink, None).await.unwrap_err();

    assert!(matches!(
        err,
        ProtocolError::UnexpectedFrame {
            expected: FrameType::WindowUpdate,
            received: FrameType::Ping,
            ..
        }
    ));
    assert_eq!(sink.frames, vec![Frame::settings_ack()]);
}

#[tokio::test]
async fn test_early_settings_ack_is_rejected() {
    let mut source = ScriptedSource::new(vec![Frame::settings_ack()]);
    let mut sink = MockSink::new();

    let err = perform_handshake(&mut source, &mut sink, None).await.unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::UnexpectedFrame {
            expected: FrameType::Settings,
            received: FrameType::Settings,
            ..
        }
    ));
    assert!(sink.frames.is_empty());
}

#[tokio::test]
async fn test_goaway_during_handshake_is_rejected() {
    let mut source = ScriptedSource::new(vec![Frame::goaway(0, H2ErrorCode::ProtocolError, b"")]);
    let mut sink = MockSink::new();

    let err = perform_handshake(&mut source, &mut sink, None).await.unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::UnexpectedFrame {
            received: FrameType::GoAway,
            ..
        }
    ));
}

#[tokio::test]
async fn test_invalid_settings_value_is_rejected() {
    let mut source = ScriptedSource::new(vec![
        Frame::settings(&[(SETTINGS_MAX_FRAME_SIZE, 1024)]),
        Frame::window_update(0, 100),
    ]);
    let mut sink = MockSink::new();

    let err = perform_handshake(&mut source, &mut sink, None).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Protocol(_)));
}

#[tokio::test]
async fn test_closed_connection_during_handshake() {
    let mut source = ScriptedSource::new(vec![Frame::settings(&[])]);
    let mut sink = MockSink::new();

    let err = perform_handshake(&mut source, &mut sink, None).await.unwrap_err();
    assert!(err.is_connection_closed());
}

struct SilentSource;

#[async_trait::async_trait]
impl FrameSource for SilentSource {
    async fn read_frame(&mut self) -> Result<Frame, ProtocolError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_silent_server_times_out() {
    let mut sink = MockSink::new();

    let err = perform_handshake(&mut SilentSource, &mut sink, Some(Duration::from_secs(10)))
        .await
        .unwrap_err();

    assert!(matches!(err, ProtocolError::Timeout("handshake")));
}
