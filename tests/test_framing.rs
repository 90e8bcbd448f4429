use bytes::Bytes;
use h2trickle::h2::consts::{END_STREAM_FLAG, FRAME_HEADER_SIZE};
use h2trickle::h2::{FrameReader, FrameWriter};
use h2trickle::types::{
    Frame, FrameKind, FrameSink, FrameSource, FrameType, H2ErrorCode, ProtocolError,
};
use tokio::io::AsyncWriteExt;

#[test]
fn test_data_frame_layout() {
    let frame = Frame::data(3, Bytes::from_static(b"line1\n"), true);
    let bytes = frame.serialize().unwrap();

    assert_eq!(bytes.len(), FRAME_HEADER_SIZE + 6);
    assert_eq!(&bytes[0..3], &[0, 0, 6]);
    assert_eq!(bytes[3], 0x0);
    assert_eq!(bytes[4], END_STREAM_FLAG);
    assert_eq!(&bytes[5..9], &[0, 0, 0, 3]);
    assert_eq!(&bytes[9..], b"line1\n");
}

#[test]
fn test_settings_ack_layout() {
    let bytes = Frame::settings_ack().serialize().unwrap();
    assert_eq!(&bytes[..], &[0, 0, 0, 0x4, 0x1, 0, 0, 0, 0]);
}

#[test]
fn test_parse_serialized_frames() {
    let frames = vec![
        Frame::window_update(0, 1_000_000),
        Frame::rst(3, H2ErrorCode::Cancel),
        Frame::ping([1, 2, 3, 4, 5, 6, 7, 8], false),
        Frame::goaway(3, H2ErrorCode::NoError, b"bye"),
        Frame::settings(&[(0x4, 1_048_576), (0x5, 32_768)]),
    ];

    for frame in frames {
        let parsed = Frame::parse(&frame.serialize().unwrap()).unwrap();
        assert_eq!(parsed, frame);
    }
}

#[test]
fn test_goaway_exposes_debug_data() {
    let bytes = Frame::goaway(5, H2ErrorCode::EnhanceYourCalm, b"slow down")
        .serialize()
        .unwrap();
    let frame = Frame::parse(&bytes).unwrap();
    match frame.kind {
        FrameKind::GoAway {
            last_stream_id,
            error_code,
            debug_data,
        } => {
            assert_eq!(last_stream_id, 5);
            assert_eq!(error_code, H2ErrorCode::EnhanceYourCalm);
            assert_eq!(&debug_data[..], b"slow down");
        }
        other => panic!("expected GOAWAY, got {:?}", other),
    }
}

#[test]
fn test_unknown_error_code_is_preserved() {
    let bytes = Frame::rst(3, H2ErrorCode::from(0xdead)).serialize().unwrap();
    let frame = Frame::parse(&bytes).unwrap();
    assert_eq!(
        frame.kind,
        FrameKind::RstStream {
            error_code: H2ErrorCode::Unknown(0xdead)
        }
    );
}

#[test]
fn test_short_window_update_is_rejected() {
    let raw = [0, 0, 3, 0x8, 0, 0, 0, 0, 0, 0, 0, 1];
    assert!(matches!(Frame::parse(&raw), Err(ProtocolError::FrameSize(_))));
}

#[test]
fn test_ping_with_wrong_length_is_rejected() {
    let raw = [0, 0, 4, 0x6, 0, 0, 0, 0, 0, 1, 2, 3, 4];
    assert!(matches!(Frame::parse(&raw), Err(ProtocolError::FrameSize(_))));
}

#[test]
fn test_settings_on_stream_is_rejected() {
    let raw = [0, 0, 0, 0x4, 0, 0, 0, 0, 1];
    assert!(matches!(Frame::parse(&raw), Err(ProtocolError::Protocol(_))));
}

#[test]
fn test_truncated_frame_is_rejected() {
    let raw = [0, 0, 8, 0x0, 0, 0, 0, 0, 3, b'a'];
    assert!(matches!(Frame::parse(&raw), Err(ProtocolError::FrameSize(_))));
}

#[tokio::test]
async fn test_reader_and_writer_over_duplex() {
    let (client, server) = tokio::io::duplex(4096);
    let mut writer = FrameWriter::new(client);
    let mut reader = FrameReader::new(server);

    writer.write_frame(Frame::settings_ack()).await.unwrap();
    writer
        .write_frame(Frame::data(3, Bytes::from_static(b"abc"), false))
        .await
        .unwrap();

    assert_eq!(reader.read_frame().await.unwrap(), Frame::settings_ack());
    let data = reader.read_frame().await.unwrap();
    assert_eq!(data.frame_type(), FrameType::Data);
    assert_eq!(data.stream_id(), 3);
}

#[tokio::test]
async fn test_reader_rejects_oversized_frame() {
    let (mut client, server) = tokio::io::duplex(64);
    let mut reader = FrameReader::new(server);

    // 16385 bytes declared, one past the default limit.
    client
        .write_all(&[0x00, 0x40, 0x01, 0x0, 0, 0, 0, 0, 3])
        .await
        .unwrap();

    let err = reader.read_frame().await.unwrap_err();
    assert!(matches!(err, ProtocolError::FrameSize(_)));
}

#[tokio::test]
async fn test_reader_reports_closed_connection() {
    let (client, server) = tokio::io::duplex(64);
    let mut reader = FrameReader::new(server);
    drop(client);

    let err = reader.read_frame().await.unwrap_err();
    assert!(err.is_connection_closed());
}

#[tokio::test]
async fn test_reader_on_scripted_io() {
    let settings = Frame::settings(&[(0x5, 20_000)]).serialize().unwrap();
    let window = Frame::window_update(0, 65_535).serialize().unwrap();
    let mock = tokio_test::io::Builder::new()
        .read(&settings[..4])
        .read(&settings[4..])
        .read(&window)
        .build();
    let mut reader = FrameReader::new(mock);

    assert_eq!(reader.read_frame().await.unwrap().frame_type(), FrameType::Settings);
    assert_eq!(
        reader.read_frame().await.unwrap().kind,
        FrameKind::WindowUpdate { increment: 65_535 }
    );
}

#[tokio::test]
async fn test_writer_emits_exact_bytes() {
    let preface = h2trickle::h2::consts::CONNECTION_PREFACE;
    let ack = Frame::settings_ack().serialize().unwrap();
    let mock = tokio_test::io::Builder::new()
        .write(preface)
        .write(&ack)
        .build();
    let mut writer = FrameWriter::new(mock);

    writer.write_raw(preface).await.unwrap();
    writer.write_frame(Frame::settings_ack()).await.unwrap();
}
