use super::error::{H2ErrorCode, ProtocolError};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Data,         // 0x0
    Headers,      // 0x1
    Priority,     // 0x2
    RstStream,    // 0x3
    Settings,     // 0x4
    PushPromise,  // 0x5
    Ping,         // 0x6
    GoAway,       // 0x7
    WindowUpdate, // 0x8
    Continuation, // 0x9
    Unknown(u8),
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameType::Data => write!(f, "DATA"),
            FrameType::Headers => write!(f, "HEADERS"),
            FrameType::Priority => write!(f, "PRIORITY"),
            FrameType::RstStream => write!(f, "RST_STREAM"),
            FrameType::Settings => write!(f, "SETTINGS"),
            FrameType::PushPromise => write!(f, "PUSH_PROMISE"),
            FrameType::Ping => write!(f, "PING"),
            FrameType::GoAway => write!(f, "GOAWAY"),
            FrameType::WindowUpdate => write!(f, "WINDOW_UPDATE"),
            FrameType::Continuation => write!(f, "CONTINUATION"),
            FrameType::Unknown(code) => write!(f, "UNKNOWN(0x{:x})", code),
        }
    }
}

/// The fixed 9-byte prefix of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub frame_type: FrameType,
    pub flags: u8,
    pub stream_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    pub id: u16,
    pub value: u32,
}

/// Typed payload of a frame. Everything the client does not interpret lands in
/// `Unknown` so that callers can still see it.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    Settings {
        params: Vec<Setting>,
    },
    SettingsAck,
    WindowUpdate {
        increment: u32,
    },
    Headers {
        block: Bytes,
        end_stream: bool,
        end_headers: bool,
    },
    Continuation {
        block: Bytes,
        end_headers: bool,
    },
    Data {
        payload: Bytes,
        end_stream: bool,
    },
    GoAway {
        last_stream_id: u32,
        error_code: H2ErrorCode,
        debug_data: Bytes,
    },
    RstStream {
        error_code: H2ErrorCode,
    },
    Ping {
        ack: bool,
        opaque: [u8; 8],
    },
    Unknown {
        frame_type: FrameType,
        flags: u8,
        payload: Bytes,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: FrameHeader,
    pub kind: FrameKind,
}

/// Anything frames can be written to.
#[async_trait]
pub trait FrameSink: Send {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), ProtocolError>;

    /// Writes bytes that are not framed, i.e. the connection preface.
    async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), ProtocolError>;
}

/// Anything frames can be read from.
#[async_trait]
pub trait FrameSource: Send {
    async fn read_frame(&mut self) -> Result<Frame, ProtocolError>;
}
