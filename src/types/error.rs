use super::frame::FrameType;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Unexpected {received} frame during {phase}, expected {expected}")]
    UnexpectedFrame {
        phase: &'static str,
        expected: FrameType,
        received: FrameType,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Header block error: {0}")]
    Codec(String),

    #[error("Timed out during {0}")]
    Timeout(&'static str),

    #[error("HTTP/2 frame size error: {0}")]
    FrameSize(String),

    #[error("HTTP/2 flow control error: {0}")]
    FlowControl(String),

    #[error("HTTP/2 protocol error: {0}")]
    Protocol(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ProtocolError {
    /// True for the read-side conditions that mean the peer simply went away.
    pub fn is_connection_closed(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(err) if matches!(
                err.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
            )
        )
    }
}

// HTTP/2 Error Codes (RFC 7540 Section 7)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum H2ErrorCode {
    NoError,
    ProtocolError,
    InternalError,
    FlowControlError,
    SettingsTimeout,
    StreamClosed,
    FrameSizeError,
    RefusedStream,
    Cancel,
    CompressionError,
    ConnectError,
    EnhanceYourCalm,
    InadequateSecurity,
    Http11Required,
    Unknown(u32),
}

impl H2ErrorCode {
    pub fn code(&self) -> u32 {
        match self {
            H2ErrorCode::NoError => 0x0,
            H2ErrorCode::ProtocolError => 0x1,
            H2ErrorCode::InternalError => 0x2,
            H2ErrorCode::FlowControlError => 0x3,
            H2ErrorCode::SettingsTimeout => 0x4,
            H2ErrorCode::StreamClosed => 0x5,
            H2ErrorCode::FrameSizeError => 0x6,
            H2ErrorCode::RefusedStream => 0x7,
            H2ErrorCode::Cancel => 0x8,
            H2ErrorCode::CompressionError => 0x9,
            H2ErrorCode::ConnectError => 0xa,
            H2ErrorCode::EnhanceYourCalm => 0xb,
            H2ErrorCode::InadequateSecurity => 0xc,
            H2ErrorCode::Http11Required => 0xd,
            H2ErrorCode::Unknown(code) => *code,
        }
    }
}

impl std::fmt::Display for H2ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (name, description) = match self {
            H2ErrorCode::NoError => ("NO_ERROR", "graceful shutdown"),
            H2ErrorCode::ProtocolError => ("PROTOCOL_ERROR", "protocol error detected"),
            H2ErrorCode::InternalError => ("INTERNAL_ERROR", "implementation fault"),
            H2ErrorCode::FlowControlError => {
                ("FLOW_CONTROL_ERROR", "flow control protocol violated")
            }
            H2ErrorCode::SettingsTimeout => ("SETTINGS_TIMEOUT", "settings not acknowledged"),
            H2ErrorCode::StreamClosed => ("STREAM_CLOSED", "frame received for closed stream"),
            H2ErrorCode::FrameSizeError => ("FRAME_SIZE_ERROR", "frame size incorrect"),
            H2ErrorCode::RefusedStream => ("REFUSED_STREAM", "stream not processed"),
            H2ErrorCode::Cancel => ("CANCEL", "stream cancelled"),
            H2ErrorCode::CompressionError => ("COMPRESSION_ERROR", "compression state not updated"),
            H2ErrorCode::ConnectError => {
                ("CONNECT_ERROR", "TCP connection error for CONNECT method")
            }
            H2ErrorCode::EnhanceYourCalm => ("ENHANCE_YOUR_CALM", "processing capacity exceeded"),
            H2ErrorCode::InadequateSecurity => (
                "INADEQUATE_SECURITY",
                "negotiated TLS parameters inadequate",
            ),
            H2ErrorCode::Http11Required => ("HTTP_1_1_REQUIRED", "use HTTP/1.1 for request"),
            H2ErrorCode::Unknown(_) => ("UNKNOWN", "unregistered error code"),
        };
        write!(f, "{} (0x{:x}): {}", name, self.code(), description)
    }
}

impl From<u32> for H2ErrorCode {
    fn from(code: u32) -> Self {
        match code {
            0x0 => H2ErrorCode::NoError,
            0x1 => H2ErrorCode::ProtocolError,
            0x2 => H2ErrorCode::InternalError,
            0x3 => H2ErrorCode::FlowControlError,
            0x4 => H2ErrorCode::SettingsTimeout,
            0x5 => H2ErrorCode::StreamClosed,
            0x6 => H2ErrorCode::FrameSizeError,
            0x7 => H2ErrorCode::RefusedStream,
            0x8 => H2ErrorCode::Cancel,
            0x9 => H2ErrorCode::CompressionError,
            0xa => H2ErrorCode::ConnectError,
            0xb => H2ErrorCode::EnhanceYourCalm,
            0xc => H2ErrorCode::InadequateSecurity,
            0xd => H2ErrorCode::Http11Required,
            other => H2ErrorCode::Unknown(other),
        }
    }
}

impl From<H2ErrorCode> for u32 {
    fn from(code: H2ErrorCode) -> Self {
        code.code()
    }
}
