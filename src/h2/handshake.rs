use crate::h2::consts::{CONNECTION_PREFACE, DEFAULT_INITIAL_WINDOW_SIZE};
use crate::h2::settings::PeerSettings;
use crate::types::{Frame, FrameKind, FrameSink, FrameSource, FrameType, ProtocolError};
use crate::utils::timeout_result;
use std::time::Duration;
use tracing::{debug, info, warn};

const PHASE: &str = "handshake";

/// The server's initial WINDOW_UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGrant {
    pub stream_id: u32,
    pub increment: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeOutcome {
    pub peer_settings: PeerSettings,
    pub window_update: WindowGrant,
}

impl HandshakeOutcome {
    /// Bytes of DATA that may be sent on a fresh stream before any further
    /// credit arrives: the smaller of the connection and stream windows.
    pub fn send_budget(&self) -> u64 {
        let mut connection_window = DEFAULT_INITIAL_WINDOW_SIZE as u64;
        if self.window_update.stream_id == 0 {
            connection_window += self.window_update.increment as u64;
        }
        connection_window.min(self.peer_settings.initial_window_size as u64)
    }
}

/// Drives preface -> SETTINGS -> SETTINGS ack -> WINDOW_UPDATE.
///
/// Any deviation aborts; nothing is retried.
pub async fn perform_handshake<R, W>(
    reader: &mut R,
    writer: &mut W,
    read_timeout: Option<Duration>,
) -> Result<HandshakeOutcome, ProtocolError>
where
    R: FrameSource + ?Sized,
    W: FrameSink + ?Sized,
{
    debug!("sending connection preface");
    writer.write_raw(CONNECTION_PREFACE).await?;

    let frame = timeout_result(read_timeout, PHASE, reader.read_frame()).await?;
    debug!(frame_type = %frame.frame_type(), stream_id = frame.stream_id(), "handshake frame");
    let peer_settings = match &frame.kind {
        FrameKind::Settings { params } => PeerSettings::from_params(params)?,
        FrameKind::SettingsAck => {
            warn!("peer acknowledged SETTINGS before sending its own");
            return Err(ProtocolError::UnexpectedFrame {
                phase: PHASE,
                expected: FrameType::Settings,
                received: FrameType::Settings,
            });
        }
        _ => {
            return Err(ProtocolError::UnexpectedFrame {
                phase: PHASE,
                expected: FrameType::Settings,
                received: frame.frame_type(),
            });
        }
    };
    info!(
        initial_window_size = peer_settings.initial_window_size,
        max_frame_size = peer_settings.max_frame_size,
        "received peer settings"
    );

    debug!("sending settings ack");
    writer.write_frame(Frame::settings_ack()).await?;

    let frame = timeout_result(read_timeout, PHASE, reader.read_frame()).await?;
    debug!(frame_type = %frame.frame_type(), stream_id = frame.stream_id(), "handshake frame");
    let window_update = match &frame.kind {
        FrameKind::WindowUpdate { increment } => WindowGrant {
            stream_id: frame.stream_id(),
            increment: *increment,
        },
        _ => {
            return Err(ProtocolError::UnexpectedFrame {
                phase: PHASE,
                expected: FrameType::WindowUpdate,
                received: frame.frame_type(),
            });
        }
    };
    info!(
        increment = window_update.increment,
        stream_id = window_update.stream_id,
        "received window update"
    );

    Ok(HandshakeOutcome {
        peer_settings,
        window_update,
    })
}
