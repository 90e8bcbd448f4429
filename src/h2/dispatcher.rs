use crate::h2::hpack::HeaderBlockDecoder;
use crate::types::{FrameKind, FrameSource, FrameType, H2ErrorCode, HeaderField, ProtocolError};
use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

/// What the read side observed, in wire order.
#[derive(Debug)]
pub enum ResponseEvent {
    Headers {
        stream_id: u32,
        fields: Vec<HeaderField>,
        end_stream: bool,
    },
    /// A header block could not be decoded. Reading continues.
    HeaderDecodeFailed {
        stream_id: u32,
        error: ProtocolError,
    },
    Data {
        stream_id: u32,
        payload: Bytes,
        end_stream: bool,
    },
    Ping {
        ack: bool,
        opaque: [u8; 8],
    },
    Settings {
        ack: bool,
    },
    WindowUpdate {
        stream_id: u32,
        increment: u32,
    },
    GoAway {
        last_stream_id: u32,
        error_code: H2ErrorCode,
        debug_data: Bytes,
    },
    RstStream {
        stream_id: u32,
        error_code: H2ErrorCode,
    },
    Unhandled {
        frame_type: FrameType,
        stream_id: u32,
    },
}

impl ResponseEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResponseEvent::GoAway { .. } | ResponseEvent::RstStream { .. }
        )
    }
}

impl std::fmt::Display for ResponseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseEvent::Headers {
                stream_id,
                fields,
                end_stream,
            } => {
                write!(f, "[stream {}] HEADERS (end_stream={})", stream_id, end_stream)?;
                for field in fields {
                    write!(f, "\n  {}", field)?;
                }
                Ok(())
            }
            ResponseEvent::HeaderDecodeFailed { stream_id, error } => {
                write!(f, "[stream {}] HEADERS undecodable: {}", stream_id, error)
            }
            ResponseEvent::Data {
                stream_id,
                payload,
                end_stream,
            } => write!(
                f,
                "[stream {}] DATA (end_stream={}) {}",
                stream_id,
                end_stream,
                String::from_utf8_lossy(payload)
            ),
            ResponseEvent::Ping { ack, .. } => write!(f, "PING (ack={})", ack),
            ResponseEvent::Settings { ack } => write!(f, "SETTINGS (ack={})", ack),
            ResponseEvent::WindowUpdate {
                stream_id,
                increment,
            } => write!(f, "[stream {}] WINDOW_UPDATE +{}", stream_id, increment),
            ResponseEvent::GoAway {
                last_stream_id,
                error_code,
                debug_data,
            } => write!(
                f,
                "GOAWAY last_stream_id={} {} {}",
                last_stream_id,
                error_code,
                String::from_utf8_lossy(debug_data)
            ),
            ResponseEvent::RstStream {
                stream_id,
                error_code,
            } => write!(f, "[stream {}] RST_STREAM {}", stream_id, error_code),
            ResponseEvent::Unhandled {
                frame_type,
                stream_id,
            } => write!(f, "[stream {}] {} (ignored)", stream_id, frame_type),
        }
    }
}

/// Why the read loop stopped.
#[derive(Debug)]
pub enum Termination {
    GoAway {
        last_stream_id: u32,
        error_code: H2ErrorCode,
        debug_data: Bytes,
    },
    Reset {
        stream_id: u32,
        error_code: H2ErrorCode,
    },
    Error(ProtocolError),
}

impl Termination {
    /// The peer ended the exchange with GOAWAY or RST_STREAM.
    pub fn is_clean(&self) -> bool {
        !matches!(self, Termination::Error(_))
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::GoAway {
                last_stream_id,
                error_code,
                ..
            } => write!(
                f,
                "closed by GOAWAY (last_stream_id={}, {})",
                last_stream_id, error_code
            ),
            Termination::Reset {
                stream_id,
                error_code,
            } => write!(f, "closed by RST_STREAM on stream {} ({})", stream_id, error_code),
            Termination::Error(err) => write!(f, "closed by error: {}", err),
        }
    }
}

#[derive(Debug)]
struct PendingHeaderBlock {
    stream_id: u32,
    block: BytesMut,
    end_stream: bool,
}

/// Continuously reads and classifies frames until GOAWAY, RST_STREAM or a
/// read error. DATA and HEADERS never end the loop, so a response body split
/// across many DATA frames is seen in full.
pub struct ResponseDispatcher<R> {
    source: R,
    decoder: HeaderBlockDecoder,
    pending_headers: Option<PendingHeaderBlock>,
    termination: Option<Termination>,
}

impl<R: FrameSource> ResponseDispatcher<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            decoder: HeaderBlockDecoder::new(),
            pending_headers: None,
            termination: None,
        }
    }

    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    fn terminate(&mut self, termination: Termination) {
        debug!(%termination, "response dispatcher finished");
        self.termination = Some(termination);
    }

    /// Next classified event, or `None` once the loop has terminated.
    pub async fn next_event(&mut self) -> Option<ResponseEvent> {
        if self.termination.is_some() {
            return None;
        }

        loop {
            let frame = match self.source.read_frame().await {
                Ok(frame) => frame,
                Err(err) => {
                    self.terminate(Termination::Error(err));
                    return None;
                }
            };
            let stream_id = frame.stream_id();
            trace!(frame_type = %frame.frame_type(), stream_id, flags = frame.header.flags, "<");

            if self.pending_headers.is_some() && frame.frame_type() != FrameType::Continuation {
                self.terminate(Termination::Error(ProtocolError::Protocol(format!(
                    "{} frame interrupted a header block",
                    frame.frame_type()
                ))));
                return None;
            }

            match frame.kind {
                FrameKind::Headers {
                    block,
                    end_stream,
                    end_headers,
                } => {
                    if end_headers {
                        return Some(self.decode_block(stream_id, &block, end_stream));
                    }
                    self.pending_headers = Some(PendingHeaderBlock {
                        stream_id,
                        block: BytesMut::from(&block[..]),
                        end_stream,
                    });
                }
                FrameKind::Continuation { block, end_headers } => {
                    match self.pending_headers.as_mut() {
                        Some(pending) if pending.stream_id == stream_id => {
                            pending.block.extend_from_slice(&block);
                        }
                        _ => {
                            self.terminate(Termination::Error(ProtocolError::Protocol(
                                "CONTINUATION frame without pending header block".to_string(),
                            )));
                            return None;
                        }
                    }
                    if end_headers {
                        if let Some(pending) = self.pending_headers.take() {
                            let block = pending.block.freeze();
                            return Some(self.decode_block(
                                pending.stream_id,
                                &block,
                                pending.end_stream,
                            ));
                        }
                    }
                }
                FrameKind::Data {
                    payload,
                    end_stream,
                } => {
                    return Some(ResponseEvent::Data {
                        stream_id,
                        payload,
                        end_stream,
                    });
                }
                FrameKind::GoAway {
                    last_stream_id,
                    error_code,
                    debug_data,
                } => {
                    self.terminate(Termination::GoAway {
                        last_stream_id,
                        error_code,
                        debug_data: debug_data.clone(),
                    });
                    return Some(ResponseEvent::GoAway {
                        last_stream_id,
                        error_code,
                        debug_data,
                    });
                }
                FrameKind::RstStream { error_code } => {
                    self.terminate(Termination::Reset {
                        stream_id,
                        error_code,
                    });
                    return Some(ResponseEvent::RstStream {
                        stream_id,
                        error_code,
                    });
                }
                // No PING ack: the read side never writes.
                FrameKind::Ping { ack, opaque } => return Some(ResponseEvent::Ping { ack, opaque }),
                FrameKind::Settings { .. } => return Some(ResponseEvent::Settings { ack: false }),
                FrameKind::SettingsAck => return Some(ResponseEvent::Settings { ack: true }),
                FrameKind::WindowUpdate { increment } => {
                    return Some(ResponseEvent::WindowUpdate {
                        stream_id,
                        increment,
                    });
                }
                FrameKind::Unknown { frame_type, .. } => {
                    return Some(ResponseEvent::Unhandled {
                        frame_type,
                        stream_id,
                    });
                }
            }
        }
    }

    fn decode_block(&mut self, stream_id: u32, block: &[u8], end_stream: bool) -> ResponseEvent {
        match self.decoder.decode(block) {
            Ok(fields) => ResponseEvent::Headers {
                stream_id,
                fields,
                end_stream,
            },
            Err(error) => {
                warn!(stream_id, %error, "failed to decode response headers");
                ResponseEvent::HeaderDecodeFailed { stream_id, error }
            }
        }
    }

    /// Drains the connection, handing every event to `on_event`, and returns
    /// the terminal status.
    pub async fn run<F>(mut self, mut on_event: F) -> Termination
    where
        F: FnMut(ResponseEvent),
    {
        while let Some(event) = self.next_event().await {
            on_event(event);
        }
        self.termination.unwrap_or_else(|| {
            Termination::Error(ProtocolError::Protocol(
                "response dispatcher stopped without a terminal condition".to_string(),
            ))
        })
    }
}
