use crate::h2::dispatcher::{ResponseDispatcher, ResponseEvent, Termination};
use crate::h2::framing::{FrameReader, FrameWriter};
use crate::h2::handshake::{perform_handshake, HandshakeOutcome};
use crate::h2::hpack::HeaderBlockEncoder;
use crate::h2::writer::{RequestStreamWriter, WriteOutcome};
use crate::request::PushRequest;
use crate::stream::create_h2_tls_stream;
use crate::types::{ProtocolError, SessionConfig};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Everything one run observed.
#[derive(Debug)]
pub struct SessionReport {
    pub handshake: HandshakeOutcome,
    pub write: WriteOutcome,
    pub events: Vec<ResponseEvent>,
    pub termination: Termination,
}

impl SessionReport {
    /// The exchange ended with GOAWAY or RST_STREAM and no earlier error or
    /// expired deadline.
    pub fn is_success(&self) -> bool {
        self.termination.is_clean()
    }

    /// Concatenated DATA payloads received on `stream_id`.
    pub fn response_body(&self, stream_id: u32) -> Bytes {
        let mut body = BytesMut::new();
        for event in &self.events {
            if let ResponseEvent::Data {
                stream_id: id,
                payload,
                ..
            } = event
            {
                if *id == stream_id {
                    body.extend_from_slice(payload);
                }
            }
        }
        body.freeze()
    }
}

/// Sequences connect, handshake, concurrent write/read and shutdown for a
/// single request.
pub struct Session {
    config: SessionConfig,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<SessionReport, ProtocolError> {
        self.config.validate()?;
        let stream = create_h2_tls_stream(
            &self.config.server_address,
            self.config.port,
            self.config.insecure,
            self.config.timeouts.connect,
        )
        .await?;
        self.run_on(stream).await
    }

    /// Runs the exchange over an already established byte stream.
    pub async fn run_on<S>(&self, io: S) -> Result<SessionReport, ProtocolError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        self.config.validate()?;
        let config = &self.config;

        let (read_half, write_half) = tokio::io::split(io);
        let mut reader = FrameReader::new(read_half);
        let mut writer = FrameWriter::new(write_half);

        let handshake =
            perform_handshake(&mut reader, &mut writer, config.timeouts.handshake).await?;

        let request = PushRequest::from_config(config);
        let header_block = HeaderBlockEncoder::new().encode(&request.header_fields())?;
        info!(
            stream_id = config.stream_id,
            block_len = header_block.len(),
            content_length = request.content_length(),
            chunking = ?config.chunking,
            "starting request"
        );

        let (closed_tx, closed_rx) = watch::channel(false);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let dispatcher = ResponseDispatcher::new(reader);
        let mut response_task = tokio::spawn(async move {
            let termination = dispatcher
                .run(|event| {
                    info!(%event, "response event");
                    let _ = event_tx.send(event);
                })
                .await;
            let _ = closed_tx.send(true);
            termination
        });

        let deadline = config.timeouts.session.map(|limit| Instant::now() + limit);
        let stream_writer = RequestStreamWriter::new(
            config.stream_id,
            config.chunking,
            handshake.peer_settings.max_frame_size,
        )
        .end_stream(config.end_stream)
        .send_budget(handshake.send_budget())
        .deadline(deadline);

        let write = match stream_writer
            .send(&mut writer, header_block, &request.body, Some(&closed_rx))
            .await
        {
            Ok(write) => write,
            Err(err) => {
                response_task.abort();
                return Err(err);
            }
        };
        info!(
            frames = write.frames(),
            body_bytes = write.body_bytes(),
            "request written, waiting for response side"
        );

        let joined = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, &mut response_task)
                .await
                .ok(),
            None => Some((&mut response_task).await),
        };
        let termination = match joined {
            Some(Ok(termination)) => termination,
            Some(Err(err)) => Termination::Error(ProtocolError::Protocol(format!(
                "response task failed: {}",
                err
            ))),
            None => {
                warn!("session deadline passed before the response side terminated");
                response_task.abort();
                Termination::Error(ProtocolError::Timeout("session"))
            }
        };

        // Events sent before the task ended or was aborted are still queued.
        let mut events = Vec::new();
        while let Ok(event) = event_rx.try_recv() {
            events.push(event);
        }

        info!(%termination, events = events.len(), "session finished");
        if let Err(err) = writer.shutdown().await {
            debug!(%err, "connection shutdown failed");
        }

        Ok(SessionReport {
            handshake,
            write,
            events,
            termination,
        })
    }
}
