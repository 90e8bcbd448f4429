#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use h2trickle::h2::consts::CONNECTION_PREFACE;
use h2trickle::h2::hpack::HeaderBlockEncoder;
use h2trickle::h2::{FrameReader, FrameWriter};
use h2trickle::types::{Frame, FrameSink, FrameSource, HeaderField, ProtocolError};
use std::collections::VecDeque;
use std::io;
use tokio::io::{AsyncReadExt, DuplexStream, ReadHalf, WriteHalf};

/// Records everything written to it.
#[derive(Default)]
pub struct MockSink {
    pub raw: Vec<Vec<u8>>,
    pub frames: Vec<Frame>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FrameSink for MockSink {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), ProtocolError> {
        self.frames.push(frame);
        Ok(())
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        self.raw.push(bytes.to_vec());
        Ok(())
    }
}

/// Hands out a fixed list of frames, then reports EOF.
pub struct ScriptedSource {
    frames: VecDeque<Frame>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn read_frame(&mut self) -> Result<Frame, ProtocolError> {
        self.frames.pop_front().ok_or_else(|| {
            ProtocolError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "script exhausted",
            ))
        })
    }
}

pub fn response_headers(stream_id: u32, status: &str) -> Frame {
    let block = HeaderBlockEncoder::new()
        .encode(&[
            HeaderField::new(":status", status),
            HeaderField::new("content-type", "text/plain"),
        ])
        .expect("encode response headers");
    Frame::headers(stream_id, block, false, true)
}

/// Server end of an in-memory connection.
pub struct FakeServer {
    pub reader: FrameReader<ReadHalf<DuplexStream>>,
    pub writer: FrameWriter<WriteHalf<DuplexStream>>,
}

impl FakeServer {
    /// Consumes and checks the client preface.
    pub async fn accept(io: DuplexStream) -> Self {
        let (mut read_half, write_half) = tokio::io::split(io);
        let mut preface = vec![0u8; CONNECTION_PREFACE.len()];
        read_half
            .read_exact(&mut preface)
            .await
            .expect("read preface");
        assert_eq!(preface, CONNECTION_PREFACE);

        Self {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(write_half),
        }
    }

    pub async fn send(&mut self, frame: Frame) {
        self.writer.write_frame(frame).await.expect("server write");
    }

    pub async fn recv(&mut self) -> Frame {
        self.reader.read_frame().await.expect("server read")
    }

    /// Keeps reading until the client closes its side.
    pub async fn drain(&mut self) {
        while self.reader.read_frame().await.is_ok() {}
    }

    /// SETTINGS, expect the ack, then WINDOW_UPDATE on the connection.
    pub async fn handshake(&mut self, settings: &[(u16, u32)], increment: u32) {
        self.send(Frame::settings(settings)).await;
        let ack = self.recv().await;
        assert_eq!(ack, Frame::settings_ack());
        self.send(Frame::window_update(0, increment)).await;
    }
}

pub fn concat(payloads: &[Bytes]) -> Vec<u8> {
    payloads.iter().flat_map(|p| p.iter().copied()).collect()
}
