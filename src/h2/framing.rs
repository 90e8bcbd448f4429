use crate::h2::consts::*;
use crate::types::{
    Frame, FrameHeader, FrameKind, FrameSink, FrameSource, FrameType, H2ErrorCode, ProtocolError,
    Setting,
};
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

// HTTP/2 Frame Format (RFC 7540 Section 4.1):
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                 Length (24)                   |
// +---------------+---------------+---------------+
// |   Type (8)    |   Flags (8)   |
// +-+-+-----------+---------------+-------------------------------+
// |R|                 Stream Identifier (31)                      |
// +=+=============================================================+
// |                   Frame Payload (0...)                      ...
// +---------------------------------------------------------------+

impl From<u8> for FrameType {
    fn from(value: u8) -> Self {
        match value {
            DATA_FRAME_TYPE => FrameType::Data,
            HEADERS_FRAME_TYPE => FrameType::Headers,
            PRIORITY_FRAME_TYPE => FrameType::Priority,
            RST_STREAM_FRAME_TYPE => FrameType::RstStream,
            SETTINGS_FRAME_TYPE => FrameType::Settings,
            PUSH_PROMISE_FRAME_TYPE => FrameType::PushPromise,
            PING_FRAME_TYPE => FrameType::Ping,
            GOAWAY_FRAME_TYPE => FrameType::GoAway,
            WINDOW_UPDATE_FRAME_TYPE => FrameType::WindowUpdate,
            CONTINUATION_FRAME_TYPE => FrameType::Continuation,
            other => FrameType::Unknown(other),
        }
    }
}

impl From<FrameType> for u8 {
    fn from(frame_type: FrameType) -> Self {
        match frame_type {
            FrameType::Data => DATA_FRAME_TYPE,
            FrameType::Headers => HEADERS_FRAME_TYPE,
            FrameType::Priority => PRIORITY_FRAME_TYPE,
            FrameType::RstStream => RST_STREAM_FRAME_TYPE,
            FrameType::Settings => SETTINGS_FRAME_TYPE,
            FrameType::PushPromise => PUSH_PROMISE_FRAME_TYPE,
            FrameType::Ping => PING_FRAME_TYPE,
            FrameType::GoAway => GOAWAY_FRAME_TYPE,
            FrameType::WindowUpdate => WINDOW_UPDATE_FRAME_TYPE,
            FrameType::Continuation => CONTINUATION_FRAME_TYPE,
            FrameType::Unknown(code) => code,
        }
    }
}

impl FrameHeader {
    pub fn parse(buf: &[u8; FRAME_HEADER_SIZE]) -> Self {
        let length = ((buf[0] as u32) << 16) | ((buf[1] as u32) << 8) | (buf[2] as u32);
        let stream_id = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]) & STREAM_ID_MASK;

        Self {
            length,
            frame_type: FrameType::from(buf[3]),
            flags: buf[4],
            stream_id,
        }
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        (self.flags & flag) != 0
    }
}

impl FrameKind {
    pub fn frame_type(&self) -> FrameType {
        match self {
            FrameKind::Settings { .. } | FrameKind::SettingsAck => FrameType::Settings,
            FrameKind::WindowUpdate { .. } => FrameType::WindowUpdate,
            FrameKind::Headers { .. } => FrameType::Headers,
            FrameKind::Continuation { .. } => FrameType::Continuation,
            FrameKind::Data { .. } => FrameType::Data,
            FrameKind::GoAway { .. } => FrameType::GoAway,
            FrameKind::RstStream { .. } => FrameType::RstStream,
            FrameKind::Ping { .. } => FrameType::Ping,
            FrameKind::Unknown { frame_type, .. } => *frame_type,
        }
    }

    fn flags(&self) -> u8 {
        match self {
            FrameKind::SettingsAck => ACK_FLAG,
            FrameKind::Ping { ack: true, .. } => ACK_FLAG,
            FrameKind::Headers {
                end_stream,
                end_headers,
                ..
            } => {
                let mut flags = 0;
                if *end_stream {
                    flags |= END_STREAM_FLAG;
                }
                if *end_headers {
                    flags |= END_HEADERS_FLAG;
                }
                flags
            }
            FrameKind::Continuation {
                end_headers: true, ..
            } => END_HEADERS_FLAG,
            FrameKind::Data {
                end_stream: true, ..
            } => END_STREAM_FLAG,
            FrameKind::Unknown { flags, .. } => *flags,
            _ => 0,
        }
    }

    fn encode_payload(&self) -> Bytes {
        match self {
            FrameKind::Settings { params } => {
                let mut payload = BytesMut::with_capacity(params.len() * 6);
                for setting in params {
                    payload.put_u16(setting.id);
                    payload.put_u32(setting.value);
                }
                payload.freeze()
            }
            FrameKind::SettingsAck => Bytes::new(),
            FrameKind::WindowUpdate { increment } => {
                let mut payload = BytesMut::with_capacity(4);
                payload.put_u32(increment & MAX_WINDOW_SIZE);
                payload.freeze()
            }
            FrameKind::Headers { block, .. } | FrameKind::Continuation { block, .. } => {
                block.clone()
            }
            FrameKind::Data { payload, .. } => payload.clone(),
            FrameKind::GoAway {
                last_stream_id,
                error_code,
                debug_data,
            } => {
                let mut payload = BytesMut::with_capacity(8 + debug_data.len());
                payload.put_u32(last_stream_id & STREAM_ID_MASK);
                payload.put_u32(error_code.code());
                payload.put_slice(debug_data);
                payload.freeze()
            }
            FrameKind::RstStream { error_code } => {
                let mut payload = BytesMut::with_capacity(4);
                payload.put_u32(error_code.code());
                payload.freeze()
            }
            FrameKind::Ping { opaque, .. } => Bytes::copy_from_slice(opaque),
            FrameKind::Unknown { payload, .. } => payload.clone(),
        }
    }
}

impl Frame {
    pub fn new(stream_id: u32, kind: FrameKind) -> Self {
        let length = kind.encode_payload().len() as u32;
        Self {
            header: FrameHeader {
                length,
                frame_type: kind.frame_type(),
                flags: kind.flags(),
                stream_id: stream_id & STREAM_ID_MASK,
            },
            kind,
        }
    }

    pub fn data(stream_id: u32, payload: Bytes, end_stream: bool) -> Self {
        Self::new(
            stream_id,
            FrameKind::Data {
                payload,
                end_stream,
            },
        )
    }

    pub fn headers(stream_id: u32, block: Bytes, end_stream: bool, end_headers: bool) -> Self {
        Self::new(
            stream_id,
            FrameKind::Headers {
                block,
                end_stream,
                end_headers,
            },
        )
    }

    pub fn continuation(stream_id: u32, block: Bytes, end_headers: bool) -> Self {
        Self::new(stream_id, FrameKind::Continuation { block, end_headers })
    }

    pub fn settings(params: &[(u16, u32)]) -> Self {
        let params = params
            .iter()
            .map(|&(id, value)| Setting { id, value })
            .collect();
        Self::new(0, FrameKind::Settings { params })
    }

    pub fn settings_ack() -> Self {
        Self::new(0, FrameKind::SettingsAck)
    }

    pub fn window_update(stream_id: u32, increment: u32) -> Self {
        Self::new(stream_id, FrameKind::WindowUpdate { increment })
    }

    pub fn rst(stream_id: u32, error_code: H2ErrorCode) -> Self {
        Self::new(stream_id, FrameKind::RstStream { error_code })
    }

    pub fn ping(opaque: [u8; 8], ack: bool) -> Self {
        Self::new(0, FrameKind::Ping { ack, opaque })
    }

    pub fn goaway(last_stream_id: u32, error_code: H2ErrorCode, debug_data: &[u8]) -> Self {
        Self::new(
            0,
            FrameKind::GoAway {
                last_stream_id,
                error_code,
                debug_data: Bytes::copy_from_slice(debug_data),
            },
        )
    }

    pub fn stream_id(&self) -> u32 {
        self.header.stream_id
    }

    pub fn frame_type(&self) -> FrameType {
        self.header.frame_type
    }

    pub fn serialize(&self) -> Result<Bytes, ProtocolError> {
        let payload = self.kind.encode_payload();

        if payload.len() > MAX_FRAME_SIZE_UPPER_BOUND as usize {
            return Err(ProtocolError::FrameSize(format!(
                "Frame payload size {} exceeds maximum {}",
                payload.len(),
                MAX_FRAME_SIZE_UPPER_BOUND
            )));
        }

        let mut result = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());

        // Length (24 bits)
        let length = payload.len() as u32;
        result.put_u8(((length >> 16) & 0xFF) as u8);
        result.put_u8(((length >> 8) & 0xFF) as u8);
        result.put_u8((length & 0xFF) as u8);

        result.put_u8(u8::from(self.header.frame_type));
        result.put_u8(self.header.flags);

        // Stream ID (31 bits, with reserved bit clear)
        result.put_u32(self.header.stream_id & STREAM_ID_MASK);

        result.put_slice(&payload);

        Ok(result.freeze())
    }

    /// Parses one complete frame from the front of `data`.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < FRAME_HEADER_SIZE {
            return Err(ProtocolError::FrameSize("Frame too short".to_string()));
        }

        let mut header_buf = [0u8; FRAME_HEADER_SIZE];
        header_buf.copy_from_slice(&data[..FRAME_HEADER_SIZE]);
        let header = FrameHeader::parse(&header_buf);

        let end = FRAME_HEADER_SIZE + header.length as usize;
        if data.len() < end {
            return Err(ProtocolError::FrameSize(
                "Incomplete frame payload".to_string(),
            ));
        }

        Self::decode(header, Bytes::copy_from_slice(&data[FRAME_HEADER_SIZE..end]))
    }

    /// Interprets a raw payload according to the frame type in `header`.
    pub fn decode(header: FrameHeader, payload: Bytes) -> Result<Self, ProtocolError> {
        let kind = match header.frame_type {
            FrameType::Settings => {
                if header.stream_id != 0 {
                    return Err(ProtocolError::Protocol(
                        "SETTINGS frame on a non-zero stream".to_string(),
                    ));
                }
                if header.has_flag(ACK_FLAG) {
                    if !payload.is_empty() {
                        return Err(ProtocolError::FrameSize(
                            "SETTINGS acknowledgement must be empty".to_string(),
                        ));
                    }
                    FrameKind::SettingsAck
                } else {
                    if payload.len() % 6 != 0 {
                        return Err(ProtocolError::FrameSize(format!(
                            "SETTINGS payload length {} is not a multiple of 6",
                            payload.len()
                        )));
                    }
                    let params = payload
                        .chunks_exact(6)
                        .map(|chunk| Setting {
                            id: u16::from_be_bytes([chunk[0], chunk[1]]),
                            value: u32::from_be_bytes([chunk[2], chunk[3], chunk[4], chunk[5]]),
                        })
                        .collect();
                    FrameKind::Settings { params }
                }
            }
            FrameType::WindowUpdate => {
                let increment = read_u32(&payload, "WINDOW_UPDATE")? & MAX_WINDOW_SIZE;
                FrameKind::WindowUpdate { increment }
            }
            FrameType::Headers => FrameKind::Headers {
                block: header_fragment(&header, &payload)?,
                end_stream: header.has_flag(END_STREAM_FLAG),
                end_headers: header.has_flag(END_HEADERS_FLAG),
            },
            FrameType::Continuation => FrameKind::Continuation {
                block: payload,
                end_headers: header.has_flag(END_HEADERS_FLAG),
            },
            FrameType::Data => FrameKind::Data {
                payload: data_payload(&header, &payload)?,
                end_stream: header.has_flag(END_STREAM_FLAG),
            },
            FrameType::GoAway => {
                if payload.len() < 8 {
                    return Err(ProtocolError::FrameSize(format!(
                        "GOAWAY payload length {} is shorter than 8",
                        payload.len()
                    )));
                }
                let last_stream_id =
                    u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]])
                        & STREAM_ID_MASK;
                let error_code =
                    u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
                FrameKind::GoAway {
                    last_stream_id,
                    error_code: H2ErrorCode::from(error_code),
                    debug_data: payload.slice(8..),
                }
            }
            FrameType::RstStream => FrameKind::RstStream {
                error_code: H2ErrorCode::from(read_u32(&payload, "RST_STREAM")?),
            },
            FrameType::Ping => {
                if payload.len() != 8 {
                    return Err(ProtocolError::FrameSize(format!(
                        "PING payload length {} is not 8",
                        payload.len()
                    )));
                }
                let mut opaque = [0u8; 8];
                opaque.copy_from_slice(&payload);
                FrameKind::Ping {
                    ack: header.has_flag(ACK_FLAG),
                    opaque,
                }
            }
            frame_type => FrameKind::Unknown {
                frame_type,
                flags: header.flags,
                payload,
            },
        };

        Ok(Frame { header, kind })
    }
}

fn read_u32(payload: &[u8], frame: &str) -> Result<u32, ProtocolError> {
    if payload.len() != 4 {
        return Err(ProtocolError::FrameSize(format!(
            "{} payload length {} is not 4",
            frame,
            payload.len()
        )));
    }
    Ok(u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]))
}

fn header_fragment(header: &FrameHeader, payload: &Bytes) -> Result<Bytes, ProtocolError> {
    let mut offset = 0usize;
    let mut pad_length = 0usize;

    if header.has_flag(PADDED_FLAG) {
        if payload.is_empty() {
            return Err(ProtocolError::Protocol(
                "PADDED flag set but no pad length available".to_string(),
            ));
        }
        pad_length = payload[0] as usize;
        offset += 1;
    }

    if header.has_flag(PRIORITY_FLAG) {
        if payload.len() < offset + 5 {
            return Err(ProtocolError::Protocol(
                "PRIORITY flag set but insufficient payload".to_string(),
            ));
        }
        offset += 5;
    }

    if pad_length > payload.len().saturating_sub(offset) {
        return Err(ProtocolError::Protocol(
            "Padding exceeds HEADERS payload".to_string(),
        ));
    }

    Ok(payload.slice(offset..payload.len() - pad_length))
}

fn data_payload(header: &FrameHeader, payload: &Bytes) -> Result<Bytes, ProtocolError> {
    if !header.has_flag(PADDED_FLAG) {
        return Ok(payload.clone());
    }

    if payload.is_empty() {
        return Err(ProtocolError::Protocol(
            "DATA frame with PADDED flag set but empty payload".to_string(),
        ));
    }

    let pad_length = payload[0] as usize;
    if pad_length > payload.len() - 1 {
        return Err(ProtocolError::Protocol(
            "Padding length exceeds DATA payload".to_string(),
        ));
    }

    Ok(payload.slice(1..payload.len() - pad_length))
}

/// Reads frames from the receiving half of a connection.
pub struct FrameReader<R> {
    inner: R,
    // Never advertised above the protocol default, so that is the limit.
    max_frame_size: u32,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> FrameSource for FrameReader<R> {
    async fn read_frame(&mut self) -> Result<Frame, ProtocolError> {
        let mut header_buf = [0u8; FRAME_HEADER_SIZE];
        self.inner.read_exact(&mut header_buf).await?;
        let header = FrameHeader::parse(&header_buf);

        if header.length > self.max_frame_size {
            return Err(ProtocolError::FrameSize(format!(
                "{} frame of {} bytes exceeds MAX_FRAME_SIZE {}",
                header.frame_type, header.length, self.max_frame_size
            )));
        }

        let mut payload = vec![0u8; header.length as usize];
        if header.length > 0 {
            self.inner.read_exact(&mut payload).await?;
        }

        Frame::decode(header, Bytes::from(payload))
    }
}

/// Writes frames to the sending half of a connection, flushing after each one.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn shutdown(&mut self) -> Result<(), ProtocolError> {
        self.inner.shutdown().await.map_err(ProtocolError::Io)
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> FrameSink for FrameWriter<W> {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), ProtocolError> {
        let serialized = frame.serialize()?;
        self.write_raw(&serialized).await
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        self.inner.write_all(bytes).await?;
        self.inner.flush().await?;
        Ok(())
    }
}
