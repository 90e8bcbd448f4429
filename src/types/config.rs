use super::error::ProtocolError;
use super::timeouts::SessionTimeouts;
use crate::h2::writer::ChunkingPolicy;
use crate::utils::{DEFAULT_CONTENT_TYPE, DEFAULT_PUSH_PATH, SAMPLE_LINE_PROTOCOL, USER_AGENT};
use bytes::Bytes;

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_STREAM_ID: u32 = 3;

/// Everything a session needs, supplied once at construction.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub server_address: String,
    pub bearer_token: String,
    pub port: u16,
    pub path: String,
    pub user_agent: String,
    pub content_type: String,
    pub body: Bytes,
    pub stream_id: u32,
    pub chunking: ChunkingPolicy,
    /// Set END_STREAM on the last DATA frame.
    pub end_stream: bool,
    /// Skip server certificate verification.
    pub insecure: bool,
    pub timeouts: SessionTimeouts,
}

impl SessionConfig {
    pub fn new(server_address: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            bearer_token: bearer_token.into(),
            port: DEFAULT_PORT,
            path: DEFAULT_PUSH_PATH.to_string(),
            user_agent: USER_AGENT.to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            body: Bytes::from_static(SAMPLE_LINE_PROTOCOL.as_bytes()),
            stream_id: DEFAULT_STREAM_ID,
            chunking: ChunkingPolicy::default(),
            end_stream: false,
            insecure: false,
            timeouts: SessionTimeouts::default(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    pub fn stream_id(mut self, stream_id: u32) -> Self {
        self.stream_id = stream_id;
        self
    }

    pub fn chunking(mut self, chunking: ChunkingPolicy) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn end_stream(mut self, end_stream: bool) -> Self {
        self.end_stream = end_stream;
        self
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn timeouts(mut self, timeouts: SessionTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.server_address.trim().is_empty() {
            return Err(ProtocolError::InvalidConfig(
                "server address is empty".to_string(),
            ));
        }
        if self.bearer_token.is_empty() {
            return Err(ProtocolError::InvalidConfig(
                "bearer token is empty".to_string(),
            ));
        }
        if self.stream_id == 0 || self.stream_id % 2 == 0 || self.stream_id > 0x7FFF_FFFF {
            return Err(ProtocolError::InvalidConfig(format!(
                "client stream id must be odd and non-zero, got {}",
                self.stream_id
            )));
        }
        if !self.path.starts_with('/') {
            return Err(ProtocolError::InvalidConfig(format!(
                "path must start with '/', got '{}'",
                self.path
            )));
        }

        for (name, value) in [
            ("server address", self.server_address.as_str()),
            ("bearer token", self.bearer_token.as_str()),
            ("path", self.path.as_str()),
            ("user agent", self.user_agent.as_str()),
            ("content type", self.content_type.as_str()),
        ] {
            if value.contains(['\r', '\n', '\0']) {
                return Err(ProtocolError::InvalidConfig(format!(
                    "{} contains control characters",
                    name
                )));
            }
        }

        Ok(())
    }
}
