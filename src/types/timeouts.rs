use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionTimeouts {
    /// TCP connect plus TLS handshake.
    pub connect: Option<Duration>,
    /// Each read performed by the HTTP/2 handshake.
    pub handshake: Option<Duration>,
    /// Everything after the handshake until the response side terminates.
    pub session: Option<Duration>,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            connect: Some(Duration::from_secs(10)),
            handshake: Some(Duration::from_secs(10)),
            session: Some(Duration::from_secs(60)),
        }
    }
}

impl SessionTimeouts {
    pub fn disabled() -> Self {
        Self {
            connect: None,
            handshake: None,
            session: None,
        }
    }
}
