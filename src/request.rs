use crate::types::{HeaderField, SessionConfig, DEFAULT_PORT};
use crate::utils::*;
use bytes::Bytes;

/// The single POST this client sends.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub authority: String,
    pub path: String,
    pub user_agent: String,
    pub bearer_token: String,
    pub content_type: String,
    pub body: Bytes,
}

impl PushRequest {
    pub fn from_config(config: &SessionConfig) -> Self {
        let authority = if config.port == DEFAULT_PORT {
            config.server_address.clone()
        } else {
            format!("{}:{}", config.server_address, config.port)
        };

        Self {
            authority,
            path: config.path.clone(),
            user_agent: config.user_agent.clone(),
            bearer_token: config.bearer_token.clone(),
            content_type: config.content_type.clone(),
            body: config.body.clone(),
        }
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Pseudo-headers first, then regular headers. `content-length` always
    /// reflects the exact body size.
    pub fn header_fields(&self) -> Vec<HeaderField> {
        vec![
            HeaderField::new(METHOD_PSEUDO, "POST"),
            HeaderField::new(SCHEME_PSEUDO, "https"),
            HeaderField::new(AUTHORITY_PSEUDO, self.authority.as_str()),
            HeaderField::new(PATH_PSEUDO, self.path.as_str()),
            HeaderField::new(USER_AGENT_HEADER, self.user_agent.as_str()),
            HeaderField::new(ACCEPT_HEADER, "*/*"),
            HeaderField::new(
                AUTHORIZATION_HEADER,
                format!("Bearer {}", self.bearer_token),
            ),
            HeaderField::new(CONTENT_TYPE_HEADER, self.content_type.as_str()),
            HeaderField::new(CONTENT_LENGTH_HEADER, self.content_length().to_string()),
        ]
    }
}
