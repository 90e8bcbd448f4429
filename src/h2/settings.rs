use crate::h2::consts::*;
use crate::types::{ProtocolError, Setting};

/// Parameters announced by the server in its initial SETTINGS frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSettings {
    pub header_table_size: u32,
    pub enable_push: bool,
    pub max_concurrent_streams: Option<u32>,
    pub initial_window_size: u32,
    pub max_frame_size: u32,
    pub max_header_list_size: Option<u32>,
}

impl Default for PeerSettings {
    fn default() -> Self {
        Self {
            header_table_size: DEFAULT_HEADER_TABLE_SIZE,
            enable_push: true,
            max_concurrent_streams: None,
            initial_window_size: DEFAULT_INITIAL_WINDOW_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_header_list_size: None,
        }
    }
}

impl PeerSettings {
    pub fn from_params(params: &[Setting]) -> Result<Self, ProtocolError> {
        let mut settings = Self::default();
        for setting in params {
            settings.apply(*setting)?;
        }
        Ok(settings)
    }

    pub fn apply(&mut self, setting: Setting) -> Result<(), ProtocolError> {
        let Setting { id, value } = setting;
        match id {
            SETTINGS_HEADER_TABLE_SIZE => self.header_table_size = value,
            SETTINGS_ENABLE_PUSH => {
                if value > 1 {
                    return Err(ProtocolError::Protocol(format!(
                        "Invalid ENABLE_PUSH value {}",
                        value
                    )));
                }
                self.enable_push = value == 1;
            }
            SETTINGS_MAX_CONCURRENT_STREAMS => self.max_concurrent_streams = Some(value),
            SETTINGS_INITIAL_WINDOW_SIZE => {
                if value > MAX_WINDOW_SIZE {
                    return Err(ProtocolError::FlowControl(format!(
                        "Invalid INITIAL_WINDOW_SIZE value {}",
                        value
                    )));
                }
                self.initial_window_size = value;
            }
            SETTINGS_MAX_FRAME_SIZE => {
                if !(DEFAULT_MAX_FRAME_SIZE..=MAX_FRAME_SIZE_UPPER_BOUND).contains(&value) {
                    return Err(ProtocolError::Protocol(format!(
                        "Invalid MAX_FRAME_SIZE value {}",
                        value
                    )));
                }
                self.max_frame_size = value;
            }
            SETTINGS_MAX_HEADER_LIST_SIZE => self.max_header_list_size = Some(value),
            _ => {
                // Unknown settings are ignored per RFC 7540
            }
        }
        Ok(())
    }
}
