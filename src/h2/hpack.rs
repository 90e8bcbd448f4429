use bytes::Bytes;
use hpack::{Decoder, Encoder};

use crate::h2::consts::DEFAULT_HEADER_TABLE_SIZE;
use crate::types::{HeaderField, ProtocolError};

/// Compresses one request's header list into a single HPACK block.
pub struct HeaderBlockEncoder {
    encoder: Encoder<'static>,
}

impl HeaderBlockEncoder {
    pub fn new() -> Self {
        Self {
            encoder: Encoder::new(),
        }
    }

    /// Pseudo-headers must precede regular headers (RFC 7540 Section 8.1.2.1)
    /// and every name must already be lowercase.
    pub fn encode(&mut self, fields: &[HeaderField]) -> Result<Bytes, ProtocolError> {
        validate_fields(fields)?;

        let header_tuples = fields
            .iter()
            .map(|h| (h.name.as_bytes(), h.value.as_bytes()))
            .collect::<Vec<_>>();

        let encoded = self.encoder.encode(header_tuples);
        Ok(Bytes::from(encoded))
    }
}

impl Default for HeaderBlockEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_fields(fields: &[HeaderField]) -> Result<(), ProtocolError> {
    let mut seen_regular = false;

    for field in fields {
        if field.name.is_empty() || field.name == ":" {
            return Err(ProtocolError::Codec("Empty header name".to_string()));
        }
        if field.name.contains(char::is_whitespace) {
            return Err(ProtocolError::Codec(format!(
                "Header name contains whitespace: {}",
                field.name
            )));
        }
        if field.name.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(ProtocolError::Codec(format!(
                "Header name must be lowercase: {}",
                field.name
            )));
        }

        if field.is_pseudo() {
            if seen_regular {
                return Err(ProtocolError::Codec(format!(
                    "Pseudo-header {} follows a regular header",
                    field.name
                )));
            }
        } else {
            seen_regular = true;
        }
    }

    Ok(())
}

/// Decodes response header blocks. Keeps the HPACK dynamic table for the
/// lifetime of the connection.
pub struct HeaderBlockDecoder {
    decoder: Decoder<'static>,
}

impl HeaderBlockDecoder {
    pub fn new() -> Self {
        let mut decoder = Decoder::new();
        decoder.set_max_table_size(DEFAULT_HEADER_TABLE_SIZE as usize);
        Self { decoder }
    }

    pub fn decode(&mut self, block: &[u8]) -> Result<Vec<HeaderField>, ProtocolError> {
        match self.decoder.decode(block) {
            Ok(entries) => entries
                .into_iter()
                .map(|(name, value)| Self::into_field(name, value))
                .collect(),
            Err(err) => Err(ProtocolError::Codec(format!(
                "HPACK decode error: {:?}",
                err
            ))),
        }
    }

    fn into_field(name: Vec<u8>, value: Vec<u8>) -> Result<HeaderField, ProtocolError> {
        let name = String::from_utf8(name).map_err(|e| {
            ProtocolError::Codec(format!("Invalid UTF-8 in header name: {}", e))
        })?;
        let value = String::from_utf8(value).map_err(|e| {
            ProtocolError::Codec(format!("Invalid UTF-8 in header value: {}", e))
        })?;

        Ok(HeaderField { name, value })
    }
}

impl Default for HeaderBlockDecoder {
    fn default() -> Self {
        Self::new()
    }
}
