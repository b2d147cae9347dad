//! Line-delimited JSON framing for the wire protocol

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::NetworkError;
use crate::message::Message;

/// Maximum length of a single wire line (1 MB).
const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Codec for the overlay wire protocol.
///
/// Wire format: one JSON-encoded [`Message`] per line, UTF-8, terminated
/// by `\n`. JSON string escaping guarantees an encoded message never
/// contains an interior raw newline, so the delimiter is unambiguous.
/// Any line that fails to parse is a codec error; the connection it
/// arrived on is torn down by the read loop.
#[derive(Debug, Default)]
pub struct WireCodec;

impl WireCodec {
    /// Creates a new codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes a message to a complete wire line (standalone function).
    pub fn encode_line(msg: &Message) -> Result<Vec<u8>, NetworkError> {
        let mut payload = serde_json::to_vec(msg)
            .map_err(|e| NetworkError::Codec(format!("serialize error: {}", e)))?;

        if payload.len() > MAX_FRAME_SIZE {
            return Err(NetworkError::Codec(format!(
                "message too large: {} bytes (max {})",
                payload.len(),
                MAX_FRAME_SIZE
            )));
        }

        payload.push(b'\n');
        Ok(payload)
    }

    /// Decodes a single wire line (standalone function).
    ///
    /// Accepts the line with or without its trailing delimiter.
    pub fn decode_line(data: &[u8]) -> Result<Message, NetworkError> {
        serde_json::from_slice(trim_delimiter(data))
            .map_err(|e| NetworkError::Codec(format!("invalid message line: {}", e)))
    }
}

/// Strips one trailing `\n` and an optional `\r` before it.
fn trim_delimiter(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

impl Decoder for WireCodec {
    type Item = Message;
    type Error = NetworkError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let line = src.split_to(pos + 1);
                serde_json::from_slice(trim_delimiter(&line))
                    .map(Some)
                    .map_err(|e| NetworkError::Codec(format!("invalid message line: {}", e)))
            }
            None if src.len() > MAX_FRAME_SIZE => Err(NetworkError::Codec(format!(
                "line exceeds {} bytes without a delimiter",
                MAX_FRAME_SIZE
            ))),
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for WireCodec {
    type Error = NetworkError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)
            .map_err(|e| NetworkError::Codec(format!("serialize error: {}", e)))?;

        if payload.len() > MAX_FRAME_SIZE {
            return Err(NetworkError::Codec(format!(
                "message too large: {} bytes (max {})",
                payload.len(),
                MAX_FRAME_SIZE
            )));
        }

        dst.reserve(payload.len() + 1);
        dst.put_slice(&payload);
        dst.put_u8(b'\n');
        Ok(())
    }
}
