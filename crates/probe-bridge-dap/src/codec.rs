//! DAP wire codec: Content-Length based message framing.
//!
//! [`FrameDecoder`] is fed whatever chunks the transport delivers and only
//! yields a message once its whole frame has been buffered.

use crate::error::DapError;
use crate::protocol::Message;

/// Header/body separator.
const SEPARATOR: &[u8] = b"\r\n\r\n";

/// Largest header section accepted before the separator must appear.
pub const MAX_HEADER_LEN: usize = 8 * 1024;

/// Wrap a payload in a `Content-Length` frame.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let header = format!("Content-Length: {}\r\n\r\n", payload.len());
    let mut buf = Vec::with_capacity(header.len() + payload.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Encode a message into a DAP wire-format frame.
pub fn encode(message: &Message) -> Result<Vec<u8>, DapError> {
    let body = serde_json::to_vec(message)
        .map_err(|e| DapError::Protocol(format!("cannot encode message: {e}")))?;
    Ok(frame(&body))
}

/// Decode one frame payload into a message.
pub fn decode(payload: &[u8]) -> Result<Message, DapError> {
    if payload.is_empty() {
        return Err(DapError::Protocol("empty message payload".into()));
    }
    serde_json::from_slice(payload).map_err(|e| DapError::Protocol(format!("invalid message: {e}")))
}

/// `request_seq` of a payload shaped like a response, even one that does
/// not decode as a [`Message`].
pub fn response_request_seq(payload: &[u8]) -> Option<i64> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    if value.get("type")?.as_str()? != "response" {
        return None;
    }
    value.get("request_seq")?.as_i64()
}

/// Incremental frame decoder.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the transport.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Take the payload of the next complete frame, if one is buffered.
    ///
    /// A `FramingError` leaves the decoder unusable; the stream can no
    /// longer be trusted to be aligned on frame boundaries.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, DapError> {
        let Some(header_end) = find_separator(&self.buffer) else {
            if self.buffer.len() > MAX_HEADER_LEN {
                return Err(DapError::Framing(format!(
                    "no header terminator within {MAX_HEADER_LEN} bytes"
                )));
            }
            return Ok(None);
        };
        if header_end > MAX_HEADER_LEN {
            return Err(DapError::Framing(format!(
                "header section of {header_end} bytes exceeds {MAX_HEADER_LEN}"
            )));
        }

        let content_length = parse_header(&self.buffer[..header_end])?;
        let body_start = header_end + SEPARATOR.len();
        let frame_end = body_start + content_length;
        if self.buffer.len() < frame_end {
            return Ok(None);
        }

        let payload = self.buffer[body_start..frame_end].to_vec();
        self.buffer.drain(..frame_end);
        Ok(Some(payload))
    }

    /// Decode the next complete frame into a message.
    ///
    /// A frame whose payload is not a DAP message is consumed and reported
    /// as a `ProtocolError`; the decoder stays usable.
    pub fn next_message(&mut self) -> Result<Option<Message>, DapError> {
        let Some(payload) = self.next_frame()? else {
            return Ok(None);
        };
        decode(&payload).map(Some)
    }

    /// Check that the stream ended on a frame boundary.
    pub fn finish(&self) -> Result<(), DapError> {
        if self.buffer.is_empty() {
            Ok(())
        } else {
            Err(DapError::Framing(format!(
                "stream closed inside a frame ({} bytes buffered)",
                self.buffer.len()
            )))
        }
    }
}

fn find_separator(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(SEPARATOR.len())
        .position(|window| window == SEPARATOR)
}

/// Parse the Content-Length value from the header section.
///
/// Other header fields are ignored.
fn parse_header(header: &[u8]) -> Result<usize, DapError> {
    let header = std::str::from_utf8(header)
        .map_err(|e| DapError::Framing(format!("header is not UTF-8: {e}")))?;

    let mut content_length = None;
    for line in header.split("\r\n") {
        let Some((name, value)) = line.split_once(':') else {
            return Err(DapError::Framing(format!("malformed header line '{line}'")));
        };
        if name.trim().eq_ignore_ascii_case("Content-Length") {
            let value = value.trim();
            let length = value.parse::<usize>().map_err(|e| {
                DapError::Framing(format!("invalid Content-Length value '{value}': {e}"))
            })?;
            content_length = Some(length);
        }
    }
    content_length.ok_or_else(|| DapError::Framing("missing Content-Length header".into()))
}
