//! Framing codec for Wyoming event streams.
//!
//! Every event starts with a newline-terminated JSON header. The header may
//! announce a data block (`data_length` bytes of JSON) and a payload
//! (`payload_length` raw bytes) that follow it directly on the stream.
//!
//! # Usage
//!
//! Use [`EventCodec`] as the codec parameter for
//! [`tokio_util::codec::FramedRead`] (inbound) and
//! [`tokio_util::codec::FramedWrite`] (outbound).
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedRead;
//! use wyoming_handle_external::protocol::EventCodec;
//!
//! let events = FramedRead::new(reader, EventCodec::new());
//! ```

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};

use crate::protocol::{Event, PROTOCOL_VERSION};
use crate::{AppError, Result};

/// Maximum header line length accepted by the decoder: 1 MiB.
///
/// A header that grows past this limit without a terminating `\n` causes
/// [`EventCodec::decode`] to return [`AppError::Protocol`] rather than
/// buffering without bound.
pub const MAX_HEADER_BYTES: usize = 1_048_576;

/// Maximum combined data block and payload size announced by one header: 16 MiB.
///
/// A header announcing more than this, or lengths whose sum overflows,
/// causes [`EventCodec::decode`] to return [`AppError::Protocol`].
pub const MAX_FRAME_BYTES: usize = 16 * 1_048_576;

/// Inbound header line.
#[derive(Debug, Deserialize)]
struct InboundHeader {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(default)]
    data_length: Option<usize>,
    #[serde(default)]
    payload_length: Option<usize>,
}

/// Outbound header line. Data always travels in the separate data block.
#[derive(Debug, Serialize)]
struct OutboundHeader<'a> {
    #[serde(rename = "type")]
    event_type: &'a str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_length: Option<usize>,
}

/// Header already parsed, waiting for its data block and payload bytes.
#[derive(Debug)]
struct PendingEvent {
    event_type: String,
    data: Map<String, Value>,
    data_length: usize,
    payload_length: usize,
}

impl PendingEvent {
    fn from_header(header: InboundHeader) -> Result<Self> {
        let data_length = header.data_length.unwrap_or(0);
        let payload_length = header.payload_length.unwrap_or(0);
        match data_length.checked_add(payload_length) {
            Some(total) if total <= MAX_FRAME_BYTES => Ok(Self {
                event_type: header.event_type,
                data: header.data.unwrap_or_default(),
                data_length,
                payload_length,
            }),
            _ => Err(AppError::Protocol(format!(
                "frame too large: type={} data_length={data_length} payload_length={payload_length} exceeds {MAX_FRAME_BYTES} bytes",
                header.event_type
            ))),
        }
    }

    fn frame_len(&self) -> usize {
        self.data_length + self.payload_length
    }
}

/// Codec for bidirectional Wyoming event streams.
///
/// # Decoder
///
/// Yields one [`Event`] per complete header + data + payload frame.
/// Header lines that are not JSON objects with a string `type`, and data
/// blocks that are not JSON objects, are logged at `WARN` and skipped so a
/// single bad frame does not end the connection.
///
/// # Encoder
///
/// Writes the header with [`PROTOCOL_VERSION`], followed by the data block
/// (when the event has data) and the payload (when present).
#[derive(Debug, Default)]
pub struct EventCodec {
    pending: Option<PendingEvent>,
}

impl EventCodec {
    /// Create a codec with no buffered state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for EventCodec {
    type Item = Event;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Event>> {
        loop {
            if let Some(pending) = self.pending.take() {
                if src.len() < pending.frame_len() {
                    self.pending = Some(pending);
                    return Ok(None);
                }

                if let Some(event) = complete_event(pending, src) {
                    return Ok(Some(event));
                }
                continue;
            }

            let Some(newline) = src.iter().position(|byte| *byte == b'\n') else {
                if src.len() > MAX_HEADER_BYTES {
                    return Err(header_too_long());
                }
                return Ok(None);
            };
            if newline > MAX_HEADER_BYTES {
                return Err(header_too_long());
            }

            let line = src.split_to(newline + 1);
            let line = &line[..newline];
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match serde_json::from_slice::<InboundHeader>(line) {
                Ok(header) => self.pending = Some(PendingEvent::from_header(header)?),
                Err(err) => {
                    warn!(%err, "skipping malformed event header");
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Event>> {
        if let Some(event) = self.decode(src)? {
            return Ok(Some(event));
        }
        if let Some(pending) = self.pending.take() {
            return Err(AppError::Protocol(format!(
                "stream closed mid-event: type={}",
                pending.event_type
            )));
        }
        if !src.is_empty() {
            debug!(bytes = src.len(), "discarding unterminated header at end of stream");
            src.clear();
        }
        Ok(None)
    }
}

impl Encoder<Event> for EventCodec {
    type Error = AppError;

    fn encode(&mut self, item: Event, dst: &mut BytesMut) -> Result<()> {
        let data_bytes = if item.data.is_empty() {
            Vec::new()
        } else {
            serde_json::to_vec(&item.data)
                .map_err(|e| AppError::Protocol(format!("failed to serialise event data: {e}")))?
        };
        let payload = item.payload.as_ref().filter(|payload| !payload.is_empty());

        let header = OutboundHeader {
            event_type: &item.event_type,
            version: PROTOCOL_VERSION,
            data_length: (!data_bytes.is_empty()).then_some(data_bytes.len()),
            payload_length: payload.map(bytes::Bytes::len),
        };
        let header_bytes = serde_json::to_vec(&header)
            .map_err(|e| AppError::Protocol(format!("failed to serialise event header: {e}")))?;

        dst.reserve(header_bytes.len() + 1 + data_bytes.len() + payload.map_or(0, bytes::Bytes::len));
        dst.put_slice(&header_bytes);
        dst.put_u8(b'\n');
        dst.put_slice(&data_bytes);
        if let Some(payload) = payload {
            dst.put_slice(payload);
        }
        Ok(())
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Split the data block and payload off `src` and assemble the event.
///
/// Returns `None` when the data block is not a JSON object; the frame's
/// bytes are consumed either way.
fn complete_event(pending: PendingEvent, src: &mut BytesMut) -> Option<Event> {
    let data_bytes = src.split_to(pending.data_length);
    let payload = (pending.payload_length > 0).then(|| src.split_to(pending.payload_length).freeze());

    let mut data = pending.data;
    if !data_bytes.is_empty() {
        match serde_json::from_slice::<Map<String, Value>>(&data_bytes) {
            Ok(extra) => data.extend(extra),
            Err(err) => {
                warn!(event_type = %pending.event_type, %err, "skipping event with malformed data block");
                return None;
            }
        }
    }

    Some(Event {
        event_type: pending.event_type,
        data,
        payload,
    })
}

fn header_too_long() -> AppError {
    AppError::Protocol(format!("header too long: exceeded {MAX_HEADER_BYTES} bytes"))
}
