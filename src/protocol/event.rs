//! Generic Wyoming event value.

use bytes::Bytes;
use serde_json::{Map, Value};

/// One event exchanged with a Wyoming peer.
///
/// `data` holds the merged JSON object from the header's inline `data` field
/// and the separate data block. `payload` carries raw bytes (audio chunks,
/// for example) and is `None` when the header announces no payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event type tag (e.g. `transcript`).
    pub event_type: String,
    /// Structured event data.
    pub data: Map<String, Value>,
    /// Optional binary payload.
    pub payload: Option<Bytes>,
}

impl Event {
    /// Create an event with no data and no payload.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: Map::new(),
            payload: None,
        }
    }

    /// Replace the event data.
    #[must_use]
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Attach a binary payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Whether this event carries the given type tag.
    #[must_use]
    pub fn is_type(&self, event_type: &str) -> bool {
        self.event_type == event_type
    }
}
