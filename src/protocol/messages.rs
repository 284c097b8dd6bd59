//! Typed Wyoming message schemas used by the adapter.
//!
//! # Known inbound events
//!
//! | Type          | Maps to                          |
//! |---------------|----------------------------------|
//! | `describe`    | [`InboundEvent::Describe`]       |
//! | `transcript`  | [`InboundEvent::Transcript`]     |
//! | *(any other)* | [`InboundEvent::Other`]          |
//!
//! Outbound events are `info`, `handled` and `not-handled`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::protocol::Event;
use crate::{AppError, Result};

/// Event type of a capability request.
pub const DESCRIBE_TYPE: &str = "describe";
/// Event type of a capability descriptor response.
pub const INFO_TYPE: &str = "info";
/// Event type of a recognized speech transcript.
pub const TRANSCRIPT_TYPE: &str = "transcript";
/// Event type of a successful intent response.
pub const HANDLED_TYPE: &str = "handled";
/// Event type of an unsuccessful intent response.
pub const NOT_HANDLED_TYPE: &str = "not-handled";

/// A message schema that maps to and from a Wyoming [`Event`].
pub trait Message: Serialize + DeserializeOwned {
    /// Event type tag carried on the wire.
    const EVENT_TYPE: &'static str;

    /// Encode the message as an event.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if the message does not serialise to a
    /// JSON object.
    fn to_event(&self) -> Result<Event> {
        let value = serde_json::to_value(self)
            .map_err(|e| AppError::Protocol(format!("failed to serialise {}: {e}", Self::EVENT_TYPE)))?;
        match value {
            Value::Object(data) => Ok(Event::new(Self::EVENT_TYPE).with_data(data)),
            Value::Null => Ok(Event::new(Self::EVENT_TYPE)),
            other => Err(AppError::Protocol(format!(
                "{} must serialise to an object, got {other}",
                Self::EVENT_TYPE
            ))),
        }
    }

    /// Decode the message from an event.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if the event type does not match or the
    /// data does not fit the schema.
    fn from_event(event: &Event) -> Result<Self> {
        if !event.is_type(Self::EVENT_TYPE) {
            return Err(AppError::Protocol(format!(
                "expected {} event, got {}",
                Self::EVENT_TYPE,
                event.event_type
            )));
        }
        serde_json::from_value(Value::Object(event.data.clone()))
            .map_err(|e| AppError::Protocol(format!("invalid {} data: {e}", Self::EVENT_TYPE)))
    }
}

/// Request for the peer's capabilities. Carries no data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Describe {}

impl Message for Describe {
    const EVENT_TYPE: &'static str = DESCRIBE_TYPE;
}

/// Author attribution attached to programs and models.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    /// Author name.
    pub name: String,
    /// Author or project URL.
    pub url: String,
}

/// One model served by an intent-handling program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleModel {
    /// Model name.
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Attribution.
    pub attribution: Attribution,
    /// Whether the model is installed.
    pub installed: bool,
    /// Model version, if any.
    #[serde(default)]
    pub version: Option<String>,
    /// Supported languages.
    pub languages: Vec<String>,
}

/// An intent-handling program and its models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleProgram {
    /// Program name.
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Attribution.
    pub attribution: Attribution,
    /// Whether the program is installed.
    pub installed: bool,
    /// Program version, if any.
    #[serde(default)]
    pub version: Option<String>,
    /// Models served by the program.
    pub models: Vec<HandleModel>,
}

/// Capability descriptor response.
///
/// Only the `handle` list is populated by this service; the other service
/// lists are sent empty so clients that expect them can still parse the
/// message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    /// Speech-to-text services.
    #[serde(default)]
    pub asr: Vec<Value>,
    /// Text-to-speech services.
    #[serde(default)]
    pub tts: Vec<Value>,
    /// Intent-handling services.
    #[serde(default)]
    pub handle: Vec<HandleProgram>,
    /// Intent-recognition services.
    #[serde(default)]
    pub intent: Vec<Value>,
    /// Wake-word services.
    #[serde(default)]
    pub wake: Vec<Value>,
    /// Microphone services.
    #[serde(default)]
    pub mic: Vec<Value>,
    /// Sound output services.
    #[serde(default)]
    pub snd: Vec<Value>,
}

impl Message for Info {
    const EVENT_TYPE: &'static str = INFO_TYPE;
}

/// Recognized speech transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// Transcript text; absent or `null` means empty.
    #[serde(default)]
    pub text: Option<String>,
    /// Language of the transcript, if the recognizer reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Transcript {
    /// Create a transcript carrying `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            language: None,
        }
    }

    /// Read a transcript field by field, dropping values of the wrong type.
    ///
    /// A non-string `text` reads as empty and a non-string `language` as
    /// absent.
    #[must_use]
    pub fn from_data_lenient(data: &Map<String, Value>) -> Self {
        let string_field = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_owned);
        Self {
            text: string_field("text"),
            language: string_field("language"),
        }
    }

    /// Transcript text, or the empty string when none was sent.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

impl Message for Transcript {
    const EVENT_TYPE: &'static str = TRANSCRIPT_TYPE;
}

/// The intent was handled; `text` is the response to speak.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handled {
    /// Response text.
    #[serde(default)]
    pub text: String,
}

impl Message for Handled {
    const EVENT_TYPE: &'static str = HANDLED_TYPE;
}

/// The intent was not handled; `text` explains why, if anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotHandled {
    /// Response text.
    #[serde(default)]
    pub text: String,
}

impl Message for NotHandled {
    const EVENT_TYPE: &'static str = NOT_HANDLED_TYPE;
}

/// Terminal response to a transcript. Exactly one is sent per transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The program exited successfully.
    Handled(Handled),
    /// The program failed or could not be started.
    NotHandled(NotHandled),
}

impl Response {
    /// Response text regardless of outcome.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Handled(handled) => &handled.text,
            Self::NotHandled(not_handled) => &not_handled.text,
        }
    }

    /// Encode the response as an event.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if serialisation fails.
    pub fn to_event(&self) -> Result<Event> {
        match self {
            Self::Handled(handled) => handled.to_event(),
            Self::NotHandled(not_handled) => not_handled.to_event(),
        }
    }
}

/// Inbound event classified once at the connection boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Capability request.
    Describe,
    /// Speech transcript to hand to the program.
    Transcript(Transcript),
    /// Any event the adapter does not act on.
    Other {
        /// Event type tag as received.
        event_type: String,
    },
}

impl InboundEvent {
    /// Classify a decoded event.
    ///
    /// A `transcript` event is always classified as a transcript. Data that
    /// does not fit the schema is logged and read with
    /// [`Transcript::from_data_lenient`].
    #[must_use]
    pub fn classify(event: &Event) -> Self {
        match event.event_type.as_str() {
            DESCRIBE_TYPE => Self::Describe,
            TRANSCRIPT_TYPE => Self::Transcript(Transcript::from_event(event).unwrap_or_else(|err| {
                warn!(%err, "transcript data does not fit the schema, ignoring mistyped fields");
                Transcript::from_data_lenient(&event.data)
            })),
            other => Self::Other {
                event_type: other.to_owned(),
            },
        }
    }
}
