//! Wyoming event protocol support.
//!
//! Wyoming peers exchange events made of a JSON header line, an optional
//! JSON data block and an optional binary payload. This module carries the
//! pieces of the protocol the adapter needs:
//! - `event`: the generic [`Event`](event::Event) value exchanged on the wire.
//! - `codec`: [`EventCodec`](codec::EventCodec) framing for
//!   [`FramedRead`](tokio_util::codec::FramedRead) /
//!   [`FramedWrite`](tokio_util::codec::FramedWrite).
//! - `messages`: typed message schemas and inbound event classification.

pub mod codec;
pub mod event;
pub mod messages;

pub use codec::EventCodec;
pub use event::Event;
pub use messages::InboundEvent;

/// Protocol version stamped on every outbound header.
pub const PROTOCOL_VERSION: &str = "1.5.2";
