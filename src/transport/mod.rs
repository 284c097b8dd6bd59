//! Transport bindings for accepting Wyoming client connections.
//!
//! - `uri`: [`ServerUri`] parsing for `stdio://`, `unix://<path>` and
//!   `tcp://<host>:<port>`.
//! - `server`: [`Server`] binding and the per-connection accept loop.

pub mod server;
pub mod uri;

pub use server::Server;
pub use uri::ServerUri;
