#![forbid(unsafe_code)]

//! Wyoming protocol adapter that hands transcripts to an external program.

pub mod capability;
pub mod config;
pub mod errors;
pub mod handler;
pub mod protocol;
pub mod runner;
pub mod transport;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
