//! Listener address parsing.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::AppError;

/// Address the server listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerUri {
    /// The process's own stdin/stdout; serves a single connection.
    Stdio,
    /// Unix domain socket at `path`.
    Unix {
        /// Socket file path.
        path: PathBuf,
    },
    /// TCP socket on `host:port`.
    Tcp {
        /// Host name or IP address.
        host: String,
        /// Port number; 0 lets the OS pick one.
        port: u16,
    },
}

impl ServerUri {
    /// Whether the binding can accept more than one connection.
    #[must_use]
    pub fn is_multi_connection(&self) -> bool {
        !matches!(self, Self::Stdio)
    }
}

impl fmt::Display for ServerUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio://"),
            Self::Unix { path } => write!(f, "unix://{}", path.display()),
            Self::Tcp { host, port } if host.contains(':') => write!(f, "tcp://[{host}]:{port}"),
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
        }
    }
}

impl FromStr for ServerUri {
    type Err = AppError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = input.strip_prefix("stdio://") {
            if !rest.is_empty() {
                return Err(AppError::Config(format!("unexpected stdio address in '{input}'")));
            }
            return Ok(Self::Stdio);
        }

        if let Some(path) = input.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(AppError::Config(format!("missing unix socket path in '{input}'")));
            }
            return Ok(Self::Unix {
                path: PathBuf::from(path),
            });
        }

        if let Some(authority) = input.strip_prefix("tcp://") {
            let authority = authority.trim_end_matches('/');
            let (host, port) = authority
                .rsplit_once(':')
                .ok_or_else(|| AppError::Config(format!("missing tcp port in '{input}'")))?;
            let host = host
                .strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .unwrap_or(host);
            if host.is_empty() {
                return Err(AppError::Config(format!("missing tcp host in '{input}'")));
            }
            let port = port
                .parse::<u16>()
                .map_err(|err| AppError::Config(format!("invalid tcp port in '{input}': {err}")))?;
            return Ok(Self::Tcp {
                host: host.to_owned(),
                port,
            });
        }

        Err(AppError::Config(format!(
            "unsupported uri '{input}': expected stdio://, unix://<path> or tcp://<host>:<port>"
        )))
    }
}
