//! Listener binding and connection accept loop.
//!
//! [`Server::bind`] binds eagerly so that address problems surface before
//! the service reports ready. [`Server::run`] then accepts connections until
//! the cancellation token fires, spawning one [`ConnectionHandler`] task per
//! connection. Connections share nothing but the read-only [`AppState`].
//!
//! Unix sockets are served through the `interprocess` local-socket API with
//! a filesystem name; a stale socket file left by a previous run is removed
//! before binding and the file is removed again on shutdown.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use interprocess::local_socket::tokio::{prelude::*, Listener as LocalListener};
use interprocess::local_socket::{GenericFilePath, ListenerOptions};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::handler::{AppState, ConnectionHandler};
use crate::transport::ServerUri;
use crate::{AppError, Result};

/// Pause after a failed accept before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(150);

enum Listener {
    Stdio,
    Tcp(TcpListener),
    Unix {
        listener: LocalListener,
        path: PathBuf,
    },
}

/// A bound listener for one [`ServerUri`].
pub struct Server {
    uri: ServerUri,
    listener: Listener,
}

impl Server {
    /// Bind the listener for `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if the address cannot be bound.
    pub async fn bind(uri: &ServerUri) -> Result<Self> {
        let listener = match uri {
            ServerUri::Stdio => Listener::Stdio,
            ServerUri::Tcp { host, port } => {
                let listener = TcpListener::bind((host.as_str(), *port))
                    .await
                    .map_err(|err| AppError::Transport(format!("failed to bind {uri}: {err}")))?;
                Listener::Tcp(listener)
            }
            ServerUri::Unix { path } => Listener::Unix {
                listener: bind_unix(path)?,
                path: path.clone(),
            },
        };

        info!(%uri, "listener bound");
        Ok(Self {
            uri: uri.clone(),
            listener,
        })
    }

    /// Address the listener is bound to, for TCP bindings.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.listener {
            Listener::Tcp(listener) => listener.local_addr().ok(),
            Listener::Stdio | Listener::Unix { .. } => None,
        }
    }

    /// The address this server was bound for.
    #[must_use]
    pub fn uri(&self) -> &ServerUri {
        &self.uri
    }

    /// Serve connections until `ct` is cancelled.
    ///
    /// The stdio binding serves its single connection and returns as soon as
    /// that connection ends.
    ///
    /// # Errors
    ///
    /// Currently infallible once bound; accept failures are logged and
    /// retried.
    pub async fn run(self, state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
        let span = info_span!("server", uri = %self.uri);
        async move {
            match self.listener {
                Listener::Stdio => {
                    let handler = ConnectionHandler::new(state);
                    tokio::select! {
                        () = ct.cancelled() => info!("stdio server shutting down"),
                        () = handler.run(tokio::io::stdin(), tokio::io::stdout()) => {
                            debug!("stdio connection finished");
                        }
                    }
                }
                Listener::Tcp(listener) => loop {
                    tokio::select! {
                        () = ct.cancelled() => {
                            info!("tcp server shutting down");
                            break;
                        }
                        accepted = listener.accept() => match accepted {
                            Ok((stream, peer)) => {
                                debug!(%peer, "accepted tcp connection");
                                let (reader, writer) = stream.into_split();
                                spawn_connection(&state, reader, writer);
                            }
                            Err(err) => {
                                warn!(%err, "tcp accept failed");
                                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                            }
                        }
                    }
                },
                Listener::Unix { listener, path } => {
                    loop {
                        tokio::select! {
                            () = ct.cancelled() => {
                                info!("unix server shutting down");
                                break;
                            }
                            accepted = listener.accept() => match accepted {
                                Ok(stream) => {
                                    debug!("accepted unix connection");
                                    let (reader, writer) = stream.split();
                                    spawn_connection(&state, reader, writer);
                                }
                                Err(err) => {
                                    warn!(%err, "unix accept failed");
                                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                                }
                            }
                        }
                    }
                    drop(listener);
                    cleanup_unix_socket(&path);
                }
            }
            Ok(())
        }
        .instrument(span)
        .await
    }
}

fn spawn_connection<R, W>(state: &Arc<AppState>, reader: R, writer: W)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let handler = ConnectionHandler::new(Arc::clone(state));
    tokio::spawn(handler.run(reader, writer).in_current_span());
}

fn bind_unix(path: &Path) -> Result<LocalListener> {
    remove_stale_socket(path)?;

    let name = path
        .to_fs_name::<GenericFilePath>()
        .map_err(|err| AppError::Transport(format!("invalid unix socket path '{}': {err}", path.display())))?;

    ListenerOptions::new()
        .name(name)
        .create_tokio()
        .map_err(|err| AppError::Transport(format!("failed to bind unix://{}: {err}", path.display())))
}

#[cfg(unix)]
fn remove_stale_socket(path: &Path) -> Result<()> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_socket() => {
            debug!(path = %path.display(), "removing stale unix socket");
            std::fs::remove_file(path).map_err(|err| {
                AppError::Transport(format!("failed to remove stale socket '{}': {err}", path.display()))
            })
        }
        Ok(_) => Err(AppError::Transport(format!(
            "refusing to replace non-socket file '{}'",
            path.display()
        ))),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(AppError::Transport(format!(
            "failed to inspect socket path '{}': {err}",
            path.display()
        ))),
    }
}

#[cfg(not(unix))]
fn remove_stale_socket(_path: &Path) -> Result<()> {
    Ok(())
}

fn cleanup_unix_socket(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed unix socket"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), %err, "failed to remove unix socket"),
    }
}
