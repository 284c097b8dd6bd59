//! Per-connection event dispatch.
//!
//! A [`ConnectionHandler`] reads events from one client and answers them:
//! - `describe` → the shared capability descriptor; the loop continues.
//! - `transcript` → the configured program runs with the transcript text on
//!   stdin, and exactly one `handled` or `not-handled` event is written.
//!   The loop then ends and the connection closes.
//! - anything else → logged at `DEBUG`; the loop continues.
//!
//! Events on one connection are processed strictly in order. While the
//! program runs, the handler does not read further events. If the client
//! disconnects meanwhile, the program still runs to completion and the
//! failed response write is logged.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info_span, warn, Instrument};

use crate::capability::CapabilityDescriptor;
use crate::protocol::messages::{Handled, NotHandled, Response, Transcript};
use crate::protocol::{Event, EventCodec, InboundEvent};
use crate::runner::run_command;
use crate::Result;

/// Read-only state shared by every connection.
#[derive(Debug)]
pub struct AppState {
    /// Tokenized program and arguments.
    pub command: Vec<String>,
    /// Pre-encoded `info` event answering `describe`.
    pub info_event: Event,
}

impl AppState {
    /// Build shared state from the tokenized command and the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`](crate::AppError::Protocol) if the
    /// descriptor cannot be encoded.
    pub fn new(command: Vec<String>, descriptor: &CapabilityDescriptor) -> Result<Self> {
        Ok(Self {
            command,
            info_event: descriptor.to_event()?,
        })
    }
}

/// What the dispatch loop does after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Event loop for one accepted connection.
#[derive(Debug)]
pub struct ConnectionHandler {
    client_id: String,
    command: Vec<String>,
    state: Arc<AppState>,
}

impl ConnectionHandler {
    /// Create a handler with a fresh client identity.
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            client_id: uuid::Uuid::new_v4().to_string(),
            command: state.command.clone(),
            state,
        }
    }

    /// Opaque identity of this connection, used in log records.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Serve the connection until it closes or a transcript is answered.
    pub async fn run<R, W>(self, reader: R, writer: W)
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let span = info_span!("connection", client_id = %self.client_id);
        async move {
            let mut events = FramedRead::new(reader, EventCodec::new());
            let mut sink = FramedWrite::new(writer, EventCodec::new());
            debug!("client connected");

            while let Some(next) = events.next().await {
                let event = match next {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(%err, "failed to read event");
                        break;
                    }
                };

                match self.handle_event(&event, &mut sink).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Stop) => break,
                    Err(err) => {
                        warn!(%err, "failed to write event");
                        break;
                    }
                }
            }

            debug!("client disconnected");
        }
        .instrument(span)
        .await;
    }

    async fn handle_event<W>(
        &self,
        event: &Event,
        sink: &mut FramedWrite<W, EventCodec>,
    ) -> Result<Flow>
    where
        W: AsyncWrite + Unpin,
    {
        match InboundEvent::classify(event) {
            InboundEvent::Describe => {
                sink.send(self.state.info_event.clone()).await?;
                debug!("sent info to client");
                Ok(Flow::Continue)
            }
            InboundEvent::Transcript(transcript) => {
                let response = resolve_transcript(&self.command, &transcript).await;
                debug!(
                    handled = matches!(response, Response::Handled(_)),
                    text = %response.text(),
                    "sending response"
                );
                sink.send(response.to_event()?).await?;
                Ok(Flow::Stop)
            }
            InboundEvent::Other { event_type } => {
                debug!(%event_type, data = ?event.data, "unexpected event");
                Ok(Flow::Continue)
            }
        }
    }
}

/// Run `command` on a transcript and map the outcome to a response.
///
/// - exit code 0 → [`Response::Handled`] with stdout as text.
/// - any other exit → [`Response::NotHandled`] with stdout as text; stderr is
///   logged at `ERROR` and never returned.
/// - launch or pipe failure → [`Response::NotHandled`] with empty text.
pub async fn resolve_transcript(command: &[String], transcript: &Transcript) -> Response {
    debug!(?command, "running program");
    match run_command(command, transcript.text()).await {
        Ok(output) => {
            let text = output.stdout_text();
            debug!(output = %text, "program finished");
            if output.success() {
                Response::Handled(Handled { text })
            } else {
                error!(
                    exit_code = ?output.exit_code,
                    stderr = %output.stderr_text(),
                    "program did not handle transcript"
                );
                Response::NotHandled(NotHandled { text })
            }
        }
        Err(err) => {
            error!(%err, "failed to run program");
            Response::NotHandled(NotHandled::default())
        }
    }
}
