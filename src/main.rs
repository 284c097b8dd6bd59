#![forbid(unsafe_code)]

//! `wyoming-handle-external`: Wyoming intent handler binary.
//!
//! Parses configuration, builds the capability descriptor, binds the
//! listener, and serves connections until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

use wyoming_handle_external::capability::CapabilityDescriptor;
use wyoming_handle_external::config::ConfigSource;
use wyoming_handle_external::handler::AppState;
use wyoming_handle_external::transport::Server;
use wyoming_handle_external::{AppError, GlobalConfig, Result};

/// How long shutdown waits for blocking I/O (such as a pending stdin read).
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "wyoming-handle-external",
    about = "Handle Wyoming transcripts with an external program",
    version,
    long_about = None
)]
struct Cli {
    /// Program to run with arguments.
    #[arg(long)]
    program: Option<String>,

    /// Supported language (repeat for more than one).
    #[arg(long = "language")]
    languages: Vec<String>,

    /// Name used in the Wyoming info message [default: external].
    #[arg(long)]
    info_name: Option<String>,

    /// Listener address: stdio://, unix://<path> or tcp://<host>:<port> [default: stdio://].
    #[arg(long)]
    uri: Option<String>,

    /// Log DEBUG messages.
    #[arg(long)]
    debug: bool,

    /// Optional TOML file with the same settings; command-line values win.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    fn overrides(&self) -> ConfigSource {
        ConfigSource {
            program: self.program.clone(),
            languages: self.languages.clone(),
            info_name: self.info_name.clone(),
            uri: self.uri.clone(),
            debug: self.debug,
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let config = load_config(&args);
    let debug = config.as_ref().map_or(args.debug, |config| config.debug);
    init_tracing(args.log_format, debug)?;

    let config = config.inspect_err(|err| error!(%err, "invalid configuration"))?;
    debug!(?config, "configuration loaded");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?;
    let result = runtime.block_on(run(config));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

fn load_config(args: &Cli) -> Result<GlobalConfig> {
    let file = match &args.config {
        Some(path) => ConfigSource::load_from_path(path)?,
        None => ConfigSource::default(),
    };
    GlobalConfig::from_source(file.merge(args.overrides()))
}

async fn run(config: GlobalConfig) -> Result<()> {
    let descriptor = CapabilityDescriptor::new(&config.info_name, &config.languages);
    let state = Arc::new(AppState::new(config.command.clone(), &descriptor)?);

    let server = Server::bind(&config.uri).await?;
    info!(uri = %server.uri(), program = %config.program, "Ready");

    let ct = CancellationToken::new();
    let mut server_handle = tokio::spawn(server.run(state, ct.clone()));

    let joined = tokio::select! {
        () = shutdown_signal() => {
            info!("shutdown signal received");
            ct.cancel();
            server_handle.await
        }
        joined = &mut server_handle => joined,
    };

    joined.map_err(|err| AppError::Transport(format!("server task failed: {err}")))??;
    info!("wyoming-handle-external shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                if let Err(err) = ctrl_c.await {
                    tracing::error!(%err, "ctrl-c signal handler failed");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat, debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // stderr keeps stdout free for protocol traffic on stdio://.
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
