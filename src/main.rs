//! ytcontrol - desktop hotkeys for browser video players
//!
//! Watches a fixed set of global key combinations and relays the matching
//! playback action (`toggle_play_pause`, `next_video`, ...) to every browser
//! user script connected over Socket.IO.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser as ClapParser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ytcontrol::{
    api,
    capture::HotkeyCapture,
    config::{Overrides, Settings},
    hub::ConnectionHub,
    relay::CommandRelay,
    server::{self, ServerError},
    shutdown::ShutdownCoordinator,
};

/// Environment variable holding the secret key.
const SECRET_KEY_ENV: &str = "YTCONTROL_SECRET_KEY";

/// Grace period for open sockets to flush their close frames.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// ytcontrol - relay global hotkeys to browser video players
#[derive(ClapParser, Debug)]
#[command(name = "ytcontrol", version, about, long_about = None)]
struct Cli {
    /// Host to bind the HTTP/Socket.IO server [default: 127.0.0.1]
    #[arg(long, env = "YTCONTROL_HOST")]
    host: Option<String>,

    /// Port to bind the HTTP/Socket.IO server [default: 8000]
    #[arg(long, env = "YTCONTROL_PORT")]
    port: Option<u16>,

    /// TOML file with `[server]` and `[[hotkeys]]` sections
    #[arg(long, env = "YTCONTROL_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            if let Some(hint) = e.hint() {
                tracing::error!("{hint}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "ytcontrol=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(cli: Cli) -> Result<(), ServerError> {
    let settings = Settings::resolve(Overrides {
        host: cli.host,
        port: cli.port,
        config: cli.config,
        secret_key: std::env::var(SECRET_KEY_ENV).ok(),
    })?;
    if settings.uses_default_secret() {
        tracing::warn!("{SECRET_KEY_ENV} is not set, using the insecure default key");
    }

    let hub = ConnectionHub::new();
    let (relay, dispatcher) = CommandRelay::spawn(settings.actions.clone(), hub.clone());

    // No keyboard hook is installed if the port is taken.
    let listener = server::bind(&settings.host, settings.port).await?;

    let mut hotkeys = HotkeyCapture::new();
    hotkeys.register_all(settings.actions.combos())?;
    let capture = hotkeys.start(move |combo| {
        relay.relay(combo);
    })?;

    let port = listener
        .local_addr()
        .map(|addr| addr.port())
        .unwrap_or(settings.port);
    let settings = Arc::new(settings.with_port(port));
    log_startup_summary(&settings);

    let shutdown = ShutdownCoordinator::new();
    let state = api::AppState::new(hub, shutdown.clone(), settings);
    let app = api::router(state);

    let (server_shutdown_tx, server_shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let mut http_handle = tokio::spawn(server::serve(listener, app, async {
        server_shutdown_rx.await.ok();
    }));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received Ctrl+C");
        }
        result = &mut http_handle => {
            capture.stop();
            dispatcher.abort();
            return result?;
        }
    }

    // Stop accepting and tell open sockets to close
    let _ = server_shutdown_tx.send(());
    shutdown.shutdown();

    capture.stop();

    match tokio::time::timeout(DRAIN_TIMEOUT, &mut http_handle).await {
        Ok(Ok(Err(e))) => tracing::warn!(error = %e, "HTTP server stopped with an error"),
        Ok(Err(e)) => tracing::warn!(?e, "HTTP server task panicked"),
        Ok(Ok(Ok(()))) => {}
        Err(_) => {
            tracing::debug!(open = shutdown.active_count(), "sockets still open at exit");
            http_handle.abort();
        }
    }
    dispatcher.abort();

    tracing::info!("server and hotkey listener stopped");
    Ok(())
}

fn log_startup_summary(settings: &Settings) {
    for line in settings.startup_summary() {
        tracing::info!("{line}");
    }
}
