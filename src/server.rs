use std::future::Future;
use std::io::ErrorKind;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::capture::CaptureError;
use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("hotkey error: {0}")]
    Capture(#[from] CaptureError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ServerError {
    /// Operator-facing guidance for the common startup failures.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ServerError::Bind { source, .. } => match source.kind() {
                ErrorKind::AddrInUse => {
                    Some("Another process is using this port. Stop it or choose another with --port.")
                }
                ErrorKind::PermissionDenied => {
                    Some("Binding this port needs elevated privileges. Use a port above 1024.")
                }
                ErrorKind::AddrNotAvailable => {
                    Some("The bind host is not an address of this machine. Check --host.")
                }
                _ => None,
            },
            ServerError::Config(_) => {
                Some("Check the file passed with --config (or YTCONTROL_CONFIG).")
            }
            ServerError::Capture(_) => Some(
                "Global hotkeys need an X11 session on Linux, Accessibility access on macOS, \
                 or administrator rights in some Windows setups.",
            ),
            _ => None,
        }
    }
}

/// Bind the HTTP listener.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, ServerError> {
    TcpListener::bind((host, port))
        .await
        .map_err(|source| ServerError::Bind {
            addr: format!("{host}:{port}"),
            source,
        })
}

/// Serve `app` until `signal` resolves. New connections stop being accepted
/// as soon as it does.
pub async fn serve<F>(listener: TcpListener, app: Router, signal: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await
        .map_err(ServerError::Serve)
}
