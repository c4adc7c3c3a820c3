//! HTTP server loop shared by the three services

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use crate::{Error, Result};

/// Bind `host:port` and serve `router` until Ctrl-C or SIGTERM
pub async fn serve(router: Router, service: &'static str, host: &str, port: u16) -> Result<()> {
    let addr = SocketAddr::new(
        host.parse()
            .map_err(|e| Error::Config(format!("Invalid host {host}: {e}")))?,
        port,
    );

    let listener = TcpListener::bind(addr).await?;
    info!(service, host = %host, port, "Listening");
    info!("  http://{}:{}/", display_host(host), port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

    info!(service, "Stopped");
    Ok(())
}

/// `0.0.0.0` is not something a browser can open
fn display_host(host: &str) -> &str {
    match host {
        "0.0.0.0" | "::" => "localhost",
        other => other,
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
