//! Stdio transport.
//!
//! Reads JSON-RPC messages from stdin and writes responses to stdout,
//! the standard mode for CLI-based MCP integrations.

use crate::error::{DbError, DbResult};
use crate::mcp::SqlService;
use crate::tools::ServerState;
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use tokio::signal;
use tracing::info;

/// Serve the MCP service over stdio until the client disconnects or a
/// shutdown signal arrives.
pub async fn run_stdio(state: Arc<ServerState>) -> DbResult<()> {
    info!("starting MCP server on stdio");

    let service = SqlService::new(state.clone());
    let running_service = service
        .serve(stdio())
        .await
        .map_err(|e| DbError::internal(format!("failed to start stdio transport: {e}")))?;

    let shutdown_requested = tokio::select! {
        result = running_service.waiting() => {
            match result {
                Ok(_quit_reason) => info!("stdio transport completed"),
                Err(e) => {
                    tracing::warn!(error = %e, "stdio transport error");
                    return Err(DbError::internal(format!("stdio transport error: {e}")));
                }
            }
            false
        }
        _ = wait_for_signal() => {
            info!("shutdown signal received (send again to force exit)");
            true
        }
    };

    if shutdown_requested {
        tokio::spawn(async {
            wait_for_signal().await;
            tracing::warn!("second signal received, forcing immediate exit");
            std::process::exit(1);
        });
    }

    info!("closing connection pool");
    state.pool.close().await;

    if shutdown_requested {
        // tokio::select! cannot interrupt a blocking stdin read, so the
        // process exits explicitly once the pool is closed.
        info!("exiting");
        std::process::exit(0);
    }

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
