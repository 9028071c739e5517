//! SQL MCP Server entry point.

use clap::Parser;
use sql_mcp_server::config::{Config, DEFAULT_QUERY_TIMEOUT_SECS};
use sql_mcp_server::db::{DbPool, Executor};
use sql_mcp_server::sql::Guardrails;
use sql_mcp_server::tools::ServerState;
use sql_mcp_server::transport::run_stdio;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr: stdout carries the MCP protocol stream.
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_tracing(&config);

    let allowlist = config.allowlist();
    if allowlist.is_empty() {
        eprintln!("Error: at least one database must be configured.");
        eprintln!();
        eprintln!("Usage: sql-mcp-server --databases <name>[,<name>...]");
        eprintln!("       DB_NAME=app,analytics sql-mcp-server");
        std::process::exit(1);
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        db_type = %config.db_type,
        databases = %allowlist.join(","),
        read_only = config.read_only,
        raw_query = config.allow_raw_query,
        "starting SQL MCP server"
    );

    let pool = DbPool::connect_lazy(&config)?;
    if let Err(e) = pool.ping().await {
        // Lazy pool: stay up and let individual requests surface the error,
        // in case the database comes back later.
        warn!(error = %e, "initial connectivity check failed");
    }

    let state = Arc::new(ServerState {
        pool,
        executor: Executor::new(DEFAULT_QUERY_TIMEOUT_SECS),
        guardrails: Guardrails::new(config.guardrail_config(), allowlist),
    });

    if let Err(e) = run_stdio(state).await {
        error!(error = %e, "server error");
        return Err(e.into());
    }

    info!("server shutdown complete");
    Ok(())
}
