use std::net::SocketAddr;

use clap::{Parser, ValueEnum};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum Error {
    #[error(transparent)]
    Mcp(#[from] mcp::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    /// Newline-delimited JSON-RPC on stdin/stdout
    #[value(alias = "local-pipe")]
    Stdio,
    /// HTTP with server-sent events
    #[value(alias = "network-stream")]
    Sse,
}

#[derive(Parser)]
#[command(name = "calculator")]
#[command(about = "MCP tool host exposing integer add and multiply", long_about = None)]
#[command(version)]
struct Cli {
    /// How clients reach the host
    #[arg(long, value_enum, default_value = "stdio")]
    transport: TransportKind,

    /// Listen address for the SSE transport
    #[arg(long, default_value = "0.0.0.0:8050")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() {
    // Stdout belongs to the protocol when serving over stdio.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let host = calculator::host()?;

    match cli.transport {
        TransportKind::Stdio => mcp::serve_stdio(host).await?,
        TransportKind::Sse => {
            let listener = tokio::net::TcpListener::bind(cli.bind)
                .await
                .map_err(|source| Error::Bind {
                    addr: cli.bind,
                    source,
                })?;
            mcp::serve_sse(host, listener).await?;
        }
    }
    Ok(())
}
