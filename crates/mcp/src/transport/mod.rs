//! Client-side transports.
//!
//! A transport moves serialized JSON-RPC frames between the client
//! [`Session`](crate::Session) and one server. Framing and connection
//! lifecycle belong to the transport; message semantics belong to the session.

mod in_process;
mod sse;
mod stdio;

pub use in_process::InProcess;
pub use sse::{SseEvent, SseParser, SseTransport};
pub use stdio::ChildProcess;

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// A bidirectional channel to one MCP server.
pub trait Transport: Send {
    /// Send one serialized message.
    fn send(&mut self, frame: String) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the next serialized message from the server.
    fn receive(&mut self) -> impl Future<Output = Result<String>> + Send;

    /// Release the underlying channel.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Where a server lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Launch a local executable and talk over its stdin/stdout.
    Command { program: String, args: Vec<String> },
    /// Connect to a running server's SSE endpoint.
    Sse { url: String },
}

impl FromStr for Locator {
    type Err = Error;

    /// Parse a locator.
    ///
    /// `http(s)://` URLs select SSE (`/sse` is appended unless present).
    /// Anything else is a command line: scripts ending in `.py` run under
    /// `python` and `.js` under `node`; other paths run directly.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::UnsupportedLocator("empty locator".to_string()));
        }

        if s.starts_with("http://") || s.starts_with("https://") {
            let base = s.trim_end_matches('/');
            let url = if base.ends_with("/sse") {
                base.to_string()
            } else {
                format!("{base}/sse")
            };
            return Ok(Self::Sse { url });
        }

        if let Some((scheme, _)) = s.split_once("://") {
            return Err(Error::UnsupportedLocator(format!(
                "unsupported scheme `{scheme}` in {s}"
            )));
        }

        let mut words = s.split_whitespace().map(str::to_string);
        let path = words.next().unwrap_or_default();
        let rest: Vec<String> = words.collect();

        let interpreter = if path.ends_with(".py") {
            Some("python")
        } else if path.ends_with(".js") {
            Some("node")
        } else {
            None
        };

        Ok(match interpreter {
            Some(interpreter) => Self::Command {
                program: interpreter.to_string(),
                args: std::iter::once(path).chain(rest).collect(),
            },
            None => Self::Command {
                program: path,
                args: rest,
            },
        })
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Command { program, args } if args.is_empty() => write!(f, "{program}"),
            Self::Command { program, args } => write!(f, "{program} {}", args.join(" ")),
            Self::Sse { url } => write!(f, "{url}"),
        }
    }
}

/// Any of the network-facing transports, chosen at runtime from a [`Locator`].
pub enum AnyTransport {
    Stdio(ChildProcess),
    Sse(SseTransport),
}

/// Open a transport to the server at `locator`.
///
/// `timeout` bounds how long an SSE server may take to announce its message
/// endpoint.
pub async fn connect(locator: &Locator, timeout: Duration) -> Result<AnyTransport> {
    match locator {
        Locator::Command { program, args } => {
            ChildProcess::spawn(program, args).map(AnyTransport::Stdio)
        }
        Locator::Sse { url } => SseTransport::connect(url, timeout)
            .await
            .map(AnyTransport::Sse),
    }
}

impl Transport for AnyTransport {
    async fn send(&mut self, frame: String) -> Result<()> {
        match self {
            Self::Stdio(t) => t.send(frame).await,
            Self::Sse(t) => t.send(frame).await,
        }
    }

    async fn receive(&mut self) -> Result<String> {
        match self {
            Self::Stdio(t) => t.receive().await,
            Self::Sse(t) => t.receive().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Stdio(t) => t.close().await,
            Self::Sse(t) => t.close().await,
        }
    }
}
