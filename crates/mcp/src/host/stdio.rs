//! Newline-delimited JSON-RPC over a pair of byte streams.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use super::Host;
use crate::error::Result;

/// Serve `host` until `input` reaches end of stream.
///
/// Each input line is one request; each reply is written as one line and
/// flushed immediately. Blank lines are ignored.
pub async fn serve<R, W>(host: &Host, input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!(frame = %line, "received");

        if let Some(reply) = host.handle_frame(line) {
            output.write_all(reply.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
    }
    Ok(())
}

/// Serve `host` on the process's stdin and stdout.
///
/// Stdout carries protocol frames only; logs must go to stderr.
pub async fn serve_stdio(host: Arc<Host>) -> Result<()> {
    info!(host = %host.name(), "serving over stdio");
    serve(&host, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
    info!("stdin closed, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ToolRegistry, TypedTool};
    use serde_json::Value;

    #[derive(serde::Deserialize, schemars::JsonSchema)]
    struct Pair {
        a: i64,
        b: i64,
    }

    #[tokio::test]
    async fn answers_each_request_line() {
        let registry = ToolRegistry::builder()
            .register(TypedTool::new("multiply", "Multiply two numbers together", |p: Pair| {
                Ok::<_, String>(p.a * p.b)
            }))
            .unwrap()
            .build();
        let host = Host::new("Calculator", registry);

        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"multiply","arguments":{"a":8,"b":8}}}"#,
            "\n",
        );
        let mut output = Vec::new();
        serve(&host, input.as_bytes(), &mut output).await.unwrap();

        let replies: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["id"], 1);
        assert_eq!(replies[1]["result"]["structuredContent"]["result"], 64);
    }
}
