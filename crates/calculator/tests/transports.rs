//! The calculator reached through real transports.

use std::time::Duration;

use mcp::{Error, Locator, Session};
use serde_json::{Value, json};

fn args(value: Value) -> Option<serde_json::Map<String, Value>> {
    value.as_object().cloned()
}

async fn exercise<T: mcp::Transport>(session: &Session<T>) {
    assert_eq!(session.server_info().server_info.name, "Calculator");

    let first = session.list_tools().await.unwrap();
    let second = session.list_tools().await.unwrap();
    assert_eq!(first, second);
    let names: Vec<_> = first.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["add", "multiply"]);

    let sum = session.call_tool("add", args(json!({"a": 5, "b": 3}))).await.unwrap();
    assert_eq!(sum.output(), json!(8));
    let product = session
        .call_tool("multiply", args(json!({"a": 8, "b": 8})))
        .await
        .unwrap();
    assert_eq!(product.output(), json!(64));

    let missing = session.call_tool("divide", args(json!({"a": 1, "b": 1}))).await;
    assert!(matches!(missing, Err(Error::ToolNotFound(_))));

    let bad = session.call_tool("add", args(json!({"a": "five", "b": 3}))).await;
    assert!(matches!(bad, Err(Error::InvalidArguments(_))));

    let overflow = session
        .call_tool("multiply", args(json!({"a": i64::MAX, "b": 2})))
        .await;
    assert!(matches!(overflow, Err(Error::ToolCallFailed(_))));
}

#[tokio::test]
async fn serves_over_sse() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(mcp::serve_sse(calculator::host().unwrap(), listener));

    let locator: Locator = format!("http://{addr}").parse().unwrap();
    let transport = mcp::connect(&locator, Duration::from_secs(5)).await.unwrap();
    let session = Session::connect(transport).await.unwrap();

    exercise(&session).await;

    session.close().await.unwrap();
    server.abort();
}

#[tokio::test]
async fn serves_over_stdio() {
    let locator = Locator::Command {
        program: env!("CARGO_BIN_EXE_calculator").to_string(),
        args: vec!["--transport".into(), "local-pipe".into()],
    };
    let transport = mcp::connect(&locator, Duration::from_secs(5)).await.unwrap();
    let session = Session::connect(transport).await.unwrap();

    exercise(&session).await;

    session.close().await.unwrap();
}
