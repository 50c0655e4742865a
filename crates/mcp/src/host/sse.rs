//! HTTP + server-sent events front end for a [`Host`].
//!
//! `GET /sse` opens a session: the first event is `endpoint`, naming the URL
//! to post requests to. Replies to those posts are streamed back on the same
//! event stream as `message` events.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::Host;
use crate::error::Result;

type Sessions = Arc<Mutex<HashMap<Uuid, mpsc::Sender<String>>>>;

#[derive(Clone)]
struct SseState {
    host: Arc<Host>,
    sessions: Sessions,
}

/// Router exposing `GET /sse` and `POST /messages/`.
pub fn router(host: Arc<Host>) -> Router {
    let state = SseState {
        host,
        sessions: Arc::default(),
    };
    Router::new()
        .route("/sse", get(open_stream))
        .route("/messages/", post(post_message))
        .with_state(state)
}

/// Serve `host` on an already-bound listener until the server stops.
pub async fn serve_sse(host: Arc<Host>, listener: TcpListener) -> Result<()> {
    info!(host = %host.name(), addr = ?listener.local_addr().ok(), "serving over SSE");
    axum::serve(listener, router(host)).await?;
    Ok(())
}

/// Removes the session when the client drops its event stream.
struct SessionGuard {
    id: Uuid,
    sessions: Sessions,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(&self.id);
        }
        debug!(session = %self.id, "SSE session closed");
    }
}

async fn open_stream(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel::<String>(32);
    if let Ok(mut sessions) = state.sessions.lock() {
        sessions.insert(id, tx);
    }
    info!(session = %id, "SSE session opened");

    let guard = SessionGuard {
        id,
        sessions: state.sessions.clone(),
    };
    let endpoint = futures::stream::once(async move {
        Ok(Event::default()
            .event("endpoint")
            .data(format!("/messages/?session_id={id}")))
    });
    let messages = ReceiverStream::new(rx).map(move |frame| {
        let _ = &guard;
        Ok(Event::default().event("message").data(frame))
    });

    Sse::new(endpoint.chain(messages)).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[derive(Deserialize)]
struct SessionQuery {
    session_id: Uuid,
}

async fn post_message(
    State(state): State<SseState>,
    Query(query): Query<SessionQuery>,
    body: String,
) -> StatusCode {
    let sender = match state.sessions.lock() {
        Ok(sessions) => sessions.get(&query.session_id).cloned(),
        Err(_) => None,
    };
    let Some(sender) = sender else {
        warn!(session = %query.session_id, "message for unknown session");
        return StatusCode::NOT_FOUND;
    };

    if serde_json::from_str::<serde_json::Value>(&body).is_err() {
        return StatusCode::BAD_REQUEST;
    }

    if let Some(reply) = state.host.handle_frame(&body) {
        if sender.send(reply).await.is_err() {
            return StatusCode::NOT_FOUND;
        }
    }
    StatusCode::ACCEPTED
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ToolRegistry, TypedTool};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[derive(serde::Deserialize, schemars::JsonSchema)]
    struct Pair {
        a: i64,
        b: i64,
    }

    fn host() -> Arc<Host> {
        let registry = ToolRegistry::builder()
            .register(TypedTool::new("add", "Add two numbers together", |p: Pair| {
                Ok::<_, String>(p.a + p.b)
            }))
            .unwrap()
            .build();
        Arc::new(Host::new("Calculator", registry))
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let uri = format!("/messages/?session_id={}", Uuid::new_v4());
        let resp = router(host())
            .oneshot(post(&uri, r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_session_id_is_rejected() {
        let resp = router(host())
            .oneshot(post("/messages/?session_id=nope", "{}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stream_announces_endpoint_then_replies() {
        let app = router(host());

        let resp = app
            .clone()
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let mut body = resp.into_body();

        let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
        let first = String::from_utf8(first.to_vec()).unwrap();
        assert!(first.starts_with("event: endpoint\n"));
        let path = first
            .lines()
            .find_map(|l| l.strip_prefix("data: "))
            .unwrap()
            .to_string();

        let bad = app.clone().oneshot(post(&path, "{oops")).await.unwrap();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let accepted = app
            .clone()
            .oneshot(post(
                &path,
                r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"add","arguments":{"a":5,"b":3}}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(accepted.status(), StatusCode::ACCEPTED);

        let next = body.frame().await.unwrap().unwrap().into_data().unwrap();
        let next = String::from_utf8(next.to_vec()).unwrap();
        assert!(next.starts_with("event: message\n"));
        let data = next.lines().find_map(|l| l.strip_prefix("data: ")).unwrap();
        let reply: serde_json::Value = serde_json::from_str(data).unwrap();
        assert_eq!(reply["id"], 7);
        assert_eq!(reply["result"]["structuredContent"]["result"], 8);
    }
}
