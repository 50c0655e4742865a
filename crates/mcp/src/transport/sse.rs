//! SSE client transport.
//!
//! The server keeps one long-lived `GET` event stream open. Its first event,
//! `endpoint`, names the URL to `POST` messages to; responses come back as
//! `message` events on the stream.

use std::time::Duration;

use futures::StreamExt;
use reqwest::Url;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::Transport;
use crate::error::{Error, Result};

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, `"message"` when absent.
    pub event: String,
    pub data: String,
}

/// Incremental parser for a `text/event-stream` body.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the body, returning every event it completes.
    ///
    /// Lines are decoded only once complete, so a character split across
    /// chunks survives intact.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let decoded = String::from_utf8_lossy(&raw);
            let line = decoded.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }

        events
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

/// A server reached over HTTP with server-sent events.
pub struct SseTransport {
    http: reqwest::Client,
    endpoint: Url,
    inbox: mpsc::Receiver<Result<SseEvent>>,
    reader: JoinHandle<()>,
}

impl SseTransport {
    /// Open the event stream at `url` and wait for the message endpoint.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let stream_url = Url::parse(url).map_err(|e| Error::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let http = reqwest::Client::new();
        let response = tokio::time::timeout(
            timeout,
            http.get(stream_url.clone())
                .header(ACCEPT, "text/event-stream")
                .send(),
        )
        .await
        .map_err(|_| Error::Timeout(timeout))?
        .map_err(|e| Error::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(Error::Connect {
                url: url.to_string(),
                reason: format!("event stream returned {}", response.status()),
            });
        }

        let (tx, mut inbox) = mpsc::channel(32);
        let reader = tokio::spawn(read_events(response, tx));

        // From here on `reader` must be aborted on every error path.
        let announced = match tokio::time::timeout(timeout, inbox.recv()).await {
            Ok(Some(Ok(event))) if event.event == "endpoint" => Ok(event.data),
            Ok(Some(Ok(event))) => Err(Error::InvalidResponse(format!(
                "expected endpoint event, got `{}`",
                event.event
            ))),
            Ok(Some(Err(e))) => Err(e),
            Ok(None) => Err(Error::ServerExited),
            Err(_) => Err(Error::Timeout(timeout)),
        };
        let endpoint = announced.and_then(|path| {
            stream_url
                .join(&path)
                .map_err(|e| Error::InvalidResponse(format!("bad endpoint `{path}`: {e}")))
        });

        match endpoint {
            Ok(endpoint) => {
                debug!(%endpoint, "SSE session established");
                Ok(Self {
                    http,
                    endpoint,
                    inbox,
                    reader,
                })
            }
            Err(e) => {
                reader.abort();
                Err(e)
            }
        }
    }

    /// URL that messages are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

async fn read_events(response: reqwest::Response, tx: mpsc::Sender<Result<SseEvent>>) {
    let mut body = response.bytes_stream();
    let mut parser = SseParser::new();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.send(Err(Error::Http(e))).await;
                return;
            }
        };
        for event in parser.feed(&chunk) {
            if tx.send(Ok(event)).await.is_err() {
                return;
            }
        }
    }
}

impl Transport for SseTransport {
    async fn send(&mut self, frame: String) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(frame)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Connect {
                url: self.endpoint.to_string(),
                reason: format!("{status}: {body}"),
            });
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<String> {
        loop {
            match self.inbox.recv().await {
                Some(Ok(event)) if event.event == "message" => return Ok(event.data),
                Some(Ok(event)) => warn!(event = %event.event, "ignoring unexpected SSE event"),
                Some(Err(e)) => return Err(e),
                None => return Err(Error::ServerExited),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.reader.abort();
        self.inbox.close();
        Ok(())
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
