//! Transport that dispatches straight into a [`Host`] in the same process.

use std::collections::VecDeque;
use std::sync::Arc;

use super::Transport;
use crate::error::{Error, Result};
use crate::host::Host;

/// Talks to a host without any I/O. Handy for embedding and for tests.
pub struct InProcess {
    host: Arc<Host>,
    outbox: VecDeque<String>,
    closed: bool,
}

impl InProcess {
    pub fn new(host: Arc<Host>) -> Self {
        Self {
            host,
            outbox: VecDeque::new(),
            closed: false,
        }
    }
}

impl Transport for InProcess {
    async fn send(&mut self, frame: String) -> Result<()> {
        if self.closed {
            return Err(Error::ServerExited);
        }
        if let Some(response) = self.host.handle_frame(&frame) {
            self.outbox.push_back(response);
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<String> {
        // Every request is answered synchronously in `send`, so an empty
        // outbox means nothing will ever arrive.
        self.outbox.pop_front().ok_or(Error::ServerExited)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.outbox.clear();
        Ok(())
    }
}
