/*!
Standard input for a program running in the JVM runtime.

The guest (the runtime's `System.in`) asks for a line; the host (whatever
owns the input box) sees the request and answers it. Lines submitted before
they're asked for are queued. A read gives up after its timeout, or as soon
as the host cancels.
*/
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("no input within {0:?}")]
    TimedOut(Duration),

    #[error("input cancelled")]
    Cancelled,

    #[error("input channel closed")]
    Closed,
}

pub struct StdinHost {
    lines: mpsc::UnboundedSender<String>,
    requests: mpsc::UnboundedReceiver<()>,
    cancel: watch::Sender<bool>,
}

pub struct StdinGuest {
    lines: mpsc::UnboundedReceiver<String>,
    requests: mpsc::UnboundedSender<()>,
    cancel: watch::Receiver<bool>,
}

pub fn channel() -> (StdinHost, StdinGuest) {
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = watch::channel(false);

    (
        StdinHost { lines: line_tx, requests: req_rx, cancel: cancel_tx },
        StdinGuest { lines: line_rx, requests: req_tx, cancel: cancel_rx },
    )
}

impl StdinHost {
    /// Queue `line` (a newline is appended) for the guest.
    pub fn submit(&self, line: &str) -> Result<(), InputError> {
        self.lines.send(format!("{}\n", line))
            .map_err(|_| InputError::Closed)
    }

    /// Wait until the guest asks for input. `None` once the guest is gone.
    pub async fn next_request(&mut self) -> Option<()> {
        self.requests.recv().await
    }

    /// Whether the guest has asked for input since the last check.
    pub fn input_requested(&mut self) -> bool {
        let mut asked = false;
        while self.requests.try_recv().is_ok() {
            asked = true;
        }
        asked
    }

    /// Fails the current and all future reads with `InputError::Cancelled`.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }
}

impl StdinGuest {
    pub async fn read_line(&mut self, timeout: Duration) -> Result<String, InputError> {
        if *self.cancel.borrow() {
            return Err(InputError::Cancelled);
        }
        if let Ok(line) = self.lines.try_recv() {
            return Ok(line);
        }

        // A host that stopped listening for requests can still submit lines.
        let _ = self.requests.send(());

        tokio::select! {
            biased;

            Ok(()) = self.cancel.changed() => Err(InputError::Cancelled),
            line = self.lines.recv() => line.ok_or(InputError::Closed),
            _ = tokio::time::sleep(timeout) => Err(InputError::TimedOut(timeout)),
        }
    }
}
