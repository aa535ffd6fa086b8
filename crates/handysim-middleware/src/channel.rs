//! In-process transport backed by a Tokio `mpsc` channel.
//!
//! Used by tests and demos to feed the runtime without a device server.
//! Dropping every [`ChannelSender`] closes the transport.

use async_trait::async_trait;
use handysim_types::SimError;
use tokio::sync::mpsc;

use crate::transport::{Inbound, Transport};

/// Receiving half, handed to the runtime.
pub struct ChannelTransport {
    rx: mpsc::Receiver<Result<Inbound, SimError>>,
    closed: bool,
}

/// Sending half, kept by the test or demo driving the runtime.
#[derive(Clone)]
pub struct ChannelSender {
    tx: mpsc::Sender<Result<Inbound, SimError>>,
}

/// Create a connected sender/transport pair buffering up to `capacity`
/// messages.
pub fn channel(capacity: usize) -> (ChannelSender, ChannelTransport) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        ChannelSender { tx },
        ChannelTransport { rx, closed: false },
    )
}

impl ChannelSender {
    /// Queue a binary payload.
    pub async fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<(), SimError> {
        self.send(Ok(Inbound::Binary(data.into()))).await
    }

    /// Queue a text frame.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), SimError> {
        self.send(Ok(Inbound::Text(text.into()))).await
    }

    /// Queue a per-read transport fault.
    pub async fn send_error(&self, error: SimError) -> Result<(), SimError> {
        self.send(Err(error)).await
    }

    /// Queue an explicit close.  Messages queued before it are still
    /// delivered.
    pub async fn close(&self) -> Result<(), SimError> {
        self.send(Ok(Inbound::Closed)).await
    }

    async fn send(&self, item: Result<Inbound, SimError>) -> Result<(), SimError> {
        self.tx
            .send(item)
            .await
            .map_err(|_| SimError::ConnectionClosed)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn recv(&mut self) -> Result<Inbound, SimError> {
        if self.closed {
            return Ok(Inbound::Closed);
        }
        match self.rx.recv().await {
            Some(Ok(Inbound::Closed)) | None => {
                self.closed = true;
                Ok(Inbound::Closed)
            }
            Some(item) => item,
        }
    }

    async fn close(&mut self) -> Result<(), SimError> {
        self.closed = true;
        self.rx.close();
        Ok(())
    }
}
