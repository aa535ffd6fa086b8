//! The transport boundary.
//!
//! The runtime never speaks WebSocket directly.  It pulls [`Inbound`] values
//! from a [`Transport`], so the receive activity can be driven by the real
//! device server ([`WsdmTransport`][crate::wsdm::WsdmTransport]) or by an
//! in-process channel ([`ChannelTransport`][crate::channel::ChannelTransport])
//! in tests.

use async_trait::async_trait;
use handysim_types::SimError;

/// One message pulled off the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Opaque binary payload, normally an encoded device command.
    Binary(Vec<u8>),
    /// Text frame; not a command, logged and ignored by the runtime.
    Text(String),
    /// The remote end closed the session.  Terminal.
    Closed,
}

/// Every inbound message source must implement this trait.
///
/// # Contract
///
/// * `recv` – waits for the next [`Inbound`] message.  It must be
///   cancellation-safe: the runtime wraps it in a timeout so it can observe
///   the stop signal, and a cancelled call must not lose a message.  Once
///   [`Inbound::Closed`] has been returned every later call returns it too.
///
/// * `close` – releases the underlying connection.  Closing an already
///   closed transport is not an error.
#[async_trait]
pub trait Transport: Send {
    /// Wait for the next inbound message.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Transport`] for a fault that affects only the
    /// current read (e.g. a malformed frame).  The session is still usable.
    async fn recv(&mut self) -> Result<Inbound, SimError>;

    /// Release the underlying connection.
    async fn close(&mut self) -> Result<(), SimError>;
}
