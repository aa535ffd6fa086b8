//! `handysim-middleware` – The Transport Layer
//!
//! Moves raw device traffic between the device-control server and the
//! runtime without caring about its meaning.
//!
//! # Modules
//!
//! - [`transport`] – the [`Transport`] trait and the [`Inbound`] message
//!   enum the runtime's receive activity consumes.
//! - [`wsdm`] – [`WsdmTransport`]: WebSocket client for the server's
//!   device endpoint, including the JSON identity handshake.
//! - [`channel`] – [`ChannelTransport`]: an in-process transport backed by a
//!   Tokio channel, for tests and demos.

pub mod channel;
pub mod transport;
pub mod wsdm;

pub use channel::{ChannelSender, ChannelTransport};
pub use transport::{Inbound, Transport};
pub use wsdm::{DeviceIdentity, WsdmTransport};
