//! Websocket Device Manager (WSDM) client transport.
//!
//! The device-control server exposes a device-side WebSocket endpoint.  A
//! simulated device connects to it, announces itself with a single JSON text
//! frame (the handshake) and from then on receives binary command frames.
//!
//! [`WsdmTransport`] owns that connection and adapts it to the [`Transport`]
//! trait:
//!
//! | Frame | Result |
//! |---|---|
//! | Binary | [`Inbound::Binary`] |
//! | Text | [`Inbound::Text`] |
//! | Close / end of stream / reset | [`Inbound::Closed`] |
//! | Ping / Pong | handled internally, never surfaced |

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use handysim_types::SimError;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

use crate::transport::{Inbound, Transport};

/// Default port of the device WebSocket server.
pub const DEFAULT_WSDM_PORT: u16 = 54817;

/// Default device identifier and display name.
pub const DEFAULT_DEVICE_NAME: &str = "SimulatedHandy";

/// Default device address announced in the handshake.
pub const DEFAULT_DEVICE_ADDRESS: &str = "simulator-001";

/// Build the `ws://host:port` URL of a WSDM endpoint.
pub fn wsdm_url(host: &str, port: u16) -> String {
    format!("ws://{host}:{port}")
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// The identity a simulated device announces on connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub identifier: String,
    pub address: String,
    pub version: u32,
    pub name: String,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::named(DEFAULT_DEVICE_NAME)
    }
}

impl DeviceIdentity {
    /// Identity whose identifier and display name are both `name`.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            identifier: name.clone(),
            address: DEFAULT_DEVICE_ADDRESS.to_string(),
            version: 0,
            name,
        }
    }

    /// Override the announced address (builder-style).
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Serialise the handshake frame.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Handshake`] if serialisation fails.
    pub fn handshake_json(&self) -> Result<String, SimError> {
        serde_json::to_string(self).map_err(|e| SimError::Handshake(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// WsdmTransport
// ---------------------------------------------------------------------------

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A live connection to a WSDM endpoint.
pub struct WsdmTransport {
    stream: WsStream,
    url: String,
}

impl WsdmTransport {
    /// Connect to `url` and send the handshake for `identity`.
    ///
    /// # Errors
    ///
    /// * [`SimError::Transport`] – the endpoint is unreachable or refused the
    ///   WebSocket upgrade.
    /// * [`SimError::Handshake`] – the handshake frame could not be sent.
    pub async fn connect(url: &str, identity: &DeviceIdentity) -> Result<Self, SimError> {
        let (mut stream, _response) = connect_async(url)
            .await
            .map_err(|e| SimError::Transport(format!("could not connect to {url}: {e}")))?;

        let handshake = identity.handshake_json()?;
        stream
            .send(Message::Text(handshake.clone().into()))
            .await
            .map_err(|e| SimError::Handshake(format!("send to {url} failed: {e}")))?;

        info!(url, handshake = %handshake, "sent handshake");

        Ok(Self {
            stream,
            url: url.to_string(),
        })
    }

    /// Return the URL this transport is connected to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WsdmTransport {
    async fn recv(&mut self) -> Result<Inbound, SimError> {
        // `StreamExt::next` is cancellation-safe, so the loop is too.
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Inbound::Binary(data.to_vec())),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Inbound::Text(text.as_str().to_owned()));
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(url = %self.url, ?frame, "close frame received");
                    return Ok(Inbound::Closed);
                }
                // Pings are answered by tungstenite on the next read.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return classify_read_error(e),
                None => return Ok(Inbound::Closed),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SimError> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(tungstenite::Error::Io(e)) => {
                debug!(url = %self.url, error = %e, "peer gone before close completed");
                Ok(())
            }
            Err(e) => Err(SimError::Transport(format!("close failed: {e}"))),
        }
    }
}

/// Map a read error to either session end or a per-read fault.
fn classify_read_error(error: tungstenite::Error) -> Result<Inbound, SimError> {
    use std::io::ErrorKind;

    match error {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            Ok(Inbound::Closed)
        }
        tungstenite::Error::Io(ref io)
            if matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            ) =>
        {
            Ok(Inbound::Closed)
        }
        other => Err(SimError::Transport(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
