//! Socket plumbing: endpoint derivation, the connection traits the session
//! controller is generic over, and the tokio-tungstenite implementation.

use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{ClientError, Result};

// -- Endpoints --------------------------------------------------------------

/// The two URLs a session talks to, both derived from one server base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub socket: Url,
    pub history: Url,
}

impl Endpoints {
    /// Derive `ws(s)://host/ws` and `http(s)://host/history` from `base`.
    ///
    /// A secure base (`https`) selects `wss`. Any other scheme is rejected.
    pub fn from_base(base: &str) -> Result<Self> {
        let invalid = |detail: String| ClientError::InvalidEndpoint {
            url: base.to_string(),
            detail,
        };

        let parsed = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
        let socket_scheme = match parsed.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(invalid(format!("unsupported scheme '{}'", other))),
        };
        if parsed.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }

        let mut history = parsed.clone();
        history.set_query(None);
        history.set_fragment(None);
        history.set_path("/history");

        let mut socket = history.clone();
        socket.set_path("/ws");
        socket
            .set_scheme(socket_scheme)
            .map_err(|_| invalid(format!("cannot switch to {}", socket_scheme)))?;

        Ok(Self { socket, history })
    }

    pub fn is_secure(&self) -> bool {
        self.socket.scheme() == "wss"
    }
}

// -- Traits -----------------------------------------------------------------

/// One open socket. Replaced wholesale on reconnect.
#[allow(async_fn_in_trait)]
pub trait Connection {
    /// Next text frame. `None` means the peer closed the socket;
    /// `Some(Err(_))` is a socket error, which always ends the connection.
    async fn recv(&mut self) -> Option<Result<String>>;

    async fn send(&mut self, text: String) -> Result<()>;

    /// Best-effort close handshake.
    async fn close(&mut self);
}

/// Opens [`Connection`]s.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Conn: Connection;

    async fn connect(&self, url: &Url) -> Result<Self::Conn>;
}

// -- tokio-tungstenite ------------------------------------------------------

/// Connector backed by `tokio_tungstenite::connect_async`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl Connector for WsConnector {
    type Conn = WsConnection;

    async fn connect(&self, url: &Url) -> Result<WsConnection> {
        let (stream, response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        debug!(url = %url, status = %response.status(), "websocket handshake complete");
        Ok(WsConnection { stream })
    }
}

impl Connection for WsConnection {
    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(text)),
                Ok(WsMessage::Close(frame)) => {
                    debug!(?frame, "server sent close frame");
                    return None;
                }
                // Pings are answered by tungstenite on the next read/write.
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<()> {
        self.stream.send(WsMessage::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "close handshake failed");
        }
    }
}
