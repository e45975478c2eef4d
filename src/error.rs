//! Crate-level error type.

use thiserror::Error;

/// Errors surfaced by the chat client.
///
/// None of these are fatal to a running session: the controller routes
/// transport failures into the reconnect path and swallows history failures.
/// They only escape to `main` during startup (bad config, bad endpoint).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`crate::config::ClientConfig`].
    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The server URL cannot be turned into a socket or history endpoint.
    #[error("invalid endpoint '{url}': {detail}")]
    InvalidEndpoint { url: String, detail: String },

    /// WebSocket handshake or frame-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// The history endpoint could not be reached or returned a bad status.
    #[error("history request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON payload did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
