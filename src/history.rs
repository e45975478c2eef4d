//! History replay source: `GET /history` on the chat backend.

use std::time::Duration;

use reqwest::Url;
use tracing::{debug, warn};

use crate::error::Result;
use crate::protocol::{HistoryEntry, HistoryResponse};

/// HTTP client for the backend's history endpoint.
#[derive(Debug, Clone)]
pub struct HistoryClient {
    url: Url,
    client: reqwest::Client,
}

impl HistoryClient {
    /// Build a client for `url` with a bounded request timeout.
    pub fn new(url: Url, timeout: Duration) -> Self {
        // Builder failure only happens in broken TLS environments; the default
        // client is an acceptable fallback for a single GET.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { url, client }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetch the stored transcript, oldest first.
    ///
    /// # Errors
    /// - [`crate::error::ClientError::Http`] on connect failure or non-2xx status.
    /// - [`crate::error::ClientError::Decode`] when the body is not the
    ///   structured `{role, content}` shape.
    pub async fn fetch(&self) -> Result<Vec<HistoryEntry>> {
        let resp = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?;
        let bytes = resp.bytes().await?;
        let body: HistoryResponse = serde_json::from_slice(&bytes)?;
        Ok(body.messages)
    }
}

/// Fetch history, swallowing every failure.
///
/// A session always starts, with an empty transcript when the backend has
/// nothing or cannot be reached.
pub async fn load_history(client: &HistoryClient) -> Vec<HistoryEntry> {
    match client.fetch().await {
        Ok(entries) => {
            debug!(count = entries.len(), url = %client.url(), "history loaded");
            entries
        }
        Err(e) => {
            warn!(error = %e, url = %client.url(), "could not load history, starting empty");
            Vec::new()
        }
    }
}
