//! Client configuration: TOML file plus command-line overrides.
//!
//! ```toml
//! server_url = "https://timmy.local"
//! load_history = true
//! greeting = "Connected and ready."
//! tool_preview_lines = 6
//!
//! [reconnect]
//! strategy = "linear"
//! base_delay_ms = 3000
//! max_delay_ms = 15000
//! max_attempts = 5
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::error::{ClientError, Result};
use crate::reconnect::RetryConfig;
use crate::transport::Endpoints;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_GREETING: &str = "Connected and ready.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the chat backend. `https` selects a `wss` socket.
    pub server_url: String,
    pub load_history: bool,
    pub history_timeout_ms: u64,
    /// Notice shown each time a connection opens. Empty disables it.
    pub greeting: String,
    /// Lines of tool output shown before a block is collapsed.
    pub tool_preview_lines: usize,
    pub reconnect: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            load_history: true,
            history_timeout_ms: 5_000,
            greeting: DEFAULT_GREETING.to_string(),
            tool_preview_lines: 6,
            reconnect: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ClientError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// File (if any) first, then command-line overrides.
    pub fn resolve(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        Ok(config)
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(server) = &args.server {
            self.server_url = server.clone();
        }
        if args.no_history {
            self.load_history = false;
        }
        if args.no_greeting {
            self.greeting.clear();
        }
        if let Some(strategy) = args.strategy {
            self.reconnect.strategy = strategy;
        }
        if let Some(n) = args.max_attempts {
            self.reconnect.max_attempts = n;
        }
        if let Some(ms) = args.base_delay_ms {
            self.reconnect.base_delay_ms = ms;
        }
        if let Some(ms) = args.max_delay_ms {
            self.reconnect.max_delay_ms = ms;
        }
    }

    pub fn endpoints(&self) -> Result<Endpoints> {
        Endpoints::from_base(&self.server_url)
    }

    pub fn greeting(&self) -> Option<String> {
        let g = self.greeting.trim();
        (!g.is_empty()).then(|| g.to_string())
    }

    pub fn history_timeout(&self) -> Duration {
        Duration::from_millis(self.history_timeout_ms)
    }
}
