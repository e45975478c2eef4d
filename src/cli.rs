use std::path::PathBuf;

use clap::Parser;
use clap_complete::Shell;

use crate::reconnect::Strategy;

#[derive(Parser, Debug)]
#[command(name = "timmy-chat")]
#[command(version)]
#[command(about = "Terminal chat client for the Timmy AI backend")]
#[command(
    after_help = "Commands while chatting: /tab <chat|dreams|synapses|evolution|market|drafts>, /panel, /expand, /quit"
)]
pub struct Args {
    /// TOML config file; command-line flags take precedence
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Backend base URL (https selects a secure socket)
    #[arg(long, short)]
    pub server: Option<String>,

    /// Skip replaying /history at startup
    #[arg(long)]
    pub no_history: bool,

    /// Do not print a greeting when a connection opens
    #[arg(long)]
    pub no_greeting: bool,

    /// Reconnect strategy
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Consecutive failed connections before giving up (0 = never give up)
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Base reconnect delay in milliseconds
    #[arg(long)]
    pub base_delay_ms: Option<u64>,

    /// Upper bound on the linear reconnect delay in milliseconds
    #[arg(long)]
    pub max_delay_ms: Option<u64>,

    /// Debug-level logging on stderr (RUST_LOG overrides)
    #[arg(long, short)]
    pub verbose: bool,

    /// Print shell completions and exit
    #[arg(long, value_enum)]
    pub completions: Option<Shell>,
}

impl Args {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "timmy_chat=debug,warn"
        } else {
            "warn"
        }
    }
}
