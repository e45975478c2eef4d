//! Terminal chat client for the Timmy AI backend.
//!
//! The crate is split along the reducer seam:
//! - [`protocol`]: wire types and fail-soft frame decoding.
//! - [`reducer`]: pure `(cursor, event) -> (cursor, instructions)` step.
//! - [`render`]: renderers that apply instructions (terminal, in-memory).
//! - [`panels`]: side-panel feeds and the tab router.
//! - [`reconnect`]: retry policy and the injectable clock.
//! - [`transport`]: endpoint derivation and the socket traits.
//! - [`history`]: one-shot `/history` replay source.
//! - [`session`]: the controller tying the above together.

pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod panels;
pub mod protocol;
pub mod reconnect;
pub mod reducer;
pub mod render;
pub mod session;
pub mod transport;

pub use error::{ClientError, Result};
pub use session::{Input, SessionController, SessionOutcome};
