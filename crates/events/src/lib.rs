//! Progress event protocol for phased operations
//!
//! This crate provides the wire schema shared by every pipeline and the
//! single-subscriber channel that carries one run's events to its transport.

mod channel;
mod types;

pub use channel::{progress_channel, ProgressSender, ProgressStream, SendOutcome};
pub use types::*;
