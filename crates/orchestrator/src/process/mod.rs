//! Process phase adapter.
//!
//! Derives a progress stream from the line-oriented output of an external
//! process that knows nothing about the protocol:
//!
//! - [`classify`] - Pure line classification heuristics
//! - [`LineBuffer`] - Newline framing over arbitrary byte chunks
//! - [`ProcessLauncher`] - Spawning seam, real or fake
//! - [`ProcessPhaseAdapter`] - Ties the above to an emitter

mod adapter;
pub mod classify;
mod launcher;
mod lines;

pub use adapter::{OutputSource, ProcessPhaseAdapter, TESTS_PHASE_NAME, SETUP_PHASE_NAME};
pub use classify::{classify, is_divider, strip_ansi};
pub use launcher::{ExitOutcome, ProcessLauncher, ProcessSpec, SpawnedProcess, TokioLauncher};
pub use lines::LineBuffer;
