//! Core abstractions for the native phase execution model.
//!
//! - [`PhaseStep`] - One asynchronous step bound to a registry entry
//! - [`StepReport`] - Events a successful step reports
//! - [`NativePhaseExecutor`] - Runs the steps of a registry strictly in order
//! - [`OrderedEventEmitter`] - Event emitter with terminal-once guarantees

mod events;
mod execution;
mod phase;

pub use events::OrderedEventEmitter;
pub use execution::NativePhaseExecutor;
pub use phase::{PhaseStep, StepContext, StepReport};
