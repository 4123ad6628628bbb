mod body;
mod demo;
mod health;
mod pipelines;
pub mod sse;
mod test_runs;

pub use demo::*;
pub use health::*;
pub use pipelines::*;
pub use test_runs::*;
