mod demo;
mod registry;

pub use demo::*;
pub use registry::*;
