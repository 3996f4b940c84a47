//! Transformation stages, the order they run in, and the registries feeding them

mod ordering;
mod registry;
mod stage;

pub use ordering::*;
pub use registry::*;
pub use stage::*;
