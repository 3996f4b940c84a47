//! In-memory model of classes and methods

mod class;
mod method;

pub use class::*;
pub use method::*;
