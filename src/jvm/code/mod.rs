//! Method bodies, as lists of instructions

mod body;
mod constant;
mod instruction;
mod label;

pub use body::*;
pub use constant::*;
pub use instruction::*;
pub use label::*;
