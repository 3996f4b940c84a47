//! Type-state analysis of method bodies
//!
//! The frame simulator tracks the types of the operand stack and local variables through a
//! method body. There are two ways to compute the frame at some instruction:
//!
//!   - `simulate` replays the body in order, carrying the frame across jumps to their target
//!     labels and resetting it at frame markers
//!
//!   - `simulate_dominated` only replays the basic blocks that dominate the target in the
//!     control flow graph, so that nothing from a branch that may not have been taken leaks in

mod flow_graph;
mod frame;
mod simulate;
mod value;

pub use flow_graph::*;
pub use frame::*;
pub use simulate::{simulate, SimulationStrategy};
pub use value::*;
