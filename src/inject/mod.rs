//! Injection of calls to mixin code into target methods
//!
//! Every request names a target method, an injection point, and the injected method to call.
//! Requests are resolved against the methods of the class being transformed, grouped by the
//! instructions they land on, checked against the frame at that point, and finally expanded into
//! blocks of instructions (see [`FlowHarness`]) spliced into the target body.

pub mod boxing;
mod checks;
mod flow;
mod injector;
mod locals;
mod request;
mod resolve;

pub use boxing::{box_value, unbox_value};
pub use checks::*;
pub use flow::{throw_exception, FlowHarness, ILLEGAL_YIELD};
pub use injector::*;
pub use locals::*;
pub use request::*;
pub use resolve::*;
