//! Selection of the instructions that injected code attaches to
//!
//! A `Selector` finds individual instructions in a method body. An `InjectionPoint` turns those
//! matches into groups (either single instructions, or ranges delimited by a pair of
//! selectors), and keeps a window of them. `SelectorSpec` and `InjectionPointSpec` are the
//! declared forms, validated when they get built.

mod custom;
mod declaration;
mod point;
mod selector;

pub use custom::*;
pub use declaration::*;
pub use point::*;
pub use selector::*;
