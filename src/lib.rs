//! Bytecode mixin engine for JVM classes
//!
//! Mixins declare calls to inject into methods of target classes, at points picked out by
//! selectors (the head of a method, a field write, an invocation, ...). The engine takes classes
//! as already-parsed [`jvm::model::Class`] values, and for each one:
//!
//!   1. finds the methods that registered injections target, and the instructions their
//!      selectors match
//!   2. simulates the frame at each of those instructions, to know what is on the stack and in
//!      the locals
//!   3. synthesizes a block of code around each point which exposes that state to the injected
//!      method, calls it, and lets it either resume or return early
//!   4. adds the injected methods to the class, either directly or through a dispatcher method
//!      when the class can only have its method bodies redefined
//!
//! ```
//! use jmixin::engine::Engine;
//! use jmixin::settings::Settings;
//!
//! let engine = Engine::new(Settings::default()).unwrap();
//! assert!(engine.unregister(&jmixin::tag::Tag::new("nothing")).is_empty());
//! ```

pub mod analysis;
pub mod engine;
pub mod errors;
pub mod inject;
pub mod jvm;
pub mod operation;
pub mod redefine;
pub mod select;
pub mod settings;
pub mod tag;
pub mod util;
