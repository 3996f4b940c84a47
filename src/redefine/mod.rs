//! Redefinition of injected methods
//!
//! In the simplest mode, injected methods are just added to their target classes. When only
//! method bodies can be redefined (so no method can be added after a class is loaded), every
//! injected method is instead folded into a dispatcher: a single method taking a dispatch index
//! and an `Object[]` of arguments, which switches on the index to the body of the injected
//! method. Calls to injected methods get rewritten into calls to the dispatcher.

mod call_site;
mod dispatcher;
mod injector;

pub use call_site::*;
pub use dispatcher::*;
pub use injector::*;

use crate::jvm::model::Method;
use crate::jvm::BinaryName;
use crate::operation::Targeted;
use std::sync::atomic::{AtomicU32, Ordering};

/// How injected methods make it into their target classes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RedefinitionMode {
    /// Injected methods are added as they are
    Full,

    /// Same as `Full`
    None,

    /// Injected methods go through a dispatcher
    OnlyInstructions,
}

/// Method to add to (or dispatch to from) some classes
#[derive(Clone, Debug, PartialEq)]
pub struct RedefinedMethod {
    pub method: Method,
    pub dispatch_index: u32,
    pub targets: Vec<BinaryName>,
}

impl Targeted for RedefinedMethod {
    fn targets(&self) -> &[BinaryName] {
        &self.targets
    }
}

/// Source of dispatch indices
///
/// Indices are unique and increasing for the life of the registrar, so a declaration keeps its
/// index when the classes it targets are transformed again.
#[derive(Debug, Default)]
pub struct Registrar {
    next_index: AtomicU32,
}

impl Registrar {
    pub fn new() -> Registrar {
        Registrar::default()
    }

    pub fn next_dispatch_index(&self) -> u32 {
        self.next_index.fetch_add(1, Ordering::SeqCst)
    }
}
