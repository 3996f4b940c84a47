//! Model of JVM classes, as the mixin engine consumes and produces them
//!
//! Classes hold methods, whose bodies are flat lists of instructions. There is no constant pool
//! and no serialized form: reading and writing class files is left to the caller.
//!
//! ```
//! use jmixin::jvm::code::{Instruction, MethodBody};
//! use jmixin::jvm::model::{Class, Method};
//! use jmixin::jvm::*;
//!
//! let mut class = Class::new(
//!     BinaryName::from_string(String::from("com/example/Point")).unwrap(),
//!     Some(BinaryName::OBJECT),
//!     ClassAccessFlags::PUBLIC,
//! );
//! class.add_method(Method::new(
//!     MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
//!     UnqualifiedName::from_string(String::from("zero")).unwrap(),
//!     MethodDescriptor::parse("()I").unwrap(),
//!     Some(MethodBody::new(vec![Instruction::IConst0, Instruction::IReturn], 0, 1)),
//! ));
//! assert_eq!(class.methods.len(), 1);
//! ```

mod access_flags;
pub mod code;
mod descriptors;
pub mod model;
mod names;

pub use access_flags::*;
pub use descriptors::*;
pub use names::*;
