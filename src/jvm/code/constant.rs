use crate::jvm::{MethodDescriptor, RefType, RenderDescriptor};
use std::fmt;

/// Constant loadable by an `ldc` instruction
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Class(RefType),
    MethodType(MethodDescriptor),
}

impl Constant {
    /// Does this constant occupy two slots on the stack?
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// Textual rendering used when matching `ldc` instructions against a literal
///
/// Strings render as their contents, classes and method types as their descriptors, and
/// floating point numbers always keep a fractional part (`1.0` and not `1`).
impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Integer(i) => write!(f, "{}", i),
            Constant::Long(l) => write!(f, "{}", l),
            Constant::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Constant::Float(x) => write!(f, "{}", x),
            Constant::Double(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Constant::Double(x) => write!(f, "{}", x),
            Constant::String(s) => f.write_str(s),
            Constant::Class(cls) => f.write_str(&cls.render()),
            Constant::MethodType(desc) => f.write_str(&desc.render()),
        }
    }
}
