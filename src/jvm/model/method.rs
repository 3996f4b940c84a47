use crate::jvm::code::MethodBody;
use crate::jvm::{MethodAccessFlags, MethodDescriptor, RenderDescriptor, UnqualifiedName};
use std::fmt;

/// Name and descriptor of a method, which together identify it within a class
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodSignature {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.descriptor.render())
    }
}

/// Semantic representation of a method
#[derive(Clone, Debug, PartialEq)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,

    /// Method code implementation (absent for abstract and native methods)
    pub body: Option<MethodBody>,
}

impl Method {
    /// Create a new method
    pub fn new(
        access_flags: MethodAccessFlags,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
        body: Option<MethodBody>,
    ) -> Method {
        Method {
            access_flags,
            name,
            descriptor,
            body,
        }
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// Is this an instance initializer (`<init>`)?
    pub fn is_constructor(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }

    pub fn signature(&self) -> MethodSignature {
        MethodSignature {
            name: self.name.clone(),
            descriptor: self.descriptor.clone(),
        }
    }

    /// Does this method have the given name and descriptor?
    pub fn matches(&self, signature: &MethodSignature) -> bool {
        self.name == signature.name && self.descriptor == signature.descriptor
    }
}
