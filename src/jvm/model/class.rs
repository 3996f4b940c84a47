use crate::jvm::model::{Method, MethodSignature};
use crate::jvm::{BinaryName, ClassAccessFlags};

/// Semantic representation of a class
#[derive(Clone, Debug, PartialEq)]
pub struct Class {
    pub name: BinaryName,

    /// Direct superclass (only `java/lang/Object` has none)
    pub super_name: Option<BinaryName>,

    pub access_flags: ClassAccessFlags,

    pub methods: Vec<Method>,
}

impl Class {
    /// Create a new class, with no methods
    pub fn new(
        name: BinaryName,
        super_name: Option<BinaryName>,
        access_flags: ClassAccessFlags,
    ) -> Class {
        Class {
            name,
            super_name,
            access_flags,
            methods: vec![],
        }
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    /// Superclass, defaulting to `java/lang/Object`
    pub fn super_name_or_object(&self) -> BinaryName {
        self.super_name.clone().unwrap_or(BinaryName::OBJECT)
    }

    pub fn add_method(&mut self, method: Method) {
        self.methods.push(method);
    }

    /// Find a method by name and descriptor
    pub fn method(&self, signature: &MethodSignature) -> Option<&Method> {
        self.methods.iter().find(|method| method.matches(signature))
    }

    /// Find a method by name and descriptor
    pub fn method_mut(&mut self, signature: &MethodSignature) -> Option<&mut Method> {
        self.methods.iter_mut().find(|method| method.matches(signature))
    }
}
