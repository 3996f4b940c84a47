use crate::errors::{MixinError, MixinErrorCause};
use crate::jvm::model::{Method, MethodSignature};
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, RefType, RenderDescriptor, UnqualifiedName};
use crate::select::{InjectionKind, InjectionPoint};
use crate::settings::RuntimeClasses;
use crate::tag::Tag;
use std::fmt;
use std::sync::Arc;

/// Method that injected code targets
///
/// Either the descriptor is known, or the target is inferred from its name and the leading
/// parameters it must accept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetMethod {
    pub name: UnqualifiedName,
    pub descriptor: Option<MethodDescriptor>,

    /// Leading parameter types used to disambiguate overloads when there is no descriptor
    pub parameter_hint: Vec<FieldType>,
}

impl TargetMethod {
    pub fn exact(signature: MethodSignature) -> TargetMethod {
        TargetMethod {
            name: signature.name,
            descriptor: Some(signature.descriptor),
            parameter_hint: vec![],
        }
    }

    pub fn inferred(name: UnqualifiedName, parameter_hint: Vec<FieldType>) -> TargetMethod {
        TargetMethod {
            name,
            descriptor: None,
            parameter_hint,
        }
    }
}

impl fmt::Display for TargetMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.descriptor {
            Some(descriptor) => write!(f, "{}{}", self.name, descriptor.render()),
            None => {
                write!(f, "{}(", self.name)?;
                for parameter in &self.parameter_hint {
                    f.write_str(&parameter.render())?;
                }
                f.write_str("...)")
            }
        }
    }
}

/// What a parameter of an injected method receives
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParameterRole {
    /// Handle for controlling the flow of the target method
    Flow,

    /// View of the operand stack at the injection point
    Stack,

    /// Cell holding one of the requested locals
    Captured,
}

impl ParameterRole {
    pub fn of(parameter: &FieldType, runtime: &RuntimeClasses) -> Option<ParameterRole> {
        match parameter {
            FieldType::Ref(RefType::Object(class)) if *class == runtime.flow => {
                Some(ParameterRole::Flow)
            }
            FieldType::Ref(RefType::Object(class)) if *class == runtime.stack => {
                Some(ParameterRole::Stack)
            }
            FieldType::Ref(RefType::Object(class)) if *class == runtime.captured => {
                Some(ParameterRole::Captured)
            }
            _ => None,
        }
    }
}

/// Method carrying the injected code, as it will be added to the target class
#[derive(Clone, Debug, PartialEq)]
pub struct InjectedMethod {
    pub method: Method,

    /// Type argument of each `Captured` parameter, in order
    pub capture_types: Vec<FieldType>,

    /// Key of the method in the dispatcher of its target classes
    pub dispatch_index: u32,
}

impl InjectedMethod {
    pub fn is_static(&self) -> bool {
        self.method.is_static()
    }

    /// Roles of the parameters, failing on the first one that has none
    pub fn roles(
        &self,
        runtime: &RuntimeClasses,
        declaration: &Tag,
    ) -> Result<Vec<ParameterRole>, MixinError> {
        self.method
            .descriptor
            .parameters
            .iter()
            .map(|parameter| {
                ParameterRole::of(parameter, runtime).ok_or_else(|| {
                    MixinError::new(
                        declaration.clone(),
                        MixinErrorCause::InvalidParameterType,
                        vec![self.method.signature().to_string(), parameter.render()],
                    )
                })
            })
            .collect()
    }

    /// Does the method return a flow result (as opposed to nothing)?
    pub fn returns_result(&self, runtime: &RuntimeClasses) -> bool {
        self.method.descriptor.return_type
            == Some(FieldType::object(runtime.flow_result.clone()))
    }
}

/// Fully resolved request to inject code into some classes
#[derive(Clone, Debug)]
pub struct InjectionRequest {
    /// Declaration the request comes from
    pub declaration: Tag,

    pub target: TargetMethod,
    pub kind: InjectionKind,
    pub point: InjectionPoint,

    /// Local variable slots captured for the injected method (in `Captured` parameter order)
    pub locals: Vec<u16>,

    pub injected: Arc<InjectedMethod>,

    /// Classes the request applies to
    pub targets: Vec<BinaryName>,
}
