use crate::analysis::SimulationStrategy;
use crate::errors::{MixinError, MixinErrorCause};
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, Name, UnqualifiedName};
use crate::redefine::RedefinitionMode;
use crate::tag::Tag;

/// Classes that injected code talks to at runtime
///
/// The engine only emits references to these: they must be provided by whoever loads the
/// transformed classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeClasses {
    /// Interface of the flow handle passed to injected code
    pub flow: BinaryName,

    /// Result of an injected call (`yielding`, `value`, and a `fold` method)
    pub flow_result: BinaryName,

    /// Implementation of the flow handle, with a no-argument constructor
    pub internal_flow: BinaryName,

    /// Interface of capture cells (`get()`)
    pub captured: BinaryName,

    /// Implementation of capture cells, built from a boxed value and its sort
    pub internal_captured: BinaryName,

    /// Interface of the stack view (`get(int)`)
    pub stack: BinaryName,

    /// Implementation of the stack view, built from an `Object[]`
    pub internal_stack: BinaryName,

    /// Placeholder for stack values that have not been initialized yet
    pub uninitialized_type: BinaryName,

    /// Enum whose constants mirror `TypeSort`
    pub type_sort: BinaryName,
}

/// Configuration of the engine
pub struct Settings {
    pub runtime: RuntimeClasses,

    /// Prefix of the instance dispatcher's name (completed by the flattened class name)
    pub dispatcher_prefix: UnqualifiedName,

    /// Prefix of the static dispatcher's name (completed by the flattened class name)
    pub static_dispatcher_prefix: UnqualifiedName,

    /// How injected methods make it into their target classes
    pub redefinition: RedefinitionMode,

    /// How frames at injection points are computed
    pub simulation: SimulationStrategy,
}

impl Settings {
    /// Settings whose runtime support classes live in the given package (eg. `jmixin/runtime`)
    pub fn new(
        runtime_package: String,
        redefinition: RedefinitionMode,
    ) -> Result<Settings, MixinError> {
        fn make_name<N: Name>(name: impl Into<String>) -> Result<N, MixinError> {
            let name = name.into();
            N::from_string(name.clone()).map_err(|msg| {
                MixinError::new(Tag::ENGINE, MixinErrorCause::MalformedName, vec![name, msg])
            })
        }

        let package: BinaryName = make_name(runtime_package)?;
        let class = |short: &str| make_name::<BinaryName>(format!("{}/{}", package, short));

        Ok(Settings {
            runtime: RuntimeClasses {
                flow: class("Flow")?,
                flow_result: class("Flow$Result")?,
                internal_flow: class("InternalFlow")?,
                captured: class("Captured")?,
                internal_captured: class("InternalCaptured")?,
                stack: class("Stack")?,
                internal_stack: class("InternalStack")?,
                uninitialized_type: class("UninitializedType")?,
                type_sort: class("TypeSort")?,
            },
            dispatcher_prefix: make_name("uber_method_")?,
            static_dispatcher_prefix: make_name("static_uber_method_")?,
            redefinition,
            simulation: SimulationStrategy::Linear,
        })
    }

    /// Name of a dispatcher method for the given class
    pub fn dispatcher_name(&self, class: &BinaryName, is_static: bool) -> UnqualifiedName {
        let prefix = if is_static {
            &self.static_dispatcher_prefix
        } else {
            &self.dispatcher_prefix
        };
        prefix.concat(&class.flattened())
    }

    /// Descriptor shared by all dispatchers: `(I[Ljava/lang/Object;)Ljava/lang/Object;`
    pub fn dispatcher_descriptor() -> MethodDescriptor {
        MethodDescriptor {
            parameters: vec![
                FieldType::int(),
                FieldType::array(FieldType::object(BinaryName::OBJECT)),
            ],
            return_type: Some(FieldType::object(BinaryName::OBJECT)),
        }
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            runtime: RuntimeClasses {
                flow: BinaryName::from_static("jmixin/runtime/Flow"),
                flow_result: BinaryName::from_static("jmixin/runtime/Flow$Result"),
                internal_flow: BinaryName::from_static("jmixin/runtime/InternalFlow"),
                captured: BinaryName::from_static("jmixin/runtime/Captured"),
                internal_captured: BinaryName::from_static("jmixin/runtime/InternalCaptured"),
                stack: BinaryName::from_static("jmixin/runtime/Stack"),
                internal_stack: BinaryName::from_static("jmixin/runtime/InternalStack"),
                uninitialized_type: BinaryName::from_static("jmixin/runtime/UninitializedType"),
                type_sort: BinaryName::from_static("jmixin/runtime/TypeSort"),
            },
            dispatcher_prefix: UnqualifiedName::from_static("uber_method_"),
            static_dispatcher_prefix: UnqualifiedName::from_static("static_uber_method_"),
            redefinition: RedefinitionMode::Full,
            simulation: SimulationStrategy::Linear,
        }
    }
}
