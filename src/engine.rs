use crate::errors::{MixinError, MixinErrorCause};
use crate::inject::{InjectedMethod, InjectionRequest, InstructionInjector, TargetMethod};
use crate::jvm::model::{Class, Method};
use crate::jvm::{BinaryName, FieldType};
use crate::operation::{ClassGenerator, ClassTransformer, OperationRegistry, StageList};
use crate::redefine::{MethodInjector, Registrar};
use crate::select::{CustomSelector, CustomSelectorCache, InjectionPointSpec};
use crate::settings::Settings;
use crate::tag::Tag;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Injection as declared by a mixin
#[derive(Clone, Debug)]
pub struct InjectionDeclaration {
    /// Identity of the declaration (everything it registers is unregistered together)
    pub declaration: Tag,

    pub target: TargetMethod,
    pub at: InjectionPointSpec,

    /// Local variable slots to capture, in `Captured` parameter order
    pub locals: Vec<u16>,

    /// Method to inject calls to
    pub method: Method,

    /// Declared types of the captured locals
    pub capture_types: Vec<FieldType>,

    /// Classes the injection applies to
    pub targets: Vec<BinaryName>,
}

/// Mixin engine: registered injections, and the stages that apply them to classes
pub struct Engine {
    settings: Settings,
    registrar: Registrar,
    customs: CustomSelectorCache,
    instructions: Arc<InstructionInjector>,
    stages: StageList,
    generators: Vec<Arc<dyn ClassGenerator>>,
}

impl Engine {
    pub fn new(settings: Settings) -> Result<Engine, MixinError> {
        let methods = Arc::new(MethodInjector::new());
        let instructions = Arc::new(InstructionInjector::new(methods.registry()));

        let mut stages = StageList::new();
        stages.add(methods)?;
        stages.add(instructions.clone())?;
        log::debug!("Engine stages: {:?}", stages.ids());

        Ok(Engine {
            settings,
            registrar: Registrar::new(),
            customs: CustomSelectorCache::new(),
            instructions,
            stages,
            generators: vec![],
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Make a custom selector type available to declarations registered from now on
    pub fn register_custom_selector<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&[String]) -> Arc<dyn CustomSelector> + Send + Sync + 'static,
    {
        self.customs.register_factory(name, factory);
    }

    /// Add an extra stage, ordered according to its parents
    pub fn add_stage(&mut self, stage: Arc<dyn ClassTransformer>) -> Result<(), MixinError> {
        self.stages.add(stage)
    }

    pub fn add_generator(&mut self, generator: Arc<dyn ClassGenerator>) {
        self.generators.push(generator);
    }

    /// Register an injection, along with the method it injects
    ///
    /// The declaration gets a fresh dispatch index each time it is registered. Returns the
    /// classes that have to be transformed again for the injection to take effect.
    pub fn register(
        &self,
        declaration: InjectionDeclaration,
    ) -> Result<BTreeSet<BinaryName>, MixinError> {
        let tag = declaration.declaration;
        let point = declaration
            .at
            .build(&declaration.target, &self.customs, declaration.method.is_static())
            .map_err(|err| err.attributed_to(&tag))?;

        let injected = InjectedMethod {
            method: declaration.method,
            capture_types: declaration.capture_types,
            dispatch_index: self.registrar.next_dispatch_index(),
        };
        log::debug!(
            "Registering '{}': {} into {} (index {})",
            tag,
            injected.method.signature(),
            declaration.target,
            injected.dispatch_index
        );

        let request = InjectionRequest {
            declaration: tag.clone(),
            target: declaration.target,
            kind: declaration.at.kind,
            point,
            locals: declaration.locals,
            injected: Arc::new(injected),
            targets: declaration.targets,
        };
        let affected = request.targets.iter().cloned().collect();
        self.instructions.registry().register(request, &tag);
        Ok(affected)
    }

    /// Remove everything the declaration registered, returning the classes it applied to
    ///
    /// Those classes have to be transformed again to get rid of the injections.
    pub fn unregister(&self, declaration: &Tag) -> BTreeSet<BinaryName> {
        for generator in &self.generators {
            generator.unregister(declaration);
        }
        self.instructions
            .registry()
            .unregister(declaration)
            .iter()
            .flat_map(|request| request.targets.iter().cloned())
            .collect()
    }

    /// Apply every stage to a copy of the class
    pub fn transform(&self, class: &Class) -> Result<Class, MixinError> {
        let mut transformed = class.clone();
        for stage in self.stages.iter() {
            log::trace!("Running stage {} on {}", stage.id(), class.name);
            stage.transform(&mut transformed, &self.settings)?;
        }
        Ok(transformed)
    }

    /// Generate a class that no class file defines, then transform it
    ///
    /// Returns `None` if no generator knows the class. At most one generator may.
    pub fn generate(&self, class: &BinaryName) -> Result<Option<Class>, MixinError> {
        let applicable: Vec<&Arc<dyn ClassGenerator>> = self
            .generators
            .iter()
            .filter(|generator| generator.can_generate(class))
            .collect();
        let generator = match applicable.as_slice() {
            [] => return Ok(None),
            [generator] => generator,
            _ => {
                return Err(MixinError::new(
                    Tag::ENGINE,
                    MixinErrorCause::ConflictingGenerators,
                    vec![class.to_string(), applicable.len().to_string()],
                ))
            }
        };

        log::debug!("Generating {}", class);
        let generated = generator.generate(class)?;
        self.transform(&generated).map(Some)
    }
}
