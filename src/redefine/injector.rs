use super::{build_dispatcher, rewrite_call_sites, RedefinedMethod, RedefinitionMode};
use crate::errors::MixinError;
use crate::jvm::model::Class;
use crate::operation::{ClassTransformer, OperationParent, StageId, TargetedRegistry};
use crate::settings::Settings;
use std::sync::Arc;

/// Stage adding injected methods to their target classes
///
/// Depending on the redefinition mode, methods are either added directly or go through the
/// class's dispatchers (see [`build_dispatcher`]).
pub struct MethodInjector {
    registry: Arc<TargetedRegistry<RedefinedMethod>>,
}

impl Default for MethodInjector {
    fn default() -> Self {
        MethodInjector {
            registry: Arc::new(TargetedRegistry::new()),
        }
    }
}

impl MethodInjector {
    pub fn new() -> MethodInjector {
        MethodInjector::default()
    }

    pub fn registry(&self) -> Arc<TargetedRegistry<RedefinedMethod>> {
        self.registry.clone()
    }

    /// Add methods as they are, replacing existing methods with the same signature
    fn add_methods(class: &mut Class, methods: &[Arc<RedefinedMethod>]) {
        for redefined in methods {
            let signature = redefined.method.signature();
            let class_name = class.name.clone();
            match class.method_mut(&signature) {
                Some(existing) => {
                    log::debug!("Replacing {} in {}", signature, class_name);
                    *existing = redefined.method.clone();
                }
                None => {
                    log::debug!("Adding {} to {}", signature, class.name);
                    class.add_method(redefined.method.clone());
                }
            }
        }
    }

    /// Fold methods into dispatchers and point every call to them at the dispatchers
    fn dispatch_methods(
        class: &mut Class,
        methods: &[Arc<RedefinedMethod>],
        settings: &Settings,
    ) -> Result<(), MixinError> {
        for is_static in [false, true] {
            let group: Vec<Arc<RedefinedMethod>> = methods
                .iter()
                .filter(|redefined| redefined.method.is_static() == is_static)
                .cloned()
                .collect();
            if group.is_empty() {
                continue;
            }
            let name = settings.dispatcher_name(&class.name, is_static);
            let dispatcher = build_dispatcher(name, is_static, &group)?;
            match class.method_mut(&dispatcher.signature()) {
                Some(existing) => *existing = dispatcher,
                None => class.add_method(dispatcher),
            }
        }

        let redefined: Vec<&RedefinedMethod> = methods.iter().map(Arc::as_ref).collect();
        let class_name = class.name.clone();
        let mut rewritten = 0;
        for method in &mut class.methods {
            rewritten += rewrite_call_sites(method, &class_name, &redefined, settings)?;
        }
        log::debug!(
            "Dispatching {} methods in {} ({} call sites)",
            methods.len(),
            class_name,
            rewritten
        );
        Ok(())
    }
}

impl ClassTransformer for MethodInjector {
    fn id(&self) -> StageId {
        StageId::METHODS
    }

    fn parents(&self) -> Vec<OperationParent> {
        vec![]
    }

    fn transform(&self, class: &mut Class, settings: &Settings) -> Result<(), MixinError> {
        if class.is_interface() {
            return Ok(());
        }
        let methods = self.registry.applicable(&class.name);
        if methods.is_empty() {
            return Ok(());
        }

        match settings.redefinition {
            RedefinitionMode::Full | RedefinitionMode::None => {
                MethodInjector::add_methods(class, &methods);
                Ok(())
            }
            RedefinitionMode::OnlyInstructions => {
                MethodInjector::dispatch_methods(class, &methods, settings)
            }
        }
    }
}
