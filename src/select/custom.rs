use crate::errors::{MixinError, MixinErrorCause};
use crate::jvm::model::{Class, Method};
use crate::tag::Tag;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};

/// Selector implemented outside of the engine
pub trait CustomSelector: Debug + Send + Sync {
    /// Indices of the matching instructions, in body order
    fn select(&self, method: &Method, class: &Class) -> Result<Vec<usize>, MixinError>;
}

type Factory = Box<dyn Fn(&[String]) -> Arc<dyn CustomSelector> + Send + Sync>;

/// Registry of custom selector factories
///
/// Selectors are created once per type name and option list, then shared between every
/// injection point that mentions them.
#[derive(Default)]
pub struct CustomSelectorCache {
    factories: HashMap<String, Factory>,
    instances: Mutex<HashMap<(String, Vec<String>), Arc<dyn CustomSelector>>>,
}

impl CustomSelectorCache {
    pub fn new() -> CustomSelectorCache {
        CustomSelectorCache::default()
    }

    /// Register a factory under a type name (replacing any previous one)
    pub fn register_factory<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&[String]) -> Arc<dyn CustomSelector> + Send + Sync + 'static,
    {
        let name = name.into();
        self.instances
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(instance_name, _), _| *instance_name != name);
        self.factories.insert(name, Box::new(factory));
    }

    /// Get (or create) the selector for a type name and option list
    pub fn get(&self, name: &str, options: &[String]) -> Result<Arc<dyn CustomSelector>, MixinError> {
        let factory = self.factories.get(name).ok_or_else(|| {
            MixinError::new(
                Tag::ENGINE,
                MixinErrorCause::UnknownCustomSelector,
                vec![name.to_owned()],
            )
        })?;

        let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        let selector = instances
            .entry((name.to_owned(), options.to_vec()))
            .or_insert_with(|| {
                log::debug!("Creating custom selector '{}' with {:?}", name, options);
                factory(options)
            });
        Ok(selector.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::Instruction;

    /// Selects every instruction whose index is a multiple of the given step
    #[derive(Debug)]
    struct EveryNth(usize);

    impl CustomSelector for EveryNth {
        fn select(&self, method: &Method, _class: &Class) -> Result<Vec<usize>, MixinError> {
            let len = method.body.as_ref().map_or(0, |body| body.instructions.len());
            Ok((0..len).step_by(self.0).collect())
        }
    }

    fn cache() -> CustomSelectorCache {
        let mut cache = CustomSelectorCache::new();
        cache.register_factory("every", |options| {
            let step = options
                .first()
                .and_then(|step| step.parse().ok())
                .unwrap_or(1);
            Arc::new(EveryNth(step))
        });
        cache
    }

    #[test]
    fn instances_are_shared() {
        let cache = cache();
        let two = vec![String::from("2")];
        let a = cache.get("every", &two).unwrap();
        let b = cache.get("every", &two).unwrap();
        let c = cache.get("every", &[]).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(format!("{:?}", a), "EveryNth(2)");
    }

    #[test]
    fn unknown_selector() {
        let err = cache().get("nope", &[]).unwrap_err();
        assert_eq!(err.cause, MixinErrorCause::UnknownCustomSelector);
        assert_eq!(err.message(), "No custom selector named 'nope' is registered.");
    }

    #[test]
    fn selection_goes_through_the_trait() {
        use crate::jvm::code::MethodBody;
        use crate::jvm::{BinaryName, ClassAccessFlags, MethodAccessFlags, MethodDescriptor};
        use crate::jvm::{Name, ParseDescriptor, UnqualifiedName};

        let class = Class::new(BinaryName::OBJECT, None, ClassAccessFlags::PUBLIC);
        let method = Method::new(
            MethodAccessFlags::STATIC,
            UnqualifiedName::from_string(String::from("f")).unwrap(),
            MethodDescriptor::parse("()V").unwrap(),
            Some(MethodBody::new(
                vec![Instruction::Nop, Instruction::Nop, Instruction::Nop, Instruction::Return],
                0,
                0,
            )),
        );
        let selector = cache().get("every", &[String::from("3")]).unwrap();
        assert_eq!(selector.select(&method, &class).unwrap(), vec![0, 3]);
    }
}
