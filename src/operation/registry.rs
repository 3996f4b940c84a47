use crate::jvm::BinaryName;
use crate::tag::Tag;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Data that applies to a known set of classes
pub trait Targeted {
    fn targets(&self) -> &[BinaryName];
}

/// Store of operations, keyed by the declaration that registered them
pub trait OperationRegistry<T>: Send + Sync {
    fn register(&self, data: T, owner: &Tag);

    /// Remove (and return) everything the declaration registered
    fn unregister(&self, owner: &Tag) -> Vec<Arc<T>>;
}

/// Registry that data gets forwarded to, after being derived from the data of another
trait Dependency<T>: Send + Sync {
    fn register(&self, data: &T, owner: &Tag);
    fn unregister(&self, owner: &Tag);
}

struct Derived<U, F> {
    registry: Arc<dyn OperationRegistry<U>>,
    derive: F,
}

impl<T, U, F> Dependency<T> for Derived<U, F>
where
    F: Fn(&T) -> Vec<U> + Send + Sync,
{
    fn register(&self, data: &T, owner: &Tag) {
        for derived in (self.derive)(data) {
            self.registry.register(derived, owner);
        }
    }

    fn unregister(&self, owner: &Tag) {
        self.registry.unregister(owner);
    }
}

struct Entry<T> {
    owner: Tag,
    data: Arc<T>,
}

/// Registry of data looked up by target class
///
/// Registering data also registers whatever gets derived from it with the dependencies, under
/// the same owner. Unregistering an owner cascades the same way.
pub struct TargetedRegistry<T> {
    entries: Mutex<Vec<Entry<T>>>,
    dependencies: Vec<Box<dyn Dependency<T>>>,
}

impl<T> Default for TargetedRegistry<T> {
    fn default() -> Self {
        TargetedRegistry {
            entries: Mutex::new(vec![]),
            dependencies: vec![],
        }
    }
}

impl<T: Targeted + Send + Sync + 'static> TargetedRegistry<T> {
    pub fn new() -> TargetedRegistry<T> {
        TargetedRegistry::default()
    }

    /// Forward data derived from every registration to another registry
    pub fn with_dependency<U, F>(mut self, registry: Arc<dyn OperationRegistry<U>>, derive: F) -> Self
    where
        U: 'static,
        F: Fn(&T) -> Vec<U> + Send + Sync + 'static,
    {
        self.dependencies
            .push(Box::new(Derived { registry, derive }));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Data targeting the class, in registration order
    pub fn applicable(&self, class: &BinaryName) -> Vec<Arc<T>> {
        self.lock()
            .iter()
            .filter(|entry| entry.data.targets().contains(class))
            .map(|entry| entry.data.clone())
            .collect()
    }

    pub fn all(&self) -> Vec<Arc<T>> {
        self.lock().iter().map(|entry| entry.data.clone()).collect()
    }
}

impl<T: Targeted + Send + Sync + 'static> OperationRegistry<T> for TargetedRegistry<T> {
    fn register(&self, data: T, owner: &Tag) {
        let mut entries = self.lock();
        for dependency in &self.dependencies {
            dependency.register(&data, owner);
        }
        entries.push(Entry {
            owner: owner.clone(),
            data: Arc::new(data),
        });
    }

    fn unregister(&self, owner: &Tag) -> Vec<Arc<T>> {
        let mut entries = self.lock();
        for dependency in &self.dependencies {
            dependency.unregister(owner);
        }

        let (removed, kept): (Vec<Entry<T>>, Vec<Entry<T>>) = entries
            .drain(..)
            .partition(|entry| entry.owner == *owner);
        *entries = kept;
        log::debug!("Unregistered {} operations of '{}'", removed.len(), owner);
        removed.into_iter().map(|entry| entry.data).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::Name;

    #[derive(Debug, PartialEq)]
    struct Patch {
        name: &'static str,
        targets: Vec<BinaryName>,
    }

    impl Targeted for Patch {
        fn targets(&self) -> &[BinaryName] {
            &self.targets
        }
    }

    fn class(name: &str) -> BinaryName {
        BinaryName::from_string(String::from(name)).unwrap()
    }

    fn patch(name: &'static str, targets: &[&str]) -> Patch {
        Patch {
            name,
            targets: targets.iter().map(|target| class(target)).collect(),
        }
    }

    #[test]
    fn lookup_by_target() {
        let registry = TargetedRegistry::new();
        let owner = Tag::new("Mixin");
        registry.register(patch("first", &["a/A", "b/B"]), &owner);
        registry.register(patch("second", &["b/B"]), &owner);

        let names = |found: Vec<Arc<Patch>>| found.iter().map(|p| p.name).collect::<Vec<_>>();
        assert_eq!(names(registry.applicable(&class("a/A"))), vec!["first"]);
        assert_eq!(names(registry.applicable(&class("b/B"))), vec!["first", "second"]);
        assert!(registry.applicable(&class("c/C")).is_empty());
        assert_eq!(registry.all().len(), 2);
    }

    #[test]
    fn cascading() {
        let downstream: Arc<TargetedRegistry<Patch>> = Arc::new(TargetedRegistry::new());
        let upstream = TargetedRegistry::new().with_dependency(
            downstream.clone() as Arc<dyn OperationRegistry<Patch>>,
            |patch: &Patch| {
                vec![Patch {
                    name: "derived",
                    targets: patch.targets.clone(),
                }]
            },
        );

        let one = Tag::new("One");
        let two = Tag::new("Two");
        upstream.register(patch("a", &["x/X"]), &one);
        upstream.register(patch("b", &["x/X"]), &two);
        assert_eq!(downstream.applicable(&class("x/X")).len(), 2);

        let removed = upstream.unregister(&one);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].name, "a");
        assert_eq!(upstream.all().len(), 1);
        assert_eq!(downstream.all().len(), 1);

        // Unregistering again is harmless
        assert!(upstream.unregister(&one).is_empty());
        assert_eq!(downstream.all().len(), 1);
    }
}
