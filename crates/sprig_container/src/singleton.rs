//! Storage for shared component instances.
//!
//! [`Singletons`] holds instances keyed by component identity. Entries come
//! from two places:
//!
//! - **Pre-registered** - constructed outside the container and handed to it,
//!   either before startup or by a post-processor. These bypass factories.
//! - **Created** - built by the container from a singleton-scoped descriptor.
//!
//! Insertion order is retained so that created singletons can be torn down in
//! reverse creation order.

use core::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

/// A type-erased shared instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// How a singleton came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingletonOrigin {
    /// Handed to the container already constructed.
    PreRegistered,
    /// Built by the container from a descriptor.
    Created,
}

/// Internal storage for a single instance.
struct SingletonEntry {
    instance: Instance,
    type_name: &'static str,
    origin: SingletonOrigin,
}

/// Thread-safe map from identity to shared instance.
///
/// Read-only outside the crate: instances enter through
/// [`Container::register_singleton`](crate::container::Container::register_singleton),
/// [`ContainerView::register_singleton`](crate::view::ContainerView::register_singleton)
/// or creation, and leave only when the container closes.
///
/// # Example
///
/// ```
/// use sprig_container::container::Container;
///
/// struct Clock { offset: i64 }
///
/// let mut container = Container::new();
/// container.register_singleton("clock", Clock { offset: 5 }).unwrap();
///
/// let clock = container.singletons().get::<Clock>("clock").unwrap();
/// assert_eq!(clock.offset, 5);
/// ```
#[derive(Default)]
pub struct Singletons {
    entries: RwLock<IndexMap<String, SingletonEntry>>,
}

impl core::fmt::Debug for Singletons {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let entries = self.entries.read();
        f.debug_map()
            .entries(entries.iter().map(|(id, e)| (id, e.type_name)))
            .finish()
    }
}

impl Singletons {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an already constructed instance.
    ///
    /// Returns `false` and leaves the store untouched if `id` is taken.
    pub(crate) fn register<T: Send + Sync + 'static>(
        &self,
        id: impl Into<String>,
        instance: T,
    ) -> bool {
        self.insert_arc(
            id.into(),
            Arc::new(instance),
            core::any::type_name::<T>(),
            SingletonOrigin::PreRegistered,
        )
    }

    /// Inserts a type-erased instance.
    ///
    /// Returns `false` and leaves the store untouched if `id` is taken.
    pub(crate) fn insert_arc(
        &self,
        id: String,
        instance: Instance,
        type_name: &'static str,
        origin: SingletonOrigin,
    ) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(
            id,
            SingletonEntry {
                instance,
                type_name,
                origin,
            },
        );
        true
    }

    /// Returns the type-erased instance registered under `id`.
    #[must_use]
    pub fn get_erased(&self, id: &str) -> Option<Instance> {
        self.entries.read().get(id).map(|e| Arc::clone(&e.instance))
    }

    /// Returns the instance registered under `id` if it is a `T`.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, id: &str) -> Option<Arc<T>> {
        self.get_erased(id)
            .and_then(|instance| instance.downcast::<T>().ok())
    }

    /// Returns the Rust type name of the instance under `id`.
    #[must_use]
    pub fn type_name(&self, id: &str) -> Option<&'static str> {
        self.entries.read().get(id).map(|e| e.type_name)
    }

    /// Returns how the instance under `id` came to exist.
    #[must_use]
    pub fn origin(&self, id: &str) -> Option<SingletonOrigin> {
        self.entries.read().get(id).map(|e| e.origin)
    }

    /// Returns true if an instance is registered under `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Returns identities in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns identities of container-created instances, in creation order.
    #[must_use]
    pub fn created(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|(_, e)| e.origin == SingletonOrigin::Created)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Removes every instance.
    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of stored instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no instances are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
