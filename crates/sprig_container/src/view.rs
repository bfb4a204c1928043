//! The configurable container view handed to post-processors.
//!
//! A [`ContainerView`] is an exclusive borrow of the container's configuration
//! model that lives for one hook invocation. It exposes descriptor-level
//! inspection and mutation, alias and singleton registration, and hook
//! registration. It has no path that constructs a managed component: the one
//! instance-returning lookup, [`ContainerView::component`], only yields
//! singletons that were handed to the container already constructed.

use std::sync::Arc;

use crate::descriptor::{ComponentDescriptor, ComponentType};
use crate::error::ConfigError;
use crate::post_processor::{ContainerPostProcessor, PostProcessorEntry};
use crate::registry::DescriptorRegistry;
use crate::singleton::Singletons;

/// Descriptor-level access to the container during post-processing.
pub struct ContainerView<'a> {
    registry: &'a mut DescriptorRegistry,
    singletons: &'a Singletons,
    pending: &'a mut Vec<PostProcessorEntry>,
    processor: &'a str,
    declared_by: Option<&'a str>,
}

impl<'a> ContainerView<'a> {
    pub(crate) fn new(
        registry: &'a mut DescriptorRegistry,
        singletons: &'a Singletons,
        pending: &'a mut Vec<PostProcessorEntry>,
        processor: &'a str,
        declared_by: Option<&'a str>,
    ) -> Self {
        Self {
            registry,
            singletons,
            pending,
            processor,
            declared_by,
        }
    }

    /// Name of the hook currently running.
    #[must_use]
    pub fn current_processor(&self) -> &str {
        self.processor
    }

    /// Identity of the descriptor the running hook was built from, if it was
    /// declared as a descriptor rather than added directly.
    #[must_use]
    pub fn declaring_descriptor(&self) -> Option<&str> {
        self.declared_by
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Descriptor inspection
    // ─────────────────────────────────────────────────────────────────────────

    /// Looks up a descriptor by identity or alias.
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.registry.get(name)
    }

    /// Looks up a descriptor, failing if it is absent.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingDescriptor`] if nothing is registered under `name`.
    pub fn require_descriptor(&self, name: &str) -> Result<&ComponentDescriptor, ConfigError> {
        self.registry
            .get(name)
            .ok_or_else(|| ConfigError::MissingDescriptor(name.to_owned()))
    }

    /// Returns true if a descriptor is registered under `name`.
    #[must_use]
    pub fn contains_descriptor(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Identities of all descriptors, in registration order.
    #[must_use]
    pub fn descriptor_names(&self) -> Vec<String> {
        self.registry.names().map(str::to_owned).collect()
    }

    /// Number of registered descriptors.
    #[must_use]
    pub fn descriptor_count(&self) -> usize {
        self.registry.len()
    }

    /// Identities of descriptors with the given type token.
    #[must_use]
    pub fn names_for_type(&self, component_type: &ComponentType) -> Vec<String> {
        self.registry.names_for_type(component_type)
    }

    /// Iterates descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ComponentDescriptor> {
        self.registry.iter()
    }

    /// Aliases resolving to `name`.
    #[must_use]
    pub fn aliases_of(&self, name: &str) -> Vec<&str> {
        self.registry.aliases_of(name)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Descriptor mutation
    // ─────────────────────────────────────────────────────────────────────────

    /// Looks up a descriptor for mutation.
    ///
    /// The identity and aliases must survive the mutation: replacing the
    /// descriptor with one of another identity or alias list fails the hook
    /// once it returns.
    pub fn descriptor_mut(&mut self, name: &str) -> Option<&mut ComponentDescriptor> {
        self.registry.get_mut(name)
    }

    /// Looks up a descriptor for mutation, failing if it is absent.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingDescriptor`] if nothing is registered under `name`.
    pub fn require_descriptor_mut(
        &mut self,
        name: &str,
    ) -> Result<&mut ComponentDescriptor, ConfigError> {
        self.registry
            .get_mut(name)
            .ok_or_else(|| ConfigError::MissingDescriptor(name.to_owned()))
    }

    /// Iterates descriptors mutably in registration order.
    pub fn descriptors_mut(&mut self) -> impl Iterator<Item = &mut ComponentDescriptor> {
        self.registry.iter_mut()
    }

    /// Adds a descriptor.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DuplicateIdentity`] if the identity or one of its
    /// declared aliases is taken by a descriptor, alias, or singleton.
    pub fn register_descriptor(
        &mut self,
        descriptor: ComponentDescriptor,
    ) -> Result<(), ConfigError> {
        if let Some(taken) = core::iter::once(descriptor.id())
            .chain(descriptor.aliases().iter().map(String::as_str))
            .find(|name| self.singletons.contains(name))
        {
            return Err(ConfigError::DuplicateIdentity(taken.to_owned()));
        }
        self.registry.register(descriptor)
    }

    /// Removes a descriptor and its aliases.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingDescriptor`] if nothing is registered under `name`.
    pub fn remove_descriptor(&mut self, name: &str) -> Result<ComponentDescriptor, ConfigError> {
        self.registry.remove(name)
    }

    /// Registers another name for a descriptor.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingDescriptor`] if `name` does not resolve.
    /// - [`ConfigError::DuplicateIdentity`] if `alias` is taken.
    pub fn register_alias(
        &mut self,
        name: &str,
        alias: impl Into<String>,
    ) -> Result<(), ConfigError> {
        let alias = alias.into();
        if self.singletons.contains(&alias) {
            return Err(ConfigError::DuplicateIdentity(alias));
        }
        self.registry.register_alias(name, alias)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Singletons
    // ─────────────────────────────────────────────────────────────────────────

    /// Hands an already constructed instance to the container.
    ///
    /// Lookups of `id` return this instance and never run a factory.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DuplicateIdentity`] if `id` names a descriptor, an alias,
    /// or another singleton.
    pub fn register_singleton<T: Send + Sync + 'static>(
        &mut self,
        id: impl Into<String>,
        instance: T,
    ) -> Result<(), ConfigError> {
        let id = id.into();
        if self.registry.is_name_taken(&id) || !self.singletons.register(id.clone(), instance) {
            return Err(ConfigError::DuplicateIdentity(id));
        }
        tracing::debug!(singleton = %id, processor = %self.processor, "pre-registered singleton");
        Ok(())
    }

    /// Returns true if a pre-registered singleton exists under `id`.
    #[must_use]
    pub fn contains_singleton(&self, id: &str) -> bool {
        self.singletons.contains(id)
    }

    /// Returns a pre-registered singleton if it is a `T`.
    #[must_use]
    pub fn registered_singleton<T: Send + Sync + 'static>(&self, id: &str) -> Option<Arc<T>> {
        self.singletons.get::<T>(id)
    }

    /// Instance lookup as a hook would attempt it.
    ///
    /// Pre-registered singletons are returned since they need no
    /// construction. Anything backed by a descriptor is refused.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InstantiationForbidden`] if `name` resolves to a
    ///   descriptor or to a singleton of another type.
    /// - [`ConfigError::MissingDescriptor`] if nothing is registered under `name`.
    pub fn component<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ConfigError> {
        if let Some(instance) = self.singletons.get::<T>(name) {
            return Ok(instance);
        }
        let id = self.registry.canonical_name(name);
        if self.registry.contains(id) || self.singletons.contains(id) {
            tracing::warn!(
                component = %id,
                processor = %self.processor,
                "refused instance lookup during post-processing"
            );
            return Err(ConfigError::InstantiationForbidden(id.to_owned()));
        }
        Err(ConfigError::MissingDescriptor(name.to_owned()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Hook registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Registers another post-processor. It runs in the next round, ordered
    /// among the hooks registered in this round.
    pub fn register_post_processor(&mut self, processor: impl ContainerPostProcessor) {
        self.pending
            .push(PostProcessorEntry::new(Box::new(processor), None));
    }

    /// Registers another post-processor with an explicit priority.
    pub fn register_post_processor_with_priority(
        &mut self,
        processor: impl ContainerPostProcessor,
        priority: i32,
    ) {
        self.pending
            .push(PostProcessorEntry::new(Box::new(processor), Some(priority)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post_processor::post_processor_fn;
    use crate::value::Value;

    struct Fixture {
        registry: DescriptorRegistry,
        singletons: Singletons,
        pending: Vec<PostProcessorEntry>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut registry = DescriptorRegistry::new();
            registry
                .register(
                    ComponentDescriptor::new("db", "DataSource").with_property("url", "${DB_URL}"),
                )
                .unwrap();
            Self {
                registry,
                singletons: Singletons::new(),
                pending: Vec::new(),
            }
        }

        fn view(&mut self) -> ContainerView<'_> {
            ContainerView::new(
                &mut self.registry,
                &self.singletons,
                &mut self.pending,
                "test",
                None,
            )
        }
    }

    #[test]
    fn mutations_land_in_registry() {
        let mut fixture = Fixture::new();
        {
            let mut view = fixture.view();
            view.require_descriptor_mut("db")
                .unwrap()
                .set_property("url", "jdbc:mem://x");
            view.register_descriptor(ComponentDescriptor::new("cache", "Cache")).unwrap();
        }
        assert_eq!(
            fixture.registry.get("db").unwrap().property("url"),
            Some(&Value::from("jdbc:mem://x"))
        );
        assert!(fixture.registry.contains("cache"));
    }

    #[test]
    fn declaring_descriptor_is_reported() {
        let mut fixture = Fixture::new();
        let view = ContainerView::new(
            &mut fixture.registry,
            &fixture.singletons,
            &mut fixture.pending,
            "overrides",
            Some("overrides"),
        );
        assert_eq!(view.declaring_descriptor(), Some("overrides"));
        assert_eq!(fixture.view().declaring_descriptor(), None);
    }

    #[test]
    fn component_lookup_of_descriptor_is_refused() {
        let mut fixture = Fixture::new();
        let view = fixture.view();
        assert_eq!(
            view.component::<String>("db").unwrap_err(),
            ConfigError::InstantiationForbidden("db".into())
        );
        assert_eq!(
            view.component::<String>("nope").unwrap_err(),
            ConfigError::MissingDescriptor("nope".into())
        );
    }

    #[test]
    fn pre_registered_singleton_is_visible() {
        let mut fixture = Fixture::new();
        let mut view = fixture.view();
        view.register_singleton("clock", 7_u64).unwrap();
        assert_eq!(*view.component::<u64>("clock").unwrap(), 7);
        assert_eq!(*view.registered_singleton::<u64>("clock").unwrap(), 7);
        assert!(view.contains_singleton("clock"));
        assert_eq!(
            view.component::<String>("clock").unwrap_err(),
            ConfigError::InstantiationForbidden("clock".into())
        );
    }

    #[test]
    fn identities_are_unique_across_singletons_and_descriptors() {
        let mut fixture = Fixture::new();
        let mut view = fixture.view();
        view.register_singleton("clock", 1_u8).unwrap();

        assert_eq!(
            view.register_singleton("db", 1_u8).unwrap_err(),
            ConfigError::DuplicateIdentity("db".into())
        );
        assert_eq!(
            view.register_singleton("clock", 2_u8).unwrap_err(),
            ConfigError::DuplicateIdentity("clock".into())
        );
        assert_eq!(
            view.register_descriptor(ComponentDescriptor::new("clock", "Clock")).unwrap_err(),
            ConfigError::DuplicateIdentity("clock".into())
        );
        assert_eq!(
            view.register_alias("db", "clock").unwrap_err(),
            ConfigError::DuplicateIdentity("clock".into())
        );
    }

    #[test]
    fn registered_hooks_are_queued() {
        let mut fixture = Fixture::new();
        {
            let mut view = fixture.view();
            view.register_post_processor(post_processor_fn("late", |_| Ok(())));
            view.register_post_processor_with_priority(post_processor_fn("later", |_| Ok(())), 3);
        }
        assert_eq!(fixture.pending.len(), 2);
        assert_eq!(fixture.pending[0].name, "late");
        assert_eq!(fixture.pending[1].priority, Some(3));
    }
}
