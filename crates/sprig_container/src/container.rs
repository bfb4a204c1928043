//! The component container and its startup lifecycle.
//!
//! The [`Container`] owns the configuration model, the registered
//! post-processors, the factories that build components, and the instances it
//! has produced.
//!
//! # Lifecycle
//!
//! ```text
//! Loaded ─refresh()─▶ PostProcessing ─▶ PostProcessed ─▶ Instantiating ─▶ Active ─close()─▶ Closed
//!                          │                 │                │
//!                          └─────────────────┴────────────────┴─▶ Failed
//! ```
//!
//! 1. **Loaded** - descriptors, singletons, factories and hooks are registered.
//! 2. **Post-processing** - every hook runs once, in priority order, against a
//!    [`ContainerView`]. No managed component exists yet.
//! 3. **Validation** - references and dependencies must resolve. Descriptors
//!    are frozen from here on.
//! 4. **Instantiating** - eager singletons are created in registration order.
//! 5. **Active** - components are served by [`Container::get`].
//! 6. **Closed** - destroy callbacks ran in reverse creation order.
//!
//! A failure anywhere in 2–4 leaves the container `Failed`. A failing hook
//! means no component is ever instantiated.
//!
//! # Example
//!
//! ```
//! use sprig_container::container::Container;
//! use sprig_container::descriptor::ComponentDescriptor;
//! use sprig_container::post_processor::post_processor_fn;
//!
//! struct DataSource { url: String }
//!
//! let mut container = Container::new();
//! container.register_factory("DataSource", |c| {
//!     Ok(DataSource { url: c.str_property("url")?.to_owned() })
//! });
//! container
//!     .register_descriptor(
//!         ComponentDescriptor::new("db", "DataSource").with_property("url", "${DB_URL}"),
//!     )
//!     .unwrap();
//! container
//!     .add_post_processors(post_processor_fn("inline-url", |view| {
//!         view.require_descriptor_mut("db")?.set_property("url", "jdbc:mem://x");
//!         Ok(())
//!     }))
//!     .unwrap();
//!
//! container.refresh().unwrap();
//! assert_eq!(container.get::<DataSource>("db").unwrap().url, "jdbc:mem://x");
//! ```

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use parking_lot::{Mutex, ReentrantMutex};

use crate::config::ContainerConfig;
use crate::descriptor::{ComponentDescriptor, ComponentType};
use crate::error::{ConfigError, ContainerError, ContainerResult};
use crate::factory::{CallbackFn, Construction, FactoryEntry, erase_callback};
use crate::post_processor::{
    ContainerPostProcessor, PostProcessorEntry, PostProcessorFactory, PostProcessors,
    sort_for_invocation,
};
use crate::registry::DescriptorRegistry;
use crate::singleton::{Instance, SingletonOrigin, Singletons};
use crate::view::ContainerView;

// ─────────────────────────────────────────────────────────────────────────────
// ContainerState
// ─────────────────────────────────────────────────────────────────────────────

/// Where the container is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerState {
    /// Accepting registrations (initial state).
    #[default]
    Loaded,
    /// Post-processors are running.
    PostProcessing,
    /// Post-processors finished; the model is being validated.
    PostProcessed,
    /// Eager singletons are being created.
    Instantiating,
    /// Serving components.
    Active,
    /// Startup failed. Terminal.
    Failed,
    /// Shut down. Terminal.
    Closed,
}

impl ContainerState {
    /// Returns true while components may be produced.
    #[must_use]
    pub fn can_instantiate(self) -> bool {
        matches!(self, Self::Instantiating | Self::Active)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Container
// ─────────────────────────────────────────────────────────────────────────────

/// Owns descriptors, hooks, factories and instances.
///
/// `Container` is `Send + Sync`; once active, [`get`](Self::get) may be called
/// from several threads. Singleton creation is serialized so each singleton is
/// built exactly once.
pub struct Container {
    config: ContainerConfig,

    /// The configuration model.
    registry: DescriptorRegistry,

    /// Pre-registered and created singletons.
    singletons: Singletons,

    /// Hooks registered but not yet invoked.
    pending: Vec<PostProcessorEntry>,

    /// Builders for hooks declared as descriptors, keyed by type token.
    hook_types: HashMap<ComponentType, PostProcessorFactory>,

    /// Names of invoked hooks, in invocation order.
    invoked: Vec<String>,

    factories: HashMap<ComponentType, FactoryEntry>,

    /// Keyed by (type token, callback name).
    callbacks: HashMap<(ComponentType, String), CallbackFn>,

    /// Identities built by factories, in creation order.
    instantiated: Mutex<Vec<String>>,

    /// Held while a singleton is created. Reentrant so that a factory may
    /// resolve further singletons on the same thread.
    creation_lock: ReentrantMutex<()>,

    state: ContainerState,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Container {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Container")
            .field("state", &self.state)
            .field("descriptors", &self.registry.len())
            .field("singletons", &self.singletons)
            .field("pending_post_processors", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl Container {
    /// Creates an empty container with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    /// Creates an empty container with the given settings.
    #[must_use]
    pub fn with_config(config: ContainerConfig) -> Self {
        let mut registry = DescriptorRegistry::new();
        registry.set_allow_overriding(config.allow_definition_overriding);
        Self {
            config,
            registry,
            singletons: Singletons::new(),
            pending: Vec::new(),
            hook_types: HashMap::new(),
            invoked: Vec::new(),
            factories: HashMap::new(),
            callbacks: HashMap::new(),
            instantiated: Mutex::new(Vec::new()),
            creation_lock: ReentrantMutex::new(()),
            state: ContainerState::Loaded,
        }
    }

    /// The container's settings.
    #[must_use]
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ContainerState {
        self.state
    }

    /// Returns true once startup has completed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == ContainerState::Active
    }

    fn ensure_loaded(&self, operation: &'static str) -> ContainerResult<()> {
        if self.state == ContainerState::Loaded {
            Ok(())
        } else {
            Err(ContainerError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Model
    // ─────────────────────────────────────────────────────────────────────────

    /// Registers a descriptor.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::InvalidState`] after startup began.
    /// - [`ContainerError::Validation`] wrapping
    ///   [`ConfigError::DuplicateIdentity`] if the identity is taken.
    pub fn register_descriptor(&mut self, descriptor: ComponentDescriptor) -> ContainerResult<()> {
        self.ensure_loaded("register a descriptor")?;
        if let Some(taken) = core::iter::once(descriptor.id())
            .chain(descriptor.aliases().iter().map(String::as_str))
            .find(|name| self.singletons.contains(name))
        {
            return Err(ConfigError::DuplicateIdentity(taken.to_owned()).into());
        }
        self.registry.register(descriptor)?;
        Ok(())
    }

    /// Registers several descriptors, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Same as [`register_descriptor`](Self::register_descriptor).
    pub fn register_descriptors(
        &mut self,
        descriptors: impl IntoIterator<Item = ComponentDescriptor>,
    ) -> ContainerResult<()> {
        descriptors
            .into_iter()
            .try_for_each(|d| self.register_descriptor(d))
    }

    /// Registers another name for a descriptor.
    ///
    /// # Errors
    ///
    /// [`ContainerError::InvalidState`] after startup began, or the
    /// registry's alias errors wrapped in [`ContainerError::Validation`].
    pub fn register_alias(&mut self, name: &str, alias: impl Into<String>) -> ContainerResult<()> {
        self.ensure_loaded("register an alias")?;
        let alias = alias.into();
        if self.singletons.contains(&alias) {
            return Err(ConfigError::DuplicateIdentity(alias).into());
        }
        self.registry.register_alias(name, alias)?;
        Ok(())
    }

    /// Hands an already constructed instance to the container.
    ///
    /// # Errors
    ///
    /// [`ContainerError::InvalidState`] after startup began, or
    /// [`ConfigError::DuplicateIdentity`] if `id` is taken.
    pub fn register_singleton<T: Send + Sync + 'static>(
        &mut self,
        id: impl Into<String>,
        instance: T,
    ) -> ContainerResult<()> {
        self.ensure_loaded("register a singleton")?;
        let id = id.into();
        if self.registry.is_name_taken(&id) || !self.singletons.register(id.clone(), instance) {
            return Err(ConfigError::DuplicateIdentity(id).into());
        }
        Ok(())
    }

    /// Looks up a descriptor by identity or alias.
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.registry.get(name)
    }

    /// Looks up a descriptor for mutation before startup.
    ///
    /// # Errors
    ///
    /// [`ContainerError::InvalidState`] once startup began (descriptors are
    /// frozen), [`ContainerError::NoSuchComponent`] if absent.
    pub fn descriptor_mut(&mut self, name: &str) -> ContainerResult<&mut ComponentDescriptor> {
        self.ensure_loaded("modify a descriptor")?;
        self.registry
            .get_mut(name)
            .ok_or_else(|| ContainerError::NoSuchComponent(name.to_owned()))
    }

    /// Read access to the configuration model.
    #[must_use]
    pub fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }

    /// Read access to the singleton store.
    #[must_use]
    pub fn singletons(&self) -> &Singletons {
        &self.singletons
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Post-Processor Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Adds one post-processor, or a tuple of them in left-to-right order.
    ///
    /// # Errors
    ///
    /// [`ContainerError::InvalidState`] after startup began.
    ///
    /// # Example
    ///
    /// ```
    /// use sprig_container::container::Container;
    /// use sprig_container::post_processor::post_processor_fn;
    ///
    /// let mut container = Container::new();
    /// container
    ///     .add_post_processors((
    ///         post_processor_fn("first", |_| Ok(())),
    ///         post_processor_fn("second", |_| Ok(())),
    ///     ))
    ///     .unwrap();
    /// container.refresh().unwrap();
    /// assert_eq!(container.invoked_post_processors(), ["first", "second"]);
    /// ```
    pub fn add_post_processors<P: PostProcessors>(
        &mut self,
        processors: P,
    ) -> ContainerResult<&mut Self> {
        self.ensure_loaded("add a post-processor")?;
        self.pending.extend(
            processors
                .into_boxed()
                .into_iter()
                .map(|processor| PostProcessorEntry::new(processor, None)),
        );
        Ok(self)
    }

    /// Adds a post-processor with an explicit priority, overriding the one it
    /// reports.
    ///
    /// # Errors
    ///
    /// [`ContainerError::InvalidState`] after startup began.
    pub fn add_post_processor_with_priority(
        &mut self,
        processor: impl ContainerPostProcessor,
        priority: i32,
    ) -> ContainerResult<&mut Self> {
        self.ensure_loaded("add a post-processor")?;
        self.pending
            .push(PostProcessorEntry::new(Box::new(processor), Some(priority)));
        Ok(self)
    }

    /// Declares a type token as a hook type.
    ///
    /// During startup, every descriptor with this type is turned into a hook
    /// by `factory` and invoked like an explicitly added one, named after the
    /// descriptor. Such descriptors are never instantiated as components.
    ///
    /// # Errors
    ///
    /// [`ContainerError::InvalidState`] after startup began.
    pub fn register_post_processor_type<P, F>(
        &mut self,
        component_type: impl Into<ComponentType>,
        factory: F,
    ) -> ContainerResult<()>
    where
        P: ContainerPostProcessor,
        F: Fn(&ComponentDescriptor) -> Result<P, ConfigError> + Send + Sync + 'static,
    {
        self.ensure_loaded("register a post-processor type")?;
        self.hook_types.insert(
            component_type.into(),
            Box::new(move |descriptor| {
                factory(descriptor).map(|p| Box::new(p) as Box<dyn ContainerPostProcessor>)
            }),
        );
        Ok(())
    }

    /// Names of hooks that have run, in invocation order.
    #[must_use]
    pub fn invoked_post_processors(&self) -> &[String] {
        &self.invoked
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Factories and Callbacks
    // ─────────────────────────────────────────────────────────────────────────

    /// Registers the factory that builds components of a type token.
    ///
    /// Replaces any factory previously registered for the token.
    pub fn register_factory<T, F>(&mut self, component_type: impl Into<ComponentType>, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Construction<'_>) -> ContainerResult<T> + Send + Sync + 'static,
    {
        self.factories
            .insert(component_type.into(), FactoryEntry::new(factory));
    }

    /// Registers a named lifecycle callback for a type token.
    ///
    /// Descriptors refer to it through `init_callback` or `destroy_callback`.
    pub fn register_callback<T, E, F>(
        &mut self,
        component_type: impl Into<ComponentType>,
        name: impl Into<String>,
        callback: F,
    ) where
        T: Send + Sync + 'static,
        E: core::fmt::Display,
        F: Fn(&T) -> Result<(), E> + Send + Sync + 'static,
    {
        self.callbacks
            .insert((component_type.into(), name.into()), erase_callback(callback));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs startup: post-processing, validation, eager instantiation.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::InvalidState`] unless the container is `Loaded`.
    /// - [`ContainerError::PostProcessorFailed`] naming the first failing hook.
    /// - [`ContainerError::DiscoveryLimitExceeded`] if hooks keep registering hooks.
    /// - [`ContainerError::Validation`] for unresolved references.
    /// - Any instantiation error of an eager singleton.
    ///
    /// On error the container is left `Failed`.
    pub fn refresh(&mut self) -> ContainerResult<()> {
        self.ensure_loaded("refresh")?;
        let result = self.startup();
        if let Err(err) = &result {
            tracing::error!(error = %err, "container startup failed");
            self.state = ContainerState::Failed;
        }
        result
    }

    fn startup(&mut self) -> ContainerResult<()> {
        self.state = ContainerState::PostProcessing;
        self.invoke_post_processors()?;

        self.state = ContainerState::PostProcessed;
        self.validate()?;

        self.state = ContainerState::Instantiating;
        if self.config.pre_instantiate_singletons {
            self.pre_instantiate_singletons()?;
        }

        self.state = ContainerState::Active;
        tracing::info!(
            components = self.registry.len(),
            singletons = self.singletons.len(),
            "container active"
        );
        Ok(())
    }

    /// Runs hooks in rounds until no new ones are registered or discovered.
    fn invoke_post_processors(&mut self) -> ContainerResult<()> {
        self.registry.check_identities()?;

        let mut discovered: HashSet<String> = HashSet::new();
        let mut round = 0;

        loop {
            let mut batch = core::mem::take(&mut self.pending);
            batch.extend(self.discover_post_processors(&mut discovered)?);
            if batch.is_empty() {
                break;
            }

            round += 1;
            if round > self.config.max_discovery_rounds {
                return Err(ContainerError::DiscoveryLimitExceeded {
                    rounds: self.config.max_discovery_rounds,
                });
            }

            sort_for_invocation(&mut batch);
            tracing::info!(round, hooks = batch.len(), "invoking post-processors");

            for mut entry in batch {
                let span = tracing::debug_span!(
                    "post_process",
                    processor = %entry.name,
                    priority = ?entry.priority
                );
                let _enter = span.enter();

                if let Some(id) = entry.declared_by.as_deref() {
                    let Some(processor) = self.rebuild_declared(id)? else {
                        tracing::debug!("declaring descriptor removed, skipping post-processor");
                        discovered.remove(id);
                        continue;
                    };
                    entry.processor = processor;
                }

                let mut view = ContainerView::new(
                    &mut self.registry,
                    &self.singletons,
                    &mut self.pending,
                    &entry.name,
                    entry.declared_by.as_deref(),
                );
                let result = entry
                    .processor
                    .post_process(&mut view)
                    .and_then(|()| self.registry.check_identities());
                if let Err(source) = result {
                    tracing::error!(
                        processor = %entry.name,
                        error = %source,
                        "post-processor failed"
                    );
                    return Err(ContainerError::PostProcessorFailed {
                        processor: entry.name,
                        source,
                    });
                }
                tracing::debug!("post-processor completed");
                self.invoked.push(entry.name);
            }
        }

        tracing::info!(
            rounds = round,
            invoked = self.invoked.len(),
            "post-processing complete"
        );
        Ok(())
    }

    /// Builds hooks from descriptors of hook types not seen before.
    ///
    /// The built hooks fix the round's order. Each is built again from its
    /// descriptor right before it runs, see [`rebuild_declared`](Self::rebuild_declared).
    fn discover_post_processors(
        &self,
        seen: &mut HashSet<String>,
    ) -> ContainerResult<Vec<PostProcessorEntry>> {
        let mut found = Vec::new();
        for descriptor in self.registry.iter() {
            let Some(factory) = self.hook_types.get(&descriptor.component_type) else {
                continue;
            };
            if !seen.insert(descriptor.id().to_owned()) {
                continue;
            }
            let processor =
                factory(descriptor).map_err(|source| ContainerError::PostProcessorFailed {
                    processor: descriptor.id().to_owned(),
                    source,
                })?;
            tracing::debug!(processor = %descriptor.id(), "discovered post-processor descriptor");
            found.push(PostProcessorEntry::new(processor, None).declared_by(descriptor.id()));
        }
        Ok(found)
    }

    /// Builds a declared hook from the current state of its descriptor, so
    /// that rewrites by hooks earlier in the round take effect.
    ///
    /// Returns `None` if the descriptor was removed or no longer has a hook
    /// type.
    fn rebuild_declared(
        &self,
        id: &str,
    ) -> ContainerResult<Option<Box<dyn ContainerPostProcessor>>> {
        let Some(descriptor) = self.registry.get(id).filter(|d| d.id() == id) else {
            return Ok(None);
        };
        let Some(factory) = self.hook_types.get(&descriptor.component_type) else {
            return Ok(None);
        };
        factory(descriptor)
            .map(Some)
            .map_err(|source| ContainerError::PostProcessorFailed {
                processor: id.to_owned(),
                source,
            })
    }

    fn is_hook_descriptor(&self, descriptor: &ComponentDescriptor) -> bool {
        self.hook_types.contains_key(&descriptor.component_type)
    }

    /// Every reference and dependency must name a descriptor or singleton.
    fn validate(&self) -> ContainerResult<()> {
        for descriptor in self.registry.iter().filter(|d| !self.is_hook_descriptor(d)) {
            for target in descriptor.referenced_ids() {
                if !self.registry.contains(target) && !self.singletons.contains(target) {
                    tracing::error!(
                        component = %descriptor.id(),
                        missing = %target,
                        "unresolved reference"
                    );
                    return Err(ConfigError::MissingDescriptor(target.to_owned()).into());
                }
            }
        }
        Ok(())
    }

    fn pre_instantiate_singletons(&self) -> ContainerResult<()> {
        let eager: Vec<String> = self
            .registry
            .iter()
            .filter(|d| d.is_eager() && !self.is_hook_descriptor(d))
            .map(|d| d.id().to_owned())
            .collect();
        for id in eager {
            self.resolve(&id, &[])?;
        }
        Ok(())
    }

    /// Shuts the container down.
    ///
    /// Destroy callbacks of container-created singletons run in reverse
    /// creation order. A failing callback is logged and the rest still run.
    /// Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state == ContainerState::Closed {
            return;
        }

        for id in self.singletons.created().into_iter().rev() {
            let Some(descriptor) = self.registry.get(&id) else {
                continue;
            };
            let Some(callback) = descriptor.destroy_callback.as_deref() else {
                continue;
            };
            let Some(instance) = self.singletons.get_erased(&id) else {
                continue;
            };
            if let Err(err) = self.run_callback(descriptor, callback, &instance) {
                tracing::warn!(component = %id, error = %err, "destroy callback failed");
            }
        }

        self.singletons.clear();
        self.state = ContainerState::Closed;
        tracing::info!("container closed");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Instance Access
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the component named `name` (identity or alias).
    ///
    /// Singletons are built once and shared; prototypes are built on every
    /// call; pre-registered singletons are returned as handed in.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::InvalidState`] unless startup reached instantiation.
    /// - [`ContainerError::NoSuchComponent`] if nothing is registered.
    /// - [`ContainerError::TypeMismatch`] if the instance is not a `T`.
    /// - Any construction error.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> ContainerResult<Arc<T>> {
        self.resolve_typed(name, &[])
    }

    /// Type-erased variant of [`get`](Self::get).
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), minus the type check.
    pub fn get_erased(&self, name: &str) -> ContainerResult<Instance> {
        self.resolve(name, &[])
    }

    /// Returns true if `name` resolves to a descriptor or a singleton.
    #[must_use]
    pub fn contains_component(&self, name: &str) -> bool {
        self.registry.contains(name) || self.singletons.contains(name)
    }

    /// Identities built by factories so far, in creation order. Prototypes
    /// appear once per construction.
    #[must_use]
    pub fn instantiated(&self) -> Vec<String> {
        self.instantiated.lock().clone()
    }

    pub(crate) fn resolve_typed<T: Send + Sync + 'static>(
        &self,
        name: &str,
        path: &[String],
    ) -> ContainerResult<Arc<T>> {
        let instance = self.resolve(name, path)?;
        instance
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                component: self.registry.canonical_name(name).to_owned(),
                expected: core::any::type_name::<T>(),
            })
    }

    /// Resolves `name` to an instance. `path` holds the identities whose
    /// construction is in progress on this call chain.
    fn resolve(&self, name: &str, path: &[String]) -> ContainerResult<Instance> {
        if !self.state.can_instantiate() {
            return Err(ContainerError::InvalidState {
                operation: "instantiate a component",
                state: self.state,
            });
        }

        let id = self.registry.canonical_name(name);
        if let Some(instance) = self.singletons.get_erased(id) {
            return Ok(instance);
        }
        let descriptor = self
            .registry
            .get(id)
            .filter(|d| !self.is_hook_descriptor(d))
            .ok_or_else(|| ContainerError::NoSuchComponent(name.to_owned()))?;

        if path.iter().any(|p| p == id) {
            let mut cycle = path.to_vec();
            cycle.push(id.to_owned());
            return Err(ContainerError::CircularReference(cycle));
        }

        if descriptor.is_singleton() {
            let _guard = self.creation_lock.lock();
            // Another thread may have finished it while we waited.
            if let Some(instance) = self.singletons.get_erased(id) {
                return Ok(instance);
            }
            let (instance, type_name) = self.construct(descriptor, path)?;
            self.singletons.insert_arc(
                id.to_owned(),
                Arc::clone(&instance),
                type_name,
                SingletonOrigin::Created,
            );
            Ok(instance)
        } else {
            self.construct(descriptor, path).map(|(instance, _)| instance)
        }
    }

    fn construct(
        &self,
        descriptor: &ComponentDescriptor,
        path: &[String],
    ) -> ContainerResult<(Instance, &'static str)> {
        let id = descriptor.id();
        let mut path = path.to_vec();
        path.push(id.to_owned());

        for dependency in &descriptor.depends_on {
            self.resolve(dependency, &path)?;
        }

        let factory = self.factories.get(&descriptor.component_type).ok_or_else(|| {
            ContainerError::UnknownComponentType {
                component: id.to_owned(),
                type_name: descriptor.component_type.to_string(),
            }
        })?;

        let instance = (factory.build)(&Construction::new(self, descriptor, &path))?;
        self.instantiated.lock().push(id.to_owned());
        tracing::debug!(
            component = %id,
            component_type = %descriptor.component_type,
            scope = %descriptor.scope,
            "instantiated component"
        );

        if let Some(callback) = descriptor.init_callback.as_deref() {
            self.run_callback(descriptor, callback, &instance)?;
        }
        Ok((instance, factory.type_name))
    }

    fn run_callback(
        &self,
        descriptor: &ComponentDescriptor,
        callback: &str,
        instance: &Instance,
    ) -> ContainerResult<()> {
        let key = (descriptor.component_type.clone(), callback.to_owned());
        let run = self.callbacks.get(&key).ok_or_else(|| ContainerError::Callback {
            id: descriptor.id().to_owned(),
            callback: callback.to_owned(),
            message: format!(
                "no callback '{callback}' registered for type '{}'",
                descriptor.component_type
            ),
        })?;
        run(&**instance).map_err(|message| ContainerError::Callback {
            id: descriptor.id().to_owned(),
            callback: callback.to_owned(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post_processor::post_processor_fn;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn container_is_send_and_sync() {
        assert_send_sync::<Container>();
    }

    #[test]
    fn new_container_is_loaded_and_empty() {
        let container = Container::new();
        assert_eq!(container.state(), ContainerState::Loaded);
        assert!(container.registry().is_empty());
        assert!(container.invoked_post_processors().is_empty());
    }

    #[test]
    fn refresh_twice_is_rejected() {
        let mut container = Container::new();
        container.refresh().unwrap();
        let err = container.refresh().unwrap_err();
        assert!(matches!(
            err,
            ContainerError::InvalidState {
                state: ContainerState::Active,
                ..
            }
        ));
    }

    #[test]
    fn registration_is_closed_after_startup() {
        let mut container = Container::new();
        container.refresh().unwrap();

        assert!(matches!(
            container.register_descriptor(ComponentDescriptor::new("a", "A")),
            Err(ContainerError::InvalidState { .. })
        ));
        assert!(matches!(
            container.add_post_processors(post_processor_fn("late", |_| Ok(()))),
            Err(ContainerError::InvalidState { .. })
        ));
        assert!(matches!(
            container.register_singleton("s", 1_u8),
            Err(ContainerError::InvalidState { .. })
        ));
    }

    #[test]
    fn descriptors_are_frozen_after_startup() {
        let mut container = Container::new();
        container.register_factory("A", |_| Ok(1_u8));
        container
            .register_descriptor(ComponentDescriptor::new("a", "A"))
            .unwrap();
        container.descriptor_mut("a").unwrap().lazy_init = true;
        container.refresh().unwrap();

        assert!(matches!(
            container.descriptor_mut("a"),
            Err(ContainerError::InvalidState { .. })
        ));
        assert!(container.descriptor("a").unwrap().lazy_init);
    }

    #[test]
    fn get_before_refresh_is_rejected() {
        let mut container = Container::new();
        container.register_factory("A", |_| Ok(1_u8));
        container
            .register_descriptor(ComponentDescriptor::new("a", "A"))
            .unwrap();
        assert!(matches!(
            container.get::<u8>("a"),
            Err(ContainerError::InvalidState {
                state: ContainerState::Loaded,
                ..
            })
        ));
        assert!(container.instantiated().is_empty());
    }

    #[test]
    fn singleton_and_descriptor_identities_collide() {
        let mut container = Container::new();
        container.register_singleton("clock", 1_u8).unwrap();
        assert!(matches!(
            container.register_descriptor(ComponentDescriptor::new("clock", "Clock")),
            Err(ContainerError::Validation(ConfigError::DuplicateIdentity(_)))
        ));
        container
            .register_descriptor(ComponentDescriptor::new("db", "Db"))
            .unwrap();
        assert!(matches!(
            container.register_singleton("db", 1_u8),
            Err(ContainerError::Validation(ConfigError::DuplicateIdentity(_)))
        ));
        assert!(matches!(
            container.register_alias("db", "clock"),
            Err(ContainerError::Validation(ConfigError::DuplicateIdentity(_)))
        ));
    }

    #[test]
    fn close_is_idempotent() {
        let mut container = Container::new();
        container.refresh().unwrap();
        container.close();
        container.close();
        assert_eq!(container.state(), ContainerState::Closed);
    }
}
