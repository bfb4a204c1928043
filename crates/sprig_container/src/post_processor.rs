//! The definition post-processing hook.
//!
//! A [`ContainerPostProcessor`] receives a [`ContainerView`] after every
//! descriptor has been loaded and before any managed component is created. It
//! may add, remove, or rewrite descriptors, register aliases, pre-register
//! constructed singletons, and register further post-processors. It never sees
//! a managed instance.
//!
//! # Ordering
//!
//! Within a round, hooks that report a [`priority`](ContainerPostProcessor::priority)
//! run first, ascending. Hooks without a priority run afterwards. Ties and
//! unordered hooks keep registration order.
//!
//! # Example
//!
//! ```
//! use sprig_container::container::Container;
//! use sprig_container::descriptor::{ComponentDescriptor, Scope};
//! use sprig_container::error::ConfigError;
//! use sprig_container::post_processor::ContainerPostProcessor;
//! use sprig_container::view::ContainerView;
//!
//! struct PrototypeEverything;
//!
//! impl ContainerPostProcessor for PrototypeEverything {
//!     fn post_process(&self, view: &mut ContainerView<'_>) -> Result<(), ConfigError> {
//!         for descriptor in view.descriptors_mut() {
//!             descriptor.scope = Scope::Prototype;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut container = Container::new();
//! container.register_descriptor(ComponentDescriptor::new("a", "A")).unwrap();
//! container.add_post_processors(PrototypeEverything).unwrap();
//! container.refresh().unwrap();
//!
//! assert_eq!(container.descriptor("a").unwrap().scope, Scope::Prototype);
//! ```

use variadics_please::all_tuples;

use crate::descriptor::ComponentDescriptor;
use crate::error::ConfigError;
use crate::view::ContainerView;

// ─────────────────────────────────────────────────────────────────────────────
// ContainerPostProcessor Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A hook that modifies the configuration model before instantiation.
///
/// Invoked exactly once per container lifecycle, during
/// [`Container::refresh()`](crate::container::Container::refresh).
pub trait ContainerPostProcessor: Send + Sync + 'static {
    /// Inspects and modifies the configuration model.
    ///
    /// # Errors
    ///
    /// Returning an error aborts startup. The container reports it as
    /// [`ContainerError::PostProcessorFailed`](crate::error::ContainerError::PostProcessorFailed)
    /// naming this hook.
    fn post_process(&self, view: &mut ContainerView<'_>) -> Result<(), ConfigError>;

    /// Returns the hook's name for logs and error messages.
    ///
    /// Default implementation returns the type name.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Ordering key. Lower runs earlier; `None` runs after every ordered hook.
    fn priority(&self) -> Option<i32> {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FnPostProcessor
// ─────────────────────────────────────────────────────────────────────────────

/// A post-processor backed by a closure. Built with [`post_processor_fn`].
pub struct FnPostProcessor<F> {
    name: String,
    priority: Option<i32>,
    f: F,
}

impl<F> FnPostProcessor<F> {
    /// Sets the ordering key.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

impl<F> ContainerPostProcessor for FnPostProcessor<F>
where
    F: Fn(&mut ContainerView<'_>) -> Result<(), ConfigError> + Send + Sync + 'static,
{
    fn post_process(&self, view: &mut ContainerView<'_>) -> Result<(), ConfigError> {
        (self.f)(view)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> Option<i32> {
        self.priority
    }
}

/// Wraps a closure as a named post-processor.
///
/// ```
/// use sprig_container::post_processor::{post_processor_fn, ContainerPostProcessor};
///
/// let hook = post_processor_fn("drop-legacy", |view| {
///     view.remove_descriptor("legacy")?;
///     Ok(())
/// })
/// .with_priority(10);
///
/// assert_eq!(hook.name(), "drop-legacy");
/// assert_eq!(hook.priority(), Some(10));
/// ```
pub fn post_processor_fn<F>(name: impl Into<String>, f: F) -> FnPostProcessor<F>
where
    F: Fn(&mut ContainerView<'_>) -> Result<(), ConfigError> + Send + Sync + 'static,
{
    FnPostProcessor {
        name: name.into(),
        priority: None,
        f,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration entries
// ─────────────────────────────────────────────────────────────────────────────

/// A registered hook awaiting invocation.
pub(crate) struct PostProcessorEntry {
    /// Name used in logs and errors.
    pub(crate) name: String,
    /// Effective ordering key.
    pub(crate) priority: Option<i32>,
    /// The hook itself.
    pub(crate) processor: Box<dyn ContainerPostProcessor>,
    /// Identity of the descriptor the hook is rebuilt from before it runs.
    pub(crate) declared_by: Option<String>,
}

impl PostProcessorEntry {
    pub(crate) fn new(
        processor: Box<dyn ContainerPostProcessor>,
        priority: Option<i32>,
    ) -> Self {
        Self {
            name: processor.name().to_owned(),
            priority: priority.or_else(|| processor.priority()),
            processor,
            declared_by: None,
        }
    }

    /// Marks the entry as built from descriptor `id`, which also names it.
    pub(crate) fn declared_by(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.name.clone_from(&id);
        self.declared_by = Some(id);
        self
    }
}

/// Sorts entries into invocation order: ordered ascending, then unordered.
///
/// The sort is stable, so registration order breaks ties.
pub(crate) fn sort_for_invocation(entries: &mut [PostProcessorEntry]) {
    entries.sort_by_key(|e| (e.priority.is_none(), e.priority.unwrap_or_default()));
}

/// Builds a hook from a descriptor whose type is registered as a hook type.
pub type PostProcessorFactory = Box<
    dyn Fn(&ComponentDescriptor) -> Result<Box<dyn ContainerPostProcessor>, ConfigError>
        + Send
        + Sync,
>;

// ─────────────────────────────────────────────────────────────────────────────
// PostProcessors Trait (for add_post_processors polymorphism)
// ─────────────────────────────────────────────────────────────────────────────

/// Types that can be added to a container as post-processors.
///
/// Implemented for single hooks and for tuples of hooks, which are registered
/// left to right.
pub trait PostProcessors {
    /// Boxes the contained hooks in registration order.
    fn into_boxed(self) -> Vec<Box<dyn ContainerPostProcessor>>;
}

impl<P: ContainerPostProcessor> PostProcessors for P {
    fn into_boxed(self) -> Vec<Box<dyn ContainerPostProcessor>> {
        vec![Box::new(self)]
    }
}

macro_rules! impl_post_processors_for_tuple {
    ($($P:ident),*) => {
        impl<$($P: ContainerPostProcessor),*> PostProcessors for ($($P,)*) {
            #[expect(non_snake_case, reason = "tuple fields bound by type parameter name")]
            fn into_boxed(self) -> Vec<Box<dyn ContainerPostProcessor>> {
                let ($($P,)*) = self;
                vec![$(Box::new($P) as Box<dyn ContainerPostProcessor>),*]
            }
        }
    };
}

all_tuples!(impl_post_processors_for_tuple, 2, 16, P);
