//! The component container for Sprig.
//!
//! `sprig_container` holds a configuration model of component descriptors and
//! turns it into live components, with a post-processing phase in between:
//!
//! - [`descriptor`] - Component descriptors, scopes and type tokens
//! - [`registry`] - The descriptor registry and alias table
//! - [`post_processor`] - The hook that rewrites the model before instantiation
//! - [`view`] - What a hook sees of the container
//! - [`container`] - Container lifecycle and component access
//! - [`factory`] - Per-type factories and their construction context
//!
//! # Example
//!
//! ```
//! use sprig_container::prelude::*;
//!
//! struct Greeter { greeting: String }
//!
//! let mut container = Container::new();
//! container.register_factory("Greeter", |c| {
//!     Ok(Greeter { greeting: c.str_property("greeting")?.to_owned() })
//! });
//! container
//!     .register_descriptor(
//!         ComponentDescriptor::new("greeter", "Greeter").with_property("greeting", "hi"),
//!     )
//!     .unwrap();
//! container
//!     .add_post_processors(post_processor_fn("shout", |view| {
//!         view.require_descriptor_mut("greeter")?.set_property("greeting", "HI");
//!         Ok(())
//!     }))
//!     .unwrap();
//!
//! container.refresh().unwrap();
//! assert_eq!(container.get::<Greeter>("greeter").unwrap().greeting, "HI");
//! ```

/// Container settings.
pub mod config;

/// Container lifecycle and component access.
pub mod container;

/// Component descriptors.
pub mod descriptor;

/// Error types.
pub mod error;

/// Component factories and construction context.
pub mod factory;

/// The definition post-processing hook.
pub mod post_processor;

/// Descriptor registry.
pub mod registry;

/// Pre-registered and created singleton instances.
pub mod singleton;

/// Property and argument values.
pub mod value;

/// The view handed to post-processors.
pub mod view;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::config::*;
    pub use crate::container::*;
    pub use crate::descriptor::*;
    pub use crate::error::*;
    pub use crate::factory::Construction;
    pub use crate::post_processor::{
        ContainerPostProcessor, FnPostProcessor, PostProcessorFactory, PostProcessors,
        post_processor_fn,
    };
    pub use crate::registry::*;
    pub use crate::singleton::*;
    pub use crate::value::*;
    pub use crate::view::*;
}
