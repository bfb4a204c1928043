//! A component container with a definition post-processing phase.
//!
//! Components are described by descriptors; post-processors rewrite those
//! descriptors after loading and before anything is instantiated.
//!
//! - [`container`] - the container, descriptors, hooks and instantiation
//! - [`configurers`] - placeholder resolution, property overrides, logging setup

pub use sprig_configurers as configurers;
pub use sprig_container as container;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use sprig_configurers::{
        CompositePropertySource, EnvPropertySource, MapPropertySource, PlaceholderConfigurer,
        PropertyOverrideConfigurer, PropertySource, TracingFormat, TracingSetup,
    };
    pub use sprig_container::prelude::*;
}
