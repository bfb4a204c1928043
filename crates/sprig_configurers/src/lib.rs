//! Stock post-processors for Sprig containers.
//!
//! - [`PlaceholderConfigurer`] - resolves `${key}` and `${key:default}` in
//!   descriptor strings from a [`PropertySource`]
//! - [`PropertyOverrideConfigurer`] - assigns `component.property = value`
//!   overrides
//! - [`TracingSetup`] - installs a `tracing` subscriber for container logs
//!
//! # Example
//!
//! ```
//! use sprig_configurers::{
//!     CompositePropertySource, EnvPropertySource, MapPropertySource, PlaceholderConfigurer,
//!     PropertyOverrideConfigurer,
//! };
//! use sprig_container::prelude::*;
//!
//! let defaults = MapPropertySource::new("defaults").with("db.pool", "4");
//! let properties = CompositePropertySource::new("app")
//!     .with_source(EnvPropertySource::new().with_prefix("SPRIG_DOC_"))
//!     .with_source(defaults);
//!
//! let mut container = Container::new();
//! container
//!     .register_descriptor(
//!         ComponentDescriptor::new("pool", "Pool")
//!             .with_property("size", "${db.pool}")
//!             .with_property("name", "main")
//!             .lazy(),
//!     )
//!     .unwrap();
//! container
//!     .add_post_processors((
//!         PlaceholderConfigurer::new(properties),
//!         PropertyOverrideConfigurer::new().with("pool.name", "primary"),
//!     ))
//!     .unwrap();
//! container.refresh().unwrap();
//!
//! let pool = container.descriptor("pool").unwrap();
//! assert_eq!(pool.property("size"), Some(&Value::from("4")));
//! assert_eq!(pool.property("name"), Some(&Value::from("primary")));
//! ```

/// Property source loading errors.
pub mod error;

/// `${...}` placeholder resolution.
pub mod placeholder;

/// `component.property` overrides.
pub mod property_override;

/// Property sources.
pub mod source;

/// Subscriber setup.
pub mod tracing_setup;

pub use error::SourceError;
pub use placeholder::PlaceholderConfigurer;
pub use property_override::PropertyOverrideConfigurer;
pub use source::{CompositePropertySource, EnvPropertySource, MapPropertySource, PropertySource};
pub use tracing_setup::{TracingFormat, TracingSetup};
