//! Property overrides keyed by `component.property`.
//!
//! [`PropertyOverrideConfigurer`] takes entries such as
//! `dataSource.url = jdbc:mem://x` and assigns the value to the named
//! property of the named component, replacing whatever the descriptor
//! declared. The component name ends at the first `.`, so property names may
//! contain dots.
//!
//! Values are strings. When the property being replaced already holds a
//! boolean, integer, float or reference, the string is converted to the same
//! kind.

use indexmap::IndexMap;
use sprig_container::descriptor::ComponentDescriptor;
use sprig_container::error::ConfigError;
use sprig_container::post_processor::ContainerPostProcessor;
use sprig_container::value::Value;
use sprig_container::view::ContainerView;

use crate::source::MapPropertySource;

/// Separator between component name and property name.
pub const DEFAULT_SEPARATOR: char = '.';

/// Overrides descriptor properties from `component.property` entries.
///
/// # Example
///
/// ```
/// use sprig_configurers::property_override::PropertyOverrideConfigurer;
/// use sprig_container::prelude::*;
///
/// let mut container = Container::new();
/// container
///     .register_descriptor(
///         ComponentDescriptor::new("pool", "Pool").with_property("size", 4).lazy(),
///     )
///     .unwrap();
/// container
///     .add_post_processors(PropertyOverrideConfigurer::new().with("pool.size", "16"))
///     .unwrap();
/// container.refresh().unwrap();
///
/// assert_eq!(
///     container.descriptor("pool").unwrap().property("size"),
///     Some(&Value::Int(16))
/// );
/// ```
#[derive(Debug, Clone)]
pub struct PropertyOverrideConfigurer {
    entries: IndexMap<String, String>,
    ignore_invalid_keys: bool,
    priority: i32,
}

impl Default for PropertyOverrideConfigurer {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyOverrideConfigurer {
    /// Creates a configurer with no entries.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            ignore_invalid_keys: false,
            priority: i32::MAX,
        }
    }

    /// Takes every property of `source` as an override entry.
    #[must_use]
    pub fn from_source(source: &MapPropertySource) -> Self {
        source
            .iter()
            .fold(Self::new(), |configurer, (key, value)| configurer.with(key, value))
    }

    /// Builds a configurer from a descriptor whose string properties are the
    /// entries.
    ///
    /// Suitable as the builder passed to
    /// `Container::register_post_processor_type`.
    /// A boolean property named `ignoreInvalidKeys` sets
    /// [`ignore_invalid_keys`](Self::ignore_invalid_keys), and an integer
    /// property named `priority` sets the priority.
    ///
    /// # Errors
    ///
    /// [`ConfigError::PropertyTypeMismatch`] for a property that is neither a
    /// string nor one of the two settings.
    pub fn from_descriptor(descriptor: &ComponentDescriptor) -> Result<Self, ConfigError> {
        let mut configurer = Self::new();
        for (name, value) in &descriptor.properties {
            match (name.as_str(), value) {
                ("ignoreInvalidKeys", Value::Bool(ignore)) => {
                    configurer.ignore_invalid_keys = *ignore;
                }
                ("priority", Value::Int(priority)) => {
                    configurer.priority = i32::try_from(*priority).map_err(|_| {
                        ConfigError::invalid(format!(
                            "priority {priority} of '{}' is out of range",
                            descriptor.id()
                        ))
                    })?;
                }
                (_, Value::Str(raw)) => {
                    configurer.entries.insert(name.clone(), raw.clone());
                }
                (_, other) => {
                    return Err(ConfigError::PropertyTypeMismatch {
                        component: descriptor.id().to_owned(),
                        property: name.clone(),
                        expected: "string",
                        found: other.kind(),
                    });
                }
            }
        }
        Ok(configurer)
    }

    /// Adds an override entry, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Skips entries naming unknown components or lacking a separator instead
    /// of failing.
    #[must_use]
    pub fn ignore_invalid_keys(mut self, ignore: bool) -> Self {
        self.ignore_invalid_keys = ignore;
        self
    }

    /// Overrides the default priority of `i32::MAX`.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Number of override entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn apply(&self, view: &mut ContainerView<'_>, key: &str, raw: &str) -> Result<(), ConfigError> {
        let Some((component, property)) = key.split_once(DEFAULT_SEPARATOR) else {
            return Err(ConfigError::invalid(format!(
                "override key '{key}' must have the form 'component{DEFAULT_SEPARATOR}property'"
            )));
        };
        if component.is_empty() || property.is_empty() {
            return Err(ConfigError::invalid(format!(
                "override key '{key}' has an empty component or property name"
            )));
        }

        let descriptor = view.require_descriptor_mut(component)?;
        let value = convert(descriptor.property(property), raw).ok_or_else(|| {
            ConfigError::PropertyTypeMismatch {
                component: descriptor.id().to_owned(),
                property: property.to_owned(),
                expected: descriptor.property(property).map_or("string", Value::kind),
                found: "string",
            }
        })?;
        tracing::debug!(component = %descriptor.id(), property, "overriding property");
        descriptor.set_property(property, value);
        Ok(())
    }
}

/// Converts `raw` to the kind of `existing`; strings for anything else.
fn convert(existing: Option<&Value>, raw: &str) -> Option<Value> {
    let value = match existing {
        Some(Value::Bool(_)) => Value::Bool(raw.trim().parse().ok()?),
        Some(Value::Int(_)) => Value::Int(raw.trim().parse().ok()?),
        Some(Value::Float(_)) => Value::Float(raw.trim().parse().ok()?),
        Some(Value::Ref(_)) => Value::reference(raw.trim()),
        _ => Value::from(raw),
    };
    Some(value)
}

impl ContainerPostProcessor for PropertyOverrideConfigurer {
    fn post_process(&self, view: &mut ContainerView<'_>) -> Result<(), ConfigError> {
        let mut applied = 0;
        for (key, raw) in &self.entries {
            match self.apply(view, key, raw) {
                Ok(()) => applied += 1,
                Err(err @ (ConfigError::MissingDescriptor(_) | ConfigError::Invalid(_)))
                    if self.ignore_invalid_keys =>
                {
                    tracing::debug!(key = %key, error = %err, "skipping invalid override key");
                }
                Err(err) => return Err(err),
            }
        }
        tracing::info!(
            applied,
            skipped = self.entries.len() - applied,
            "property overrides applied"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "PropertyOverrideConfigurer"
    }

    fn priority(&self) -> Option<i32> {
        Some(self.priority)
    }
}
