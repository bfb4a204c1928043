//! Component descriptors: the unit of the configuration model.
//!
//! A [`ComponentDescriptor`] describes how to construct and configure one
//! managed component. Descriptors are produced by whoever loads the
//! configuration, may be changed freely by post-processors, and are frozen
//! once the container starts instantiating.
//!
//! # Example
//!
//! ```
//! use sprig_container::descriptor::{ComponentDescriptor, ComponentType, Scope};
//! use sprig_container::value::Value;
//!
//! let db = ComponentDescriptor::new("db", ComponentType::named("DataSource"))
//!     .with_property("url", "${DB_URL}")
//!     .with_property("pool", Value::reference("pool"))
//!     .with_scope(Scope::Singleton);
//!
//! assert_eq!(db.id(), "db");
//! assert_eq!(db.property("url").and_then(Value::as_str), Some("${DB_URL}"));
//! ```

use core::fmt;
use core::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::value::Value;

// ─────────────────────────────────────────────────────────────────────────────
// ComponentType
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque token naming the type of a component.
///
/// The token is not resolved during post-processing. It is matched against
/// registered factories only when the component is constructed, so hooks may
/// rewrite it freely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentType(String);

impl ComponentType {
    /// Creates a type token from a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Creates a type token from a Rust type's name.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(core::any::type_name::<T>().to_owned())
    }

    /// Returns the token's name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the token's name for in-place rewriting.
    pub fn name_mut(&mut self) -> &mut String {
        &mut self.0
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentType {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scope
// ─────────────────────────────────────────────────────────────────────────────

/// Instance sharing policy of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// One shared instance per container (default).
    #[default]
    Singleton,
    /// A new instance for every lookup.
    Prototype,
}

impl Scope {
    /// Returns the scope's canonical name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Singleton => "singleton",
            Self::Prototype => "prototype",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "singleton" | "" => Ok(Self::Singleton),
            "prototype" => Ok(Self::Prototype),
            other => Err(ConfigError::IllegalScope {
                scope: other.to_owned(),
                component: None,
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ComponentDescriptor
// ─────────────────────────────────────────────────────────────────────────────

/// Metadata describing how to construct and configure one managed component.
///
/// The identity and the alias set are owned by the
/// [`DescriptorRegistry`](crate::registry::DescriptorRegistry) so that
/// uniqueness can be enforced; every other field may be rewritten by a
/// post-processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    id: String,

    /// Type token resolved to a factory at construction time.
    #[serde(rename = "type")]
    pub component_type: ComponentType,

    /// Positional constructor arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constructor_args: Vec<Value>,

    /// Property assignments, in declaration order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Value>,

    /// Instance sharing policy.
    #[serde(default)]
    pub scope: Scope,

    /// When true, a singleton is created on first lookup instead of at startup.
    #[serde(default)]
    pub lazy_init: bool,

    /// Name of a callback to run after construction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_callback: Option<String>,

    /// Name of a callback to run when the container closes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destroy_callback: Option<String>,

    /// Components that must be created before this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    aliases: Vec<String>,
}

impl ComponentDescriptor {
    /// Creates a descriptor with default settings: eager singleton, no
    /// arguments, no properties.
    pub fn new(id: impl Into<String>, component_type: impl Into<ComponentType>) -> Self {
        Self {
            id: id.into(),
            component_type: component_type.into(),
            constructor_args: Vec::new(),
            properties: IndexMap::new(),
            scope: Scope::Singleton,
            lazy_init: false,
            init_callback: None,
            destroy_callback: None,
            depends_on: Vec::new(),
            description: None,
            aliases: Vec::new(),
        }
    }

    /// Returns the component identity.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the aliases registered for this component.
    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub(crate) fn aliases_mut(&mut self) -> &mut Vec<String> {
        &mut self.aliases
    }

    pub(crate) fn take_aliases(&mut self) -> Vec<String> {
        core::mem::take(&mut self.aliases)
    }

    /// Returns a property value.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Sets a property, returning the previous value.
    pub fn set_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Option<Value> {
        self.properties.insert(name.into(), value.into())
    }

    /// Removes a property, returning its value. Order of the remaining
    /// properties is preserved.
    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.properties.shift_remove(name)
    }

    /// Returns true for singleton scope.
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.scope == Scope::Singleton
    }

    /// Returns true when the component is created during startup.
    #[must_use]
    pub fn is_eager(&self) -> bool {
        self.is_singleton() && !self.lazy_init
    }

    /// Sets the scope from its textual name.
    ///
    /// # Errors
    ///
    /// [`ConfigError::IllegalScope`] for an unknown scope name.
    pub fn set_scope_name(&mut self, scope: &str) -> Result<(), ConfigError> {
        self.scope = scope.parse().map_err(|err| match err {
            ConfigError::IllegalScope { scope, .. } => ConfigError::IllegalScope {
                scope,
                component: Some(self.id.clone()),
            },
            other => other,
        })?;
        Ok(())
    }

    /// Every component identity this descriptor refers to, through
    /// `depends_on` and [`Value::Ref`] arguments or properties.
    #[must_use]
    pub fn referenced_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.depends_on.iter().map(String::as_str).collect();
        ids.extend(self.constructor_args.iter().flat_map(Value::references));
        ids.extend(self.properties.values().flat_map(Value::references));
        ids
    }

    /// Applies `f` to every string value of this descriptor: arguments,
    /// properties, and the type token.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn try_for_each_str_mut<E>(
        &mut self,
        mut f: impl FnMut(&mut String) -> Result<(), E>,
    ) -> Result<(), E> {
        f(self.component_type.name_mut())?;
        for arg in &mut self.constructor_args {
            arg.try_for_each_str_mut(&mut f)?;
        }
        for value in self.properties.values_mut() {
            value.try_for_each_str_mut(&mut f)?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends a constructor argument.
    #[must_use]
    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.constructor_args.push(value.into());
        self
    }

    /// Sets a property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_property(name, value);
        self
    }

    /// Sets the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Defers creation of a singleton until first lookup.
    #[must_use]
    pub fn lazy(mut self) -> Self {
        self.lazy_init = true;
        self
    }

    /// Sets the init callback name.
    #[must_use]
    pub fn with_init_callback(mut self, name: impl Into<String>) -> Self {
        self.init_callback = Some(name.into());
        self
    }

    /// Sets the destroy callback name.
    #[must_use]
    pub fn with_destroy_callback(mut self, name: impl Into<String>) -> Self {
        self.destroy_callback = Some(name.into());
        self
    }

    /// Adds an explicit creation dependency.
    #[must_use]
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declares an alias, registered together with the descriptor.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_eager_singleton() {
        let d = ComponentDescriptor::new("a", "A");
        assert_eq!(d.scope, Scope::Singleton);
        assert!(d.is_eager());
        assert!(!d.clone().lazy().is_eager());
        assert!(!d.with_scope(Scope::Prototype).is_eager());
    }

    #[test]
    fn scope_parsing() {
        assert_eq!("singleton".parse::<Scope>().unwrap(), Scope::Singleton);
        assert_eq!(" Prototype ".parse::<Scope>().unwrap(), Scope::Prototype);
        assert!(matches!(
            "request".parse::<Scope>(),
            Err(ConfigError::IllegalScope { ref scope, component: None }) if scope == "request"
        ));
    }

    #[test]
    fn set_scope_name_attributes_component() {
        let mut d = ComponentDescriptor::new("cart", "Cart");
        let err = d.set_scope_name("session").unwrap_err();
        assert_eq!(
            err,
            ConfigError::IllegalScope {
                scope: "session".into(),
                component: Some("cart".into()),
            }
        );
        d.set_scope_name("prototype").unwrap();
        assert_eq!(d.scope, Scope::Prototype);
    }

    #[test]
    fn remove_property_keeps_order() {
        let mut d = ComponentDescriptor::new("a", "A")
            .with_property("x", 1)
            .with_property("y", 2)
            .with_property("z", 3);
        assert_eq!(d.remove_property("y"), Some(Value::Int(2)));
        let keys: Vec<_> = d.properties.keys().cloned().collect();
        assert_eq!(keys, vec!["x", "z"]);
    }

    #[test]
    fn referenced_ids_cover_all_sources() {
        let d = ComponentDescriptor::new("svc", "Service")
            .depends_on("init")
            .with_arg(Value::reference("repo"))
            .with_property("peers", vec![Value::reference("p1"), Value::reference("p2")]);
        assert_eq!(d.referenced_ids(), vec!["init", "repo", "p1", "p2"]);
    }

    #[test]
    fn try_for_each_str_visits_type_args_and_properties() {
        let mut d = ComponentDescriptor::new("a", "${T}")
            .with_arg("${A}")
            .with_property("p", "${P}")
            .with_property("n", 1);
        let mut seen = Vec::new();
        d.try_for_each_str_mut(|s| {
            seen.push(s.clone());
            s.make_ascii_lowercase();
            Ok::<_, ()>(())
        })
        .unwrap();
        assert_eq!(seen, vec!["${T}", "${A}", "${P}"]);
        assert_eq!(d.component_type.as_str(), "${t}");
    }

    #[test]
    fn deserializes_with_defaults() {
        let d: ComponentDescriptor = serde_json::from_str(
            r#"{
                "id": "db",
                "type": "DataSource",
                "properties": { "url": { "str": "${DB_URL}" } },
                "aliases": ["database"]
            }"#,
        )
        .unwrap();
        assert_eq!(d.id(), "db");
        assert_eq!(d.component_type, ComponentType::named("DataSource"));
        assert_eq!(d.scope, Scope::Singleton);
        assert!(!d.lazy_init);
        assert_eq!(d.aliases(), ["database".to_string()]);
    }
}
