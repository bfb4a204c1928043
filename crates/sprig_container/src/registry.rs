//! The descriptor registry: identity → [`ComponentDescriptor`].
//!
//! Iteration follows registration order and is stable for the duration of a
//! phase. Identities and aliases share one namespace; the registry refuses any
//! registration that would make a name ambiguous.

use hashbrown::HashMap;
use indexmap::IndexMap;

use crate::descriptor::{ComponentDescriptor, ComponentType};
use crate::error::ConfigError;

/// Upper bound on alias chain length.
const MAX_ALIAS_DEPTH: usize = 64;

/// Mapping from component identity to descriptor, plus the alias table.
///
/// # Example
///
/// ```
/// use sprig_container::descriptor::ComponentDescriptor;
/// use sprig_container::registry::DescriptorRegistry;
///
/// let mut registry = DescriptorRegistry::new();
/// registry.register(ComponentDescriptor::new("db", "DataSource")).unwrap();
/// registry.register_alias("db", "database").unwrap();
///
/// assert_eq!(registry.canonical_name("database"), "db");
/// assert!(registry.get("database").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DescriptorRegistry {
    descriptors: IndexMap<String, ComponentDescriptor>,
    /// alias → target (an identity or another alias).
    aliases: HashMap<String, String>,
    allow_overriding: bool,
}

impl DescriptorRegistry {
    /// Creates an empty registry that rejects duplicate identities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Controls whether registering an existing identity replaces the old
    /// descriptor instead of failing.
    pub fn set_allow_overriding(&mut self, allow: bool) {
        self.allow_overriding = allow;
    }

    /// Returns whether definition overriding is allowed.
    #[must_use]
    pub fn allows_overriding(&self) -> bool {
        self.allow_overriding
    }

    /// Registers a descriptor, along with any aliases it declares.
    ///
    /// When overriding is allowed and the identity exists, the descriptor is
    /// replaced in place and keeps its position and previously registered
    /// aliases.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DuplicateIdentity`] if the identity is taken by another
    /// descriptor (and overriding is off), is already an alias, or if a
    /// declared alias is taken.
    pub fn register(&mut self, mut descriptor: ComponentDescriptor) -> Result<(), ConfigError> {
        let id = descriptor.id().to_owned();
        if id.is_empty() {
            return Err(ConfigError::invalid("component identity must not be empty"));
        }
        if self.aliases.contains_key(&id) {
            return Err(ConfigError::DuplicateIdentity(id));
        }

        let declared = descriptor.take_aliases();
        for alias in &declared {
            if alias == &id || self.is_name_taken(alias) {
                return Err(ConfigError::DuplicateIdentity(alias.clone()));
            }
        }

        match self.descriptors.get_mut(&id) {
            Some(existing) if self.allow_overriding => {
                tracing::warn!(component = %id, "overriding component descriptor");
                *descriptor.aliases_mut() = existing.take_aliases();
                *existing = descriptor;
            }
            Some(_) => return Err(ConfigError::DuplicateIdentity(id)),
            None => {
                tracing::debug!(
                    component = %id,
                    component_type = %descriptor.component_type,
                    "registered component descriptor"
                );
                self.descriptors.insert(id.clone(), descriptor);
            }
        }

        for alias in declared {
            self.register_alias(&id, alias)?;
        }
        Ok(())
    }

    /// Removes a descriptor by identity or alias, together with every alias
    /// that resolves to it.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingDescriptor`] if nothing is registered under `name`.
    pub fn remove(&mut self, name: &str) -> Result<ComponentDescriptor, ConfigError> {
        let id = self.canonical_name(name).to_owned();
        let mut descriptor = self
            .descriptors
            .shift_remove(&id)
            .ok_or_else(|| ConfigError::MissingDescriptor(name.to_owned()))?;

        let dangling: Vec<String> = self
            .aliases
            .keys()
            .filter(|alias| self.canonical_name(alias) == id)
            .cloned()
            .collect();
        for alias in dangling {
            self.aliases.remove(&alias);
        }
        descriptor.aliases_mut().clear();

        tracing::debug!(component = %id, "removed component descriptor");
        Ok(descriptor)
    }

    /// Looks up a descriptor by identity or alias.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.descriptors.get(self.canonical_name(name))
    }

    /// Looks up a descriptor for mutation by identity or alias.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ComponentDescriptor> {
        let id = self.canonical_name(name).to_owned();
        self.descriptors.get_mut(&id)
    }

    /// Returns true if a descriptor is registered under `name` (identity or alias).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns true if `name` is used as an identity or an alias.
    #[must_use]
    pub fn is_name_taken(&self, name: &str) -> bool {
        self.descriptors.contains_key(name) || self.aliases.contains_key(name)
    }

    /// Resolves an alias chain to the identity it ends at.
    ///
    /// Names that are not aliases are returned unchanged.
    #[must_use]
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        let mut current = name;
        for _ in 0..MAX_ALIAS_DEPTH {
            match self.aliases.get(current) {
                Some(target) => current = target,
                None => break,
            }
        }
        current
    }

    /// Registers `alias` as another name for `name`.
    ///
    /// The target may be an identity or an existing alias. Registering the
    /// same alias for the same target twice is a no-op.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingDescriptor`] if `name` does not resolve.
    /// - [`ConfigError::DuplicateIdentity`] if `alias` is already used for a
    ///   different target or would form a cycle.
    pub fn register_alias(
        &mut self,
        name: &str,
        alias: impl Into<String>,
    ) -> Result<(), ConfigError> {
        let alias = alias.into();
        let target = self.canonical_name(name).to_owned();
        if !self.descriptors.contains_key(&target) {
            return Err(ConfigError::MissingDescriptor(name.to_owned()));
        }
        if let Some(existing) = self.aliases.get(&alias) {
            if self.canonical_name(existing) == target {
                return Ok(());
            }
            return Err(ConfigError::DuplicateIdentity(alias));
        }
        if alias == target || self.descriptors.contains_key(&alias) {
            return Err(ConfigError::DuplicateIdentity(alias));
        }

        self.aliases.insert(alias.clone(), target.clone());
        if let Some(descriptor) = self.descriptors.get_mut(&target) {
            descriptor.aliases_mut().push(alias);
        }
        Ok(())
    }

    /// Checks that every descriptor still carries the identity it is stored
    /// under and the aliases the alias table maps to it.
    ///
    /// Descriptors handed out through [`get_mut`](Self::get_mut) can be
    /// replaced wholesale; this catches replacements that changed the
    /// identity or the alias list.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::DuplicateIdentity`] if a descriptor now claims a name
    ///   already used by another descriptor or alias.
    /// - [`ConfigError::Invalid`] for any other identity or alias mismatch.
    pub fn check_identities(&self) -> Result<(), ConfigError> {
        for (key, descriptor) in &self.descriptors {
            let id = descriptor.id();
            if id != key.as_str() {
                if self.is_name_taken(id) {
                    return Err(ConfigError::DuplicateIdentity(id.to_owned()));
                }
                return Err(ConfigError::invalid(format!(
                    "descriptor `{key}` was replaced by one with identity `{id}`"
                )));
            }

            let registered = self
                .aliases
                .keys()
                .filter(|alias| self.canonical_name(alias) == key.as_str())
                .count();
            let declared = descriptor.aliases();
            let consistent = declared.len() == registered
                && declared.iter().all(|alias| {
                    self.aliases.contains_key(alias) && self.canonical_name(alias) == key.as_str()
                });
            if !consistent {
                return Err(ConfigError::invalid(format!(
                    "aliases of `{key}` no longer match the alias table"
                )));
            }
        }
        Ok(())
    }

    /// Returns every alias resolving to `name`.
    #[must_use]
    pub fn aliases_of(&self, name: &str) -> Vec<&str> {
        self.get(name)
            .map(|d| d.aliases().iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns all identities in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    /// Returns identities whose descriptor has the given type token.
    #[must_use]
    pub fn names_for_type(&self, component_type: &ComponentType) -> Vec<String> {
        self.descriptors
            .values()
            .filter(|d| &d.component_type == component_type)
            .map(|d| d.id().to_owned())
            .collect()
    }

    /// Iterates descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentDescriptor> {
        self.descriptors.values()
    }

    /// Iterates descriptors mutably in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ComponentDescriptor> {
        self.descriptors.values_mut()
    }

    /// Number of registered descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns true if no descriptors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn registry_with(ids: &[&str]) -> DescriptorRegistry {
        let mut registry = DescriptorRegistry::new();
        for id in ids {
            registry.register(ComponentDescriptor::new(*id, "T")).unwrap();
        }
        registry
    }

    #[test]
    fn iteration_follows_registration_order() {
        let registry = registry_with(&["c", "a", "b"]);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["c", "a", "b"]);
    }

    #[test]
    fn duplicate_identity_is_rejected() {
        let mut registry = registry_with(&["a"]);
        let err = registry.register(ComponentDescriptor::new("a", "Other")).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateIdentity("a".into()));
        assert_eq!(registry.get("a").unwrap().component_type.as_str(), "T");
    }

    #[test]
    fn overriding_replaces_in_place() {
        let mut registry = registry_with(&["a", "b"]);
        registry.register_alias("a", "alpha").unwrap();
        registry.set_allow_overriding(true);
        registry
            .register(ComponentDescriptor::new("a", "Other").with_property("x", 1))
            .unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "b"]);
        let a = registry.get("alpha").unwrap();
        assert_eq!(a.component_type.as_str(), "Other");
        assert_eq!(a.property("x"), Some(&Value::Int(1)));
        assert_eq!(a.aliases(), ["alpha".to_string()]);
    }

    #[test]
    fn identity_may_not_shadow_alias() {
        let mut registry = registry_with(&["a"]);
        registry.register_alias("a", "b").unwrap();
        let err = registry.register(ComponentDescriptor::new("b", "T")).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateIdentity("b".into()));
    }

    #[test]
    fn declared_aliases_are_registered() {
        let mut registry = DescriptorRegistry::new();
        registry
            .register(ComponentDescriptor::new("db", "T").with_alias("database").with_alias("ds"))
            .unwrap();
        assert_eq!(registry.canonical_name("ds"), "db");
        assert_eq!(registry.aliases_of("db"), vec!["database", "ds"]);
    }

    #[test]
    fn alias_chains_resolve() {
        let mut registry = registry_with(&["a"]);
        registry.register_alias("a", "b").unwrap();
        registry.register_alias("b", "c").unwrap();
        assert_eq!(registry.canonical_name("c"), "a");
        assert!(registry.contains("c"));
    }

    #[test]
    fn alias_conflicts() {
        let mut registry = registry_with(&["a", "x"]);
        registry.register_alias("a", "b").unwrap();
        // Same mapping again is fine.
        registry.register_alias("a", "b").unwrap();
        assert_eq!(
            registry.register_alias("x", "b").unwrap_err(),
            ConfigError::DuplicateIdentity("b".into())
        );
        assert_eq!(
            registry.register_alias("a", "x").unwrap_err(),
            ConfigError::DuplicateIdentity("x".into())
        );
        assert_eq!(
            registry.register_alias("a", "a").unwrap_err(),
            ConfigError::DuplicateIdentity("a".into())
        );
        assert_eq!(
            registry.register_alias("missing", "m").unwrap_err(),
            ConfigError::MissingDescriptor("missing".into())
        );
    }

    #[test]
    fn remove_drops_aliases() {
        let mut registry = registry_with(&["a", "b"]);
        registry.register_alias("a", "a1").unwrap();
        registry.register_alias("a1", "a2").unwrap();
        registry.register_alias("b", "b1").unwrap();

        let removed = registry.remove("a2").unwrap();
        assert_eq!(removed.id(), "a");
        assert!(!registry.contains("a"));
        assert!(!registry.is_name_taken("a1"));
        assert!(!registry.is_name_taken("a2"));
        assert!(registry.contains("b1"));

        // Freed names can be reused.
        registry.register(ComponentDescriptor::new("a1", "T")).unwrap();
    }

    #[test]
    fn remove_missing_fails() {
        let mut registry = DescriptorRegistry::new();
        assert_eq!(
            registry.remove("legacy").unwrap_err(),
            ConfigError::MissingDescriptor("legacy".into())
        );
    }

    #[test]
    fn names_for_type_filters() {
        let mut registry = registry_with(&["a"]);
        registry.register(ComponentDescriptor::new("b", "U")).unwrap();
        registry.register(ComponentDescriptor::new("c", "U")).unwrap();
        assert_eq!(registry.names_for_type(&ComponentType::named("U")), vec!["b", "c"]);
    }

    #[test]
    fn replaced_descriptor_fails_identity_check() {
        let mut registry = registry_with(&["a", "b"]);
        registry.check_identities().unwrap();

        *registry.get_mut("a").unwrap() = ComponentDescriptor::new("b", "T");
        assert_eq!(
            registry.check_identities().unwrap_err(),
            ConfigError::DuplicateIdentity("b".into())
        );

        *registry.get_mut("a").unwrap() = ComponentDescriptor::new("fresh", "T");
        assert!(matches!(
            registry.check_identities(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn replaced_descriptor_must_keep_aliases() {
        let mut registry = registry_with(&["a"]);
        registry.register_alias("a", "alpha").unwrap();

        // Same identity, aliases dropped.
        *registry.get_mut("a").unwrap() = ComponentDescriptor::new("a", "Other");
        assert!(matches!(
            registry.check_identities(),
            Err(ConfigError::Invalid(_))
        ));

        // Same identity, an alias the table never saw.
        *registry.get_mut("a").unwrap() = ComponentDescriptor::new("a", "Other")
            .with_alias("alpha")
            .with_alias("ghost");
        assert!(matches!(
            registry.check_identities(),
            Err(ConfigError::Invalid(_))
        ));

        *registry.get_mut("a").unwrap() =
            ComponentDescriptor::new("a", "Other").with_alias("alpha");
        registry.check_identities().unwrap();
    }

    #[test]
    fn empty_identity_is_invalid() {
        let mut registry = DescriptorRegistry::new();
        assert!(matches!(
            registry.register(ComponentDescriptor::new("", "T")),
            Err(ConfigError::Invalid(_))
        ));
    }
}
