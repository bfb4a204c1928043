//! Container settings.

use serde::{Deserialize, Serialize};

/// Settings that govern container startup.
///
/// Build with the `with_*` methods or deserialize; missing fields take their
/// defaults.
///
/// ```
/// use sprig_container::config::ContainerConfig;
///
/// let config: ContainerConfig =
///     serde_json::from_str(r#"{ "max_discovery_rounds": 3 }"#).unwrap();
/// assert_eq!(config.max_discovery_rounds, 3);
/// assert!(config.pre_instantiate_singletons);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Registering an existing identity replaces the descriptor instead of failing.
    pub allow_definition_overriding: bool,

    /// Upper bound on post-processor rounds. Each round runs the hooks that
    /// were registered or discovered during the previous one.
    pub max_discovery_rounds: usize,

    /// Create eager singletons during startup.
    pub pre_instantiate_singletons: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            allow_definition_overriding: false,
            max_discovery_rounds: 10,
            pre_instantiate_singletons: true,
        }
    }
}

impl ContainerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets [`allow_definition_overriding`](Self::allow_definition_overriding).
    #[must_use]
    pub fn with_definition_overriding(mut self, allow: bool) -> Self {
        self.allow_definition_overriding = allow;
        self
    }

    /// Sets [`max_discovery_rounds`](Self::max_discovery_rounds).
    #[must_use]
    pub fn with_max_discovery_rounds(mut self, rounds: usize) -> Self {
        self.max_discovery_rounds = rounds;
        self
    }

    /// Sets [`pre_instantiate_singletons`](Self::pre_instantiate_singletons).
    #[must_use]
    pub fn with_pre_instantiation(mut self, enabled: bool) -> Self {
        self.pre_instantiate_singletons = enabled;
        self
    }
}
