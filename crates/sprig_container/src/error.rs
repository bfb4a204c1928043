//! Error types for configuration and container lifecycle.
//!
//! Two families exist:
//!
//! - [`ConfigError`] - raised by post-processors and by the configuration
//!   model itself. This is what a hook returns.
//! - [`ContainerError`] - raised by the container while starting up or while
//!   producing instances. Hook failures are wrapped in
//!   [`ContainerError::PostProcessorFailed`] so the caller learns which hook
//!   raised them.

use crate::container::ContainerState;

/// A problem with the configuration model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A descriptor that was required is not registered.
    #[error("no component descriptor named '{0}'")]
    MissingDescriptor(String),

    /// A property that was required is not set on a descriptor.
    #[error("component '{component}' has no property '{property}'")]
    MissingProperty {
        /// The component identity.
        component: String,
        /// The property name.
        property: String,
    },

    /// A property holds a value of the wrong kind.
    #[error(
        "property '{property}' of component '{component}' expected {expected}, found {found}"
    )]
    PropertyTypeMismatch {
        /// The component identity.
        component: String,
        /// The property name (or `arg[n]` for constructor arguments).
        property: String,
        /// The expected value kind.
        expected: &'static str,
        /// The value kind actually found.
        found: &'static str,
    },

    /// An identity or alias is already in use.
    #[error("identity '{0}' is already in use")]
    DuplicateIdentity(String),

    /// A scope name is not one the container supports.
    #[error(
        "illegal scope '{scope}'{}",
        .component.as_deref().map(|c| format!(" on component '{c}'")).unwrap_or_default()
    )]
    IllegalScope {
        /// The offending scope name.
        scope: String,
        /// The component carrying it, when known.
        component: Option<String>,
    },

    /// A `${...}` placeholder could not be resolved.
    #[error("could not resolve placeholder '{placeholder}' in component '{component}'")]
    UnresolvablePlaceholder {
        /// The component identity.
        component: String,
        /// The placeholder key.
        placeholder: String,
    },

    /// A hook tried to realize a managed component during post-processing.
    #[error("component '{0}' cannot be instantiated during post-processing")]
    InstantiationForbidden(String),

    /// Any other configuration problem.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Invalid`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// A failure to start the container or to produce an instance.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContainerError {
    /// A post-processor returned an error; startup was aborted.
    #[error("post-processor '{processor}' failed: {source}")]
    PostProcessorFailed {
        /// Name of the hook that failed.
        processor: String,
        /// The error it returned.
        #[source]
        source: ConfigError,
    },

    /// The configuration model failed validation after post-processing.
    #[error("configuration validation failed: {0}")]
    Validation(#[from] ConfigError),

    /// The operation is not allowed in the container's current state.
    #[error("cannot {operation} while the container is {state:?}")]
    InvalidState {
        /// What was attempted.
        operation: &'static str,
        /// The state the container was in.
        state: ContainerState,
    },

    /// Hooks kept registering new hooks past the configured bound.
    #[error("post-processor discovery did not settle after {rounds} rounds")]
    DiscoveryLimitExceeded {
        /// The round limit that was hit.
        rounds: usize,
    },

    /// No component with this identity exists.
    #[error("no component named '{0}'")]
    NoSuchComponent(String),

    /// No factory is registered for a descriptor's component type.
    #[error("component '{component}' has type '{type_name}' but no factory is registered for it")]
    UnknownComponentType {
        /// The component identity.
        component: String,
        /// The unresolved type token.
        type_name: String,
    },

    /// An instance is not of the requested Rust type.
    #[error("component '{component}' is not a {expected}")]
    TypeMismatch {
        /// The component identity.
        component: String,
        /// The requested Rust type.
        expected: &'static str,
    },

    /// Creating a component requires itself.
    #[error("circular reference: {}", .0.join(" -> "))]
    CircularReference(Vec<String>),

    /// A factory failed to build a component.
    #[error("failed to construct component '{id}': {message}")]
    Construction {
        /// The component identity.
        id: String,
        /// What went wrong.
        message: String,
    },

    /// An init or destroy callback failed, or is not registered.
    #[error("callback '{callback}' of component '{id}' failed: {message}")]
    Callback {
        /// The component identity.
        id: String,
        /// The callback name.
        callback: String,
        /// What went wrong.
        message: String,
    },
}

impl ContainerError {
    /// Returns the configuration error underneath this error, if any.
    #[must_use]
    pub fn config_error(&self) -> Option<&ConfigError> {
        match self {
            Self::PostProcessorFailed { source, .. } | Self::Validation(source) => Some(source),
            _ => None,
        }
    }
}

/// Result alias for hook-facing operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result alias for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_processor_failure_names_the_hook() {
        let err = ContainerError::PostProcessorFailed {
            processor: "require-db".into(),
            source: ConfigError::MissingDescriptor("db".into()),
        };
        let message = err.to_string();
        assert!(message.contains("require-db"));
        assert!(message.contains("'db'"));
    }

    #[test]
    fn illegal_scope_message_includes_component_when_known() {
        let with = ConfigError::IllegalScope {
            scope: "session".into(),
            component: Some("cart".into()),
        };
        let without = ConfigError::IllegalScope {
            scope: "session".into(),
            component: None,
        };
        assert_eq!(with.to_string(), "illegal scope 'session' on component 'cart'");
        assert_eq!(without.to_string(), "illegal scope 'session'");
    }

    #[test]
    fn circular_reference_joins_path() {
        let err = ContainerError::CircularReference(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "circular reference: a -> b -> a");
    }

    #[test]
    fn config_error_accessor() {
        let err = ContainerError::Validation(ConfigError::invalid("bad"));
        assert_eq!(err.config_error(), Some(&ConfigError::Invalid("bad".into())));
        assert!(ContainerError::NoSuchComponent("x".into()).config_error().is_none());
    }
}
