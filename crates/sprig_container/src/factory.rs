//! Construction of managed components from their descriptors.
//!
//! Factories are registered per [`ComponentType`](crate::descriptor::ComponentType)
//! and receive a [`Construction`] giving typed access to the descriptor's
//! arguments and properties. References to other components are resolved
//! through the container while the factory runs.

use core::any::Any;
use std::sync::Arc;

use crate::container::Container;
use crate::descriptor::ComponentDescriptor;
use crate::error::{ConfigError, ContainerError, ContainerResult};
use crate::singleton::Instance;
use crate::value::Value;

/// Type-erased factory stored by the container.
pub(crate) struct FactoryEntry {
    pub(crate) build: Box<dyn Fn(&Construction<'_>) -> ContainerResult<Instance> + Send + Sync>,
    pub(crate) type_name: &'static str,
}

impl FactoryEntry {
    pub(crate) fn new<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Construction<'_>) -> ContainerResult<T> + Send + Sync + 'static,
    {
        Self {
            build: Box::new(move |ctx| factory(ctx).map(|value| Arc::new(value) as Instance)),
            type_name: core::any::type_name::<T>(),
        }
    }
}

/// Type-erased lifecycle callback stored by the container.
pub(crate) type CallbackFn =
    Box<dyn Fn(&(dyn Any + Send + Sync)) -> Result<(), String> + Send + Sync>;

pub(crate) fn erase_callback<T, E, F>(callback: F) -> CallbackFn
where
    T: Send + Sync + 'static,
    E: core::fmt::Display,
    F: Fn(&T) -> Result<(), E> + Send + Sync + 'static,
{
    Box::new(move |instance| match instance.downcast_ref::<T>() {
        Some(typed) => callback(typed).map_err(|err| err.to_string()),
        None => Err(format!(
            "callback expects {}",
            core::any::type_name::<T>()
        )),
    })
}

/// Everything a factory needs to build one component.
pub struct Construction<'a> {
    container: &'a Container,
    descriptor: &'a ComponentDescriptor,
    path: &'a [String],
}

impl<'a> Construction<'a> {
    pub(crate) fn new(
        container: &'a Container,
        descriptor: &'a ComponentDescriptor,
        path: &'a [String],
    ) -> Self {
        Self {
            container,
            descriptor,
            path,
        }
    }

    /// The component identity.
    #[must_use]
    pub fn id(&self) -> &str {
        self.descriptor.id()
    }

    /// The descriptor being constructed.
    #[must_use]
    pub fn descriptor(&self) -> &ComponentDescriptor {
        self.descriptor
    }

    /// Number of constructor arguments.
    #[must_use]
    pub fn arg_count(&self) -> usize {
        self.descriptor.constructor_args.len()
    }

    /// Positional constructor argument.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingProperty`] (named `arg[n]`) if out of range.
    pub fn arg(&self, index: usize) -> ContainerResult<&Value> {
        self.descriptor
            .constructor_args
            .get(index)
            .ok_or_else(|| self.missing(&format!("arg[{index}]")))
    }

    /// Positional string argument.
    ///
    /// # Errors
    ///
    /// Missing argument or wrong value kind.
    pub fn str_arg(&self, index: usize) -> ContainerResult<&str> {
        let value = self.arg(index)?;
        value
            .as_str()
            .ok_or_else(|| self.mismatch(&format!("arg[{index}]"), "string", value))
    }

    /// Positional integer argument.
    ///
    /// # Errors
    ///
    /// Missing argument or wrong value kind.
    pub fn int_arg(&self, index: usize) -> ContainerResult<i64> {
        let value = self.arg(index)?;
        value
            .as_int()
            .ok_or_else(|| self.mismatch(&format!("arg[{index}]"), "int", value))
    }

    /// Raw property value, if set.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.descriptor.property(name)
    }

    /// Property value that must be present.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingProperty`] if unset.
    pub fn require_property(&self, name: &str) -> ContainerResult<&Value> {
        self.property(name).ok_or_else(|| self.missing(name))
    }

    /// String property.
    ///
    /// # Errors
    ///
    /// Missing property or wrong value kind.
    pub fn str_property(&self, name: &str) -> ContainerResult<&str> {
        let value = self.require_property(name)?;
        value
            .as_str()
            .ok_or_else(|| self.mismatch(name, "string", value))
    }

    /// Integer property.
    ///
    /// # Errors
    ///
    /// Missing property or wrong value kind.
    pub fn int_property(&self, name: &str) -> ContainerResult<i64> {
        let value = self.require_property(name)?;
        value.as_int().ok_or_else(|| self.mismatch(name, "int", value))
    }

    /// Float property; integers are accepted.
    ///
    /// # Errors
    ///
    /// Missing property or wrong value kind.
    pub fn float_property(&self, name: &str) -> ContainerResult<f64> {
        let value = self.require_property(name)?;
        value
            .as_float()
            .ok_or_else(|| self.mismatch(name, "float", value))
    }

    /// Boolean property.
    ///
    /// # Errors
    ///
    /// Missing property or wrong value kind.
    pub fn bool_property(&self, name: &str) -> ContainerResult<bool> {
        let value = self.require_property(name)?;
        value.as_bool().ok_or_else(|| self.mismatch(name, "bool", value))
    }

    /// Resolves a [`Value::Ref`] property to the referenced component.
    ///
    /// # Errors
    ///
    /// Missing property, wrong value kind, or any error creating the target.
    pub fn reference<T: Send + Sync + 'static>(&self, name: &str) -> ContainerResult<Arc<T>> {
        let value = self.require_property(name)?;
        self.resolve(value, name)
    }

    /// Resolves every reference in a list property, in order.
    ///
    /// # Errors
    ///
    /// Missing property, a non-reference item, or any error creating a target.
    pub fn references<T: Send + Sync + 'static>(&self, name: &str) -> ContainerResult<Vec<Arc<T>>> {
        let value = self.require_property(name)?;
        let items = value
            .as_list()
            .ok_or_else(|| self.mismatch(name, "list", value))?;
        items.iter().map(|item| self.resolve(item, name)).collect()
    }

    /// Resolves a [`Value::Ref`] constructor argument.
    ///
    /// # Errors
    ///
    /// Missing argument, wrong value kind, or any error creating the target.
    pub fn arg_reference<T: Send + Sync + 'static>(&self, index: usize) -> ContainerResult<Arc<T>> {
        let value = self.arg(index)?;
        self.resolve(value, &format!("arg[{index}]"))
    }

    fn resolve<T: Send + Sync + 'static>(
        &self,
        value: &Value,
        label: &str,
    ) -> ContainerResult<Arc<T>> {
        let target = value
            .as_reference()
            .ok_or_else(|| self.mismatch(label, "reference", value))?;
        self.container.resolve_typed::<T>(target, self.path)
    }

    fn missing(&self, property: &str) -> ContainerError {
        ConfigError::MissingProperty {
            component: self.id().to_owned(),
            property: property.to_owned(),
        }
        .into()
    }

    fn mismatch(&self, property: &str, expected: &'static str, found: &Value) -> ContainerError {
        ConfigError::PropertyTypeMismatch {
            component: self.id().to_owned(),
            property: property.to_owned(),
            expected,
            found: found.kind(),
        }
        .into()
    }
}
