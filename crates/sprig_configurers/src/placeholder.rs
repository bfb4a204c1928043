//! `${...}` placeholder resolution over the configuration model.
//!
//! [`PlaceholderConfigurer`] rewrites every string in every descriptor,
//! replacing `${key}` with the value of `key` from a [`PropertySource`].
//! `${key:default}` falls back to `default` when the key is undefined.
//! Resolved values may contain placeholders themselves; they are resolved in
//! turn, and a key that reaches itself is reported as an error.
//!
//! # Example
//!
//! ```
//! use sprig_configurers::placeholder::PlaceholderConfigurer;
//! use sprig_configurers::source::MapPropertySource;
//! use sprig_container::prelude::*;
//!
//! let mut container = Container::new();
//! container
//!     .register_descriptor(
//!         ComponentDescriptor::new("db", "DataSource")
//!             .with_property("url", "jdbc:${db.vendor}://${db.host:localhost}/app")
//!             .lazy(),
//!     )
//!     .unwrap();
//! container
//!     .add_post_processors(PlaceholderConfigurer::new(
//!         MapPropertySource::new("app").with("db.vendor", "postgres"),
//!     ))
//!     .unwrap();
//! container.refresh().unwrap();
//!
//! assert_eq!(
//!     container.descriptor("db").unwrap().property("url"),
//!     Some(&Value::from("jdbc:postgres://localhost/app"))
//! );
//! ```

use sprig_container::descriptor::ComponentDescriptor;
use sprig_container::error::ConfigError;
use sprig_container::post_processor::ContainerPostProcessor;
use sprig_container::view::ContainerView;

use crate::source::PropertySource;

/// Default placeholder opening.
pub const DEFAULT_PREFIX: &str = "${";
/// Default placeholder closing.
pub const DEFAULT_SUFFIX: &str = "}";
/// Default separator between key and fallback value.
pub const DEFAULT_VALUE_SEPARATOR: &str = ":";

/// Replaces placeholders in descriptor strings before instantiation.
///
/// Visits the type token, constructor arguments, property values (including
/// list items), `depends_on` entries, and callback names. The descriptor
/// that declared this configurer, if any, is left untouched.
pub struct PlaceholderConfigurer {
    source: Box<dyn PropertySource>,
    prefix: String,
    suffix: String,
    value_separator: Option<String>,
    ignore_unresolvable: bool,
    priority: i32,
}

impl core::fmt::Debug for PlaceholderConfigurer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PlaceholderConfigurer")
            .field("source", &self.source.name())
            .field("prefix", &self.prefix)
            .field("suffix", &self.suffix)
            .field("value_separator", &self.value_separator)
            .field("ignore_unresolvable", &self.ignore_unresolvable)
            .field("priority", &self.priority)
            .finish()
    }
}

impl PlaceholderConfigurer {
    /// Resolves placeholders against `source` with the default syntax.
    pub fn new(source: impl PropertySource) -> Self {
        Self {
            source: Box::new(source),
            prefix: DEFAULT_PREFIX.to_owned(),
            suffix: DEFAULT_SUFFIX.to_owned(),
            value_separator: Some(DEFAULT_VALUE_SEPARATOR.to_owned()),
            ignore_unresolvable: false,
            priority: i32::MAX - 1,
        }
    }

    /// Sets the placeholder opening. Empty prefixes are ignored.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        if !prefix.is_empty() {
            self.prefix = prefix;
        }
        self
    }

    /// Sets the placeholder closing. Empty suffixes are ignored.
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        if !suffix.is_empty() {
            self.suffix = suffix;
        }
        self
    }

    /// Sets the key/default separator; `None` disables defaults.
    #[must_use]
    pub fn with_value_separator(mut self, separator: Option<&str>) -> Self {
        self.value_separator = separator.filter(|s| !s.is_empty()).map(str::to_owned);
        self
    }

    /// Leaves unresolvable placeholders in place instead of failing.
    #[must_use]
    pub fn ignore_unresolvable(mut self, ignore: bool) -> Self {
        self.ignore_unresolvable = ignore;
        self
    }

    /// Overrides the default priority of `i32::MAX - 1`.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Resolves every placeholder in `text`.
    ///
    /// `component` is only used in error messages.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnresolvablePlaceholder`] for an undefined key
    ///   without default, unless unresolvable placeholders are ignored.
    /// - [`ConfigError::Invalid`] for a placeholder that refers to itself.
    ///
    /// ```
    /// use sprig_configurers::placeholder::PlaceholderConfigurer;
    /// use sprig_configurers::source::MapPropertySource;
    ///
    /// let configurer = PlaceholderConfigurer::new(
    ///     MapPropertySource::new("m").with("env", "prod").with("host", "db-${env}"),
    /// );
    /// assert_eq!(configurer.resolve("${host}:${port:5432}", "db").unwrap(), "db-prod:5432");
    /// ```
    pub fn resolve(&self, text: &str, component: &str) -> Result<String, ConfigError> {
        self.resolve_nested(text, component, &mut Vec::new())
    }

    fn resolve_nested(
        &self,
        text: &str,
        component: &str,
        visiting: &mut Vec<String>,
    ) -> Result<String, ConfigError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(&self.prefix) {
            out.push_str(&rest[..start]);
            let body = &rest[start + self.prefix.len()..];
            let Some(end) = self.closing_index(body) else {
                // Unterminated: keep the remainder verbatim.
                out.push_str(&rest[start..]);
                return Ok(out);
            };
            let original = &rest[start..start + self.prefix.len() + end + self.suffix.len()];
            rest = &body[end + self.suffix.len()..];

            // The key itself may contain placeholders.
            let key = self.resolve_nested(&body[..end], component, visiting)?;
            if visiting.contains(&key) {
                let mut chain = visiting.clone();
                chain.push(key);
                return Err(ConfigError::invalid(format!(
                    "circular placeholder reference in component '{component}': {}",
                    chain.join(" -> ")
                )));
            }

            match self.lookup(&key) {
                Some(value) => {
                    visiting.push(key);
                    let resolved = self.resolve_nested(&value, component, visiting)?;
                    visiting.pop();
                    out.push_str(&resolved);
                }
                None if self.ignore_unresolvable => out.push_str(original),
                None => {
                    return Err(ConfigError::UnresolvablePlaceholder {
                        component: component.to_owned(),
                        placeholder: key,
                    });
                }
            }
        }

        out.push_str(rest);
        Ok(out)
    }

    /// Value for `key`, falling back to an inline default.
    fn lookup(&self, key: &str) -> Option<String> {
        if let Some(value) = self.source.get(key) {
            return Some(value);
        }
        let separator = self.value_separator.as_deref()?;
        let (name, default) = key.split_once(separator)?;
        Some(self.source.get(name).unwrap_or_else(|| default.to_owned()))
    }

    /// Index in `body` of the suffix closing the placeholder that opened just
    /// before `body`, skipping nested placeholders.
    fn closing_index(&self, body: &str) -> Option<usize> {
        let mut depth = 0_usize;
        let mut index = 0;
        while index < body.len() {
            let tail = &body[index..];
            if tail.starts_with(&self.suffix) {
                if depth == 0 {
                    return Some(index);
                }
                depth -= 1;
                index += self.suffix.len();
            } else if tail.starts_with(&self.prefix) {
                depth += 1;
                index += self.prefix.len();
            } else {
                index += tail.chars().next().map_or(1, char::len_utf8);
            }
        }
        None
    }

    fn resolve_descriptor(
        &self,
        descriptor: &mut ComponentDescriptor,
    ) -> Result<usize, ConfigError> {
        let id = descriptor.id().to_owned();
        let mut replaced = 0;
        let mut apply = |s: &mut String| -> Result<(), ConfigError> {
            if s.contains(&self.prefix) {
                let resolved = self.resolve(s, &id)?;
                if resolved != *s {
                    *s = resolved;
                    replaced += 1;
                }
            }
            Ok(())
        };

        descriptor.try_for_each_str_mut(&mut apply)?;
        for dependency in &mut descriptor.depends_on {
            apply(dependency)?;
        }
        for callback in [&mut descriptor.init_callback, &mut descriptor.destroy_callback]
            .into_iter()
            .flatten()
        {
            apply(callback)?;
        }
        Ok(replaced)
    }
}

impl ContainerPostProcessor for PlaceholderConfigurer {
    fn post_process(&self, view: &mut ContainerView<'_>) -> Result<(), ConfigError> {
        let own = view.declaring_descriptor().map(str::to_owned);
        let mut total = 0;
        for descriptor in view.descriptors_mut() {
            if own.as_deref() == Some(descriptor.id()) {
                continue;
            }
            let replaced = self.resolve_descriptor(descriptor)?;
            if replaced > 0 {
                tracing::debug!(component = %descriptor.id(), replaced, "resolved placeholders");
            }
            total += replaced;
        }
        tracing::info!(
            source = %self.source.name(),
            replaced = total,
            "placeholder resolution complete"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "PlaceholderConfigurer"
    }

    fn priority(&self) -> Option<i32> {
        Some(self.priority)
    }
}
