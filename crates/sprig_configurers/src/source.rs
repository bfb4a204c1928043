//! Property sources consulted by the configurers.
//!
//! A [`PropertySource`] answers key lookups with string values. Three are
//! provided:
//!
//! - [`MapPropertySource`] - an ordered in-memory map, loadable from
//!   `key=value` text or from JSON
//! - [`EnvPropertySource`] - process environment variables
//! - [`CompositePropertySource`] - several sources, first hit wins

use indexmap::IndexMap;

use crate::error::SourceError;

// ─────────────────────────────────────────────────────────────────────────────
// PropertySource Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A named set of string properties.
pub trait PropertySource: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Looks up a property.
    fn get(&self, key: &str) -> Option<String>;

    /// Returns true if the property is defined.
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MapPropertySource
// ─────────────────────────────────────────────────────────────────────────────

/// Properties held in memory, in insertion order.
///
/// # Example
///
/// ```
/// use sprig_configurers::source::{MapPropertySource, PropertySource};
///
/// let source = MapPropertySource::parse_properties(
///     "app",
///     "# connection\ndb.url = jdbc:mem://x\ndb.pool: 4\n",
/// )
/// .unwrap();
///
/// assert_eq!(source.get("db.url").as_deref(), Some("jdbc:mem://x"));
/// assert_eq!(source.get("db.pool").as_deref(), Some("4"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapPropertySource {
    name: String,
    entries: IndexMap<String, String>,
}

impl MapPropertySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: IndexMap::new(),
        }
    }

    /// Adds a property, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds or replaces a property, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Parses `key=value` (or `key: value`) lines.
    ///
    /// Blank lines and lines starting with `#` or `!` are skipped. Keys and
    /// values are trimmed. Later lines replace earlier ones.
    ///
    /// # Errors
    ///
    /// [`SourceError::Syntax`] for a line with no separator or an empty key.
    pub fn parse_properties(name: impl Into<String>, text: &str) -> Result<Self, SourceError> {
        let mut source = Self::new(name);
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some(split) = line.find(['=', ':']) else {
                return Err(SourceError::Syntax {
                    line: index + 1,
                    message: format!("expected 'key=value', found '{line}'"),
                });
            };
            let key = line[..split].trim();
            if key.is_empty() {
                return Err(SourceError::Syntax {
                    line: index + 1,
                    message: "empty key".to_owned(),
                });
            }
            source.insert(key, line[split + 1..].trim());
        }
        Ok(source)
    }

    /// Loads a JSON object, flattening nested objects into dotted keys and
    /// arrays into `key[n]` keys.
    ///
    /// ```
    /// use sprig_configurers::source::{MapPropertySource, PropertySource};
    ///
    /// let source = MapPropertySource::from_json(
    ///     "json",
    ///     r#"{ "db": { "url": "jdbc:mem://x", "pool": 4 }, "hosts": ["a", "b"] }"#,
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(source.get("db.pool").as_deref(), Some("4"));
    /// assert_eq!(source.get("hosts[1]").as_deref(), Some("b"));
    /// ```
    ///
    /// # Errors
    ///
    /// [`SourceError::Json`] if the text is not JSON, [`SourceError::NotAnObject`]
    /// if the top level is not an object.
    pub fn from_json(name: impl Into<String>, text: &str) -> Result<Self, SourceError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let serde_json::Value::Object(root) = value else {
            return Err(SourceError::NotAnObject);
        };
        let mut source = Self::new(name);
        for (key, value) in root {
            source.flatten(key, value);
        }
        Ok(source)
    }

    fn flatten(&mut self, key: String, value: serde_json::Value) {
        match value {
            serde_json::Value::Object(map) => {
                for (child, value) in map {
                    self.flatten(format!("{key}.{child}"), value);
                }
            }
            serde_json::Value::Array(items) => {
                for (index, value) in items.into_iter().enumerate() {
                    self.flatten(format!("{key}[{index}]"), value);
                }
            }
            serde_json::Value::String(s) => {
                self.entries.insert(key, s);
            }
            serde_json::Value::Null => {
                self.entries.insert(key, String::new());
            }
            other => {
                self.entries.insert(key, other.to_string());
            }
        }
    }

    /// Iterates over the properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapPropertySource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut source = Self::new("map");
        for (key, value) in iter {
            source.insert(key, value);
        }
        source
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EnvPropertySource
// ─────────────────────────────────────────────────────────────────────────────

/// Properties read from environment variables.
///
/// A key is tried as written, then with `.` and `-` replaced by `_`, then
/// upper-cased, so `db.url` also finds `DB_URL`. An optional prefix is
/// prepended to every candidate.
#[derive(Debug, Clone, Default)]
pub struct EnvPropertySource {
    prefix: Option<String>,
}

impl EnvPropertySource {
    /// Reads variables without a prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only reads variables starting with `prefix`.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// The variable names tried for `key`, in order.
    #[must_use]
    pub fn candidates(&self, key: &str) -> Vec<String> {
        let underscored = key.replace(['.', '-'], "_");
        let upper = underscored.to_uppercase();
        let mut names = vec![key.to_owned()];
        for name in [underscored, upper] {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        match &self.prefix {
            Some(prefix) => names.into_iter().map(|n| format!("{prefix}{n}")).collect(),
            None => names,
        }
    }
}

impl PropertySource for EnvPropertySource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.candidates(key)
            .into_iter()
            .find_map(|name| std::env::var(name).ok())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CompositePropertySource
// ─────────────────────────────────────────────────────────────────────────────

/// Several sources consulted in order; the first one defining a key wins.
pub struct CompositePropertySource {
    name: String,
    sources: Vec<Box<dyn PropertySource>>,
}

impl core::fmt::Debug for CompositePropertySource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompositePropertySource")
            .field("name", &self.name)
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl CompositePropertySource {
    /// Creates an empty composite.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
        }
    }

    /// Appends a source with lower precedence than those already added.
    #[must_use]
    pub fn with_source(mut self, source: impl PropertySource) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Names of the contained sources, highest precedence first.
    #[must_use]
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

impl PropertySource for CompositePropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<String> {
        self.sources.iter().find_map(|source| source.get(key))
    }
}
