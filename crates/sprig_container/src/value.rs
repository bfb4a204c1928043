//! Value expressions carried by component descriptors.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A value expression assigned to a constructor argument or property.
///
/// Values stay symbolic during post-processing. [`Value::Ref`] names another
/// component and is only resolved to an instance when the owning component is
/// constructed.
///
/// ```
/// use sprig_container::value::Value;
///
/// let url: Value = "jdbc:mem://x".into();
/// assert_eq!(url.as_str(), Some("jdbc:mem://x"));
///
/// let pool = Value::reference("pool");
/// assert_eq!(pool.as_reference(), Some("pool"));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// No value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string, possibly containing `${...}` placeholders.
    Str(String),
    /// The identity of another component.
    Ref(String),
    /// An ordered list of values.
    List(Vec<Value>),
}

impl Value {
    /// Creates a reference to the component with the given identity.
    pub fn reference(id: impl Into<String>) -> Self {
        Self::Ref(id.into())
    }

    /// Returns the name of this value's kind, for error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Ref(_) => "reference",
            Self::List(_) => "list",
        }
    }

    /// Returns the string if this is a [`Value::Str`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is a [`Value::Int`].
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the number if this is a [`Value::Float`] or [`Value::Int`].
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the boolean if this is a [`Value::Bool`].
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the referenced identity if this is a [`Value::Ref`].
    #[must_use]
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Self::Ref(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the items if this is a [`Value::List`].
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Collects every component identity referenced by this value,
    /// descending into lists.
    #[must_use]
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Ref(id) => out.push(id),
            Self::List(items) => items.iter().for_each(|v| v.collect_references(out)),
            _ => {}
        }
    }

    /// Applies `f` to every string in this value, descending into lists.
    ///
    /// Stops at the first error.
    pub fn try_for_each_str_mut<E>(
        &mut self,
        f: &mut impl FnMut(&mut String) -> Result<(), E>,
    ) -> Result<(), E> {
        match self {
            Self::Str(s) => f(s),
            Self::List(items) => items.iter_mut().try_for_each(|v| v.try_for_each_str_mut(f)),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Ref(id) => write!(f, "ref({id})"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}
