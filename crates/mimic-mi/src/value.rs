use std::fmt;
use std::str::FromStr;

/// Value of a `variable=value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// C-string constant (already unescaped).
    Const(String),

    /// Tuple of `variable=value` pairs (`{...}`).
    Tuple(Fields),

    /// List of values or of `variable=value` pairs (`[...]`).
    List(List),
}

impl Value {
    /// Returns the string constant, if this value is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Const(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the tuple fields, if this value is a tuple.
    pub fn as_tuple(&self) -> Option<&Fields> {
        match self {
            Self::Tuple(fields) => Some(fields),
            _ => None,
        }
    }

    /// Returns the list, if this value is a list.
    pub fn as_list(&self) -> Option<&List> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }
}

/// A list value.
///
/// The protocol allows two list flavors: lists of bare values
/// (`["1","2"]`) and lists of results (`[frame={...},frame={...}]`). An
/// empty list (`[]`) is represented as an empty list of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum List {
    /// List of bare values.
    Values(Vec<Value>),

    /// List of `variable=value` pairs.
    Results(Fields),
}

impl List {
    /// Iterates over the values of the list, ignoring variable names of a
    /// result list.
    pub fn iter(&self) -> ListIter<'_> {
        match self {
            Self::Values(values) => ListIter::Values(values.iter()),
            Self::Results(fields) => ListIter::Results(fields.0.iter()),
        }
    }

    /// Number of elements in the list.
    pub fn len(&self) -> usize {
        match self {
            Self::Values(values) => values.len(),
            Self::Results(fields) => fields.len(),
        }
    }

    /// Returns whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Iterator over the values of a [List].
pub enum ListIter<'a> {
    #[allow(missing_docs)]
    Values(std::slice::Iter<'a, Value>),
    #[allow(missing_docs)]
    Results(std::slice::Iter<'a, (String, Value)>),
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Values(it) => it.next(),
            Self::Results(it) => it.next().map(|(_, v)| v),
        }
    }
}

/// Ordered `variable=value` pairs of a record or tuple.
///
/// Duplicate variable names are kept, since the backend emits them (e.g.,
/// `bkpt={...},bkpt={...}` inside a result list).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(pub(crate) Vec<(String, Value)>);

impl Fields {
    /// Creates an empty set of fields.
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a `variable=value` pair.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.0.push((name.into(), value));
    }

    /// Returns the first value with the given name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns all values with the given name.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.0.iter().filter(move |(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns the string constant with the given name.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Parses the string constant with the given name.
    pub fn parse<T: FromStr>(&self, name: &str) -> Option<T> {
        self.str(name).and_then(|s| s.parse().ok())
    }

    /// Returns the tuple with the given name.
    pub fn tuple(&self, name: &str) -> Option<&Fields> {
        self.get(name).and_then(Value::as_tuple)
    }

    /// Returns the list with the given name.
    pub fn list(&self, name: &str) -> Option<&List> {
        self.get(name).and_then(Value::as_list)
    }

    /// Iterates over the `variable=value` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether there is no pair.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, Value)> for Fields {
    fn from_iter<I: IntoIterator<Item = (N, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(n, v)| (n.into(), v)).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(s) => f.write_str(&crate::command::escape(s)),
            Self::Tuple(fields) => write!(f, "{{{fields}}}"),
            Self::List(List::Values(values)) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Self::List(List::Results(fields)) => write!(f, "[{fields}]"),
        }
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}
