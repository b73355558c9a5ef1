//! Named values attached to loggers and messages.

use std::{borrow::Cow, fmt};

use serde::{ser::SerializeSeq, Serialize, Serializer};
use serde_json::Value;

/// A name/value pair attached to a [`Logger`](crate::Logger) or a single
/// [`Message`](crate::Message).
///
/// Parameters keep their insertion order and names are not required to be unique; every pair
/// is rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    name: Cow<'static, str>,
    value: Value,
}

impl Param {
    /// Creates a new parameter.
    pub fn new(name: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parameter value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns a [`Display`](fmt::Display) adapter rendering only the value, the way the text
    /// engine prints it: strings verbatim, everything else as compact JSON.
    pub fn display_value(&self) -> DisplayValue<'_> {
        DisplayValue(&self.value)
    }
}

/// Renders `name(value)`.
impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.display_value())
    }
}

/// See [`Param::display_value`].
#[derive(Debug, Clone, Copy)]
pub struct DisplayValue<'a>(&'a Value);

impl fmt::Display for DisplayValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::String(value) => f.write_str(value),
            value => write!(f, "{value}"),
        }
    }
}

/// Serializes logger parameters followed by message parameters as one sequence.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChainedParams<'a> {
    pub(crate) first: &'a [Param],
    pub(crate) second: &'a [Param],
}

impl ChainedParams<'_> {
    pub(crate) fn is_empty(&self) -> bool {
        self.first.is_empty() && self.second.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Param> {
        self.first.iter().chain(self.second.iter())
    }
}

impl Serialize for ChainedParams<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.first.len() + self.second.len()))?;
        for param in self.iter() {
            seq.serialize_element(param)?;
        }
        seq.end()
    }
}
