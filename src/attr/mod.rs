pub mod evaluate;
pub mod expr;
pub mod hierarchy;
pub mod parse;

use std::{
    collections::BTreeMap,
    fmt,
    sync::Arc,
};

pub use evaluate::{EvalEnv, PlainEnv, evaluate};
pub use expr::{AttributeExpr, Operator};
pub use hierarchy::{Comparison, Hierarchy};

use crate::error::Result;

/// A value held by a requester or produced by evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueTerm {
    Bool(bool),
    Str(String),
}

impl ValueTerm {
    pub const TRUE: ValueTerm = ValueTerm::Bool(true);
    pub const FALSE: ValueTerm = ValueTerm::Bool(false);

    pub fn string(value: impl Into<String>) -> Self {
        ValueTerm::Str(value.into())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ValueTerm::Bool(b) => Some(*b),
            ValueTerm::Str(_) => None,
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, ValueTerm::Bool(true))
    }
}

impl From<bool> for ValueTerm {
    fn from(b: bool) -> Self {
        ValueTerm::Bool(b)
    }
}

impl From<&str> for ValueTerm {
    fn from(s: &str) -> Self {
        ValueTerm::Str(s.to_string())
    }
}

impl fmt::Display for ValueTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueTerm::Bool(b) => write!(f, "{b}"),
            ValueTerm::Str(s) if parse::is_bare_value(s) => f.write_str(s),
            ValueTerm::Str(s) => write_quoted(f, s),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

/// A named attribute. Cloning shares the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Attribute(Arc<str>);

impl Attribute {
    pub fn new(name: &str) -> Self {
        Attribute(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Attribute {
    fn from(name: &str) -> Self {
        Attribute::new(name)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if parse::is_bare_attribute(&self.0) {
            f.write_str(&self.0)
        } else {
            write_quoted(f, &self.0)
        }
    }
}

/// The attributes of one requester. Attributes may carry several values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeValueSet {
    values: BTreeMap<Attribute, Vec<ValueTerm>>,
}

impl AttributeValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `role=admin, role=engineer, manager`; a bare name means `name=true`.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(parse::parse_attribute_values(text)?.into_iter().collect())
    }

    pub fn add(&mut self, attribute: impl Into<Attribute>, value: impl Into<ValueTerm>) {
        let value = value.into();
        let entry = self.values.entry(attribute.into()).or_default();
        if !entry.contains(&value) {
            entry.push(value);
        }
    }

    /// Values for `attribute`, empty when the requester has none.
    pub fn get(&self, attribute: &Attribute) -> &[ValueTerm] {
        self.values
            .get(attribute)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_attribute(&self, attribute: &Attribute) -> bool {
        self.values.contains_key(attribute)
    }

    pub fn has(&self, attribute: &Attribute, value: &ValueTerm) -> bool {
        self.get(attribute).contains(value)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.values.keys()
    }

    pub fn merge(&mut self, other: &AttributeValueSet) {
        for (attribute, values) in &other.values {
            for value in values {
                self.add(attribute.clone(), value.clone());
            }
        }
    }

    pub fn clear_attribute(&mut self, attribute: &Attribute) {
        self.values.remove(attribute);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(Attribute, ValueTerm)> for AttributeValueSet {
    fn from_iter<I: IntoIterator<Item = (Attribute, ValueTerm)>>(iter: I) -> Self {
        let mut set = AttributeValueSet::new();
        for (attribute, value) in iter {
            set.add(attribute, value);
        }
        set
    }
}

impl fmt::Display for AttributeValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (attribute, values) in &self.values {
            for value in values {
                if !first {
                    f.write_str(", ")?;
                }
                first = false;
                write!(f, "{attribute}={value}")?;
            }
        }
        Ok(())
    }
}
