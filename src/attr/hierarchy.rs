use std::fmt;

use crate::{
    attr::{Attribute, ValueTerm, parse},
    error::{AbacError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Lt,
    Gt,
    /// At least one side is not declared in the hierarchy.
    None,
}

/// Ordered values of one attribute, lowest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    attribute: Attribute,
    values: Vec<ValueTerm>,
}

impl Hierarchy {
    pub fn new(attribute: Attribute, values: Vec<ValueTerm>) -> Result<Self> {
        let name = attribute.name();
        if name.is_empty() {
            return Err(AbacError::validation("hierarchy attribute name is empty"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(AbacError::validation(format!(
                "hierarchy attribute name contains whitespace: '{name}'"
            )));
        }
        if name.contains(':') {
            return Err(AbacError::validation(format!(
                "hierarchy attribute name contains ':': '{name}'"
            )));
        }
        for (i, value) in values.iter().enumerate() {
            if values[..i].contains(value) {
                return Err(AbacError::validation(format!(
                    "duplicate value {value} in hierarchy for '{name}'"
                )));
            }
        }
        Ok(Self { attribute, values })
    }

    /// Parse `clearance: public, restricted, secret`.
    pub fn parse(text: &str) -> Result<Self> {
        parse::parse_hierarchy(text)
    }

    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    pub fn values(&self) -> &[ValueTerm] {
        &self.values
    }

    /// Compare `a` to `b` by position.
    pub fn compare(&self, a: &ValueTerm, b: &ValueTerm) -> Comparison {
        let (Some(ia), Some(ib)) = (self.index_of(a), self.index_of(b)) else {
            return Comparison::None;
        };
        match ia.cmp(&ib) {
            std::cmp::Ordering::Less => Comparison::Lt,
            std::cmp::Ordering::Equal => Comparison::Eq,
            std::cmp::Ordering::Greater => Comparison::Gt,
        }
    }

    fn index_of(&self, value: &ValueTerm) -> Option<usize> {
        self.values.iter().position(|v| v == value)
    }
}

impl fmt::Display for Hierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.attribute)?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, " {value}")?;
        }
        Ok(())
    }
}
