use std::fmt;

use crate::attr::{Attribute, ValueTerm};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Parsed form of a label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeExpr {
    /// Bare attribute: true when the requester holds `attribute=true`.
    Attr(Attribute),
    Relation {
        attribute: Attribute,
        op: Operator,
        value: ValueTerm,
    },
    And(Box<AttributeExpr>, Box<AttributeExpr>),
    Or(Box<AttributeExpr>, Box<AttributeExpr>),
    Bracket(Box<AttributeExpr>),
    /// `*`
    Allow,
    /// `!`
    Deny,
}

impl AttributeExpr {
    pub fn attr(name: &str) -> Self {
        AttributeExpr::Attr(Attribute::new(name))
    }

    pub fn relation(name: &str, op: Operator, value: impl Into<ValueTerm>) -> Self {
        AttributeExpr::Relation {
            attribute: Attribute::new(name),
            op,
            value: value.into(),
        }
    }

    pub fn and(left: AttributeExpr, right: AttributeExpr) -> Self {
        AttributeExpr::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: AttributeExpr, right: AttributeExpr) -> Self {
        AttributeExpr::Or(Box::new(left), Box::new(right))
    }

    pub fn bracket(inner: AttributeExpr) -> Self {
        AttributeExpr::Bracket(Box::new(inner))
    }
}

impl fmt::Display for AttributeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeExpr::Attr(a) => write!(f, "{a}"),
            AttributeExpr::Relation {
                attribute,
                op,
                value,
            } => write!(f, "{attribute} {op} {value}"),
            AttributeExpr::And(left, right) => {
                // An OR under an AND only keeps its meaning with parentheses.
                write_and_operand(f, left)?;
                f.write_str(" && ")?;
                write_and_operand(f, right)
            }
            AttributeExpr::Or(left, right) => write!(f, "{left} || {right}"),
            AttributeExpr::Bracket(inner) => write!(f, "({inner})"),
            AttributeExpr::Allow => f.write_str("*"),
            AttributeExpr::Deny => f.write_str("!"),
        }
    }
}

fn write_and_operand(f: &mut fmt::Formatter<'_>, expr: &AttributeExpr) -> fmt::Result {
    match expr {
        AttributeExpr::Or(..) => write!(f, "({expr})"),
        _ => write!(f, "{expr}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::parse::parse_expr;

    #[test]
    fn display_forms() {
        let expr = AttributeExpr::and(
            AttributeExpr::relation("role", Operator::Eq, "admin"),
            AttributeExpr::attr("employee"),
        );
        assert_eq!(expr.to_string(), "role = admin && employee");
        assert_eq!(AttributeExpr::Allow.to_string(), "*");
        assert_eq!(AttributeExpr::Deny.to_string(), "!");
    }

    #[test]
    fn built_or_under_and_keeps_meaning() {
        let expr = AttributeExpr::and(
            AttributeExpr::or(AttributeExpr::attr("a"), AttributeExpr::attr("b")),
            AttributeExpr::attr("c"),
        );
        let printed = expr.to_string();
        assert_eq!(printed, "(a || b) && c");

        let reparsed = parse_expr(&printed).unwrap();
        assert_eq!(reparsed.to_string(), printed);
    }

    #[test]
    fn structural_equality() {
        let a = parse_expr("role=admin | role=auditor").unwrap();
        let b = AttributeExpr::or(
            AttributeExpr::relation("role", Operator::Eq, "admin"),
            AttributeExpr::relation("role", Operator::Eq, "auditor"),
        );
        assert_eq!(a, b);
    }
}
