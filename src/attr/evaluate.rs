use std::sync::Arc;

use crate::{
    attr::{
        Attribute,
        AttributeExpr,
        AttributeValueSet,
        Comparison,
        Hierarchy,
        Operator,
        ValueTerm,
    },
    error::{AbacError, Result},
    source::HierarchySource,
};

/// What an expression is evaluated against.
pub trait EvalEnv {
    fn values(&self, attribute: &Attribute) -> &[ValueTerm];
    fn hierarchy(&mut self, attribute: &Attribute) -> Option<Arc<Hierarchy>>;
}

/// Uncached environment over a value set and a hierarchy source.
pub struct PlainEnv<'a> {
    pub attributes: &'a AttributeValueSet,
    pub hierarchies: &'a dyn HierarchySource,
}

impl EvalEnv for PlainEnv<'_> {
    fn values(&self, attribute: &Attribute) -> &[ValueTerm] {
        self.attributes.get(attribute)
    }

    fn hierarchy(&mut self, attribute: &Attribute) -> Option<Arc<Hierarchy>> {
        self.hierarchies.hierarchy(attribute)
    }
}

pub fn evaluate(expr: &AttributeExpr, env: &mut dyn EvalEnv) -> Result<ValueTerm> {
    eval_bool(expr, env).map(ValueTerm::Bool)
}

fn eval_bool(expr: &AttributeExpr, env: &mut dyn EvalEnv) -> Result<bool> {
    match expr {
        AttributeExpr::Allow => Ok(true),
        AttributeExpr::Deny => Ok(false),
        AttributeExpr::Attr(attribute) => Ok(env.values(attribute).contains(&ValueTerm::TRUE)),
        AttributeExpr::Relation {
            attribute,
            op,
            value,
        } => eval_relation(attribute, *op, value, env),
        AttributeExpr::And(left, right) => {
            if !eval_bool(left, env)? {
                return Ok(false);
            }
            eval_bool(right, env)
        }
        AttributeExpr::Or(left, right) => {
            if eval_bool(left, env)? {
                return Ok(true);
            }
            eval_bool(right, env)
        }
        AttributeExpr::Bracket(inner) => eval_bool(inner, env),
    }
}

/// `value` is the constant from the label (data side); the requester's
/// values are the access side.
fn eval_relation(
    attribute: &Attribute,
    op: Operator,
    value: &ValueTerm,
    env: &mut dyn EvalEnv,
) -> Result<bool> {
    match op {
        Operator::Eq => {
            let held = env.values(attribute);
            if held.is_empty() {
                return Ok(false);
            }
            if held.contains(value) {
                return Ok(true);
            }
            let Some(hierarchy) = env.hierarchy(attribute) else {
                return Ok(false);
            };
            Ok(env.values(attribute).iter().any(|v| {
                matches!(
                    hierarchy.compare(value, v),
                    Comparison::Eq | Comparison::Lt
                )
            }))
        }
        Operator::Ne => Ok(env.values(attribute).iter().any(|v| v != value)),
        Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => Err(AbacError::unsupported(
            format!("operator '{op}' in '{attribute} {op} {value}'"),
        )),
    }
}
