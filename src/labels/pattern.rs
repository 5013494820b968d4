use std::fmt;

use crate::{
    error::{AbacError, Result},
    labels::{Label, Node, Triple},
};

/// The pattern shapes a store accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternShape {
    Spo,
    SpAny,
    SAnyAny,
    AnyPAny,
    AnyAnyAny,
}

/// Lookup order: most specific first.
pub const PRIORITY: [PatternShape; 5] = [
    PatternShape::Spo,
    PatternShape::SpAny,
    PatternShape::SAnyAny,
    PatternShape::AnyPAny,
    PatternShape::AnyAnyAny,
];

impl PatternShape {
    pub fn of(pattern: &Triple) -> Result<Self> {
        let concrete = (
            pattern.s.is_concrete(),
            pattern.p.is_concrete(),
            pattern.o.is_concrete(),
        );
        match concrete {
            (true, true, true) => Ok(PatternShape::Spo),
            (true, true, false) => Ok(PatternShape::SpAny),
            (true, false, false) => Ok(PatternShape::SAnyAny),
            (false, true, false) => Ok(PatternShape::AnyPAny),
            (false, false, false) => Ok(PatternShape::AnyAnyAny),
            _ => Err(AbacError::validation(format!(
                "pattern {pattern} is not one of S P O, S P _, S _ _, _ P _, _ _ _"
            ))),
        }
    }

    /// The pattern of this shape that a concrete triple falls under.
    pub fn project(self, triple: &Triple) -> Triple {
        let keep = |node: &Node, wanted: bool| if wanted { node.clone() } else { Node::Any };
        let (s, p, o) = match self {
            PatternShape::Spo => (true, true, true),
            PatternShape::SpAny => (true, true, false),
            PatternShape::SAnyAny => (true, false, false),
            PatternShape::AnyPAny => (false, true, false),
            PatternShape::AnyAnyAny => (false, false, false),
        };
        Triple::new(keep(&triple.s, s), keep(&triple.p, p), keep(&triple.o, o))
    }

    pub fn is_wildcard(self) -> bool {
        self != PatternShape::Spo
    }
}

impl fmt::Display for PatternShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PatternShape::Spo => "SPO",
            PatternShape::SpAny => "SP_",
            PatternShape::SAnyAny => "S__",
            PatternShape::AnyPAny => "_P_",
            PatternShape::AnyAnyAny => "___",
        })
    }
}

/// Walk the shapes in priority order and return the first non-empty hit.
/// Without wildcard entries only the exact probe runs.
pub fn resolve<F>(triple: &Triple, patterns_loaded: bool, mut probe: F) -> Result<Vec<Label>>
where
    F: FnMut(PatternShape, &Triple) -> Result<Option<Vec<Label>>>,
{
    if !triple.is_concrete() {
        return Err(AbacError::validation(format!(
            "labels lookup needs a concrete triple, got {triple}"
        )));
    }
    for shape in PRIORITY {
        if shape.is_wildcard() && !patterns_loaded {
            break;
        }
        let key = shape.project(triple);
        if let Some(labels) = probe(shape, &key)? {
            if !labels.is_empty() {
                return Ok(labels);
            }
        }
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::labels::label::labels;

    fn t(s: &str, p: &str, o: &str) -> Triple {
        let node = |x: &str| if x == "_" { Node::Any } else { Node::uri(x) };
        Triple::new(node(s), node(p), node(o))
    }

    #[test]
    fn legal_shapes() {
        assert_eq!(PatternShape::of(&t("s", "p", "o")).unwrap(), PatternShape::Spo);
        assert_eq!(PatternShape::of(&t("s", "p", "_")).unwrap(), PatternShape::SpAny);
        assert_eq!(PatternShape::of(&t("s", "_", "_")).unwrap(), PatternShape::SAnyAny);
        assert_eq!(PatternShape::of(&t("_", "p", "_")).unwrap(), PatternShape::AnyPAny);
        assert_eq!(PatternShape::of(&t("_", "_", "_")).unwrap(), PatternShape::AnyAnyAny);
    }

    #[test]
    fn mixed_wildcards_rejected() {
        for pattern in [t("s", "_", "o"), t("_", "p", "o"), t("_", "_", "o")] {
            assert!(PatternShape::of(&pattern).unwrap_err().is_validation());
        }
    }

    #[test]
    fn projection() {
        let triple = t("s", "p", "o");
        assert_eq!(PatternShape::SpAny.project(&triple), t("s", "p", "_"));
        assert_eq!(PatternShape::AnyPAny.project(&triple), t("_", "p", "_"));
        assert_eq!(PatternShape::AnyAnyAny.project(&triple), t("_", "_", "_"));
    }

    #[test]
    fn first_non_empty_wins() {
        let mut entries = HashMap::new();
        entries.insert(t("s", "p", "o"), Vec::new());
        entries.insert(t("s", "_", "_"), labels(&["s__"]));
        entries.insert(t("_", "_", "_"), labels(&["___"]));

        let found = resolve(&t("s", "p", "o"), true, |_, key| Ok(entries.get(key).cloned()));
        assert_eq!(found.unwrap(), labels(&["s__"]));
    }

    #[test]
    fn fast_path_skips_wildcards() {
        let mut probes = Vec::new();
        let found = resolve(&t("s", "p", "o"), false, |shape, _| {
            probes.push(shape);
            Ok(None)
        });
        assert!(found.unwrap().is_empty());
        assert_eq!(probes, vec![PatternShape::Spo]);
    }

    #[test]
    fn wildcard_lookup_is_an_error() {
        let err = resolve(&t("s", "_", "_"), true, |_, _| Ok(None)).unwrap_err();
        assert!(err.is_validation());
    }
}
