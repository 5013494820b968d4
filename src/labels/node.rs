use std::fmt;

use crate::error::{AbacError, Result};

const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

const XSD_INTEGER_FAMILY: &[&str] = &[
    "integer",
    "long",
    "int",
    "short",
    "byte",
    "nonNegativeInteger",
    "positiveInteger",
    "nonPositiveInteger",
    "negativeInteger",
    "unsignedLong",
    "unsignedInt",
    "unsignedShort",
    "unsignedByte",
];

/// Node kind, numbered as it appears in encoded keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Uri = 0,
    Literal = 1,
    Blank = 2,
    Any = 3,
}

impl NodeKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(NodeKind::Uri),
            1 => Ok(NodeKind::Literal),
            2 => Ok(NodeKind::Blank),
            3 => Ok(NodeKind::Any),
            other => Err(AbacError::decode(format!("unknown node type {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    lexical: String,
    lang: Option<String>,
    datatype: Option<String>,
}

impl Literal {
    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    pub fn datatype(&self) -> Option<&str> {
        self.datatype.as_deref()
    }

    /// N-Triples style form: `"lex"`, `"lex"@en` or `"lex"^^<dt>`.
    pub fn to_term(&self) -> String {
        let mut out = String::with_capacity(self.lexical.len() + 2);
        out.push('"');
        for c in self.lexical.chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c => out.push(c),
            }
        }
        out.push('"');
        if let Some(lang) = &self.lang {
            out.push('@');
            out.push_str(lang);
        } else if let Some(dt) = &self.datatype {
            out.push_str("^^<");
            out.push_str(dt);
            out.push('>');
        }
        out
    }

    pub fn from_term(term: &str) -> Result<Self> {
        let bad = || AbacError::decode(format!("malformed literal: {term}"));
        let body = term.strip_prefix('"').ok_or_else(bad)?;

        let mut lexical = String::new();
        let mut chars = body.char_indices();
        let mut close = None;
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    let (_, escaped) = chars.next().ok_or_else(bad)?;
                    lexical.push(match escaped {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        other => other,
                    });
                }
                '"' => {
                    close = Some(i);
                    break;
                }
                c => lexical.push(c),
            }
        }
        let close = close.ok_or_else(bad)?;
        let suffix = &body[close + 1..];

        if suffix.is_empty() {
            Ok(Literal {
                lexical,
                lang: None,
                datatype: None,
            })
        } else if let Some(lang) = suffix.strip_prefix('@') {
            Ok(Literal {
                lexical,
                lang: Some(lang.to_string()),
                datatype: None,
            })
        } else if let Some(dt) = suffix
            .strip_prefix("^^<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            Ok(Literal {
                lexical,
                lang: None,
                datatype: Some(dt.to_string()),
            })
        } else {
            Err(bad())
        }
    }

    fn xsd_local_name(&self) -> Option<&str> {
        self.datatype.as_deref()?.strip_prefix(XSD)
    }

    /// Canonical lexical form for the numeric and boolean XSD types.
    fn normalized(&self) -> Option<Literal> {
        let local = self.xsd_local_name()?;
        let lexical = if XSD_INTEGER_FAMILY.contains(&local) {
            canonical_integer(&self.lexical)?
        } else if local == "decimal" {
            canonical_decimal(&self.lexical)?
        } else if local == "boolean" {
            match self.lexical.trim() {
                "1" | "true" => "true".to_string(),
                "0" | "false" => "false".to_string(),
                _ => return None,
            }
        } else {
            return None;
        };
        (lexical != self.lexical).then(|| Literal {
            lexical,
            lang: None,
            datatype: self.datatype.clone(),
        })
    }
}

fn split_sign(text: &str) -> (bool, &str) {
    match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    }
}

fn canonical_integer(text: &str) -> Option<String> {
    let (negative, digits) = split_sign(text.trim());
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits = digits.trim_start_matches('0');
    Some(match (negative, digits.is_empty()) {
        (_, true) => "0".to_string(),
        (true, false) => format!("-{digits}"),
        (false, false) => digits.to_string(),
    })
}

fn canonical_decimal(text: &str) -> Option<String> {
    let (negative, body) = split_sign(text.trim());
    let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return None;
    }
    let int_part = match int_part.trim_start_matches('0') {
        "" => "0",
        digits => digits,
    };
    let frac_part = match frac_part.trim_end_matches('0') {
        "" => "0",
        digits => digits,
    };
    let zero = int_part == "0" && frac_part == "0";
    let sign = if negative && !zero { "-" } else { "" };
    Some(format!("{sign}{int_part}.{frac_part}"))
}

/// One position of a triple. `Any` is the wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Node {
    Uri(String),
    Literal(Literal),
    Blank(String),
    Any,
}

impl Node {
    pub fn uri(iri: impl Into<String>) -> Self {
        Node::Uri(iri.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Node::Blank(label.into())
    }

    pub fn literal(lexical: impl Into<String>) -> Self {
        Node::Literal(Literal {
            lexical: lexical.into(),
            lang: None,
            datatype: None,
        })
    }

    pub fn lang_literal(lexical: impl Into<String>, lang: impl Into<String>) -> Self {
        Node::Literal(Literal {
            lexical: lexical.into(),
            lang: Some(lang.into()),
            datatype: None,
        })
    }

    pub fn typed_literal(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Node::Literal(Literal {
            lexical: lexical.into(),
            lang: None,
            datatype: Some(datatype.into()),
        })
    }

    /// Literal typed with an XSD datatype given by local name, e.g. `"integer"`.
    pub fn xsd_literal(lexical: impl Into<String>, local_name: &str) -> Self {
        Node::typed_literal(lexical, format!("{XSD}{local_name}"))
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Uri(_) => NodeKind::Uri,
            Node::Literal(_) => NodeKind::Literal,
            Node::Blank(_) => NodeKind::Blank,
            Node::Any => NodeKind::Any,
        }
    }

    pub fn is_concrete(&self) -> bool {
        !matches!(self, Node::Any)
    }

    /// Full term form, as stored in the node table.
    pub fn to_term(&self) -> String {
        match self {
            Node::Uri(iri) => format!("<{iri}>"),
            Node::Literal(lit) => lit.to_term(),
            Node::Blank(label) => format!("_:{label}"),
            Node::Any => "ANY".to_string(),
        }
    }

    pub fn from_term(term: &str) -> Result<Self> {
        if term == "ANY" {
            Ok(Node::Any)
        } else if let Some(iri) = term.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
            Ok(Node::uri(iri))
        } else if let Some(label) = term.strip_prefix("_:") {
            Ok(Node::blank(label))
        } else if term.starts_with('"') {
            Ok(Node::Literal(Literal::from_term(term)?))
        } else {
            Err(AbacError::decode(format!("unrecognised term: {term}")))
        }
    }

    /// The same node with numeric and boolean literals in canonical form.
    pub fn normalized(&self) -> Node {
        match self {
            Node::Literal(lit) => lit
                .normalized()
                .map(Node::Literal)
                .unwrap_or_else(|| self.clone()),
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Any => f.write_str("_"),
            other => f.write_str(&other.to_term()),
        }
    }
}

/// Subject, predicate, object. A triple with `Any` slots is a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    pub s: Node,
    pub p: Node,
    pub o: Node,
}

pub type TriplePattern = Triple;

impl Triple {
    pub fn new(s: Node, p: Node, o: Node) -> Self {
        Triple { s, p, o }
    }

    pub fn is_concrete(&self) -> bool {
        self.s.is_concrete() && self.p.is_concrete() && self.o.is_concrete()
    }

    /// Object literals in canonical form; subject and predicate are never literals.
    pub fn normalized(&self) -> Triple {
        Triple {
            s: self.s.clone(),
            p: self.p.clone(),
            o: self.o.normalized(),
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.s, self.p, self.o)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_forms_round_trip() {
        for node in [
            Node::uri("http://example/s"),
            Node::blank("b0"),
            Node::literal("plain \"quoted\"\nline"),
            Node::lang_literal("chat", "fr"),
            Node::xsd_literal("42", "integer"),
            Node::Any,
        ] {
            assert_eq!(Node::from_term(&node.to_term()).unwrap(), node);
        }
    }

    #[test]
    fn malformed_terms() {
        for term in ["plain", "\"open", "\"x\"^^dt", "<unclosed"] {
            assert!(Node::from_term(term).is_err(), "{term}");
        }
    }

    #[test]
    fn integer_normalization() {
        let cases = [("007", "7"), ("+5", "5"), ("-0", "0"), ("000", "0"), ("-012", "-12")];
        for (given, want) in cases {
            assert_eq!(
                Node::xsd_literal(given, "integer").normalized(),
                Node::xsd_literal(want, "integer")
            );
        }
        assert_eq!(
            Node::xsd_literal("01", "int").normalized(),
            Node::xsd_literal("1", "int")
        );
        // Not a number: left alone.
        let odd = Node::xsd_literal("1e3", "integer");
        assert_eq!(odd.normalized(), odd);
    }

    #[test]
    fn decimal_normalization() {
        let cases = [
            ("1.50", "1.5"),
            ("01.0", "1.0"),
            ("1.", "1.0"),
            (".5", "0.5"),
            ("-0.00", "0.0"),
            ("+2.25", "2.25"),
        ];
        for (given, want) in cases {
            assert_eq!(
                Node::xsd_literal(given, "decimal").normalized(),
                Node::xsd_literal(want, "decimal"),
                "{given}"
            );
        }
    }

    #[test]
    fn boolean_normalization() {
        assert_eq!(
            Node::xsd_literal("1", "boolean").normalized(),
            Node::xsd_literal("true", "boolean")
        );
        assert_eq!(
            Node::xsd_literal("0", "boolean").normalized(),
            Node::xsd_literal("false", "boolean")
        );
    }

    #[test]
    fn plain_literals_untouched() {
        let node = Node::literal("007");
        assert_eq!(node.normalized(), node);
    }

    #[test]
    fn concrete_and_pattern_triples() {
        let t = Triple::new(Node::uri("s"), Node::uri("p"), Node::literal("o"));
        assert!(t.is_concrete());
        let p = Triple::new(Node::uri("s"), Node::Any, Node::Any);
        assert!(!p.is_concrete());
        assert_eq!(p.to_string(), "(<s> _ _)");
    }
}
