use nom::{
    IResult,
    Parser,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, multispace1, not_line_ending, one_of, satisfy},
    combinator::{map, opt, recognize, value, verify},
    error::{Error, ErrorKind},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded},
};

use crate::{
    attr::{Attribute, AttributeExpr, Hierarchy, Operator, ValueTerm},
    error::{AbacError, Result},
};

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_word_end(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_word_middle(c: char) -> bool {
    is_word_end(c) || matches!(c, '.' | '-' | '+' | ':')
}

/// Whitespace and `#` comments.
fn sp(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((multispace1, preceded(char('#'), not_line_ending)))),
    )
    .parse(input)
}

fn word(input: &str) -> IResult<&str, &str> {
    let (_, candidate) =
        recognize(pair(satisfy(is_word_start), take_while(is_word_middle))).parse(input)?;
    // Punctuation may not end a word; hand it back to the caller.
    let word = candidate.trim_end_matches(|c: char| !is_word_end(c));
    Ok((&input[word.len()..], word))
}

/// Integers, decimals (`1.5`, `.5`) and doubles (`1e3`, `2.5E-2`).
fn number(input: &str) -> IResult<&str, &str> {
    let mantissa = alt((
        recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        recognize(pair(char('.'), digit1)),
    ));
    let exponent = (one_of("eE"), opt(one_of("+-")), digit1);
    recognize((opt(one_of("+-")), mantissa, opt(exponent))).parse(input)
}

fn quoted(input: &str) -> IResult<&str, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, q @ ('"' | '\''))) => q,
        _ => return Err(nom::Err::Error(Error::new(input, ErrorKind::Char))),
    };

    let mut out = String::new();
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            out.push(match c {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((&input[i + c.len_utf8()..], out));
        } else {
            out.push(c);
        }
    }
    Err(nom::Err::Failure(Error::new(input, ErrorKind::Char)))
}

/// `true` and `false` in any case are booleans, quoted or not.
fn text_value(text: &str) -> ValueTerm {
    if text.eq_ignore_ascii_case("true") {
        ValueTerm::TRUE
    } else if text.eq_ignore_ascii_case("false") {
        ValueTerm::FALSE
    } else {
        ValueTerm::string(text)
    }
}

fn value_term(input: &str) -> IResult<&str, ValueTerm> {
    alt((
        map(quoted, |q| text_value(&q)),
        map(number, |n: &str| ValueTerm::string(n)),
        map(word, text_value),
    ))
    .parse(input)
}

/// A word or a quoted string, but not the keywords `true` and `false`.
fn attribute(input: &str) -> IResult<&str, Attribute> {
    let name = alt((map(word, str::to_string), quoted));
    map(
        verify(name, |n: &String| n != "true" && n != "false"),
        |n| Attribute::new(&n),
    )
    .parse(input)
}

fn operator(input: &str) -> IResult<&str, Operator> {
    alt((
        map(tag("!="), |_| Operator::Ne),
        map(tag("<="), |_| Operator::Le),
        map(tag(">="), |_| Operator::Ge),
        map(tag("=="), |_| Operator::Eq),
        map(char('='), |_| Operator::Eq),
        map(char('<'), |_| Operator::Lt),
        map(char('>'), |_| Operator::Gt),
    ))
    .parse(input)
}

fn relation_or_attr(input: &str) -> IResult<&str, AttributeExpr> {
    let (rest, attribute) = attribute(input)?;
    let (rest, tail) = opt((delimited(sp, operator, sp), value_term)).parse(rest)?;
    let expr = match tail {
        Some((op, value)) => AttributeExpr::Relation {
            attribute,
            op,
            value,
        },
        None => AttributeExpr::Attr(attribute),
    };
    Ok((rest, expr))
}

fn rel_expr(input: &str) -> IResult<&str, AttributeExpr> {
    alt((
        map(
            delimited((char('('), sp), or_expr, (sp, char(')'))),
            AttributeExpr::bracket,
        ),
        relation_or_attr,
    ))
    .parse(input)
}

fn and_expr(input: &str) -> IResult<&str, AttributeExpr> {
    let (rest, first) = rel_expr(input)?;
    let and_op = delimited(sp, alt((tag("&&"), tag("&"))), sp);
    let (rest, others) = many0(preceded(and_op, rel_expr)).parse(rest)?;
    Ok((rest, others.into_iter().fold(first, AttributeExpr::and)))
}

fn or_expr(input: &str) -> IResult<&str, AttributeExpr> {
    let (rest, first) = and_expr(input)?;
    let or_op = delimited(sp, alt((tag("||"), tag("|"))), sp);
    let (rest, others) = many0(preceded(or_op, and_expr)).parse(rest)?;
    Ok((rest, others.into_iter().fold(first, AttributeExpr::or)))
}

fn label_expr(input: &str) -> IResult<&str, AttributeExpr> {
    alt((
        map(char('*'), |_| AttributeExpr::Allow),
        map(char('!'), |_| AttributeExpr::Deny),
        or_expr,
    ))
    .parse(input)
}

fn attribute_value(input: &str) -> IResult<&str, (Attribute, ValueTerm)> {
    let (rest, attribute) = attribute(input)?;
    let (rest, value) = opt(preceded(delimited(sp, char('='), sp), value_term)).parse(rest)?;
    Ok((rest, (attribute, value.unwrap_or(ValueTerm::TRUE))))
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(sp, char(','), sp).parse(input)
}

fn finish<T>(text: &str, result: IResult<&str, T>) -> Result<T> {
    match result {
        Ok(("", parsed)) => Ok(parsed),
        Ok((rest, _)) => Err(AbacError::syntax(format!("unexpected trailing: {rest}"))),
        Err(e) => Err(AbacError::syntax(format!("parse error in '{text}': {e}"))),
    }
}

/// Parse label text into an expression.
pub fn parse_expr(text: &str) -> Result<AttributeExpr> {
    finish(text, delimited(sp, label_expr, sp).parse(text))
}

/// Parse `attr=value, attr, attr="quoted value"`.
pub fn parse_attribute_values(text: &str) -> Result<Vec<(Attribute, ValueTerm)>> {
    finish(
        text,
        delimited(sp, separated_list0(comma, attribute_value), sp).parse(text),
    )
}

/// Parse `attribute: lowest, ..., highest`.
pub fn parse_hierarchy(text: &str) -> Result<Hierarchy> {
    let Some((name, values)) = text.split_once(':') else {
        return Err(AbacError::syntax(format!(
            "hierarchy must look like 'attribute: v1, v2': {text}"
        )));
    };
    let name = name.trim();
    let attribute = finish(name, attribute(name))?;
    let values = finish(
        values,
        delimited(sp, separated_list1(comma, value_term), sp).parse(values),
    )?;
    Hierarchy::new(attribute, values)
}

/// Whether a string value prints without quotes and reads back as the same string.
pub(crate) fn is_bare_value(s: &str) -> bool {
    if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") {
        return false;
    }
    matches!(word(s), Ok(("", _))) || matches!(number(s), Ok(("", _)))
}

pub(crate) fn is_bare_attribute(s: &str) -> bool {
    s != "true" && s != "false" && matches!(word(s), Ok(("", _)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple() {
        let expr = parse_expr("role=admin").unwrap();
        assert_eq!(expr, AttributeExpr::relation("role", Operator::Eq, "admin"));
    }

    #[test]
    fn parse_bare_attribute() {
        assert_eq!(parse_expr("employee").unwrap(), AttributeExpr::attr("employee"));
    }

    #[test]
    fn parse_allow_and_deny() {
        assert_eq!(parse_expr(" * ").unwrap(), AttributeExpr::Allow);
        assert_eq!(parse_expr("!").unwrap(), AttributeExpr::Deny);
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse_expr("a | b & c").unwrap();
        assert_eq!(
            expr,
            AttributeExpr::or(
                AttributeExpr::attr("a"),
                AttributeExpr::and(AttributeExpr::attr("b"), AttributeExpr::attr("c")),
            )
        );
        assert_eq!(parse_expr("a || b && c").unwrap(), expr);
    }

    #[test]
    fn brackets_are_kept() {
        let expr = parse_expr("(role=admin|role=auditor)&team=finance").unwrap();
        match &expr {
            AttributeExpr::And(left, _) => assert!(matches!(**left, AttributeExpr::Bracket(_))),
            other => panic!("expected AND, got {other:?}"),
        }
        assert_eq!(
            expr.to_string(),
            "(role = admin || role = auditor) && team = finance"
        );
    }

    #[test]
    fn allow_or_deny_cannot_mix_with_operators() {
        for text in ["* & role=admin", "role=admin | *", "! | a", "a && !"] {
            assert!(parse_expr(text).unwrap_err().is_syntax(), "accepted '{text}'");
        }
    }

    #[test]
    fn relational_operators() {
        let expr = parse_expr("clearance>=secret").unwrap();
        assert_eq!(
            expr,
            AttributeExpr::relation("clearance", Operator::Ge, "secret")
        );
        assert!(matches!(
            parse_expr("a != b").unwrap(),
            AttributeExpr::Relation { op: Operator::Ne, .. }
        ));
        assert!(matches!(
            parse_expr("a < 5").unwrap(),
            AttributeExpr::Relation { op: Operator::Lt, .. }
        ));
    }

    #[test]
    fn value_forms() {
        assert_eq!(
            parse_expr(r#"name="Jane \"J\" Doe""#).unwrap(),
            AttributeExpr::relation("name", Operator::Eq, "Jane \"J\" Doe")
        );
        assert_eq!(
            parse_expr("name='x y'").unwrap(),
            AttributeExpr::relation("name", Operator::Eq, "x y")
        );
        assert_eq!(
            parse_expr("level=-12.5").unwrap(),
            AttributeExpr::relation("level", Operator::Eq, "-12.5")
        );
        assert_eq!(
            parse_expr("flag=true").unwrap(),
            AttributeExpr::relation("flag", Operator::Eq, ValueTerm::TRUE)
        );
        for text in ["flag=\"true\"", "flag=TRUE", "flag='True'"] {
            assert_eq!(
                parse_expr(text).unwrap(),
                AttributeExpr::relation("flag", Operator::Eq, ValueTerm::TRUE),
                "{text}"
            );
        }
        assert_eq!(
            parse_expr("flag=False").unwrap(),
            AttributeExpr::relation("flag", Operator::Eq, ValueTerm::FALSE)
        );
    }

    #[test]
    fn number_forms() {
        for (text, value) in [
            ("n=1e3", "1e3"),
            ("n=.5", ".5"),
            ("n=-2.5E-2", "-2.5E-2"),
            ("n=+7", "+7"),
        ] {
            assert_eq!(
                parse_expr(text).unwrap(),
                AttributeExpr::relation("n", Operator::Eq, value),
                "{text}"
            );
        }
        assert!(parse_expr("n=1e").is_err());
        assert!(parse_expr("n=1.").is_err());
    }

    #[test]
    fn quoted_attribute_names() {
        let expr = parse_expr(r#""my attr" = x"#).unwrap();
        assert_eq!(expr, AttributeExpr::relation("my attr", Operator::Eq, "x"));
        assert_eq!(expr.to_string(), r#""my attr" = x"#);
        assert_eq!(parse_expr(&expr.to_string()).unwrap(), expr);

        assert_eq!(parse_expr("'team lead'").unwrap(), AttributeExpr::attr("team lead"));
        assert!(parse_expr("\"true\" = x").is_err());
        let list = parse_attribute_values(r#""cost centre"=42"#).unwrap();
        assert_eq!(list, vec![(Attribute::new("cost centre"), ValueTerm::string("42"))]);
    }

    #[test]
    fn word_characters() {
        assert_eq!(
            parse_expr("ns:dept.unit-a=v1.2").unwrap(),
            AttributeExpr::relation("ns:dept.unit-a", Operator::Eq, "v1.2")
        );
        // A word cannot end in punctuation.
        assert!(parse_expr("dept.").is_err());
    }

    #[test]
    fn comments_are_whitespace() {
        let expr = parse_expr("role=admin # admins only\n| role=auditor").unwrap();
        assert!(matches!(expr, AttributeExpr::Or(..)));
    }

    #[test]
    fn booleans_are_not_attribute_names() {
        assert!(parse_expr("true").is_err());
        assert!(parse_expr("false=x").is_err());
    }

    #[test]
    fn malformed_input() {
        for text in ["", "role=", "(a", "a b", "a &", "'unterminated"] {
            assert!(parse_expr(text).unwrap_err().is_syntax(), "accepted '{text}'");
        }
    }

    #[test]
    fn printing_round_trips() {
        for text in [
            "a = b && (c || d = \"e f\")",
            "x != y || z",
            "level = 3 && ok = true",
            "'a b' = .5 || n = 1e3",
        ] {
            let expr = parse_expr(text).unwrap();
            assert_eq!(parse_expr(&expr.to_string()).unwrap(), expr);
        }
    }

    #[test]
    fn attribute_value_list() {
        let list = parse_attribute_values("role=admin, role = engineer,employee").unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[1].1, ValueTerm::string("engineer"));
        assert_eq!(list[2], (Attribute::new("employee"), ValueTerm::TRUE));
        assert!(parse_attribute_values("").unwrap().is_empty());
        assert!(parse_attribute_values("role=admin,").is_err());
    }

    #[test]
    fn hierarchy_text() {
        let h = parse_hierarchy("clearance: public, restricted, secret").unwrap();
        assert_eq!(h.attribute().name(), "clearance");
        assert_eq!(h.values().len(), 3);
        assert!(parse_hierarchy("clearance public").unwrap_err().is_syntax());
        assert!(parse_hierarchy("clearance: a, a").unwrap_err().is_validation());
    }
}
