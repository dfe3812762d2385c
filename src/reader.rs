//! Reader: surface syntax to [`Value`] trees.
//!
//! ```text
//! [def xs [list 1 2.5 "three"]]   ; lists use square brackets
//! 'x                              ; [quote x]
//! ~x  ~@xs                        ; [unquote x]  [unquote-splice xs]
//! true false null                 ; literals, every other bare word is a symbol
//! ```
//!
//! Numbers match `-?\d+(\.\d+)?`. A number running straight into symbol
//! characters (`3d`, `1.5.2`) is a syntax error; brackets, quotes and strings
//! need no whitespace around them.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_till, take_while1},
    character::complete::{char, digit1, multispace1},
    combinator::{opt, recognize},
    error::ErrorKind,
    multi::many0_count,
    sequence::{pair, preceded},
};

use crate::ast::{NumberType, Value, sym};
use crate::stack::ensure_sufficient_stack;
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Reader limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    /// Maximum list and quote nesting
    pub max_depth: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            max_depth: MAX_PARSE_DEPTH,
        }
    }
}

/// Characters that end a symbol
const DELIMITERS: &str = "[](){}\"';";

fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !DELIMITERS.contains(c)
}

fn syntax_error(input: &str, kind: ErrorKind) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

/// Once an opening bracket or prefix is consumed, a failure inside it must not
/// backtrack into the other alternatives (that would misreport the position).
fn commit<E>(err: nom::Err<E>) -> nom::Err<E> {
    match err {
        nom::Err::Error(e) => nom::Err::Failure(e),
        other => other,
    }
}

/// Skip whitespace and `;` comments
fn skip_trivia(input: &str) -> IResult<&str, ()> {
    let comment = recognize(pair(char(';'), take_till(|c: char| c == '\n')));
    let (input, _) = many0_count(alt((multispace1, comment))).parse(input)?;
    Ok((input, ()))
}

fn parse_number(input: &str) -> IResult<&str, Value> {
    let (rest, text) = recognize((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
    ))
    .parse(input)?;

    // `3d` is neither a number nor a symbol
    if rest.starts_with(is_symbol_char) {
        return Err(nom::Err::Failure(nom::error::Error::new(rest, ErrorKind::Digit)));
    }

    match text.parse::<NumberType>() {
        Ok(n) => Ok((rest, Value::Number(n))),
        Err(_) => Err(syntax_error(input, ErrorKind::Float)),
    }
}

/// Symbols, plus the reserved literal words `true`, `false` and `null`
fn parse_symbol(input: &str) -> IResult<&str, Value> {
    let (rest, word) = take_while1(is_symbol_char).parse(input)?;
    let value = match word {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Nil,
        other => sym(other),
    };
    Ok((rest, value))
}

/// Parse a string literal. Unknown escapes keep the escaped character.
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut text = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => return Ok((char_iter.as_str(), Value::String(text))),
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some(other) => text.push(other),
                    None => return Err(nom::Err::Failure(nom::error::Error::new("", ErrorKind::Eof))),
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                text.push(ch);
                remaining = char_iter.as_str();
            }
            // Unterminated: fail without backtracking into other alternatives.
            None => return Err(nom::Err::Failure(nom::error::Error::new("", ErrorKind::Eof))),
        }
    }
}

/// Parse `[ expr* ]`
fn parse_list<'a>(input: &'a str, depth: usize, config: &ParseConfig) -> IResult<&'a str, Value> {
    let (mut input, _) = char('[').parse(input)?;
    let mut elements = Vec::new();

    loop {
        let (rest, ()) = skip_trivia(input)?;
        if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>(']').parse(rest) {
            return Ok((rest, Value::list(elements)));
        }
        if rest.is_empty() {
            return Err(nom::Err::Failure(nom::error::Error::new(rest, ErrorKind::Eof)));
        }
        let (rest, element) = parse_expr(rest, depth + 1, config).map_err(commit)?;
        elements.push(element);
        input = rest;
    }
}

/// Parse a shorthand prefix (`'`, `~`, `~@`) and wrap the following expression
fn parse_prefixed<'a>(
    input: &'a str,
    depth: usize,
    config: &ParseConfig,
) -> IResult<&'a str, Value> {
    let (rest, head) = alt((
        tag("'").map(|_| "quote"),
        tag("~@").map(|_| "unquote-splice"),
        tag("~").map(|_| "unquote"),
    ))
    .parse(input)?;

    let (rest, ()) = skip_trivia(rest)?;
    if rest.is_empty() {
        return Err(nom::Err::Failure(nom::error::Error::new(rest, ErrorKind::Eof)));
    }
    let (rest, expr) = parse_expr(rest, depth + 1, config).map_err(commit)?;
    Ok((rest, Value::form(head, expr)))
}

/// Parse one expression, skipping leading trivia
fn parse_expr<'a>(input: &'a str, depth: usize, config: &ParseConfig) -> IResult<&'a str, Value> {
    if depth >= config.max_depth {
        return Err(nom::Err::Failure(nom::error::Error::new(input, ErrorKind::TooLarge)));
    }
    ensure_sufficient_stack(|| {
        preceded(
            skip_trivia,
            alt((
                |i| parse_prefixed(i, depth, config),
                |i| parse_list(i, depth, config),
                parse_number,
                parse_string,
                parse_symbol,
            )),
        )
        .parse(input)
    })
}

fn to_parse_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    let e = match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => {
            return ParseError::from_message(ParseErrorKind::Incomplete, "Incomplete input");
        }
    };
    let offset = input.len().saturating_sub(e.input.len());
    let found = e.input.chars().next().map(|c| c.to_string());

    let (kind, message) = match (e.code, found.as_deref()) {
        (ErrorKind::TooLarge, _) => (
            ParseErrorKind::TooDeeplyNested,
            "Expression too deeply nested".to_owned(),
        ),
        (_, None) => (
            ParseErrorKind::Incomplete,
            "Unexpected end of input (unclosed list or string)".to_owned(),
        ),
        (_, Some("]")) => (
            ParseErrorKind::TrailingContent,
            format!("Unexpected ']' at position {offset}"),
        ),
        (_, Some(c)) => (
            ParseErrorKind::InvalidSyntax,
            format!("Unexpected character '{c}' at position {offset}"),
        ),
    };
    ParseError::with_context_and_found(kind, message, input, offset, found)
}

/// Parse every top-level expression in `input`
pub fn parse_all_with_config(input: &str, config: &ParseConfig) -> Result<Vec<Value>, Error> {
    let mut exprs = Vec::new();
    let mut rest = input;
    loop {
        let (after_trivia, ()) = skip_trivia(rest)
            .map_err(|e| Error::ParseError(to_parse_error(input, e)))?;
        if after_trivia.is_empty() {
            return Ok(exprs);
        }
        let (after_expr, expr) = parse_expr(after_trivia, 0, config)
            .map_err(|e| Error::ParseError(to_parse_error(input, e)))?;
        exprs.push(expr);
        rest = after_expr;
    }
}

/// Parse every top-level expression in `input` with default limits
pub fn parse_all(input: &str) -> Result<Vec<Value>, Error> {
    parse_all_with_config(input, &ParseConfig::default())
}

/// Parse a source unit as one expression: nothing reads as `null`, one
/// expression as itself, several as `[do e1 e2 ...]`.
pub fn parse_with_config(input: &str, config: &ParseConfig) -> Result<Value, Error> {
    let mut exprs = parse_all_with_config(input, config)?;
    Ok(match exprs.len() {
        0 => Value::Nil,
        1 => exprs.swap_remove(0),
        _ => {
            exprs.insert(0, sym("do"));
            Value::list(exprs)
        }
    })
}

pub fn parse(input: &str) -> Result<Value, Error> {
    parse_with_config(input, &ParseConfig::default())
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, val};

    /// Test result variants for parsing tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Value),              // Parsing should succeed with this value
        Failure(ParseErrorKind),     // Parsing should fail with this kind
    }
    use ParseTestResult::*;

    fn success<T: Into<Value>>(value: T) -> ParseTestResult {
        Success(value.into())
    }

    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Parse test #{} ({input:?})", i + 1);
            match (parse(input), expected) {
                (Ok(actual), Success(expected_val)) => {
                    assert_eq!(actual, *expected_val, "{test_id}: value mismatch");
                }
                (Err(Error::ParseError(err)), Failure(kind)) => {
                    assert_eq!(err.kind, *kind, "{test_id}: wrong error kind: {err}");
                }
                (actual, expected) => {
                    panic!("{test_id}: expected {expected:?}, got {actual:?}")
                }
            }
        }
    }

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_parse_data_driven() {
        run_parse_tests(vec![
            // === ATOMS ===
            ("42", success(42)),
            ("-7", success(-7)),
            ("3.25", success(3.25)),
            ("-0.5", success(-0.5)),
            ("\"hi there\"", success("hi there")),
            ("\"a\\nb\\t\\\"c\\\\\"", success("a\nb\t\"c\\")),
            ("\"\\q\"", success("q")), // unknown escape keeps the character
            ("true", success(true)),
            ("false", success(false)),
            ("null", Success(Value::Nil)),
            ("foo", success(sym("foo"))),
            ("-", success(sym("-"))),
            ("-x", success(sym("-x"))),
            ("number?", success(sym("number?"))),
            ("a~b", success(sym("a~b"))),
            ("&", success(sym("&"))),
            // "true" only as a whole word
            ("trueish", success(sym("trueish"))),
            // === LISTS ===
            ("[]", Success(nil())),
            ("[+ 1 2]", success(vec![sym("+"), val(1), val(2)])),
            ("[ a [b [c]] ]", success(vec![sym("a"), val(vec![sym("b"), val(vec![sym("c")])])])),
            ("[a[b]c]", success(vec![sym("a"), val(vec![sym("b")]), sym("c")])),
            ("[f \"s\"x]", success(vec![sym("f"), val("s"), sym("x")])),
            ("[1\"s\"]", success(vec![val(1), val("s")])),
            ("[1'x]", success(vec![val(1), val(vec![sym("quote"), sym("x")])])),
            // === SHORTHANDS ===
            ("'x", success(vec![sym("quote"), sym("x")])),
            ("'[1 2]", success(vec![sym("quote"), val([1, 2])])),
            ("''x", success(vec![sym("quote"), val(vec![sym("quote"), sym("x")])])),
            ("~x", success(vec![sym("unquote"), sym("x")])),
            ("~@body", success(vec![sym("unquote-splice"), sym("body")])),
            (
                "[q [if ~c [do ~@b] null]]",
                success(vec![
                    sym("q"),
                    val(vec![
                        sym("if"),
                        val(vec![sym("unquote"), sym("c")]),
                        val(vec![sym("do"), val(vec![sym("unquote-splice"), sym("b")])]),
                        Value::Nil,
                    ]),
                ]),
            ),
            // === COMMENTS, WHITESPACE, MULTIPLE FORMS ===
            ("", Success(Value::Nil)),
            ("   ; only a comment\n", Success(Value::Nil)),
            ("[a ; inner comment\n b]", success(vec![sym("a"), sym("b")])),
            ("1 2", success(vec![sym("do"), val(1), val(2)])),
            (
                "[def x 1]\n[+ x 1] ; trailing",
                success(vec![
                    sym("do"),
                    val(vec![sym("def"), sym("x"), val(1)]),
                    val(vec![sym("+"), sym("x"), val(1)]),
                ]),
            ),
            // === ERRORS ===
            ("[1 2", Failure(ParseErrorKind::Incomplete)),
            ("[[1]", Failure(ParseErrorKind::Incomplete)),
            ("\"unterminated", Failure(ParseErrorKind::Incomplete)),
            ("'", Failure(ParseErrorKind::Incomplete)),
            ("]", Failure(ParseErrorKind::TrailingContent)),
            ("[1] ]", Failure(ParseErrorKind::TrailingContent)),
            ("(+ 1 2)", Failure(ParseErrorKind::InvalidSyntax)),
            ("[a {b}]", Failure(ParseErrorKind::InvalidSyntax)),
            ("[a )]", Failure(ParseErrorKind::InvalidSyntax)),
            // a number must end at a delimiter
            ("[3d]", Failure(ParseErrorKind::InvalidSyntax)),
            ("1.5.3", Failure(ParseErrorKind::InvalidSyntax)),
            ("[-2x 1]", Failure(ParseErrorKind::InvalidSyntax)),
            ("1.", Failure(ParseErrorKind::InvalidSyntax)),
        ]);
    }

    #[test]
    fn test_parse_all_keeps_forms_separate() {
        let exprs = parse_all("[def a 1] a 'b").unwrap();
        assert_eq!(
            exprs,
            vec![
                val(vec![sym("def"), sym("a"), val(1)]),
                sym("a"),
                val(vec![sym("quote"), sym("b")]),
            ]
        );
        assert!(parse_all("  ").unwrap().is_empty());
    }

    #[test]
    fn test_depth_limit() {
        let config = ParseConfig { max_depth: 4 };
        assert!(parse_with_config("[[[1]]]", &config).is_ok());

        let err = parse_with_config("[[[[[1]]]]]", &config).unwrap_err();
        match err {
            Error::ParseError(e) => assert_eq!(e.kind, ParseErrorKind::TooDeeplyNested),
            other => panic!("expected parse error, got {other:?}"),
        }

        let deep = format!("{}1{}", "[".repeat(300), "]".repeat(300));
        assert!(parse(&deep).is_err());
    }

    #[test]
    fn test_error_context_and_found() {
        let Error::ParseError(err) = parse("[def x 1] [f (y)]").unwrap_err() else {
            panic!("expected parse error");
        };
        assert_eq!(err.found.as_deref(), Some("("));
        assert!(err.message.contains("position 13"), "{}", err.message);
        assert!(err.context.unwrap_or_default().contains("(y)"));

        // the error points at the first character after the number
        let Error::ParseError(err) = parse("[+ 1.5.3 2]").unwrap_err() else {
            panic!("expected parse error");
        };
        assert_eq!(err.kind, ParseErrorKind::InvalidSyntax);
        assert_eq!(err.found.as_deref(), Some("."));
        assert!(err.message.contains("position 6"), "{}", err.message);
    }
}
