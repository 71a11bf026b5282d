//! Recursive-descent reader turning source text into [`Term`]s.
//!
//! Grammar:
//!
//! ```text
//! term    := integer | symbol | "quoted" | list | 'term
//! integer := ['-'] digit+           ; wraps on overflow
//! symbol  := (alpha | special) (alnum | special)*
//! list    := '(' term* ')'          ; () reads as Nil
//! ```
//!
//! A quoted literal `"..."` reads as a symbol, not as a string. `'x` is
//! rewritten to `(quote x)`. Whitespace separates tokens and is otherwise ignored.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while,
    character::complete::{char, digit1, satisfy},
    combinator::{cut, opt, recognize},
    error::ErrorKind,
    multi::many0,
    sequence::pair,
};

use crate::ast::{NumberType, Term, is_symbol_char, is_symbol_start};
use crate::{Error, ParseError, ParseErrorKind, SYMBOL_MAX_LENGTH};

type NomError<'a> = nom::error::Error<&'a str>;

/// The C `isspace` set
fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

fn end_of_input(input: &str) -> nom::Err<NomError<'_>> {
    nom::Err::Failure(NomError::new(input, ErrorKind::Eof))
}

/// Convert nom failures into reader errors with context from the whole source
fn to_error(source: &str, error: nom::Err<NomError<'_>>) -> Error {
    let e = match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => {
            return Error::SyntaxError(ParseError::new(
                ParseErrorKind::Incomplete,
                "Unexpected end of input",
                None,
                None,
            ));
        }
    };

    let byte_offset = source.len().saturating_sub(e.input.len());
    let offset = source[..byte_offset].chars().count();
    let (kind, message, found) = match e.code {
        ErrorKind::Eof => (
            ParseErrorKind::Incomplete,
            "Unexpected end of input".to_owned(),
            None,
        ),
        ErrorKind::TooLarge => (
            ParseErrorKind::SymbolTooLong,
            format!("Symbol name is too long (max {SYMBOL_MAX_LENGTH} characters)"),
            None,
        ),
        _ => (
            ParseErrorKind::InvalidSyntax,
            format!("Unexpected character at position {offset}"),
            e.input.chars().next().map(|c| c.to_string()),
        ),
    };

    Error::SyntaxError(ParseError::with_context_and_found(
        kind, message, source, offset, found,
    ))
}

/// Value of an integer literal. Accumulation wraps instead of failing.
fn literal_value(text: &str) -> NumberType {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, text),
    };
    let magnitude = digits.bytes().fold(0 as NumberType, |acc, d| {
        acc.wrapping_mul(10).wrapping_add(NumberType::from(d - b'0'))
    });
    if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    }
}

fn check_symbol_length<'a>(start: &'a str, name: &str) -> Result<(), nom::Err<NomError<'a>>> {
    if name.chars().count() > SYMBOL_MAX_LENGTH {
        return Err(nom::Err::Failure(NomError::new(start, ErrorKind::TooLarge)));
    }
    Ok(())
}

/// Parse an integer. A '-' only starts a number when a digit follows it.
fn parse_integer(input: &str) -> IResult<&str, Term> {
    let (input, text) = recognize(pair(opt(char('-')), digit1)).parse(input)?;
    Ok((input, Term::Number(literal_value(text))))
}

fn parse_symbol(input: &str) -> IResult<&str, Term> {
    let (remaining, name) =
        recognize(pair(satisfy(is_symbol_start), take_while(is_symbol_char))).parse(input)?;
    check_symbol_length(input, name)?;
    Ok((remaining, Term::symbol(name)))
}

/// Parse a "double quoted" symbol. No escape sequences exist.
fn parse_quoted_symbol(input: &str) -> IResult<&str, Term> {
    let (rest, _) = char('"').parse(input)?;
    let (rest, name) = take_while(|c: char| c != '"').parse(rest)?;
    check_symbol_length(input, name)?;
    if rest.is_empty() {
        return Err(end_of_input(rest));
    }
    let (rest, _) = char('"').parse(rest)?;
    Ok((rest, Term::symbol(name)))
}

fn parse_list(input: &str) -> IResult<&str, Term> {
    let (rest, _) = char('(').parse(input)?;
    let (rest, elements) = many0(parse_term).parse(rest)?;
    let rest = rest.trim_start_matches(is_blank);
    if rest.is_empty() {
        return Err(end_of_input(rest));
    }
    let (rest, _) = cut(char(')')).parse(rest)?;
    Ok((rest, Term::list(elements)))
}

/// Parse quoted expression ('expr -> (quote expr))
fn parse_quote(input: &str) -> IResult<&str, Term> {
    let (rest, _) = char('\'').parse(input)?;
    let (rest, term) = cut(parse_term).parse(rest)?;
    Ok((rest, Term::list([Term::symbol("quote"), term])))
}

fn parse_term(input: &str) -> IResult<&str, Term> {
    let input = input.trim_start_matches(is_blank);
    if input.is_empty() {
        return Err(nom::Err::Error(NomError::new(input, ErrorKind::Eof)));
    }
    alt((
        parse_quote,
        parse_list,
        parse_integer,
        parse_quoted_symbol,
        parse_symbol,
    ))
    .parse(input)
}

fn read_from<'a>(source: &str, input: &'a str) -> Result<Option<(Term, &'a str)>, Error> {
    let input = input.trim_start_matches(is_blank);
    if input.is_empty() {
        return Ok(None);
    }
    match parse_term(input) {
        Ok((rest, term)) => Ok(Some((term, rest))),
        Err(e) => Err(to_error(source, e)),
    }
}

/// Read one term from the front of `input`.
///
/// Returns `Ok(None)` when only whitespace is left, otherwise the term and the
/// unconsumed remainder of the input.
pub fn read(input: &str) -> Result<Option<(Term, &str)>, Error> {
    read_from(input, input)
}

/// Parse a source text that must contain exactly one term.
pub fn parse(input: &str) -> Result<Term, Error> {
    match read(input)? {
        Some((term, rest)) if rest.trim_start_matches(is_blank).is_empty() => Ok(term),
        Some((_, rest)) => {
            let offset = input.len() - rest.len();
            Err(Error::SyntaxError(ParseError::with_context_and_found(
                ParseErrorKind::InvalidSyntax,
                format!("Unexpected remaining input: '{}'", rest.trim()),
                input,
                input[..offset].chars().count(),
                None,
            )))
        }
        None => Err(Error::SyntaxError(ParseError::new(
            ParseErrorKind::Incomplete,
            "Empty input",
            None,
            None,
        ))),
    }
}

/// Reads the terms of a source text one at a time.
///
/// Yields each term in order, then stops at end of input. After an error is
/// yielded the reader is exhausted: the input cannot be resynchronised.
pub struct Reader<'a> {
    source: &'a str,
    remaining: &'a str,
    failed: bool,
}

impl<'a> Reader<'a> {
    pub fn new(source: &'a str) -> Self {
        Reader {
            source,
            remaining: source,
            failed: false,
        }
    }

    /// The input not consumed yet
    pub fn remaining(&self) -> &'a str {
        self.remaining
    }
}

impl Iterator for Reader<'_> {
    type Item = Result<Term, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match read_from(self.source, self.remaining) {
            Ok(Some((term, rest))) => {
                self.remaining = rest;
                Some(Ok(term))
            }
            Ok(None) => {
                self.remaining = "";
                None
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{sym, val};

    /// Test result variants for parsing tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Term),
        Failure(ParseErrorKind),
    }
    use ParseTestResult::*;

    fn success<T: Into<Term>>(value: T) -> ParseTestResult {
        Success(value.into())
    }

    fn quoted(term: Term) -> Term {
        val(vec![sym("quote"), term])
    }

    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Parse test #{} ({input:?})", i + 1);
            match (parse(input), expected) {
                (Ok(actual), Success(expected_val)) => {
                    assert_eq!(actual, *expected_val, "{test_id}: value mismatch");

                    // display -> parse -> display is stable
                    let displayed = format!("{actual}");
                    let reparsed = parse(&displayed).unwrap_or_else(|e| {
                        panic!("{test_id}: round-trip parse failed for '{displayed}': {e:?}")
                    });
                    assert_eq!(
                        displayed,
                        format!("{reparsed}"),
                        "{test_id}: round-trip display mismatch"
                    );
                }
                (Err(Error::SyntaxError(e)), Failure(kind)) => {
                    assert_eq!(e.kind, *kind, "{test_id}: wrong error kind ({e:?})");
                }
                (Ok(actual), Failure(kind)) => {
                    panic!("{test_id}: expected {kind:?}, got {actual:?}");
                }
                (Err(err), _) => {
                    panic!("{test_id}: unexpected error {err:?}");
                }
            }
        }
    }

    #[test]
    fn test_reader_comprehensive() {
        let long_name = "a".repeat(SYMBOL_MAX_LENGTH);
        let too_long_name = "a".repeat(SYMBOL_MAX_LENGTH + 1);
        let long_quoted = format!("\"{long_name}\"");
        let too_long_quoted = format!("\"{too_long_name}\"");

        let test_cases = vec![
            // ===== INTEGERS =====
            ("42", success(42)),
            ("-5", success(-5)),
            ("0", success(0)),
            ("-0", success(0)),
            ("007", success(7)),
            ("9223372036854775807", success(i64::MAX)),
            ("-9223372036854775808", success(i64::MIN)),
            // no overflow checking
            ("9223372036854775808", success(i64::MIN)),
            // ===== SYMBOLS =====
            ("foo", success(sym("foo"))),
            ("+", success(sym("+"))),
            ("-", success(sym("-"))),
            ("-abc", success(sym("-abc"))),
            ("--5", success(sym("--5"))),
            ("<=", success(sym("<="))),
            ("null?", success(sym("null?"))),
            ("a_b*c", success(sym("a_b*c"))),
            ("var123", success(sym("var123"))),
            ("Nil", success(sym("Nil"))),
            (long_name.as_str(), success(sym(&long_name))),
            (too_long_name.as_str(), Failure(ParseErrorKind::SymbolTooLong)),
            // ===== QUOTED SYMBOLS =====
            ("\"hello\"", success(sym("hello"))),
            (long_quoted.as_str(), success(sym(&long_name))),
            (too_long_quoted.as_str(), Failure(ParseErrorKind::SymbolTooLong)),
            ("\"unterminated", Failure(ParseErrorKind::Incomplete)),
            // ===== LISTS =====
            ("()", success(Term::Nil)),
            ("(  )", success(Term::Nil)),
            ("(42)", success([42])),
            ("(1 2 3)", success([1, 2, 3])),
            ("( 1\n\t2 )", success([1, 2])),
            ("(- 5)", success(vec![sym("-"), val(5)])),
            ("(-5)", success([-5])),
            ("((1 2) (3 4))", success([[1, 2], [3, 4]])),
            (
                "(define x (+ 1 2))",
                success(vec![
                    sym("define"),
                    sym("x"),
                    val(vec![sym("+"), val(1), val(2)]),
                ]),
            ),
            ("(1 2", Failure(ParseErrorKind::Incomplete)),
            ("((1)", Failure(ParseErrorKind::Incomplete)),
            ("(", Failure(ParseErrorKind::Incomplete)),
            // ===== QUOTE =====
            ("'foo", success(quoted(sym("foo")))),
            ("'(1 2)", success(quoted(val([1, 2])))),
            ("'()", success(quoted(Term::Nil))),
            ("''x", success(quoted(quoted(sym("x"))))),
            ("'", Failure(ParseErrorKind::Incomplete)),
            ("('", Failure(ParseErrorKind::Incomplete)),
            // ===== SYNTAX ERRORS =====
            (")", Failure(ParseErrorKind::InvalidSyntax)),
            ("@", Failure(ParseErrorKind::InvalidSyntax)),
            ("(1 @)", Failure(ParseErrorKind::InvalidSyntax)),
            ("#t", Failure(ParseErrorKind::InvalidSyntax)),
            ("3.14", Failure(ParseErrorKind::InvalidSyntax)),
            ("", Failure(ParseErrorKind::Incomplete)),
        ];

        run_parse_tests(test_cases);
    }

    #[test]
    fn test_read_returns_remaining_input() {
        let (term, rest) = read("  123abc rest").unwrap().unwrap();
        assert_eq!(term, val(123));
        assert_eq!(rest, "abc rest");

        let (term, rest) = read(rest).unwrap().unwrap();
        assert_eq!(term, sym("abc"));
        assert_eq!(rest, " rest");

        assert!(read("   \n\t ").unwrap().is_none());
        assert!(read("").unwrap().is_none());

        // an empty quoted literal is a symbol with an empty name
        let (term, _) = read("\"\"").unwrap().unwrap();
        assert_eq!(term.as_symbol(), Some(""));
    }

    #[test]
    fn test_reader_stream() {
        let terms: Vec<Term> = Reader::new("(define x 1)\n'x \"y\" -7 ")
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(terms.len(), 4);
        assert_eq!(format!("{}", terms[0]), "(define x 1)");
        assert_eq!(format!("{}", terms[1]), "(quote x)");
        assert_eq!(terms[2], sym("y"));
        assert_eq!(terms[3], val(-7));
    }

    #[test]
    fn test_reader_stops_after_error() {
        let mut reader = Reader::new("1 ) 2");
        assert_eq!(reader.next().unwrap().unwrap(), val(1));
        let err = reader.next().unwrap().unwrap_err();
        match err {
            Error::SyntaxError(e) => {
                assert_eq!(e.kind, ParseErrorKind::InvalidSyntax);
                assert_eq!(e.found.as_deref(), Some(")"));
            }
            other => panic!("expected SyntaxError, got {other:?}"),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_incomplete_input_is_flagged() {
        assert!(parse("(+ 1").unwrap_err().is_incomplete_input());
        assert!(!parse(")").unwrap_err().is_incomplete_input());
    }

    #[test]
    fn test_trailing_content_rejected_by_parse() {
        let err = parse("1 2").unwrap_err();
        assert!(format!("{err}").contains("Unexpected remaining input"));
    }
}
