//! tinylisp - a small tree-walking Lisp interpreter
//!
//! This crate provides a reader that turns source text into symbolic terms, an
//! evaluator that interprets those terms as code, a chained-scope environment
//! and a fixed catalogue of primitive operations.
//!
//! ```lisp
//! (defun square (x) (* x x))   ; define a function
//! (square 12)                  ; => 144
//! (if (> 3 2) 'yes 'no)        ; => yes
//! (setcar (cons 1 2) 9)        ; => (9 . 2)
//! ```
//!
//! ## Semantics worth knowing
//!
//! - `Nil` is the empty list, the list terminator and the false value at once.
//!   Everything else is truthy; `True` is the canonical true atom.
//! - Every primitive receives its argument list unevaluated and decides itself
//!   how to evaluate it. That is how `if`, `while`, `and`, `or`, `quote` and
//!   `define` work without special cases in the evaluator.
//! - User functions are **dynamically scoped**: a call frame's parent is the
//!   caller's frame, not the frame where the function was created. Free
//!   variables in a function body resolve against whoever calls it.
//! - Function calls do not check argument counts. Missing arguments leave
//!   parameters unbound, extra arguments are ignored.
//! - There is no depth limit on reading or evaluation. Deeply nested input or
//!   deep recursion exhausts the host stack and aborts the process.
//!
//! ## Modules
//!
//! - `ast`: the term representation and printer
//! - `reader`: S-expression reader
//! - `evaluator`: environments and the `eval`/apply core
//! - `builtinops`: the primitive registry
//! - `driver`: read-eval-print over a whole source text

use std::fmt;

use crate::builtinops::Arity;

/// Maximum length (in characters) of a symbol or quoted-symbol literal
pub const SYMBOL_MAX_LENGTH: usize = 128;

/// Initial capacity of the binding table of every scope frame
pub const FRAME_CAPACITY: usize = 128;

/// Categorizes the different kinds of reader errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (a character no term can start with, a stray `)`)
    InvalidSyntax,
    /// Input ended before the term was complete (unclosed list, dangling quote, unterminated `"`)
    Incomplete,
    /// A symbol literal exceeded `SYMBOL_MAX_LENGTH`
    SymbolTooLong,
}

/// A structured error providing detailed information about a reader failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a ParseError with context extracted from input at a given offset
    pub fn with_context_and_found(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let context_start = error_offset.saturating_sub(20);
        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.chars().count() < input.chars().count() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed input, including oversized symbols (see [`ParseErrorKind`])
    SyntaxError(ParseError),
    /// Lookup exhausted the scope chain
    UndefinedSymbol(String),
    /// The head of a call form did not evaluate to a function or primitive
    NotCallable(String),
    /// The tail of a call form is not a proper list
    MalformedArgumentList(String),
    /// A primitive was called with an argument count outside its [`Arity`]
    ArityError {
        primitive: &'static str,
        expected: Arity,
        got: usize,
    },
    /// Wrong term shape for an operation; the message names the primitive
    TypeError(String),
}

impl Error {
    pub fn arity_error(primitive: &'static str, expected: Arity, got: usize) -> Self {
        Error::ArityError {
            primitive,
            expected,
            got,
        }
    }

    /// True when the reader stopped because the input ended mid-term.
    /// An interactive front end can ask for more input instead of reporting it.
    pub fn is_incomplete_input(&self) -> bool {
        matches!(self, Error::SyntaxError(e) if e.kind == ParseErrorKind::Incomplete)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::SyntaxError(e) => {
                match e.kind {
                    ParseErrorKind::SymbolTooLong => write!(f, "SymbolTooLong: {}", e.message)?,
                    _ => write!(f, "SyntaxError: {}", e.message)?,
                }
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::UndefinedSymbol(name) => write!(f, "Undefined symbol: {name}"),
            Error::NotCallable(what) => write!(
                f,
                "NotCallable: the first element of list must be a function, got {what}"
            ),
            Error::MalformedArgumentList(form) => {
                write!(f, "MalformedArgumentList: function argument must be a list in {form}")
            }
            Error::ArityError {
                primitive,
                expected,
                got,
            } => write!(f, "ArityError: {primitive} expects {expected}, got {got}"),
            Error::TypeError(msg) => write!(f, "TypeError: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod builtinops;
pub mod driver;
pub mod evaluator;
pub mod reader;
