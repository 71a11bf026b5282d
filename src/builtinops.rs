//! Registry of primitive operations.
//!
//! A call hands a primitive its argument list unevaluated. Two kinds exist:
//!
//! - **Strict** primitives want ordinary eager evaluation. The evaluator
//!   evaluates each argument left to right and hands them over as a slice
//!   (e.g. `+`, `car`, `cons`, `println`).
//! - **Special forms** get the raw argument list and decide for themselves
//!   whether, when and how often to evaluate operands (e.g. `if`, `while`,
//!   `and`, `quote`, `define`). They live in the evaluator module.
//!
//! Argument counts are checked against [`Arity`] before a primitive runs.
//! Shape checks are done by each primitive and fail with a `TypeError` that
//! names it.
//!
//! Arithmetic is on `i64` and wraps on overflow.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::Error;
use crate::ast::{NumberType, Term};
use crate::evaluator::{
    Environment, eval_and, eval_define, eval_defun, eval_if, eval_lambda, eval_or, eval_progn,
    eval_quote, eval_while,
};

/// Accepted argument counts of a primitive
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
    Any,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::Any => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = |n: usize| if n == 1 { "argument" } else { "arguments" };
        match *self {
            Arity::Exact(n) => write!(f, "exactly {n} {}", plural(n)),
            Arity::AtLeast(n) => write!(f, "at least {n} {}", plural(n)),
            Arity::Range(min, max) => write!(f, "{min} to {max} arguments"),
            Arity::Any => write!(f, "any number of arguments"),
        }
    }
}

pub type StrictFn = fn(&[Term]) -> Result<Term, Error>;
pub type SpecialFormFn = fn(&Term, &mut Environment<'_>) -> Result<Term, Error>;

/// Represents the implementation of a primitive
#[derive(Clone, Copy)]
pub enum OpKind {
    /// Receives its arguments already evaluated, in order
    Strict(StrictFn),
    /// Receives the unevaluated argument list and the caller's environment
    SpecialForm(SpecialFormFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Strict(_) => write!(f, "Strict(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a primitive operation
#[derive(Debug)]
pub struct BuiltinOp {
    /// The name the primitive is bound to in the root environment
    pub name: &'static str,
    pub op_kind: OpKind,
    pub arity: Arity,
}

impl BuiltinOp {
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    pub(crate) fn validate_arity(&self, arg_count: usize) -> Result<(), Error> {
        if self.arity.accepts(arg_count) {
            Ok(())
        } else {
            Err(Error::arity_error(self.name, self.arity, arg_count))
        }
    }
}

//
// Strict primitive implementations
//

fn integer_args(primitive: &str, args: &[Term]) -> Result<Vec<NumberType>, Error> {
    args.iter()
        .map(|arg| {
            arg.as_number().ok_or_else(|| {
                Error::TypeError(format!(
                    "{primitive} accepts only integers, got {}",
                    arg.type_name()
                ))
            })
        })
        .collect()
}

macro_rules! integer_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(args: &[Term]) -> Result<Term, Error> {
            match integer_args($op_str, args)?.as_slice() {
                [a, b] => Ok(Term::from_bool(a $op b)),
                _ => Err(Error::arity_error($op_str, Arity::Exact(2), args.len())),
            }
        }
    };
}

integer_comparison!(builtin_num_eq, ==, "=");
integer_comparison!(builtin_lt, <, "<");
integer_comparison!(builtin_gt, >, ">");

fn builtin_add(args: &[Term]) -> Result<Term, Error> {
    let sum = integer_args("+", args)?
        .into_iter()
        .fold(0, NumberType::wrapping_add);
    Ok(Term::Number(sum))
}

fn builtin_sub(args: &[Term]) -> Result<Term, Error> {
    match integer_args("-", args)?.as_slice() {
        [only] => Ok(Term::Number(only.wrapping_neg())),
        [first, rest @ ..] => Ok(Term::Number(
            rest.iter().fold(*first, |acc, n| acc.wrapping_sub(*n)),
        )),
        [] => Err(Error::arity_error("-", Arity::AtLeast(1), 0)),
    }
}

fn builtin_mul(args: &[Term]) -> Result<Term, Error> {
    let product = integer_args("*", args)?
        .into_iter()
        .fold(1, NumberType::wrapping_mul);
    Ok(Term::Number(product))
}

fn builtin_car(args: &[Term]) -> Result<Term, Error> {
    match args {
        [Term::Pair(pair)] => Ok(pair.first()),
        _ => Err(Error::TypeError(
            "car accepts single list argument only".to_owned(),
        )),
    }
}

fn builtin_cdr(args: &[Term]) -> Result<Term, Error> {
    match args {
        [Term::Pair(pair)] => Ok(pair.rest()),
        _ => Err(Error::TypeError(
            "cdr accepts single list argument only".to_owned(),
        )),
    }
}

fn builtin_cons(args: &[Term]) -> Result<Term, Error> {
    match args {
        [first, rest] => Ok(Term::cons(first.clone(), rest.clone())),
        _ => Err(Error::arity_error("cons", Arity::Exact(2), args.len())),
    }
}

/// Mutates the pair in place; every holder of the pair sees the change
fn builtin_setcar(args: &[Term]) -> Result<Term, Error> {
    match args {
        [Term::Pair(pair), value] => {
            pair.set_first(value.clone());
            Ok(Term::Pair(pair.clone()))
        }
        _ => Err(Error::TypeError(
            "setcar accepts two arguments only, with first being a cons cell".to_owned(),
        )),
    }
}

fn builtin_eq(args: &[Term]) -> Result<Term, Error> {
    match args {
        [a, b] => Ok(Term::from_bool(a.is_identical(b))),
        _ => Err(Error::arity_error("eq", Arity::Exact(2), args.len())),
    }
}

fn builtin_println(args: &[Term]) -> Result<Term, Error> {
    for arg in args {
        println!("{arg}");
    }
    Ok(Term::Nil)
}

/// Global registry of all primitives, in the order they are bound.
static BUILTIN_OPS: [BuiltinOp; 21] = [
    BuiltinOp {
        name: "and",
        op_kind: OpKind::SpecialForm(eval_and),
        arity: Arity::Any,
    },
    BuiltinOp {
        name: "car",
        op_kind: OpKind::Strict(builtin_car),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        name: "cdr",
        op_kind: OpKind::Strict(builtin_cdr),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        name: "cons",
        op_kind: OpKind::Strict(builtin_cons),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        name: "define",
        op_kind: OpKind::SpecialForm(eval_define),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        name: "defun",
        op_kind: OpKind::SpecialForm(eval_defun),
        // name, parameter list, then any number of body expressions
        arity: Arity::AtLeast(2),
    },
    BuiltinOp {
        name: "=",
        op_kind: OpKind::Strict(builtin_num_eq),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        name: ">",
        op_kind: OpKind::Strict(builtin_gt),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        name: "if",
        op_kind: OpKind::SpecialForm(eval_if),
        arity: Arity::Range(2, 3),
    },
    BuiltinOp {
        name: "<",
        op_kind: OpKind::Strict(builtin_lt),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        name: "lambda",
        op_kind: OpKind::SpecialForm(eval_lambda),
        arity: Arity::AtLeast(1),
    },
    BuiltinOp {
        name: "-",
        op_kind: OpKind::Strict(builtin_sub),
        arity: Arity::AtLeast(1),
    },
    BuiltinOp {
        name: "*",
        op_kind: OpKind::Strict(builtin_mul),
        arity: Arity::AtLeast(2),
    },
    BuiltinOp {
        name: "eq",
        op_kind: OpKind::Strict(builtin_eq),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        name: "or",
        op_kind: OpKind::SpecialForm(eval_or),
        arity: Arity::Any,
    },
    BuiltinOp {
        name: "+",
        op_kind: OpKind::Strict(builtin_add),
        arity: Arity::Any,
    },
    BuiltinOp {
        name: "println",
        op_kind: OpKind::Strict(builtin_println),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        name: "progn",
        op_kind: OpKind::SpecialForm(eval_progn),
        arity: Arity::Any,
    },
    BuiltinOp {
        name: "setcar",
        op_kind: OpKind::Strict(builtin_setcar),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        name: "quote",
        op_kind: OpKind::SpecialForm(eval_quote),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        name: "while",
        op_kind: OpKind::SpecialForm(eval_while),
        arity: Arity::AtLeast(2),
    },
];

static BUILTIN_BY_NAME: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| BUILTIN_OPS.iter().map(|op| (op.name, op)).collect());

/// Get all primitives (for seeding the root environment)
pub(crate) fn get_builtin_ops() -> &'static [BuiltinOp] {
    &BUILTIN_OPS
}

/// Find a primitive by the name it is bound to
pub fn find_op(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_NAME.get(name).copied()
}
