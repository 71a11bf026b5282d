use crate::ast::Term;
use crate::builtinops::{Arity, OpKind, get_builtin_ops};
use crate::{Error, FRAME_CAPACITY};
use std::collections::HashMap;

/// One frame of variable bindings.
///
/// A frame borrows its parent. A function call's frame borrows the frame of
/// its *caller*, which is what makes name resolution dynamically scoped: the
/// chain always mirrors the live call stack, and a frame is dropped as soon as
/// its call returns.
#[derive(Debug)]
pub struct Environment<'p> {
    bindings: HashMap<String, Term>,
    parent: Option<&'p Environment<'p>>,
}

impl Default for Environment<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'p> Environment<'p> {
    /// An empty root frame
    pub fn new() -> Self {
        Environment {
            bindings: HashMap::with_capacity(FRAME_CAPACITY),
            parent: None,
        }
    }

    pub fn with_parent(parent: &'p Environment<'p>) -> Self {
        Environment {
            bindings: HashMap::with_capacity(FRAME_CAPACITY),
            parent: Some(parent),
        }
    }

    /// Bind `name` in this frame, replacing an existing binding of the same
    /// name in this frame only.
    pub fn define(&mut self, name: impl Into<String>, value: Term) {
        self.bindings.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Term> {
        self.bindings
            .get(name)
            .or_else(|| self.parent.and_then(|parent| parent.get(name)))
    }

    /// Resolve `name` through the frame chain, innermost binding first
    pub fn lookup(&self, name: &str) -> Result<Term, Error> {
        self.get(name)
            .cloned()
            .ok_or_else(|| Error::UndefinedSymbol(name.to_owned()))
    }

    /// Get all bindings visible from this frame
    /// Returns a Vec of (name, value) pairs sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Term)> {
        let mut bindings = HashMap::new();

        // Parent bindings first so inner frames shadow them
        if let Some(parent) = self.parent {
            for (name, value) in parent.get_all_bindings() {
                bindings.insert(name, value);
            }
        }

        for (name, value) in &self.bindings {
            bindings.insert(name.clone(), value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

/// Evaluate a term in the given environment.
///
/// Integers, `True`, `Nil`, functions and primitives evaluate to themselves.
/// A symbol evaluates to its binding. A pair is a call: its head is
/// evaluated and must yield a function or a primitive, and its tail must be
/// a proper list of argument expressions.
pub fn eval(term: &Term, env: &mut Environment<'_>) -> Result<Term, Error> {
    match term {
        Term::Number(_) | Term::True | Term::Nil | Term::Function(_) | Term::Primitive(_) => {
            Ok(term.clone())
        }

        Term::Symbol(name) => env.lookup(name),

        Term::Pair(pair) => {
            let callable = eval(&pair.first(), env)?;
            if !matches!(callable, Term::Function(_) | Term::Primitive(_)) {
                return Err(Error::NotCallable(format!(
                    "{callable} ({})",
                    callable.type_name()
                )));
            }
            let args = pair.rest();
            if !args.is_proper_list() {
                return Err(Error::MalformedArgumentList(format!("{term}")));
            }
            apply(&callable, &args, env)
        }
    }
}

/// Evaluate every element of an argument list, left to right
fn eval_args(args: &Term, env: &mut Environment<'_>) -> Result<Vec<Term>, Error> {
    args.iter().map(|arg| eval(&arg, env)).collect()
}

/// Evaluate a sequence of expressions and return the last value (`Nil` if empty)
fn progn(body: &Term, env: &mut Environment<'_>) -> Result<Term, Error> {
    let mut last = Term::Nil;
    for expr in body.iter() {
        last = eval(&expr, env)?;
    }
    Ok(last)
}

fn apply(callable: &Term, args: &Term, env: &mut Environment<'_>) -> Result<Term, Error> {
    match callable {
        Term::Primitive(op) => {
            op.validate_arity(args.iter().count())?;
            match op.op_kind {
                OpKind::Strict(func) => func(&eval_args(args, env)?),
                OpKind::SpecialForm(special_form) => special_form(args, env),
            }
        }
        Term::Function(function) => {
            let values = eval_args(args, env)?;

            // Parameters and values are paired up to the shorter of the two
            let mut frame = Environment::with_parent(&*env);
            for (param, value) in function.params.iter().zip(values) {
                if let Term::Symbol(name) = param {
                    frame.define(name.to_string(), value);
                }
            }
            progn(&function.body, &mut frame)
        }
        other => Err(Error::NotCallable(format!("{other} ({})", other.type_name()))),
    }
}

//
// Special forms. Each receives its argument list unevaluated; the argument
// count has already been checked against the registered arity.
//

pub(crate) fn eval_quote(args: &Term, _env: &mut Environment<'_>) -> Result<Term, Error> {
    match args.as_pair() {
        Some(pair) => Ok(pair.first()),
        None => Err(Error::arity_error("quote", Arity::Exact(1), 0)),
    }
}

/// Binds in the *current* frame; inside a function body that is the call frame
pub(crate) fn eval_define(args: &Term, env: &mut Environment<'_>) -> Result<Term, Error> {
    let items: Vec<Term> = args.iter().collect();
    match items.as_slice() {
        [Term::Symbol(name), expr] => {
            let value = eval(expr, env)?;
            env.define(name.to_string(), value.clone());
            Ok(value)
        }
        _ => Err(Error::TypeError(
            "define accepts two arguments only, with first one being a symbol".to_owned(),
        )),
    }
}

pub(crate) fn eval_if(args: &Term, env: &mut Environment<'_>) -> Result<Term, Error> {
    let items: Vec<Term> = args.iter().collect();
    match items.as_slice() {
        [condition, then_expr] => {
            if eval(condition, env)?.is_truthy() {
                eval(then_expr, env)
            } else {
                Ok(Term::Nil)
            }
        }
        [condition, then_expr, else_expr] => {
            if eval(condition, env)?.is_truthy() {
                eval(then_expr, env)
            } else {
                eval(else_expr, env)
            }
        }
        _ => Err(Error::arity_error("if", Arity::Range(2, 3), items.len())),
    }
}

pub(crate) fn eval_while(args: &Term, env: &mut Environment<'_>) -> Result<Term, Error> {
    let items: Vec<Term> = args.iter().collect();
    let Some((condition, body)) = items.split_first() else {
        return Err(Error::arity_error("while", Arity::AtLeast(2), 0));
    };
    while eval(condition, env)?.is_truthy() {
        for expr in body {
            eval(expr, env)?;
        }
    }
    Ok(Term::Nil)
}

pub(crate) fn eval_progn(args: &Term, env: &mut Environment<'_>) -> Result<Term, Error> {
    progn(args, env)
}

/// Build a function from a parameter list and a body.
/// Parameters must form a proper list of symbols.
fn make_function(form: &str, params: Term, body: Term) -> Result<Term, Error> {
    if !params.is_proper_list() {
        return Err(Error::TypeError(format!(
            "{form} parameters must be a list, got {params}"
        )));
    }
    if let Some(bad) = params.iter().find(|param| param.as_symbol().is_none()) {
        return Err(Error::TypeError(format!(
            "{form} parameters must be symbols, got {bad}"
        )));
    }
    Ok(Term::function(params, body))
}

pub(crate) fn eval_lambda(args: &Term, _env: &mut Environment<'_>) -> Result<Term, Error> {
    match args.as_pair() {
        Some(pair) => make_function("lambda", pair.first(), pair.rest()),
        None => Err(Error::arity_error("lambda", Arity::AtLeast(1), 0)),
    }
}

/// `(defun name params body...)` is `(define name (lambda params body...))`
pub(crate) fn eval_defun(args: &Term, env: &mut Environment<'_>) -> Result<Term, Error> {
    let (name, definition) = match args.as_pair() {
        Some(pair) => (pair.first(), pair.rest()),
        None => {
            return Err(Error::arity_error("defun", Arity::AtLeast(2), 0));
        }
    };
    let Term::Symbol(name) = name else {
        return Err(Error::TypeError(format!(
            "defun name must be a symbol, got {name}"
        )));
    };
    let function = match definition.as_pair() {
        Some(pair) => make_function("defun", pair.first(), pair.rest())?,
        None => {
            return Err(Error::arity_error("defun", Arity::AtLeast(2), 1));
        }
    };
    env.define(name.to_string(), function.clone());
    Ok(function)
}

macro_rules! short_circuit_op {
    ($name:ident, $stop_on_truthy:literal, $on_stop:expr, $default:expr) => {
        pub(crate) fn $name(args: &Term, env: &mut Environment<'_>) -> Result<Term, Error> {
            for arg in args.iter() {
                if eval(&arg, env)?.is_truthy() == $stop_on_truthy {
                    return Ok($on_stop);
                }
            }
            Ok($default)
        }
    };
}

// Results are always the canonical atoms, never the operand values
short_circuit_op!(eval_and, false, Term::Nil, Term::True);
short_circuit_op!(eval_or, true, Term::True, Term::Nil);

/// Create the root environment: `Nil`, `True` and every primitive
pub fn create_global_env() -> Environment<'static> {
    let mut env = Environment::new();
    env.define("Nil", Term::Nil);
    env.define("True", Term::True);

    for builtin_op in get_builtin_ops() {
        env.define(builtin_op.name, Term::Primitive(builtin_op));
    }

    env
}
