//! This module defines [`Term`], the single representation shared by code and data,
//! together with list helpers and the printer. A term is an integer, a symbol, a
//! mutable cons cell, one of the two atoms `True` and `Nil`, a user function or a
//! primitive. Terms are cheap handles: cloning one shares the underlying cell, so
//! mutation through `setcar` is visible to every holder of the same pair.
//!
//! `PartialEq` on terms is *structural* and exists for tests and host code; the
//! language's `eq` primitive uses [`Term::is_identical`] instead.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::builtinops::BuiltinOp;

/// Type alias for integer values in the interpreter
pub(crate) type NumberType = i64;

/// Allowed non-alphanumeric characters in symbol names
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "+-_<>=?*";

/// Check if a character may start a bare symbol
pub(crate) fn is_symbol_start(c: char) -> bool {
    c.is_ascii_alphabetic() || SYMBOL_SPECIAL_CHARS.contains(c)
}

/// Check if a character may continue a bare symbol
pub(crate) fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)
}

/// A cons cell. Both slots are mutable.
pub struct Pair {
    first: RefCell<Term>,
    rest: RefCell<Term>,
}

impl Pair {
    pub fn first(&self) -> Term {
        self.first.borrow().clone()
    }

    pub fn rest(&self) -> Term {
        self.rest.borrow().clone()
    }

    pub fn set_first(&self, value: Term) {
        *self.first.borrow_mut() = value;
    }
}

/// Unlinks the `rest` chain one cell at a time, so dropping a long list
/// does not recurse once per element.
impl Drop for Pair {
    fn drop(&mut self) {
        let mut tail = std::mem::replace(self.rest.get_mut(), Term::Nil);
        while let Term::Pair(pair) = tail {
            match Rc::try_unwrap(pair) {
                Ok(mut cell) => tail = std::mem::replace(cell.rest.get_mut(), Term::Nil),
                // still shared; its other holders keep the rest alive
                Err(_) => break,
            }
        }
    }
}

/// A user-defined function. It captures no environment.
pub struct Function {
    /// Proper list of parameter symbols (possibly `Nil`)
    pub(crate) params: Term,
    /// Sequence of body expressions, evaluated like `progn`
    pub(crate) body: Term,
}

/// Core term type of the interpreter
#[derive(Clone)]
pub enum Term {
    Number(NumberType),
    /// Symbols are immutable once read
    Symbol(Rc<str>),
    Pair(Rc<Pair>),
    True,
    /// Empty list, list terminator and false value
    Nil,
    Function(Rc<Function>),
    Primitive(&'static BuiltinOp),
}

impl Term {
    pub fn symbol(name: &str) -> Term {
        Term::Symbol(Rc::from(name))
    }

    pub fn cons(first: Term, rest: Term) -> Term {
        Term::Pair(Rc::new(Pair {
            first: RefCell::new(first),
            rest: RefCell::new(rest),
        }))
    }

    pub(crate) fn function(params: Term, body: Term) -> Term {
        Term::Function(Rc::new(Function { params, body }))
    }

    /// Build a proper list from the given elements
    pub fn list<I>(elements: I) -> Term
    where
        I: IntoIterator<Item = Term>,
        I::IntoIter: DoubleEndedIterator,
    {
        elements
            .into_iter()
            .rev()
            .fold(Term::Nil, |rest, first| Term::cons(first, rest))
    }

    /// Map a Rust bool onto the two atoms
    pub fn from_bool(b: bool) -> Term {
        if b { Term::True } else { Term::Nil }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Term::Nil)
    }

    /// Everything except `Nil` counts as true
    pub fn is_truthy(&self) -> bool {
        !self.is_nil()
    }

    pub fn as_number(&self) -> Option<NumberType> {
        match self {
            Term::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Term::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<&Rc<Pair>> {
        match self {
            Term::Pair(pair) => Some(pair),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Term::Number(_) => "integer",
            Term::Symbol(_) => "symbol",
            Term::Pair(_) => "pair",
            Term::True => "true",
            Term::Nil => "nil",
            Term::Function(_) => "function",
            Term::Primitive(_) => "primitive",
        }
    }

    /// Number of elements of a proper list, `None` for an improper one.
    /// Any non-pair, non-nil term is an improper list.
    pub fn list_len(&self) -> Option<usize> {
        let mut count = 0;
        let mut current = self.clone();
        loop {
            match current {
                Term::Pair(pair) => {
                    count += 1;
                    current = pair.rest();
                }
                Term::Nil => return Some(count),
                _ => return None,
            }
        }
    }

    pub fn is_proper_list(&self) -> bool {
        self.list_len().is_some()
    }

    /// Iterate over the elements of a list. Iteration stops at the first
    /// non-pair tail, so the improper tail of a list is never yielded.
    pub fn iter(&self) -> ListIter {
        ListIter {
            current: self.clone(),
        }
    }

    /// Identity comparison as performed by `eq`.
    ///
    /// `Nil` and `True` are singletons; heap terms are identical only when they
    /// are the same allocation. Integers have value semantics and compare by value.
    pub fn is_identical(&self, other: &Term) -> bool {
        match (self, other) {
            (Term::Nil, Term::Nil) | (Term::True, Term::True) => true,
            (Term::Number(a), Term::Number(b)) => a == b,
            (Term::Symbol(a), Term::Symbol(b)) => Rc::ptr_eq(a, b),
            (Term::Pair(a), Term::Pair(b)) => Rc::ptr_eq(a, b),
            (Term::Function(a), Term::Function(b)) => Rc::ptr_eq(a, b),
            (Term::Primitive(a), Term::Primitive(b)) => std::ptr::eq(*a, *b),
            _ => false,
        }
    }
}

/// Iterator over the elements of a (proper part of a) list
pub struct ListIter {
    current: Term,
}

impl Iterator for ListIter {
    type Item = Term;

    fn next(&mut self) -> Option<Term> {
        let pair = match &self.current {
            Term::Pair(pair) => Rc::clone(pair),
            _ => return None,
        };
        self.current = pair.rest();
        Some(pair.first())
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Number(n) => write!(f, "Number({n})"),
            Term::Symbol(s) => write!(f, "Symbol({s})"),
            Term::Pair(pair) => write!(f, "Pair({:?}, {:?})", pair.first(), pair.rest()),
            Term::True => write!(f, "True"),
            Term::Nil => write!(f, "Nil"),
            Term::Function(function) => write!(
                f,
                "Function(params={:?}, body={:?})",
                function.params, function.body
            ),
            Term::Primitive(op) => write!(f, "Primitive({})", op.name),
        }
    }
}

impl From<bool> for Term {
    fn from(b: bool) -> Self {
        Term::from_bool(b)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Term {
            fn from(n: $int_type) -> Self {
                Term::Number(n as NumberType)
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType); // Special case - no casting
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Term>> From<Vec<T>> for Term {
    fn from(v: Vec<T>) -> Self {
        Term::list(v.into_iter().map(Into::into).collect::<Vec<_>>())
    }
}

impl<T: Into<Term>, const N: usize> From<[T; N]> for Term {
    fn from(arr: [T; N]) -> Self {
        Term::list(arr.into_iter().map(Into::into).collect::<Vec<_>>())
    }
}

/// Helper for building symbols in mixed lists
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Term {
    Term::symbol(name.as_ref())
}

/// Helper for building terms from Rust literals
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Term>>(value: T) -> Term {
    value.into()
}

/// Printer. Lists print parenthesized and space separated; an improper tail
/// prints after ` . `. Functions and primitives are opaque.
impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Number(n) => write!(f, "{n}"),
            Term::Symbol(s) => write!(f, "{s}"),
            Term::Pair(pair) => {
                write!(f, "({}", pair.first())?;
                let mut tail = pair.rest();
                loop {
                    match tail {
                        Term::Pair(next) => {
                            write!(f, " {}", next.first())?;
                            tail = next.rest();
                        }
                        Term::Nil => break,
                        other => {
                            write!(f, " . {other}")?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Term::True => write!(f, "True"),
            Term::Nil => write!(f, "Nil"),
            Term::Function(_) => write!(f, "<function>"),
            Term::Primitive(_) => write!(f, "<primitive>"),
        }
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Term::Number(a), Term::Number(b)) => a == b,
            (Term::Symbol(a), Term::Symbol(b)) => a == b,
            (Term::Pair(a), Term::Pair(b)) => {
                Rc::ptr_eq(a, b) || (a.first() == b.first() && a.rest() == b.rest())
            }
            (Term::True, Term::True) | (Term::Nil, Term::Nil) => true,
            (Term::Function(a), Term::Function(b)) => Rc::ptr_eq(a, b),
            (Term::Primitive(a), Term::Primitive(b)) => a.name == b.name,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_functions_data_driven() {
        let test_cases = vec![
            (val(42), Term::Number(42)),
            (val(-17), Term::Number(-17)),
            (val(255u8), Term::Number(255)),
            (val(NumberType::MIN), Term::Number(NumberType::MIN)),
            (val(true), Term::True),
            (val(false), Term::Nil),
            (sym("foo-bar?"), Term::symbol("foo-bar?")),
            (val(Vec::<Term>::new()), Term::Nil),
            (
                val([1, 2]),
                Term::cons(Term::Number(1), Term::cons(Term::Number(2), Term::Nil)),
            ),
            (
                val(vec![sym("op"), val(42)]),
                Term::cons(Term::symbol("op"), Term::cons(Term::Number(42), Term::Nil)),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(actual, expected, "Test case {} failed", i + 1);
        }
    }

    #[test]
    fn test_printer() {
        let test_cases = vec![
            (val(42), "42"),
            (val(-5), "-5"),
            (sym("hello"), "hello"),
            (Term::True, "True"),
            (Term::Nil, "Nil"),
            (val([1, 2, 3]), "(1 2 3)"),
            (val(vec![sym("a"), val([1, 2]), sym("b")]), "(a (1 2) b)"),
            (val(vec![Term::Nil]), "(Nil)"),
            (Term::cons(val(1), val(2)), "(1 . 2)"),
            (
                Term::cons(val(1), Term::cons(val(2), sym("tail"))),
                "(1 2 . tail)",
            ),
            (Term::function(Term::Nil, Term::Nil), "<function>"),
        ];

        for (i, (term, expected)) in test_cases.iter().enumerate() {
            assert_eq!(format!("{term}"), *expected, "Printer case {} failed", i + 1);
        }
    }

    #[test]
    fn test_list_len_and_iter() {
        assert_eq!(Term::Nil.list_len(), Some(0));
        assert_eq!(val([1, 2, 3]).list_len(), Some(3));
        assert_eq!(Term::cons(val(1), val(2)).list_len(), None);
        assert_eq!(val(7).list_len(), None);

        let items: Vec<Term> = val([4, 5, 6]).iter().collect();
        assert_eq!(items, vec![val(4), val(5), val(6)]);

        // iteration stops before an improper tail
        let items: Vec<Term> = Term::cons(val(1), val(2)).iter().collect();
        assert_eq!(items, vec![val(1)]);
    }

    #[test]
    fn test_identity_versus_structure() {
        let a1 = sym("a");
        let a2 = sym("a");
        assert_eq!(a1, a2);
        assert!(!a1.is_identical(&a2));
        assert!(a1.is_identical(&a1.clone()));

        let p1 = val([1, 2]);
        let p2 = val([1, 2]);
        assert_eq!(p1, p2);
        assert!(!p1.is_identical(&p2));
        assert!(p1.is_identical(&p1.clone()));

        assert!(Term::Nil.is_identical(&Term::Nil));
        assert!(Term::True.is_identical(&Term::True));
        assert!(!Term::True.is_identical(&Term::Nil));
        assert!(val(3).is_identical(&val(3)));
    }

    #[test]
    fn test_dropping_long_list_does_not_recurse() {
        let mut list = Term::Nil;
        for i in 0..300_000 {
            list = Term::cons(val(i), list);
        }

        // a tail held elsewhere survives the drop of its head
        let tail = list.as_pair().map(|pair| pair.rest()).unwrap_or(Term::Nil);
        drop(list);
        assert_eq!(tail.list_len(), Some(299_999));
        drop(tail);
    }

    #[test]
    fn test_pair_mutation_is_shared() {
        let pair = Term::cons(val(1), val(2));
        let alias = pair.clone();
        if let Some(cell) = pair.as_pair() {
            cell.set_first(val(9));
        }
        assert_eq!(format!("{alias}"), "(9 . 2)");
    }
}
