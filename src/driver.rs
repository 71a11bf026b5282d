//! Read-eval-print over a whole source text.
//!
//! Terms are read one at a time and evaluated in order against a single
//! environment, so definitions made by earlier terms are visible to later
//! ones. What happens on an error is decided by the [`ErrorPolicy`].

use std::fmt;
use std::io::{self, Write};

use crate::Error;
use crate::evaluator::{Environment, eval};
use crate::reader::Reader;

/// What to do when a top-level term fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Report nothing and hand the first error back to the caller
    #[default]
    Stop,
    /// Report the error and continue with the next top-level term
    Continue,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub policy: ErrorPolicy,
    /// Do not echo the value of each top-level term
    pub quiet: bool,
}

/// Counts of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub evaluated: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub enum RunError {
    /// A term failed under [`ErrorPolicy::Stop`]
    Eval(Error),
    /// Writing results or diagnostics failed
    Io(io::Error),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RunError::Eval(e) => write!(f, "{e}"),
            RunError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<io::Error> for RunError {
    fn from(e: io::Error) -> Self {
        RunError::Io(e)
    }
}

/// Evaluate every term of `source` in `env`.
///
/// The printed value of each term goes to `out` followed by a newline unless
/// `config.quiet` is set. Under [`ErrorPolicy::Continue`] errors are written
/// to `diagnostics` as `Error: <message>`. A syntax error always ends the run,
/// since the reader cannot find the start of the next term.
pub fn run<W: Write, D: Write>(
    source: &str,
    env: &mut Environment<'_>,
    config: &Config,
    out: &mut W,
    diagnostics: &mut D,
) -> Result<Summary, RunError> {
    let mut summary = Summary::default();

    for item in Reader::new(source) {
        let result = item.and_then(|term| eval(&term, env));
        match result {
            Ok(value) => {
                summary.evaluated += 1;
                if !config.quiet {
                    writeln!(out, "{value}")?;
                }
            }
            Err(e) => {
                summary.failed += 1;
                match config.policy {
                    ErrorPolicy::Stop => return Err(RunError::Eval(e)),
                    ErrorPolicy::Continue => writeln!(diagnostics, "Error: {e}")?,
                }
            }
        }
    }

    Ok(summary)
}
