//! Shared error type for every pass of the pipeline.
//!
//! Each variant is fatal: the first error stops the run and travels back to
//! the caller through `?`. A driver prints the Display text to stderr and
//! exits with a nonzero status.

use snafu::Snafu;

use crate::tree::NodeKind;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  #[snafu(display("Unknown identifier '{name}'"))]
  UnknownIdentifier { name: String },

  #[snafu(display(
    "function '{function}' expects {expected} arguments, but is called with {actual}"
  ))]
  ArityMismatch {
    function: String,
    expected: usize,
    actual: usize,
  },

  #[snafu(display("'{name}' is not a function and cannot be called"))]
  NotCallable { name: String },

  #[snafu(display("function '{name}' cannot be used as a value"))]
  NotAValue { name: String },

  #[snafu(display("scope stack underflow"))]
  ScopeUnderflow,

  #[snafu(display("{kind} node reached code generation without being bound"))]
  Unbound { kind: NodeKind },

  #[snafu(display("malformed {kind} node: {reason}"))]
  MalformedNode { kind: NodeKind, reason: &'static str },
}

impl CompileError {
  /// Shorthand for a malformed-tree report on a node of `kind`.
  pub(crate) fn malformed(kind: NodeKind, reason: &'static str) -> Self {
    Self::MalformedNode { kind, reason }
  }
}
