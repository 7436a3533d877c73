//! Error types for compilation, evaluation, helpers and path writes.

use thiserror::Error;

/// Why a source string failed to compile.
///
/// Never surfaces from [`Compiler::compile`](crate::Compiler::compile), which
/// substitutes a null tree instead; returned by [`parse`](crate::parse) for
/// callers that want the detail.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("invalid escape sequence at offset {offset}")]
    InvalidEscape { offset: usize },

    #[error("invalid number literal '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("assignment is not allowed in expressions (offset {offset})")]
    AssignmentNotAllowed { offset: usize },

    #[error("expected {expected}, found {found} at offset {offset}")]
    UnexpectedToken {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("nesting depth exceeds the limit of {limit}")]
    DepthExceeded { limit: usize },

    #[error("source is {len} characters long, the limit is {limit}")]
    TooLong { len: usize, limit: usize },
}

/// Errors that escape an evaluation.
///
/// Everything else (bad calls, failing helpers) is contained and turned into
/// `null` for the failing sub-expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("evaluation depth exceeds the limit of {limit}")]
    DepthExceeded { limit: usize },
}

/// Failure raised by a helper function. The evaluator turns it into `null`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HelperError {
    #[error("{name}() expects {expected} argument(s), got {got}")]
    Arity {
        name: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("{name}(): {reason}")]
    InvalidArgument { name: &'static str, reason: String },
}

/// Failure to write a value at a dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path '{path}' is empty or contains an empty segment")]
    EmptySegment { path: String },

    #[error("cannot write through '{segment}' in '{path}': not an object or array")]
    NotContainer { path: String, segment: String },

    #[error("'{segment}' is not a valid array index in '{path}'")]
    InvalidIndex { path: String, segment: String },
}
