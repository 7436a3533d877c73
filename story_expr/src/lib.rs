//! # Story Expressions
//!
//! The pure side of the narrative state engine: the value model, the state
//! store, the expression compiler and the evaluator. Nothing in this crate
//! holds mutable engine state beyond the compiler's parse cache; history,
//! dependency tracking and result caching live in `story_core`.

pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod value;

pub use compiler::{
    parse, BinaryOp, Compiler, CompilerConfig, CompilerStats, Expr, Property, UnaryOp,
    DEFAULT_MAX_DEPTH,
};
pub use error::{EvalError, HelperError, ParseError, PathError};
pub use evaluator::{DependencyRecorder, DiceRng, DiceSpec, Evaluator, HelperFn, Helpers};
pub use value::{format_number, Map, StateStore, Value};
