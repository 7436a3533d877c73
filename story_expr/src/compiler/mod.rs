//! Expression Compiler - source text to cached, immutable syntax trees.
//!
//! Compilation never fails from the caller's point of view: a syntax error
//! yields the shared null tree, which is cached like any other result so a
//! broken expression is not reparsed on every use.

mod ast;
mod lexer;
mod parser;

pub use ast::*;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ParseError;

/// Default nesting ceiling shared by the parser and the evaluator.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Default maximum source length, in characters.
pub const DEFAULT_MAX_SOURCE_LEN: usize = 10_000;

/// Default number of compiled trees kept in the cache.
pub const DEFAULT_CACHE_SIZE: usize = 1000;

/// Compiler and evaluator limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Maximum nesting depth for parsing and evaluation.
    pub max_depth: usize,

    /// Sources longer than this many characters are rejected unparsed.
    pub max_source_len: usize,

    /// Capacity of the compilation cache.
    pub cache_size: usize,

    /// Log syntax errors at `warn` instead of `debug`.
    pub dev_mode: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_source_len: DEFAULT_MAX_SOURCE_LEN,
            cache_size: DEFAULT_CACHE_SIZE,
            dev_mode: false,
        }
    }
}

/// Counters exposed for observing the compilation cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompilerStats {
    /// Times the tokenizer and parser actually ran.
    pub parses: u64,
    pub hits: u64,
    pub misses: u64,
    /// Sources that failed to parse.
    pub failures: u64,
    /// Sources rejected for length without parsing.
    pub rejected: u64,
}

/// Parse a source string without caching, reporting the error if any.
pub fn parse(source: &str, config: &CompilerConfig) -> Result<Expr, ParseError> {
    let len = source.chars().count();
    if len > config.max_source_len {
        return Err(ParseError::TooLong {
            len,
            limit: config.max_source_len,
        });
    }
    let tokens = lexer::tokenize(source)?;
    parser::parse_tokens(&tokens, config.max_depth)
}

/// LRU-cached compiler.
#[derive(Debug)]
pub struct Compiler {
    config: CompilerConfig,
    cache: IndexMap<String, Arc<Expr>>,
    sentinel: Arc<Expr>,
    stats: CompilerStats,
}

impl Compiler {
    /// Create a compiler with the given limits.
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            cache: IndexMap::new(),
            sentinel: Arc::new(Expr::null()),
            stats: CompilerStats::default(),
        }
    }

    /// Create a compiler with default limits.
    pub fn with_defaults() -> Self {
        Self::new(CompilerConfig::default())
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile `source`, returning the cached tree when there is one.
    pub fn compile(&mut self, source: &str) -> Arc<Expr> {
        let len = source.chars().count();
        if len > self.config.max_source_len {
            self.stats.rejected += 1;
            self.report(&ParseError::TooLong {
                len,
                limit: self.config.max_source_len,
            }, "<oversized source>");
            return Arc::clone(&self.sentinel);
        }

        if let Some(index) = self.cache.get_index_of(source) {
            self.stats.hits += 1;
            let last = self.cache.len() - 1;
            self.cache.move_index(index, last);
            if let Some((_, expr)) = self.cache.get_index(last) {
                return Arc::clone(expr);
            }
        }

        self.stats.misses += 1;
        self.stats.parses += 1;

        let expr = match parse(source, &self.config) {
            Ok(expr) => Arc::new(expr),
            Err(err) => {
                self.stats.failures += 1;
                self.report(&err, source);
                Arc::clone(&self.sentinel)
            }
        };

        self.cache.insert(source.to_string(), Arc::clone(&expr));
        while self.cache.len() > self.config.cache_size.max(1) {
            self.cache.shift_remove_index(0);
        }

        expr
    }

    /// Whether `expr` is the substitute produced for a failed compilation.
    ///
    /// A literal `null` in source compiles to a distinct tree, so this tells
    /// the two apart.
    pub fn is_failure(&self, expr: &Arc<Expr>) -> bool {
        Arc::ptr_eq(expr, &self.sentinel)
    }

    pub fn stats(&self) -> CompilerStats {
        self.stats
    }

    /// Number of cached trees.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached tree.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    fn report(&self, err: &ParseError, source: &str) {
        if self.config.dev_mode {
            log::warn!("expression failed to compile: {} in `{}`", err, source);
        } else {
            log::debug!("expression failed to compile: {}", err);
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::with_defaults()
    }
}
