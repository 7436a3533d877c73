//! Expression Evaluator - walks a syntax tree against the state store.
//!
//! Reads that resolve through the state store are reported to an optional
//! [`DependencyRecorder`] as full dotted paths, which is what lets derived
//! content be invalidated precisely. The language has no assignment, loops
//! or closures, so the set of paths an evaluation touches is exactly what the
//! recorder sees.

mod helpers;
mod ops;

pub use helpers::*;

use crate::compiler::{BinaryOp, Expr, Property, DEFAULT_MAX_DEPTH};
use crate::error::EvalError;
use crate::value::{StateStore, Value};

/// Receives the dotted paths an evaluation reads from the state store.
pub trait DependencyRecorder {
    fn record_access(&mut self, path: &str);
}

impl DependencyRecorder for Vec<String> {
    fn record_access(&mut self, path: &str) {
        self.push(path.to_string());
    }
}

/// Read-only evaluation context: state, helpers and the depth ceiling.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    store: &'a StateStore,
    helpers: &'a Helpers,
    max_depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(store: &'a StateStore, helpers: &'a Helpers) -> Self {
        Self {
            store,
            helpers,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Evaluate `expr`, reporting state reads to `recorder` if one is given.
    ///
    /// Only a depth-limit violation escapes; every other failure becomes
    /// `null` for the sub-expression that caused it.
    pub fn evaluate(
        &self,
        expr: &Expr,
        recorder: Option<&mut dyn DependencyRecorder>,
    ) -> Result<Value, EvalError> {
        let mut walk = Walk {
            ctx: *self,
            recorder,
        };
        walk.eval(expr, 0)
    }
}

struct Walk<'a, 'r> {
    ctx: Evaluator<'a>,
    recorder: Option<&'r mut dyn DependencyRecorder>,
}

impl<'a, 'r> Walk<'a, 'r> {
    fn record(&mut self, path: &str) {
        if let Some(recorder) = self.recorder.as_deref_mut() {
            recorder.record_access(path);
        }
    }

    fn enter(&self, depth: usize) -> Result<usize, EvalError> {
        let depth = depth + 1;
        if depth > self.ctx.max_depth {
            return Err(EvalError::DepthExceeded {
                limit: self.ctx.max_depth,
            });
        }
        Ok(depth)
    }

    fn eval(&mut self, expr: &Expr, depth: usize) -> Result<Value, EvalError> {
        let depth = self.enter(depth)?;

        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Identifier(name) => Ok(self.identifier(name)),
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, depth)?);
                }
                Ok(Value::Array(values))
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(operand, depth)?;
                Ok(ops::apply_unary(*op, &value))
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right, depth),
            Expr::Ternary {
                condition,
                consequent,
                alternate,
            } => {
                if self.eval(condition, depth)?.truthy() {
                    self.eval(consequent, depth)
                } else {
                    self.eval(alternate, depth)
                }
            }
            Expr::Member { .. } => self.member(expr, depth),
            Expr::Call { callee, args } => self.call(callee, args, depth),
        }
    }

    fn identifier(&mut self, name: &str) -> Value {
        if self.ctx.helpers.contains(name) {
            // A helper referenced without calling it has no value.
            return Value::Undefined;
        }
        self.record(name);
        self.ctx.store.get(name).cloned().unwrap_or(Value::Undefined)
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, depth: usize) -> Result<Value, EvalError> {
        let lhs = self.eval(left, depth)?;
        let short_circuit = match op {
            BinaryOp::And => !lhs.truthy(),
            BinaryOp::Or => lhs.truthy(),
            BinaryOp::Coalesce => !lhs.is_nullish(),
            _ => false,
        };
        if short_circuit {
            return Ok(lhs);
        }
        let rhs = self.eval(right, depth)?;
        Ok(ops::apply_binary(op, &lhs, &rhs))
    }

    fn member(&mut self, expr: &Expr, depth: usize) -> Result<Value, EvalError> {
        if let Some(segments) = self.state_path(expr, depth)? {
            self.record(&segments.join("."));
            return Ok(self.ctx.store.get_segments(&segments));
        }

        let Expr::Member { object, property } = expr else {
            return self.eval(expr, depth);
        };
        let target = self.eval(object, depth)?;
        let key = self.property_key(property, depth)?;
        Ok(target.member(&key))
    }

    /// Resolve a member chain rooted at a state variable to its path segments.
    ///
    /// Returns `None` when the chain is rooted at anything else (a call, a
    /// literal, a helper name), in which case it is evaluated as a value.
    fn state_path(&mut self, expr: &Expr, depth: usize) -> Result<Option<Vec<String>>, EvalError> {
        let mut properties = Vec::new();
        let mut current = expr;
        let root = loop {
            match current {
                Expr::Member { object, property } => {
                    properties.push(property);
                    current = object;
                }
                Expr::Identifier(name) if !self.ctx.helpers.contains(name) => break name,
                _ => return Ok(None),
            }
        };

        // The chain counts toward the depth ceiling like nested nodes would.
        let depth = depth + properties.len();
        if depth > self.ctx.max_depth {
            return Err(EvalError::DepthExceeded {
                limit: self.ctx.max_depth,
            });
        }

        let mut segments = Vec::with_capacity(properties.len() + 1);
        segments.push(root.clone());
        for property in properties.into_iter().rev() {
            segments.push(self.property_key(property, depth)?);
        }
        Ok(Some(segments))
    }

    fn property_key(&mut self, property: &Property, depth: usize) -> Result<String, EvalError> {
        match property {
            Property::Static(name) => Ok(name.clone()),
            Property::Computed(expr) => Ok(self.eval(expr, depth)?.to_property_key()),
        }
    }

    fn call(&mut self, callee: &Expr, args: &[Expr], depth: usize) -> Result<Value, EvalError> {
        let helper = match callee {
            Expr::Identifier(name) => self.ctx.helpers.get(name).map(|h| (name, h)),
            _ => None,
        };

        let Some((name, helper)) = helper else {
            // Still evaluated, so its reads are recorded and the depth
            // ceiling applies, but the result is not callable.
            let target = self.eval(callee, depth)?;
            log::debug!("call on non-callable {} value", target.type_name());
            return Ok(Value::Null);
        };

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, depth)?);
        }

        match helper(self.ctx.helpers, &values) {
            Ok(value) => Ok(value),
            Err(err) => {
                log::debug!("helper {}() failed: {}", name, err);
                Ok(Value::Null)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{parse, CompilerConfig};
    use serde_json::json;

    fn store() -> StateStore {
        StateStore::from_json(json!({
            "gold": 10,
            "name": "ayla",
            "player": { "hp": 7, "items": ["rope", "lamp"], "stats": { "str": 12 } },
            "slot": 1,
            "visited": false,
            "max": 999
        }))
    }

    fn eval_with(store: &StateStore, source: &str) -> (Value, Vec<String>) {
        let helpers = Helpers::with_seed(1);
        let expr = parse(source, &CompilerConfig::default()).unwrap();
        let mut reads = Vec::new();
        let value = Evaluator::new(store, &helpers)
            .evaluate(&expr, Some(&mut reads))
            .unwrap();
        (value, reads)
    }

    fn eval(source: &str) -> Value {
        eval_with(&store(), source).0
    }

    #[test]
    fn test_arithmetic_and_dependency() {
        let (value, reads) = eval_with(&store(), "gold + 5");
        assert_eq!(value, Value::Number(15.0));
        assert_eq!(reads, vec!["gold"]);
    }

    #[test]
    fn test_member_chain_records_full_path() {
        let (value, reads) = eval_with(&store(), "player.stats.str * 2");
        assert_eq!(value, Value::Number(24.0));
        assert_eq!(reads, vec!["player.stats.str"]);
    }

    #[test]
    fn test_computed_member_records_index_path() {
        let (value, reads) = eval_with(&store(), "player.items[slot]");
        assert_eq!(value, Value::string("lamp"));
        assert_eq!(reads, vec!["slot", "player.items.1"]);
    }

    #[test]
    fn test_missing_paths_are_undefined() {
        assert_eq!(eval("player.mana"), Value::Undefined);
        assert_eq!(eval("ghost.name"), Value::Undefined);
        assert_eq!(eval("ghost ?? 'none'"), Value::string("none"));
    }

    #[test]
    fn test_length_and_strings() {
        assert_eq!(eval("player.items.length"), Value::Number(2.0));
        assert_eq!(eval("'Hello, ' + capitalize(name)"), Value::string("Hello, Ayla"));
        assert_eq!(eval("name.length"), Value::Number(4.0));
    }

    #[test]
    fn test_helpers_cannot_be_shadowed() {
        let (value, reads) = eval_with(&store(), "max(1, 2)");
        assert_eq!(value, Value::Number(2.0));
        assert!(reads.is_empty());

        // A bare helper name is not a state read either.
        let (value, reads) = eval_with(&store(), "max");
        assert_eq!(value, Value::Undefined);
        assert!(reads.is_empty());
    }

    #[test]
    fn test_short_circuit_skips_reads() {
        let (value, reads) = eval_with(&store(), "visited && gold");
        assert_eq!(value, Value::Bool(false));
        assert_eq!(reads, vec!["visited"]);

        let (value, reads) = eval_with(&store(), "gold || player.hp");
        assert_eq!(value, Value::Number(10.0));
        assert_eq!(reads, vec!["gold"]);
    }

    #[test]
    fn test_ternary() {
        assert_eq!(eval("visited ? 'again' : 'first'"), Value::string("first"));
        assert_eq!(eval("(gold > 5) ? 'rich' : 'poor'"), Value::string("rich"));
        assert_eq!(eval("!visited ? 'new' : 'old'"), Value::string("new"));
    }

    #[test]
    fn test_non_callable_returns_null() {
        let (value, reads) = eval_with(&store(), "gold(1)");
        assert_eq!(value, Value::Null);
        assert_eq!(reads, vec!["gold"]);
        assert_eq!(eval("player.items.join(',')"), Value::Null);
        assert_eq!(eval("(1)(2)"), Value::Null);
    }

    #[test]
    fn test_failing_helper_returns_null() {
        assert_eq!(eval("clamp(1)"), Value::Null);
        assert_eq!(eval("roll('banana')"), Value::Null);
        assert_eq!(eval("clamp(1) ?? 'fallback'"), Value::string("fallback"));
    }

    #[test]
    fn test_array_literal() {
        assert_eq!(eval("join([gold, name], '/')"), Value::string("10/ayla"));
        assert_eq!(eval("[1, 2, 3][2]"), Value::Number(3.0));
    }

    #[test]
    fn test_depth_limit_propagates() {
        let store = store();
        let helpers = Helpers::with_seed(1);

        let mut expr = Expr::number(1.0);
        for _ in 0..150 {
            expr = Expr::unary(crate::compiler::UnaryOp::Negate, expr);
        }

        let result = Evaluator::new(&store, &helpers).evaluate(&expr, None);
        assert_eq!(result, Err(EvalError::DepthExceeded { limit: 100 }));

        let shallow = Evaluator::new(&store, &helpers)
            .with_max_depth(200)
            .evaluate(&expr, None);
        assert_eq!(shallow, Ok(Value::Number(1.0)));
    }

    #[test]
    fn test_deep_member_chain_hits_depth_limit() {
        let store = store();
        let helpers = Helpers::with_seed(1);
        let mut expr = Expr::identifier("player");
        for _ in 0..120 {
            expr = Expr::member(expr, Property::Static("x".into()));
        }
        let result = Evaluator::new(&store, &helpers).evaluate(&expr, None);
        assert!(matches!(result, Err(EvalError::DepthExceeded { .. })));
    }
}
