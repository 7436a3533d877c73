//! The fixed helper table available to every expression.

use indexmap::IndexMap;
use std::cell::Cell;
use std::fmt;
use uuid::Uuid;

use crate::error::HelperError;
use crate::value::Value;

/// Signature every helper implements.
pub type HelperFn = fn(&Helpers, &[Value]) -> Result<Value, HelperError>;

/// Upper bound on the number of dice a single `roll` may throw.
const MAX_DICE: u32 = 1000;

/// Named helper functions plus the random source the dice helpers draw from.
///
/// Helpers are resolved before state variables, so a story variable named
/// `max` can never shadow the helper.
pub struct Helpers {
    table: IndexMap<&'static str, HelperFn>,
    rng: DiceRng,
}

impl Helpers {
    /// Standard helper table seeded from a fresh UUID.
    pub fn new() -> Self {
        Self::with_rng(DiceRng::from_entropy())
    }

    /// Standard helper table with a deterministic random sequence.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(DiceRng::new(seed))
    }

    fn with_rng(rng: DiceRng) -> Self {
        let mut table: IndexMap<&'static str, HelperFn> = IndexMap::new();

        // Math
        table.insert("abs", |_, a| unary_math("abs", a, f64::abs));
        table.insert("floor", |_, a| unary_math("floor", a, f64::floor));
        table.insert("ceil", |_, a| unary_math("ceil", a, f64::ceil));
        table.insert("round", |_, a| unary_math("round", a, |n| (n + 0.5).floor()));
        table.insert("trunc", |_, a| unary_math("trunc", a, f64::trunc));
        table.insert("sqrt", |_, a| unary_math("sqrt", a, f64::sqrt));
        table.insert("sign", |_, a| unary_math("sign", a, sign));
        table.insert("pow", pow);
        table.insert("min", |_, a| Ok(Value::Number(fold_numbers(a, f64::INFINITY, f64::min))));
        table.insert("max", |_, a| Ok(Value::Number(fold_numbers(a, f64::NEG_INFINITY, f64::max))));
        table.insert("clamp", clamp);

        // Randomness
        table.insert("random", |h, _| Ok(Value::Number(h.rng.next_f64())));
        table.insert("randomInt", random_int);
        table.insert("roll", roll);
        table.insert("either", either);
        table.insert("chance", chance);

        // Strings and arrays
        table.insert("upper", |_, a| map_string("upper", a, |s| s.to_uppercase()));
        table.insert("lower", |_, a| map_string("lower", a, |s| s.to_lowercase()));
        table.insert("trim", |_, a| map_string("trim", a, |s| s.trim().to_string()));
        table.insert("capitalize", |_, a| map_string("capitalize", a, capitalize));
        table.insert("len", len);
        table.insert("includes", includes);
        table.insert("join", join);
        table.insert("str", |_, a| Ok(Value::String(arg(a, 0).to_string())));
        table.insert("num", |_, a| Ok(Value::Number(arg(a, 0).to_number())));
        table.insert("int", |_, a| Ok(Value::Number(arg(a, 0).to_number().trunc())));
        table.insert("first", |_, a| Ok(end_of(arg(a, 0), true)));
        table.insert("last", |_, a| Ok(end_of(arg(a, 0), false)));
        table.insert("plural", plural);

        Self { table, rng }
    }

    /// Look up a helper by name.
    pub fn get(&self, name: &str) -> Option<HelperFn> {
        self.table.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Call a helper by name. Unknown names are an invalid-argument error.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, HelperError> {
        match self.get(name) {
            Some(helper) => helper(self, args),
            None => Err(HelperError::InvalidArgument {
                name: "call",
                reason: format!("no helper named '{}'", name),
            }),
        }
    }

    /// Names of all helpers, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.table.keys().copied()
    }

    /// Register an additional helper, replacing any helper of the same name.
    pub fn register(&mut self, name: &'static str, helper: HelperFn) {
        self.table.insert(name, helper);
    }

    /// Reseed the random source.
    pub fn reseed(&self, seed: u64) {
        self.rng.reseed(seed);
    }

    /// Draw a uniform float in `[0, 1)`.
    pub fn random(&self) -> f64 {
        self.rng.next_f64()
    }
}

impl Default for Helpers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Helpers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Helpers")
            .field("names", &self.table.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// xorshift64* generator. Not cryptographic; good enough for dice.
#[derive(Debug)]
pub struct DiceRng {
    state: Cell<u64>,
}

impl DiceRng {
    pub fn new(seed: u64) -> Self {
        let rng = Self {
            state: Cell::new(1),
        };
        rng.reseed(seed);
        rng
    }

    /// Seed from a v4 UUID's random bits.
    pub fn from_entropy() -> Self {
        let bits = Uuid::new_v4().as_u128();
        Self::new((bits >> 64) as u64 ^ bits as u64)
    }

    pub fn reseed(&self, seed: u64) {
        // Zero is a fixed point of xorshift.
        self.state
            .set(if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed });
    }

    pub fn next_u64(&self) -> u64 {
        let mut x = self.state.get();
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state.set(x);
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_f64(&self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in `[lo, hi]`.
    ///
    /// The span is computed in 128 bits, so the full `i64` range is allowed.
    pub fn range_inclusive(&self, lo: i64, hi: i64) -> i64 {
        let span = (i128::from(hi) - i128::from(lo)) as u128 + 1;
        let offset = u128::from(self.next_u64()) % span;
        (i128::from(lo) + offset as i128) as i64
    }
}

fn arg(args: &[Value], index: usize) -> &Value {
    static UNDEFINED: Value = Value::Undefined;
    args.get(index).unwrap_or(&UNDEFINED)
}

fn require(name: &'static str, args: &[Value], min: usize, expected: &'static str) -> Result<(), HelperError> {
    if args.len() < min {
        Err(HelperError::Arity {
            name,
            expected,
            got: args.len(),
        })
    } else {
        Ok(())
    }
}

fn unary_math(name: &'static str, args: &[Value], f: fn(f64) -> f64) -> Result<Value, HelperError> {
    require(name, args, 1, "1")?;
    Ok(Value::Number(f(args[0].to_number())))
}

fn sign(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 {
        n
    } else {
        n.signum()
    }
}

fn pow(_: &Helpers, args: &[Value]) -> Result<Value, HelperError> {
    require("pow", args, 2, "2")?;
    Ok(Value::Number(args[0].to_number().powf(args[1].to_number())))
}

/// Fold numeric arguments; a single array argument is spread.
fn fold_numbers(args: &[Value], init: f64, f: fn(f64, f64) -> f64) -> f64 {
    let values: &[Value] = match args {
        [Value::Array(items)] => items,
        _ => args,
    };
    values.iter().fold(init, |acc, v| {
        let n = v.to_number();
        if n.is_nan() || acc.is_nan() {
            f64::NAN
        } else {
            f(acc, n)
        }
    })
}

fn clamp(_: &Helpers, args: &[Value]) -> Result<Value, HelperError> {
    require("clamp", args, 3, "3")?;
    let (value, lo, hi) = (args[0].to_number(), args[1].to_number(), args[2].to_number());
    if lo > hi {
        return Err(HelperError::InvalidArgument {
            name: "clamp",
            reason: format!("lower bound {} exceeds upper bound {}", lo, hi),
        });
    }
    Ok(Value::Number(value.max(lo).min(hi)))
}

fn random_int(helpers: &Helpers, args: &[Value]) -> Result<Value, HelperError> {
    require("randomInt", args, 2, "2")?;
    let a = args[0].to_number();
    let b = args[1].to_number();
    if !a.is_finite() || !b.is_finite() {
        return Err(HelperError::InvalidArgument {
            name: "randomInt",
            reason: "bounds must be finite numbers".to_string(),
        });
    }
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let (lo, hi) = (lo.ceil() as i64, hi.floor() as i64);
    if lo > hi {
        return Err(HelperError::InvalidArgument {
            name: "randomInt",
            reason: "no integer lies between the bounds".to_string(),
        });
    }
    Ok(Value::Number(helpers.rng.range_inclusive(lo, hi) as f64))
}

/// Parsed dice notation: `count`d`sides` plus a flat modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceSpec {
    pub count: u32,
    pub sides: u32,
    pub modifier: i64,
}

impl DiceSpec {
    /// Parse `"2d6"`, `"d20"`, `"3d8+2"` or `"1d4-1"`.
    pub fn parse(notation: &str) -> Option<Self> {
        let compact: String = notation.chars().filter(|c| !c.is_whitespace()).collect();
        let lower = compact.to_ascii_lowercase();
        let (count, rest) = lower.split_once('d')?;
        let count = if count.is_empty() { 1 } else { count.parse().ok()? };

        let (sides, modifier) = match rest.find(['+', '-']) {
            Some(i) => (&rest[..i], rest[i..].parse::<i64>().ok()?),
            None => (rest, 0),
        };
        let sides = sides.parse().ok()?;

        Some(Self {
            count,
            sides,
            modifier,
        })
    }

    /// `None` when the modifier pushes the total out of range.
    fn roll(&self, rng: &DiceRng) -> Option<i64> {
        let total: i64 = (0..self.count)
            .map(|_| rng.range_inclusive(1, i64::from(self.sides)))
            .sum();
        total.checked_add(self.modifier)
    }
}

fn roll(helpers: &Helpers, args: &[Value]) -> Result<Value, HelperError> {
    let spec = match args {
        [Value::String(notation)] => DiceSpec::parse(notation).ok_or_else(|| HelperError::InvalidArgument {
            name: "roll",
            reason: format!("'{}' is not dice notation", notation),
        })?,
        [sides] => DiceSpec {
            count: 1,
            sides: sides.to_number() as u32,
            modifier: 0,
        },
        [count, sides, ..] => DiceSpec {
            count: count.to_number() as u32,
            sides: sides.to_number() as u32,
            modifier: 0,
        },
        [] => {
            return Err(HelperError::Arity {
                name: "roll",
                expected: "1 or 2",
                got: 0,
            })
        }
    };

    if spec.sides == 0 || spec.count == 0 || spec.count > MAX_DICE {
        return Err(HelperError::InvalidArgument {
            name: "roll",
            reason: format!(
                "need 1..={} dice with at least one side, got {}d{}",
                MAX_DICE, spec.count, spec.sides
            ),
        });
    }

    let total = spec.roll(&helpers.rng).ok_or_else(|| HelperError::InvalidArgument {
        name: "roll",
        reason: format!("modifier {} overflows the total", spec.modifier),
    })?;
    Ok(Value::Number(total as f64))
}

fn either(helpers: &Helpers, args: &[Value]) -> Result<Value, HelperError> {
    let choices: &[Value] = match args {
        [Value::Array(items)] => items,
        _ => args,
    };
    if choices.is_empty() {
        return Ok(Value::Undefined);
    }
    let index = helpers.rng.range_inclusive(0, choices.len() as i64 - 1) as usize;
    Ok(choices[index].clone())
}

fn chance(helpers: &Helpers, args: &[Value]) -> Result<Value, HelperError> {
    require("chance", args, 1, "1")?;
    let mut p = args[0].to_number_or_zero();
    // Accept percentages as well as probabilities.
    if p > 1.0 {
        p /= 100.0;
    }
    Ok(Value::Bool(helpers.rng.next_f64() < p))
}

fn map_string(name: &'static str, args: &[Value], f: fn(&str) -> String) -> Result<Value, HelperError> {
    require(name, args, 1, "1")?;
    Ok(Value::String(f(&args[0].to_string())))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn len(_: &Helpers, args: &[Value]) -> Result<Value, HelperError> {
    let n = match arg(args, 0) {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => 0,
    };
    Ok(Value::Number(n as f64))
}

fn includes(_: &Helpers, args: &[Value]) -> Result<Value, HelperError> {
    require("includes", args, 2, "2")?;
    let found = match &args[0] {
        Value::Array(items) => items.iter().any(|item| item.strict_eq(&args[1])),
        Value::String(s) => s.contains(&args[1].to_string()),
        Value::Object(map) => map.contains_key(&args[1].to_property_key()),
        _ => false,
    };
    Ok(Value::Bool(found))
}

fn join(_: &Helpers, args: &[Value]) -> Result<Value, HelperError> {
    let separator = match args.get(1) {
        Some(sep) if !sep.is_nullish() => sep.to_string(),
        _ => ", ".to_string(),
    };
    match arg(args, 0) {
        Value::Array(items) => Ok(Value::String(
            items
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_string() })
                .collect::<Vec<_>>()
                .join(&separator),
        )),
        other => Err(HelperError::InvalidArgument {
            name: "join",
            reason: format!("expected an array, got {}", other.type_name()),
        }),
    }
}

fn end_of(value: &Value, front: bool) -> Value {
    match value {
        Value::Array(items) => {
            let item = if front { items.first() } else { items.last() };
            item.cloned().unwrap_or(Value::Undefined)
        }
        Value::String(s) => {
            let c = if front { s.chars().next() } else { s.chars().last() };
            c.map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Undefined)
        }
        _ => Value::Undefined,
    }
}

/// `plural(n, "coin")` → `"coin"` or `"coins"`; an explicit plural form may follow.
fn plural(_: &Helpers, args: &[Value]) -> Result<Value, HelperError> {
    require("plural", args, 2, "2 or 3")?;
    let singular = args[1].to_string();
    if args[0].to_number() == 1.0 {
        return Ok(Value::String(singular));
    }
    let plural = match args.get(2) {
        Some(form) if !form.is_nullish() => form.to_string(),
        _ => format!("{}s", singular),
    };
    Ok(Value::String(plural))
}
