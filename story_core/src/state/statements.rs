//! Parsing of `;`-separated set statements such as `hp -= 3; flags.met = true`.

use story_expr::Value;

use crate::error::StatementError;

/// Assignment operators accepted in set statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    /// Combine the current value with the evaluated right-hand side.
    ///
    /// Compound operators are numeric; an operand that does not coerce to a
    /// number counts as 0.
    pub fn apply(self, current: &Value, rhs: Value) -> Value {
        let combine: fn(f64, f64) -> f64 = match self {
            AssignOp::Set => return rhs,
            AssignOp::Add => |a, b| a + b,
            AssignOp::Sub => |a, b| a - b,
            AssignOp::Mul => |a, b| a * b,
            AssignOp::Div => |a, b| a / b,
        };
        Value::Number(combine(current.to_number_or_zero(), rhs.to_number_or_zero()))
    }
}

/// One parsed statement: normalized target path, operator and source text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement<'a> {
    pub target: String,
    pub op: AssignOp,
    pub expr: &'a str,
}

/// Split on `;` outside string literals, dropping blank statements.
pub(crate) fn split_statements(text: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                ';' => {
                    statements.push(&text[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    statements.push(&text[start..]);

    statements
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `target op expr`.
pub(crate) fn parse_statement(statement: &str) -> Result<Statement<'_>, StatementError> {
    let missing = || StatementError::MissingOperator {
        statement: statement.to_string(),
    };

    let (eq, op) = find_operator(statement).ok_or_else(missing)?;
    let op_start = match op {
        AssignOp::Set => eq,
        _ => eq - 1,
    };

    let target_text = statement[..op_start].trim();
    let target = parse_target(target_text).ok_or_else(|| StatementError::InvalidTarget {
        statement: statement.to_string(),
        target: target_text.to_string(),
    })?;

    let expr = statement[eq + 1..].trim();
    if expr.is_empty() {
        return Err(StatementError::MissingValue {
            statement: statement.to_string(),
        });
    }

    Ok(Statement { target, op, expr })
}

/// Locate the first assignment `=` outside quotes, with its operator.
///
/// `==` before any assignment means the statement is a comparison, not an
/// assignment.
fn find_operator(statement: &str) -> Option<(usize, AssignOp)> {
    let bytes = statement.as_bytes();
    let mut quote: Option<u8> = None;

    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if b == q && (i == 0 || bytes[i - 1] != b'\\') {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    return None;
                }
                let op = match i.checked_sub(1).map(|j| bytes[j]) {
                    Some(b'+') => AssignOp::Add,
                    Some(b'-') => AssignOp::Sub,
                    Some(b'*') => AssignOp::Mul,
                    Some(b'/') => AssignOp::Div,
                    Some(b'!' | b'<' | b'>') => return None,
                    _ => AssignOp::Set,
                };
                return Some((i, op));
            }
            _ => {}
        }
    }
    None
}

/// Normalize an assignment target to a dotted path.
///
/// Accepts identifier and numeric segments joined by `.`, plus `[0]` and
/// `["key"]` / `['key']` brackets.
pub(crate) fn parse_target(target: &str) -> Option<String> {
    let (first, mut rest) = take_identifier(target)?;
    let mut segments = vec![first.to_string()];

    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix('.') {
            let (segment, tail) = take_identifier(tail).or_else(|| take_digits(tail))?;
            segments.push(segment.to_string());
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('[') {
            let tail = tail.trim_start();
            let (segment, tail) = match take_quoted(tail) {
                Some(found) => found,
                None => take_digits(tail)?,
            };
            let tail = tail.trim_start().strip_prefix(']')?;
            segments.push(segment.to_string());
            rest = tail;
        } else {
            return None;
        }
    }

    Some(segments.join("."))
}

fn take_identifier(s: &str) -> Option<(&str, &str)> {
    let mut chars = s.char_indices();
    let (_, first) = chars.next()?;
    if !(first.is_alphabetic() || first == '_' || first == '$') {
        return None;
    }
    let end = chars
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '$'))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    Some(s.split_at(end))
}

fn take_digits(s: &str) -> Option<(&str, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    (end > 0).then(|| s.split_at(end))
}

fn take_quoted(s: &str) -> Option<(&str, &str)> {
    let quote = s.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &s[1..];
    let end = body.find(quote)?;
    let key = &body[..end];
    if key.is_empty() || key.contains('.') {
        return None;
    }
    Some((key, &body[end + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_respects_quotes() {
        assert_eq!(
            split_statements("a = 1; b = 'x;y' ;; c = \"q\\\";\""),
            vec!["a = 1", "b = 'x;y'", "c = \"q\\\";\""]
        );
        assert!(split_statements("  ;  ").is_empty());
    }

    #[test]
    fn test_parse_operators() {
        let s = parse_statement("hp -= 3").unwrap();
        assert_eq!(s.target, "hp");
        assert_eq!(s.op, AssignOp::Sub);
        assert_eq!(s.expr, "3");

        let s = parse_statement("name = 'a = b'").unwrap();
        assert_eq!(s.op, AssignOp::Set);
        assert_eq!(s.expr, "'a = b'");

        assert_eq!(parse_statement("gold += 1").unwrap().op, AssignOp::Add);
        assert_eq!(parse_statement("gold *= 2").unwrap().op, AssignOp::Mul);
        assert_eq!(parse_statement("gold /= 2").unwrap().op, AssignOp::Div);
    }

    #[test]
    fn test_parse_rejects_non_assignments() {
        assert!(matches!(
            parse_statement("gold == 3"),
            Err(StatementError::MissingOperator { .. })
        ));
        assert!(matches!(
            parse_statement("gold"),
            Err(StatementError::MissingOperator { .. })
        ));
        assert!(matches!(
            parse_statement("gold ="),
            Err(StatementError::MissingValue { .. })
        ));
        assert!(matches!(
            parse_statement("1gold = 3"),
            Err(StatementError::InvalidTarget { .. })
        ));
        assert!(matches!(
            parse_statement("a + b = 3"),
            Err(StatementError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn test_target_normalization() {
        assert_eq!(parse_target("player.hp").as_deref(), Some("player.hp"));
        assert_eq!(parse_target("items[0]").as_deref(), Some("items.0"));
        assert_eq!(parse_target("items.0.name").as_deref(), Some("items.0.name"));
        assert_eq!(parse_target("flags[\"met\"]").as_deref(), Some("flags.met"));
        assert_eq!(parse_target("flags['met'].at").as_deref(), Some("flags.met.at"));
        assert_eq!(parse_target("$score").as_deref(), Some("$score"));

        assert_eq!(parse_target(""), None);
        assert_eq!(parse_target("a."), None);
        assert_eq!(parse_target("a[b]"), None);
        assert_eq!(parse_target("a['x.y']"), None);
        assert_eq!(parse_target("a[0"), None);
    }

    #[test]
    fn test_compound_coerces_to_zero() {
        let current = Value::Number(10.0);
        assert_eq!(AssignOp::Sub.apply(&current, Value::Number(3.0)), Value::Number(7.0));
        assert_eq!(
            AssignOp::Add.apply(&current, Value::string("abc")),
            Value::Number(10.0)
        );
        assert_eq!(
            AssignOp::Add.apply(&Value::Undefined, Value::Number(2.0)),
            Value::Number(2.0)
        );
        assert_eq!(
            AssignOp::Set.apply(&current, Value::string("x")),
            Value::string("x")
        );
    }
}
