//! Rough byte-size estimates for cached values.

use story_expr::Value;

/// Approximate heap plus inline footprint, used for the cache memory limit.
pub trait EstimateSize {
    fn estimated_size(&self) -> usize;
}

impl EstimateSize for Value {
    fn estimated_size(&self) -> usize {
        let inline = std::mem::size_of::<Value>();
        match self {
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) => inline,
            Value::String(s) => inline + s.len(),
            Value::Array(items) => inline + items.iter().map(EstimateSize::estimated_size).sum::<usize>(),
            Value::Object(map) => {
                inline
                    + map
                        .iter()
                        .map(|(k, v)| k.len() + v.estimated_size())
                        .sum::<usize>()
            }
        }
    }
}

impl EstimateSize for String {
    fn estimated_size(&self) -> usize {
        std::mem::size_of::<String>() + self.len()
    }
}
