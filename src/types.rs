//! Shared value types.

use serde_json::{Map, Value};

/// A module's option bag: the parsed `data-module-options` object.
pub type OptionBag = Map<String, Value>;

/// Loose truthiness for flags such as `defaultModule`: null, false, 0,
/// NaN and "" are false, everything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// True if `key` is present in `options` and truthy.
pub fn option_flag(options: &OptionBag, key: &str) -> bool {
    options.get(key).is_some_and(is_truthy)
}

/// Shallow merge: keys in `overrides` replace keys in `base`.
pub fn merge_options(base: &OptionBag, overrides: &OptionBag) -> OptionBag {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
