//! Ordered fallback lookup over provider-shaped JSON
//!
//! Upstream adapters name the same field differently, so every
//! field is read through a list of candidate paths and the first
//! present value wins.

use serde_json::Value;

/// A path of object keys from the root of a payload
pub type FieldPath<'a> = &'a [&'a str];

/// Follow `path` through nested objects
pub fn lookup<'v>(value: &'v Value, path: FieldPath<'_>)
  -> Option<&'v Value>
{   path.iter()
      .try_fold(value, |current, key| current.get(*key))
}

/// A value counts as present when it is not null and,
/// for strings, not empty.
pub fn is_present(value: &Value) -> bool
{   match value
    {   Value::Null => false
      , Value::String(s) => !s.is_empty()
      , _ => true
    }
}

/// First candidate holding an object; other values are skipped
pub fn first_object<'v>(
  value: &'v Value
, candidates: &[FieldPath<'_>]
) -> Option<&'v Value>
{   candidates.iter()
      .filter_map(|path| lookup(value, path))
      .find(|v| v.is_object())
}

/// First present candidate rendered as text.
/// Numbers and booleans are stringified, containers are skipped.
pub fn first_string(
  value: &Value
, candidates: &[FieldPath<'_>]
) -> Option<String>
{   candidates.iter()
      .filter_map(|path| lookup(value, path))
      .filter(|v| is_present(v))
      .find_map(as_text)
}

/// First present candidate that reads as a non-negative integer
pub fn first_u64(
  value: &Value
, candidates: &[FieldPath<'_>]
) -> Option<u64>
{   candidates.iter()
      .filter_map(|path| lookup(value, path))
      .filter(|v| is_present(v))
      .find_map(|v| as_f64(v).filter(|n| *n >= 0.0))
      .map(|n| n.round() as u64)
}

/// First present candidate that reads as a number
pub fn first_f64(
  value: &Value
, candidates: &[FieldPath<'_>]
) -> Option<f64>
{   candidates.iter()
      .filter_map(|path| lookup(value, path))
      .filter(|v| is_present(v))
      .find_map(as_f64)
}

fn as_text(value: &Value) -> Option<String>
{   match value
    {   Value::String(s) => Some(s.clone())
      , Value::Number(n) => Some(n.to_string())
      , Value::Bool(b) => Some(b.to_string())
      , _ => None
    }
}

fn as_f64(value: &Value) -> Option<f64>
{   match value
    {   Value::Number(n) => n.as_f64()
      , Value::String(s) => s.trim().parse::<f64>().ok()
            .filter(|n| n.is_finite())
      , _ => None
    }
}
