//! Projects typed API objects into ranked mappings.
//!
//! `serde_json` does the struct-to-tree step; this module drops absent fields,
//! applies skip lists and stamps each surviving key with its rank.

use serde::Serialize;
use serde_json::Value as Json;
use tracing::debug;

use crate::error::GenerateError;
use crate::order::Order;
use crate::value::{Mapping, Scalar, Value};

/// Converts `obj` into a mapping with every non-null, non-skipped field.
///
/// Keys already present in `dst` are left as they are, which lets a caller
/// pre-seed fields with custom values or ranks. Without an `order` all new
/// keys share rank 0 and fall back to key order when emitted.
pub fn convert_to_mapping<T>(
    obj: &T,
    mut order: Option<&mut Order>,
    skip_fields: &[&str],
    mut dst: Mapping,
) -> Result<Value, GenerateError>
where
    T: Serialize + ?Sized,
{
    let object = match serde_json::to_value(obj)? {
        Json::Object(object) => object,
        other => {
            return Err(GenerateError::Conversion(format!(
                "expected an object, got {}",
                json_kind(&other)
            )))
        }
    };

    for (key, field) in object {
        if skip_fields.contains(&key.as_str()) {
            debug!(field = %key, "Skipping field");
            continue;
        }
        if dst.contains_key(&key) {
            continue;
        }
        let Some(value) = from_json(field)? else {
            continue;
        };
        let rank = match order.as_deref_mut() {
            Some(order) => order.get(&key),
            None => 0,
        };
        dst.insert(key, rank, value);
    }

    Ok(Value::Mapping(dst))
}

/// Converts a JSON tree into a value tree, returning `None` for nulls and
/// empty collections. Nested mapping keys are ranked in serialization order.
pub fn from_json(json: Json) -> Result<Option<Value>, GenerateError> {
    let value = match json {
        Json::Null => return Ok(None),
        Json::Bool(b) => Value::Scalar(Scalar::Bool(b)),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Scalar(Scalar::Int(i))
            } else if n.is_f64() {
                match n.as_f64() {
                    Some(f) => Value::Scalar(Scalar::Float(f)),
                    None => return Err(GenerateError::Conversion(format!("number {n}"))),
                }
            } else {
                return Err(GenerateError::Conversion(format!(
                    "integer {n} does not fit in a signed 64-bit integer"
                )));
            }
        }
        Json::String(s) => Value::Scalar(Scalar::String(s)),
        Json::Array(items) => {
            if items.is_empty() {
                return Ok(None);
            }
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                // Positions matter in a sequence: nothing is dropped, and an
                // empty collection stays a collection.
                let empty = match &item {
                    Json::Object(_) => Value::Mapping(Mapping::new()),
                    Json::Array(_) => Value::Sequence(Vec::new()),
                    _ => Value::Nil,
                };
                out.push(from_json(item)?.unwrap_or(empty));
            }
            Value::Sequence(out)
        }
        Json::Object(object) => {
            let mut order = Order::default();
            let mut mapping = Mapping::new();
            for (key, field) in object {
                if let Some(value) = from_json(field)? {
                    let rank = order.get(&key);
                    mapping.insert(key, rank, value);
                }
            }
            if mapping.is_empty() {
                return Ok(None);
            }
            Value::Mapping(mapping)
        }
    };
    Ok(Some(value))
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "a sequence",
        Json::Object(_) => "an object",
    }
}
