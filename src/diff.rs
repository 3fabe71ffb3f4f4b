//! Diff engine: top level change set between two snapshots.

use crate::{script::Script, snapshot::Snapshot};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response of an update cycle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Changed data fields with their new values.
    pub update: Map<String, Value>,
    /// Script accumulated while the action ran.
    pub js: String,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.update.is_empty() && self.js.is_empty()
    }
}

/// Compare `prior` with `posterior` and drain `script` into the result.
///
/// Values are compared as a whole per top level field. Fields missing from
/// `posterior` are never reported.
pub fn diff(prior: &Snapshot, posterior: &Snapshot, script: &mut Script) -> ChangeSet {
    let update = posterior
        .iter()
        .filter(|(field, value)| match prior.get(field) {
            None => !is_empty_value(value),
            Some(before) => !structurally_equal(before, value),
        })
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect();

    ChangeSet {
        update,
        js: script.flush(),
    }
}

/// `null`, `""`, `[]` and `{}`.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Deep equality where `1` and `1.0` are the same number.
pub fn structurally_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x == y {
                return true;
            }

            match (x.as_i64(), y.as_i64(), x.as_u64(), y.as_u64()) {
                (Some(_), Some(_), _, _) | (_, _, Some(_), Some(_)) => false,
                _ => x.as_f64().zip(y.as_f64()).is_some_and(|(x, y)| x == y),
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| structurally_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| structurally_equal(v, w)))
        }
        _ => a == b,
    }
}
