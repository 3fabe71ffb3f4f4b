//! Snapshot serializer: the data field subset of a view model as JSON.

use crate::{
    error::{DefinitionError, Error},
    schema::{Schema, ViewModel},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current values of all data fields, keyed by field name.
///
/// Fields holding no value are kept as explicit `null` so that "absent" and
/// "present but empty" stay distinguishable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Map<String, Value>);

impl Snapshot {
    /// Parse the JSON text submitted by the client.
    pub fn parse(text: &str) -> Result<Self, Error> {
        match serde_json::from_str(text) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(Error::InvalidSnapshot(format!(
                "expected an object, got {}",
                kind_of(&other)
            ))),
            Err(e) => Err(Error::InvalidSnapshot(e.to_string())),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

impl From<Map<String, Value>> for Snapshot {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// How an instance is mounted on the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mount {
    /// Root instance, prop fields are ordinary data.
    Page,
    /// Embedded instance, prop fields are owned by the parent.
    Component,
}

/// Serialize the data fields of `vm`.
///
/// Prop fields are left out when mounted as a component.
pub fn serialize<VM: ViewModel>(
    vm: &VM,
    schema: &Schema<VM>,
    mount: Mount,
) -> Result<Snapshot, DefinitionError> {
    let mut map = to_object(vm)?;

    if mount == Mount::Component {
        map.retain(|field, _| !schema.is_prop_field(field));
    }

    Ok(Snapshot(map))
}

/// Apply a client snapshot to `vm`.
///
/// Each submitted field replaces the instance's field as a whole, nested
/// objects are never merged. Fields unknown to the view model are ignored,
/// fields missing from the snapshot keep their current value.
pub fn populate<VM: ViewModel>(vm: &mut VM, snapshot: &Snapshot) -> Result<(), Error> {
    let mut current = to_object(vm)?;

    for (field, value) in snapshot.iter() {
        if let Some(slot) = current.get_mut(field) {
            *slot = value.clone();
        }
    }

    *vm = serde_json::from_value(Value::Object(current))
        .map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

    Ok(())
}

fn to_object<VM: ViewModel>(vm: &VM) -> Result<Map<String, Value>, DefinitionError> {
    match serde_json::to_value(vm) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(DefinitionError::NotAnObject {
            type_name: std::any::type_name::<VM>(),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
