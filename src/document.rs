//! # Document Model
//!
//! The ordered collection of component instances placed on the canvas during
//! one editing session.
//!
//! ## Key Invariants
//!
//! 1. **Insertion Order**: `list_instances` returns instances in the order they
//!    were added; this is also the render and export order
//! 2. **Stable Identity**: an `InstanceId` is never reused within a document,
//!    including after `clear`
//! 3. **Null Keys**: a top-level `null` in a bag or update patch deletes the
//!    key; a `null` nested in a list or map is kept as-is and rejected on export
//! 4. **Session Scoped**: nothing here outlives the session that owns it

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::catalog::ComponentCategory;
use crate::error::DocumentError;
use crate::PropertyBag;

/// Opaque handle of a placed instance, displayed as `inst-N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inst-{}", self.0)
    }
}

impl std::str::FromStr for InstanceId {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("inst-")
            .unwrap_or(s)
            .parse::<u64>()
            .map(InstanceId)
            .map_err(|_| DocumentError::InvalidInstanceId(s.to_string()))
    }
}

impl Serialize for InstanceId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InstanceId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInstance {
    pub type_id: String,
    pub category: ComponentCategory,
    pub properties: PropertyBag,
    pub position: Position,
}

/// An instance together with its handle, as listed by the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedInstance {
    pub id: InstanceId,
    #[serde(flatten)]
    pub instance: ComponentInstance,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentModel {
    instances: IndexMap<InstanceId, ComponentInstance>,
    next_id: u64,
}

/// Drop top-level `null` keys. Nested `null`s stay put so export can name them.
fn drop_null_keys(props: PropertyBag) -> PropertyBag {
    props.into_iter().filter(|(_, v)| !v.is_null()).collect()
}

impl DocumentModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_instance(
        &mut self,
        type_id: impl Into<String>,
        category: ComponentCategory,
        properties: PropertyBag,
        position: Position,
    ) -> InstanceId {
        self.next_id += 1;
        let id = InstanceId(self.next_id);
        self.instances.insert(
            id,
            ComponentInstance {
                type_id: type_id.into(),
                category,
                properties: drop_null_keys(properties),
                position,
            },
        );
        id
    }

    /// Shallow merge of `patch` into the instance's properties.
    pub fn update_properties(&mut self, id: InstanceId, patch: PropertyBag) -> Result<(), DocumentError> {
        let instance = self
            .instances
            .get_mut(&id)
            .ok_or(DocumentError::UnknownInstance(id))?;
        for (key, value) in patch {
            if value.is_null() {
                instance.properties.remove(&key);
            } else {
                instance.properties.insert(key, value);
            }
        }
        Ok(())
    }

    pub fn remove_instance(&mut self, id: InstanceId) -> Result<ComponentInstance, DocumentError> {
        self.instances
            .shift_remove(&id)
            .ok_or(DocumentError::UnknownInstance(id))
    }

    pub fn move_instance(&mut self, id: InstanceId, position: Position) -> Result<(), DocumentError> {
        let instance = self
            .instances
            .get_mut(&id)
            .ok_or(DocumentError::UnknownInstance(id))?;
        instance.position = position;
        Ok(())
    }

    pub fn get(&self, id: InstanceId) -> Option<&ComponentInstance> {
        self.instances.get(&id)
    }

    pub fn list_instances(&self) -> impl Iterator<Item = (InstanceId, &ComponentInstance)> {
        self.instances.iter().map(|(id, inst)| (*id, inst))
    }

    /// Owned snapshot for hosts.
    pub fn snapshot(&self) -> Vec<PlacedInstance> {
        self.list_instances()
            .map(|(id, instance)| PlacedInstance {
                id,
                instance: instance.clone(),
            })
            .collect()
    }

    pub fn distinct_type_ids(&self) -> BTreeSet<String> {
        self.instances.values().map(|i| i.type_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn clear(&mut self) {
        self.instances.clear();
    }

    /// Next slot of the vertical stack below the lowest placed instance.
    pub fn next_default_position(&self, origin: Position, row_spacing: f64) -> Position {
        self.instances
            .values()
            .map(|i| i.position.y)
            .fold(None, |acc: Option<f64>, y| Some(acc.map_or(y, |a| a.max(y))))
            .map(|lowest| Position::new(origin.x, (lowest + row_spacing).max(origin.y)))
            .unwrap_or(origin)
    }
}
