//! Keyed collections of homogeneous state-bearing children

use crate::{ExportedState, Snapshot, StateDef, StateDefCell, StateError, Value};
use serde_json::json;
use std::collections::BTreeMap;

/// Keyed group of homogeneous children, itself exported as a block.
///
/// Membership is either static (fixed at construction as far as remote
/// mutation is concerned) or dynamic. Creating and deleting dynamic
/// members needs context the collection does not have (a factory, dirty
/// flags), so the owning orchestrator surfaces those operations and
/// intercepts block-cell application for the collection; applying state
/// through the collection itself only routes into existing members.
pub struct CollectionState<T> {
    children: BTreeMap<String, T>,
    dynamic: bool,
    table: StateDefCell,
}

impl<T> CollectionState<T> {
    pub fn new_static(children: BTreeMap<String, T>) -> Self {
        CollectionState {
            children,
            dynamic: false,
            table: StateDefCell::new(),
        }
    }

    pub fn new_dynamic() -> Self {
        CollectionState {
            children: BTreeMap::new(),
            dynamic: true,
            table: StateDefCell::new(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.children.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        self.children.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.children.contains_key(key)
    }

    pub fn insert(&mut self, key: String, child: T) -> Option<T> {
        self.children.insert(key, child)
    }

    pub fn remove(&mut self, key: &str) -> Option<T> {
        self.children.remove(key)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.children.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &T)> {
        self.children.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.children.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.children.values_mut()
    }
}

impl<T: ExportedState> ExportedState for CollectionState<T> {
    fn state_def(&self, _def: &mut StateDef) {
        // Membership is keyed, not declared; the walkers are overridden.
    }

    fn state_table(&self) -> &StateDef {
        self.table.get_or_declare(self)
    }

    fn cell_get(&self, name: &str) -> Result<Value, StateError> {
        Err(StateError::UnknownProperty(name.to_string()))
    }

    fn cell_set(&mut self, name: &str, _value: Value) -> Result<(), StateError> {
        Err(StateError::UnknownProperty(name.to_string()))
    }

    fn child(&self, name: &str) -> Option<&dyn ExportedState> {
        self.children.get(name).map(|c| c as &dyn ExportedState)
    }

    fn child_mut(&mut self, name: &str) -> Option<&mut dyn ExportedState> {
        self.children
            .get_mut(name)
            .map(|c| c as &mut dyn ExportedState)
    }

    fn snapshot(&self) -> Snapshot {
        let mut out = Snapshot::new();
        for (key, child) in &self.children {
            out.insert(key.clone(), Value::Object(child.snapshot()));
        }
        out
    }

    fn apply(&mut self, snap: &Snapshot) -> Result<(), StateError> {
        for (key, value) in snap {
            let nested = value
                .as_object()
                .ok_or_else(|| StateError::NotAnObject(key.clone()))?;
            match self.children.get_mut(key) {
                Some(child) => child
                    .apply(nested)
                    .map_err(|e| StateError::at(key, e))?,
                None if self.dynamic => {
                    // Creation is owned by the orchestrator; reaching this
                    // path means the owner's intercept was bypassed.
                    return Err(StateError::UnknownProperty(key.clone()));
                }
                None => return Err(StateError::StaticCollection(key.clone())),
            }
        }
        Ok(())
    }

    fn describe(&self) -> Value {
        let mut children = Snapshot::new();
        for (key, child) in &self.children {
            children.insert(key.clone(), child.describe());
        }
        json!({
            "kind": "collection",
            "dynamic": self.dynamic,
            "children": children,
        })
    }
}
