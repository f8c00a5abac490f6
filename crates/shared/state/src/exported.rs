//! The `ExportedState` contract and its generic walkers

use crate::{CellKind, Snapshot, StateDef, StateError, Value};
use serde_json::json;

/// Contract implemented by every state-bearing entity.
///
/// Owners declare their cell table once in `state_def` and route reads and
/// writes through `cell_get` / `cell_set`; block cells are reached through
/// `child` / `child_mut`. The snapshot/apply/describe walkers are provided
/// on top of that and only need overriding where the generic traversal is
/// wrong (collections, dynamic membership).
pub trait ExportedState {
    /// Declare the cell table. Invoked once per instance; the result is
    /// memoized by `state_table` and never changes afterward.
    fn state_def(&self, def: &mut StateDef);

    /// The memoized cell table. Owners implement this as
    /// `self.table.get_or_declare(self)` over a `StateDefCell` field.
    fn state_table(&self) -> &StateDef;

    /// Read a declared scalar cell.
    fn cell_get(&self, name: &str) -> Result<Value, StateError>;

    /// Write a declared scalar cell. The walker has already checked
    /// writability and validated the value against the constraint.
    fn cell_set(&mut self, name: &str, value: Value) -> Result<(), StateError>;

    /// Borrow the child behind a block cell.
    fn child(&self, name: &str) -> Option<&dyn ExportedState> {
        let _ = name;
        None
    }

    fn child_mut(&mut self, name: &str) -> Option<&mut dyn ExportedState> {
        let _ = name;
        None
    }

    /// Mapping of every persisting key to its value, recursing through
    /// block cells.
    fn snapshot(&self) -> Snapshot {
        let mut out = Snapshot::new();
        for spec in self.state_table().cells() {
            if !spec.is_persisting() {
                continue;
            }
            let value = match spec.kind() {
                CellKind::Value { .. } => {
                    self.cell_get(spec.name()).unwrap_or(Value::Null)
                }
                CellKind::Block => match self.child(spec.name()) {
                    Some(c) => Value::Object(c.snapshot()),
                    None => Value::Null,
                },
            };
            out.insert(spec.name().to_string(), value);
        }
        out
    }

    /// Apply a (possibly partial) snapshot.
    ///
    /// Scalar keys are applied immediately in encounter order; block-cell
    /// keys are deferred until after every scalar, preserving their
    /// original encounter order, so a nested child sees finalized parent
    /// context. Unknown and non-writable keys fail; application aborts on
    /// the first failure, leaving earlier keys applied and reporting the
    /// failing key.
    fn apply(&mut self, snap: &Snapshot) -> Result<(), StateError> {
        apply_walk(self, snap)
    }

    /// Apply one deferred block-cell entry. The default routes into the
    /// child; owners with dynamic collection membership override this.
    fn apply_child(&mut self, name: &str, value: &Value) -> Result<(), StateError> {
        let nested = value
            .as_object()
            .ok_or_else(|| StateError::NotAnObject(name.to_string()))?;
        match self.child_mut(name) {
            Some(child) => child.apply(nested),
            None => Err(StateError::UnknownProperty(name.to_string())),
        }
    }

    /// Recursive descriptor tree over every declared cell.
    fn describe(&self) -> Value {
        let mut children = Snapshot::new();
        for spec in self.state_table().cells() {
            let desc = match spec.kind() {
                CellKind::Value {
                    constraint,
                    writable,
                    ..
                } => json!({
                    "kind": "value",
                    "type": constraint.type_desc(),
                    "writable": writable,
                    "current": self.cell_get(spec.name()).unwrap_or(Value::Null),
                }),
                CellKind::Block => self
                    .child(spec.name())
                    .map(|c| c.describe())
                    .unwrap_or(Value::Null),
            };
            children.insert(spec.name().to_string(), desc);
        }
        json!({ "kind": "block", "children": children })
    }
}

/// The generic application walk behind `ExportedState::apply`.
///
/// Kept as a free function so owners overriding `apply` (to pre-filter
/// keys) can delegate the traversal back here.
pub fn apply_walk<T: ExportedState + ?Sized>(
    target: &mut T,
    snap: &Snapshot,
) -> Result<(), StateError> {
    let mut deferred: Vec<&str> = Vec::new();
    for (key, value) in snap {
        let spec = match target.state_table().get(key) {
            Some(spec) => spec.clone(),
            None => return Err(StateError::UnknownProperty(key.clone())),
        };
        match spec.kind() {
            CellKind::Block => deferred.push(key.as_str()),
            CellKind::Value {
                constraint,
                writable,
                ..
            } => {
                if !writable {
                    return Err(StateError::NotWritable(key.clone()));
                }
                constraint.check(key, value)?;
                target.cell_set(key, value.clone())?;
            }
        }
    }
    for key in deferred {
        if let Some(value) = snap.get(key) {
            target
                .apply_child(key, value)
                .map_err(|e| StateError::at(key, e))?;
        }
    }
    Ok(())
}

impl<T: ExportedState + ?Sized> ExportedState for Box<T> {
    fn state_def(&self, def: &mut StateDef) {
        (**self).state_def(def)
    }

    fn state_table(&self) -> &StateDef {
        (**self).state_table()
    }

    fn cell_get(&self, name: &str) -> Result<Value, StateError> {
        (**self).cell_get(name)
    }

    fn cell_set(&mut self, name: &str, value: Value) -> Result<(), StateError> {
        (**self).cell_set(name, value)
    }

    fn child(&self, name: &str) -> Option<&dyn ExportedState> {
        (**self).child(name)
    }

    fn child_mut(&mut self, name: &str) -> Option<&mut dyn ExportedState> {
        (**self).child_mut(name)
    }

    fn snapshot(&self) -> Snapshot {
        (**self).snapshot()
    }

    fn apply(&mut self, snap: &Snapshot) -> Result<(), StateError> {
        (**self).apply(snap)
    }

    fn apply_child(&mut self, name: &str, value: &Value) -> Result<(), StateError> {
        (**self).apply_child(name, value)
    }

    fn describe(&self) -> Value {
        (**self).describe()
    }
}
