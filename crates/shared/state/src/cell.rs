//! Cell declarations and the memoized per-owner cell table

use crate::error::json_type;
use crate::{StateError, Value};
use serde_json::json;
use std::cell::OnceCell;
use std::collections::BTreeMap;

/// Type/constraint descriptor for a scalar cell.
///
/// Drives value validation on write and the `type` field of `describe`.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Boolean,
    Integer,
    Float,
    /// Closed set of string values, mapped to display labels.
    Enumeration(BTreeMap<String, String>),
    /// Bounded numeric range; `integer` restricts to whole numbers and
    /// `logarithmic` is a rendering hint carried through `describe`.
    Range {
        low: f64,
        high: f64,
        logarithmic: bool,
        integer: bool,
    },
    /// Values pass through unvalidated.
    Opaque,
    /// Reserved marker for the streaming-spectrum pseudo-type; cells of
    /// this kind carry frame metadata and are never writable.
    SpectrumStream,
}

impl Constraint {
    pub fn int_range(low: i64, high: i64, logarithmic: bool) -> Self {
        Constraint::Range {
            low: low as f64,
            high: high as f64,
            logarithmic,
            integer: true,
        }
    }

    pub fn float_range(low: f64, high: f64, logarithmic: bool) -> Self {
        Constraint::Range {
            low,
            high,
            logarithmic,
            integer: false,
        }
    }

    pub fn enumeration<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Constraint::Enumeration(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// The `type` descriptor reported by `describe`.
    pub fn type_desc(&self) -> Value {
        match self {
            Constraint::Boolean => json!("boolean"),
            Constraint::Integer => json!("integer"),
            Constraint::Float => json!("float"),
            Constraint::Enumeration(values) => json!({ "enum": values }),
            Constraint::Range {
                low,
                high,
                logarithmic,
                integer,
            } => json!({
                "range": {
                    "low": low,
                    "high": high,
                    "logarithmic": logarithmic,
                    "integer": integer,
                }
            }),
            Constraint::Opaque => json!("opaque"),
            Constraint::SpectrumStream => json!("spectrum"),
        }
    }

    /// Validate a candidate value against this constraint.
    pub fn check(&self, name: &str, value: &Value) -> Result<(), StateError> {
        let mismatch = |expected| StateError::TypeMismatch {
            name: name.to_string(),
            expected,
            got: json_type(value).to_string(),
        };
        match self {
            Constraint::Boolean => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err(mismatch("boolean"))
                }
            }
            Constraint::Integer => {
                if value.is_i64() || value.is_u64() {
                    Ok(())
                } else {
                    Err(mismatch("integer"))
                }
            }
            Constraint::Float => {
                if value.is_number() {
                    Ok(())
                } else {
                    Err(mismatch("number"))
                }
            }
            Constraint::Enumeration(values) => match value.as_str() {
                Some(tag) if values.contains_key(tag) => Ok(()),
                Some(tag) => Err(StateError::UnknownVariant {
                    name: name.to_string(),
                    value: tag.to_string(),
                }),
                None => Err(mismatch("string")),
            },
            Constraint::Range {
                low,
                high,
                integer,
                ..
            } => {
                if *integer && !(value.is_i64() || value.is_u64()) {
                    return Err(mismatch("integer"));
                }
                let v = value.as_f64().ok_or_else(|| mismatch("number"))?;
                if v < *low || v > *high {
                    return Err(StateError::OutOfRange {
                        name: name.to_string(),
                        value: v,
                    });
                }
                Ok(())
            }
            Constraint::Opaque | Constraint::SpectrumStream => Ok(()),
        }
    }
}

/// What a declared cell is: a scalar value or a nested block.
#[derive(Debug, Clone)]
pub enum CellKind {
    Value {
        constraint: Constraint,
        writable: bool,
        persists: bool,
    },
    /// Nested state-bearing child; always persists, never directly
    /// writable.
    Block,
}

/// One declared cell of an owner's state table.
#[derive(Debug, Clone)]
pub struct CellSpec {
    name: String,
    kind: CellKind,
}

impl CellSpec {
    /// A read-only, non-persisting scalar cell.
    pub fn value(name: &str, constraint: Constraint) -> Self {
        CellSpec {
            name: name.to_string(),
            kind: CellKind::Value {
                constraint,
                writable: false,
                persists: false,
            },
        }
    }

    /// A nested block cell.
    pub fn block(name: &str) -> Self {
        CellSpec {
            name: name.to_string(),
            kind: CellKind::Block,
        }
    }

    /// Make the cell writable. Writable cells persist unless overridden.
    pub fn writable(mut self) -> Self {
        if let CellKind::Value {
            writable, persists, ..
        } = &mut self.kind
        {
            *writable = true;
            *persists = true;
        }
        self
    }

    /// Override the persistence flag of a scalar cell.
    pub fn persists(mut self, value: bool) -> Self {
        if let CellKind::Value { persists, .. } = &mut self.kind {
            *persists = value;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &CellKind {
        &self.kind
    }

    pub fn is_block(&self) -> bool {
        matches!(self.kind, CellKind::Block)
    }

    pub fn is_writable(&self) -> bool {
        matches!(
            self.kind,
            CellKind::Value { writable: true, .. }
        )
    }

    pub fn is_persisting(&self) -> bool {
        match self.kind {
            CellKind::Value { persists, .. } => persists,
            CellKind::Block => true,
        }
    }
}

/// An owner's declared cell table, in declaration order.
#[derive(Debug, Default)]
pub struct StateDef {
    cells: Vec<CellSpec>,
}

impl StateDef {
    /// Declare a cell. Cell names are unique per owner; redeclaring a name
    /// is a construction-time bug.
    pub fn add(&mut self, spec: CellSpec) {
        assert!(
            self.get(spec.name()).is_none(),
            "duplicate cell declaration: {}",
            spec.name()
        );
        self.cells.push(spec);
    }

    /// Declare a read-only, non-persisting scalar cell.
    pub fn read_only(&mut self, name: &str, constraint: Constraint) {
        self.add(CellSpec::value(name, constraint));
    }

    /// Declare a writable, persisting scalar cell.
    pub fn writable(&mut self, name: &str, constraint: Constraint) {
        self.add(CellSpec::value(name, constraint).writable());
    }

    /// Declare a block cell.
    pub fn block(&mut self, name: &str) {
        self.add(CellSpec::block(name));
    }

    pub fn get(&self, name: &str) -> Option<&CellSpec> {
        self.cells.iter().find(|c| c.name() == name)
    }

    pub fn cells(&self) -> &[CellSpec] {
        &self.cells
    }
}

/// Memo slot for an owner's cell table.
///
/// Owners hold one of these and implement `state_table` as
/// `self.table.get_or_declare(self)`; the table is computed on first use
/// and fixed from then on.
#[derive(Debug, Default)]
pub struct StateDefCell(OnceCell<StateDef>);

impl StateDefCell {
    pub fn new() -> Self {
        StateDefCell(OnceCell::new())
    }

    pub fn get_or_declare(&self, owner: &dyn crate::ExportedState) -> &StateDef {
        self.0.get_or_init(|| {
            let mut def = StateDef::default();
            owner.state_def(&mut def);
            def
        })
    }
}
