use crate::network::{BranchRecord, BusRecord, SolveRequest};
use crate::phases::PhaseTable;
use crate::schema::{branch_cells, branch_columns, bus_cells, bus_columns, Cell};
use crate::format::format_real;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Slot holding the bus column names.
pub const BUS_TAGS: &str = "bustags";
/// Slot holding the bus columns, keyed by column name.
pub const BUS_DATA: &str = "busdata";
/// Slot holding the branch column names.
pub const BRANCH_TAGS: &str = "branchtags";
/// Slot holding the branch columns, keyed by column name.
pub const BRANCH_DATA: &str = "branchdata";
/// Slot holding the arguments of the current solver call.
pub const CONTEXT: &str = "context";
/// Slot the external solve routine writes its iteration count to.
pub const ITERATIONS: &str = "iterations";

/// A value exchanged with the external routine.
///
/// In JSON, numbers that are not finite are written as the strings `nan`,
/// `inf` and `-inf`, and those strings read back as numbers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Wire")]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Number(x) if x.is_finite() => serializer.serialize_f64(*x),
            Value::Number(x) => serializer.serialize_str(&format_real(*x)),
            Value::Text(s) => serializer.serialize_str(s),
            Value::List(l) => l.serialize(serializer),
            Value::Map(m) => m.serialize(serializer),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Wire {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl From<Wire> for Value {
    fn from(wire: Wire) -> Self {
        match wire {
            Wire::Null => Value::Null,
            Wire::Bool(b) => Value::Bool(b),
            Wire::Integer(i) => Value::Integer(i),
            Wire::Number(x) => Value::Number(x),
            Wire::Text(s) => match s.as_str() {
                "nan" => Value::Number(f64::NAN),
                "inf" => Value::Number(f64::INFINITY),
                "-inf" => Value::Number(f64::NEG_INFINITY),
                _ => Value::Text(s),
            },
            Wire::List(l) => Value::List(l),
            Wire::Map(m) => Value::Map(m),
        }
    }
}

impl Value {
    /// Truth value of a call result: null, false, zero and empty
    /// containers are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Number(x) => *x != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    /// Integral value of an integer, or of a finite number without a
    /// fractional part.
    pub fn as_integral(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Number(x) if x.is_finite() && x.fract() == 0.0 => {
                if *x >= i64::MIN as f64 && *x < i64::MAX as f64 {
                    Some(*x as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl From<Cell> for Value {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Int(i) => Value::Integer(i),
            Cell::Real(x) => Value::Number(x),
            Cell::Text(s) => Value::Text(s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// Model handle passed to the external solve and learn routines.
///
/// All values are copies; nothing in the model refers back to solver
/// memory. The external routine may add or change keys and the changes
/// persist across calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Model(BTreeMap<String, Value>);

impl Model {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

/// Builds the tag list and the column map of one table.
fn columnar(tags: Vec<String>, rows: impl Iterator<Item = Vec<Cell>>) -> (Value, Value) {
    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); tags.len()];
    for row in rows {
        for (column, cell) in columns.iter_mut().zip(row) {
            column.push(cell.into());
        }
    }
    let data = tags
        .iter()
        .cloned()
        .zip(columns.into_iter().map(Value::List))
        .collect::<BTreeMap<String, Value>>();
    let tags = Value::List(tags.into_iter().map(Value::Text).collect());
    (tags, Value::Map(data))
}

/// Copies the bus and branch tables into the model.
///
/// Columns and values match the dump files, keyed by column name.
pub fn project_network(model: &mut Model, buses: &[BusRecord], branches: &[BranchRecord]) {
    let phases = PhaseTable::shared();

    let (tags, data) = columnar(
        bus_columns(),
        buses.iter().enumerate().map(|(i, b)| bus_cells(i, b, phases)),
    );
    model.insert(BUS_TAGS, tags);
    model.insert(BUS_DATA, data);

    let (tags, data) = columnar(
        branch_columns(),
        branches
            .iter()
            .enumerate()
            .map(|(i, br)| branch_cells(i, br, phases)),
    );
    model.insert(BRANCH_TAGS, tags);
    model.insert(BRANCH_DATA, data);
}

/// Copies a solver call into the model: network tables and call context.
pub fn project(model: &mut Model, request: &SolveRequest<'_>) {
    project_network(model, request.buses, request.branches);

    let fault_impedance = match request.fault_impedance {
        Some(z) => Value::List(
            z.iter()
                .map(|z| Value::List(vec![Value::Number(z.re), Value::Number(z.im)]))
                .collect(),
        ),
        None => Value::Null,
    };
    let context = BTreeMap::from([
        ("solver_mode".to_string(), Value::from(request.mode.label())),
        ("iteration".to_string(), Value::Integer(request.iterations)),
        (
            "bad_computations".to_string(),
            Value::Bool(request.bad_computations),
        ),
        ("fault_impedance".to_string(), fault_impedance),
    ]);
    model.insert(CONTEXT, Value::Map(context));
}
