//! Column layout shared by the dump files and the model handle.
//!
//! Each table is described once, as a list of column groups. The header and
//! the cells of a row are produced by walking the same groups, so the two
//! can never disagree on width or order.

use crate::format::{format_real, positive_or_nan};
use crate::network::{BranchRecord, BusRecord, Polar};
use crate::phases::PhaseTable;
use num_complex::Complex64;
use std::fmt;

/// Terminator column written at the end of every dump line.
pub const EOL: &str = "EOL";

/// A single value of a dump row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Real(f64),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Real(x) => f.write_str(&format_real(*x)),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

const PHASE_LABELS: [&str; 3] = ["A", "B", "C"];

/// Per-phase voltage columns: label, component suffixes and accessor.
struct VoltageGroup {
    label: &'static str,
    parts: [&'static str; 2],
    values: fn(&BusRecord) -> Option<[(f64, f64); 3]>,
}

fn voltage_polar(bus: &BusRecord) -> Option<[Polar; 3]> {
    bus.voltage_polar
}

fn voltage_rect(bus: &BusRecord) -> Option<[(f64, f64); 3]> {
    bus.voltage.map(|v| v.map(|z| (z.re, z.im)))
}

const VOLTAGE_GROUPS: [VoltageGroup; 2] = [
    VoltageGroup {
        label: "V",
        parts: ["m", "a"],
        values: voltage_polar,
    },
    VoltageGroup {
        label: "V",
        parts: ["r", "i"],
        values: voltage_rect,
    },
];

/// Entries of a row-major 3x3 matrix that are exported: the diagonal and
/// the upper off-diagonal terms.
const MATRIX_ENTRIES: [(usize, &str); 6] = [
    (0, "AA"),
    (1, "AB"),
    (2, "AC"),
    (4, "BB"),
    (5, "BC"),
    (8, "CC"),
];

struct MatrixGroup {
    label: &'static str,
    values: fn(&BusRecord) -> Option<&[Complex64; 9]>,
}

fn full_y(bus: &BusRecord) -> Option<&[Complex64; 9]> {
    bus.full_y.as_ref()
}

fn full_y_all(bus: &BusRecord) -> Option<&[Complex64; 9]> {
    bus.full_y_all.as_ref()
}

fn full_y_load(bus: &BusRecord) -> Option<&[Complex64; 9]> {
    bus.full_y_load.as_ref()
}

const ADMITTANCE_GROUPS: [MatrixGroup; 3] = [
    MatrixGroup {
        label: "Yc",
        values: full_y,
    },
    MatrixGroup {
        label: "Ys",
        values: full_y_all,
    },
    MatrixGroup {
        label: "Yl",
        values: full_y_load,
    },
];

const JACOBIAN_GROUPS: [(&str, fn(&BusRecord) -> &[f64; 3]); 4] = [
    ("JA", |b| &b.jacob_a),
    ("JB", |b| &b.jacob_b),
    ("JC", |b| &b.jacob_c),
    ("JD", |b| &b.jacob_d),
];

const BRANCH_ADMITTANCE_GROUPS: [(&str, fn(&BranchRecord) -> Option<&[Complex64; 3]>); 4] = [
    ("Yfrom", |br| br.y_from.as_ref()),
    ("Yto", |br| br.y_to.as_ref()),
    ("YSfrom", |br| br.ys_from.as_ref()),
    ("YSto", |br| br.ys_to.as_ref()),
];

/// Renders an enumerated code, or `ERROR:<code>` when it is out of range.
fn enum_cell(label: Option<&'static str>, code: i32) -> Cell {
    match label {
        Some(label) => Cell::Text(label.to_string()),
        None => Cell::Text(format!("ERROR:{}", code)),
    }
}

fn complex_cells(cells: &mut Vec<Cell>, z: Option<&Complex64>) {
    match z {
        Some(z) => {
            cells.push(Cell::Real(z.re));
            cells.push(Cell::Real(z.im));
        }
        None => {
            cells.push(Cell::Real(f64::NAN));
            cells.push(Cell::Real(f64::NAN));
        }
    }
}

/// Bus table column names, without the `EOL` terminator.
pub fn bus_columns() -> Vec<String> {
    let mut columns: Vec<String> = [
        "id",
        "name",
        "type",
        "phases",
        "origphases",
        "busflags",
        "vbase",
        "mvabase",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();

    for group in VOLTAGE_GROUPS.iter() {
        for phase in PHASE_LABELS {
            for part in group.parts {
                columns.push(format!("{}{}{}", group.label, phase, part));
            }
        }
    }
    for phase in PHASE_LABELS {
        columns.push(format!("P{}", phase));
        columns.push(format!("Q{}", phase));
    }
    for group in ADMITTANCE_GROUPS.iter() {
        for (_, entry) in MATRIX_ENTRIES {
            columns.push(format!("{}{}r", group.label, entry));
            columns.push(format!("{}{}i", group.label, entry));
        }
    }
    for (label, _) in JACOBIAN_GROUPS {
        for k in 0..3 {
            columns.push(format!("{}{}", label, k));
        }
    }
    columns
}

/// Cells of bus `index`, in `bus_columns` order.
pub fn bus_cells(index: usize, bus: &BusRecord, phases: &PhaseTable) -> Vec<Cell> {
    let mut cells = Vec::with_capacity(74);

    cells.push(Cell::Int(index as i64));
    cells.push(Cell::Text(bus.name.clone().unwrap_or_default()));
    cells.push(enum_cell(bus.kind().map(|t| t.label()), bus.bus_type));
    cells.push(Cell::Text(phases.name(bus.phases).to_string()));
    cells.push(Cell::Text(phases.name(bus.orig_phases).to_string()));
    cells.push(enum_cell(bus.flag().map(|f| f.label()), bus.bus_flag));
    cells.push(Cell::Real(positive_or_nan(bus.volt_base)));
    cells.push(Cell::Real(positive_or_nan(bus.mva_base)));

    for group in VOLTAGE_GROUPS.iter() {
        let values = (group.values)(bus);
        for k in 0..3 {
            let (a, b) = values.map_or((f64::NAN, f64::NAN), |v| v[k]);
            cells.push(Cell::Real(a));
            cells.push(Cell::Real(b));
        }
    }
    for k in 0..3 {
        cells.push(Cell::Real(bus.pl[k]));
        cells.push(Cell::Real(bus.ql[k]));
    }
    for group in ADMITTANCE_GROUPS.iter() {
        let y = (group.values)(bus);
        for (n, _) in MATRIX_ENTRIES {
            complex_cells(&mut cells, y.map(|y| &y[n]));
        }
    }
    for (_, values) in JACOBIAN_GROUPS {
        cells.extend(values(bus).iter().map(|&x| Cell::Real(x)));
    }
    cells
}

/// Branch table column names, without the `EOL` terminator.
pub fn branch_columns() -> Vec<String> {
    let mut columns: Vec<String> = [
        "id",
        "name",
        "type",
        "phases",
        "origphases",
        "faultphases",
        "from",
        "to",
        "fault_link_below",
        "v_ratio",
        "vratio",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();

    for (label, _) in BRANCH_ADMITTANCE_GROUPS {
        for phase in PHASE_LABELS {
            columns.push(format!("{}{}r", label, phase));
            columns.push(format!("{}{}i", label, phase));
        }
    }
    columns
}

/// Cells of branch `index`, in `branch_columns` order.
///
/// `fault_link_below` is written inverted: `FALSE` when the flag is set.
/// Tools reading existing dumps expect this polarity.
pub fn branch_cells(index: usize, branch: &BranchRecord, phases: &PhaseTable) -> Vec<Cell> {
    let mut cells = Vec::with_capacity(35);

    cells.push(Cell::Int(index as i64));
    cells.push(Cell::Text(branch.name.clone().unwrap_or_default()));
    cells.push(enum_cell(branch.kind().map(|t| t.label()), branch.link_type));
    cells.push(Cell::Text(phases.name(branch.phases).to_string()));
    cells.push(Cell::Text(phases.name(branch.orig_phases).to_string()));
    cells.push(Cell::Text(phases.name(branch.fault_phases).to_string()));
    cells.push(Cell::Int(branch.from as i64));
    cells.push(Cell::Int(branch.to as i64));
    cells.push(Cell::Text(
        if branch.fault_link_below { "FALSE" } else { "TRUE" }.to_string(),
    ));
    cells.push(Cell::Real(branch.v_ratio));
    cells.push(Cell::Real(branch.v_ratio));

    for (_, values) in BRANCH_ADMITTANCE_GROUPS {
        let y = values(branch);
        for k in 0..3 {
            complex_cells(&mut cells, y.map(|y| &y[k]));
        }
    }
    cells
}
