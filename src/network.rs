use derive_builder::Builder;
use num_complex::Complex64;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Voltage magnitude and angle (radians).
pub type Polar = (f64, f64);

#[allow(non_camel_case_types)]
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive)]
pub enum BusType {
    /// Fixed active and reactive power.
    PQ = 0,
    /// Fixed voltage magnitude and active power.
    PV = 1,
    /// Swing bus.
    SWING = 2,
    /// Swing bus that may act as a PQ bus.
    SWING_PG = 3,
}

impl BusType {
    pub fn from_code(code: i32) -> Option<Self> {
        Self::from_i32(code)
    }

    pub fn label(&self) -> &'static str {
        match self {
            BusType::PQ => "PQ",
            BusType::PV => "PV",
            BusType::SWING => "SWING",
            BusType::SWING_PG => "SWING_PG",
        }
    }
}

/// Source flags of a bus.
#[allow(non_camel_case_types)]
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive)]
pub enum BusFlag {
    NONE = 0,
    HAS_SOURCE = 1,
    IS_SOURCE = 2,
    BOTH = 3,
}

impl BusFlag {
    pub fn from_code(code: i32) -> Option<Self> {
        Self::from_i32(code)
    }

    pub fn label(&self) -> &'static str {
        match self {
            BusFlag::NONE => "NONE",
            BusFlag::HAS_SOURCE => "HASSOURCE",
            BusFlag::IS_SOURCE => "ISSOURCE",
            BusFlag::BOTH => "HASSOURCE|ISSOURCE",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive)]
pub enum LinkType {
    LINE = 0,
    TRIPLEX = 1,
    SWITCH = 2,
    FUSE = 3,
    TRANSFORMER = 4,
    SECTIONALIZER = 5,
    RECLOSER = 6,
}

impl LinkType {
    pub fn from_code(code: i32) -> Option<Self> {
        Self::from_i32(code)
    }

    pub fn label(&self) -> &'static str {
        match self {
            LinkType::LINE => "LINE",
            LinkType::TRIPLEX => "TRIPLEX",
            LinkType::SWITCH => "SWITCH",
            LinkType::FUSE => "FUSE",
            LinkType::TRANSFORMER => "TRANSFORMER",
            LinkType::SECTIONALIZER => "SECTIONALIZER",
            LinkType::RECLOSER => "RECLOSER",
        }
    }
}

/// Solver pass the engine is running.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
pub enum SolverMode {
    /// Static power flow.
    #[default]
    Normal,
    /// Dynamic simulation step.
    DynCalc,
    /// Dynamic simulation initialisation.
    DynInit,
}

impl SolverMode {
    pub fn label(&self) -> &'static str {
        match self {
            SolverMode::Normal => "normal",
            SolverMode::DynCalc => "dyncalc",
            SolverMode::DynInit => "dyninit",
        }
    }
}

impl fmt::Display for SolverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SolverMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(SolverMode::Normal),
            "dyncalc" => Ok(SolverMode::DynCalc),
            "dyninit" => Ok(SolverMode::DynInit),
            _ => Err(format!("unknown solver mode '{}'", s)),
        }
    }
}

/// Bus is a node of the solver's three phase network model.
///
/// Enumerated fields hold the raw codes found in solver memory so that
/// values outside the known range can still be reported. Optional arrays
/// are data the solver may not have allocated.
#[derive(Debug, Clone, Default, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default)]
#[serde(default)]
pub struct BusRecord {
    #[builder(setter(into, strip_option))]
    pub name: Option<String>,

    /// Bus type code (see `BusType`).
    pub bus_type: i32,

    /// Phase mask.
    pub phases: u8,

    /// Phase mask before any fault was applied.
    pub orig_phases: u8,

    /// Source flag code (see `BusFlag`).
    pub bus_flag: i32,

    /// Voltage base (V). Not defined when not positive.
    pub volt_base: f64,

    /// Power base (MVA). Not defined when not positive.
    pub mva_base: f64,

    /// Per-phase voltage in polar form.
    #[builder(setter(strip_option))]
    pub voltage_polar: Option<[Polar; 3]>,

    /// Per-phase voltage in rectangular form.
    #[builder(setter(strip_option))]
    pub voltage: Option<[Complex64; 3]>,

    /// Per-phase real load.
    pub pl: [f64; 3],

    /// Per-phase reactive load.
    pub ql: [f64; 3],

    /// Self and mutual admittance, 3x3 row-major.
    #[builder(setter(strip_option))]
    pub full_y: Option<[Complex64; 9]>,

    /// All-inclusive admittance, 3x3 row-major.
    #[builder(setter(strip_option))]
    pub full_y_all: Option<[Complex64; 9]>,

    /// Load admittance, 3x3 row-major.
    #[builder(setter(strip_option))]
    pub full_y_load: Option<[Complex64; 9]>,

    pub jacob_a: [f64; 3],
    pub jacob_b: [f64; 3],
    pub jacob_c: [f64; 3],
    pub jacob_d: [f64; 3],
}

impl BusRecord {
    pub fn kind(&self) -> Option<BusType> {
        BusType::from_code(self.bus_type)
    }

    pub fn flag(&self) -> Option<BusFlag> {
        BusFlag::from_code(self.bus_flag)
    }
}

/// Branch is a link between two buses: a line, switch, transformer or
/// protective device.
#[derive(Debug, Clone, Default, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default)]
#[serde(default)]
pub struct BranchRecord {
    #[builder(setter(into, strip_option))]
    pub name: Option<String>,

    /// Link type code (see `LinkType`).
    pub link_type: i32,

    pub phases: u8,
    pub orig_phases: u8,

    /// Phases affected by a fault.
    pub fault_phases: u8,

    /// From bus index.
    pub from: i32,

    /// To bus index.
    pub to: i32,

    /// A faulted link exists downstream of this one.
    pub fault_link_below: bool,

    /// Voltage ratio (transformers), 1 otherwise.
    pub v_ratio: f64,

    /// Per-phase admittance seen from the from side.
    #[builder(setter(strip_option))]
    pub y_from: Option<[Complex64; 3]>,

    /// Per-phase admittance seen from the to side.
    #[builder(setter(strip_option))]
    pub y_to: Option<[Complex64; 3]>,

    /// Per-phase shunt admittance at the from side.
    #[builder(setter(strip_option))]
    pub ys_from: Option<[Complex64; 3]>,

    /// Per-phase shunt admittance at the to side.
    #[builder(setter(strip_option))]
    pub ys_to: Option<[Complex64; 3]>,
}

impl BranchRecord {
    pub fn kind(&self) -> Option<LinkType> {
        LinkType::from_code(self.link_type)
    }
}

/// Snapshot of the solver's bus and branch arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Network {
    pub buses: Vec<BusRecord>,
    pub branches: Vec<BranchRecord>,
}

/// Arguments the solver passes on each solve or learn call.
#[derive(Debug, Clone, Copy)]
pub struct SolveRequest<'a> {
    pub buses: &'a [BusRecord],
    pub branches: &'a [BranchRecord],

    pub mode: SolverMode,

    /// Mesh fault impedance values, when a fault is being solved.
    pub fault_impedance: Option<&'a [Complex64]>,

    /// The solver flagged a bad computation on this pass.
    pub bad_computations: bool,

    /// Iterations performed so far.
    pub iterations: i64,
}

impl<'a> SolveRequest<'a> {
    pub fn new(buses: &'a [BusRecord], branches: &'a [BranchRecord]) -> Self {
        Self {
            buses,
            branches,
            mode: SolverMode::Normal,
            fault_impedance: None,
            bad_computations: false,
            iterations: 0,
        }
    }

    pub fn mode(mut self, mode: SolverMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn iterations(mut self, iterations: i64) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn fault_impedance(mut self, z: &'a [Complex64]) -> Self {
        self.fault_impedance = Some(z);
        self
    }

    pub fn bad_computations(mut self, bad: bool) -> Self {
        self.bad_computations = bad;
        self
    }
}
