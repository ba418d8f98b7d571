//! Diagnostic dump of the bus and branch tables to CSV files.
//!
//! Each file starts with a header row. Every row, the header included,
//! ends with an `EOL` column so truncated files can be detected. Rows are
//! written in index order.

use crate::config::Config;
use crate::hook::HookOutcome;
use crate::logger::Severity;
use crate::network::{BranchRecord, BusRecord};
use crate::phases::PhaseTable;
use crate::schema::{branch_cells, branch_columns, bus_cells, bus_columns, Cell, EOL};
use csv::WriterBuilder;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Bus dump file used when none is configured and generic names are allowed.
pub const GENERIC_BUS_DUMP: &str = "busdump.csv";
/// Branch dump file used when none is configured and generic names are allowed.
pub const GENERIC_BRANCH_DUMP: &str = "branchdump.csv";

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("{what} dump file is not configured")]
    NotConfigured { what: &'static str },

    #[error("unable to open {what} dumpfile '{}' for write: {source}", .path.display())]
    Open {
        what: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("unable to write {what} dumpfile '{}': {source}", .path.display())]
    Write {
        what: &'static str,
        path: PathBuf,
        source: csv::Error,
    },
}

impl DumpError {
    /// Severity the failure is logged at.
    pub fn severity(&self) -> Severity {
        match self {
            DumpError::NotConfigured { .. } => Severity::Error,
            DumpError::Open { .. } | DumpError::Write { .. } => Severity::Warning,
        }
    }
}

/// Output paths of one dump.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DumpTargets {
    pub bus: Option<PathBuf>,
    pub branch: Option<PathBuf>,
    /// Fall back to `busdump.csv` and `branchdump.csv` for unset paths.
    pub allow_generic: bool,
}

impl DumpTargets {
    pub fn from_config(config: Option<&Config>, allow_generic: bool) -> Self {
        Self {
            bus: config.and_then(|c| c.busdump.clone()),
            branch: config.and_then(|c| c.branchdump.clone()),
            allow_generic,
        }
    }

    fn resolve(
        &self,
        path: &Option<PathBuf>,
        generic: &str,
        what: &'static str,
    ) -> Result<PathBuf, DumpError> {
        match path {
            Some(path) => Ok(path.clone()),
            None if self.allow_generic => Ok(PathBuf::from(generic)),
            None => Err(DumpError::NotConfigured { what }),
        }
    }

    pub fn bus_path(&self) -> Result<PathBuf, DumpError> {
        self.resolve(&self.bus, GENERIC_BUS_DUMP, "bus")
    }

    pub fn branch_path(&self) -> Result<PathBuf, DumpError> {
        self.resolve(&self.branch, GENERIC_BRANCH_DUMP, "branch")
    }
}

/// A written dump file.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpFile {
    pub path: PathBuf,
    /// Data rows, not counting the header.
    pub rows: usize,
}

/// Result of a completed dump.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpSummary {
    pub bus: DumpFile,
    pub branch: DumpFile,
    /// Outcome of the post-dump hook, if one is configured.
    pub hook: Option<HookOutcome>,
}

fn write_table<W, I>(writer: W, header: Vec<String>, rows: I) -> Result<usize, csv::Error>
where
    W: Write,
    I: Iterator<Item = Vec<Cell>>,
{
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);

    wtr.write_record(header.iter().map(String::as_str).chain([EOL]))?;

    let mut count = 0;
    for row in rows {
        let mut record: Vec<String> = row.iter().map(Cell::to_string).collect();
        record.push(EOL.to_string());
        wtr.write_record(&record)?;
        count += 1;
    }
    wtr.flush()?;
    Ok(count)
}

/// Writes the bus table to `writer` and returns the number of data rows.
pub fn write_bus_dump<W: Write>(writer: W, buses: &[BusRecord]) -> Result<usize, csv::Error> {
    let phases = PhaseTable::shared();
    write_table(
        writer,
        bus_columns(),
        buses.iter().enumerate().map(|(i, b)| bus_cells(i, b, phases)),
    )
}

/// Writes the branch table to `writer` and returns the number of data rows.
pub fn write_branch_dump<W: Write>(
    writer: W,
    branches: &[BranchRecord],
) -> Result<usize, csv::Error> {
    let phases = PhaseTable::shared();
    write_table(
        writer,
        branch_columns(),
        branches
            .iter()
            .enumerate()
            .map(|(i, br)| branch_cells(i, br, phases)),
    )
}

fn dump_file<F>(what: &'static str, path: &Path, write: F) -> Result<DumpFile, DumpError>
where
    F: FnOnce(File) -> Result<usize, csv::Error>,
{
    log::info!("dumping {} data to '{}'", what, path.display());
    let file = File::create(path).map_err(|source| DumpError::Open {
        what,
        path: path.to_path_buf(),
        source,
    })?;
    let rows = write(file).map_err(|source| DumpError::Write {
        what,
        path: path.to_path_buf(),
        source,
    })?;
    Ok(DumpFile {
        path: path.to_path_buf(),
        rows,
    })
}

/// Writes both dump files, bus table first.
///
/// Stops at the first file that cannot be written; a bus dump already on
/// disk is left in place.
pub fn export(
    targets: &DumpTargets,
    buses: &[BusRecord],
    branches: &[BranchRecord],
) -> Result<(DumpFile, DumpFile), DumpError> {
    let bus = dump_file("bus", &targets.bus_path()?, |file| {
        write_bus_dump(file, buses)
    })?;
    let branch = dump_file("branch", &targets.branch_path()?, |file| {
        write_branch_dump(file, branches)
    })?;
    Ok((bus, branch))
}
