use super::fixtures::{two_bus, TWO_BUS};
use crate::config::ConfigBuilder;
use crate::dump::DumpError;
use crate::gate::NativeGate;
use crate::gateway::{Gateway, Status, SOLVE};
use crate::hook::HookOutcome;
use crate::loadcase::load_network;
use crate::model::{Value, BUS_DATA, ITERATIONS};
use crate::network::{BranchRecordBuilder, BusRecord, BusRecordBuilder, SolveRequest};
use anyhow::{format_err, Result};
use csv::StringRecord;
use std::cell::Cell;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

fn scratch(name: &str) -> Result<PathBuf> {
    let dir = env::temp_dir().join(format!("powers_bridge_{}", name));
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn read_table(path: &Path) -> Result<(StringRecord, Vec<StringRecord>)> {
    let mut rdr = csv::ReaderBuilder::new().from_path(path)?;
    let header = rdr.headers()?.clone();
    let rows = rdr.records().collect::<Result<Vec<_>, _>>()?;
    Ok((header, rows))
}

fn field<'a>(header: &StringRecord, row: &'a StringRecord, column: &str) -> Result<&'a str> {
    let i = header
        .iter()
        .position(|c| c == column)
        .ok_or_else(|| format_err!("no column {}", column))?;
    row.get(i).ok_or_else(|| format_err!("short row"))
}

#[test]
fn test_two_bus_dump() -> Result<()> {
    let dir = scratch("two_bus_dump")?;
    let config = ConfigBuilder::default()
        .busdump(dir.join("bus.csv"))
        .branchdump(dir.join("branch.csv"))
        .build()?;
    let mut gateway = Gateway::from_config(NativeGate::new(), config);
    gateway.init();

    let network = two_bus();
    let summary = gateway
        .dump(&network.buses, &network.branches, false)
        .map_err(|err| format_err!("{}", err))?;
    assert_eq!(summary.bus.rows, 2);
    assert_eq!(summary.branch.rows, 1);
    assert_eq!(summary.hook, None);

    assert_eq!(fs::read_to_string(dir.join("bus.csv"))?.lines().count(), 3);
    assert_eq!(fs::read_to_string(dir.join("branch.csv"))?.lines().count(), 2);

    let (header, rows) = read_table(&dir.join("bus.csv"))?;
    assert_eq!(header.len(), 75);
    assert_eq!(header.get(74), Some("EOL"));
    assert_eq!(field(&header, &rows[0], "type")?, "SWING");
    assert_eq!(field(&header, &rows[0], "busflags")?, "ISSOURCE");
    assert_eq!(field(&header, &rows[1], "type")?, "PQ");
    for column in ["VAm", "VAa", "VBm", "VBa", "VCm", "VCa", "VAr", "VAi", "VBr", "VBi", "VCr", "VCi"] {
        assert_eq!(field(&header, &rows[1], column)?, "nan", "{}", column);
    }
    assert_eq!(field(&header, &rows[0], "VAr")?.parse::<f64>()?, 2401.78);
    for (column, expected) in [
        ("VAm", 2401.78),
        ("VAa", 0.0),
        ("VBm", 2401.78),
        ("VBa", -2.0944),
        ("VCm", 2401.78),
        ("VCa", 2.0944),
    ] {
        assert_eq!(field(&header, &rows[0], column)?.parse::<f64>()?, expected, "{}", column);
    }
    assert_eq!(field(&header, &rows[0], "YcABr")?.parse::<f64>()?, -0.5);
    assert_eq!(field(&header, &rows[1], "PB")?.parse::<f64>()?, 110.0);
    assert_eq!(field(&header, &rows[1], "mvabase")?, "nan");
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.get(0), Some(i.to_string().as_str()));
        assert_eq!(row.get(row.len() - 1), Some("EOL"));
    }

    let (header, rows) = read_table(&dir.join("branch.csv"))?;
    assert_eq!(header.len(), 36);
    assert_eq!(field(&header, &rows[0], "type")?, "LINE");
    assert_eq!(field(&header, &rows[0], "phases")?, "ABC");
    assert_eq!(field(&header, &rows[0], "fault_link_below")?, "TRUE");
    assert_eq!(field(&header, &rows[0], "YSfromAr")?, "nan");
    assert_eq!(
        field(&header, &rows[0], "v_ratio")?,
        field(&header, &rows[0], "vratio")?
    );
    Ok(())
}

#[test]
fn test_unallocated_bus_row() -> Result<()> {
    let dir = scratch("unallocated_bus")?;
    let config = ConfigBuilder::default()
        .busdump(dir.join("bus.csv"))
        .branchdump(dir.join("branch.csv"))
        .build()?;
    let mut gateway = Gateway::from_config(NativeGate::new(), config);
    gateway.init();

    let bus = BusRecordBuilder::default().build()?;
    gateway
        .dump(&[bus], &[], false)
        .map_err(|err| format_err!("{}", err))?;

    let (header, rows) = read_table(&dir.join("bus.csv"))?;
    let row = &rows[0];
    for (column, value) in header.iter().zip(row.iter()).skip(8) {
        let expect_nan = column.starts_with('V') || column.starts_with('Y');
        if expect_nan {
            assert_eq!(value, "nan", "{}", column);
        } else if column != "EOL" {
            assert!(value.parse::<f64>()?.is_finite(), "{}", column);
        }
    }
    assert_eq!(field(&header, row, "name")?, "");
    assert_eq!(field(&header, row, "phases")?, "");
    assert_eq!(field(&header, row, "vbase")?, "nan");
    Ok(())
}

#[test]
fn test_out_of_range_codes() -> Result<()> {
    let dir = scratch("out_of_range")?;
    let config = ConfigBuilder::default()
        .busdump(dir.join("bus.csv"))
        .branchdump(dir.join("branch.csv"))
        .build()?;
    let mut gateway = Gateway::from_config(NativeGate::new(), config);
    gateway.init();

    let bus = BusRecordBuilder::default().bus_type(9).bus_flag(-2).build()?;
    let branch = BranchRecordBuilder::default().link_type(12).build()?;
    gateway
        .dump(&[bus], &[branch], false)
        .map_err(|err| format_err!("{}", err))?;

    let (header, rows) = read_table(&dir.join("bus.csv"))?;
    assert_eq!(field(&header, &rows[0], "type")?, "ERROR:9");
    assert_eq!(field(&header, &rows[0], "busflags")?, "ERROR:-2");
    let (header, rows) = read_table(&dir.join("branch.csv"))?;
    assert_eq!(field(&header, &rows[0], "type")?, "ERROR:12");
    Ok(())
}

#[test]
fn test_dump_hook_function() -> Result<()> {
    let dir = scratch("dump_hook_function")?;
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let gate = NativeGate::new()
        .with("nr", SOLVE, |_| Ok(Value::Null))
        .with("nr", "after_dump", move |model| {
            assert!(model.is_none());
            counter.set(counter.get() + 1);
            Ok(Value::Bool(true))
        });
    let config = ConfigBuilder::default()
        .busdump(dir.join("bus.csv"))
        .branchdump(dir.join("branch.csv"))
        .on_dump("python:after_dump")
        .import("nr")
        .build()?;
    let mut gateway = Gateway::from_config(gate, config);
    assert_eq!(gateway.init(), 0);

    let network = two_bus();
    let summary = gateway
        .dump(&network.buses, &network.branches, false)
        .map_err(|err| format_err!("{}", err))?;
    assert_eq!(summary.hook, Some(HookOutcome::Completed));
    assert_eq!(calls.get(), 1);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_dump_hook_command() -> Result<()> {
    let dir = scratch("dump_hook_command")?;
    let marker = dir.join("done");
    let _ = fs::remove_file(&marker);
    let config = ConfigBuilder::default()
        .busdump(dir.join("bus.csv"))
        .branchdump(dir.join("branch.csv"))
        .on_dump(format!("touch '{}'", marker.display()).as_str())
        .solver(crate::config::SolverSetting::Disable)
        .build()?;
    let mut gateway = Gateway::from_config(NativeGate::new(), config);
    gateway.init();
    assert_eq!(gateway.status(), Status::Disabled);

    let summary = gateway
        .dump(&[], &[], false)
        .map_err(|err| format_err!("{}", err))?;
    assert_eq!(summary.hook, Some(HookOutcome::Completed));
    assert!(marker.exists());
    Ok(())
}

#[test]
fn test_dump_not_configured() -> Result<()> {
    let dir = scratch("dump_not_configured")?;
    let branch = dir.join("branch.csv");
    let _ = fs::remove_file(&branch);
    let config = ConfigBuilder::default().branchdump(&branch).build()?;
    let mut gateway = Gateway::from_config(NativeGate::new(), config);
    gateway.init();

    let err = gateway.dump(&[], &[], false).unwrap_err();
    assert!(matches!(err, DumpError::NotConfigured { what: "bus" }));
    assert!(!branch.exists());
    Ok(())
}

#[test]
fn test_load_network() -> Result<()> {
    let dir = scratch("load_network")?;
    let path = dir.join("two_bus.json");
    fs::write(&path, TWO_BUS)?;

    let network = load_network(&path)?;
    assert_eq!(network, two_bus());
    assert_eq!(network.buses[0].name.as_deref(), Some("substation"));
    assert!(network.buses[1].voltage.is_none());
    assert_eq!(network.branches[0].to, 1);

    assert!(load_network(&dir.join("missing.json")).is_err());
    Ok(())
}

#[test]
fn test_solve_reads_model() -> Result<()> {
    let gate = NativeGate::new().with("nr", SOLVE, |model| {
        let model = model.ok_or_else(|| crate::gate::GateError::CallFailed {
            function: SOLVE.into(),
            reason: "no model".into(),
        })?;
        let count = match model.get(BUS_DATA) {
            Some(Value::Map(data)) => match data.get("name") {
                Some(Value::List(names)) => names.len() as i64,
                _ => 0,
            },
            _ => 0,
        };
        model.insert(ITERATIONS, count);
        Ok(Value::Bool(true))
    });
    let config = ConfigBuilder::default().import("nr").build()?;
    let mut gateway = Gateway::from_config(gate, config);
    assert_eq!(gateway.init(), 0);

    let network = two_bus();
    let request = SolveRequest::new(&network.buses, &network.branches);
    assert_eq!(gateway.solve(&request), 2);

    let one: Vec<BusRecord> = network.buses[..1].to_vec();
    assert_eq!(gateway.solve(&SolveRequest::new(&one, &[])), 1);
    Ok(())
}
