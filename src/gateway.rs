//! Delegation of solve and learn passes to an external module.

use crate::config::{self, Config, ConfigError, SolverSetting, DEFAULT_CONFIG_PATH};
use crate::dump::{self, DumpError, DumpSummary, DumpTargets};
use crate::gate::{CallGate, GateError, ModuleHandle};
use crate::hook::{self, HookOutcome};
use crate::logger::{Severity, SolverLog};
use crate::model::{project, Model, Value, ITERATIONS};
use crate::network::{BranchRecord, BusRecord, SolveRequest};
use std::fmt;
use std::path::PathBuf;

/// Name of the external solve function.
pub const SOLVE: &str = "solve";
/// Name of the external learn function.
pub const LEARN: &str = "learn";

/// Gateway state. `Init` settles once into one of the other three.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Status {
    Init,
    Ready,
    Failed,
    Disabled,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Init => "SPS_INIT",
            Status::Ready => "SPS_READY",
            Status::Failed => "SPS_FAILED",
            Status::Disabled => "SPS_DISABLED",
        })
    }
}

enum ConfigSource {
    Files { local: Option<PathBuf>, share: PathBuf },
    Provided(Config),
}

/// Owns the configuration, the solver log, the imported module and the
/// model handle shared with it.
///
/// Calls are expected from a single solver thread, one at a time.
pub struct Gateway<G: CallGate> {
    gate: G,
    source: Option<ConfigSource>,
    status: Status,
    config: Option<Config>,
    module: Option<ModuleHandle>,
    model: Option<Model>,
    log: SolverLog,
    os_error: Option<i32>,
}

impl<G: CallGate> Gateway<G> {
    /// Gateway configured from `local`, or from the shared default file.
    pub fn new(gate: G, local: Option<PathBuf>) -> Self {
        Self::with_source(
            gate,
            ConfigSource::Files {
                local,
                share: PathBuf::from(DEFAULT_CONFIG_PATH),
            },
        )
    }

    /// Gateway configured from settings the host already holds.
    pub fn from_config(gate: G, config: Config) -> Self {
        Self::with_source(gate, ConfigSource::Provided(config))
    }

    fn with_source(gate: G, source: ConfigSource) -> Self {
        Self {
            gate,
            source: Some(source),
            status: Status::Init,
            config: None,
            module: None,
            model: None,
            log: SolverLog::disabled(),
            os_error: None,
        }
    }

    /// Replaces the fallback configuration file.
    pub fn with_share_path(mut self, path: impl Into<PathBuf>) -> Self {
        if let Some(ConfigSource::Files { share, .. }) = &mut self.source {
            *share = path.into();
        }
        self
    }

    /// Sets the solver log used until a configured `logfile` replaces it.
    pub fn with_log(mut self, log: SolverLog) -> Self {
        self.log = log;
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Configuration read by `init`.
    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    /// Model handle, once a solve or learn call has created it.
    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut G {
        &mut self.gate
    }

    /// Configures the gateway on first call.
    ///
    /// Returns 0 when ready. Otherwise returns the last OS error code seen
    /// while configuring, or -1. Later calls return the same answer without
    /// configuring again.
    pub fn init(&mut self) -> i32 {
        if let Some(source) = self.source.take() {
            self.configure(source);
            self.log
                .notice(&format!("solver init: status = {}", self.status));
        }
        match self.status {
            Status::Ready => 0,
            _ => self.os_error.unwrap_or(-1),
        }
    }

    fn configure(&mut self, source: ConfigSource) {
        let (config, errors) = match source {
            ConfigSource::Files { local, share } => match config::load(local.as_deref(), &share) {
                Ok(parsed) => {
                    log::debug!("config '{}' loaded", parsed.path.display());
                    (parsed.config, parsed.errors)
                }
                Err(err) => {
                    log::error!("{}", err);
                    self.os_error = err.raw_os_error();
                    self.status = Status::Failed;
                    return;
                }
            },
            ConfigSource::Provided(config) => (config, Vec::new()),
        };

        self.open_log(&config);
        for (tag, value) in config.entries() {
            self.log.notice(&format!("config: {} = '{}'", tag, value));
        }

        self.status = self.settle(&config, &errors);
        self.config = Some(config);
    }

    fn open_log(&mut self, config: &Config) {
        let level = config.loglevel.unwrap_or(self.log.level());
        let Some(path) = &config.logfile else {
            self.log.set_level(level);
            return;
        };
        match SolverLog::create(path, level) {
            Ok(log) => {
                self.log = log;
                self.log
                    .notice(&format!("solver log '{}' opened ok", path.display()));
            }
            Err(err) => {
                log::warn!("solver log '{}' not opened: {}", path.display(), err);
                self.os_error = err.raw_os_error();
                self.log.set_level(level);
            }
        }
    }

    fn settle(&mut self, config: &Config, errors: &[ConfigError]) -> Status {
        if !errors.is_empty() {
            for err in errors {
                log::error!("{}", err);
                self.log.write(Severity::Error, &err.to_string());
            }
            return Status::Failed;
        }
        if config.solver == SolverSetting::Disable {
            return Status::Disabled;
        }

        let Some(name) = &config.import else {
            self.log
                .write(Severity::Error, "no module configured for import");
            return Status::Failed;
        };
        match self.gate.import(name, config.import_path.as_deref()) {
            Ok(module) => {
                self.module = Some(module);
                Status::Ready
            }
            Err(err) => {
                if let GateError::Io(io) = &err {
                    self.os_error = io.raw_os_error();
                }
                self.log.write(Severity::Error, &err.to_string());
                Status::Failed
            }
        }
    }

    /// Refreshes the model and calls `function` with it. `None` when the
    /// module is not ready.
    fn call(&mut self, function: &str, request: &SolveRequest<'_>) -> Option<Result<Value, GateError>> {
        if self.status != Status::Ready {
            return None;
        }
        let module = self.module.as_ref()?;
        let model = self.model.get_or_insert_with(Model::new);
        project(model, request);
        if function == SOLVE {
            model.remove(ITERATIONS);
        }
        Some(self.gate.invoke(module, function, Some(model)))
    }

    /// Runs the external solve routine.
    ///
    /// Returns the iteration count the routine stored in the model, or -1
    /// when it could not run or reported no integral count.
    pub fn solve(&mut self, request: &SolveRequest<'_>) -> i32 {
        let bus_count = request.buses.len();
        match self.call(SOLVE, request) {
            None => {
                self.log.write(
                    Severity::Error,
                    &format!("solve(bus_count={}): module not ready", bus_count),
                );
                -1
            }
            Some(Err(err)) => {
                self.log.write(
                    Severity::Warning,
                    &format!("solve(bus_count={}): solve failed: {}", bus_count, err),
                );
                -1
            }
            Some(Ok(_)) => {
                let iterations = self
                    .model
                    .as_ref()
                    .and_then(|model| model.get(ITERATIONS))
                    .and_then(Value::as_integral)
                    .and_then(|n| i32::try_from(n).ok());
                match iterations {
                    Some(n) => {
                        self.log
                            .notice(&format!("solve(bus_count={}): result = {}", bus_count, n));
                        n
                    }
                    None => {
                        self.log.write(
                            Severity::Error,
                            &format!(
                                "solve(bus_count={}): result is not an integral value",
                                bus_count
                            ),
                        );
                        -1
                    }
                }
            }
        }
    }

    /// Runs the external learn routine. Failures are logged only.
    pub fn learn(&mut self, request: &SolveRequest<'_>) {
        let bus_count = request.buses.len();
        match self.call(LEARN, request) {
            None => self.log.write(
                Severity::Error,
                &format!("learn(bus_count={}): module not ready", bus_count),
            ),
            Some(Err(err)) => self.log.write(
                Severity::Warning,
                &format!("learn(bus_count={}): learn failed: {}", bus_count, err),
            ),
            Some(Ok(_)) => {}
        }
    }

    /// Writes the dump files configured by `busdump` and `branchdump`, then
    /// runs the `on_dump` hook.
    pub fn dump(
        &mut self,
        buses: &[BusRecord],
        branches: &[BranchRecord],
        allow_generic: bool,
    ) -> Result<DumpSummary, DumpError> {
        let targets = DumpTargets::from_config(self.config.as_ref(), allow_generic);
        let (bus, branch) = match dump::export(&targets, buses, branches) {
            Ok(files) => files,
            Err(err) => {
                self.log.write(err.severity(), &err.to_string());
                return Err(err);
            }
        };

        let mut outcome = None;
        if let Some(on_dump) = self.config.as_ref().and_then(|c| c.on_dump.clone()) {
            let result = hook::dispatch(&on_dump, &mut self.gate, self.module.as_ref());
            if let HookOutcome::Failed(reason) = &result {
                self.log.write(
                    Severity::Warning,
                    &format!("on_dump '{}' failed, {}", on_dump, reason),
                );
            }
            outcome = Some(result);
        }

        Ok(DumpSummary {
            bus,
            branch,
            hook: outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::gate::NativeGate;
    use crate::logger::capture::Capture;
    use crate::network::BusRecordBuilder;
    use anyhow::Result;
    use std::cell::Cell;
    use std::env;
    use std::fs;
    use std::rc::Rc;

    fn counting_gate(calls: &Rc<Cell<usize>>, iterations: Value) -> NativeGate {
        let solve_calls = calls.clone();
        let learn_calls = calls.clone();
        NativeGate::new()
            .with("nr", SOLVE, move |model| {
                solve_calls.set(solve_calls.get() + 1);
                if let Some(model) = model {
                    model.insert(ITERATIONS, iterations.clone());
                }
                Ok(Value::Bool(true))
            })
            .with("nr", LEARN, move |_| {
                learn_calls.set(learn_calls.get() + 1);
                Ok(Value::Null)
            })
    }

    fn ready_config() -> Config {
        ConfigBuilder::default()
            .import("nr")
            .loglevel(3)
            .build()
            .unwrap()
    }

    fn buses() -> Vec<BusRecord> {
        vec![BusRecordBuilder::default().name("n1").build().unwrap()]
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::Init.to_string(), "SPS_INIT");
        assert_eq!(Status::Ready.to_string(), "SPS_READY");
        assert_eq!(Status::Failed.to_string(), "SPS_FAILED");
        assert_eq!(Status::Disabled.to_string(), "SPS_DISABLED");
    }

    #[test]
    fn test_solve_returns_iterations() {
        let calls = Rc::new(Cell::new(0));
        let mut gateway = Gateway::from_config(counting_gate(&calls, Value::Integer(4)), ready_config());
        assert_eq!(gateway.status(), Status::Init);
        assert_eq!(gateway.init(), 0);
        assert_eq!(gateway.status(), Status::Ready);

        let buses = buses();
        let request = SolveRequest::new(&buses, &[]).iterations(2);
        assert_eq!(gateway.solve(&request), 4);
        gateway.learn(&request);
        assert_eq!(calls.get(), 2);

        let model = gateway.model().unwrap();
        assert!(model.contains_key(crate::model::BUS_DATA));
        assert!(model.contains_key(crate::model::CONTEXT));
    }

    #[test]
    fn test_solve_accepts_integral_number() {
        let calls = Rc::new(Cell::new(0));
        let mut gateway = Gateway::from_config(counting_gate(&calls, Value::Number(7.0)), ready_config());
        gateway.init();
        assert_eq!(gateway.solve(&SolveRequest::new(&[], &[])), 7);
    }

    #[test]
    fn test_solve_rejects_bad_iterations() {
        for bad in [
            Value::Number(2.5),
            Value::from("3"),
            Value::Null,
            Value::Integer(i64::from(i32::MAX) + 1),
        ] {
            let capture = Capture::default();
            let calls = Rc::new(Cell::new(0));
            let mut gateway = Gateway::from_config(counting_gate(&calls, bad), ready_config())
                .with_log(SolverLog::to_writer(capture.clone(), 3));
            gateway.init();
            assert_eq!(gateway.solve(&SolveRequest::new(&[], &[])), -1);
            assert!(capture
                .lines()
                .iter()
                .any(|l| l.contains("result is not an integral value")));
        }
    }

    #[test]
    fn test_stale_iterations_removed() {
        let mut gateway = Gateway::from_config(
            NativeGate::new().with("nr", SOLVE, |model| {
                if let Some(model) = model {
                    if !model.contains_key("seen") {
                        model.insert("seen", true);
                        model.insert(ITERATIONS, 3i64);
                    }
                }
                Ok(Value::Bool(true))
            }),
            ready_config(),
        );
        gateway.init();
        let request = SolveRequest::new(&[], &[]);
        assert_eq!(gateway.solve(&request), 3);
        assert_eq!(gateway.solve(&request), -1);
        assert_eq!(gateway.model().unwrap().get("seen"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_solve_call_failure() {
        let capture = Capture::default();
        let mut gateway = Gateway::from_config(
            NativeGate::new()
                .with("nr", SOLVE, |_| {
                    Err(GateError::CallFailed {
                        function: SOLVE.into(),
                        reason: "raised".into(),
                    })
                })
                .with("nr", LEARN, |_| {
                    Err(GateError::CallFailed {
                        function: LEARN.into(),
                        reason: "raised".into(),
                    })
                }),
            ready_config(),
        )
        .with_log(SolverLog::to_writer(capture.clone(), 1));
        gateway.init();
        let request = SolveRequest::new(&[], &[]);
        assert_eq!(gateway.solve(&request), -1);
        gateway.learn(&request);

        let lines = capture.lines();
        assert!(lines.iter().any(|l| l.contains("solve failed")));
        assert!(lines.iter().any(|l| l.contains("learn failed")));
    }

    #[test]
    fn test_disabled_does_not_call() {
        let calls = Rc::new(Cell::new(0));
        let config = ConfigBuilder::default()
            .import("nr")
            .solver(SolverSetting::Disable)
            .build()
            .unwrap();
        let mut gateway = Gateway::from_config(counting_gate(&calls, Value::Integer(1)), config);
        assert_eq!(gateway.init(), -1);
        assert_eq!(gateway.status(), Status::Disabled);

        let request = SolveRequest::new(&[], &[]);
        assert_eq!(gateway.solve(&request), -1);
        gateway.learn(&request);
        assert_eq!(calls.get(), 0);
        assert!(gateway.model().is_none());
    }

    #[test]
    fn test_import_failure() {
        let calls = Rc::new(Cell::new(0));
        let config = ConfigBuilder::default().import("missing").build().unwrap();
        let mut gateway = Gateway::from_config(counting_gate(&calls, Value::Integer(1)), config);
        assert_eq!(gateway.init(), -1);
        assert_eq!(gateway.status(), Status::Failed);
        assert_eq!(gateway.solve(&SolveRequest::new(&[], &[])), -1);
        assert_eq!(calls.get(), 0);
        assert!(gateway.model().is_none());

        let mut gateway = Gateway::from_config(NativeGate::new(), Config::default());
        gateway.init();
        assert_eq!(gateway.status(), Status::Failed);
    }

    #[test]
    fn test_unreadable_config() {
        let dir = env::temp_dir().join("powers_bridge_gateway_unreadable");
        let mut gateway = Gateway::new(NativeGate::new(), Some(dir.join("missing.conf")))
            .with_share_path(dir.join("also-missing.conf"));
        let rc = gateway.init();
        assert_eq!(gateway.status(), Status::Failed);
        assert!(rc > 0, "expected an OS error code, got {}", rc);
    }

    #[test]
    fn test_init_configures_once() -> Result<()> {
        let dir = env::temp_dir().join("powers_bridge_gateway_once");
        fs::create_dir_all(&dir)?;
        let conf = dir.join("solver.conf");
        let logfile = dir.join("solver.log");
        fs::write(
            &conf,
            format!("logfile {}\nloglevel 0\nimport nr\n", logfile.display()),
        )?;

        let calls = Rc::new(Cell::new(0));
        let mut gateway = Gateway::new(counting_gate(&calls, Value::Integer(1)), Some(conf.clone()))
            .with_share_path(dir.join("missing.conf"));
        assert_eq!(gateway.init(), 0);

        fs::write(&conf, "solver disable\n")?;
        fs::write(&logfile, "kept\n")?;
        assert_eq!(gateway.init(), 0);
        assert_eq!(gateway.status(), Status::Ready);
        assert_eq!(fs::read_to_string(&logfile)?.lines().next(), Some("kept"));
        Ok(())
    }

    #[test]
    fn test_invalid_config_fails() -> Result<()> {
        let dir = env::temp_dir().join("powers_bridge_gateway_invalid");
        fs::create_dir_all(&dir)?;
        let conf = dir.join("solver.conf");
        fs::write(&conf, "import nr\nsolver sometimes\n")?;

        let capture = Capture::default();
        let mut gateway = Gateway::new(NativeGate::new().with("nr", SOLVE, |_| Ok(Value::Null)), Some(conf))
            .with_share_path(dir.join("missing.conf"))
            .with_log(SolverLog::to_writer(capture.clone(), 0));
        assert_eq!(gateway.init(), -1);
        assert_eq!(gateway.status(), Status::Failed);
        assert!(capture.lines().iter().any(|l| l.contains("sometimes")));
        assert!(capture
            .lines()
            .iter()
            .any(|l| l == "solver init: status = SPS_FAILED"));
        Ok(())
    }
}
