use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Message severity. Lower is more severe; a message is written when its
/// severity does not exceed the configured level.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub enum Severity {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl Severity {
    fn log_level(&self) -> log::Level {
        match self {
            Severity::Error => log::Level::Error,
            Severity::Warning => log::Level::Warn,
            Severity::Info => log::Level::Info,
            Severity::Debug => log::Level::Debug,
        }
    }
}

/// Level that disables the solver log.
pub const LOG_DISABLED: i32 = -1;

/// Solver log sink.
///
/// Writes one line per message, without timestamp, and flushes after each
/// line. Every message is also passed to the `log` facade.
pub struct SolverLog {
    level: i32,
    sink: Option<Box<dyn Write>>,
}

impl SolverLog {
    pub fn disabled() -> Self {
        Self {
            level: LOG_DISABLED,
            sink: None,
        }
    }

    /// Creates (truncates) the log file at `path`.
    pub fn create(path: &Path, level: i32) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::to_writer(file, level))
    }

    pub fn to_writer(writer: impl Write + 'static, level: i32) -> Self {
        Self {
            level,
            sink: Some(Box::new(writer)),
        }
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn set_level(&mut self, level: i32) {
        self.level = level;
    }

    pub fn enabled(&self, severity: Severity) -> bool {
        self.sink.is_some() && severity as i32 <= self.level
    }

    pub fn write(&mut self, severity: Severity, message: &str) {
        log::log!(severity.log_level(), "{}", message);

        if self.enabled(severity) {
            self.emit(message);
        }
    }

    /// Writes an informational line whenever the log is enabled.
    pub fn notice(&mut self, message: &str) {
        log::info!("{}", message);

        if self.level >= 0 {
            self.emit(message);
        }
    }

    fn emit(&mut self, message: &str) {
        if let Some(sink) = self.sink.as_mut() {
            let written = writeln!(sink, "{}", message).and_then(|_| sink.flush());
            if let Err(err) = written {
                log::warn!("solver log write failed: {}", err);
            }
        }
    }
}

impl Default for SolverLog {
    fn default() -> Self {
        Self::disabled()
    }
}
