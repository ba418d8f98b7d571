use crate::hook::DumpHook;
use derive_builder::Builder;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration file read when no local file is given or readable.
pub const DEFAULT_CONFIG_PATH: &str = "/usr/local/share/gridlabd/solver_py.conf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config '{path}' is not readable: {source}")]
    Unreadable { path: PathBuf, source: io::Error },

    #[error("config '{path}' line {line}: tag '{tag}' value '{value}' is invalid")]
    InvalidValue {
        path: PathBuf,
        line: usize,
        tag: String,
        value: String,
    },
}

impl ConfigError {
    /// OS error code behind the failure, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            ConfigError::Unreadable { source, .. } => source.raw_os_error(),
            ConfigError::InvalidValue { .. } => None,
        }
    }
}

/// Value of the `solver` tag.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
pub enum SolverSetting {
    #[default]
    Enable,
    Disable,
}

/// Settings of the external solver bridge.
#[derive(Debug, Clone, Default, PartialEq, Builder)]
#[builder(default)]
pub struct Config {
    /// Solver log file, truncated when opened.
    #[builder(setter(into, strip_option))]
    pub logfile: Option<PathBuf>,

    /// Solver log level, -1 disables logging. `None` leaves the current
    /// level unchanged.
    #[builder(setter(strip_option))]
    pub loglevel: Option<i32>,

    #[builder(setter(into, strip_option))]
    pub busdump: Option<PathBuf>,

    #[builder(setter(into, strip_option))]
    pub branchdump: Option<PathBuf>,

    /// Action run after each completed dump.
    #[builder(setter(into, strip_option))]
    pub on_dump: Option<DumpHook>,

    /// Module providing the solve and learn functions.
    #[builder(setter(into, strip_option))]
    pub import: Option<String>,

    /// Where to look for the module.
    #[builder(setter(into, strip_option))]
    pub import_path: Option<PathBuf>,

    pub solver: SolverSetting,
}

impl Config {
    /// Tag/value pairs that are set, for logging.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = Vec::new();
        if let Some(path) = &self.logfile {
            entries.push(("logfile", path.display().to_string()));
        }
        if let Some(level) = self.loglevel {
            entries.push(("loglevel", level.to_string()));
        }
        if let Some(path) = &self.busdump {
            entries.push(("busdump", path.display().to_string()));
        }
        if let Some(path) = &self.branchdump {
            entries.push(("branchdump", path.display().to_string()));
        }
        if let Some(hook) = &self.on_dump {
            entries.push(("on_dump", hook.to_string()));
        }
        if let Some(name) = &self.import {
            entries.push(("import", name.clone()));
        }
        if let Some(path) = &self.import_path {
            entries.push(("import_path", path.display().to_string()));
        }
        entries.push((
            "solver",
            match self.solver {
                SolverSetting::Enable => "enable",
                SolverSetting::Disable => "disable",
            }
            .to_string(),
        ));
        entries
    }
}

/// Result of parsing a configuration file.
///
/// Invalid values do not stop parsing. The remaining settings are kept so
/// that the log file can still be opened to report the failure.
#[derive(Debug)]
pub struct Parsed {
    pub path: PathBuf,
    pub config: Config,
    pub errors: Vec<ConfigError>,
}

impl Parsed {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Drops a trailing comment: a `#` that follows whitespace.
fn strip_comment(value: &str) -> &str {
    value
        .char_indices()
        .find(|&(i, c)| c == '#' && value[..i].ends_with(char::is_whitespace))
        .map_or(value, |(i, _)| &value[..i])
        .trim_end()
}

/// Parses configuration text.
///
/// Each line holds a tag and a value separated by whitespace. Lines whose
/// tag starts with `#`, and lines without a value, are skipped. Unknown
/// tags are reported and ignored.
///
/// The value is the rest of the line up to a trailing ` #` comment, so
/// paths and `on_dump` commands may contain spaces. Extra words after a
/// `loglevel` or `solver` value make the value invalid rather than being
/// ignored.
pub fn parse(text: &str, path: &Path) -> Parsed {
    let mut config = Config::default();
    let mut errors = Vec::new();

    for (n, line) in text.lines().enumerate() {
        let Some((tag, value)) = line.trim().split_once(char::is_whitespace) else {
            continue;
        };
        let value = strip_comment(value.trim());
        if tag.starts_with('#') || value.is_empty() {
            continue;
        }

        let invalid = || ConfigError::InvalidValue {
            path: path.to_path_buf(),
            line: n + 1,
            tag: tag.to_string(),
            value: value.to_string(),
        };

        match tag {
            "logfile" => config.logfile = Some(PathBuf::from(value)),
            "loglevel" => match value.parse::<i32>() {
                Ok(level) => config.loglevel = Some(level),
                Err(_) => errors.push(invalid()),
            },
            "busdump" => config.busdump = Some(PathBuf::from(value)),
            "branchdump" => config.branchdump = Some(PathBuf::from(value)),
            "on_dump" => config.on_dump = Some(DumpHook::from(value)),
            "import" => config.import = Some(value.to_string()),
            "import_path" => config.import_path = Some(PathBuf::from(value)),
            "solver" => match value {
                "enable" => config.solver = SolverSetting::Enable,
                "disable" => config.solver = SolverSetting::Disable,
                _ => errors.push(invalid()),
            },
            _ => log::warn!(
                "config '{}' line {}: tag '{}' is not valid",
                path.display(),
                n + 1,
                tag
            ),
        }
    }

    Parsed {
        path: path.to_path_buf(),
        config,
        errors,
    }
}

/// Reads and parses the local configuration file, falling back to `share`
/// when `local` is not given or cannot be read.
pub fn load(local: Option<&Path>, share: &Path) -> Result<Parsed, ConfigError> {
    if let Some(path) = local {
        match fs::read_to_string(path) {
            Ok(text) => return Ok(parse(&text, path)),
            Err(err) => log::debug!("config '{}' not read: {}", path.display(), err),
        }
    }
    match fs::read_to_string(share) {
        Ok(text) => Ok(parse(&text, share)),
        Err(source) => Err(ConfigError::Unreadable {
            path: share.to_path_buf(),
            source,
        }),
    }
}
