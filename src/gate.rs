//! Call gate to the external module that provides solve and learn routines.
//!
//! The gate is the only way the bridge talks to external logic: import a
//! module once, then invoke its functions by name with at most one
//! argument, the model handle. Invocations block until the function
//! returns.

use crate::model::{Model, Value};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{self, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("module '{name}' not found in path '{}'", display_path(.path))]
    ModuleNotFound { name: String, path: Option<PathBuf> },

    #[error("function '{function}' not found in module '{module}'")]
    FunctionNotFound { module: String, function: String },

    #[error("call to '{function}' failed: {reason}")]
    CallFailed { function: String, reason: String },

    #[error("malformed reply from '{function}': {source}")]
    Reply {
        function: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

/// An imported module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHandle {
    pub name: String,
    /// Where the binding found the module, if it is located on disk.
    pub location: Option<PathBuf>,
}

pub trait CallGate {
    /// Imports module `name`, searching `search_path` when given.
    fn import(&mut self, name: &str, search_path: Option<&Path>) -> Result<ModuleHandle, GateError>;

    /// Calls `function` of `module`. When `argument` is given the function
    /// may change the model in place.
    fn invoke(
        &mut self,
        module: &ModuleHandle,
        function: &str,
        argument: Option<&mut Model>,
    ) -> Result<Value, GateError>;
}

impl<G: CallGate + ?Sized> CallGate for Box<G> {
    fn import(&mut self, name: &str, search_path: Option<&Path>) -> Result<ModuleHandle, GateError> {
        (**self).import(name, search_path)
    }

    fn invoke(
        &mut self,
        module: &ModuleHandle,
        function: &str,
        argument: Option<&mut Model>,
    ) -> Result<Value, GateError> {
        (**self).invoke(module, function, argument)
    }
}

pub type NativeFn = Box<dyn FnMut(Option<&mut Model>) -> Result<Value, GateError>>;

/// In-process modules made of Rust closures.
#[derive(Default)]
pub struct NativeGate {
    modules: HashMap<String, HashMap<String, NativeFn>>,
}

impl NativeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `function` to `module`, creating the module if needed.
    pub fn register<F>(&mut self, module: &str, function: &str, f: F) -> &mut Self
    where
        F: FnMut(Option<&mut Model>) -> Result<Value, GateError> + 'static,
    {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(function.to_string(), Box::new(f));
        self
    }

    pub fn with<F>(mut self, module: &str, function: &str, f: F) -> Self
    where
        F: FnMut(Option<&mut Model>) -> Result<Value, GateError> + 'static,
    {
        self.register(module, function, f);
        self
    }
}

impl CallGate for NativeGate {
    fn import(&mut self, name: &str, search_path: Option<&Path>) -> Result<ModuleHandle, GateError> {
        if self.modules.contains_key(name) {
            Ok(ModuleHandle {
                name: name.to_string(),
                location: None,
            })
        } else {
            Err(GateError::ModuleNotFound {
                name: name.to_string(),
                path: search_path.map(Path::to_path_buf),
            })
        }
    }

    fn invoke(
        &mut self,
        module: &ModuleHandle,
        function: &str,
        argument: Option<&mut Model>,
    ) -> Result<Value, GateError> {
        let f = self
            .modules
            .get_mut(&module.name)
            .and_then(|functions| functions.get_mut(function))
            .ok_or_else(|| GateError::FunctionNotFound {
                module: module.name.clone(),
                function: function.to_string(),
            })?;
        f(argument)
    }
}

/// Modules that are executables.
///
/// A call runs the executable with the function name as its only
/// argument. The model, if any, is given on stdin as JSON; without a model
/// stdin is empty. The
/// executable may print a JSON object with optional `result` and `model`
/// members; a `model` member replaces the contents of the handle. An empty
/// output counts as a true result. A non-zero exit status is a failed
/// call.
#[derive(Debug, Default)]
pub struct ProcessGate;

#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    model: Option<Model>,
}

impl ProcessGate {
    pub fn new() -> Self {
        Self
    }
}

static INPUT_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Model file given to a module as its stdin, removed on drop. The module
/// may read all of it, part of it, or none.
struct InputFile {
    path: PathBuf,
}

impl InputFile {
    fn create(contents: &[u8]) -> io::Result<Self> {
        let path = env::temp_dir().join(format!(
            "powers-bridge-{}-{}.json",
            process::id(),
            INPUT_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let input = Self { path };
        let mut file = File::create(&input.path)?;
        file.write_all(contents)?;
        file.flush()?;
        Ok(input)
    }

    fn open(&self) -> io::Result<File> {
        File::open(&self.path)
    }
}

impl Drop for InputFile {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            log::debug!("input file '{}' not removed: {}", self.path.display(), err);
        }
    }
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

impl CallGate for ProcessGate {
    fn import(&mut self, name: &str, search_path: Option<&Path>) -> Result<ModuleHandle, GateError> {
        let program = match search_path {
            Some(dir) => Some(dir.join(name)).filter(|p| p.is_file()),
            None => find_on_path(name),
        };
        match program {
            Some(program) => {
                log::debug!("module '{}' found at '{}'", name, program.display());
                Ok(ModuleHandle {
                    name: name.to_string(),
                    location: Some(program),
                })
            }
            None => Err(GateError::ModuleNotFound {
                name: name.to_string(),
                path: search_path.map(Path::to_path_buf),
            }),
        }
    }

    fn invoke(
        &mut self,
        module: &ModuleHandle,
        function: &str,
        argument: Option<&mut Model>,
    ) -> Result<Value, GateError> {
        let program = module
            .location
            .clone()
            .unwrap_or_else(|| PathBuf::from(&module.name));

        let input = match argument.as_deref() {
            Some(model) => {
                let json = serde_json::to_vec(model).map_err(|source| GateError::Reply {
                    function: function.to_string(),
                    source,
                })?;
                Some(InputFile::create(&json)?)
            }
            None => None,
        };
        let stdin = match &input {
            Some(input) => Stdio::from(input.open()?),
            None => Stdio::null(),
        };

        let output = Command::new(&program)
            .arg(function)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()?;
        drop(input);

        if !output.status.success() {
            return Err(GateError::CallFailed {
                function: function.to_string(),
                reason: output.status.to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout);
        if text.trim().is_empty() {
            return Ok(Value::Bool(true));
        }
        let reply: Reply = serde_json::from_str(&text).map_err(|source| GateError::Reply {
            function: function.to_string(),
            source,
        })?;
        if let (Some(model), Some(argument)) = (reply.model, argument) {
            *argument = model;
        }
        Ok(reply.result.unwrap_or(Value::Bool(true)))
    }
}
