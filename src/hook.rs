use crate::gate::{CallGate, ModuleHandle};
use std::fmt;
use std::process::Command;

/// Prefix marking a hook as a function of the external module.
pub const FUNCTION_PREFIX: &str = "python:";

/// Action run after a dump completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpHook {
    /// Call the named function of the external module, without arguments.
    Function(String),
    /// Run a command line with the system shell.
    Command(String),
}

impl From<&str> for DumpHook {
    fn from(descriptor: &str) -> Self {
        match descriptor.strip_prefix(FUNCTION_PREFIX) {
            Some(name) => DumpHook::Function(name.to_string()),
            None => DumpHook::Command(descriptor.to_string()),
        }
    }
}

impl fmt::Display for DumpHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpHook::Function(name) => write!(f, "{}{}", FUNCTION_PREFIX, name),
            DumpHook::Command(command) => f.write_str(command),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Completed,
    Failed(String),
}

/// Runs `hook` and reports how it went. Failures are returned, never
/// raised: a hook cannot undo the dump that triggered it.
pub fn dispatch<G: CallGate + ?Sized>(
    hook: &DumpHook,
    gate: &mut G,
    module: Option<&ModuleHandle>,
) -> HookOutcome {
    match hook {
        DumpHook::Function(name) => {
            let Some(module) = module else {
                return HookOutcome::Failed(format!("no module loaded to call '{}'", name));
            };
            match gate.invoke(module, name, None) {
                Ok(result) if result.is_truthy() => HookOutcome::Completed,
                Ok(result) => HookOutcome::Failed(format!("'{}' returned {:?}", name, result)),
                Err(err) => HookOutcome::Failed(err.to_string()),
            }
        }
        DumpHook::Command(command) => match shell(command).status() {
            Ok(status) if status.success() => HookOutcome::Completed,
            Ok(status) => HookOutcome::Failed(match status.code() {
                Some(rc) => format!("rc = {}", rc),
                None => status.to_string(),
            }),
            Err(err) => HookOutcome::Failed(err.to_string()),
        },
    }
}

#[cfg(not(windows))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
