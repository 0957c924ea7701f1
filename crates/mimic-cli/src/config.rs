use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use miette::IntoDiagnostic;
use mimic_session::LaunchSpec;

/// Configuration of a debugging session.
#[derive(Debug, Default, PartialEq, knus::Decode)]
pub struct LaunchConfig {
    /// Debugger backend to spawn.
    #[knus(child, unwrap(argument))]
    pub debugger: Option<PathBuf>,

    /// Extra arguments of the debugger backend.
    #[knus(child, default, unwrap(arguments))]
    pub debugger_args: Vec<String>,

    /// Program to debug.
    #[knus(child, unwrap(argument))]
    pub program: Option<PathBuf>,

    /// Program arguments.
    #[knus(child, default, unwrap(arguments))]
    pub args: Vec<String>,

    /// Working directory of the program.
    #[knus(child, unwrap(argument))]
    pub working_dir: Option<PathBuf>,

    /// Whether the program starts from an empty environment.
    #[knus(child)]
    pub env_clear: bool,

    /// Environment variables to set.
    #[knus(children(name = "env"))]
    pub env: Vec<EnvVar>,

    /// Environment variables not to inherit.
    #[knus(children(name = "env-remove"), unwrap(argument))]
    pub env_remove: Vec<String>,

    /// Remote debug server to connect to.
    #[knus(child)]
    pub remote: Option<RemoteTarget>,

    /// Functions to break at (`main` when none is given).
    #[knus(children(name = "break"), unwrap(argument))]
    pub breakpoints: Vec<String>,

    /// Expressions to watch from the first stop.
    #[knus(children(name = "watch"), unwrap(argument))]
    pub watches: Vec<String>,
}

/// Environment variable of the program.
#[derive(Debug, PartialEq, knus::Decode)]
pub struct EnvVar {
    /// Variable name.
    #[knus(argument)]
    pub name: String,

    /// Variable value.
    #[knus(argument)]
    pub value: String,
}

/// Remote debug server (e.g., `gdbserver`).
#[derive(Debug, PartialEq, knus::Decode)]
pub struct RemoteTarget {
    /// Host name or address.
    #[knus(property)]
    pub host: String,

    /// TCP port.
    #[knus(property)]
    pub port: u16,
}

/// Error of the launch configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// No program to debug was given.
    #[error("no program to debug (neither configured nor on the command line)")]
    MissingProgram,
}

/// Function the program breaks at when no breakpoint is configured.
pub const DEFAULT_BREAKPOINT: &str = "main";

impl LaunchConfig {
    /// Functions to break at before the program runs.
    ///
    /// Defaults to the program entry, so that a session always gets a first
    /// stop.
    pub fn startup_breakpoints(&self) -> Vec<String> {
        if self.breakpoints.is_empty() {
            vec![DEFAULT_BREAKPOINT.to_owned()]
        } else {
            self.breakpoints.clone()
        }
    }

    /// Builds the launch specification of this configuration.
    ///
    /// `program` and `args`, when given, take precedence over the configured
    /// ones.
    pub fn into_launch_spec(
        self,
        program: Option<PathBuf>,
        args: Vec<String>,
    ) -> Result<LaunchSpec, ConfigError> {
        let program = program
            .or(self.program)
            .ok_or(ConfigError::MissingProgram)?;
        let args = if args.is_empty() { self.args } else { args };

        let mut spec = LaunchSpec::new(program).args(args);

        if let Some(debugger) = self.debugger {
            spec = spec.debugger(debugger);
        }

        spec = self
            .debugger_args
            .into_iter()
            .fold(spec, LaunchSpec::debugger_arg);

        if let Some(dir) = self.working_dir {
            spec = spec.current_dir(dir);
        }

        if self.env_clear {
            spec = spec.env_clear();
        }

        spec = self
            .env_remove
            .into_iter()
            .fold(spec, LaunchSpec::env_remove)
            .envs(self.env.into_iter().map(|var| (var.name, var.value)));

        if let Some(RemoteTarget { host, port }) = self.remote {
            spec = spec.remote(host, port);
        }

        Ok(spec)
    }
}

/// Parses a launch configuration, either inline or from a `.kdl` file.
pub fn parse_launch_config(config: &str) -> miette::Result<LaunchConfig> {
    let path = Path::new(config);

    let config = if let Some((filename, "kdl")) = path
        .file_name()
        .and_then(OsStr::to_str)
        .zip(path.extension().and_then(OsStr::to_str))
    {
        let content = std::fs::read_to_string(path).into_diagnostic()?;
        knus::parse(filename, &content)?
    } else {
        knus::parse("<content>", config)?
    };

    Ok(config)
}
