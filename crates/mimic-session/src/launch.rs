use std::collections::BTreeMap;
use std::path::PathBuf;

use mimic_mi::MiCommand;

/// Debugger used when none is configured.
pub const DEFAULT_DEBUGGER: &str = "gdb";

/// Describes how to start a debugging session.
///
/// The debugger backend is spawned with the environment and working
/// directory of this specification, which the debugged program then
/// inherits when it is run.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Debugger backend to spawn.
    pub debugger: PathBuf,

    /// Extra arguments for the debugger backend.
    pub debugger_args: Vec<String>,

    /// Program to debug.
    pub program: PathBuf,

    /// Program arguments.
    pub args: Vec<String>,

    /// Environment variables of the debugger (and so of the program).
    pub env: LaunchEnv,

    /// Working directory of the debugger (and so of the program).
    pub current_dir: Option<PathBuf>,

    /// Where the program runs.
    pub connection: Connection,
}

impl LaunchSpec {
    /// Constructs a new `LaunchSpec` for debugging the program at path
    /// `program`, with the following default configuration:
    ///
    /// * The [default debugger](DEFAULT_DEBUGGER), searched in `PATH`
    /// * No arguments to the program
    /// * Inherit the current process's environment
    /// * Inherit the current process's working directory
    /// * Run the program locally
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            debugger: DEFAULT_DEBUGGER.into(),
            debugger_args: Vec::new(),
            program: program.into(),
            args: Vec::new(),
            env: LaunchEnv::Inherit(BTreeMap::new()),
            current_dir: None,
            connection: Connection::Local,
        }
    }

    /// Sets the debugger backend to spawn.
    pub fn debugger(mut self, debugger: impl Into<PathBuf>) -> Self {
        self.debugger = debugger.into();
        self
    }

    /// Adds an argument to pass to the debugger backend.
    pub fn debugger_arg(mut self, arg: impl Into<String>) -> Self {
        self.debugger_args.push(arg.into());
        self
    }

    /// Adds an argument to pass to the program.
    ///
    /// To pass multiple arguments see [`args`](Self::args).
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple arguments to pass to the program.
    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        args.into_iter().fold(self, |spec, arg| spec.arg(arg))
    }

    /// Inserts or updates an explicit environment variable mapping.
    ///
    /// Environment variables explicitly set take precedence over inherited
    /// ones. Inheritance can be disabled entirely using
    /// [`env_clear`](Self::env_clear) or for a single key using
    /// [`env_remove`](Self::env_remove).
    pub fn env<K, V>(mut self, key: K, val: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        match self.env {
            LaunchEnv::Inherit(ref mut env) => {
                env.insert(key.into(), Some(val.into()));
            }
            LaunchEnv::NoInherit(ref mut env) => {
                env.insert(key.into(), val.into());
            }
        }

        self
    }

    /// Inserts or updates multiple explicit environment variable mappings.
    pub fn envs<I, K, V>(self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        vars.into_iter().fold(self, |spec, (k, v)| spec.env(k, v))
    }

    /// Removes an explicitly set environment variable and prevents inheriting
    /// it from the current process.
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        match self.env {
            LaunchEnv::Inherit(ref mut env) => {
                env.insert(key.into(), None);
            }
            LaunchEnv::NoInherit(ref mut env) => {
                env.remove(&key.into());
            }
        }

        self
    }

    /// Clears all explicitly set environment variables and prevents inheriting
    /// any variable of the current process.
    pub fn env_clear(mut self) -> Self {
        self.env = LaunchEnv::NoInherit(BTreeMap::new());
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Debugs the program on a remote debug server instead of locally.
    pub fn remote(mut self, host: impl Into<String>, port: u16) -> Self {
        self.connection = Connection::Remote {
            host: host.into(),
            port,
        };
        self
    }

    /// Command line arguments of the debugger backend.
    pub fn debugger_command_line(&self) -> Vec<String> {
        ["--interpreter=mi2", "--quiet"]
            .into_iter()
            .map(str::to_owned)
            .chain(self.debugger_args.iter().cloned())
            .collect()
    }

    /// Commands issued once the backend is up, before any user request.
    pub fn setup_commands(&self) -> Vec<MiCommand> {
        let mut commands = vec![
            MiCommand::new("gdb-set").args(["mi-async", "on"]),
            MiCommand::new("gdb-set").args(["pagination", "off"]),
            MiCommand::new("gdb-set").args(["confirm", "off"]),
            MiCommand::new("file-exec-and-symbols").arg(self.program.to_string_lossy()),
        ];

        if !self.args.is_empty() {
            commands.push(MiCommand::new("exec-arguments").args(self.args.iter().cloned()));
        }

        if let Connection::Remote { host, port } = &self.connection {
            commands.push(MiCommand::new("target-select").args([
                "remote".to_owned(),
                format!("{host}:{port}"),
            ]));
        }

        commands
    }
}

/// Where the debugged program runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    /// Spawned by the debugger on this machine.
    Local,

    /// Hosted by a remote debug server.
    Remote {
        /// Server host name or address.
        host: String,

        /// Server TCP port.
        port: u16,
    },
}

/// Environment variables attached to a [LaunchSpec].
#[derive(Debug, Clone)]
pub enum LaunchEnv {
    /// Environment variables to set, in addition to the ones inherited from
    /// the current process.
    ///
    /// A `None` value indicates that the environment variable will be removed,
    /// even if it was inherited.
    Inherit(BTreeMap<String, Option<String>>),

    /// Environment variables to set, without inheriting any from the current
    /// process.
    NoInherit(BTreeMap<String, String>),
}

impl LaunchEnv {
    /// Captures the current environment with the specified changes applied.
    ///
    /// Returns `None` when the environment is inherited unchanged.
    pub fn captured(&self) -> Option<BTreeMap<String, String>> {
        let mut captured_env = BTreeMap::new();

        match self {
            Self::Inherit(env) if env.is_empty() => return None,
            Self::Inherit(env) => {
                captured_env.extend(std::env::vars());
                for (k, v) in env {
                    if let Some(v) = v {
                        captured_env.insert(k.clone(), v.clone());
                    } else {
                        captured_env.remove(k);
                    }
                }
            }
            Self::NoInherit(env) => {
                captured_env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        Some(captured_env)
    }
}
