//! Crate implementing the CLI commands.

mod cli;
mod config;
mod console;
mod dump;
mod repl;
mod replay;
mod run;

pub use self::cli::{CliAction, CliOpts};
pub use self::config::{
    ConfigError, DEFAULT_BREAKPOINT, EnvVar, LaunchConfig, RemoteTarget, parse_launch_config,
};
pub use self::console::ConsolePrinter;
pub use self::dump::{dump_session, session_to_kdl};
pub use self::repl::{Flow, HELP, ReplCommand, ReplError, execute};
pub use self::replay::ReplayTransport;
pub use self::run::{evaluate_debug, evaluate_replay};
