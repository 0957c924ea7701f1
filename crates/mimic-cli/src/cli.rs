use std::path::PathBuf;

/// The Mimic debugger front-end.
#[derive(clap::Parser)]
pub struct CliOpts {
    /// The command to run.
    #[clap(subcommand)]
    pub action: CliAction,
}

/// The command to run.
#[derive(clap::Subcommand)]
pub enum CliAction {
    /// Command to launch a program under the debugger, and drive it
    /// interactively.
    Debug {
        /// Launch configuration (KDL format).
        ///
        /// If it ends with `.kdl`, it is treated as a path to a configuration
        /// file. Otherwise it is directly parsed as inline KDL-formatted
        /// configuration.
        #[clap(short, long, value_name = "CONTENT/PATH")]
        config: Option<String>,

        /// Name of program to debug (overrides the configuration).
        program: Option<PathBuf>,

        /// Program's arguments (override the configuration).
        args: Vec<String>,
    },

    /// Command to replay a recorded backend transcript.
    ///
    /// Every session event is printed, followed by a dump of the final
    /// session state.
    Replay {
        /// Path to the transcript to replay.
        transcript: PathBuf,

        /// Path to the optional destination of the state dump.
        #[clap(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Do not print the session events.
        #[clap(short, long)]
        quiet: bool,
    },
}

impl CliOpts {
    /// Parses the CLI from the command-line.
    ///
    /// # Warning
    ///
    /// Exits on error.
    pub fn parse_from_cmdline() -> Self {
        <Self as clap::Parser>::parse()
    }
}
