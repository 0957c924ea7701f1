#![allow(missing_docs)]
#![allow(clippy::print_stderr)]

use mimic_cli::{CliAction, CliOpts};

use tracing_subscriber::EnvFilter;

fn main() {
    let cli = CliOpts::parse_from_cmdline();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("MIMIC_LOG")
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let res = match cli.action {
        CliAction::Debug {
            config,
            program,
            args,
        } => mimic_cli::evaluate_debug(config, program, args).map(Some),
        CliAction::Replay {
            transcript,
            output,
            quiet,
        } => mimic_cli::evaluate_replay(transcript, output, quiet).map(|_| None),
    };

    match res {
        Ok(Some(exit_code)) => std::process::exit(exit_code),
        Ok(None) => (),
        Err(e) => {
            eprintln!("{e:?}");
            std::process::exit(1);
        }
    }
}
