use std::fs::File;
use std::path::PathBuf;

use miette::IntoDiagnostic;
use mimic_session::{EventChannel, ExitReason, Session, SessionEvent, TargetState};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::{LaunchConfig, parse_launch_config};
use crate::console::ConsolePrinter;
use crate::dump::dump_session;
use crate::repl::{self, Flow, ReplCommand};
use crate::replay::ReplayTransport;

/// Runs the subcommand for debugging a program interactively.
///
/// Returns the exit code of the program.
pub fn evaluate_debug(
    config: Option<String>,
    program: Option<PathBuf>,
    args: Vec<String>,
) -> miette::Result<i32> {
    let config = config
        .map(|config| parse_launch_config(&config))
        .transpose()?
        .unwrap_or_default();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;

    runtime.block_on(debug(config, program, args))
}

async fn debug(
    config: LaunchConfig,
    program: Option<PathBuf>,
    args: Vec<String>,
) -> miette::Result<i32> {
    let breakpoints = config.startup_breakpoints();
    let mut pending_watches = config.watches.clone();

    let spec = config.into_launch_spec(program, args).into_diagnostic()?;

    let mut session = Session::launch(&spec).await.into_diagnostic()?;

    session.subscribe(ConsolePrinter::new(std::io::stdout(), false));

    let (channel, mut events) = EventChannel::new();
    session.subscribe(channel);

    for function in &breakpoints {
        session
            .set_breakpoint_at_function(function)
            .await
            .into_diagnostic()?;
    }

    let mut printer = ConsolePrinter::new(std::io::stdout(), false);
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line.into_diagnostic()? else {
                    break;
                };

                if line.trim().is_empty() {
                    continue;
                }

                match line.parse::<ReplCommand>() {
                    Ok(command) => {
                        if repl::execute(&mut session, &mut printer, command).await? == Flow::Quit {
                            break;
                        }
                    }
                    Err(e) => printer.message(format_args!("{e}")),
                }
            }
            event = session.next_event() => {
                let Some(event) = event else {
                    break;
                };

                session.apply_event(event).await.into_diagnostic()?;
            }
            res = tokio::signal::ctrl_c() => {
                res.into_diagnostic()?;

                if session.state() == TargetState::Running {
                    session.stop().await.into_diagnostic()?;
                }
            }
        }

        // configured watches need a stopped program
        let stopped = std::iter::from_fn(|| events.try_recv().ok())
            .any(|event| matches!(event, SessionEvent::Stopped(_)));

        if stopped && session.state() == TargetState::Stopped {
            for expression in std::mem::take(&mut pending_watches) {
                if let Err(e) = session.add_variable_watch(&expression).await {
                    printer.message(format_args!("cannot watch `{expression}`: {e}"));
                }
            }
        }
    }

    let reason = shutdown(&mut session).await?;

    Ok(match reason {
        ExitReason::ExitedNormally => 0,
        ExitReason::ExitedAbnormally(code) => code,
        ExitReason::Signalled(_) => 128,
    })
}

/// Ends the session, gracefully unless the program is running.
async fn shutdown(session: &mut Session) -> miette::Result<ExitReason> {
    match session.state() {
        TargetState::Stopped => session.stop().await.into_diagnostic()?,
        TargetState::Running => session.kill().into_diagnostic()?,
        TargetState::Exited => (),
    }

    session.run_until_exited().await.into_diagnostic()
}

/// Runs the subcommand for replaying a backend transcript.
pub fn evaluate_replay(
    transcript: PathBuf,
    output: Option<PathBuf>,
    quiet: bool,
) -> miette::Result<()> {
    let transcript = std::fs::read_to_string(transcript).into_diagnostic()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;

    let session = runtime.block_on(async move {
        let mut session = Session::new(ReplayTransport::from_transcript(&transcript));

        if !quiet {
            session.subscribe(ConsolePrinter::new(std::io::stdout(), true));
        }

        while session.process_event().await.into_diagnostic()? {}

        miette::Result::<_>::Ok(session)
    })?;

    if let Some(output) = output {
        let file = File::create(output).into_diagnostic()?;
        dump_session(&session, file)
    } else {
        dump_session(&session, std::io::stdout())
    }
}
