use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use miette::IntoDiagnostic;
use mimic_session::{BreakpointId, Session, ThreadId, Transport, WatchId};

use crate::console::{self, ConsolePrinter};
use crate::dump::dump_session;

/// Help of the interactive commands.
pub const HELP: &str = "\
run | r                start the program
continue | c           resume the program
next | n               step over the current line
step | s               step into the current line
finish                 step out of the selected frame
stop                   interrupt the program, or end the session
kill                   kill the debugger
break <function>       set a breakpoint
delete <id>            delete a breakpoint
watch <expr>           watch an expression
unwatch <id>           delete a watch
rename <id> <expr>     change the expression of a watch
format <id|local>      cycle the display format of a watch or local
thread <id>            select a thread
frame <index>          select a frame
bt                     print the call stack
threads                print the threads
breaks                 print the breakpoints
watches                print the watches
locals                 print the local variables
dump [path]            dump the session state (KDL format)
quit | q               end the session";

/// An interactive command.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand {
    /// Start the program.
    Run,
    /// Resume the program.
    Continue,
    /// Step over.
    Next,
    /// Step in.
    Step,
    /// Step out.
    Finish,
    /// Interrupt the program, or end the session.
    Stop,
    /// Kill the debugger.
    Kill,
    /// Set a breakpoint at a function.
    Break(String),
    /// Delete a breakpoint.
    Delete(BreakpointId),
    /// Watch an expression.
    Watch(String),
    /// Delete a watch.
    Unwatch(WatchId),
    /// Change the expression of a watch.
    Rename(WatchId, String),
    /// Cycle the display format of a watch.
    FormatWatch(WatchId),
    /// Cycle the display format of a local variable.
    FormatLocal(String),
    /// Select a thread.
    Thread(ThreadId),
    /// Select a frame.
    Frame(usize),
    /// Print the call stack.
    Backtrace,
    /// Print the threads.
    Threads,
    /// Print the breakpoints.
    Breaks,
    /// Print the watches.
    Watches,
    /// Print the local variables.
    Locals,
    /// Dump the session state.
    Dump(Option<PathBuf>),
    /// Print the help.
    Help,
    /// End the session.
    Quit,
}

/// Error parsing an interactive command.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ReplError {
    /// Unknown command name.
    #[error("unknown command `{0}` (try `help`)")]
    UnknownCommand(String),

    /// A required argument is missing.
    #[error("`{command}` expects {argument}")]
    MissingArgument {
        /// Command name.
        command: &'static str,
        /// Description of the argument.
        argument: &'static str,
    },

    /// An argument is not a valid number.
    #[error("`{0}` is not a valid number")]
    InvalidNumber(String),
}

impl FromStr for ReplCommand {
    type Err = ReplError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, rest) = line
            .split_once(char::is_whitespace)
            .map(|(name, rest)| (name, rest.trim()))
            .unwrap_or((line, ""));

        let text = |command, argument| {
            if rest.is_empty() {
                Err(ReplError::MissingArgument { command, argument })
            } else {
                Ok(rest.to_owned())
            }
        };

        let command = match name {
            "run" | "r" => Self::Run,
            "continue" | "c" => Self::Continue,
            "next" | "n" => Self::Next,
            "step" | "s" => Self::Step,
            "finish" => Self::Finish,
            "stop" => Self::Stop,
            "kill" => Self::Kill,
            "break" | "b" => Self::Break(text("break", "a function")?),
            "delete" => Self::Delete(number(&text("delete", "a breakpoint id")?)?),
            "watch" => Self::Watch(text("watch", "an expression")?),
            "unwatch" => Self::Unwatch(number(&text("unwatch", "a watch id")?)?),
            "rename" => {
                let (id, expression) = rest.split_once(char::is_whitespace).ok_or(
                    ReplError::MissingArgument {
                        command: "rename",
                        argument: "a watch id and an expression",
                    },
                )?;
                Self::Rename(number(id)?, expression.trim().to_owned())
            }
            "format" => {
                let target = text("format", "a watch id or a local variable")?;
                match target.parse() {
                    Ok(id) => Self::FormatWatch(id),
                    Err(_) => Self::FormatLocal(target),
                }
            }
            "thread" => Self::Thread(number(&text("thread", "a thread id")?)?),
            "frame" | "f" => Self::Frame(number(&text("frame", "a frame index")?)?),
            "bt" | "backtrace" => Self::Backtrace,
            "threads" => Self::Threads,
            "breaks" => Self::Breaks,
            "watches" => Self::Watches,
            "locals" => Self::Locals,
            "dump" => Self::Dump((!rest.is_empty()).then(|| PathBuf::from(rest))),
            "help" | "h" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            name => return Err(ReplError::UnknownCommand(name.to_owned())),
        };

        Ok(command)
    }
}

fn number<N: FromStr>(text: &str) -> Result<N, ReplError> {
    text.parse()
        .map_err(|_| ReplError::InvalidNumber(text.to_owned()))
}

/// Whether the interactive loop goes on.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    /// Wait for the next command.
    Continue,
    /// End the session.
    Quit,
}

/// Executes an interactive command.
///
/// Request failures (e.g., stepping a running program) are printed, only
/// I/O failures with the backend are returned.
pub async fn execute<T: Transport, W: Write>(
    session: &mut Session<T>,
    printer: &mut ConsolePrinter<W>,
    command: ReplCommand,
) -> miette::Result<Flow> {
    tracing::debug!(?command, "execute");

    let res = match command {
        ReplCommand::Run => session.run().await.map(drop),
        ReplCommand::Continue => session.continue_().await.map(drop),
        ReplCommand::Next => session.next().await.map(drop),
        ReplCommand::Step => session.step_in().await.map(drop),
        ReplCommand::Finish => session.step_out().await.map(drop),
        ReplCommand::Stop => session.stop().await,
        ReplCommand::Kill => session.kill(),
        ReplCommand::Break(function) => session
            .set_breakpoint_at_function(&function)
            .await
            .map(drop),
        ReplCommand::Delete(id) => session.remove_breakpoint(id).await.map(drop),
        // the created watch is reported by the session listener
        ReplCommand::Watch(expression) => session.add_variable_watch(&expression).await.map(drop),
        ReplCommand::Unwatch(id) => session.remove_variable_watch(id).await,
        ReplCommand::Rename(id, expression) => session
            .rename_variable_watch(id, &expression)
            .await
            .map(drop),
        ReplCommand::FormatWatch(id) => session
            .cycle_watch_format(id)
            .map(|value| printer.message(format_args!("{value}"))),
        ReplCommand::FormatLocal(name) => {
            session
                .cycle_local_format(&name)
                .map(|value| match value {
                    Some(value) => printer.message(format_args!("{name} = {value}")),
                    None => printer.message(format_args!("no local variable `{name}`")),
                })
        }
        ReplCommand::Thread(id) => session.select_thread(id).await,
        ReplCommand::Frame(index) => session.select_frame(index).await,
        ReplCommand::Backtrace => {
            console::print_frames(
                printer,
                session.stack_frames(),
                Some(session.current_frame()),
            );
            Ok(())
        }
        ReplCommand::Threads => {
            console::print_threads(printer, &session.threads(), session.current_thread());
            Ok(())
        }
        ReplCommand::Breaks => {
            console::print_breakpoints(printer, &session.breakpoints());
            Ok(())
        }
        ReplCommand::Watches => {
            console::print_values(
                printer,
                session.watches().into_iter().map(|watch| {
                    (
                        format!("{}: {}", watch.id, watch.expression),
                        watch.display_value(),
                    )
                }),
            );
            Ok(())
        }
        ReplCommand::Locals => {
            console::print_values(
                printer,
                session
                    .locals()
                    .into_iter()
                    .map(|local| (local.name.clone(), local.display_value())),
            );
            Ok(())
        }
        ReplCommand::Dump(Some(path)) => {
            let file = File::create(path).into_diagnostic()?;
            dump_session(session, file)?;
            Ok(())
        }
        ReplCommand::Dump(None) => {
            dump_session(session, printer.output())?;
            Ok(())
        }
        ReplCommand::Help => {
            printer.message(format_args!("{HELP}"));
            Ok(())
        }
        ReplCommand::Quit => return Ok(Flow::Quit),
    };

    match res {
        Ok(()) => (),
        Err(mimic_session::Error::Io(e)) => return Err(e).into_diagnostic(),
        Err(e) => printer.message(format_args!("error: {e}")),
    }

    Ok(Flow::Continue)
}
