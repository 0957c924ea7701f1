use std::io::Write;

use mimic_session::{
    BreakPoint, ExitReason, LocalVariable, SessionListener, SourceLocation, StackFrameEntry,
    StopEvent, TargetState, ThreadId, ThreadInfo, WatchedVariable,
};

/// Session listener printing events in a human-readable way.
pub struct ConsolePrinter<W> {
    output: W,
    verbose: bool,
}

impl<W: Write> ConsolePrinter<W> {
    /// Initializes the printer with its output.
    ///
    /// Table updates (stack, threads, breakpoints and locals) are only
    /// printed when `verbose` is set, since they are also available on
    /// request.
    pub const fn new(output: W, verbose: bool) -> Self {
        Self { output, verbose }
    }

    /// Returns the inner output.
    pub fn into_inner(self) -> W {
        self.output
    }

    /// Prints a line.
    pub fn message(&mut self, line: std::fmt::Arguments<'_>) {
        self.print(line);
    }

    /// Returns the output, to print something else than lines.
    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    fn print(&mut self, line: std::fmt::Arguments<'_>) {
        if let Err(e) = self.output.write_fmt(line).and_then(|_| self.output.write_all(b"\n")) {
            tracing::warn!(error = %e, "failed to print event");
        }
    }

    fn print_text(&mut self, text: &str) {
        if let Err(e) = self.output.write_all(text.as_bytes()) {
            tracing::warn!(error = %e, "failed to print output");
        }
    }
}

impl<W: Write> SessionListener for ConsolePrinter<W> {
    fn on_state_changed(&mut self, state: TargetState) {
        if self.verbose {
            self.print(format_args!("[{state}]"));
        }
    }

    fn on_stopped(&mut self, stop: &StopEvent) {
        match (&stop.frame, stop.thread_id) {
            (Some(frame), Some(thread)) => {
                self.print(format_args!("{} (thread {thread}): {frame}", stop.reason))
            }
            (Some(frame), None) => self.print(format_args!("{}: {frame}", stop.reason)),
            (None, _) => self.print(format_args!("{}", stop.reason)),
        }
    }

    fn on_current_line(&mut self, location: Option<&SourceLocation>) {
        if let Some(location) = location {
            self.print(format_args!("  at {location}"));
        }
    }

    fn on_exited(&mut self, reason: &ExitReason) {
        self.print(format_args!("program {reason}"));
    }

    fn on_stack_changed(&mut self, frames: &[StackFrameEntry]) {
        if self.verbose && !frames.is_empty() {
            print_frames(self, frames, None);
        }
    }

    fn on_frame_changed(&mut self, index: usize, frame: Option<&StackFrameEntry>) {
        match frame {
            Some(frame) => self.print(format_args!("{frame}")),
            None => self.print(format_args!("frame #{index}")),
        }
    }

    fn on_threads_changed(&mut self, threads: &[ThreadInfo]) {
        if self.verbose {
            print_threads(self, threads, None);
        }
    }

    fn on_current_thread_changed(&mut self, id: ThreadId) {
        self.print(format_args!("[thread {id}]"));
    }

    fn on_breakpoints_changed(&mut self, breakpoints: &[BreakPoint]) {
        if self.verbose {
            print_breakpoints(self, breakpoints);
        }
    }

    fn on_local_changed(&mut self, local: &LocalVariable) {
        if self.verbose {
            self.print(format_args!("  {} = {}", local.name, local.display_value()));
        }
    }

    fn on_watch_changed(&mut self, watch: &WatchedVariable) {
        self.print(format_args!(
            "watch {}: {} = {}",
            watch.id,
            watch.expression,
            watch.display_value()
        ));
    }

    fn on_console_output(&mut self, text: &str) {
        self.print_text(text);
    }

    fn on_target_output(&mut self, text: &str) {
        self.print(format_args!("{text}"));
    }

    fn on_log_output(&mut self, text: &str) {
        if self.verbose {
            self.print_text(text);
        }
    }

    fn on_signal_received(&mut self, signal: &str) {
        self.print(format_args!("program received {signal}"));
    }

    fn on_message(&mut self, message: &str) {
        self.print(format_args!("{message}"));
    }
}

/// Prints a call stack, marking the selected frame.
pub fn print_frames<W: Write>(
    printer: &mut ConsolePrinter<W>,
    frames: &[StackFrameEntry],
    selected: Option<usize>,
) {
    for frame in frames {
        let marker = if selected == Some(frame.level) { '*' } else { ' ' };
        printer.print(format_args!("{marker} {frame}"));
    }
}

/// Prints a thread list, marking the selected thread.
pub fn print_threads<W: Write>(
    printer: &mut ConsolePrinter<W>,
    threads: &[ThreadInfo],
    selected: Option<ThreadId>,
) {
    for thread in threads {
        let marker = if selected == Some(thread.id) { '*' } else { ' ' };

        match &thread.function {
            Some(function) => printer.print(format_args!(
                "{marker} {} \"{}\" in {function}",
                thread.id, thread.name
            )),
            None => printer.print(format_args!("{marker} {} \"{}\"", thread.id, thread.name)),
        }
    }
}

/// Prints a breakpoint list.
pub fn print_breakpoints<W: Write>(printer: &mut ConsolePrinter<W>, breakpoints: &[BreakPoint]) {
    if breakpoints.is_empty() {
        printer.print(format_args!("no breakpoints"));
    }

    for breakpoint in breakpoints {
        printer.print(format_args!("  {breakpoint}"));
    }
}

/// Prints watches, or local variables.
pub fn print_values<W: Write>(
    printer: &mut ConsolePrinter<W>,
    values: impl IntoIterator<Item = (String, String)>,
) {
    for (name, value) in values {
        printer.print(format_args!("  {name} = {value}"));
    }
}

#[cfg(test)]
mod tests {
    use mimic_session::{
        ExitReason, SessionEvent, SessionListener, SourceLocation, StackFrameEntry, StopEvent,
        StopReason,
    };

    use super::ConsolePrinter;

    #[test]
    fn prints_stops_and_exits() {
        let mut printer = ConsolePrinter::new(Vec::new(), false);

        let frame = StackFrameEntry {
            level: 0,
            function: "main".to_owned(),
            file: Some("main.c".to_owned()),
            full_path: Some("/src/main.c".into()),
            line: Some(42),
            address: None,
        };

        for event in [
            SessionEvent::Stopped(StopEvent {
                reason: StopReason::BreakpointHit(Some(1)),
                thread_id: Some(1),
                frame: Some(frame),
            }),
            SessionEvent::CurrentLine(Some(SourceLocation {
                path: "/src/main.c".into(),
                line: 42,
            })),
            SessionEvent::LogOutput("hidden\n".to_owned()),
            SessionEvent::ConsoleOutput("hello\n".to_owned()),
            SessionEvent::Exited(ExitReason::ExitedAbnormally(3)),
        ] {
            printer.on_event(&event);
        }

        let output = String::from_utf8(printer.into_inner()).expect("utf-8 output");

        assert_eq!(
            output,
            indoc::indoc! {"
                breakpoint 1 hit (thread 1): #0 main at main.c:42
                  at /src/main.c:42
                hello
                program exited with code 3
            "}
        );
    }
}
