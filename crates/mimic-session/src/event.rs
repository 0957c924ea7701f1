use crate::model::{
    BreakPoint, ExitReason, LocalVariable, SourceLocation, StackFrameEntry, StopEvent,
    TargetState, ThreadId, ThreadInfo, WatchedVariable,
};

/// Change of the session's view of the debugged program.
///
/// Events are dispatched after the session state has been updated, in the
/// order the changes happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The target state changed.
    StateChanged(TargetState),

    /// The program stopped.
    Stopped(StopEvent),

    /// The current source line changed, or is unknown (`None`).
    CurrentLine(Option<SourceLocation>),

    /// The program terminated.
    Exited(ExitReason),

    /// The call stack of the current thread changed.
    StackChanged(Vec<StackFrameEntry>),

    /// A frame was selected.
    FrameChanged {
        /// Index of the selected frame.
        index: usize,

        /// Selected frame, if the stack is known.
        frame: Option<StackFrameEntry>,
    },

    /// The thread list changed.
    ThreadsChanged(Vec<ThreadInfo>),

    /// Another thread was selected.
    CurrentThreadChanged(ThreadId),

    /// The breakpoint set changed (newest first).
    BreakpointsChanged(Vec<BreakPoint>),

    /// Local variables are about to be repopulated.
    LocalsReset,

    /// A local variable was reported.
    LocalChanged(LocalVariable),

    /// A watch was created, or its value changed.
    WatchChanged(WatchedVariable),

    /// Console output of the backend.
    ConsoleOutput(String),

    /// Output of the debugged program.
    TargetOutput(String),

    /// Log output of the backend.
    LogOutput(String),

    /// The program received a signal.
    SignalReceived(String),

    /// Message for the user (e.g., a command error).
    Message(String),
}
