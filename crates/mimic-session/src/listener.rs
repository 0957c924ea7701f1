use std::path::Path;

use tokio::sync::mpsc;

use crate::event::SessionEvent;
use crate::model::{
    BreakPoint, ExitReason, LocalVariable, SourceLocation, StackFrameEntry, StopEvent,
    TargetState, ThreadId, ThreadInfo, WatchedVariable,
};

/// Trait for implementing a session event listener.
///
/// Every method has a no-op default, so a listener only implements the
/// capabilities it cares about. [on_event](Self::on_event) routes each
/// event to the matching method, and may be overridden to receive events
/// unrouted.
pub trait SessionListener {
    /// Function called for every event.
    fn on_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::StateChanged(state) => self.on_state_changed(*state),
            SessionEvent::Stopped(stop) => self.on_stopped(stop),
            SessionEvent::CurrentLine(location) => self.on_current_line(location.as_ref()),
            SessionEvent::Exited(reason) => self.on_exited(reason),
            SessionEvent::StackChanged(frames) => self.on_stack_changed(frames),
            SessionEvent::FrameChanged { index, frame } => {
                self.on_frame_changed(*index, frame.as_ref())
            }
            SessionEvent::ThreadsChanged(threads) => self.on_threads_changed(threads),
            SessionEvent::CurrentThreadChanged(id) => self.on_current_thread_changed(*id),
            SessionEvent::BreakpointsChanged(breakpoints) => {
                self.on_breakpoints_changed(breakpoints)
            }
            SessionEvent::LocalsReset => self.on_locals_reset(),
            SessionEvent::LocalChanged(local) => self.on_local_changed(local),
            SessionEvent::WatchChanged(watch) => self.on_watch_changed(watch),
            SessionEvent::ConsoleOutput(text) => self.on_console_output(text),
            SessionEvent::TargetOutput(text) => self.on_target_output(text),
            SessionEvent::LogOutput(text) => self.on_log_output(text),
            SessionEvent::SignalReceived(signal) => self.on_signal_received(signal),
            SessionEvent::Message(message) => self.on_message(message),
        }
    }

    /// Function called when the target state changed.
    fn on_state_changed(&mut self, _state: TargetState) {}

    /// Function called when the program stopped.
    fn on_stopped(&mut self, _stop: &StopEvent) {}

    /// Function called when the current source line changed.
    ///
    /// `location` is `None` when the program stopped outside of any known
    /// source, or is not stopped anymore.
    fn on_current_line(&mut self, _location: Option<&SourceLocation>) {}

    /// Function called when the program terminated.
    fn on_exited(&mut self, _reason: &ExitReason) {}

    /// Function called when the call stack changed.
    fn on_stack_changed(&mut self, _frames: &[StackFrameEntry]) {}

    /// Function called when a frame was selected.
    fn on_frame_changed(&mut self, _index: usize, _frame: Option<&StackFrameEntry>) {}

    /// Function called when the thread list changed.
    fn on_threads_changed(&mut self, _threads: &[ThreadInfo]) {}

    /// Function called when another thread was selected.
    fn on_current_thread_changed(&mut self, _id: ThreadId) {}

    /// Function called when the breakpoint set changed.
    fn on_breakpoints_changed(&mut self, _breakpoints: &[BreakPoint]) {}

    /// Function called before local variables are repopulated.
    fn on_locals_reset(&mut self) {}

    /// Function called for each reported local variable.
    fn on_local_changed(&mut self, _local: &LocalVariable) {}

    /// Function called when a watch was created or changed value.
    fn on_watch_changed(&mut self, _watch: &WatchedVariable) {}

    /// Function called on backend console output.
    fn on_console_output(&mut self, _text: &str) {}

    /// Function called on program output.
    fn on_target_output(&mut self, _text: &str) {}

    /// Function called on backend log output.
    fn on_log_output(&mut self, _text: &str) {}

    /// Function called when the program received a signal.
    fn on_signal_received(&mut self, _signal: &str) {}

    /// Function called with a message for the user.
    fn on_message(&mut self, _message: &str) {}
}

/// Listener forwarding every event to a channel.
///
/// Useful to consume events from another task than the one driving the
/// session.
#[derive(Debug, Clone)]
pub struct EventChannel {
    sender: mpsc::UnboundedSender<SessionEvent>,
}

impl EventChannel {
    /// Creates a channel listener, and the receiving half of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl SessionListener for EventChannel {
    fn on_event(&mut self, event: &SessionEvent) {
        if self.sender.send(event.clone()).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }
}

/// Trait for opening source files at a line.
pub trait SourceOpener {
    /// Shows the given line of a source file.
    fn open_file_at_line(&mut self, path: &Path, line: u32);

    /// Hides the current line marker.
    fn clear_current_line(&mut self) {}
}

/// Listener showing the source line the program is at.
pub struct SourceFollower<O> {
    opener: O,
}

impl<O: SourceOpener> SourceFollower<O> {
    /// Creates a listener driving the given opener.
    pub const fn new(opener: O) -> Self {
        Self { opener }
    }

    /// Returns the underlying opener.
    pub fn into_inner(self) -> O {
        self.opener
    }
}

impl<O: SourceOpener> SessionListener for SourceFollower<O> {
    fn on_current_line(&mut self, location: Option<&SourceLocation>) {
        match location {
            Some(location) => self.opener.open_file_at_line(&location.path, location.line),
            None => self.opener.clear_current_line(),
        }
    }

    fn on_frame_changed(&mut self, _index: usize, frame: Option<&StackFrameEntry>) {
        if let Some(location) = frame.and_then(StackFrameEntry::location) {
            self.opener.open_file_at_line(&location.path, location.line);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{EventChannel, SessionListener, SourceFollower, SourceOpener};
    use crate::event::SessionEvent;
    use crate::model::{SourceLocation, StackFrameEntry, TargetState};

    #[derive(Default)]
    struct Opened(Vec<Option<(PathBuf, u32)>>);

    impl SourceOpener for Opened {
        fn open_file_at_line(&mut self, path: &Path, line: u32) {
            self.0.push(Some((path.to_owned(), line)));
        }

        fn clear_current_line(&mut self) {
            self.0.push(None);
        }
    }

    #[test]
    fn follower_opens_current_line() {
        let mut follower = SourceFollower::new(Opened::default());

        follower.on_event(&SessionEvent::CurrentLine(Some(SourceLocation {
            path: "/src/main.c".into(),
            line: 42,
        })));
        follower.on_event(&SessionEvent::StateChanged(TargetState::Running));
        follower.on_event(&SessionEvent::FrameChanged {
            index: 1,
            frame: Some(StackFrameEntry {
                level: 1,
                function: "helper".into(),
                file: Some("util.c".into()),
                full_path: None,
                line: Some(7),
                address: None,
            }),
        });
        follower.on_event(&SessionEvent::CurrentLine(None));

        assert_eq!(
            follower.into_inner().0,
            [
                Some((PathBuf::from("/src/main.c"), 42)),
                Some((PathBuf::from("util.c"), 7)),
                None
            ]
        );
    }

    #[test]
    fn channel_forwards_events() {
        let (mut channel, mut receiver) = EventChannel::new();

        channel.on_event(&SessionEvent::Message("hello".into()));

        assert_eq!(
            receiver.try_recv().ok(),
            Some(SessionEvent::Message("hello".into()))
        );
    }
}
