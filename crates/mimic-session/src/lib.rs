//! This crate drives a debugger backend speaking the machine interface
//! protocol (e.g., `gdb --interpreter=mi2`).
//!
//! A [Session] owns the backend process. It turns user requests into
//! protocol commands, correlates the results with the commands by token,
//! and keeps a consistent view of the debugged program (execution state,
//! call stack, threads, breakpoints, watches and local variables). Every
//! change of this view is dispatched to the subscribed
//! [listeners](SessionListener).
//!
//! ```no_run
//! use mimic_session::{EventChannel, LaunchSpec, Session};
//!
//! # async fn example() -> mimic_session::Result<()> {
//! let spec = LaunchSpec::new("./a.out").arg("--verbose");
//!
//! let mut session = Session::launch(&spec).await?;
//!
//! let (channel, _events) = EventChannel::new();
//! session.subscribe(channel);
//!
//! session.set_breakpoint_at_function("main").await?;
//! session.run().await?;
//!
//! let reason = session.run_until_exited().await?;
//! println!("program {reason}");
//! # Ok(())
//! # }
//! ```
//!
//! # Transports
//!
//! The backend is reached through a [Transport]. [ProcessTransport] spawns
//! it as a child process, but any line-oriented link (e.g., a recorded
//! transcript) can be plugged into [Session::new].

mod dispatch;
mod error;
mod event;
mod format;
mod launch;
mod listener;
mod model;
mod queue;
mod session;
mod state;
mod transport;

pub use self::dispatch::ListenerId;
pub use self::error::{Error, Result};
pub use self::event::SessionEvent;
pub use self::format::{DisplayFormat, DisplayInfo, FormatCache};
pub use self::launch::{Connection, DEFAULT_DEBUGGER, LaunchEnv, LaunchSpec};
pub use self::listener::{EventChannel, SessionListener, SourceFollower, SourceOpener};
pub use self::model::{
    BreakPoint, BreakpointId, ExitReason, LocalVariable, SourceLocation, StackFrameEntry,
    StopEvent, StopReason, TargetState, ThreadId, ThreadInfo, WatchId, WatchedVariable,
};
pub use self::session::Session;
pub use self::transport::{OutputLine, OutputOrigin, ProcessTransport, Transport, TransportEvent};
