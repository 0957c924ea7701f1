use std::path::PathBuf;

use crate::model::{TargetState, ThreadId, WatchId};

/// Error type of this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The debugger backend could not be spawned.
    #[error("failed to launch {}: {source}", program.display())]
    Launch {
        /// Debugger executable.
        program: PathBuf,

        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error on the backend's streams.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The operation is not allowed in the current target state.
    #[error("cannot {operation} while the target is {state}")]
    InvalidState {
        /// Rejected operation.
        operation: &'static str,

        /// Target state at the time of the request.
        state: TargetState,
    },

    /// The backend could not evaluate a watch expression.
    #[error("cannot evaluate `{expression}`: {message}")]
    Evaluation {
        /// Expression to evaluate.
        expression: String,

        /// Backend error message.
        message: String,
    },

    /// The debugging session has ended.
    #[error("debugging session has ended")]
    SessionEnded,

    /// No watch with this identifier.
    #[error("unknown watch #{0}")]
    UnknownWatch(WatchId),

    /// No thread with this identifier.
    #[error("unknown thread #{0}")]
    UnknownThread(ThreadId),

    /// No frame at this index of the current stack.
    #[error("no frame #{0} in the current stack")]
    InvalidFrame(usize),

    /// Signal delivery error.
    #[cfg(unix)]
    #[error("os error: {0}")]
    Os(#[from] nix::Error),

    /// The operation is not supported by the transport.
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

/// Result type of this crate.
pub type Result<T> = core::result::Result<T, Error>;
