use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use mimic_mi::{MiCommand, ResultRecord, Token};
use tokio::sync::oneshot;

use crate::model::WatchId;

/// What to do with the result of a command, on top of applying its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Continuation {
    /// Nothing beyond the payload.
    None,

    /// A run-control command: an error means the target never left the
    /// stopped state.
    RunControl,

    /// Frame selection, effective once acknowledged.
    SelectFrame(usize),

    /// Creation of the variable object bound to a watch.
    WatchCreate {
        /// Watch identifier.
        id: WatchId,

        /// Watched expression.
        expression: String,
    },

    /// The command changed the breakpoint set without reporting it.
    RefreshBreakpoints,
}

/// Outcome of a command, for callers waiting on it.
#[derive(Debug)]
pub(crate) enum Reply {
    /// The backend answered.
    Done(ResultRecord),

    /// The session ended before the backend answered.
    Cancelled,
}

/// A command waiting for its result record.
#[derive(Debug)]
pub(crate) struct PendingCommand {
    pub command: MiCommand,
    pub issued_at: Instant,
    pub continuation: Continuation,
    reply: Option<oneshot::Sender<Reply>>,
}

impl PendingCommand {
    /// Time elapsed since the command was queued.
    pub fn elapsed(&self) -> Duration {
        self.issued_at.elapsed()
    }

    /// Hands the outcome over to the waiting caller, if any.
    pub fn complete(self, reply: Reply) {
        if let Some(sender) = self.reply {
            // the caller may have given up waiting
            let _ = sender.send(reply);
        }
    }
}

/// Correlates commands with their result records.
///
/// Every command gets a fresh token, strictly increasing from 1. Commands
/// are written in submission order, but results are matched by token and
/// may arrive in any order.
#[derive(Debug)]
pub(crate) struct CommandQueue {
    next_token: Token,
    pending: HashMap<Token, PendingCommand>,
    outbox: VecDeque<String>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self {
            next_token: 1,
            pending: HashMap::new(),
            outbox: VecDeque::new(),
        }
    }

    /// Queues a command for writing.
    pub fn submit(&mut self, command: MiCommand, continuation: Continuation) -> Token {
        self.enqueue(command, continuation, None)
    }

    /// Queues a command for writing, with a receiver for its outcome.
    pub fn submit_with_reply(
        &mut self,
        command: MiCommand,
        continuation: Continuation,
    ) -> (Token, oneshot::Receiver<Reply>) {
        let (sender, receiver) = oneshot::channel();
        let token = self.enqueue(command, continuation, Some(sender));

        (token, receiver)
    }

    fn enqueue(
        &mut self,
        command: MiCommand,
        continuation: Continuation,
        reply: Option<oneshot::Sender<Reply>>,
    ) -> Token {
        let token = self.next_token;
        self.next_token += 1;

        self.outbox.push_back(command.to_line(token));
        self.pending.insert(
            token,
            PendingCommand {
                command,
                issued_at: Instant::now(),
                continuation,
                reply,
            },
        );

        token
    }

    /// Next line to write to the backend.
    pub fn pop_outgoing(&mut self) -> Option<String> {
        self.outbox.pop_front()
    }

    /// Removes the pending command with the given token.
    pub fn resolve(&mut self, token: Token) -> Option<PendingCommand> {
        self.pending.remove(&token)
    }

    /// Drops every pending and unwritten command, notifying waiting callers.
    ///
    /// Returns the number of pending commands.
    pub fn cancel_all(&mut self) -> usize {
        self.outbox.clear();

        let count = self.pending.len();

        for (token, pending) in self.pending.drain() {
            tracing::debug!(
                token,
                command = %pending.command,
                elapsed = ?pending.elapsed(),
                "command cancelled"
            );
            pending.complete(Reply::Cancelled);
        }

        count
    }

    /// Number of commands waiting for their result.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
