use mimic_mi::{MiCommand, Record, ResultRecord, Token};
use tokio::sync::oneshot;

use crate::dispatch::{Dispatcher, ListenerId};
use crate::event::SessionEvent;
use crate::launch::{Connection, LaunchSpec};
use crate::listener::SessionListener;
use crate::model::{
    BreakPoint, BreakpointId, ExitReason, LocalVariable, StackFrameEntry, TargetState, ThreadId,
    ThreadInfo, WatchId, WatchedVariable, watch_object_name,
};
use crate::queue::{CommandQueue, Continuation, Reply};
use crate::state::{Effects, SessionState};
use crate::transport::{OutputLine, OutputOrigin, ProcessTransport, Transport, TransportEvent};
use crate::{Error, Result};

/// A debugging session.
///
/// The session owns the debugger backend. Requests are written right away,
/// and the session state is updated as the backend answers: the caller
/// drives the session by calling [process_event](Self::process_event) in a
/// loop (or [run_until_exited](Self::run_until_exited)), and observes it
/// through [listeners](SessionListener) or the snapshot accessors.
pub struct Session<T = ProcessTransport> {
    transport: T,
    queue: CommandQueue,
    state: SessionState,
    dispatcher: Dispatcher,
    connection: Connection,
}

impl Session<ProcessTransport> {
    /// Spawns the debugger backend and loads the program to debug.
    ///
    /// The program does not run until [run](Self::run) is called.
    #[tracing::instrument(name = "SessionLaunch", skip_all, fields(program = %spec.program.display()))]
    pub async fn launch(spec: &LaunchSpec) -> Result<Self> {
        let transport = ProcessTransport::spawn(spec)?;

        let mut session = Self::new(transport);
        tracing::info!(pid = ?session.transport.process_id(), "debugger spawned");

        session.initialize(spec).await?;

        Ok(session)
    }
}

impl<T: Transport> Session<T> {
    /// Creates a session over an already established transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            queue: CommandQueue::new(),
            state: SessionState::new(),
            dispatcher: Dispatcher::default(),
            connection: Connection::Local,
        }
    }

    /// Issues the setup commands of `spec`.
    pub async fn initialize(&mut self, spec: &LaunchSpec) -> Result<()> {
        self.connection = spec.connection.clone();

        for command in spec.setup_commands() {
            self.queue.submit(command, Continuation::None);
        }

        self.flush().await
    }

    /// Subscribes a listener to the session events.
    pub fn subscribe(&mut self, listener: impl SessionListener + Send + 'static) -> ListenerId {
        self.dispatcher.subscribe(Box::new(listener))
    }

    /// Unsubscribes a listener. Returns whether it was subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execution state of the program.
    pub fn state(&self) -> TargetState {
        self.state.target()
    }

    /// Why the program terminated, once it did.
    pub fn exit_reason(&self) -> Option<&ExitReason> {
        self.state.exit_reason()
    }

    /// Process identifier of the program, once started.
    pub fn target_pid(&self) -> Option<u32> {
        self.state.target_pid()
    }

    /// Selected thread.
    pub fn current_thread(&self) -> Option<ThreadId> {
        self.state.current_thread()
    }

    /// Index of the selected frame.
    pub fn current_frame(&self) -> usize {
        self.state.current_frame()
    }

    /// Call stack of the selected thread. Empty unless the program is stopped.
    pub fn stack_frames(&self) -> &[StackFrameEntry] {
        self.state.stack()
    }

    /// Threads of the program.
    pub fn threads(&self) -> Vec<ThreadInfo> {
        self.state.threads()
    }

    /// Breakpoints, newest first.
    pub fn breakpoints(&self) -> Vec<BreakPoint> {
        self.state.breakpoints()
    }

    /// Watches, in creation order.
    pub fn watches(&self) -> Vec<WatchedVariable> {
        self.state.watches()
    }

    /// Local variables of the selected frame. Empty unless the program is
    /// stopped.
    pub fn locals(&self) -> Vec<LocalVariable> {
        self.state.locals()
    }

    /// Number of commands waiting for their result.
    pub fn pending_commands(&self) -> usize {
        self.queue.pending_len()
    }

    /// Starts the program from the beginning.
    ///
    /// A remote program is already started by its debug server, so it is
    /// resumed instead.
    pub async fn run(&mut self) -> Result<Token> {
        let command = match self.connection {
            Connection::Local => MiCommand::new("exec-run"),
            Connection::Remote { .. } => MiCommand::new("exec-continue"),
        };

        self.run_control("run", command).await
    }

    /// Resumes the program.
    pub async fn continue_(&mut self) -> Result<Token> {
        self.run_control("continue", MiCommand::new("exec-continue")).await
    }

    /// Steps over the current source line.
    pub async fn next(&mut self) -> Result<Token> {
        self.run_control("step over", MiCommand::new("exec-next")).await
    }

    /// Steps into the current source line.
    pub async fn step_in(&mut self) -> Result<Token> {
        self.run_control("step in", MiCommand::new("exec-step")).await
    }

    /// Steps out of the selected frame.
    pub async fn step_out(&mut self) -> Result<Token> {
        self.run_control("step out", MiCommand::new("exec-finish")).await
    }

    async fn run_control(&mut self, operation: &'static str, command: MiCommand) -> Result<Token> {
        self.ensure_stopped(operation)?;

        tracing::info!(command = %command, "run control");

        let mut fx = Effects::default();
        self.state.begin_run_control(&mut fx);

        let token = self.queue.submit(command, Continuation::RunControl);
        self.commit(fx).await?;

        Ok(token)
    }

    /// Stops the debugging.
    ///
    /// A running program is interrupted. A stopped program is terminated
    /// along with the backend, which ends the session.
    ///
    /// A local program is interrupted with a signal (or the backend, when
    /// the program pid is unknown). A remote program is interrupted by the
    /// backend, since its pid is meaningless on this machine.
    pub async fn stop(&mut self) -> Result<()> {
        match self.state.target() {
            TargetState::Running => match self.connection {
                Connection::Local => {
                    let pid = self
                        .state
                        .target_pid()
                        .or_else(|| self.transport.process_id());
                    tracing::info!(?pid, "interrupting target");

                    self.transport.interrupt(pid)
                }
                Connection::Remote { .. } => {
                    tracing::info!("interrupting remote target");

                    self.queue.submit(MiCommand::new("exec-interrupt"), Continuation::None);
                    self.flush().await
                }
            },
            TargetState::Stopped => {
                tracing::info!("exiting debugger");

                self.queue.submit(MiCommand::new("gdb-exit"), Continuation::None);
                self.flush().await
            }
            TargetState::Exited => self.transport.terminate(),
        }
    }

    /// Forcibly kills the backend (and so the program).
    pub fn kill(&mut self) -> Result<()> {
        tracing::info!("killing debugger");
        self.transport.kill()
    }

    /// Sets a breakpoint at the entry of a function.
    pub async fn set_breakpoint_at_function(&mut self, function: &str) -> Result<Token> {
        self.ensure_alive()?;

        let command = MiCommand::new("break-insert").option("-f").arg(function);
        let token = self.queue.submit(command, Continuation::None);

        self.flush().await?;
        Ok(token)
    }

    /// Deletes a breakpoint.
    pub async fn remove_breakpoint(&mut self, id: BreakpointId) -> Result<Token> {
        self.ensure_alive()?;

        let command = MiCommand::new("break-delete").arg(id.to_string());
        let token = self.queue.submit(command, Continuation::RefreshBreakpoints);

        self.flush().await?;
        Ok(token)
    }

    /// Requests the call stack of the selected thread.
    pub async fn request_stack_frames(&mut self) -> Result<Token> {
        self.ensure_stopped("list stack frames")?;
        self.request(MiCommand::new("stack-list-frames")).await
    }

    /// Requests the thread list.
    pub async fn request_threads(&mut self) -> Result<Token> {
        self.ensure_alive()?;
        self.request(MiCommand::new("thread-info")).await
    }

    /// Requests the breakpoint list.
    pub async fn request_breakpoints(&mut self) -> Result<Token> {
        self.ensure_alive()?;
        self.request(MiCommand::new("break-list")).await
    }

    async fn request(&mut self, command: MiCommand) -> Result<Token> {
        let token = self.queue.submit(command, Continuation::None);
        self.flush().await?;

        Ok(token)
    }

    /// Selects a thread.
    pub async fn select_thread(&mut self, id: ThreadId) -> Result<()> {
        self.ensure_stopped("select thread")?;

        if !self.state.threads().is_empty() && !self.state.has_thread(id) {
            return Err(Error::UnknownThread(id));
        }

        let command = MiCommand::new("thread-select").arg(id.to_string());
        self.queue.submit(command, Continuation::None);

        self.flush().await
    }

    /// Selects a frame of the call stack.
    ///
    /// Selecting the frame which is already selected dispatches it again,
    /// without involving the backend.
    pub async fn select_frame(&mut self, index: usize) -> Result<()> {
        self.ensure_stopped("select frame")?;

        let depth = self.state.stack().len();

        if depth > 0 && index >= depth {
            return Err(Error::InvalidFrame(index));
        }

        if index == self.state.current_frame() && depth > 0 {
            let mut fx = Effects::default();
            self.state.reassert_frame(&mut fx);

            return self.commit(fx).await;
        }

        let command = MiCommand::new("stack-select-frame").arg(index.to_string());
        self.queue.submit(command, Continuation::SelectFrame(index));

        self.flush().await
    }

    /// Watches an expression.
    ///
    /// Returns the watch identifier, and the value and type of the
    /// expression. The program must be stopped, and this call processes
    /// backend events until the expression is evaluated.
    pub async fn add_variable_watch(
        &mut self,
        expression: &str,
    ) -> Result<(WatchId, String, String)> {
        self.ensure_stopped("add a watch")?;

        let id = self.state.allocate_watch_id();

        let command = MiCommand::new("var-create").args([
            watch_object_name(id),
            "*".to_owned(),
            expression.to_owned(),
        ]);
        let (_, reply) = self.queue.submit_with_reply(
            command,
            Continuation::WatchCreate {
                id,
                expression: expression.to_owned(),
            },
        );

        self.flush().await?;

        let record = self.wait_reply(reply).await?;

        if let Some(message) = record.error_message() {
            return Err(Error::Evaluation {
                expression: expression.to_owned(),
                message: message.to_owned(),
            });
        }

        let watch = self.state.watch(id).ok_or(Error::UnknownWatch(id))?;

        Ok((id, watch.value.clone(), watch.var_type.clone()))
    }

    /// Stops watching an expression.
    pub async fn remove_variable_watch(&mut self, id: WatchId) -> Result<()> {
        self.ensure_alive()?;

        let watch = self.state.remove_watch(id).ok_or(Error::UnknownWatch(id))?;

        tracing::debug!(id, expression = %watch.expression, "watch removed");

        let command = MiCommand::new("var-delete").arg(watch_object_name(id));
        self.queue.submit(command, Continuation::None);

        self.flush().await
    }

    /// Replaces the expression of a watch.
    ///
    /// The watch gets a new identifier.
    pub async fn rename_variable_watch(
        &mut self,
        id: WatchId,
        expression: &str,
    ) -> Result<(WatchId, String, String)> {
        self.ensure_stopped("rename a watch")?;

        self.remove_variable_watch(id).await?;
        self.add_variable_watch(expression).await
    }

    /// Switches a watch to its next display format, and returns its new
    /// rendering.
    pub fn cycle_watch_format(&mut self, id: WatchId) -> Result<String> {
        self.ensure_alive()?;

        let mut fx = Effects::default();
        let rendered = self
            .state
            .cycle_watch_format(id, &mut fx)
            .ok_or(Error::UnknownWatch(id))?;

        self.dispatch(fx);
        Ok(rendered)
    }

    /// Switches a local variable to its next display format, and returns
    /// its new rendering.
    ///
    /// Returns `None` if no local variable has this name.
    pub fn cycle_local_format(&mut self, name: &str) -> Result<Option<String>> {
        self.ensure_alive()?;

        let mut fx = Effects::default();
        let rendered = self.state.cycle_local_format(name, &mut fx);

        self.dispatch(fx);
        Ok(rendered)
    }

    /// Waits for the next backend event, and applies it.
    ///
    /// Returns `false` once the transport has no more events.
    pub async fn process_event(&mut self) -> Result<bool> {
        let Some(event) = self.next_event().await else {
            return Ok(false);
        };

        self.apply_event(event).await?;
        Ok(true)
    }

    /// Waits for the next backend event, without applying it.
    ///
    /// This is cancel-safe, so it can be raced against other sources (e.g.,
    /// user input) before handing the event to
    /// [apply_event](Self::apply_event).
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.transport.next_event().await
    }

    /// Applies a backend event to the session.
    pub async fn apply_event(&mut self, event: TransportEvent) -> Result<()> {
        let mut fx = Effects::default();

        match event {
            TransportEvent::Line(OutputLine {
                origin: OutputOrigin::Stderr,
                text,
            }) => fx.event(SessionEvent::LogOutput(text)),
            TransportEvent::Line(OutputLine {
                origin: OutputOrigin::Stdout,
                text,
            }) => {
                if let Some(record) = mimic_mi::parse_line(&text) {
                    self.apply_record(record, &mut fx);
                }
            }
            TransportEvent::Exited(reason) => self.state.enter_exited(reason, &mut fx),
        }

        if let Err(e) = self.commit(fx).await {
            tracing::warn!(error = %e, "failed to write to the debugger");
        }

        Ok(())
    }

    /// Processes backend events until the program terminates.
    #[tracing::instrument(name = "SessionLoop", skip_all)]
    pub async fn run_until_exited(&mut self) -> Result<ExitReason> {
        while self.state.target() != TargetState::Exited {
            if !self.process_event().await? {
                break;
            }
        }

        self.state.exit_reason().cloned().ok_or(Error::SessionEnded)
    }

    fn apply_record(&mut self, record: Record, fx: &mut Effects) {
        match record {
            Record::Result(result) => self.apply_result(result, fx),
            Record::Exec(record) => self.state.apply_exec(&record, fx),
            Record::Notify(record) => self.state.apply_notify(&record, fx),
            Record::Status(record) => tracing::trace!(class = %record.class, "status"),
            Record::Console(text) => fx.event(SessionEvent::ConsoleOutput(text)),
            Record::Target(text) => fx.event(SessionEvent::TargetOutput(text)),
            Record::Log(text) => fx.event(SessionEvent::LogOutput(text)),
        }
    }

    fn apply_result(&mut self, result: ResultRecord, fx: &mut Effects) {
        let pending = result.token.and_then(|token| self.queue.resolve(token));

        match &pending {
            Some(pending) => tracing::debug!(
                token = result.token,
                class = %result.class,
                command = %pending.command,
                elapsed = ?pending.elapsed(),
                "result"
            ),
            None => tracing::debug!(token = result.token, class = %result.class, "unsolicited result"),
        }

        let continuation = pending
            .as_ref()
            .map(|pending| pending.continuation.clone())
            .unwrap_or(Continuation::None);

        self.state.apply_result(&continuation, &result, fx);

        if let Some(pending) = pending {
            pending.complete(Reply::Done(result));
        }
    }

    fn dispatch(&mut self, fx: Effects) {
        for event in fx.events.iter() {
            self.dispatcher.dispatch(event);
        }
    }

    /// Dispatches the events of a transition, then writes its commands.
    async fn commit(&mut self, mut fx: Effects) -> Result<()> {
        let commands = std::mem::take(&mut fx.commands);
        self.dispatch(fx);

        if self.state.target() == TargetState::Exited {
            let cancelled = self.queue.cancel_all();

            if cancelled > 0 {
                tracing::debug!(cancelled, "pending commands cancelled");
            }

            return Ok(());
        }

        for (command, continuation) in commands {
            self.queue.submit(command, continuation);
        }

        self.flush().await
    }

    async fn flush(&mut self) -> Result<()> {
        while let Some(line) = self.queue.pop_outgoing() {
            tracing::trace!(%line, "write");
            self.transport.write_line(&line).await?;
        }

        Ok(())
    }

    async fn wait_reply(&mut self, mut reply: oneshot::Receiver<Reply>) -> Result<ResultRecord> {
        loop {
            match reply.try_recv() {
                Ok(Reply::Done(record)) => return Ok(record),
                Ok(Reply::Cancelled) | Err(oneshot::error::TryRecvError::Closed) => {
                    return Err(Error::SessionEnded);
                }
                Err(oneshot::error::TryRecvError::Empty) => {
                    if !self.process_event().await? {
                        return Err(Error::SessionEnded);
                    }
                }
            }
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        match self.state.target() {
            TargetState::Exited => Err(Error::SessionEnded),
            _ => Ok(()),
        }
    }

    fn ensure_stopped(&self, operation: &'static str) -> Result<()> {
        match self.state.target() {
            TargetState::Stopped => Ok(()),
            TargetState::Exited => Err(Error::SessionEnded),
            state => Err(Error::InvalidState { operation, state }),
        }
    }
}
