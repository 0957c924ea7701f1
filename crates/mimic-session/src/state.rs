use std::collections::BTreeMap;

use indexmap::IndexMap;
use mimic_mi::{AsyncRecord, Fields, List, MiCommand, ResultClass, ResultRecord, Value};

use crate::event::SessionEvent;
use crate::format::{DisplayFormat, FormatCache};
use crate::model::{
    BreakPoint, BreakpointId, ExitReason, LocalVariable, StackFrameEntry, StopEvent, StopReason,
    TargetState, ThreadId, ThreadInfo, WatchId, WatchedVariable, watch_id_of, watch_object_name,
};
use crate::queue::Continuation;

/// Outcome of a state transition: events to dispatch, and commands to issue.
#[derive(Debug, Default)]
pub(crate) struct Effects {
    pub events: Vec<SessionEvent>,
    pub commands: Vec<(MiCommand, Continuation)>,
}

impl Effects {
    pub fn event(&mut self, event: SessionEvent) {
        self.events.push(event);
    }

    /// Schedules a refresh command, once per transition.
    fn refresh(&mut self, command: MiCommand) {
        if !self.commands.iter().any(|(c, _)| *c == command) {
            self.commands.push((command, Continuation::None));
        }
    }
}

fn list_frames() -> MiCommand {
    MiCommand::new("stack-list-frames")
}

fn list_locals() -> MiCommand {
    MiCommand::new("stack-list-locals").arg("1")
}

fn list_threads() -> MiCommand {
    MiCommand::new("thread-info")
}

fn list_breakpoints() -> MiCommand {
    MiCommand::new("break-list")
}

fn update_watches() -> MiCommand {
    MiCommand::new("var-update").option("--all-values").arg("*")
}

/// The session's view of the debugged program.
///
/// Every record of the backend goes through here. Stack frames and local
/// variables are only known while the target is stopped: entering the
/// running state clears them, and late replies carrying them are ignored
/// until the next stop.
#[derive(Debug)]
pub(crate) struct SessionState {
    target: TargetState,
    running_confirmed: bool,
    exit_reason: Option<ExitReason>,
    target_pid: Option<u32>,
    current_thread: Option<ThreadId>,
    current_frame: usize,
    stack: Vec<StackFrameEntry>,
    threads: IndexMap<ThreadId, ThreadInfo>,
    breakpoints: BTreeMap<BreakpointId, BreakPoint>,
    watches: IndexMap<WatchId, WatchedVariable>,
    watch_formats: FormatCache,
    next_watch_id: WatchId,
    locals: IndexMap<String, String>,
    local_formats: FormatCache,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            target: TargetState::Stopped,
            running_confirmed: false,
            exit_reason: None,
            target_pid: None,
            current_thread: None,
            current_frame: 0,
            stack: Vec::new(),
            threads: IndexMap::new(),
            breakpoints: BTreeMap::new(),
            watches: IndexMap::new(),
            watch_formats: FormatCache::default(),
            next_watch_id: 1,
            locals: IndexMap::new(),
            local_formats: FormatCache::default(),
        }
    }

    pub fn target(&self) -> TargetState {
        self.target
    }

    pub fn exit_reason(&self) -> Option<&ExitReason> {
        self.exit_reason.as_ref()
    }

    pub fn target_pid(&self) -> Option<u32> {
        self.target_pid
    }

    pub fn current_thread(&self) -> Option<ThreadId> {
        self.current_thread
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn stack(&self) -> &[StackFrameEntry] {
        &self.stack
    }

    pub fn threads(&self) -> Vec<ThreadInfo> {
        self.threads.values().cloned().collect()
    }

    pub fn has_thread(&self, id: ThreadId) -> bool {
        self.threads.contains_key(&id)
    }

    /// Breakpoints, newest first.
    pub fn breakpoints(&self) -> Vec<BreakPoint> {
        self.breakpoints.values().rev().cloned().collect()
    }

    pub fn watches(&self) -> Vec<WatchedVariable> {
        self.watches.values().cloned().collect()
    }

    pub fn watch(&self, id: WatchId) -> Option<&WatchedVariable> {
        self.watches.get(&id)
    }

    pub fn locals(&self) -> Vec<LocalVariable> {
        self.locals
            .iter()
            .map(|(name, value)| self.local(name, value))
            .collect()
    }

    fn local(&self, name: &str, value: &str) -> LocalVariable {
        LocalVariable {
            name: name.to_owned(),
            value: value.to_owned(),
            format: self
                .local_formats
                .get(name)
                .map(|info| info.format)
                .unwrap_or(DisplayFormat::Native),
        }
    }

    /// A run-control command was submitted.
    pub fn begin_run_control(&mut self, fx: &mut Effects) {
        self.running_confirmed = false;
        self.enter_running(fx);
    }

    fn enter_running(&mut self, fx: &mut Effects) {
        if self.target != TargetState::Stopped {
            return;
        }

        self.target = TargetState::Running;
        self.current_frame = 0;
        self.stack.clear();
        self.locals.clear();

        fx.event(SessionEvent::StateChanged(TargetState::Running));
        fx.event(SessionEvent::CurrentLine(None));
        fx.event(SessionEvent::StackChanged(Vec::new()));
        fx.event(SessionEvent::LocalsReset);
    }

    pub fn enter_exited(&mut self, reason: ExitReason, fx: &mut Effects) {
        if self.target == TargetState::Exited {
            tracing::debug!(%reason, "already exited");
            return;
        }

        tracing::info!(%reason, "target exited");

        self.target = TargetState::Exited;
        self.exit_reason = Some(reason.clone());
        self.target_pid = None;
        self.current_frame = 0;
        self.stack.clear();
        self.locals.clear();
        self.threads.clear();

        fx.event(SessionEvent::StateChanged(TargetState::Exited));
        fx.event(SessionEvent::CurrentLine(None));
        fx.event(SessionEvent::Exited(reason));
    }

    fn enter_stopped(&mut self, fields: &Fields, fx: &mut Effects) {
        if self.target == TargetState::Exited {
            tracing::debug!("stop after exit ignored");
            return;
        }

        if let Some(exit) = fields
            .str("reason")
            .and_then(|reason| ExitReason::from_stop(reason, fields))
        {
            self.enter_exited(exit, fx);
            return;
        }

        let reason = StopReason::from_fields(fields);
        let thread_id = fields.parse::<ThreadId>("thread-id");
        let frame = fields
            .tuple("frame")
            .map(|frame| StackFrameEntry::from_fields(frame, 0));

        tracing::info!(?reason, thread = ?thread_id, "target stopped");

        let was_stopped = self.target == TargetState::Stopped;

        self.target = TargetState::Stopped;
        self.running_confirmed = false;
        self.current_frame = 0;
        self.stack = frame.iter().cloned().collect();
        self.locals.clear();

        if !was_stopped {
            fx.event(SessionEvent::StateChanged(TargetState::Stopped));
        }

        fx.event(SessionEvent::CurrentLine(
            frame.as_ref().and_then(StackFrameEntry::location),
        ));

        if let StopReason::SignalReceived(signal) = &reason {
            fx.event(SessionEvent::SignalReceived(signal.clone()));
        }

        fx.event(SessionEvent::Stopped(StopEvent {
            reason,
            thread_id,
            frame,
        }));
        fx.event(SessionEvent::StackChanged(self.stack.clone()));
        fx.event(SessionEvent::LocalsReset);

        if let Some(id) = thread_id {
            if self.current_thread != Some(id) {
                self.current_thread = Some(id);
                fx.event(SessionEvent::CurrentThreadChanged(id));
            }
        }

        fx.refresh(list_frames());
        fx.refresh(list_locals());
        if !self.watches.is_empty() {
            fx.refresh(update_watches());
        }
        fx.refresh(list_threads());
    }

    pub fn apply_exec(&mut self, record: &AsyncRecord, fx: &mut Effects) {
        match record.class.as_str() {
            "running" => {
                self.running_confirmed = true;
                self.enter_running(fx);
            }
            "stopped" => self.enter_stopped(&record.fields, fx),
            class => tracing::trace!(class, "ignored exec record"),
        }
    }

    pub fn apply_notify(&mut self, record: &AsyncRecord, fx: &mut Effects) {
        let fields = &record.fields;

        match record.class.as_str() {
            "breakpoint-created" | "breakpoint-modified" | "breakpoint-deleted" => {
                if fields.get("BreakpointTable").is_none() {
                    fx.refresh(list_breakpoints());
                }
            }
            "thread-created" | "thread-exited" => fx.refresh(list_threads()),
            "thread-group-started" => {
                self.target_pid = fields.parse("pid");
                tracing::info!(pid = ?self.target_pid, "target started");
            }
            "thread-group-exited" => self.target_pid = None,
            "thread-selected" => {
                if let Some(id) = fields.parse("id") {
                    self.select_thread(id, fx);
                }
            }
            class => tracing::trace!(class, "ignored notification"),
        }

        self.apply_payload(fields, fx);
    }

    pub fn apply_result(
        &mut self,
        continuation: &Continuation,
        record: &ResultRecord,
        fx: &mut Effects,
    ) {
        match record.class {
            ResultClass::Error => {
                let message = record.error_message().unwrap_or_default().to_owned();

                match continuation {
                    Continuation::RunControl => {
                        if self.target == TargetState::Running && !self.running_confirmed {
                            tracing::debug!("run control rejected, back to stopped");

                            self.target = TargetState::Stopped;
                            fx.event(SessionEvent::StateChanged(TargetState::Stopped));

                            if self.current_thread.is_some() {
                                fx.refresh(list_frames());
                                fx.refresh(list_locals());
                            }
                        }
                        fx.event(SessionEvent::Message(message));
                    }
                    // reported to the caller
                    Continuation::WatchCreate { .. } => (),
                    _ => fx.event(SessionEvent::Message(message)),
                }
            }
            ResultClass::Running => {
                self.running_confirmed = true;
                self.enter_running(fx);
            }
            ResultClass::Exit => tracing::debug!("backend exiting"),
            ResultClass::Done | ResultClass::Connected => {
                self.apply_payload(&record.fields, fx);

                if record.fields.get("bkpt").is_some() {
                    fx.refresh(list_breakpoints());
                }

                match continuation {
                    Continuation::SelectFrame(index) => self.select_frame(*index, fx),
                    Continuation::WatchCreate { id, expression } => {
                        self.insert_watch(*id, expression, &record.fields, fx)
                    }
                    Continuation::RefreshBreakpoints => fx.refresh(list_breakpoints()),
                    Continuation::None | Continuation::RunControl => (),
                }
            }
        }
    }

    /// Applies the well-known tables a record may carry.
    fn apply_payload(&mut self, fields: &Fields, fx: &mut Effects) {
        if let Some(table) = fields.tuple("BreakpointTable") {
            self.replace_breakpoints(table, fx);
        }

        if let Some(threads) = fields.list("threads") {
            self.replace_threads(threads, fields.parse("current-thread-id"), fx);
        }

        if let Some(stack) = fields.list("stack") {
            self.replace_stack(stack, fx);
        }

        if let Some(locals) = fields.list("locals") {
            self.replace_locals(locals, fx);
        }

        if let Some(changes) = fields.list("changelist") {
            self.apply_watch_changes(changes, fx);
        }

        if let Some(id) = fields.parse("new-thread-id") {
            self.select_thread(id, fx);
        }
    }

    fn replace_breakpoints(&mut self, table: &Fields, fx: &mut Effects) {
        self.breakpoints = table
            .list("body")
            .into_iter()
            .flat_map(List::iter)
            .filter_map(Value::as_tuple)
            .filter_map(BreakPoint::from_fields)
            .map(|bkpt| (bkpt.id, bkpt))
            .collect();

        tracing::debug!(count = self.breakpoints.len(), "breakpoints replaced");

        fx.event(SessionEvent::BreakpointsChanged(self.breakpoints()));
    }

    fn replace_threads(&mut self, threads: &List, current: Option<ThreadId>, fx: &mut Effects) {
        self.threads = threads
            .iter()
            .filter_map(Value::as_tuple)
            .filter_map(ThreadInfo::from_fields)
            .map(|thread| (thread.id, thread))
            .collect();

        fx.event(SessionEvent::ThreadsChanged(self.threads()));

        if let Some(id) = current {
            if self.current_thread != Some(id) {
                self.current_thread = Some(id);
                fx.event(SessionEvent::CurrentThreadChanged(id));
            }
        }
    }

    fn replace_stack(&mut self, stack: &List, fx: &mut Effects) {
        if self.target != TargetState::Stopped {
            tracing::debug!(state = %self.target, "stale stack ignored");
            return;
        }

        self.stack = stack
            .iter()
            .filter_map(Value::as_tuple)
            .enumerate()
            .map(|(i, frame)| StackFrameEntry::from_fields(frame, i))
            .collect();
        self.stack.sort_by_key(|frame| frame.level);

        if self.current_frame >= self.stack.len() {
            self.current_frame = 0;
        }

        fx.event(SessionEvent::StackChanged(self.stack.clone()));
    }

    fn replace_locals(&mut self, locals: &List, fx: &mut Effects) {
        if self.target != TargetState::Stopped {
            tracing::debug!(state = %self.target, "stale locals ignored");
            return;
        }

        self.locals.clear();
        fx.event(SessionEvent::LocalsReset);

        for local in locals.iter() {
            let (name, value) = match local {
                Value::Tuple(var) => (var.str("name"), var.str("value")),
                Value::Const(name) => (Some(name.as_str()), None),
                Value::List(_) => continue,
            };

            let Some(name) = name else {
                continue;
            };
            let value = value.unwrap_or_default();

            let format = self.local_formats.observe(name, value);
            self.locals.insert(name.to_owned(), value.to_owned());

            fx.event(SessionEvent::LocalChanged(LocalVariable {
                name: name.to_owned(),
                value: value.to_owned(),
                format,
            }));
        }
    }

    fn apply_watch_changes(&mut self, changes: &List, fx: &mut Effects) {
        for change in changes.iter().filter_map(Value::as_tuple) {
            let Some(name) = change.str("name") else {
                continue;
            };

            let Some(watch) = watch_id_of(name).and_then(|id| self.watches.get_mut(&id)) else {
                tracing::trace!(name, "ignored variable object change");
                continue;
            };

            if let Some(value) = change.str("value") {
                watch.value = value.to_owned();
                watch.format = self.watch_formats.observe(name, value);
            }

            fx.event(SessionEvent::WatchChanged(watch.clone()));
        }
    }

    fn select_thread(&mut self, id: ThreadId, fx: &mut Effects) {
        if self.current_thread == Some(id) {
            return;
        }

        self.current_thread = Some(id);
        self.current_frame = 0;
        fx.event(SessionEvent::CurrentThreadChanged(id));

        if self.target == TargetState::Stopped {
            fx.refresh(list_frames());
            fx.refresh(list_locals());
        }
    }

    /// The backend acknowledged a frame selection.
    fn select_frame(&mut self, index: usize, fx: &mut Effects) {
        self.current_frame = index;
        self.reassert_frame(fx);

        if self.target == TargetState::Stopped {
            fx.refresh(list_locals());
        }
    }

    /// Dispatches the selected frame again, without changing anything.
    pub fn reassert_frame(&self, fx: &mut Effects) {
        fx.event(SessionEvent::FrameChanged {
            index: self.current_frame,
            frame: self.stack.get(self.current_frame).cloned(),
        });
    }

    pub fn allocate_watch_id(&mut self) -> WatchId {
        let id = self.next_watch_id;
        self.next_watch_id += 1;
        id
    }

    fn insert_watch(&mut self, id: WatchId, expression: &str, fields: &Fields, fx: &mut Effects) {
        let value = fields.str("value").unwrap_or_default().to_owned();
        let format = self.watch_formats.observe(&watch_object_name(id), &value);

        let watch = WatchedVariable {
            id,
            expression: expression.to_owned(),
            value,
            var_type: fields.str("type").unwrap_or_default().to_owned(),
            format,
        };

        tracing::debug!(id, expression, "watch created");

        self.watches.insert(id, watch.clone());
        fx.event(SessionEvent::WatchChanged(watch));
    }

    /// Forgets a watch and its display settings.
    pub fn remove_watch(&mut self, id: WatchId) -> Option<WatchedVariable> {
        let watch = self.watches.shift_remove(&id)?;
        self.watch_formats.remove(&watch_object_name(id));

        Some(watch)
    }

    pub fn cycle_watch_format(&mut self, id: WatchId, fx: &mut Effects) -> Option<String> {
        let name = watch_object_name(id);
        let watch = self.watches.get_mut(&id)?;
        let rendered = self.watch_formats.cycle(&name)?;

        if let Some(info) = self.watch_formats.get(&name) {
            watch.format = info.format;
        }

        fx.event(SessionEvent::WatchChanged(watch.clone()));

        Some(rendered)
    }

    pub fn cycle_local_format(&mut self, name: &str, fx: &mut Effects) -> Option<String> {
        let rendered = self.local_formats.cycle(name)?;

        if let Some(value) = self.locals.get(name) {
            fx.event(SessionEvent::LocalChanged(self.local(name, value)));
        }

        Some(rendered)
    }
}
