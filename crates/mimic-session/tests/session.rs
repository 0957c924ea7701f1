// Once clippy takes `clippy.toml` into account (for `tests` targets),
// we can remove these.
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::print_stdout)]
#![allow(clippy::unwrap_used)]
#![allow(missing_docs)]

mod common;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use indoc::indoc;
use mimic_session::{
    DisplayFormat, Error, EventChannel, ExitReason, LaunchSpec, Session, SessionEvent,
    SourceFollower, SourceLocation, SourceOpener, StopReason, TargetState,
};
use test_log::test;

use self::common::{Backend, STOP_AT_MAIN, ScriptedTransport, drain, received, scripted};

fn new_session() -> (Session<ScriptedTransport>, Backend) {
    let (transport, backend) = scripted();
    (Session::new(transport), backend)
}

/// Brings a fresh session to a stop in `main`, with a 3-frame stack.
async fn stopped_session() -> (Session<ScriptedTransport>, Backend) {
    let (mut session, backend) = new_session();

    session.run().await.unwrap();
    backend.emit_all(indoc! {r#"
        1^running
        *running,thread-id="all"
    "#});
    backend.emit(STOP_AT_MAIN);
    drain(&mut session).await;

    let token = backend.token_of("-stack-list-frames");
    backend.emit(&format!(
        r#"{token}^done,stack=[frame={{level="0",addr="0x1149",func="main",file="main.c",fullname="/src/main.c",line="42"}},frame={{level="1",addr="0x2000",func="__libc_start_call_main",file="libc.c",line="58"}},frame={{level="2",addr="0x3000",func="_start"}}]"#
    ));
    drain(&mut session).await;

    assert_eq!(session.stack_frames().len(), 3);

    (session, backend)
}

fn watch_created(value: &'static str) -> impl Fn(u64) -> Vec<String> + Send + 'static {
    move |token| {
        vec![format!(
            r#"{token}^done,name="w1",numchild="0",value="{value}",type="int",thread-id="1",has_more="0""#
        )]
    }
}

#[test(tokio::test)]
async fn setup_commands_are_tokened() {
    let (mut session, backend) = new_session();

    session
        .initialize(&LaunchSpec::new("/tmp/prog").arg("x"))
        .await
        .unwrap();

    assert_eq!(
        backend.written(),
        [
            "1-gdb-set mi-async on",
            "2-gdb-set pagination off",
            "3-gdb-set confirm off",
            "4-file-exec-and-symbols /tmp/prog",
            "5-exec-arguments x",
        ]
    );
    assert_eq!(session.pending_commands(), 5);
}

#[test(tokio::test)]
async fn run_then_stop_at_breakpoint() {
    let (mut session, backend) = new_session();
    let (channel, mut events) = EventChannel::new();
    session.subscribe(channel);

    assert_eq!(session.run().await.unwrap(), 1);
    assert_eq!(backend.written(), ["1-exec-run"]);
    assert_eq!(session.state(), TargetState::Running);

    assert_eq!(
        received(&mut events),
        [
            SessionEvent::StateChanged(TargetState::Running),
            SessionEvent::CurrentLine(None),
            SessionEvent::StackChanged(Vec::new()),
            SessionEvent::LocalsReset,
        ]
    );

    backend.emit_all(indoc! {r#"
        1^running
        *running,thread-id="all"
        (gdb)
    "#});
    backend.emit(STOP_AT_MAIN);
    drain(&mut session).await;

    assert_eq!(session.state(), TargetState::Stopped);
    assert_eq!(session.current_thread(), Some(1));

    let frames = session.stack_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].function, "main");
    assert_eq!(frames[0].file.as_deref(), Some("main.c"));
    assert_eq!(frames[0].line, Some(42));

    let events = received(&mut events);
    assert_eq!(events[0], SessionEvent::StateChanged(TargetState::Stopped));
    assert_eq!(
        events[1],
        SessionEvent::CurrentLine(Some(SourceLocation {
            path: "/src/main.c".into(),
            line: 42
        }))
    );
    assert!(matches!(
        &events[2],
        SessionEvent::Stopped(stop) if stop.reason == StopReason::BreakpointHit(Some(1))
    ));

    assert_eq!(
        backend.commands()[1..],
        ["-stack-list-frames", "-stack-list-locals 1", "-thread-info"]
    );
}

#[test(tokio::test)]
async fn stale_replies_ignored_while_running() {
    let (mut session, backend) = stopped_session().await;

    let token = backend.token_of("-stack-list-locals");
    backend.emit(&format!(r#"{token}^done,locals=[{{name="x",value="5"}}]"#));
    drain(&mut session).await;
    assert_eq!(session.locals().len(), 1);

    session.next().await.unwrap();
    assert_eq!(session.state(), TargetState::Running);
    assert!(session.stack_frames().is_empty());
    assert!(session.locals().is_empty());

    // late replies of commands issued at the previous stop
    backend.emit(&format!(
        r#"{token}^done,stack=[frame={{level="0",func="main"}}]"#,
        token = backend.token_of("-stack-list-frames")
    ));
    backend.emit(&format!(r#"{token}^done,locals=[{{name="x",value="6"}}]"#));
    drain(&mut session).await;

    assert!(session.stack_frames().is_empty());
    assert!(session.locals().is_empty());
}

#[test(tokio::test)]
async fn target_exit_ends_session() {
    let (mut session, backend) = new_session();
    let (channel, mut events) = EventChannel::new();
    session.subscribe(channel);

    session.run().await.unwrap();
    backend.emit_all(indoc! {r#"
        1^running
        *running,thread-id="all"
        @"bye\r\n"
        =thread-group-exited,id="i1",exit-code="0"
        *stopped,reason="exited-normally"
    "#});
    drain(&mut session).await;

    assert_eq!(session.state(), TargetState::Exited);
    assert_eq!(session.exit_reason(), Some(&ExitReason::ExitedNormally));

    let events = received(&mut events);
    assert!(events.contains(&SessionEvent::TargetOutput("bye".into())));
    assert_eq!(
        events.last(),
        Some(&SessionEvent::Exited(ExitReason::ExitedNormally))
    );

    assert!(matches!(session.next().await, Err(Error::SessionEnded)));
    assert!(matches!(
        session.set_breakpoint_at_function("main").await,
        Err(Error::SessionEnded)
    ));
    assert!(matches!(
        session.add_variable_watch("x").await,
        Err(Error::SessionEnded)
    ));
}

#[test(tokio::test)]
async fn backend_exit_cancels_pending_commands() {
    let (mut session, backend) = new_session();

    session.request_threads().await.unwrap();
    assert_eq!(session.pending_commands(), 1);

    backend.exit(ExitReason::Signalled("SIGSEGV".into()));
    drain(&mut session).await;

    assert_eq!(session.state(), TargetState::Exited);
    assert_eq!(
        session.exit_reason(),
        Some(&ExitReason::Signalled("SIGSEGV".into()))
    );
    assert_eq!(session.pending_commands(), 0);

    assert_eq!(
        session.run_until_exited().await.unwrap(),
        ExitReason::Signalled("SIGSEGV".into())
    );
}

#[test(tokio::test)]
async fn kill_ends_session() {
    let (mut session, _backend) = new_session();

    session.kill().unwrap();

    assert_eq!(
        session.run_until_exited().await.unwrap(),
        ExitReason::Signalled("SIGKILL".into())
    );
}

#[test(tokio::test)]
async fn rejected_run_reverts_to_stopped() {
    let (mut session, backend) = new_session();
    let (channel, mut events) = EventChannel::new();
    session.subscribe(channel);

    session.continue_().await.unwrap();
    received(&mut events);

    backend.emit(r#"1^error,msg="The program is not being run.""#);
    drain(&mut session).await;

    assert_eq!(session.state(), TargetState::Stopped);
    assert_eq!(
        received(&mut events),
        [
            SessionEvent::StateChanged(TargetState::Stopped),
            SessionEvent::Message("The program is not being run.".into()),
        ]
    );
}

#[test(tokio::test)]
async fn watch_lifecycle() {
    let (mut session, backend) = stopped_session().await;
    backend.respond("-var-create", watch_created("5"));

    let (id, value, var_type) = session.add_variable_watch("x").await.unwrap();
    assert_eq!((id, value.as_str(), var_type.as_str()), (1, "5", "int"));
    assert!(backend.commands().contains(&"-var-create w1 * x".to_owned()));

    session.next().await.unwrap();
    backend.emit(r#"*stopped,reason="end-stepping-range",frame={func="main",file="main.c",fullname="/src/main.c",line="43"},thread-id="1""#);
    drain(&mut session).await;

    let token = backend.token_of("-var-update");
    backend.emit(&format!(
        r#"{token}^done,changelist=[{{name="w1",value="6",in_scope="true",type_changed="false",has_more="0"}}]"#
    ));
    drain(&mut session).await;

    let watches = session.watches();
    assert_eq!(watches.len(), 1);
    assert_eq!(watches[0].id, 1);
    assert_eq!(watches[0].value, "6");

    session.remove_variable_watch(1).await.unwrap();
    assert!(session.watches().is_empty());
    assert_eq!(backend.commands().last().map(String::as_str), Some("-var-delete w1"));

    assert!(matches!(session.cycle_watch_format(1), Err(Error::UnknownWatch(1))));
    assert!(matches!(
        session.remove_variable_watch(1).await,
        Err(Error::UnknownWatch(1))
    ));
}

#[test(tokio::test)]
async fn watch_format_cycles() {
    let (mut session, backend) = stopped_session().await;
    backend.respond("-var-create", watch_created("10"));

    let (id, _, _) = session.add_variable_watch("count").await.unwrap();

    assert_eq!(session.cycle_watch_format(id).unwrap(), "0x0a");
    assert_eq!(session.watches()[0].format, DisplayFormat::Hex);
    assert_eq!(session.watches()[0].display_value(), "0x0a");
    assert_eq!(session.cycle_watch_format(id).unwrap(), "0b0000_1010");
}

#[test(tokio::test)]
async fn watch_evaluation_error() {
    let (mut session, backend) = stopped_session().await;
    backend.respond("-var-create", |token| {
        vec![format!(r#"{token}^error,msg="No symbol \"nope\" in current context.""#)]
    });

    match session.add_variable_watch("nope").await {
        Err(Error::Evaluation {
            expression,
            message,
        }) => {
            assert_eq!(expression, "nope");
            assert_eq!(message, r#"No symbol "nope" in current context."#);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    assert!(session.watches().is_empty());
}

#[test(tokio::test)]
async fn watch_rejected_while_running() {
    let (mut session, _backend) = new_session();

    session.run().await.unwrap();

    assert!(matches!(
        session.add_variable_watch("x").await,
        Err(Error::InvalidState {
            state: TargetState::Running,
            ..
        })
    ));
}

#[test(tokio::test)]
async fn rename_watch() {
    let (mut session, backend) = stopped_session().await;
    backend.respond("-var-create", watch_created("1"));

    let (id, _, _) = session.add_variable_watch("a").await.unwrap();
    let (renamed, _, _) = session.rename_variable_watch(id, "b").await.unwrap();

    assert_ne!(id, renamed);

    let watches = session.watches();
    assert_eq!(watches.len(), 1);
    assert_eq!(watches[0].expression, "b");
    assert!(backend.commands().contains(&format!("-var-delete w{id}")));
}

#[test(tokio::test)]
async fn results_are_matched_by_token() {
    let (mut session, backend) = stopped_session().await;

    session.select_frame(1).await.unwrap();
    session.remove_breakpoint(2).await.unwrap();

    let select = backend.token_of("-stack-select-frame");
    let delete = backend.token_of("-break-delete");
    assert!(select < delete);

    backend.emit(&format!("{delete}^done"));
    drain(&mut session).await;

    assert_eq!(session.current_frame(), 0);
    assert_eq!(backend.commands().last().map(String::as_str), Some("-break-list"));

    backend.emit(&format!("{select}^done"));
    drain(&mut session).await;

    assert_eq!(session.current_frame(), 1);
}

#[test(tokio::test)]
async fn select_frame_is_idempotent() {
    let (mut session, backend) = stopped_session().await;
    let (channel, mut events) = EventChannel::new();
    session.subscribe(channel);

    session.select_frame(1).await.unwrap();
    backend.emit(&format!("{}^done", backend.token_of("-stack-select-frame")));
    drain(&mut session).await;

    let frame_changed = |events: &[SessionEvent]| {
        events
            .iter()
            .filter(|e| matches!(e, SessionEvent::FrameChanged { index: 1, frame: Some(_) }))
            .count()
    };
    assert_eq!(frame_changed(&received(&mut events)), 1);

    let written = backend.written().len();
    session.select_frame(1).await.unwrap();

    assert_eq!(backend.written().len(), written);
    assert_eq!(session.current_frame(), 1);
    assert_eq!(frame_changed(&received(&mut events)), 1);

    assert!(matches!(session.select_frame(7).await, Err(Error::InvalidFrame(7))));
}

#[test(tokio::test)]
async fn breakpoints_follow_backend_tables() {
    let (mut session, backend) = new_session();

    session.set_breakpoint_at_function("main").await.unwrap();
    assert_eq!(backend.commands(), ["-break-insert -f main"]);

    backend.emit(r#"1^done,bkpt={number="1",type="breakpoint",disp="keep",enabled="y",addr="0x1149",func="main",file="main.c",fullname="/src/main.c",line="40",times="0"}"#);
    drain(&mut session).await;

    assert_eq!(backend.commands().last().map(String::as_str), Some("-break-list"));

    backend.emit(&format!(
        r#"{}^done,BreakpointTable={{nr_rows="2",nr_cols="6",hdr=[{{width="7",alignment="-1",col_name="number",colhdr="Num"}}],body=[bkpt={{number="1",enabled="y",func="main",fullname="/src/main.c",line="40"}},bkpt={{number="2",enabled="y",func="helper"}}]}}"#,
        backend.token_of("-break-list")
    ));
    drain(&mut session).await;

    let ids: Vec<_> = session.breakpoints().iter().map(|b| b.id).collect();
    assert_eq!(ids, [2, 1]);

    // a notification carrying the table is a full replace as well
    backend.emit(r#"=breakpoint-modified,BreakpointTable={nr_rows="1",nr_cols="6",hdr=[],body=[bkpt={number="2",enabled="n",func="helper"}]}"#);
    drain(&mut session).await;

    let breakpoints = session.breakpoints();
    assert_eq!(breakpoints.len(), 1);
    assert!(!breakpoints[0].enabled);

    backend.emit(r#"=breakpoint-deleted,id="2""#);
    drain(&mut session).await;
    backend.emit(&format!(
        r#"{}^done,BreakpointTable={{nr_rows="0",nr_cols="6",hdr=[],body=[]}}"#,
        backend.token_of("-break-list")
    ));
    drain(&mut session).await;

    assert!(session.breakpoints().is_empty());
}

#[test(tokio::test)]
async fn thread_selection() {
    let (mut session, backend) = stopped_session().await;

    backend.emit(&format!(
        r#"{}^done,threads=[{{id="1",target-id="LWP 10",frame={{func="main"}},state="stopped"}},{{id="2",target-id="LWP 11",name="worker",state="stopped"}}],current-thread-id="1""#,
        backend.token_of("-thread-info")
    ));
    drain(&mut session).await;
    assert_eq!(session.threads().len(), 2);

    assert!(matches!(session.select_thread(9).await, Err(Error::UnknownThread(9))));

    session.select_thread(2).await.unwrap();
    backend.emit(&format!(
        r#"{}^done,new-thread-id="2",frame={{level="0",func="worker_loop"}}"#,
        backend.token_of("-thread-select")
    ));
    drain(&mut session).await;

    assert_eq!(session.current_thread(), Some(2));

    let commands = backend.commands();
    assert_eq!(
        commands[commands.len() - 2..],
        ["-stack-list-frames", "-stack-list-locals 1"]
    );
}

#[test(tokio::test)]
async fn local_formats_survive_stops() {
    let (mut session, backend) = stopped_session().await;

    backend.emit(&format!(
        r#"{}^done,locals=[{{name="i",value="3"}},{{name="s",value="0x4006f4 \"hi\""}}]"#,
        backend.token_of("-stack-list-locals")
    ));
    drain(&mut session).await;

    assert_eq!(session.cycle_local_format("i").unwrap().as_deref(), Some("0x03"));
    assert_eq!(session.cycle_local_format("missing").unwrap(), None);

    session.continue_().await.unwrap();
    backend.emit(STOP_AT_MAIN);
    drain(&mut session).await;
    backend.emit(&format!(
        r#"{}^done,locals=[{{name="i",value="4"}}]"#,
        backend.token_of("-stack-list-locals")
    ));
    drain(&mut session).await;

    let locals = session.locals();
    assert_eq!(locals[0].format, DisplayFormat::Hex);
    assert_eq!(locals[0].display_value(), "0x04");
}

#[test(tokio::test)]
async fn stop_depends_on_state() {
    let (mut session, backend) = new_session();

    backend.emit(r#"=thread-group-started,id="i1",pid="4242""#);
    drain(&mut session).await;

    session.run().await.unwrap();
    session.stop().await.unwrap();
    assert_eq!(backend.interrupts(), [Some(4242)]);

    backend.emit(r#"*stopped,reason="signal-received",signal-name="SIGINT",signal-meaning="Interrupt",frame={func="main"},thread-id="1""#);
    drain(&mut session).await;
    assert_eq!(session.state(), TargetState::Stopped);

    session.stop().await.unwrap();
    assert_eq!(backend.commands().last().map(String::as_str), Some("-gdb-exit"));

    backend.emit(&format!("{}^exit", backend.token_of("-gdb-exit")));
    backend.exit(ExitReason::ExitedNormally);
    drain(&mut session).await;
    assert_eq!(session.state(), TargetState::Exited);

    session.stop().await.unwrap();
    assert!(backend.terminated());
}

#[test(tokio::test)]
async fn stop_without_pid_interrupts_backend() {
    let (mut session, backend) = new_session();

    session.run().await.unwrap();
    session.stop().await.unwrap();

    // pid of the scripted backend
    assert_eq!(backend.interrupts(), [Some(1000)]);
}

#[test(tokio::test)]
async fn remote_target_is_resumed_and_interrupted_by_backend() {
    let (mut session, backend) = new_session();

    let spec = LaunchSpec::new("/tmp/prog").remote("board", 3333);
    session.initialize(&spec).await.unwrap();
    assert_eq!(
        backend.commands().last().map(String::as_str),
        Some("-target-select remote board:3333")
    );

    backend.emit(r#"=thread-group-started,id="i1",pid="4242""#);
    drain(&mut session).await;
    assert_eq!(session.target_pid(), Some(4242));

    session.run().await.unwrap();
    assert_eq!(
        backend.commands().last().map(String::as_str),
        Some("-exec-continue")
    );
    assert!(!backend.commands().iter().any(|c| c == "-exec-run"));

    backend.emit(r#"*running,thread-id="all""#);
    drain(&mut session).await;
    assert_eq!(session.state(), TargetState::Running);

    session.stop().await.unwrap();
    assert!(backend.interrupts().is_empty());
    assert_eq!(
        backend.commands().last().map(String::as_str),
        Some("-exec-interrupt")
    );

    backend.emit(r#"*stopped,reason="signal-received",signal-name="SIGINT",signal-meaning="Interrupt",frame={func="main"},thread-id="1""#);
    drain(&mut session).await;
    assert_eq!(session.state(), TargetState::Stopped);
}

#[test(tokio::test)]
async fn stream_records_are_forwarded() {
    let (mut session, backend) = new_session();
    let (channel, mut events) = EventChannel::new();
    session.subscribe(channel);

    backend.emit_all(indoc! {r#"
        ~"GNU gdb (GDB) 14.2\n"
        @"program output\r\n"
        &"warning: no symbols\n"
        this is not a record
    "#});
    backend.emit_stderr("stderr noise");
    drain(&mut session).await;

    assert_eq!(
        received(&mut events),
        [
            SessionEvent::ConsoleOutput("GNU gdb (GDB) 14.2\n".into()),
            SessionEvent::TargetOutput("program output".into()),
            SessionEvent::LogOutput("warning: no symbols\n".into()),
            SessionEvent::LogOutput("this is not a record".into()),
            SessionEvent::LogOutput("stderr noise".into()),
        ]
    );
}

#[test(tokio::test)]
async fn signal_is_reported() {
    let (mut session, backend) = new_session();
    let (channel, mut events) = EventChannel::new();

    session.run().await.unwrap();
    session.subscribe(channel);

    backend.emit(r#"*stopped,reason="signal-received",signal-name="SIGSEGV",signal-meaning="Segmentation fault",frame={addr="0x0",func="??",args=[]},thread-id="1""#);
    drain(&mut session).await;

    let events = received(&mut events);
    assert!(events.contains(&SessionEvent::SignalReceived("SIGSEGV".into())));
    assert!(events.contains(&SessionEvent::CurrentLine(None)));
}

#[derive(Clone, Default)]
struct OpenedFiles(Arc<Mutex<Vec<(PathBuf, u32)>>>);

impl SourceOpener for OpenedFiles {
    fn open_file_at_line(&mut self, path: &Path, line: u32) {
        self.0.lock().unwrap().push((path.to_owned(), line));
    }
}

#[test(tokio::test)]
async fn source_follower_tracks_stops() {
    let (mut session, backend) = new_session();
    let opened = OpenedFiles::default();
    let id = session.subscribe(SourceFollower::new(opened.clone()));

    session.run().await.unwrap();
    backend.emit(STOP_AT_MAIN);
    drain(&mut session).await;

    assert_eq!(
        *opened.0.lock().unwrap(),
        [(PathBuf::from("/src/main.c"), 42)]
    );

    assert!(session.unsubscribe(id));
    assert!(!session.unsubscribe(id));
}
