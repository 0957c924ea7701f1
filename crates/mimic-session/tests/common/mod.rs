use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use mimic_session::{
    ExitReason, OutputLine, OutputOrigin, Session, SessionEvent, Transport, TransportEvent,
};
use tokio::sync::mpsc::UnboundedReceiver;

type Responder = Box<dyn Fn(u64) -> Vec<String> + Send>;

#[derive(Default)]
struct Script {
    incoming: VecDeque<TransportEvent>,
    written: Vec<String>,
    responders: Vec<(String, Responder)>,
    interrupts: Vec<Option<u32>>,
    terminated: bool,
    closed: bool,
}

/// Transport replaying scripted backend output.
///
/// The event sequence ends whenever the script runs dry, so a session can be
/// pumped with [drain] without blocking.
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

/// Test side of a [ScriptedTransport].
#[derive(Clone)]
pub struct Backend {
    script: Arc<Mutex<Script>>,
}

pub fn scripted() -> (ScriptedTransport, Backend) {
    let script = Arc::new(Mutex::new(Script::default()));

    (
        ScriptedTransport {
            script: script.clone(),
        },
        Backend { script },
    )
}

impl Backend {
    /// Queues a line of backend standard output.
    pub fn emit(&self, line: &str) {
        self.push(TransportEvent::Line(OutputLine {
            origin: OutputOrigin::Stdout,
            text: line.to_owned(),
        }));
    }

    /// Queues several lines of backend standard output.
    pub fn emit_all(&self, lines: &str) {
        lines.lines().for_each(|line| self.emit(line));
    }

    pub fn emit_stderr(&self, line: &str) {
        self.push(TransportEvent::Line(OutputLine {
            origin: OutputOrigin::Stderr,
            text: line.to_owned(),
        }));
    }

    /// Queues the termination of the backend process.
    pub fn exit(&self, reason: ExitReason) {
        self.push(TransportEvent::Exited(reason));
    }

    /// Answers every command with the given operation (e.g., `-var-create`).
    pub fn respond<F>(&self, operation: &str, reply: F)
    where
        F: Fn(u64) -> Vec<String> + Send + 'static,
    {
        self.script
            .lock()
            .unwrap()
            .responders
            .push((operation.to_owned(), Box::new(reply)));
    }

    pub fn written(&self) -> Vec<String> {
        self.script.lock().unwrap().written.clone()
    }

    /// Written lines, without their token.
    pub fn commands(&self) -> Vec<String> {
        self.written()
            .iter()
            .filter_map(|line| split_token(line).map(|(_, command)| command.to_owned()))
            .collect()
    }

    /// Token of the last command written with the given operation.
    pub fn token_of(&self, operation: &str) -> u64 {
        self.written()
            .iter()
            .rev()
            .filter_map(|line| split_token(line))
            .find(|(_, command)| operation_of(command) == operation)
            .map(|(token, _)| token)
            .unwrap_or_else(|| panic!("{operation} was never written"))
    }

    pub fn interrupts(&self) -> Vec<Option<u32>> {
        self.script.lock().unwrap().interrupts.clone()
    }

    pub fn terminated(&self) -> bool {
        self.script.lock().unwrap().terminated
    }

    fn push(&self, event: TransportEvent) {
        self.script.lock().unwrap().incoming.push_back(event);
    }
}

impl Transport for ScriptedTransport {
    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut script = self.script.lock().unwrap();
        script.written.push(line.to_owned());

        let Some((token, command)) = split_token(line) else {
            return Ok(());
        };

        let replies: Vec<_> = script
            .responders
            .iter()
            .filter(|(operation, _)| operation == operation_of(command))
            .flat_map(|(_, reply)| reply(token))
            .collect();

        for reply in replies {
            script.incoming.push_back(TransportEvent::Line(OutputLine {
                origin: OutputOrigin::Stdout,
                text: reply,
            }));
        }

        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        let mut script = self.script.lock().unwrap();

        if script.closed {
            return None;
        }

        let event = script.incoming.pop_front()?;

        if matches!(event, TransportEvent::Exited(_)) {
            script.closed = true;
        }

        Some(event)
    }

    fn process_id(&self) -> Option<u32> {
        Some(1000)
    }

    fn interrupt(&mut self, pid: Option<u32>) -> mimic_session::Result<()> {
        self.script.lock().unwrap().interrupts.push(pid);
        Ok(())
    }

    fn terminate(&mut self) -> mimic_session::Result<()> {
        self.script.lock().unwrap().terminated = true;
        Ok(())
    }

    fn kill(&mut self) -> mimic_session::Result<()> {
        self.script
            .lock()
            .unwrap()
            .incoming
            .push_back(TransportEvent::Exited(ExitReason::Signalled("SIGKILL".into())));
        Ok(())
    }
}

fn split_token(line: &str) -> Option<(u64, &str)> {
    let start = line.find('-')?;
    let token = line[..start].parse().ok()?;

    Some((token, &line[start..]))
}

fn operation_of(command: &str) -> &str {
    command.split(' ').next().unwrap_or_default()
}

/// Processes every scripted event.
pub async fn drain(session: &mut Session<ScriptedTransport>) {
    while session.process_event().await.expect("process_event") {}
}

/// Collects the events dispatched so far.
pub fn received(events: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut received = Vec::new();

    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    received
}

pub const STOP_AT_MAIN: &str = r#"*stopped,reason="breakpoint-hit",disp="keep",bkptno="1",frame={addr="0x0000555555555149",func="main",args=[],file="main.c",fullname="/src/main.c",line="42",arch="i386:x86-64"},thread-id="1",stopped-threads="all",core="3""#;
