use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use futures_util::SinkExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio_stream::{Stream, StreamExt};
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};

use crate::launch::LaunchSpec;
use crate::model::ExitReason;
use crate::{Error, Result};

/// Stream a backend line was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputOrigin {
    /// Standard output (protocol records).
    Stdout,

    /// Standard error (free-form diagnostics).
    Stderr,
}

/// A line of backend output, without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    /// Stream the line was read from.
    pub origin: OutputOrigin,

    /// Line content.
    pub text: String,
}

/// Event of a [Transport].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A line of backend output.
    Line(OutputLine),

    /// The backend process terminated. This is the last event.
    Exited(ExitReason),
}

/// Trait implementing the link with a debugger backend.
pub trait Transport {
    /// Writes a single command line to the backend.
    fn write_line(&mut self, line: &str) -> impl Future<Output = io::Result<()>>;

    /// Returns the next event of the backend.
    ///
    /// Returns `None` once no event will ever come again. Implementations
    /// must be cancel-safe.
    fn next_event(&mut self) -> impl Future<Output = Option<TransportEvent>>;

    /// Process identifier of the backend, if any.
    fn process_id(&self) -> Option<u32>;

    /// Asynchronously interrupts the process `pid`, or the backend itself
    /// when `pid` is `None`.
    fn interrupt(&mut self, pid: Option<u32>) -> Result<()>;

    /// Asks the backend to terminate.
    fn terminate(&mut self) -> Result<()>;

    /// Forcibly kills the backend.
    fn kill(&mut self) -> Result<()>;
}

/// Transport to a debugger backend spawned as a child process.
///
/// The backend is killed when the transport is dropped.
pub struct ProcessTransport {
    child: Child,
    pid: Option<u32>,
    stdin: FramedWrite<ChildStdin, LinesCodec>,
    output: Pin<Box<dyn Stream<Item = OutputLine> + Send>>,
    exited: bool,
}

impl ProcessTransport {
    /// Spawns the debugger backend described by `spec`.
    #[tracing::instrument(name = "SpawnDebugger", skip_all, fields(debugger = %spec.debugger.display()))]
    pub fn spawn(spec: &LaunchSpec) -> Result<Self> {
        let launch_error = |source| Error::Launch {
            program: spec.debugger.clone(),
            source,
        };

        let mut command = Command::new(&spec.debugger);

        command
            .args(spec.debugger_command_line())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        if let Some(env) = spec.env.captured() {
            command.env_clear().envs(env);
        }

        let mut child = command.spawn().map_err(launch_error)?;
        let pid = child.id();

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(launch_error(io::Error::other("missing standard stream")));
        };

        let stdout = FramedRead::new(stdout, LineDecoder::default())
            .filter_map(move |line| output_line(OutputOrigin::Stdout, line));
        let stderr = FramedRead::new(stderr, LineDecoder::default())
            .filter_map(move |line| output_line(OutputOrigin::Stderr, line));

        tracing::info!(pid, "debugger spawned");

        Ok(Self {
            child,
            pid,
            stdin: FramedWrite::new(stdin, LinesCodec::new()),
            output: Box::pin(stdout.merge(stderr)),
            exited: false,
        })
    }
}

impl Transport for ProcessTransport {
    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.stdin.send(line).await.map_err(|e| match e {
            LinesCodecError::Io(e) => e,
            e => io::Error::other(e),
        })
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        if self.exited {
            return None;
        }

        if let Some(line) = self.output.next().await {
            return Some(TransportEvent::Line(line));
        }

        let reason = match self.child.wait().await {
            Ok(status) => exit_reason(status),
            Err(e) => {
                tracing::warn!(error = %e, "failed to wait for the debugger");
                ExitReason::ExitedAbnormally(-1)
            }
        };

        self.exited = true;

        tracing::info!(pid = self.pid, %reason, "debugger exited");

        Some(TransportEvent::Exited(reason))
    }

    fn process_id(&self) -> Option<u32> {
        self.pid
    }

    #[cfg(unix)]
    fn interrupt(&mut self, pid: Option<u32>) -> Result<()> {
        let pid = pid.or(self.pid).ok_or(Error::SessionEnded)?;
        send_signal(pid, nix::sys::signal::Signal::SIGINT)
    }

    #[cfg(not(unix))]
    fn interrupt(&mut self, _pid: Option<u32>) -> Result<()> {
        Err(Error::Unsupported("interrupt"))
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> Result<()> {
        match self.pid {
            Some(pid) if !self.exited => send_signal(pid, nix::sys::signal::Signal::SIGTERM),
            _ => Ok(()),
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> Result<()> {
        self.kill()
    }

    fn kill(&mut self) -> Result<()> {
        if self.exited {
            return Ok(());
        }

        self.child.start_kill()?;
        Ok(())
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) -> Result<()> {
    tracing::debug!(pid, signal = signal.as_str(), "sending signal");

    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), signal)?;
    Ok(())
}

fn output_line(origin: OutputOrigin, line: io::Result<String>) -> Option<OutputLine> {
    match line {
        Ok(text) => Some(OutputLine { origin, text }),
        Err(e) => {
            tracing::warn!(error = %e, ?origin, "failed to read debugger output");
            None
        }
    }
}

fn exit_reason(status: ExitStatus) -> ExitReason {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            let name = nix::sys::signal::Signal::try_from(signal)
                .map(|s| s.as_str().to_owned())
                .unwrap_or_else(|_| format!("signal {signal}"));

            return ExitReason::Signalled(name);
        }
    }

    match status.code() {
        Some(0) => ExitReason::ExitedNormally,
        Some(code) => ExitReason::ExitedAbnormally(code),
        None => ExitReason::ExitedAbnormally(-1),
    }
}

/// Splits a byte stream into lines, without failing on invalid UTF-8.
///
/// The backend forwards the output of the debugged program, which may not
/// be valid UTF-8.
#[derive(Debug, Default)]
struct LineDecoder {
    scanned: usize,
}

impl Decoder for LineDecoder {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Self::Item>> {
        let Some(end) = src[self.scanned..].iter().position(|b| *b == b'\n') else {
            self.scanned = src.len();
            return Ok(None);
        };

        let line = src.split_to(self.scanned + end + 1);
        self.scanned = 0;

        Ok(Some(to_line(&line)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<Self::Item>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }

        if src.is_empty() {
            return Ok(None);
        }

        self.scanned = 0;
        Ok(Some(to_line(&src.split())))
    }
}

fn to_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);

    String::from_utf8_lossy(bytes).into_owned()
}
