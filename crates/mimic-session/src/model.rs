use std::fmt;
use std::path::PathBuf;

use mimic_mi::Fields;

use crate::format::DisplayFormat;

/// Identifier of a thread, as assigned by the backend.
pub type ThreadId = u64;

/// Identifier of a breakpoint, as assigned by the backend.
pub type BreakpointId = u32;

/// Identifier of a watch, as assigned by the session.
pub type WatchId = u32;

/// Execution state of the debugged program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// Not running (not started yet, or suspended).
    Stopped,

    /// Running.
    Running,

    /// Terminated. The session accepts no more commands.
    Exited,
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Exited => "exited",
        })
    }
}

/// Why the debugged program (or the backend) terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Exited with a zero status.
    ExitedNormally,

    /// Exited with a non-zero status.
    ExitedAbnormally(i32),

    /// Killed by a signal.
    Signalled(String),
}

impl ExitReason {
    /// Builds the exit reason of an exit-flavored `*stopped` record.
    pub(crate) fn from_stop(reason: &str, fields: &Fields) -> Option<Self> {
        match reason {
            "exited-normally" => Some(Self::ExitedNormally),
            "exited" => {
                // the backend reports the status in octal
                let code = fields
                    .str("exit-code")
                    .and_then(|code| i32::from_str_radix(code, 8).ok())
                    .unwrap_or(0);

                if code == 0 {
                    Some(Self::ExitedNormally)
                } else {
                    Some(Self::ExitedAbnormally(code))
                }
            }
            "exited-signalled" => Some(Self::Signalled(
                fields.str("signal-name").unwrap_or("unknown").to_owned(),
            )),
            _ => None,
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitedNormally => f.write_str("exited normally"),
            Self::ExitedAbnormally(code) => write!(f, "exited with code {code}"),
            Self::Signalled(signal) => write!(f, "killed by {signal}"),
        }
    }
}

/// Why the debugged program stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A breakpoint was hit.
    BreakpointHit(Option<BreakpointId>),

    /// A step operation completed.
    EndSteppingRange,

    /// A step-out operation completed.
    FunctionFinished,

    /// A run-to-location operation completed.
    LocationReached,

    /// A watchpoint triggered.
    WatchpointTrigger,

    /// The program received a signal.
    SignalReceived(String),

    /// Any other reason reported by the backend.
    Other(String),

    /// No reason reported.
    Unknown,
}

impl StopReason {
    pub(crate) fn from_fields(fields: &Fields) -> Self {
        match fields.str("reason") {
            Some("breakpoint-hit") => Self::BreakpointHit(fields.parse("bkptno")),
            Some("end-stepping-range") => Self::EndSteppingRange,
            Some("function-finished") => Self::FunctionFinished,
            Some("location-reached") => Self::LocationReached,
            Some(
                "watchpoint-trigger" | "read-watchpoint-trigger" | "access-watchpoint-trigger",
            ) => Self::WatchpointTrigger,
            Some("signal-received") => {
                Self::SignalReceived(fields.str("signal-name").unwrap_or("unknown").to_owned())
            }
            Some(other) => Self::Other(other.to_owned()),
            None => Self::Unknown,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BreakpointHit(Some(id)) => write!(f, "breakpoint {id} hit"),
            Self::BreakpointHit(None) => f.write_str("breakpoint hit"),
            Self::EndSteppingRange => f.write_str("step done"),
            Self::FunctionFinished => f.write_str("function finished"),
            Self::LocationReached => f.write_str("location reached"),
            Self::WatchpointTrigger => f.write_str("watchpoint triggered"),
            Self::SignalReceived(signal) => write!(f, "received {signal}"),
            Self::Other(reason) => f.write_str(reason),
            Self::Unknown => f.write_str("stopped"),
        }
    }
}

/// Details of a stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopEvent {
    /// Why the program stopped.
    pub reason: StopReason,

    /// Thread which caused the stop.
    pub thread_id: Option<ThreadId>,

    /// Frame the program stopped in.
    pub frame: Option<StackFrameEntry>,
}

/// A line of a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Path of the source file.
    pub path: PathBuf,

    /// Line number (1-based).
    pub line: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

/// A frame of the call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrameEntry {
    /// Depth in the stack (0 is the innermost frame).
    pub level: usize,

    /// Function name, or `??` when unknown.
    pub function: String,

    /// Source file name, as written in the debug information.
    pub file: Option<String>,

    /// Resolved source file path.
    pub full_path: Option<PathBuf>,

    /// Source line.
    pub line: Option<u32>,

    /// Instruction address.
    pub address: Option<u64>,
}

impl StackFrameEntry {
    /// Builds a frame from a `frame={...}` tuple.
    ///
    /// Frames of `*stopped` records carry no level, `default_level` is used
    /// then.
    pub fn from_fields(frame: &Fields, default_level: usize) -> Self {
        Self {
            level: frame.parse("level").unwrap_or(default_level),
            function: frame.str("func").unwrap_or("??").to_owned(),
            file: frame.str("file").map(str::to_owned),
            full_path: frame.str("fullname").map(PathBuf::from),
            line: frame.parse("line"),
            address: frame.str("addr").and_then(parse_address),
        }
    }

    /// Source location of this frame, if the debug information has one.
    pub fn location(&self) -> Option<SourceLocation> {
        let path = self
            .full_path
            .clone()
            .or_else(|| self.file.as_ref().map(PathBuf::from))?;

        Some(SourceLocation {
            path,
            line: self.line?,
        })
    }
}

impl fmt::Display for StackFrameEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.level, self.function)?;

        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, " at {file}:{line}"),
            _ => match self.address {
                Some(addr) => write!(f, " ({addr:#x})"),
                None => Ok(()),
            },
        }
    }
}

/// A thread of the debugged program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    /// Thread identifier.
    pub id: ThreadId,

    /// Thread name, or system identifier when unnamed.
    pub name: String,

    /// Function the thread is in, when stopped.
    pub function: Option<String>,
}

impl ThreadInfo {
    pub(crate) fn from_fields(thread: &Fields) -> Option<Self> {
        Some(Self {
            id: thread.parse("id")?,
            name: thread
                .str("name")
                .or_else(|| thread.str("target-id"))
                .unwrap_or_default()
                .to_owned(),
            function: thread
                .tuple("frame")
                .and_then(|frame| frame.str("func"))
                .map(str::to_owned),
        })
    }
}

/// A breakpoint, as known by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakPoint {
    /// Breakpoint identifier.
    pub id: BreakpointId,

    /// Function the breakpoint is in.
    pub function: Option<String>,

    /// Resolved source file path.
    pub path: Option<PathBuf>,

    /// Source line.
    pub line: Option<u32>,

    /// Address, unless pending or with multiple locations.
    pub address: Option<u64>,

    /// Whether the breakpoint is enabled.
    pub enabled: bool,

    /// Number of times the breakpoint was hit.
    pub hits: u32,
}

impl BreakPoint {
    pub(crate) fn from_fields(bkpt: &Fields) -> Option<Self> {
        Some(Self {
            id: bkpt.parse("number")?,
            function: bkpt.str("func").map(str::to_owned),
            path: bkpt
                .str("fullname")
                .or_else(|| bkpt.str("file"))
                .map(PathBuf::from),
            line: bkpt.parse("line"),
            address: bkpt.str("addr").and_then(parse_address),
            enabled: bkpt.str("enabled") != Some("n"),
            hits: bkpt.parse("times").unwrap_or(0),
        })
    }
}

impl fmt::Display for BreakPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;

        if let Some(function) = &self.function {
            write!(f, " in {function}")?;
        }

        if let (Some(path), Some(line)) = (&self.path, self.line) {
            write!(f, " at {}:{line}", path.display())?;
        }

        if !self.enabled {
            f.write_str(" (disabled)")?;
        }

        Ok(())
    }
}

/// An expression evaluated at every stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedVariable {
    /// Watch identifier.
    pub id: WatchId,

    /// Watched expression.
    pub expression: String,

    /// Last value reported by the backend.
    pub value: String,

    /// Type of the expression.
    pub var_type: String,

    /// How the value is displayed.
    pub format: DisplayFormat,
}

impl WatchedVariable {
    /// Value rendered with the display format.
    pub fn display_value(&self) -> String {
        self.format.display(&self.value)
    }
}

/// A local variable of the selected frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    /// Variable name.
    pub name: String,

    /// Last value reported by the backend.
    pub value: String,

    /// How the value is displayed.
    pub format: DisplayFormat,
}

impl LocalVariable {
    /// Value rendered with the display format.
    pub fn display_value(&self) -> String {
        self.format.display(&self.value)
    }
}

/// Name of the backend variable object bound to a watch.
pub(crate) fn watch_object_name(id: WatchId) -> String {
    format!("w{id}")
}

/// Inverse of [watch_object_name]. Children objects (e.g., `w1.field`) are
/// not watches.
pub(crate) fn watch_id_of(object_name: &str) -> Option<WatchId> {
    object_name.strip_prefix('w')?.parse().ok()
}

fn parse_address(addr: &str) -> Option<u64> {
    u64::from_str_radix(addr.strip_prefix("0x")?, 16).ok()
}

#[cfg(test)]
mod tests {
    use mimic_mi::{Fields, Value};

    use super::{BreakPoint, ExitReason, StackFrameEntry, StopReason, watch_id_of};

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(n, v)| (*n, Value::Const((*v).to_owned())))
            .collect()
    }

    #[test]
    fn exit_code_is_octal() {
        let stop = fields(&[("reason", "exited"), ("exit-code", "012")]);
        assert_eq!(
            ExitReason::from_stop("exited", &stop),
            Some(ExitReason::ExitedAbnormally(10))
        );

        let stop = fields(&[("reason", "exited-signalled"), ("signal-name", "SIGSEGV")]);
        assert_eq!(
            ExitReason::from_stop("exited-signalled", &stop),
            Some(ExitReason::Signalled("SIGSEGV".into()))
        );

        assert_eq!(ExitReason::from_stop("breakpoint-hit", &stop), None);
    }

    #[test]
    fn stop_reasons() {
        let stop = fields(&[("reason", "breakpoint-hit"), ("bkptno", "2")]);
        assert_eq!(StopReason::from_fields(&stop), StopReason::BreakpointHit(Some(2)));

        let stop = fields(&[("reason", "signal-received"), ("signal-name", "SIGINT")]);
        assert_eq!(
            StopReason::from_fields(&stop),
            StopReason::SignalReceived("SIGINT".into())
        );

        assert_eq!(StopReason::from_fields(&Fields::new()), StopReason::Unknown);
    }

    #[test]
    fn frame_location_prefers_full_path() {
        let frame = fields(&[
            ("addr", "0x0000555555555149"),
            ("func", "main"),
            ("file", "main.c"),
            ("fullname", "/src/main.c"),
            ("line", "42"),
        ]);

        let frame = StackFrameEntry::from_fields(&frame, 0);
        assert_eq!(frame.address, Some(0x555555555149));

        let location = frame.location().unwrap();
        assert_eq!(location.path.to_str(), Some("/src/main.c"));
        assert_eq!(location.line, 42);
    }

    #[test]
    fn frame_without_debug_info() {
        let frame = fields(&[("level", "3"), ("addr", "0x1000"), ("func", "??")]);

        let frame = StackFrameEntry::from_fields(&frame, 0);
        assert_eq!(frame.level, 3);
        assert_eq!(frame.location(), None);
    }

    #[test]
    fn pending_breakpoint_has_no_address() {
        let bkpt = fields(&[
            ("number", "1"),
            ("enabled", "y"),
            ("addr", "<PENDING>"),
            ("times", "0"),
        ]);

        let bkpt = BreakPoint::from_fields(&bkpt).unwrap();
        assert_eq!(bkpt.address, None);
        assert!(bkpt.enabled);
    }

    #[test]
    fn watch_object_names() {
        assert_eq!(watch_id_of("w12"), Some(12));
        assert_eq!(watch_id_of("w1.field"), None);
        assert_eq!(watch_id_of("var1"), None);
    }
}
