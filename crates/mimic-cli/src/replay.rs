use std::collections::VecDeque;
use std::io;

use mimic_session::{OutputLine, OutputOrigin, Transport, TransportEvent};

/// Prefix of transcript lines recording a command sent to the backend.
const COMMAND_PREFIX: &str = "-> ";

/// Prefix of transcript lines recording backend output. It is optional.
const OUTPUT_PREFIX: &str = "<- ";

/// Transport feeding a recorded backend transcript to a session.
///
/// Every line of the transcript is backend output, except lines starting
/// with `-> ` which record the commands of the original session and are
/// skipped. Commands written by the replaying session are kept aside.
#[derive(Debug, Default)]
pub struct ReplayTransport {
    lines: VecDeque<String>,
    written: Vec<String>,
}

impl ReplayTransport {
    /// Loads a transcript.
    pub fn from_transcript(transcript: &str) -> Self {
        let lines = transcript
            .lines()
            .filter(|line| !line.starts_with(COMMAND_PREFIX))
            .map(|line| line.strip_prefix(OUTPUT_PREFIX).unwrap_or(line).to_owned())
            .collect();

        Self {
            lines,
            written: Vec::new(),
        }
    }

    /// Commands written by the session so far.
    pub fn written(&self) -> &[String] {
        &self.written
    }
}

impl Transport for ReplayTransport {
    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        tracing::trace!(line, "replayed session wrote");
        self.written.push(line.to_owned());
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.lines.pop_front().map(|text| {
            TransportEvent::Line(OutputLine {
                origin: OutputOrigin::Stdout,
                text,
            })
        })
    }

    fn process_id(&self) -> Option<u32> {
        None
    }

    fn interrupt(&mut self, pid: Option<u32>) -> mimic_session::Result<()> {
        tracing::debug!(?pid, "interrupt ignored by replay");
        Ok(())
    }

    fn terminate(&mut self) -> mimic_session::Result<()> {
        self.lines.clear();
        Ok(())
    }

    fn kill(&mut self) -> mimic_session::Result<()> {
        self.lines.clear();
        Ok(())
    }
}
