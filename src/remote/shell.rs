//! Command/response protocol over an interactive remote shell.
//!
//! An interactive shell gives no framing and no exit status. Every command is
//! therefore followed by a sentinel line, `echo <FINISH_TOKEN> $?`, and the
//! shell's output is scanned line by line: lines before the shell's echo of
//! the command are login noise, lines after it are real output, and the
//! sentinel line carries the exit status and ends the invocation.
//!
//! The protocol is strictly half-duplex. One `ShellSession` must only ever
//! have one command in flight.

use crate::error::{Error, Result};
use log::{debug, info};
use std::io::{BufRead, ErrorKind, Write};
use std::time::{Duration, Instant};

/// Marker echoed after every command, followed by the command's exit status.
pub const FINISH_TOKEN: &str = "End of stdout buffer. Finished with exit status";

/// Anything that can run a single remote command to completion.
pub trait CommandRunner {
    /// Runs `command`, failing with `Error::Execution` on a nonzero exit status.
    fn execute(&mut self, command: &str) -> Result<()>;
}

/// Receives remote output lines in arrival order.
pub trait OutputSink {
    fn line(&mut self, line: &str);
}

impl<F: FnMut(&str)> OutputSink for F {
    fn line(&mut self, line: &str) {
        self(line)
    }
}

impl OutputSink for Vec<String> {
    fn line(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

/// Prints each remote line to the local stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn line(&mut self, line: &str) {
        println!("{}", line);
    }
}

/// Scanner state for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    AwaitingEcho,
    Streaming,
    Done(i32),
}

/// Classification of one line read from the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Received before the echo (login banner, MOTD, prompt noise) or the
    /// echoed sentinel command. Dropped.
    Banner,
    /// The shell's echo of the submitted command.
    Echo,
    /// Genuine command output.
    Output(String),
    /// The sentinel line with the parsed exit status.
    Finished(i32),
}

/// Finite-state scanner that frames one command inside the shell's text stream.
///
/// The echo is recognised by suffix match against the command text, so a line
/// that happens to end with the command before the real echo arrives is taken
/// as the echo. The first sentinel line ends the scan.
///
/// A multi-line command is echoed one line at a time, and the shell only
/// echoes a typed-ahead line when it reads it, after the previous line has
/// produced its output. Streaming starts at the echo of the first line; the
/// echoes of the remaining lines are expected in order between output lines.
#[derive(Debug, Clone)]
pub struct EchoScanner {
    echo_lines: Vec<String>,
    next_echo: usize,
    state: ScanState,
}

impl EchoScanner {
    /// Creates a scanner for the given (already normalised) command text.
    pub fn new(command: &str) -> Self {
        let mut echo_lines: Vec<String> = command
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if echo_lines.is_empty() {
            echo_lines.push(String::new());
        }

        Self {
            echo_lines,
            next_echo: 0,
            state: ScanState::AwaitingEcho,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Feeds one raw line into the scanner.
    ///
    /// Returns `Error::Protocol` for a sentinel line without a parseable exit
    /// status, or when called after the scan has finished.
    pub fn feed(&mut self, raw: &str) -> Result<LineEvent> {
        if let ScanState::Done(_) = self.state {
            return Err(Error::Protocol(
                "line received after the sentinel was already seen".to_string(),
            ));
        }

        let line = raw.trim_end_matches(['\n', '\r']).trim();

        if self.is_next_echo(line) {
            self.next_echo += 1;
            self.state = ScanState::Streaming;
            return Ok(LineEvent::Echo);
        }

        if line.starts_with(FINISH_TOKEN) {
            let code = parse_exit_status(line)?;
            self.state = ScanState::Done(code);
            return Ok(LineEvent::Finished(code));
        }

        if self.state == ScanState::Streaming && !line.contains(FINISH_TOKEN) {
            return Ok(LineEvent::Output(line.to_string()));
        }

        Ok(LineEvent::Banner)
    }

    fn is_next_echo(&self, line: &str) -> bool {
        self.echo_lines
            .get(self.next_echo)
            .is_some_and(|expected| line.ends_with(expected.as_str()))
    }
}

fn parse_exit_status(line: &str) -> Result<i32> {
    line.split_whitespace()
        .last()
        .and_then(|token| token.parse::<i32>().ok())
        .ok_or_else(|| {
            Error::Protocol(format!("could not parse exit status from sentinel line: {}", line))
        })
}

/// Line-oriented command protocol over a shell's input and output streams.
pub struct ShellSession<W, R> {
    writer: W,
    reader: R,
    sink: Box<dyn OutputSink>,
    deadline: Option<Duration>,
}

impl<W: Write, R: BufRead> ShellSession<W, R> {
    /// Creates a session that prints remote output to stdout.
    pub fn new(writer: W, reader: R) -> Self {
        Self {
            writer,
            reader,
            sink: Box::new(StdoutSink),
            deadline: None,
        }
    }

    /// Builder method to replace the output sink.
    pub fn with_sink(mut self, sink: impl OutputSink + 'static) -> Self {
        self.set_sink(sink);
        self
    }

    pub fn set_sink(&mut self, sink: impl OutputSink + 'static) {
        self.sink = Box::new(sink);
    }

    /// Sets a per-command deadline.
    ///
    /// The deadline is checked between lines. A read that blocks past it is
    /// only interrupted if the underlying stream has its own read timeout.
    pub fn set_deadline(&mut self, deadline: Option<Duration>) {
        self.deadline = deadline;
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Gives mutable access to the write side, e.g. to send `exit`.
    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Submits `command` and the sentinel, then scans output until the sentinel.
    fn submit(&mut self, command: &str) -> Result<i32> {
        let command = command.trim_end_matches('\n');

        // Both lines go out before the single flush.
        writeln!(self.writer, "{}", command)?;
        writeln!(self.writer, "echo {} $?", FINISH_TOKEN)?;
        self.writer.flush()?;

        let mut scanner = EchoScanner::new(command);
        let started = Instant::now();
        let mut buf = Vec::new();

        loop {
            if let Some(deadline) = self.deadline {
                if started.elapsed() >= deadline {
                    return Err(Error::Protocol(format!(
                        "no exit status received within {:?}",
                        deadline
                    )));
                }
            }

            buf.clear();
            let n = match self.reader.read_until(b'\n', &mut buf) {
                Ok(n) => n,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Err(Error::Protocol(format!(
                        "timed out waiting for remote output: {}",
                        e
                    )));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            };

            if n == 0 {
                return Err(Error::Protocol(
                    "shell stream closed before the exit status was received".to_string(),
                ));
            }

            let line = String::from_utf8_lossy(&buf);
            match scanner.feed(&line)? {
                LineEvent::Echo => debug!("Command echo received"),
                LineEvent::Banner => debug!("Discarding shell line: {}", line.trim()),
                LineEvent::Output(text) => self.sink.line(&text),
                LineEvent::Finished(code) => return Ok(code),
            }
        }
    }
}

impl<W: Write, R: BufRead> CommandRunner for ShellSession<W, R> {
    fn execute(&mut self, command: &str) -> Result<()> {
        info!("Executing on remote shell: {}", command.trim_end_matches('\n'));

        let exit_code = self.submit(command)?;
        debug!("Remote command exit status: {}", exit_code);

        if exit_code != 0 {
            return Err(Error::Execution { exit_code });
        }
        Ok(())
    }
}
