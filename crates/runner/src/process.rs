//! Deadline-bounded AI process runs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::types::{DeadlineBudget, MoveCommand};

/// How long to keep reading stdout once the process has been reaped.
const READER_DRAIN: Duration = Duration::from_millis(200);

/// Receives every stdout line that is not a move command.
pub type DiagnosticSink = Arc<dyn Fn(&str) + Send + Sync>;

/// One classified line of AI output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Command(MoveCommand),
    Diagnostic(String),
}

/// Classify one stdout line (already stripped of its terminator).
pub fn classify_line(line: String) -> OutputLine {
    match MoveCommand::from_line(&line) {
        Some(cmd) => OutputLine::Command(cmd),
        None => OutputLine::Diagnostic(line),
    }
}

/// Forward stdout lines until EOF. Bytes that are not UTF-8 are decoded
/// lossily and end up as diagnostics.
async fn read_lines<R>(mut stdout: R, line_tx: mpsc::UnboundedSender<OutputLine>)
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match stdout.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.ends_with(b"\n") {
                    buf.pop();
                    if buf.ends_with(b"\r") {
                        buf.pop();
                    }
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                if line_tx.send(classify_line(line)).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "AI stdout read failed");
                break;
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to launch AI process {}: {source}", .program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("AI process {} started without a stdout pipe", .program.display())]
    MissingStdout { program: PathBuf },
}

/// Result of one supervised run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Commands in the order the AI printed them.
    pub commands: Vec<MoveCommand>,
    /// The deadline fired and the process was killed.
    pub timed_out: bool,
    /// Exit status once reaped (`None` only if reaping itself failed).
    pub exit_status: Option<ExitStatus>,
    pub elapsed: Duration,
}

/// Handle to the AI executable. Cheap to clone; each [`AiProcess::run`] spawns
/// a fresh process.
#[derive(Clone)]
pub struct AiProcess {
    program: PathBuf,
    diagnostics: DiagnosticSink,
}

impl fmt::Debug for AiProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiProcess")
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

impl AiProcess {
    /// AI at `program`; diagnostics go to the `ai` tracing target.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            diagnostics: Arc::new(|line: &str| info!(target: "ai", "{}", line)),
        }
    }

    /// Replace the diagnostic sink.
    pub fn with_diagnostics(mut self, sink: DiagnosticSink) -> Self {
        self.diagnostics = sink;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the AI for one turn.
    ///
    /// Returns within roughly `budget.timeout()` of launch. The child is reaped
    /// before this returns on every path except cancellation of the returned
    /// future, where `kill_on_drop` takes over.
    pub async fn run(&self, state: &str, budget: &DeadlineBudget) -> Result<RunOutcome, RunError> {
        let timeout = budget.timeout();
        let started = Instant::now();
        let deadline = started + timeout;

        let mut child = Command::new(&self.program)
            .arg(state)
            .arg(budget.as_arg())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Launch {
                program: self.program.clone(),
                source,
            })?;

        let Some(stdout) = child.stdout.take() else {
            if let Err(e) = child.kill().await {
                debug!(error = %e, "kill failed");
            }
            return Err(RunError::MissingStdout {
                program: self.program.clone(),
            });
        };

        debug!(
            program = %self.program.display(),
            pid = child.id(),
            timeout_ms = timeout.as_millis() as u64,
            "AI process launched"
        );

        // Reader task: keeps a blocked line read from holding up the deadline.
        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<OutputLine>();
        let mut reader = tokio::spawn(read_lines(BufReader::new(stdout), line_tx));

        let mut commands = Vec::new();
        let mut timed_out = false;

        loop {
            tokio::select! {
                line = line_rx.recv() => match line {
                    Some(line) => self.accept(line, &mut commands),
                    // stdout closed
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline) => {
                    timed_out = true;
                    break;
                }
            }
        }

        let exit_status = if timed_out {
            self.terminate(&mut child).await
        } else {
            match tokio::time::timeout_at(deadline, child.wait()).await {
                Ok(Ok(status)) => Some(status),
                Ok(Err(e)) => {
                    warn!(error = %e, "failed to wait for AI process");
                    None
                }
                Err(_) => {
                    timed_out = true;
                    self.terminate(&mut child).await
                }
            }
        };

        // Lines written before the kill still count. A grandchild holding the
        // pipe open would block EOF, so the drain is bounded.
        if tokio::time::timeout(READER_DRAIN, &mut reader).await.is_err() {
            debug!("AI stdout still open after exit, abandoning reader");
            reader.abort();
        }
        while let Ok(line) = line_rx.try_recv() {
            self.accept(line, &mut commands);
        }

        let elapsed = started.elapsed();
        debug!(
            commands = commands.len(),
            timed_out,
            elapsed_ms = elapsed.as_millis() as u64,
            status = ?exit_status,
            "AI process finished"
        );

        Ok(RunOutcome {
            commands,
            timed_out,
            exit_status,
            elapsed,
        })
    }

    fn accept(&self, line: OutputLine, commands: &mut Vec<MoveCommand>) {
        match line {
            OutputLine::Command(cmd) => commands.push(cmd),
            OutputLine::Diagnostic(text) => (self.diagnostics)(&text),
        }
    }

    /// Kill and reap.
    async fn terminate(&self, child: &mut tokio::process::Child) -> Option<ExitStatus> {
        warn!(program = %self.program.display(), "AI process exceeded its budget, terminating");
        if let Err(e) = child.start_kill() {
            // Already exited between the deadline and the kill.
            debug!(error = %e, "kill failed");
        }
        match child.wait().await {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(error = %e, "failed to reap AI process");
                None
            }
        }
    }
}
