//! AI process supervision
//!
//! Runs the team's AI executable once per turn and turns its stdout into a
//! move list under a hard wall-clock deadline.
//!
//! # Contract
//!
//! 1. **Launch**: `<program> <game-state-json> <seconds-remaining>`, stdin null
//! 2. **Collect**: every stdout line that is exactly a [`MoveCommand`] is kept,
//!    in order; every other line goes to the diagnostic sink
//! 3. **Deadline**: measured from launch; when it fires the process is killed and
//!    reaped, and the commands collected so far are returned
//!
//! A deadline is never an error. Only launch failures are.
//!
//! ```no_run
//! # async fn demo() -> Result<(), dropblox_runner::RunError> {
//! use dropblox_runner::AiProcess;
//! use dropblox_types::DeadlineBudget;
//!
//! let ai = AiProcess::new("./dropblox_ai");
//! let outcome = ai.run(r#"{"board":[]}"#, &DeadlineBudget::new("5", 5.0)).await?;
//! println!("{:?} (timed out: {})", outcome.commands, outcome.timed_out);
//! # Ok(())
//! # }
//! ```

pub mod process;

pub use dropblox_types as types;

pub use process::{classify_line, AiProcess, DiagnosticSink, OutputLine, RunError, RunOutcome};
