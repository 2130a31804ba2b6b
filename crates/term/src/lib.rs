//! Terminal output for the operator.
//!
//! The client has no UI beyond its console: a handful of status lines per game
//! plus whatever the AI prints. This crate owns how those lines look.
//!
//! Structured diagnostics go through `tracing` elsewhere; this is only the
//! human-facing channel.

pub mod console;

pub use console::{encode_line_into, error, info, init_color, passthrough, set_color, LineKind};
