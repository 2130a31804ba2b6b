//! Console: operator-facing status lines.
//!
//! Informational lines (new game, score) are cyan and bold; error lines
//! (connection lost, unsupported message, bad configuration) are red. AI
//! diagnostics pass through untouched so the AI author sees exactly what their
//! program printed.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::{
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    QueueableCommand,
};

/// How a line is marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Info,
    Error,
    /// Raw AI output.
    Passthrough,
}

static COLOR: AtomicBool = AtomicBool::new(true);

/// Disable styling when stdout is not a terminal or `NO_COLOR` is set.
pub fn init_color() {
    let enabled = io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    COLOR.store(enabled, Ordering::Relaxed);
}

pub fn set_color(enabled: bool) {
    COLOR.store(enabled, Ordering::Relaxed);
}

/// Encode one line (with trailing newline) into `buf`.
pub fn encode_line_into(buf: &mut Vec<u8>, kind: LineKind, text: &str, color: bool) -> io::Result<()> {
    let style = match kind {
        LineKind::Info => Some((Color::Cyan, true)),
        LineKind::Error => Some((Color::Red, true)),
        LineKind::Passthrough => None,
    };

    match style {
        Some((fg, bold)) if color => {
            buf.queue(SetForegroundColor(fg))?;
            if bold {
                buf.queue(SetAttribute(Attribute::Bold))?;
            }
            buf.queue(Print(text))?;
            buf.queue(SetAttribute(Attribute::Reset))?;
            buf.queue(ResetColor)?;
        }
        _ => {
            buf.queue(Print(text))?;
        }
    }
    buf.push(b'\n');
    Ok(())
}

fn emit(kind: LineKind, text: &str) {
    let mut buf = Vec::with_capacity(text.len() + 32);
    if encode_line_into(&mut buf, kind, text, COLOR.load(Ordering::Relaxed)).is_err() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = stdout.write_all(&buf);
    let _ = stdout.flush();
}

pub fn info(text: impl AsRef<str>) {
    emit(LineKind::Info, text.as_ref());
}

pub fn error(text: impl AsRef<str>) {
    emit(LineKind::Error, text.as_ref());
}

pub fn passthrough(text: impl AsRef<str>) {
    emit(LineKind::Passthrough, text.as_ref());
}
