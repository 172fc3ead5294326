// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no buffering decisions; `Writer` and `OutputBuffer` in `output` decide
// when bytes actually reach the terminal.
//
// Coordinates and counts are passed through exactly as given. In
// particular `move_to` does not convert from 0-based: the terminal's
// origin is (1, 1) and callers address it that way.
//
// All functions return `io::Result` propagated from the underlying writer.

use std::io::{self, Write};

// ─── Movement ───────────────────────────────────────────────────────────────

/// Move the cursor up `n` rows (CUU).
#[inline]
pub fn up(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}A")
}

/// Move the cursor down `n` rows (CUD).
#[inline]
pub fn down(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}B")
}

/// Move the cursor right `n` columns (CUF).
#[inline]
pub fn right(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}C")
}

/// Move the cursor left `n` columns (CUB).
#[inline]
pub fn left(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}D")
}

/// Move the cursor to the top-left corner.
#[inline]
pub fn origin(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[H")
}

/// Move the cursor to column `x`, row `y` (CUP). The row goes first on
/// the wire.
#[inline]
pub fn move_to(w: &mut impl Write, x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{y};{x}H")
}

/// Move the cursor to column `n` of the current row (CHA).
#[inline]
pub fn column(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}G")
}

// ─── Clearing ───────────────────────────────────────────────────────────────

/// Clear from the cursor to the end of the line.
#[inline]
pub fn clear_line_right(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[K")
}

/// Clear from the start of the line to the cursor.
#[inline]
pub fn clear_line_left(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[1K")
}

/// Clear the whole line.
#[inline]
pub fn clear_line(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2K")
}

/// Clear from the cursor to the end of the screen.
#[inline]
pub fn clear_down(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[J")
}

/// Clear from the start of the screen to the cursor.
#[inline]
pub fn clear_up(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[1J")
}

/// Clear the entire screen. The cursor does not move.
#[inline]
pub fn clear_all(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

// ─── Cursor ─────────────────────────────────────────────────────────────────

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

/// Save the cursor position. Not every terminal supports it.
#[inline]
pub fn cursor_save(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[s")
}

/// Restore the position saved by [`cursor_save`].
#[inline]
pub fn cursor_restore(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[u")
}

/// Ask the terminal to report the cursor position (DSR 6).
///
/// The reply, `ESC [ row ; column R`, arrives on the terminal's input.
#[inline]
pub fn request_cursor_position(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[6n")
}

/// Terminal cursor shape (DECSCUSR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CursorShape {
    /// Blinking block, the usual terminal default.
    #[default]
    BlinkingBlock = 0,
    SteadyBlock = 2,
    BlinkingUnderline = 3,
    SteadyUnderline = 4,
    /// Blinking bar (I-beam).
    BlinkingBar = 5,
    /// Steady bar (I-beam).
    SteadyBar = 6,
}

/// Set the cursor shape using DECSCUSR.
#[inline]
pub fn set_cursor_shape(w: &mut impl Write, shape: CursorShape) -> io::Result<()> {
    write!(w, "\x1b[{} q", shape as u8)
}

// ─── Screen ─────────────────────────────────────────────────────────────────

/// Which screen buffer the terminal shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenMode {
    /// The alternate screen, what full-screen programs draw on.
    Alternate,
    /// The normal screen with the shell's scrollback.
    Normal,
}

/// Switch screen buffers (DEC 1049).
#[inline]
pub fn screen(w: &mut impl Write, mode: ScreenMode) -> io::Result<()> {
    match mode {
        ScreenMode::Alternate => w.write_all(b"\x1b[?1049h"),
        ScreenMode::Normal => w.write_all(b"\x1b[?1049l"),
    }
}

// ─── Mouse Reporting ────────────────────────────────────────────────────────

/// Which mouse motion the terminal reports, on top of clicks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseMotion {
    /// Clicks and wheel only (DEC 1000).
    #[default]
    None,
    /// Also motion while a button is held (DEC 1002).
    OnDrag,
    /// Also motion with no button held (DEC 1003).
    All,
}

impl MouseMotion {
    /// From the raw values 0 (none), 2 (on drag) and 3 (all). Anything
    /// else is [`MouseMotion::None`].
    #[must_use]
    pub const fn from_raw(value: i32) -> Self {
        match value {
            2 => Self::OnDrag,
            3 => Self::All,
            _ => Self::None,
        }
    }

    /// The DEC private mode number.
    #[must_use]
    pub const fn mode(self) -> u16 {
        match self {
            Self::None => 1000,
            Self::OnDrag => 1002,
            Self::All => 1003,
        }
    }
}

/// Turn on X10-encoded mouse reporting at the given granularity.
#[inline]
pub fn mouse_enable(w: &mut impl Write, motion: MouseMotion) -> io::Result<()> {
    write!(w, "\x1b[?{}h", motion.mode())
}

/// Turn off mouse reporting enabled with the same `motion`.
#[inline]
pub fn mouse_disable(w: &mut impl Write, motion: MouseMotion) -> io::Result<()> {
    write!(w, "\x1b[?{}l", motion.mode())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
