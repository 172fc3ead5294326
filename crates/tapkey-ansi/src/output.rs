// SPDX-License-Identifier: MIT
//
// Output delivery: immediate and buffered.
//
//   Writer: wraps any `io::Write` and flushes after every operation, so
//   each command takes effect as soon as it is issued. Handy for simple
//   programs; a busy screen will show the cursor hopping around.
//
//   OutputBuffer: accumulates escape sequences and text in memory and
//   delivers them in one write. Build a whole frame with the `ansi` free
//   functions, then `flush_to` / `flush_stdout`.
//
// Text sent through `Writer::text` is sanitized first: control characters
// other than ESC, CR and LF are dropped, and bytes that are not valid
// UTF-8 become spaces.

use std::io::{self, Write};

use crate::ansi::{self, CursorShape, MouseMotion, ScreenMode};
use crate::color::{self, Effect, TextStyle};

// ─── Sanitizing ─────────────────────────────────────────────────────────────

/// Make `bytes` safe to print.
///
/// Keeps characters from U+0020 up, plus ESC, CR and LF. Each byte of an
/// invalid UTF-8 sequence becomes one space, as does U+FFFD itself.
#[must_use]
pub fn sanitize(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        for ch in chunk.valid().chars() {
            match ch {
                char::REPLACEMENT_CHARACTER => out.push(' '),
                '\x1b' | '\r' | '\n' => out.push(ch),
                c if u32::from(c) >= 0x20 => out.push(c),
                _ => {}
            }
        }
        out.extend(std::iter::repeat_n(' ', chunk.invalid().len()));
    }
    out
}

// ─── Writer ─────────────────────────────────────────────────────────────────

/// Immediate-mode terminal writer.
///
/// Every method writes its sequence and flushes before returning.
///
/// ```
/// use tapkey_ansi::Writer;
///
/// let mut w = Writer::new(Vec::new());
/// w.move_to(10, 2)?;
/// w.text("hi")?;
/// assert_eq!(w.into_inner(), b"\x1b[2;10Hhi");
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct Writer<W: Write> {
    inner: W,
}

impl Writer<io::Stderr> {
    /// A writer on stderr, where terminal output conventionally goes so
    /// that stdout stays free for data.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> Writer<W> {
    #[must_use]
    pub const fn new(inner: W) -> Self {
        Self { inner }
    }

    #[inline]
    pub const fn get_ref(&self) -> &W {
        &self.inner
    }

    #[inline]
    pub const fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn run(&mut self, f: impl FnOnce(&mut W) -> io::Result<()>) -> io::Result<()> {
        f(&mut self.inner)?;
        self.inner.flush()
    }

    /// Write sanitized text.
    ///
    /// # Errors
    ///
    /// Propagates the underlying writer's error, as every method here does.
    pub fn text(&mut self, s: &str) -> io::Result<()> {
        self.bytes(s.as_bytes())
    }

    /// Write sanitized bytes; invalid UTF-8 becomes spaces.
    pub fn bytes(&mut self, b: &[u8]) -> io::Result<()> {
        let clean = sanitize(b);
        self.run(|w| w.write_all(clean.as_bytes()))
    }

    // ── Movement ────────────────────────────────────────────────────

    pub fn up(&mut self, n: u16) -> io::Result<()> {
        self.run(|w| ansi::up(w, n))
    }

    pub fn down(&mut self, n: u16) -> io::Result<()> {
        self.run(|w| ansi::down(w, n))
    }

    pub fn right(&mut self, n: u16) -> io::Result<()> {
        self.run(|w| ansi::right(w, n))
    }

    pub fn left(&mut self, n: u16) -> io::Result<()> {
        self.run(|w| ansi::left(w, n))
    }

    pub fn origin(&mut self) -> io::Result<()> {
        self.run(ansi::origin)
    }

    /// See [`ansi::move_to`]: coordinates are not adjusted.
    pub fn move_to(&mut self, x: u16, y: u16) -> io::Result<()> {
        self.run(|w| ansi::move_to(w, x, y))
    }

    pub fn column(&mut self, n: u16) -> io::Result<()> {
        self.run(|w| ansi::column(w, n))
    }

    // ── Clearing ────────────────────────────────────────────────────

    pub fn clear_line_right(&mut self) -> io::Result<()> {
        self.run(ansi::clear_line_right)
    }

    pub fn clear_line_left(&mut self) -> io::Result<()> {
        self.run(ansi::clear_line_left)
    }

    pub fn clear_line(&mut self) -> io::Result<()> {
        self.run(ansi::clear_line)
    }

    pub fn clear_down(&mut self) -> io::Result<()> {
        self.run(ansi::clear_down)
    }

    pub fn clear_up(&mut self) -> io::Result<()> {
        self.run(ansi::clear_up)
    }

    pub fn clear_all(&mut self) -> io::Result<()> {
        self.run(ansi::clear_all)
    }

    // ── Cursor ──────────────────────────────────────────────────────

    pub fn cursor_hide(&mut self) -> io::Result<()> {
        self.run(ansi::cursor_hide)
    }

    pub fn cursor_show(&mut self) -> io::Result<()> {
        self.run(ansi::cursor_show)
    }

    pub fn cursor_save(&mut self) -> io::Result<()> {
        self.run(ansi::cursor_save)
    }

    pub fn cursor_restore(&mut self) -> io::Result<()> {
        self.run(ansi::cursor_restore)
    }

    /// Send the position query. The reply arrives on the terminal's input.
    pub fn request_cursor_position(&mut self) -> io::Result<()> {
        self.run(ansi::request_cursor_position)
    }

    pub fn cursor_shape(&mut self, shape: CursorShape) -> io::Result<()> {
        self.run(|w| ansi::set_cursor_shape(w, shape))
    }

    // ── Screen & mouse ──────────────────────────────────────────────

    pub fn screen(&mut self, mode: ScreenMode) -> io::Result<()> {
        self.run(|w| ansi::screen(w, mode))
    }

    pub fn mouse_enable(&mut self, motion: MouseMotion) -> io::Result<()> {
        self.run(|w| ansi::mouse_enable(w, motion))
    }

    pub fn mouse_disable(&mut self, motion: MouseMotion) -> io::Result<()> {
        self.run(|w| ansi::mouse_disable(w, motion))
    }

    // ── Effects ─────────────────────────────────────────────────────

    pub fn effect(&mut self, effects: &[Effect]) -> io::Result<()> {
        self.run(|w| color::write_effect(w, effects))
    }

    pub fn style(&mut self, styles: &[TextStyle]) -> io::Result<()> {
        let seq = color::style(styles);
        self.run(|w| w.write_all(seq.as_bytes()))
    }

    pub fn color(&mut self, color: impl Into<color::Color>) -> io::Result<()> {
        let seq = color.into().to_string();
        self.run(|w| w.write_all(seq.as_bytes()))
    }
}

// ─── OutputBuffer ────────────────────────────────────────────────────────────

/// Escape sequences and text for one frame, delivered together.
///
/// The `ansi` and `color` free functions write into it through
/// [`io::Write`]; [`text`](Self::text) adds sanitized text. Nothing reaches
/// the terminal until [`flush_to`](Self::flush_to) or
/// [`flush_stdout`](Self::flush_stdout), which hand the whole frame over in
/// a single `write_all`.
///
/// ```
/// use tapkey_ansi::{OutputBuffer, ansi};
///
/// let mut frame = OutputBuffer::new();
/// ansi::origin(&mut frame)?;
/// frame.text("000001 Ctrl+C");
///
/// let mut tty = Vec::new();
/// frame.flush_to(&mut tty)?;
/// assert_eq!(tty, b"\x1b[H000001 Ctrl+C");
/// assert!(frame.is_empty());
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct OutputBuffer {
    frame: Vec<u8>,
}

/// Initial allocation, in bytes.
const FRAME_CAPACITY: usize = 4096;

impl OutputBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            frame: Vec::with_capacity(FRAME_CAPACITY),
        }
    }

    /// Bytes waiting to be delivered.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.frame.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.frame
    }

    /// Queue `s` after passing it through [`sanitize`].
    pub fn text(&mut self, s: &str) {
        self.frame.extend_from_slice(sanitize(s.as_bytes()).as_bytes());
    }

    /// Drop the pending frame without sending it.
    #[inline]
    pub fn clear(&mut self) {
        self.frame.clear();
    }

    /// [`flush_to`](Self::flush_to) on a locked stdout.
    ///
    /// # Errors
    ///
    /// The stdout write or flush error.
    pub fn flush_stdout(&mut self) -> io::Result<()> {
        self.flush_to(&mut io::stdout().lock())
    }

    /// Send the pending frame to `w` and start a new one.
    ///
    /// An empty frame sends and flushes nothing.
    ///
    /// # Errors
    ///
    /// The error from `w`. The frame stays pending so it can be retried.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        if self.frame.is_empty() {
            return Ok(());
        }
        w.write_all(&self.frame)?;
        w.flush()?;
        log::trace!("sent {}-byte frame", self.frame.len());
        self.frame.clear();
        Ok(())
    }
}

impl Write for OutputBuffer {
    /// Raw bytes, unsanitized: this is how escape sequences get in.
    #[inline]
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.frame.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    /// Does nothing; see [`OutputBuffer::flush_to`].
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
