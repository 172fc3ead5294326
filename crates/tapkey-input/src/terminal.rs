// SPDX-License-Identifier: MIT
//
// Terminal mode control: raw mode, restore, and terminal queries.
//
// Safety: This module uses `unsafe` for termios (tcgetattr, tcsetattr),
// ioctl (TIOCGWINSZ), isatty, poll and raw fd reads/writes. These are the
// POSIX interfaces for terminal control. Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// Raw mode is entered through `RawMode::enable`, which saves the current
// termios first and rolls back if switching fails. The saved state lives
// in a `Restorer`: a small `Clone + Send` value that can put the terminal
// back from any thread, any number of times.
//
// A copy of the saved state also goes into a process-wide backup that a
// panic hook (installed once) uses to restore the terminal before the
// panic message prints. The hook writes straight to fd 1, bypassing the
// stdout lock, since the panic may have happened while that lock was held.

use std::io::{self, Write};
use std::os::unix::io::RawFd;
use std::sync::{Mutex, Once};
use std::time::Duration;

use crate::error::{Error, Result};

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub cols: u16,
    pub rows: u16,
}

impl Size {
    /// Used when neither the terminal nor the environment knows.
    pub const FALLBACK: Self = Self { cols: 124, rows: 80 };
}

// ─── Terminal Queries ───────────────────────────────────────────────────────

/// Check whether `fd` is connected to a terminal.
#[must_use]
pub fn is_tty(fd: RawFd) -> bool {
    unsafe { libc::isatty(fd) != 0 }
}

/// Query the terminal size via `ioctl(TIOCGWINSZ)`.
///
/// Falls back to the `COLUMNS` / `LINES` environment variables, then to
/// [`Size::FALLBACK`].
#[must_use]
pub fn size(fd: RawFd) -> Size {
    query_size(fd).unwrap_or_else(|| {
        size_from_env(
            std::env::var("COLUMNS").ok().as_deref(),
            std::env::var("LINES").ok().as_deref(),
        )
    })
}

fn query_size(fd: RawFd) -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &raw mut ws) };

    (result == 0 && ws.ws_col > 0 && ws.ws_row > 0).then_some(Size {
        cols: ws.ws_col,
        rows: ws.ws_row,
    })
}

/// Each dimension falls back on its own when missing or unparsable.
fn size_from_env(columns: Option<&str>, lines: Option<&str>) -> Size {
    let parse = |v: Option<&str>, default: u16| {
        v.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
    };
    Size {
        cols: parse(columns, Size::FALLBACK.cols),
        rows: parse(lines, Size::FALLBACK.rows),
    }
}

// ─── Panic-Safe Terminal Restore ────────────────────────────────────────────

/// Global backup of the saved termios for panic recovery.
static TERMIOS_BACKUP: Mutex<Option<(RawFd, libc::termios)>> = Mutex::new(None);

/// Restore termios from the global backup. Best-effort, ignores errors.
fn restore_termios_from_backup() {
    if let Ok(guard) = TERMIOS_BACKUP.lock() {
        if let Some((fd, ref original)) = *guard {
            unsafe {
                let _ = libc::tcsetattr(fd, libc::TCSANOW, original);
            }
        }
    }
}

/// Output modes a capture client is likely to have switched on: mouse
/// reporting (all three granularities), SGR attributes, hidden cursor,
/// alternate screen. Alternate screen exit is last.
#[rustfmt::skip]
const EMERGENCY_RESTORE: &[u8] = b"\
    \x1b[?1003l\x1b[?1002l\x1b[?1000l\
    \x1b[m\
    \x1b[?25h\
    \x1b[?1049l";

static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Install a panic hook that restores the terminal before printing the error.
fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            unsafe {
                let _ = libc::write(
                    libc::STDOUT_FILENO,
                    EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
                    EMERGENCY_RESTORE.len(),
                );
            }
            restore_termios_from_backup();
            original(info);
        }));
    });
}

// ─── Raw Mode ───────────────────────────────────────────────────────────────

/// Puts a saved terminal state back.
///
/// Cheap to clone and safe to call from any thread, repeatedly.
#[derive(Clone, Copy)]
pub struct Restorer {
    fd: RawFd,
    saved: libc::termios,
}

impl std::fmt::Debug for Restorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Restorer").field("fd", &self.fd).finish_non_exhaustive()
    }
}

impl Restorer {
    /// Save the current state of `fd`.
    ///
    /// # Errors
    ///
    /// [`Error::GetState`] if `tcgetattr` fails.
    pub fn save(fd: RawFd) -> Result<Self> {
        let mut saved: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &raw mut saved) } != 0 {
            return Err(Error::GetState(io::Error::last_os_error()));
        }
        Ok(Self { fd, saved })
    }

    /// Put the saved state back.
    ///
    /// # Errors
    ///
    /// [`Error::Restore`] if `tcsetattr` fails.
    pub fn restore(&self) -> Result<()> {
        if unsafe { libc::tcsetattr(self.fd, libc::TCSAFLUSH, &raw const self.saved) } != 0 {
            return Err(Error::Restore(io::Error::last_os_error()));
        }

        if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
            if matches!(*guard, Some((fd, _)) if fd == self.fd) {
                *guard = None;
            }
        }
        Ok(())
    }
}

/// A terminal in raw mode. Restores the saved state on drop.
#[derive(Debug)]
pub struct RawMode {
    restorer: Restorer,
}

impl RawMode {
    /// Save the state of `fd` and switch it to raw mode.
    ///
    /// # Errors
    ///
    /// [`Error::GetState`] if the state cannot be read, [`Error::SetRaw`]
    /// if raw mode cannot be entered (the saved state is put back first).
    pub fn enable(fd: RawFd) -> Result<Self> {
        let restorer = Restorer::save(fd)?;

        install_panic_hook();
        if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
            *guard = Some((fd, restorer.saved));
        }

        let mut termios = restorer.saved;
        make_raw(&mut termios);

        if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, &raw const termios) } != 0 {
            let err = io::Error::last_os_error();
            if let Err(rollback) = restorer.restore() {
                log::warn!("rollback after failed raw mode switch: {rollback}");
            }
            return Err(Error::SetRaw(err));
        }

        log::debug!("fd {fd} in raw mode");
        Ok(Self { restorer })
    }

    /// A handle that can restore the terminal independently of this guard.
    #[inline]
    #[must_use]
    pub const fn restorer(&self) -> Restorer {
        self.restorer
    }

    /// Restore now instead of on drop.
    ///
    /// # Errors
    ///
    /// [`Error::Restore`] if `tcsetattr` fails.
    pub fn restore(&self) -> Result<()> {
        self.restorer.restore()
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(err) = self.restorer.restore() {
            log::warn!("{err}");
        }
    }
}

/// `cfmakeraw` equivalent: disable all line processing.
///
/// VMIN=1, VTIME=0: read() blocks until at least one byte is available.
fn make_raw(termios: &mut libc::termios) {
    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON);
    termios.c_oflag &= !libc::OPOST;
    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8;

    termios.c_cc[libc::VMIN] = 1;
    termios.c_cc[libc::VTIME] = 0;
}

// ─── Cursor Position ────────────────────────────────────────────────────────

/// The longest reply accepted: `ESC [ 65535 ; 65535 R`.
const CURSOR_REPORT_MAX: usize = 14;

/// How long to wait for each byte of the reply.
const CURSOR_REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// Ask the terminal where the cursor is.
///
/// Writes `CSI 6n` to stderr and reads the reply from `fd`, in raw mode.
/// Returns `(x, y)` in reply order, 1-based as the terminal sends them.
///
/// # Errors
///
/// [`Error::NotATty`] if `fd` is not a terminal, the raw mode errors, an
/// I/O error writing the query, or [`Error::CursorReport`] if the reply is
/// missing or malformed.
pub fn cursor_position(fd: RawFd) -> Result<(u16, u16)> {
    if !is_tty(fd) {
        return Err(Error::NotATty);
    }

    let raw = RawMode::enable(fd)?;

    let mut stderr = io::stderr().lock();
    stderr.write_all(b"\x1b[6n")?;
    stderr.flush()?;
    drop(stderr);

    let reply = read_cursor_reply(fd)?;
    raw.restore()?;
    parse_cursor_report(&reply)
}

fn read_cursor_reply(fd: RawFd) -> Result<Vec<u8>> {
    let timeout = i32::try_from(CURSOR_REPLY_TIMEOUT.as_millis()).unwrap_or(i32::MAX);
    let mut reply = Vec::with_capacity(CURSOR_REPORT_MAX);

    while reply.len() < CURSOR_REPORT_MAX {
        let ready = unsafe {
            let mut pfd = libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            };
            libc::poll(&raw mut pfd, 1, timeout)
        };
        if ready <= 0 {
            break;
        }

        let mut byte = 0u8;
        if unsafe { libc::read(fd, (&raw mut byte).cast(), 1) } != 1 {
            break;
        }
        reply.push(byte);
        if byte == b'R' {
            return Ok(reply);
        }
    }

    Err(Error::CursorReport(String::from_utf8_lossy(&reply).into_owned()))
}

/// Parse a cursor position report `ESC [ x ; y R`.
///
/// Returns `(x, y)`: the first number, then the second.
///
/// # Errors
///
/// [`Error::CursorReport`] with the offending text.
pub fn parse_cursor_report(reply: &[u8]) -> Result<(u16, u16)> {
    let malformed = || Error::CursorReport(String::from_utf8_lossy(reply).into_owned());

    let body = reply
        .strip_prefix(b"\x1b[")
        .and_then(|r| r.strip_suffix(b"R"))
        .ok_or_else(malformed)?;
    let body = std::str::from_utf8(body).map_err(|_| malformed())?;
    let (x, y) = body.split_once(';').ok_or_else(malformed)?;

    let x = x.parse().map_err(|_| malformed())?;
    let y = y.parse().map_err(|_| malformed())?;
    Ok((x, y))
}

// ─── Test Support ───────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use std::os::unix::io::RawFd;

    /// A pseudo-terminal pair, closed on drop. `slave` is the terminal
    /// side; bytes written to `master` arrive there as input.
    pub struct Pty {
        pub master: RawFd,
        pub slave: RawFd,
    }

    impl Pty {
        pub fn open() -> Self {
            let (mut master, mut slave) = (0, 0);
            let rc = unsafe {
                libc::openpty(
                    &raw mut master,
                    &raw mut slave,
                    std::ptr::null_mut(),
                    std::ptr::null_mut(),
                    std::ptr::null_mut(),
                )
            };
            assert_eq!(rc, 0, "openpty: {}", std::io::Error::last_os_error());
            Self { master, slave }
        }

        /// Type `bytes` into the terminal.
        pub fn send(&self, bytes: &[u8]) {
            let n = unsafe { libc::write(self.master, bytes.as_ptr().cast(), bytes.len()) };
            assert_eq!(usize::try_from(n).ok(), Some(bytes.len()));
        }
    }

    impl Drop for Pty {
        fn drop(&mut self) {
            unsafe {
                libc::close(self.slave);
                libc::close(self.master);
            }
        }
    }

    pub fn termios_of(fd: RawFd) -> libc::termios {
        let mut t: libc::termios = unsafe { std::mem::zeroed() };
        assert_eq!(unsafe { libc::tcgetattr(fd, &raw mut t) }, 0);
        t
    }

    /// A pipe as `(read end, write end)`.
    pub fn pipe() -> (RawFd, RawFd) {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        (fds[0], fds[1])
    }

    pub fn close(fds: &[RawFd]) {
        for &fd in fds {
            unsafe {
                libc::close(fd);
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::testing::{Pty, close, pipe, termios_of};
    use super::*;
    use pretty_assertions::assert_eq;

    // ── Size ──────────────────────────────────────────────────────────

    #[test]
    fn fallback_size() {
        assert_eq!(Size::FALLBACK, Size { cols: 124, rows: 80 });
    }

    #[test]
    fn size_from_env_values() {
        assert_eq!(
            size_from_env(Some("100"), Some("40")),
            Size { cols: 100, rows: 40 }
        );
    }

    #[test]
    fn size_from_env_missing() {
        assert_eq!(size_from_env(None, None), Size::FALLBACK);
    }

    #[test]
    fn size_from_env_garbage_falls_back_per_dimension() {
        assert_eq!(
            size_from_env(Some("wide"), Some("30")),
            Size { cols: 124, rows: 30 }
        );
    }

    #[test]
    fn size_is_never_zero() {
        let s = size(libc::STDOUT_FILENO);
        assert!(s.cols > 0);
        assert!(s.rows > 0);
    }

    // ── Queries on non-terminals ─────────────────────────────────────

    #[test]
    fn pipe_is_not_a_tty() {
        let (rx, tx) = pipe();
        assert!(!is_tty(rx));
        close(&[rx, tx]);
    }

    #[test]
    fn raw_mode_on_a_pipe_fails_to_read_state() {
        let (rx, tx) = pipe();
        assert!(matches!(RawMode::enable(rx), Err(Error::GetState(_))));
        close(&[rx, tx]);
    }

    #[test]
    fn cursor_position_on_a_pipe() {
        let (rx, tx) = pipe();
        assert!(matches!(cursor_position(rx), Err(Error::NotATty)));
        close(&[rx, tx]);
    }

    // ── Raw mode on a pseudo-terminal ───────────────────────────────

    const LINE_DISCIPLINE: libc::tcflag_t = libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN;

    fn assert_same_modes(a: &libc::termios, b: &libc::termios) {
        assert_eq!(a.c_iflag, b.c_iflag);
        assert_eq!(a.c_oflag, b.c_oflag);
        assert_eq!(a.c_cflag, b.c_cflag);
        assert_eq!(a.c_lflag, b.c_lflag);
    }

    #[test]
    fn pty_is_a_tty() {
        let pty = Pty::open();
        assert!(is_tty(pty.slave));
    }

    #[test]
    fn raw_mode_turns_off_line_processing() {
        let pty = Pty::open();
        assert_ne!(termios_of(pty.slave).c_lflag & libc::ICANON, 0);

        let _raw = RawMode::enable(pty.slave).unwrap();
        let raw = termios_of(pty.slave);
        assert_eq!(raw.c_lflag & LINE_DISCIPLINE, 0);
        assert_eq!(raw.c_iflag & (libc::ICRNL | libc::IXON), 0);
        assert_eq!(raw.c_oflag & libc::OPOST, 0);
        assert_eq!(raw.c_cflag & libc::CSIZE, libc::CS8);
        assert_eq!(raw.c_cc[libc::VMIN], 1);
        assert_eq!(raw.c_cc[libc::VTIME], 0);
    }

    #[test]
    fn drop_puts_the_terminal_back() {
        let pty = Pty::open();
        let before = termios_of(pty.slave);

        let raw = RawMode::enable(pty.slave).unwrap();
        drop(raw);

        assert_same_modes(&termios_of(pty.slave), &before);
    }

    #[test]
    fn restore_can_be_repeated() {
        let pty = Pty::open();
        let before = termios_of(pty.slave);

        let raw = RawMode::enable(pty.slave).unwrap();
        let restorer = raw.restorer();
        restorer.restore().unwrap();
        restorer.restore().unwrap();
        raw.restore().unwrap();
        assert_same_modes(&termios_of(pty.slave), &before);

        drop(raw);
        restorer.restore().unwrap();
        assert_same_modes(&termios_of(pty.slave), &before);
    }

    #[test]
    fn restorer_outlives_the_guard() {
        let pty = Pty::open();
        let before = termios_of(pty.slave);

        let restorer = RawMode::enable(pty.slave).unwrap().restorer();
        assert_same_modes(&termios_of(pty.slave), &before);

        // Back into raw mode by hand; the copied handle still undoes it.
        let mut manual = before;
        make_raw(&mut manual);
        assert_eq!(unsafe { libc::tcsetattr(pty.slave, libc::TCSANOW, &raw const manual) }, 0);
        restorer.restore().unwrap();
        assert_same_modes(&termios_of(pty.slave), &before);
    }

    #[test]
    fn restore_clears_the_panic_backup_for_its_fd() {
        let pty = Pty::open();
        let raw = RawMode::enable(pty.slave).unwrap();
        raw.restore().unwrap();
        let backup = TERMIOS_BACKUP.lock().unwrap();
        assert!(!matches!(*backup, Some((fd, _)) if fd == pty.slave));
    }

    // ── Cursor report ───────────────────────────────────────────────

    #[test]
    fn parse_report() {
        assert_eq!(parse_cursor_report(b"\x1b[12;40R").unwrap(), (12, 40));
        assert_eq!(parse_cursor_report(b"\x1b[1;1R").unwrap(), (1, 1));
    }

    #[test]
    fn parse_report_keeps_reply_order() {
        let (x, y) = parse_cursor_report(b"\x1b[7;300R").unwrap();
        assert_eq!(x, 7);
        assert_eq!(y, 300);
    }

    #[test]
    fn parse_report_rejects_garbage() {
        for bad in [
            &b""[..],
            b"\x1b[12;40",
            b"[12;40R",
            b"\x1b[12R",
            b"\x1b[a;bR",
            b"\x1b[99999;1R",
        ] {
            assert!(
                matches!(parse_cursor_report(bad), Err(Error::CursorReport(_))),
                "{bad:?}"
            );
        }
    }

    // ── Emergency restore sequence ──────────────────────────────────

    #[test]
    fn emergency_restore_exits_alt_screen_last() {
        let s = std::str::from_utf8(EMERGENCY_RESTORE).unwrap();
        assert!(s.ends_with("\x1b[?1049l"));
    }

    #[test]
    fn emergency_restore_contains_all_sequences() {
        let s = std::str::from_utf8(EMERGENCY_RESTORE).unwrap();
        assert!(s.contains("\x1b[?1000l"), "must disable mouse clicks");
        assert!(s.contains("\x1b[?1002l"), "must disable mouse drag");
        assert!(s.contains("\x1b[?1003l"), "must disable mouse motion");
        assert!(s.contains("\x1b[m"), "must reset SGR attributes");
        assert!(s.contains("\x1b[?25h"), "must show cursor");
    }
}
