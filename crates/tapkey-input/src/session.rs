// SPDX-License-Identifier: MIT
//
// Capture session: one thread turning a byte source into an event stream.
//
// The thread owns the decoder buffer. It fills the buffer one frame at a
// time, tops it up while it ends in the middle of a sequence, and then
// decodes events off the front until the buffer is empty. Events go out
// over a bounded channel in byte order; the channel is the only thing
// shared with the consumer.
//
//   Idle ──start()──▶ Capturing ──stop() / source closed──▶ Stopped
//
// `capture` wires a session to a terminal: it checks for a TTY, enters
// raw mode, and hands back a `Capture` that stops the thread and puts the
// terminal back when dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, RecvError, RecvTimeoutError, SyncSender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::input::{self, Decoded, Event};
use crate::reader::{ByteSource, Cancel, FrameReader, PollPolicy};

/// Initial decoder buffer capacity. Grows for large pastes.
const BUF_CAPACITY: usize = 64;

/// How long `stop` waits per channel drain while the thread winds down.
const STOP_DRAIN: Duration = Duration::from_millis(1);

// ─── Configuration ──────────────────────────────────────────────────────────

/// Capture session tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Frame reader timing.
    pub policy: PollPolicy,
    /// Events buffered before the capture thread waits for the consumer.
    pub channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            policy: PollPolicy::default(),
            channel_capacity: 1000,
        }
    }
}

// ─── State ──────────────────────────────────────────────────────────────────

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CaptureState {
    Idle = 0,
    Capturing = 1,
    Stopped = 2,
}

impl CaptureState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Capturing,
            _ => Self::Stopped,
        }
    }
}

// ─── Session ────────────────────────────────────────────────────────────────

/// Decodes a [`ByteSource`] into [`Event`]s on a background thread.
///
/// # Example
///
/// ```no_run
/// use tapkey_input::{Session, SessionConfig};
/// # fn source() -> Box<dyn tapkey_input::ByteSource> { unimplemented!() }
///
/// let mut session = Session::new(source(), SessionConfig::default());
/// session.start()?;
/// for event in session.iter() {
///     println!("{event}");
/// }
/// # Ok::<(), tapkey_input::Error>(())
/// ```
pub struct Session<S> {
    /// Moved into the thread by `start`.
    reader: Option<FrameReader<S>>,
    sender: Option<SyncSender<Event>>,
    events: Receiver<Event>,
    state: Arc<AtomicU8>,
    cancel: Cancel,
    handle: Option<JoinHandle<()>>,
}

impl<S: ByteSource + 'static> Session<S> {
    /// An idle session over `source`.
    #[must_use]
    pub fn new(source: S, config: SessionConfig) -> Self {
        Self::with_cancel(source, config, Cancel::new())
    }

    /// An idle session sharing `cancel` with its source, so that `stop`
    /// can interrupt a source parked in a blocking read.
    #[must_use]
    pub fn with_cancel(source: S, config: SessionConfig, cancel: Cancel) -> Self {
        let (sender, events) = mpsc::sync_channel(config.channel_capacity);
        Self {
            reader: Some(FrameReader::new(source, config.policy)),
            sender: Some(sender),
            events,
            state: Arc::new(AtomicU8::new(CaptureState::Idle as u8)),
            cancel,
            handle: None,
        }
    }

    /// Spawn the capture thread. A no-op unless the session is idle.
    ///
    /// # Errors
    ///
    /// [`Error::Spawn`] if the OS refuses the thread; the session is then
    /// stopped.
    pub fn start(&mut self) -> Result<()> {
        let (Some(reader), Some(sender)) = (self.reader.take(), self.sender.take()) else {
            log::debug!("session already started");
            return Ok(());
        };

        self.set_state(CaptureState::Capturing);
        let state = Arc::clone(&self.state);
        let cancel = self.cancel.clone();

        let spawned = thread::Builder::new()
            .name("tapkey-input".into())
            .spawn(move || {
                capture_loop(reader, &sender, &cancel);
                state.store(CaptureState::Stopped as u8, Ordering::Release);
                log::debug!("capture thread stopped");
                drop(sender);
            });

        match spawned {
            Ok(handle) => {
                log::debug!("capture thread started");
                self.handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.set_state(CaptureState::Stopped);
                Err(Error::Spawn(err))
            }
        }
    }
}

impl<S> Session<S> {
    #[must_use]
    pub fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: CaptureState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Whether the capture thread has been started.
    fn started(&self) -> bool {
        self.sender.is_none()
    }

    /// Cancel the thread and wait for it to exit. Idempotent.
    ///
    /// Events still queued in the channel may be discarded.
    pub fn stop(&mut self) {
        self.cancel.cancel();

        if let Some(handle) = self.handle.take() {
            // The thread may be parked on a full channel.
            while !handle.is_finished() {
                if let Err(RecvTimeoutError::Disconnected) = self.events.recv_timeout(STOP_DRAIN) {
                    break;
                }
            }
            if handle.join().is_err() {
                log::warn!("capture thread panicked");
            }
        }

        self.reader = None;
        self.sender = None;
        self.set_state(CaptureState::Stopped);
    }

    /// Wait for the next event.
    ///
    /// # Errors
    ///
    /// Fails once the session has stopped and every event has been
    /// received, and immediately if it was never started.
    pub fn recv(&self) -> std::result::Result<Event, RecvError> {
        if !self.started() {
            return Err(RecvError);
        }
        self.events.recv()
    }

    /// Wait up to `timeout` for the next event.
    ///
    /// # Errors
    ///
    /// [`RecvTimeoutError::Timeout`] when nothing arrived in time,
    /// [`RecvTimeoutError::Disconnected`] once the session has stopped or
    /// if it was never started.
    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<Event, RecvTimeoutError> {
        if !self.started() {
            return Err(RecvTimeoutError::Disconnected);
        }
        self.events.recv_timeout(timeout)
    }

    /// The next event if one is ready.
    ///
    /// # Errors
    ///
    /// [`TryRecvError::Empty`] when nothing is queued,
    /// [`TryRecvError::Disconnected`] once the session has stopped or if
    /// it was never started.
    pub fn try_recv(&self) -> std::result::Result<Event, TryRecvError> {
        if !self.started() {
            return Err(TryRecvError::Disconnected);
        }
        self.events.try_recv()
    }

    /// Blocking iterator over events, ending when the session stops.
    /// Empty if the session was never started.
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.started().then(|| self.events.iter()).into_iter().flatten()
    }
}

impl<S> Drop for Session<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─── Capture Loop ───────────────────────────────────────────────────────────

fn capture_loop<S: ByteSource>(
    mut reader: FrameReader<S>,
    sender: &SyncSender<Event>,
    cancel: &Cancel,
) {
    let mut buf = Vec::with_capacity(BUF_CAPACITY);
    let mut settled = false;

    while !cancel.is_cancelled() {
        if buf.is_empty() {
            let fill = reader.fill(&mut buf);
            if fill.read == 0 {
                log::debug!("input source closed");
                return;
            }
            settled = fill.settled;
        }

        while !settled && input::is_partial(&buf) {
            let fill = reader.top_up(&mut buf);
            settled = fill.settled;
            if fill.read == 0 {
                break;
            }
        }

        let (event, drained) = match input::decode(&buf) {
            Decoded::Exhausted => continue,
            Decoded::Discarded(n) => {
                buf.drain(..n);
                continue;
            }
            Decoded::Event { event, consumed: 0 } => {
                log::warn!("dropping unrecognized input {event}");
                let n = input::malformed_len(&buf);
                (event, n)
            }
            Decoded::Event { event, consumed } => (event, consumed),
        };
        buf.drain(..drained);

        log::trace!("{event:?}");
        if sender.send(event).is_err() {
            log::debug!("event receiver dropped");
            return;
        }
    }
}

// ─── Terminal Capture ───────────────────────────────────────────────────────

#[cfg(unix)]
pub use self::tty::{Capture, capture};

#[cfg(unix)]
mod tty {
    use std::os::unix::io::RawFd;

    use super::{Session, SessionConfig};
    use crate::error::{Error, Result};
    use crate::reader::{Cancel, FdSource};
    use crate::terminal::{self, RawMode, Restorer};

    /// A running capture on a terminal in raw mode.
    ///
    /// Dropping it stops the session and restores the terminal.
    pub struct Capture {
        session: Session<FdSource>,
        raw: RawMode,
    }

    impl Capture {
        #[inline]
        #[must_use]
        pub const fn session(&self) -> &Session<FdSource> {
            &self.session
        }

        #[inline]
        pub const fn session_mut(&mut self) -> &mut Session<FdSource> {
            &mut self.session
        }

        /// The terminal restore handle, usable from other threads.
        #[inline]
        #[must_use]
        pub const fn restorer(&self) -> Restorer {
            self.raw.restorer()
        }

        /// Stop capturing and restore the terminal now.
        ///
        /// # Errors
        ///
        /// [`Error::Restore`] if the terminal state cannot be put back.
        pub fn finish(mut self) -> Result<()> {
            self.session.stop();
            self.raw.restore()
        }
    }

    impl Drop for Capture {
        fn drop(&mut self) {
            self.session.stop();
        }
    }

    /// Start capturing input from the terminal on `fd`, usually stdin.
    ///
    /// # Errors
    ///
    /// [`Error::NotATty`] if `fd` is not a terminal, the [`RawMode`]
    /// errors, or [`Error::Spawn`]. On error the terminal is left as it
    /// was found.
    pub fn capture(fd: RawFd, config: SessionConfig) -> Result<Capture> {
        if !terminal::is_tty(fd) {
            return Err(Error::NotATty);
        }

        let raw = RawMode::enable(fd)?;
        let cancel = Cancel::new();
        let source = FdSource::new(fd, cancel.clone())?;

        let mut session = Session::with_cancel(source, config, cancel);
        session.start()?;

        Ok(Capture { session, raw })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Keycode;
    use crate::reader::testing::{Chunk, FakeSource};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use Chunk::{Byte, Gap};

    /// Zero-length sleeps: the script, not the clock, decides what is
    /// "immediately available".
    fn quick() -> SessionConfig {
        SessionConfig {
            policy: PollPolicy {
                interval: Duration::ZERO,
                grace_retries: 20,
            },
            ..SessionConfig::default()
        }
    }

    fn collect(source: FakeSource) -> Vec<Event> {
        let mut session = Session::new(source, quick());
        session.start().unwrap();
        session.iter().collect()
    }

    fn bytes(b: &[u8]) -> Vec<Chunk> {
        b.iter().copied().map(Byte).collect()
    }

    fn special(k: Keycode) -> Event {
        Event::Special(k)
    }

    // ── Config ──────────────────────────────────────────────────────────

    #[test]
    fn default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.channel_capacity, 1000);
        assert_eq!(config.policy, PollPolicy::default());
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    #[test]
    fn new_session_is_idle() {
        let session = Session::new(FakeSource::default(), quick());
        assert_eq!(session.state(), CaptureState::Idle);
        assert!(session.recv().is_err());
        assert_eq!(session.iter().count(), 0);
    }

    #[test]
    fn unstarted_session_reports_disconnected_everywhere() {
        let session = Session::new(FakeSource::bytes(b"a"), quick());
        assert_eq!(session.recv(), Err(RecvError));
        assert_eq!(session.try_recv(), Err(TryRecvError::Disconnected));
        assert_eq!(
            session.recv_timeout(Duration::from_millis(1)),
            Err(RecvTimeoutError::Disconnected)
        );
        assert_eq!(session.state(), CaptureState::Idle);
    }

    #[test]
    fn closed_source_stops_the_session() {
        let mut session = Session::new(FakeSource::bytes(b"a"), quick());
        session.start().unwrap();
        assert_eq!(session.recv().unwrap(), Event::Printable('a'));
        assert!(session.recv().is_err());
        assert_eq!(session.state(), CaptureState::Stopped);
    }

    #[test]
    fn start_twice_is_a_no_op() {
        let mut session = Session::new(FakeSource::bytes(b"x"), quick());
        session.start().unwrap();
        session.start().unwrap();
        assert_eq!(session.iter().collect::<Vec<_>>(), vec![Event::Printable('x')]);
    }

    #[test]
    fn stop_before_start() {
        let mut session = Session::new(FakeSource::bytes(b"x"), quick());
        session.stop();
        assert_eq!(session.state(), CaptureState::Stopped);
        session.start().unwrap();
        assert_eq!(session.state(), CaptureState::Stopped);
    }

    /// Blocks until cancelled, like an idle terminal.
    struct ParkedSource(Cancel);

    impl ByteSource for ParkedSource {
        fn read_blocking(&mut self) -> Option<u8> {
            while !self.0.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            None
        }

        fn read_nonblocking(&mut self) -> Option<u8> {
            None
        }
    }

    #[test]
    fn stop_interrupts_a_parked_read() {
        let cancel = Cancel::new();
        let mut session = Session::with_cancel(ParkedSource(cancel.clone()), quick(), cancel);
        session.start().unwrap();
        assert_eq!(session.state(), CaptureState::Capturing);
        assert_eq!(
            session.recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Timeout)
        );

        session.stop();
        assert_eq!(session.state(), CaptureState::Stopped);
        session.stop();
    }

    #[test]
    fn stop_with_a_full_channel_does_not_hang() {
        let config = SessionConfig {
            channel_capacity: 1,
            ..quick()
        };
        let mut session = Session::new(FakeSource::bytes(&[b'z'; 64]), config);
        session.start().unwrap();
        thread::sleep(Duration::from_millis(5));
        session.stop();
        assert_eq!(session.state(), CaptureState::Stopped);
    }

    #[test]
    fn try_recv_drains_in_order() {
        let mut session = Session::new(FakeSource::bytes(b"ab"), quick());
        session.start().unwrap();
        let first = session.recv().unwrap();
        let second = session.recv().unwrap();
        assert_eq!((first, second), (Event::Printable('a'), Event::Printable('b')));
        assert_eq!(session.recv(), Err(RecvError));
        assert_eq!(session.try_recv(), Err(TryRecvError::Disconnected));
    }

    // ── Terminal capture ────────────────────────────────────────────────

    #[cfg(unix)]
    mod on_a_pty {
        use super::*;
        use crate::terminal::testing::{Pty, close, pipe, termios_of};
        use pretty_assertions::assert_eq;

        #[test]
        fn capture_needs_a_terminal() {
            let (rx, tx) = pipe();
            assert!(matches!(capture(rx, SessionConfig::default()), Err(Error::NotATty)));
            close(&[rx, tx]);
        }

        #[test]
        fn capture_reads_keys_and_restores_on_finish() {
            let pty = Pty::open();
            let before = termios_of(pty.slave);

            let capture = capture(pty.slave, SessionConfig::default()).unwrap();
            assert_eq!(termios_of(pty.slave).c_lflag & libc::ICANON, 0);
            assert_eq!(capture.session().state(), CaptureState::Capturing);

            pty.send(b"q\x1b[A");
            let timeout = Duration::from_secs(2);
            assert_eq!(capture.session().recv_timeout(timeout), Ok(Event::Printable('q')));
            assert_eq!(capture.session().recv_timeout(timeout), Ok(special(Keycode::Up)));

            capture.finish().unwrap();
            assert_eq!(termios_of(pty.slave).c_lflag, before.c_lflag);
        }

        #[test]
        fn dropping_a_capture_restores_the_terminal() {
            let pty = Pty::open();
            let before = termios_of(pty.slave);

            let capture = capture(pty.slave, SessionConfig::default()).unwrap();
            let restorer = capture.restorer();
            drop(capture);

            let after = termios_of(pty.slave);
            assert_eq!(after.c_lflag, before.c_lflag);
            assert_eq!(after.c_iflag, before.c_iflag);
            restorer.restore().unwrap();
        }
    }

    // ── Decoding ────────────────────────────────────────────────────────

    #[test]
    fn keys_in_byte_order() {
        let events = collect(FakeSource::bytes(b"q\x1b[A\x03\x1bx"));
        assert_eq!(
            events,
            vec![
                Event::Printable('q'),
                special(Keycode::Up),
                special(Keycode::CtrlC),
                special(Keycode::AltX),
            ]
        );
    }

    #[test]
    fn lone_escape_is_one_escape() {
        assert_eq!(collect(FakeSource::bytes(&[0x1B])), vec![special(Keycode::Escape)]);
    }

    #[test]
    fn escape_then_pause_then_key() {
        let mut script = vec![Byte(0x1B)];
        script.extend([Gap; 25]);
        script.push(Byte(b'a'));
        assert_eq!(
            collect(FakeSource::new(script)),
            vec![special(Keycode::Escape), Event::Printable('a')]
        );
    }

    #[test]
    fn escape_then_quick_key_is_alt() {
        let mut script = vec![Byte(0x1B)];
        script.extend([Gap; 5]);
        script.push(Byte(b'a'));
        assert_eq!(collect(FakeSource::new(script)), vec![special(Keycode::AltA)]);
    }

    #[test]
    fn escape_after_text_waits_too() {
        let mut script = bytes(b"a\x1b");
        script.extend([Gap; 5]);
        script.extend(bytes(b"[B"));
        assert_eq!(
            collect(FakeSource::new(script)),
            vec![Event::Printable('a'), special(Keycode::Down)]
        );
    }

    #[test]
    fn sequence_split_across_reads() {
        let mut script = bytes(b"\x1b[1");
        script.extend([Gap; 3]);
        script.extend(bytes(b";5"));
        script.extend([Gap; 3]);
        script.push(Byte(b'C'));
        assert_eq!(collect(FakeSource::new(script)), vec![special(Keycode::CtrlRight)]);
    }

    #[test]
    fn abandoned_csi_is_alt_bracket() {
        assert_eq!(
            collect(FakeSource::bytes(b"\x1b[")),
            vec![special(Keycode::AltOpenBracket)]
        );
    }

    #[test]
    fn bracketed_paste_yields_only_content() {
        let events = collect(FakeSource::bytes(b"\x1b[200~ok\x1b[201~"));
        assert_eq!(events, vec![Event::Printable('o'), Event::Printable('k')]);
    }

    #[test]
    fn mouse_between_keys() {
        let mut raw = b"a".to_vec();
        raw.extend_from_slice(&[0x1B, b'[', b'M', 32, 33 + 4, 33 + 9]);
        raw.push(b'b');
        let events = collect(FakeSource::bytes(&raw));
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], Event::Printable('a'));
        let Event::Mouse(m) = &events[1] else {
            panic!("expected mouse, got {:?}", events[1]);
        };
        assert_eq!((m.column, m.row), (4, 9));
        assert_eq!(events[2], Event::Printable('b'));
    }

    #[test]
    fn garbage_is_reported_and_skipped() {
        let events = collect(FakeSource::bytes(b"\x1b[9~a"));
        assert_eq!(events, vec![Event::Invalid(b"\x1b[9~".to_vec()), Event::Printable('a')]);
    }

    #[test]
    fn garbage_split_across_reads() {
        let mut script = bytes(b"\x1b[9");
        script.push(Gap);
        script.extend(bytes(b"~a"));
        assert_eq!(
            collect(FakeSource::new(script)),
            vec![Event::Invalid(b"\x1b[9~".to_vec()), Event::Printable('a')]
        );
    }

    #[test]
    fn truncated_utf8_at_close() {
        let bytes = "é".as_bytes();
        assert_eq!(
            collect(FakeSource::bytes(&bytes[..1])),
            vec![special(Keycode::Escape)]
        );
    }

    // ── Fragmentation ───────────────────────────────────────────────────

    /// Complete inputs whose concatenation is unambiguous.
    const TOKENS: &[&[u8]] = &[
        b"a",
        b"Z",
        "é".as_bytes(),
        "日".as_bytes(),
        "🦀".as_bytes(),
        b"\x03",
        b"\t",
        b"\x7f",
        b"\x1bx",
        b"\x1bX",
        b"\x1b\x7f",
        b"\x1b\x01",
        b"\x1b[A",
        b"\x1bOD",
        b"\x1b[Z",
        b"\x1bOP",
        b"\x1b[1~",
        b"\x1b[3~",
        b"\x1b[3;3~",
        b"\x1b[6~",
        b"\x1b[15~",
        b"\x1b[24~",
        b"\x1b[1;2B",
        b"\x1b[1;5D",
        b"\x1b[200~",
        b"\x1b[201~",
        &[0x1B, b'[', b'M', 32, 40, 50],
        &[0x1B, b'[', b'M', 96, 33, 33],
        b"\x1b[9~",
    ];

    fn token_stream() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(prop::sample::select(TOKENS), 1..12).prop_map(|tokens| tokens.concat())
    }

    proptest! {
        #[test]
        fn fragmented_delivery_matches_whole(
            stream in token_stream(),
            gaps in prop::collection::vec(0usize..=5, 64),
        ) {
            let whole = collect(FakeSource::bytes(&stream));

            let mut script = Vec::new();
            for (i, &b) in stream.iter().enumerate() {
                script.push(Byte(b));
                script.extend(std::iter::repeat_n(Gap, gaps[i % gaps.len()]));
            }
            let fragmented = collect(FakeSource::new(script));

            prop_assert_eq!(fragmented, whole);
        }

        #[test]
        fn every_token_decodes_alone(index in 0..TOKENS.len()) {
            let token = TOKENS[index];
            let events = collect(FakeSource::bytes(token));
            let paste = token.starts_with(b"\x1b[20");
            prop_assert_eq!(events.len(), usize::from(!paste));
        }
    }
}
