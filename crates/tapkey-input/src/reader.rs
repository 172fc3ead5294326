// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Frame reader: collects raw bytes from a byte source into the decoder
// buffer, one frame at a time.
//
// A frame starts with a blocking read of one byte and then keeps reading
// without blocking for as long as bytes are immediately available. An
// escape sequence normally arrives in one burst, so this is usually the
// whole sequence.
//
// ESC is the exception. A lone ESC is the Escape key, but it is also the
// first byte of every escape sequence, and over a slow link the rest of
// the sequence may trail behind. After an ESC the reader keeps polling
// for a short grace window (`PollPolicy::grace_window`) before deciding
// the frame is over.
//
// Shutdown: `FdSource` waits for its first byte with `poll()` in short
// slices and checks a `Cancel` flag between them, so a capture thread
// parked on an idle terminal notices a stop request within one slice.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const ESC: u8 = 0x1B;

// ─── Byte Source ────────────────────────────────────────────────────────────

/// Where input bytes come from.
///
/// Read failures are reported as "no byte", never as errors.
pub trait ByteSource: Send {
    /// Wait for the next byte. `None` means the source is closed (or the
    /// wait was cancelled).
    fn read_blocking(&mut self) -> Option<u8>;

    /// The next byte if one is available right now.
    fn read_nonblocking(&mut self) -> Option<u8>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_blocking(&mut self) -> Option<u8> {
        (**self).read_blocking()
    }

    fn read_nonblocking(&mut self) -> Option<u8> {
        (**self).read_nonblocking()
    }
}

// ─── Cancellation ───────────────────────────────────────────────────────────

/// Shared stop flag between a capture session and its byte source.
#[derive(Debug, Clone, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ─── Poll Policy ────────────────────────────────────────────────────────────

/// Timing of the non-blocking poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between empty polls.
    pub interval: Duration,
    /// Empty polls tolerated after an ESC before the frame ends.
    pub grace_retries: u32,
}

impl PollPolicy {
    /// How long a lone ESC waits for a follow-up byte.
    #[must_use]
    pub fn grace_window(&self) -> Duration {
        self.interval * self.grace_retries
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5),
            grace_retries: 20,
        }
    }
}

/// How the poll loop sleeps.
pub trait Pause: Send {
    fn pause(&mut self, duration: Duration);
}

/// Production [`Pause`]: sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&mut self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

// ─── Frame Reader ───────────────────────────────────────────────────────────

/// Result of one [`FrameReader::fill`] or [`FrameReader::top_up`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    /// Bytes appended to the buffer.
    pub read: usize,
    /// The frame ended by running out an armed grace window, so the input
    /// genuinely paused after the last byte.
    pub settled: bool,
}

/// Reads bursts of bytes from a [`ByteSource`].
pub struct FrameReader<S, P = ThreadPause> {
    source: S,
    pause: P,
    policy: PollPolicy,
}

impl<S: ByteSource> FrameReader<S> {
    #[must_use]
    pub fn new(source: S, policy: PollPolicy) -> Self {
        Self::with_pause(source, ThreadPause, policy)
    }
}

impl<S: ByteSource, P: Pause> FrameReader<S, P> {
    #[must_use]
    pub const fn with_pause(source: S, pause: P, policy: PollPolicy) -> Self {
        Self {
            source,
            pause,
            policy,
        }
    }

    #[inline]
    #[must_use]
    pub const fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Read one frame into `buf`.
    ///
    /// Blocks for the first byte. Returns `read == 0` with `buf` untouched
    /// when the source is closed.
    pub fn fill(&mut self, buf: &mut Vec<u8>) -> Fill {
        let Some(first) = self.source.read_blocking() else {
            return Fill {
                read: 0,
                settled: false,
            };
        };
        buf.push(first);

        let retries = if first == ESC {
            self.policy.grace_retries
        } else {
            0
        };
        let mut fill = self.poll(buf, retries, first);
        fill.read += 1;
        fill
    }

    /// Keep reading onto the end of `buf` without blocking, allowing a full
    /// grace window before the first byte.
    ///
    /// For a buffer that ends in the middle of a sequence.
    pub fn top_up(&mut self, buf: &mut Vec<u8>) -> Fill {
        let prev = buf.last().copied().unwrap_or(0);
        self.poll(buf, self.policy.grace_retries, prev)
    }

    fn poll(&mut self, buf: &mut Vec<u8>, mut retries: u32, mut prev: u8) -> Fill {
        let mut read = 0;
        let mut waited = false;

        loop {
            match self.source.read_nonblocking() {
                Some(byte) => {
                    // An ESC after a non-ESC may be a new lone Escape: wait
                    // for its follow-up too.
                    retries = if byte == ESC && prev != ESC {
                        self.policy.grace_retries
                    } else {
                        0
                    };
                    buf.push(byte);
                    prev = byte;
                    read += 1;
                    waited = false;
                }
                None if retries > 0 => {
                    retries -= 1;
                    waited = true;
                    self.pause.pause(self.policy.interval);
                }
                None => {
                    return Fill {
                        read,
                        settled: waited,
                    };
                }
            }
        }
    }
}

// ─── File Descriptor Source ─────────────────────────────────────────────────

/// How long one `poll()` slice waits before re-checking the cancel flag
/// (milliseconds).
#[cfg(unix)]
const POLL_SLICE_MS: i32 = 50;

/// [`ByteSource`] over a raw file descriptor, usually stdin.
///
/// Puts the descriptor in non-blocking mode for its lifetime and puts the
/// original flags back on drop.
#[cfg(unix)]
pub struct FdSource {
    fd: std::os::unix::io::RawFd,
    original_flags: libc::c_int,
    cancel: Cancel,
}

#[cfg(unix)]
impl FdSource {
    /// Wrap `fd`. Blocking reads give up once `cancel` is set.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the descriptor flags cannot be changed.
    pub fn new(fd: std::os::unix::io::RawFd, cancel: Cancel) -> std::io::Result<Self> {
        let original_flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if original_flags < 0 {
            return Err(std::io::Error::last_os_error());
        }
        if unsafe { libc::fcntl(fd, libc::F_SETFL, original_flags | libc::O_NONBLOCK) } < 0 {
            return Err(std::io::Error::last_os_error());
        }

        Ok(Self {
            fd,
            original_flags,
            cancel,
        })
    }

    /// One `read(2)` of a single byte.
    ///
    /// `Ok(None)` is end of file, `Err(true)` means "try again later".
    fn read_byte(&self) -> Result<Option<u8>, bool> {
        let mut byte = 0u8;
        let n = unsafe { libc::read(self.fd, (&raw mut byte).cast(), 1) };
        match n {
            1 => Ok(Some(byte)),
            0 => Ok(None),
            _ => {
                let err = std::io::Error::last_os_error();
                Err(matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
                ))
            }
        }
    }
}

/// What one `poll()` result means for a blocking read.
#[cfg(unix)]
#[derive(Debug)]
enum Wait {
    Ready,
    /// Timeout or EINTR: re-check the cancel flag and poll again.
    Retry,
    Failed(std::io::Error),
}

#[cfg(unix)]
fn poll_outcome(ready: libc::c_int, last_error: impl FnOnce() -> std::io::Error) -> Wait {
    match ready {
        1.. => Wait::Ready,
        0 => Wait::Retry,
        _ => {
            let err = last_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                Wait::Retry
            } else {
                Wait::Failed(err)
            }
        }
    }
}

#[cfg(unix)]
impl ByteSource for FdSource {
    fn read_blocking(&mut self) -> Option<u8> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }

            let ready = unsafe {
                let mut pfd = libc::pollfd {
                    fd: self.fd,
                    events: libc::POLLIN,
                    revents: 0,
                };
                libc::poll(&raw mut pfd, 1, POLL_SLICE_MS)
            };

            match poll_outcome(ready, std::io::Error::last_os_error) {
                Wait::Ready => {}
                Wait::Retry => continue,
                Wait::Failed(err) => {
                    log::warn!("poll on fd {} failed: {err}", self.fd);
                    return None;
                }
            }

            match self.read_byte() {
                Ok(byte) => return byte,
                Err(true) => {}
                Err(false) => return None,
            }
        }
    }

    fn read_nonblocking(&mut self) -> Option<u8> {
        self.read_byte().ok().flatten()
    }
}

#[cfg(unix)]
impl Drop for FdSource {
    fn drop(&mut self) {
        unsafe {
            let _ = libc::fcntl(self.fd, libc::F_SETFL, self.original_flags);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::{ByteSource, Pause};

    /// One step of a scripted byte stream.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Chunk {
        Byte(u8),
        /// A non-blocking read that finds nothing.
        Gap,
    }

    /// Replays a fixed script. Blocking reads skip gaps; the script running
    /// out closes the source.
    #[derive(Debug, Default)]
    pub struct FakeSource {
        script: VecDeque<Chunk>,
    }

    impl FakeSource {
        pub fn new(script: impl IntoIterator<Item = Chunk>) -> Self {
            Self {
                script: script.into_iter().collect(),
            }
        }

        /// All bytes back to back, no gaps.
        pub fn bytes(bytes: &[u8]) -> Self {
            Self::new(bytes.iter().copied().map(Chunk::Byte))
        }
    }

    impl ByteSource for FakeSource {
        fn read_blocking(&mut self) -> Option<u8> {
            loop {
                match self.script.pop_front()? {
                    Chunk::Byte(b) => return Some(b),
                    Chunk::Gap => {}
                }
            }
        }

        fn read_nonblocking(&mut self) -> Option<u8> {
            match self.script.pop_front()? {
                Chunk::Byte(b) => Some(b),
                Chunk::Gap => None,
            }
        }
    }

    /// Counts pauses instead of sleeping.
    #[derive(Debug, Clone, Default)]
    pub struct CountingPause(pub Arc<AtomicUsize>);

    impl CountingPause {
        pub fn count(&self) -> usize {
            self.0.load(Ordering::Relaxed)
        }
    }

    impl Pause for CountingPause {
        fn pause(&mut self, _duration: Duration) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }
}
