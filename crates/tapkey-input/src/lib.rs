// SPDX-License-Identifier: MIT
//
// tapkey-input: terminal input capture and decoding.
//
// Reads raw bytes from a terminal in raw mode on a dedicated thread and
// decodes them into key and mouse events: printable characters, control
// keys, Alt and Ctrl+Alt combinations, cursor/editing/function keys,
// Shift and Ctrl arrows, and X10 mouse reports. Bracketed paste markers
// are swallowed. Events are delivered in byte order over a bounded
// channel.
//
// The decoder (`input`) is a pure function over a byte slice, so it can
// be driven without a terminal. `session` adds the capture thread and
// the lone-ESC grace window; `terminal` owns raw mode and restore.

pub mod error;
pub mod input;
pub mod keys;
pub mod mouse;
pub mod reader;
pub mod session;
#[cfg(unix)]
pub mod terminal;

pub use error::{Error, Result};
pub use input::{Decoded, Event, decode};
pub use keys::Keycode;
pub use mouse::{Modifiers, MouseAction, MouseEvent};
pub use reader::{ByteSource, Cancel, PollPolicy};
pub use session::{CaptureState, Session, SessionConfig};
#[cfg(unix)]
pub use session::{Capture, capture};
