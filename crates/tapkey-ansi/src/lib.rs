// SPDX-License-Identifier: MIT
//
// tapkey-ansi: ANSI output encoding.
//
// Cursor movement, clearing, cursor visibility and shape, the alternate
// screen, mouse reporting modes, and SGR styles and colors (8 basic,
// 8-bit indexed, 24-bit truecolor). Everything is a free function on
// `impl Write` in `ansi` and `color`; `output` adds an immediate-mode
// `Writer` and a frame-at-a-time `OutputBuffer`.

pub mod ansi;
pub mod color;
pub mod output;

pub use ansi::{CursorShape, MouseMotion, ScreenMode};
pub use color::{BasicColor, Color, Effect, TextStyle, effect, style};
pub use output::{OutputBuffer, Writer, sanitize};
