// SPDX-License-Identifier: MIT
//
// SGR text effects: styles and colors.
//
// Every effect knows its SGR parameter string ("1", "31", "38;5;234",
// "48;2;r;g;b"). `effect()` joins any mix of them into one
// `ESC [ ... m` sequence; an empty list is `ESC [ m`, which resets.
//
// Styles and colors also implement `Display` as a complete sequence, so
// they drop straight into `format!`: `format!("{}OK", BasicColor::Green)`.

use std::fmt::{self, Write as _};
use std::io::{self, Write};

// ─── Text Styles ────────────────────────────────────────────────────────────

/// SGR text styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TextStyle {
    Reset = 0,
    Bold = 1,
    Dim = 2,
    Italic = 3,
    Underline = 4,
    Blink = 5,
    FastBlink = 6,
    Reverse = 7,
    Hidden = 8,
    Strikethrough = 9,
    // Rarely supported.
    Fraktur = 20,
    DoubleUnderline = 21,
    Framed = 51,
    Encircled = 52,
    Overlined = 53,
}

impl TextStyle {
    /// The SGR parameter.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for TextStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[{}m", self.code())
    }
}

// ─── Colors ─────────────────────────────────────────────────────────────────

/// The eight standard terminal colors, as foreground SGR codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BasicColor {
    Black = 30,
    Red = 31,
    Green = 32,
    Yellow = 33,
    Blue = 34,
    Magenta = 35,
    Cyan = 36,
    White = 37,
}

impl BasicColor {
    /// Foreground SGR code (30-37). Background is this plus 10.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// A terminal color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    /// One of the eight standard colors.
    Basic(BasicColor),
    /// 8-bit palette: 0-15 standard and bright, 16-231 color cube,
    /// 232-255 grayscale.
    Indexed(u8),
    /// 24-bit truecolor.
    Rgb(u8, u8, u8),
}

impl Color {
    /// Truecolor from a packed `0xRRGGBB` value. Bits above 24 are ignored.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_hex(hex: u32) -> Self {
        Self::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    /// This color as a background effect.
    #[inline]
    #[must_use]
    pub const fn on(self) -> Effect {
        Effect::Background(self)
    }

    fn params(self, out: &mut String, background: bool) {
        // Writing to a String cannot fail.
        let _ = match self {
            Self::Basic(c) => write!(out, "{}", c.code() + if background { 10 } else { 0 }),
            Self::Indexed(n) => write!(out, "{};5;{n}", if background { 48 } else { 38 }),
            Self::Rgb(r, g, b) => write!(out, "{};2;{r};{g};{b}", if background { 48 } else { 38 }),
        };
    }
}

impl From<BasicColor> for Color {
    fn from(c: BasicColor) -> Self {
        Self::Basic(c)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&effect(&[Effect::Foreground(*self)]))
    }
}

impl fmt::Display for BasicColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Color::Basic(*self), f)
    }
}

// ─── Effects ────────────────────────────────────────────────────────────────

/// Anything that can go in one SGR sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    Style(TextStyle),
    Foreground(Color),
    Background(Color),
}

impl Effect {
    fn params(self, out: &mut String) {
        match self {
            Self::Style(s) => {
                let _ = write!(out, "{}", s.code());
            }
            Self::Foreground(c) => c.params(out, false),
            Self::Background(c) => c.params(out, true),
        }
    }
}

impl From<TextStyle> for Effect {
    fn from(s: TextStyle) -> Self {
        Self::Style(s)
    }
}

impl From<Color> for Effect {
    fn from(c: Color) -> Self {
        Self::Foreground(c)
    }
}

impl From<BasicColor> for Effect {
    fn from(c: BasicColor) -> Self {
        Self::Foreground(Color::Basic(c))
    }
}

/// One SGR sequence applying every effect in order.
///
/// `effect(&[])` is `"\x1b[m"`, a full reset.
#[must_use]
pub fn effect(effects: &[Effect]) -> String {
    let mut out = String::from("\x1b[");
    for (i, e) in effects.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        e.params(&mut out);
    }
    out.push('m');
    out
}

/// One SGR sequence applying every style in order.
#[must_use]
pub fn style(styles: &[TextStyle]) -> String {
    let effects: Vec<Effect> = styles.iter().copied().map(Effect::from).collect();
    effect(&effects)
}

/// Write [`effect`] to `w`.
///
/// # Errors
///
/// Propagates the writer's error.
pub fn write_effect(w: &mut impl Write, effects: &[Effect]) -> io::Result<()> {
    w.write_all(effect(effects).as_bytes())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
