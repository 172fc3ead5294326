// SPDX-License-Identifier: MIT
//
// Keycodes: the fixed, numbered set of non-printable keys.
//
// Printable characters travel as `Event::Printable(char)`. Everything
// else (control codes, Alt combinations, arrows, function keys) is a
// `Keycode`. Numeric identity is part of the contract:
//
// - `Null..=CtrlUnderscore` equal their C0 byte (0..=31).
// - The Alt block equals the printable byte that follows ESC (32..=126),
//   so `ESC a` decodes to the keycode whose value is `b'a'`.
// - The modified-arrow block and the Ctrl+Alt block are contiguous.
//   The decoder reaches siblings by offset (`ShiftUp + 4 == CtrlUp`,
//   `CtrlAltA + 25 == CtrlAltZ`).
//
// The enum, its value table and its name table are emitted by one macro
// from one list, so discriminant `n` is always entry `n` of both tables.

use std::fmt;

use unicode_width::UnicodeWidthChar;

macro_rules! keycodes {
    ($( $(#[$meta:meta])* $variant:ident => $name:literal, )*) => {
        /// A non-printable key or key combination.
        ///
        /// Discriminants are assigned in declaration order starting at 0.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(u8)]
        pub enum Keycode {
            $( $(#[$meta])* $variant, )*
        }

        impl Keycode {
            /// Every keycode, indexed by its numeric value.
            pub const ALL: &'static [Self] = &[ $( Self::$variant, )* ];

            /// Display names, indexed by numeric value.
            const NAMES: &'static [&'static str] = &[ $( $name, )* ];
        }
    };
}

keycodes! {
    // ── C0 controls (value == byte) ─────────────────────────────
    /// Ctrl+Space.
    Null => "Null",
    CtrlA => "Ctrl+A",
    CtrlB => "Ctrl+B",
    CtrlC => "Ctrl+C",
    /// EOF in cooked mode.
    CtrlD => "Ctrl+D",
    CtrlE => "Ctrl+E",
    CtrlF => "Ctrl+F",
    CtrlG => "Ctrl+G",
    /// Some terminals send this for Ctrl+Backspace.
    CtrlH => "Ctrl+H",
    /// Ctrl+I.
    Tab => "Tab",
    /// Line feed, sometimes Enter.
    CtrlJ => "Ctrl+J",
    CtrlK => "Ctrl+K",
    CtrlL => "Ctrl+L",
    /// Carriage return, usually Enter.
    CtrlM => "Ctrl+M",
    CtrlN => "Ctrl+N",
    CtrlO => "Ctrl+O",
    CtrlP => "Ctrl+P",
    CtrlQ => "Ctrl+Q",
    CtrlR => "Ctrl+R",
    CtrlS => "Ctrl+S",
    CtrlT => "Ctrl+T",
    CtrlU => "Ctrl+U",
    CtrlV => "Ctrl+V",
    CtrlW => "Ctrl+W",
    CtrlX => "Ctrl+X",
    CtrlY => "Ctrl+Y",
    CtrlZ => "Ctrl+Z",
    /// Ctrl+[ and the Escape key itself.
    Escape => "Esc",
    CtrlBackslash => "Ctrl+\\",
    CtrlCloseBracket => "Ctrl+]",
    CtrlCaret => "Ctrl+^",
    CtrlUnderscore => "Ctrl+_",
    // ── Alt + printable (value == byte after ESC) ───────────────
    AltSpace => "Alt+Space",
    AltBang => "Alt+!",
    AltDoubleQuote => "Alt+\"",
    AltHash => "Alt+#",
    AltDollar => "Alt+$",
    AltPercent => "Alt+%",
    AltAmpersand => "Alt+&",
    AltQuote => "Alt+'",
    AltOpenParen => "Alt+(",
    AltCloseParen => "Alt+)",
    AltStar => "Alt+*",
    AltPlus => "Alt++",
    AltComma => "Alt+,",
    AltMinus => "Alt+-",
    AltPeriod => "Alt+.",
    AltSlash => "Alt+/",
    Alt0 => "Alt+0",
    Alt1 => "Alt+1",
    Alt2 => "Alt+2",
    Alt3 => "Alt+3",
    Alt4 => "Alt+4",
    Alt5 => "Alt+5",
    Alt6 => "Alt+6",
    Alt7 => "Alt+7",
    Alt8 => "Alt+8",
    Alt9 => "Alt+9",
    AltColon => "Alt+:",
    AltSemicolon => "Alt+;",
    AltLess => "Alt+<",
    AltEqual => "Alt+=",
    AltGreater => "Alt+>",
    AltQuestion => "Alt+?",
    AltAt => "Alt+@",
    AltShiftA => "Alt+A",
    AltShiftB => "Alt+B",
    AltShiftC => "Alt+C",
    AltShiftD => "Alt+D",
    AltShiftE => "Alt+E",
    AltShiftF => "Alt+F",
    AltShiftG => "Alt+G",
    AltShiftH => "Alt+H",
    AltShiftI => "Alt+I",
    AltShiftJ => "Alt+J",
    AltShiftK => "Alt+K",
    AltShiftL => "Alt+L",
    AltShiftM => "Alt+M",
    AltShiftN => "Alt+N",
    AltShiftO => "Alt+O",
    AltShiftP => "Alt+P",
    AltShiftQ => "Alt+Q",
    AltShiftR => "Alt+R",
    AltShiftS => "Alt+S",
    AltShiftT => "Alt+T",
    AltShiftU => "Alt+U",
    AltShiftV => "Alt+V",
    AltShiftW => "Alt+W",
    AltShiftX => "Alt+X",
    AltShiftY => "Alt+Y",
    AltShiftZ => "Alt+Z",
    AltOpenBracket => "Alt+[",
    AltBackslash => "Alt+\\",
    AltCloseBracket => "Alt+]",
    AltCaret => "Alt+^",
    AltUnderscore => "Alt+_",
    AltGrave => "Alt+`",
    AltA => "Alt+a",
    AltB => "Alt+b",
    AltC => "Alt+c",
    AltD => "Alt+d",
    AltE => "Alt+e",
    AltF => "Alt+f",
    AltG => "Alt+g",
    AltH => "Alt+h",
    AltI => "Alt+i",
    AltJ => "Alt+j",
    AltK => "Alt+k",
    AltL => "Alt+l",
    AltM => "Alt+m",
    AltN => "Alt+n",
    AltO => "Alt+o",
    AltP => "Alt+p",
    AltQ => "Alt+q",
    AltR => "Alt+r",
    AltS => "Alt+s",
    AltT => "Alt+t",
    AltU => "Alt+u",
    AltV => "Alt+v",
    AltW => "Alt+w",
    AltX => "Alt+x",
    AltY => "Alt+y",
    AltZ => "Alt+z",
    AltOpenBrace => "Alt+{",
    AltPipe => "Alt+|",
    AltCloseBrace => "Alt+}",
    AltTilde => "Alt+~",
    AltBackspace => "Alt+Backspace",
    // ── Extended keys ───────────────────────────────────────────
    Delete => "Delete",
    Backtab => "Backtab",
    Backspace => "Backspace",
    PageUp => "PageUp",
    PageDown => "PageDown",
    Up => "Up",
    Down => "Down",
    Right => "Right",
    Left => "Left",
    Home => "Home",
    End => "End",
    // ── Modified arrows: Shift block then Ctrl block, same order ─
    ShiftUp => "Shift+Up",
    ShiftDown => "Shift+Down",
    ShiftRight => "Shift+Right",
    ShiftLeft => "Shift+Left",
    CtrlUp => "Ctrl+Up",
    CtrlDown => "Ctrl+Down",
    CtrlRight => "Ctrl+Right",
    CtrlLeft => "Ctrl+Left",
    // ── Function keys ───────────────────────────────────────────
    F1 => "F1",
    F2 => "F2",
    F3 => "F3",
    F4 => "F4",
    F5 => "F5",
    F6 => "F6",
    F7 => "F7",
    F8 => "F8",
    F9 => "F9",
    F10 => "F10",
    F11 => "F11",
    F12 => "F12",
    AltDelete => "Alt+Delete",
    // ── Ctrl+Alt+letter (ESC followed by a C0 letter) ───────────
    CtrlAltA => "Ctrl+Alt+a",
    CtrlAltB => "Ctrl+Alt+b",
    CtrlAltC => "Ctrl+Alt+c",
    CtrlAltD => "Ctrl+Alt+d",
    CtrlAltE => "Ctrl+Alt+e",
    CtrlAltF => "Ctrl+Alt+f",
    CtrlAltG => "Ctrl+Alt+g",
    CtrlAltH => "Ctrl+Alt+h",
    CtrlAltI => "Ctrl+Alt+i",
    CtrlAltJ => "Ctrl+Alt+j",
    CtrlAltK => "Ctrl+Alt+k",
    CtrlAltL => "Ctrl+Alt+l",
    CtrlAltM => "Ctrl+Alt+m",
    CtrlAltN => "Ctrl+Alt+n",
    CtrlAltO => "Ctrl+Alt+o",
    CtrlAltP => "Ctrl+Alt+p",
    CtrlAltQ => "Ctrl+Alt+q",
    CtrlAltR => "Ctrl+Alt+r",
    CtrlAltS => "Ctrl+Alt+s",
    CtrlAltT => "Ctrl+Alt+t",
    CtrlAltU => "Ctrl+Alt+u",
    CtrlAltV => "Ctrl+Alt+v",
    CtrlAltW => "Ctrl+Alt+w",
    CtrlAltX => "Ctrl+Alt+x",
    CtrlAltY => "Ctrl+Alt+y",
    CtrlAltZ => "Ctrl+Alt+z",
}

impl Keycode {
    /// Numeric identity of this keycode.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Look up a keycode by numeric value.
    #[inline]
    #[must_use]
    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.get(usize::from(value)).copied()
    }

    /// The keycode `n` places after this one.
    ///
    /// Only meaningful inside a contiguous block (modified arrows,
    /// Ctrl+Alt letters). Returns `None` past the end of the table.
    #[inline]
    #[must_use]
    pub fn offset(self, n: u8) -> Option<Self> {
        self.value().checked_add(n).and_then(Self::from_value)
    }

    /// Human-readable name, e.g. `"Ctrl+C"`, `"Alt+x"`, `"Shift+Up"`.
    #[must_use]
    pub fn name(self) -> &'static str {
        Self::NAMES
            .get(usize::from(self.value()))
            .copied()
            .unwrap_or("?")
    }

    /// Whether this is one of the 32 C0 control keys.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        self.value() <= Self::CtrlUnderscore.value()
    }

    /// Whether this is an Alt + printable-character combination.
    #[inline]
    #[must_use]
    pub const fn is_alt_printable(self) -> bool {
        let v = self.value();
        v >= Self::AltSpace.value() && v <= Self::AltTilde.value()
    }
}

impl fmt::Display for Keycode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Block Lookups ──────────────────────────────────────────────────────────

/// Keycode for a C0 control byte (0..=31).
#[inline]
#[must_use]
pub fn control(byte: u8) -> Option<Keycode> {
    if byte <= Keycode::CtrlUnderscore.value() {
        Keycode::from_value(byte)
    } else {
        None
    }
}

/// Alt + printable character: `ESC <byte>` for `byte` in 32..=126.
#[inline]
#[must_use]
pub fn alt_printable(byte: u8) -> Option<Keycode> {
    if is_printable(byte) {
        Keycode::from_value(byte)
    } else {
        None
    }
}

/// Ctrl+Alt+letter: `ESC <byte>` for `byte` in 1..=26 (Ctrl+A..Ctrl+Z).
#[inline]
#[must_use]
pub fn ctrl_alt_letter(byte: u8) -> Option<Keycode> {
    match byte {
        1..=26 => Keycode::CtrlAltA.offset(byte - 1),
        _ => None,
    }
}

/// Shift- or Ctrl-modified arrow.
///
/// `direction` is the CSI final byte minus `b'A'`: 0 Up, 1 Down,
/// 2 Right, 3 Left. The Ctrl block sits 4 entries after the Shift block.
#[inline]
#[must_use]
pub fn modified_arrow(ctrl: bool, direction: u8) -> Option<Keycode> {
    if direction > 3 {
        return None;
    }
    let block = if ctrl { 4 } else { 0 };
    Keycode::ShiftUp.offset(block + direction)
}

/// Printable ASCII: alphanumerics, punctuation and space (32..=126).
#[inline]
#[must_use]
pub const fn is_printable(byte: u8) -> bool {
    byte >= 32 && byte <= 126
}

/// Number of terminal columns `ch` occupies.
///
/// Control characters report 0. Wide CJK and emoji report 2.
#[inline]
#[must_use]
pub fn char_width(ch: char) -> usize {
    if ch.is_control() {
        return 0;
    }
    ch.width().unwrap_or(0)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
