// SPDX-License-Identifier: MIT
//
// Terminal input decoder.
//
// Classifies the head of a byte buffer into one event and reports how
// many bytes it used. Handles:
//
// - C0 control codes (Ctrl+letter, Tab, Enter, ...)
// - UTF-8 printable characters
// - Alt+key (ESC followed by a printable byte) and Ctrl+Alt+letter
// - CSI / SS3 cursor keys, Home/End, Backtab, F1-F4
// - Numeric CSI tails: editing keys, F5-F12, Shift/Ctrl arrows
// - Bracketed paste markers (swallowed, the pasted text decodes normally)
// - X10 mouse reports (handed to `mouse::decode_report`)
//
// # Incomplete input
//
// There are no terminators on the wire, so a buffer may end in the
// middle of a sequence. `decode` always answers (a lone ESC is the
// Escape key, `ESC [` is Alt+[), which is only correct once no more
// bytes are coming. `is_partial` tells the caller that waiting a little
// longer could change the answer; the capture loop uses it to top the
// buffer up before committing.

use std::fmt;

use crate::keys::{self, Keycode};
use crate::mouse::{self, MouseEvent, REPORT_LEN};

const ESC: u8 = 0x1B;
const DEL: u8 = 0x7F;

// ─── Event Types ────────────────────────────────────────────────────────────

/// A decoded terminal input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A printable character.
    Printable(char),
    /// A control key, editing/navigation/function key, or modified combination.
    Special(Keycode),
    /// A mouse report.
    Mouse(MouseEvent),
    /// Unrecognized or malformed bytes, kept for diagnostics. Holds the
    /// [`malformed_len`] run at the head of the buffer.
    Invalid(Vec<u8>),
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Printable(ch) => write!(f, "{ch}"),
            Self::Special(key) => f.write_str(key.name()),
            Self::Mouse(m) => write!(
                f,
                "Mouse {:?} button {} at ({}, {})",
                m.action(),
                m.button,
                m.column,
                m.row
            ),
            Self::Invalid(raw) => write!(f, "Invalid {raw:02x?}"),
        }
    }
}

/// Outcome of one [`decode`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Nothing to decode: the buffer is empty.
    Exhausted,
    /// One event. `consumed` is 0 only for [`Event::Invalid`], meaning the
    /// bytes were not consumed; see [`malformed_len`].
    Event { event: Event, consumed: usize },
    /// A sequence that carries no event (bracketed paste markers).
    Discarded(usize),
}

// ─── Classification ─────────────────────────────────────────────────────────

/// Internal verdict before the "no more input is coming" fallbacks.
enum Step {
    Done(Event, usize),
    Discard(usize),
    /// Strict prefix of a known sequence.
    Partial,
    Malformed,
}

const fn key(code: Keycode, consumed: usize) -> Step {
    Step::Done(Event::Special(code), consumed)
}

/// Decode one event from the head of `buf`.
///
/// Never consumes more than `buf.len()` bytes.
#[must_use]
pub fn decode(buf: &[u8]) -> Decoded {
    if buf.is_empty() {
        return Decoded::Exhausted;
    }

    match classify(buf) {
        Step::Done(event, consumed) => Decoded::Event { event, consumed },
        Step::Discard(n) => Decoded::Discarded(n),
        Step::Partial => settle_partial(buf),
        Step::Malformed => invalid(buf),
    }
}

/// Whether more bytes could still change what `buf` decodes to.
///
/// True for a lone ESC, `ESC [`, an unterminated CSI run, a mouse
/// report missing payload bytes, and a truncated UTF-8 code point.
#[must_use]
pub fn is_partial(buf: &[u8]) -> bool {
    if buf.is_empty() {
        return false;
    }
    matches!(classify(buf), Step::Partial) || is_unterminated_csi(buf)
}

/// How many bytes to drop when an [`Event::Invalid`] is final.
///
/// For a CSI / SS3 run: through the first final byte (0x40..=0x7E), or up
/// to the first byte that cannot belong to the sequence. Otherwise 1.
/// At least 1 for any non-empty buffer.
#[must_use]
pub fn malformed_len(buf: &[u8]) -> usize {
    match buf {
        [] => 0,
        [ESC, b'[' | b'O', rest @ ..] => {
            for (i, &b) in rest.iter().enumerate() {
                if (0x40..=0x7E).contains(&b) {
                    return i + 3;
                }
                if !(0x20..=0x3F).contains(&b) {
                    return i + 2;
                }
            }
            buf.len()
        }
        _ => 1,
    }
}

fn classify(buf: &[u8]) -> Step {
    match buf[0] {
        ESC => classify_escape(buf),
        DEL => key(Keycode::Backspace, 1),
        // Null, Ctrl+A..Z and the rest of C0. Ctrl+C / Ctrl+G / Ctrl+Q are
        // plain controls here; the consumer decides what they mean.
        b @ 0x00..=0x1F => keys::control(b).map_or(Step::Malformed, |k| key(k, 1)),
        _ => classify_utf8(buf),
    }
}

fn settle_partial(buf: &[u8]) -> Decoded {
    let special = |code, consumed| Decoded::Event {
        event: Event::Special(code),
        consumed,
    };
    match buf {
        [ESC] => special(Keycode::Escape, 1),
        [ESC, b'['] => special(Keycode::AltOpenBracket, 2),
        [ESC, b'O'] => special(Keycode::AltShiftO, 2),
        [ESC, ..] => invalid(buf),
        // Truncated UTF-8.
        _ => special(Keycode::Escape, 1),
    }
}

/// The unrecognized run only, so the event does not depend on what
/// happens to follow it in the buffer.
fn invalid(buf: &[u8]) -> Decoded {
    Decoded::Event {
        event: Event::Invalid(buf[..malformed_len(buf)].to_vec()),
        consumed: 0,
    }
}

fn is_unterminated_csi(buf: &[u8]) -> bool {
    match buf {
        [ESC, b'[' | b'O', rest @ ..] => rest.iter().all(|b| (0x20..=0x3F).contains(b)),
        _ => false,
    }
}

// ── UTF-8 ──────────────────────────────────────────────────────────────────

fn classify_utf8(buf: &[u8]) -> Step {
    let expected = utf8_char_len(buf[0]);
    if expected == 0 {
        return key(Keycode::Escape, 1);
    }

    let head = &buf[..buf.len().min(expected)];
    match std::str::from_utf8(head) {
        Ok(s) => s
            .chars()
            .next()
            .map_or(key(Keycode::Escape, 1), |ch| Step::Done(Event::Printable(ch), expected)),
        // Valid so far, just short.
        Err(e) if e.error_len().is_none() => Step::Partial,
        Err(_) => key(Keycode::Escape, 1),
    }
}

/// Expected byte length of a UTF-8 sequence from its lead byte (0 if invalid).
const fn utf8_char_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

// ── Escape sequences ────────────────────────────────────────────────────────

fn classify_escape(buf: &[u8]) -> Step {
    debug_assert_eq!(buf[0], ESC);

    let Some(&next) = buf.get(1) else {
        return Step::Partial;
    };

    match next {
        // Two escapes collapse into one Escape key.
        ESC => key(Keycode::Escape, 2),
        DEL => key(Keycode::AltBackspace, 2),
        b'[' | b'O' => classify_csi(buf),
        b @ 1..=26 => keys::ctrl_alt_letter(b).map_or(Step::Malformed, |k| key(k, 2)),
        b => keys::alt_printable(b).map_or(Step::Malformed, |k| key(k, 2)),
    }
}

// ── CSI / SS3 ───────────────────────────────────────────────────────────────

fn classify_csi(buf: &[u8]) -> Step {
    let Some(&b) = buf.get(2) else {
        return Step::Partial;
    };

    match b {
        b'A' => key(Keycode::Up, 3),
        b'B' => key(Keycode::Down, 3),
        b'C' => key(Keycode::Right, 3),
        b'D' => key(Keycode::Left, 3),
        b'Z' => key(Keycode::Backtab, 3),
        b'H' => key(Keycode::Home, 3),
        b'F' => key(Keycode::End, 3),
        b'P' => key(Keycode::F1, 3),
        b'Q' => key(Keycode::F2, 3),
        b'R' => key(Keycode::F3, 3),
        b'S' => key(Keycode::F4, 3),
        b'M' => classify_mouse(buf),
        b'1'..=b'6' => classify_numeric(&buf[2..]),
        _ => Step::Malformed,
    }
}

fn classify_mouse(buf: &[u8]) -> Step {
    match buf.first_chunk::<REPORT_LEN>() {
        Some(report) => Step::Done(Event::Mouse(mouse::decode_report(report)), REPORT_LEN),
        None => Step::Partial,
    }
}

// ── Numeric tails ──────────────────────────────────────────────────────────

/// What a numeric CSI tail stands for.
#[derive(Clone, Copy)]
enum Tail {
    Key(Keycode),
    PasteMarker,
}

/// Numeric tails after `ESC [`, all `~`-terminated.
///
/// No entry is a prefix of another, so the first `starts_with` match is
/// the only match.
const NUMERIC_TAILS: &[(&[u8], Tail)] = &[
    (b"1~", Tail::Key(Keycode::Home)),
    (b"15~", Tail::Key(Keycode::F5)),
    (b"17~", Tail::Key(Keycode::F6)),
    (b"18~", Tail::Key(Keycode::F7)),
    (b"19~", Tail::Key(Keycode::F8)),
    (b"20~", Tail::Key(Keycode::F9)),
    (b"21~", Tail::Key(Keycode::F10)),
    (b"23~", Tail::Key(Keycode::F11)),
    (b"24~", Tail::Key(Keycode::F12)),
    (b"200~", Tail::PasteMarker),
    (b"201~", Tail::PasteMarker),
    (b"3~", Tail::Key(Keycode::Delete)),
    (b"3;3~", Tail::Key(Keycode::AltDelete)),
    (b"4~", Tail::Key(Keycode::End)),
    (b"5~", Tail::Key(Keycode::PageUp)),
    (b"6~", Tail::Key(Keycode::PageDown)),
];

/// `tail` is everything after `ESC [`, starting with a digit.
fn classify_numeric(tail: &[u8]) -> Step {
    for &(seq, meaning) in NUMERIC_TAILS {
        if tail.starts_with(seq) {
            let consumed = seq.len() + 2;
            return match meaning {
                Tail::Key(k) => key(k, consumed),
                Tail::PasteMarker => {
                    log::debug!("bracketed paste marker {:?}", String::from_utf8_lossy(seq));
                    Step::Discard(consumed)
                }
            };
        }
    }

    // `1;2A` (Shift) and `1;5A` (Ctrl), final byte picks the direction.
    match tail {
        [b'1', b';', m @ (b'2' | b'5'), dir @ b'A'..=b'D', ..] => {
            keys::modified_arrow(*m == b'5', dir - b'A').map_or(Step::Malformed, |k| key(k, 6))
        }
        [b'1'] | [b'1', b';'] | [b'1', b';', b'2' | b'5'] => Step::Partial,
        _ if NUMERIC_TAILS.iter().any(|(seq, _)| seq.starts_with(tail)) => Step::Partial,
        _ => Step::Malformed,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
