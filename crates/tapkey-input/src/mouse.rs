// SPDX-License-Identifier: MIT
//
// X10/normal mouse reports: `ESC [ M <button> <x> <y>`.
//
// Each payload byte is offset so it stays printable: the button byte by
// 32, the coordinates by 33 (32 plus the 1-based origin). Coordinates
// past 222 cannot be reported.
//
// Bit layout of `button - 32`:
//
//   bits 0-1  button (0 primary, 1 middle, 2 right, 3 release)
//   bit  2    shift
//   bit  3    meta / alt
//   bit  4    ctrl
//   bit  5    motion
//   bit  6    wheel (button number += 4)

use bitflags::bitflags;

/// Length of a complete report, introducer included.
pub const REPORT_LEN: usize = 6;

bitflags! {
    /// Modifier keys held during a mouse action.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0000_0100;
        const META  = 0b0000_1000;
        const CTRL  = 0b0001_0000;
    }
}

/// Button number reported for a release (and for motion with no button).
pub const BUTTON_RELEASE: u8 = 3;

/// A decoded mouse report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseEvent {
    /// 0-indexed row.
    pub row: u16,
    /// 0-indexed column.
    pub column: u16,
    /// 0 primary, 1 middle, 2 right, 3 release, 4 scroll up, 5 scroll down.
    pub button: u8,
    /// Shift / meta / ctrl held.
    pub modifiers: Modifiers,
    /// Set for drag and move reports, clear for discrete clicks.
    pub motion: bool,
    /// The bytes this report was decoded from.
    pub raw: Vec<u8>,
}

/// What the user did, derived from `(button, motion)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Press,
    Release,
    Drag,
    Move,
    ScrollUp,
    ScrollDown,
    ScrollLeft,
    ScrollRight,
}

impl MouseEvent {
    /// Classify the report.
    ///
    /// Wheel buttons win over the motion bit.
    #[must_use]
    pub const fn action(&self) -> MouseAction {
        match (self.button, self.motion) {
            (4, _) => MouseAction::ScrollUp,
            (5, _) => MouseAction::ScrollDown,
            (6, _) => MouseAction::ScrollLeft,
            (7, _) => MouseAction::ScrollRight,
            (BUTTON_RELEASE, false) => MouseAction::Release,
            (BUTTON_RELEASE, true) => MouseAction::Move,
            (_, false) => MouseAction::Press,
            (_, true) => MouseAction::Drag,
        }
    }

    #[inline]
    #[must_use]
    pub const fn shift(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn meta(&self) -> bool {
        self.modifiers.contains(Modifiers::META)
    }

    #[inline]
    #[must_use]
    pub const fn ctrl(&self) -> bool {
        self.modifiers.contains(Modifiers::CTRL)
    }
}

/// Decode a complete `ESC [ M b x y` report.
///
/// The caller has already matched the three-byte introducer; only the
/// payload bytes are inspected here.
#[must_use]
pub fn decode_report(report: &[u8; REPORT_LEN]) -> MouseEvent {
    let code = report[3].wrapping_sub(32);

    let mut button = code & 0b11;
    if code & (1 << 6) != 0 {
        button += 4;
    }

    MouseEvent {
        row: u16::from(report[5]).saturating_sub(33),
        column: u16::from(report[4]).saturating_sub(33),
        button,
        modifiers: Modifiers::from_bits_truncate(code),
        motion: code & (1 << 5) != 0,
        raw: report.to_vec(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
