// SPDX-License-Identifier: MIT
//
// Error type for terminal setup, teardown and queries.
//
// Decoding never fails: unrecognized bytes surface as `Event::Invalid`.
// Everything here happens before the first event flows or after the
// last one.

use std::io;

use thiserror::Error;

/// Terminal input error.
#[derive(Error, Debug)]
pub enum Error {
    /// The descriptor is not connected to a terminal.
    #[error("not a terminal")]
    NotATty,

    /// Saving the terminal state failed.
    #[error("failed to read terminal state: {0}")]
    GetState(#[source] io::Error),

    /// Switching to raw mode failed.
    #[error("failed to enter raw mode: {0}")]
    SetRaw(#[source] io::Error),

    /// Restoring the saved terminal state failed.
    #[error("failed to restore terminal state: {0}")]
    Restore(#[source] io::Error),

    /// The capture thread could not be started.
    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[source] io::Error),

    /// The terminal answered a cursor position query with garbage.
    #[error("malformed cursor position report: {0:?}")]
    CursorReport(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for terminal operations.
pub type Result<T> = std::result::Result<T, Error>;
