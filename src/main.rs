// SPDX-License-Identifier: MIT
//
// tapkey: shows what the terminal sends.
//
// Switches to the alternate screen, turns on mouse reporting, prints an
// underlined "Welcome" in the middle of the screen and then, for every
// decoded event, a running count and the event's name in the top-left
// corner:
//
//   row 1  keys (printable, named specials, invalid sequences)
//   row 2  mouse reports
//
// Ctrl-C or Escape quits. Logs go to a file because the terminal itself
// is busy; set RUST_LOG=trace to see every decoded event.
//
// Teardown is by drop order: the `Capture` (raw mode) is created after
// the `Screen` (output modes), so it is dropped first and the terminal is
// back in cooked mode before the normal screen reappears.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::{info, warn};

use tapkey_ansi::{MouseMotion, OutputBuffer, ScreenMode, TextStyle, ansi, color};
use tapkey_input::{Event, Keycode, PollPolicy, SessionConfig};

// ─── Command Line ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Motion {
    /// Clicks and wheel only.
    None,
    /// Also motion while a button is held.
    Drag,
    /// All motion.
    All,
}

impl From<Motion> for MouseMotion {
    fn from(m: Motion) -> Self {
        match m {
            Motion::None => Self::None,
            Motion::Drag => Self::OnDrag,
            Motion::All => Self::All,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "tapkey", version, about = "Show the keys and mouse events your terminal sends")]
struct Args {
    /// Mouse motion to report.
    #[arg(long, value_enum, default_value_t = Motion::All)]
    motion: Motion,

    /// How long a lone Escape waits for the rest of a sequence.
    #[arg(long, default_value_t = 100, value_name = "MS")]
    grace_ms: u64,

    /// Sleep between polls while waiting.
    #[arg(long, default_value_t = 5, value_name = "MS")]
    poll_ms: u64,

    /// Where to write logs.
    #[arg(long, default_value = "/tmp/tapkey.log")]
    log_file: PathBuf,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        let poll_ms = self.poll_ms.max(1);
        SessionConfig {
            policy: PollPolicy {
                interval: Duration::from_millis(poll_ms),
                grace_retries: u32::try_from(self.grace_ms / poll_ms).unwrap_or(u32::MAX),
            },
            ..SessionConfig::default()
        }
    }
}

fn init_logging(path: &Path) -> anyhow::Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();
    Ok(())
}

// ─── Screen ─────────────────────────────────────────────────────────────────

const WELCOME: &str = "Welcome";

/// Output modes held for the life of the program, undone on drop.
struct Screen {
    out: OutputBuffer,
    motion: MouseMotion,
}

impl Screen {
    fn enter(motion: MouseMotion, cols: u16, rows: u16) -> std::io::Result<Self> {
        let mut out = OutputBuffer::new();
        let half = u16::try_from(WELCOME.len() / 2).unwrap_or(0);
        let x = (cols / 2).saturating_sub(half);
        let y = rows / 2;

        ansi::screen(&mut out, ScreenMode::Alternate)?;
        ansi::move_to(&mut out, x, y)?;
        ansi::cursor_hide(&mut out)?;
        ansi::mouse_enable(&mut out, motion)?;
        color::write_effect(&mut out, &[TextStyle::Underline.into()])?;
        out.text(WELCOME);
        color::write_effect(&mut out, &[TextStyle::Reset.into()])?;
        out.flush_stdout()?;

        Ok(Self { out, motion })
    }

    fn show(&mut self, count: u64, event: &Event) -> std::io::Result<()> {
        ansi::origin(&mut self.out)?;
        if matches!(event, Event::Mouse(_)) {
            ansi::down(&mut self.out, 1)?;
        }
        ansi::clear_line_right(&mut self.out)?;
        self.out.text(&format!("{count:06} {event}"));
        self.out.flush_stdout()
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let restore = |out: &mut OutputBuffer, motion| -> std::io::Result<()> {
            ansi::mouse_disable(out, motion)?;
            ansi::screen(out, ScreenMode::Normal)?;
            ansi::cursor_show(out)?;
            out.flush_stdout()
        };
        if let Err(err) = restore(&mut self.out, self.motion) {
            warn!("failed to restore screen: {err}");
        }
    }
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn quits(event: &Event) -> bool {
    matches!(event, Event::Special(Keycode::CtrlC | Keycode::Escape))
}

#[cfg(unix)]
fn main() -> anyhow::Result<()> {
    use std::os::unix::io::AsRawFd;

    let args = Args::parse();
    init_logging(&args.log_file)?;
    info!("starting tapkey with {args:?}");

    let stdin = std::io::stdin().as_raw_fd();
    let size = tapkey_input::terminal::size(stdin);

    let mut screen = Screen::enter(args.motion.into(), size.cols, size.rows)
        .context("failed to set up the screen")?;
    let capture = tapkey_input::capture(stdin, args.session_config())
        .context("failed to capture terminal input")?;

    let mut count = 0u64;
    for event in capture.session().iter() {
        count += 1;
        screen.show(count, &event).context("failed to draw")?;
        if quits(&event) {
            info!("quit on {event}");
            break;
        }
    }

    capture.finish().context("failed to restore the terminal")?;
    info!("{count} events");
    Ok(())
}

#[cfg(not(unix))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("tapkey needs a Unix terminal")
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_args() {
        let args = Args::try_parse_from(["tapkey"]).unwrap();
        assert_eq!(args.motion, Motion::All);
        assert_eq!(args.session_config(), SessionConfig::default());
    }

    #[test]
    fn grace_and_poll_map_onto_policy() {
        let args = Args::try_parse_from(["tapkey", "--grace-ms", "50", "--poll-ms", "10"]).unwrap();
        let policy = args.session_config().policy;
        assert_eq!(policy.interval, Duration::from_millis(10));
        assert_eq!(policy.grace_retries, 5);
        assert_eq!(policy.grace_window(), Duration::from_millis(50));
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let args = Args::try_parse_from(["tapkey", "--poll-ms", "0"]).unwrap();
        assert_eq!(args.session_config().policy.interval, Duration::from_millis(1));
    }

    #[test]
    fn motion_flag() {
        let args = Args::try_parse_from(["tapkey", "--motion", "drag"]).unwrap();
        assert_eq!(MouseMotion::from(args.motion), MouseMotion::OnDrag);
        assert!(Args::try_parse_from(["tapkey", "--motion", "sideways"]).is_err());
    }

    #[test]
    fn ctrl_c_and_escape_quit() {
        assert!(quits(&Event::Special(Keycode::CtrlC)));
        assert!(quits(&Event::Special(Keycode::Escape)));
        assert!(!quits(&Event::Special(Keycode::AltX)));
        assert!(!quits(&Event::Printable('q')));
    }
}
