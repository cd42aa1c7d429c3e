//! User notifications for recoverable build errors.
//!
//! Script compile errors must not stop a running `watch`, but the developer
//! still has to see them. Tasks report them to a [`Notifier`]; the binary
//! picks [`DesktopNotifier`] and tests use a recording implementation.

use std::process::{Command, Stdio};

pub trait Notifier: Send + Sync {
    /// Surface a compile error. Must not fail.
    fn compile_error(&self, title: &str, message: &str);
}

/// Writes to stderr and the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn compile_error(&self, title: &str, message: &str) {
        tracing::error!("{title}");
        eprintln!("{title}:");
        for line in message.lines() {
            eprintln!("    {line}");
        }
    }
}

/// Shows a desktop notification when the platform offers a command for it,
/// and always logs to the console as well.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifier {
    console: ConsoleNotifier,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

/// First non-empty line of `message`, clipped for a notification bubble.
pub fn summary(message: &str) -> String {
    const MAX: usize = 200;
    let first = message
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    match first.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &first[..idx]),
        None => first.to_string(),
    }
}

fn desktop_command(title: &str, body: &str) -> Command {
    if cfg!(target_os = "macos") {
        let script = format!(
            "display notification {} with title {}",
            applescript_string(body),
            applescript_string(title)
        );
        let mut cmd = Command::new("osascript");
        cmd.arg("-e").arg(script);
        cmd
    } else {
        let mut cmd = Command::new("notify-send");
        cmd.arg(title).arg(body);
        cmd
    }
}

fn applescript_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl Notifier for DesktopNotifier {
    fn compile_error(&self, title: &str, message: &str) {
        let shown = desktop_command(title, &summary(message))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success());
        if !shown {
            tracing::debug!("desktop notification unavailable");
        }
        self.console.compile_error(title, message);
    }
}
