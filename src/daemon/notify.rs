//! Desktop notifications for daemon lifecycle events. Delivery is best
//! effort: a missing notification tool should never take the tracker down.

use std::process::Command;

use tracing::{debug, warn};

/// Contract for surfacing short messages to the user.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + 'static {
    fn notify(&mut self, title: &str, body: &str);
}

/// Sends OS notifications by shelling out to the platform tool.
pub struct DesktopNotifier;

impl DesktopNotifier {
    pub fn new() -> Self {
        Self
    }

    fn command(title: &str, body: &str) -> Option<Command> {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "macos")] {
                let mut command = Command::new("osascript");
                command.arg("-e").arg(format!(
                    "display notification \"{}\" with title \"{}\"",
                    body.replace('"', "'"),
                    title.replace('"', "'")
                ));
                Some(command)
            } else if #[cfg(unix)] {
                let mut command = Command::new("notify-send");
                command.arg(title).arg(body);
                Some(command)
            } else {
                // No portable notification tool on this platform, the message
                // only goes to the log.
                let _ = (title, body);
                None
            }
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&mut self, title: &str, body: &str) {
        debug!("Notifying {title}: {body}");
        let Some(mut command) = Self::command(title, body) else {
            warn!("No notification backend available, dropping {title}: {body}");
            return;
        };

        match command.output() {
            Ok(output) if !output.status.success() => {
                warn!(
                    "Notification command failed with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr)
                )
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to run notification command {e:?}"),
        }
    }
}

/// Used when the daemon runs with `--no-notify`.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&mut self, title: &str, body: &str) {
        debug!("Notifications disabled, dropping {title}: {body}");
    }
}
