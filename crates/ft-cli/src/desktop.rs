//! Linux desktop collaborators: foreground window probe and notifier.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use ft_core::{ApplicationIdentity, ForegroundProbe, Notification, Notifier, NotifyError};

/// Reads the focused X11 window's process via `xdotool` and `/proc`.
#[derive(Debug, Clone)]
pub struct XdotoolProbe {
    proc_root: PathBuf,
}

impl Default for XdotoolProbe {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
        }
    }
}

impl ForegroundProbe for XdotoolProbe {
    fn foreground(&self) -> Option<ApplicationIdentity> {
        let output = match Command::new("xdotool")
            .args(["getactivewindow", "getwindowpid"])
            .output()
        {
            Ok(output) => output,
            Err(err) => {
                tracing::debug!(error = %err, "failed to run xdotool");
                return None;
            }
        };
        if !output.status.success() {
            tracing::debug!(status = %output.status, "no active window");
            return None;
        }
        let pid = String::from_utf8_lossy(&output.stdout).trim().parse().ok()?;
        identity_for_pid(&self.proc_root, pid)
    }
}

/// Builds an identity from `/proc/<pid>/comm` (display name) and
/// `/proc/<pid>/exe` (bundle id). A missing `exe` link leaves the bundle id
/// empty.
fn identity_for_pid(proc_root: &Path, pid: u32) -> Option<ApplicationIdentity> {
    let dir = proc_root.join(pid.to_string());
    let name = fs::read_to_string(dir.join("comm")).ok()?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let bundle_id = fs::read_link(dir.join("exe"))
        .map(|exe| exe.display().to_string())
        .unwrap_or_default();
    Some(ApplicationIdentity::new(name, bundle_id, pid))
}

/// Shows alerts with `notify-send`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifySendNotifier;

impl Notifier for NotifySendNotifier {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let status = Command::new("notify-send")
            .arg("--app-name=ft")
            .arg(format!("--category={}", notification.category))
            .arg(format!(
                "--hint=string:x-ft-correlation-id:{}",
                notification.correlation_id
            ))
            .arg(&notification.title)
            .arg(&notification.body)
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(NotifyError::Rejected(format!("notify-send exited with {status}")))
        }
    }
}
