//! Desktop notifications through `notify-send`.

use agent_monitor_core::platform::Notifier;
use agent_monitor_core::process::{quiet_command, spawn_reaped};
use log::{info, warn};

#[derive(Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    fn send(&self, urgency: &str, icon: &str, title: &str, body: &str) {
        let mut cmd = quiet_command("notify-send");
        cmd.args(["--app-name", "Agent Monitor"])
            .args(["--urgency", urgency])
            .args(["--icon", icon])
            .arg(title)
            .arg(body);
        if let Err(e) = spawn_reaped(cmd) {
            // No notification daemon: the log is all we have.
            warn!("notify-send failed ({e}); {title}: {body}");
        }
    }
}

impl Notifier for DesktopNotifier {
    fn info(&self, title: &str, body: &str) {
        info!("{title}: {body}");
        self.send("low", "dialog-information", title, body);
    }

    fn warn(&self, title: &str, body: &str) {
        warn!("{title}: {body}");
        self.send("normal", "dialog-warning", title, body);
    }

    fn error(&self, title: &str, body: &str) {
        log::error!("{title}: {body}");
        self.send("critical", "dialog-error", title, body);
    }
}
