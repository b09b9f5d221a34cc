use std::process::Command;
use tracing::{info, warn};

/// Fire-and-forget hand-off to the backend's authorization flow.
/// Nothing is observed after the hand-off; the operator re-checks token
/// status once the browser round trip is done.
pub trait AuthorizationFlow: Send + Sync {
    fn open_external(&self, url: &str);
}

/// Opens the URL in the operator's default browser, detached from this
/// process.
pub struct DetachedBrowser;

impl AuthorizationFlow for DetachedBrowser {
    fn open_external(&self, url: &str) {
        info!(target = "bookstall.auth", "opening authorization flow at {url}");
        if let Err(err) = open_command(url).spawn() {
            warn!(
                target = "bookstall.auth",
                "could not launch a browser ({err}); open {url} manually"
            );
        }
    }
}

#[cfg(target_os = "macos")]
fn open_command(url: &str) -> Command {
    let mut command = Command::new("open");
    command.arg(url);
    command
}

#[cfg(target_os = "windows")]
fn open_command(url: &str) -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", "start", "", url]);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn open_command(url: &str) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(url);
    command
}
